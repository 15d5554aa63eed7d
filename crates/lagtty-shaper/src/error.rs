//! Error types crossing the shaper boundary.

/// Errors that can abort a shaper run.
///
/// End-of-stream on the source is not an error: it triggers the drain path
/// and `run` returns `Ok(())`. All three variants are fatal to the current
/// run; nothing is retried internally.
#[derive(Debug, thiserror::Error)]
pub enum ShaperError {
    /// The external cancel signal fired mid-stream. Queued and framed bytes
    /// are dropped.
    #[error("shaper cancelled")]
    Cancelled,
    /// The source returned a read error other than end-of-stream.
    #[error("source read error: {0}")]
    SourceRead(std::io::Error),
    /// A write to the destination failed. Bytes already written are not
    /// re-sent.
    #[error("destination write error: {0}")]
    DestinationWrite(std::io::Error),
}

impl ShaperError {
    /// Whether this error is the caller's own cancellation coming back.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ShaperError::Cancelled)
    }
}
