//! Traffic shaping for interactive byte streams.
//!
//! This crate provides the per-direction shaper behind the `lagtty` binary:
//! it replays an async byte stream with the timing of a slower link by
//! combining base delay, jitter, bandwidth limiting, write chunking, and
//! output coalescing. Bytes are preserved exactly; only their timing and
//! write boundaries change.

pub mod bucket;
pub mod config;
pub mod error;
pub mod shaper;
pub mod shutdown;
pub mod testing;

pub use bucket::TokenBucket;
pub use config::ShaperConfig;
pub use error::ShaperError;
pub use shaper::{Shaper, copy};
pub use shutdown::ShutdownToken;
