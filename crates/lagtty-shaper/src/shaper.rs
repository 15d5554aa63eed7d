//! The per-direction traffic shaper: delay, jitter, rate, chunking, framing.
//!
//! A [`Shaper`] sits between a byte source and a byte destination and
//! replays the source's bytes with the timing of a slower link. Data moves
//! through four stages in order:
//!
//! 1. a delay queue holding each input buffer until its jittered due time,
//! 2. a chunk splitter bounding the size of downstream writes,
//! 3. a rate governor: token bucket (bursty) or wire serializer (smooth),
//! 4. an optional frame coalescer batching output on a fixed interval.
//!
//! Bytes are never dropped, duplicated, or reordered. On end-of-stream the
//! queue drains to completion even if the cancel signal fires; on
//! mid-stream cancellation buffered bytes are discarded and
//! [`ShaperError::Cancelled`] is returned.

use std::collections::VecDeque;
use std::io;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Interval};
use tracing::{debug, trace};

use crate::bucket::TokenBucket;
use crate::config::ShaperConfig;
use crate::error::ShaperError;
use crate::shutdown::ShutdownToken;

/// Size of each owned buffer the reader task hands to the shaper loop.
const READ_BUFFER_SIZE: usize = 4096;

/// Capacity of the reader-to-loop handoff. A full channel blocks the reader
/// task, which is the shaper's only backpressure toward the source.
const READ_CHANNEL_CAPACITY: usize = 16;

/// Parking position for the wake timer while the delay queue is empty.
const IDLE_WAKE: Duration = Duration::from_secs(3600);

/// A buffer waiting in the delay queue for its due time.
#[derive(Debug)]
struct DelayedChunk {
    data: Vec<u8>,
    due_time: Instant,
}

/// One direction of traffic shaping; see the module docs for the pipeline.
///
/// A shaper is constructed from a [`ShaperConfig`], consumed by a single
/// [`run`](Self::run), and then discarded. It is not reusable: the token
/// bucket and wire timestamps carry state from the completed run.
pub struct Shaper {
    config: ShaperConfig,
    rng: StdRng,
    /// Rate governor in the default (bursty) mode. `None` when `rate` is 0
    /// or serial mode is selected.
    limiter: Option<TokenBucket>,
    /// When the simulated serial wire next becomes free. Advances exactly
    /// one byte-time per transmitted byte, clamped forward after idle gaps.
    wire_free_at: Instant,
}

impl Shaper {
    /// Create a shaper from `config`.
    ///
    /// A zero `seed` draws one from the wall clock; any other value makes
    /// the jitter sequence reproducible.
    pub fn new(config: ShaperConfig) -> Self {
        let seed = if config.seed == 0 {
            wall_clock_seed()
        } else {
            config.seed
        };
        let limiter = (config.rate > 0 && !config.serial_mode)
            .then(|| TokenBucket::new(config.rate, config.effective_burst()));

        Self {
            config,
            rng: StdRng::seed_from_u64(seed),
            limiter,
            wire_free_at: Instant::now(),
        }
    }

    /// Shape bytes from `source` into `destination` until end-of-stream.
    ///
    /// Returns `Ok(())` after a clean EOF drain. Returns
    /// [`ShaperError::Cancelled`] if `cancel` fires mid-stream (queued and
    /// framed bytes are dropped), or the first source read / destination
    /// write error. The EOF drain ignores `cancel` and runs to completion;
    /// bounding it is the caller's job.
    pub async fn run<S, D>(
        mut self,
        cancel: watch::Receiver<bool>,
        source: S,
        mut destination: D,
    ) -> Result<(), ShaperError>
    where
        S: AsyncRead + Unpin + Send + 'static,
        D: AsyncWrite + Unpin,
    {
        let mut handoff = spawn_reader(source, cancel.clone());

        let mut queue: VecDeque<DelayedChunk> = VecDeque::new();
        let mut frame_buf: Vec<u8> = Vec::new();

        let mut frame_tick = (!self.config.frame_time.is_zero()).then(|| {
            let mut tick = tokio::time::interval_at(
                Instant::now() + self.config.frame_time,
                self.config.frame_time,
            );
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            tick
        });

        let wake = tokio::time::sleep(IDLE_WAKE);
        tokio::pin!(wake);

        let mut stop = cancel.clone();
        let mut write_stop = cancel;

        loop {
            // The next wake is always the head's due time: release order is
            // enqueue order, not earliest-due-first.
            if let Some(head) = queue.front() {
                wake.as_mut().reset(head.due_time);
            }

            tokio::select! {
                biased;

                _ = stop_requested(&mut stop) => {
                    trace!(queued = queue.len(), "cancelled mid-stream");
                    return Err(ShaperError::Cancelled);
                }

                received = handoff.recv() => match received {
                    Some(Ok(data)) => self.enqueue(&mut queue, data),
                    Some(Err(e)) => return Err(ShaperError::SourceRead(e)),
                    None => {
                        debug!(
                            queued = queue.len(),
                            framed = frame_buf.len(),
                            "source closed, draining"
                        );
                        return self.drain(&mut destination, queue, frame_buf).await;
                    }
                },

                _ = &mut wake, if !queue.is_empty() => {
                    self.release_due(&mut destination, &mut queue, &mut frame_buf, Some(&mut write_stop))
                        .await?;
                }

                _ = frame_interval_tick(frame_tick.as_mut()) => {
                    if !frame_buf.is_empty() {
                        self.write_shaped(&mut destination, &frame_buf, Some(&mut write_stop))
                            .await?;
                        frame_buf.clear();
                    }
                }
            }
        }
    }

    /// Stage 1: assign a jittered due time and append at the queue tail.
    ///
    /// The queue is append-only and never re-sorted. Jitter is drawn per
    /// arrival, so a later buffer can carry an earlier due time; it still
    /// releases after every buffer ahead of it. That keeps seeded runs
    /// deterministic.
    fn enqueue(&mut self, queue: &mut VecDeque<DelayedChunk>, data: Vec<u8>) {
        let total = self.config.delay.as_nanos() as i128 + i128::from(self.random_jitter());
        let total = Duration::from_nanos(total.max(0) as u64);
        let due_time = Instant::now() + total;
        trace!(len = data.len(), delay_us = total.as_micros() as u64, "enqueue");
        queue.push_back(DelayedChunk { data, due_time });
    }

    /// Draw a jitter offset in nanoseconds, uniform over `[-jitter, +jitter)`.
    ///
    /// When `jitter` exceeds `delay`, the enqueue clamp at zero skews the
    /// effective distribution positive; that bias is documented behavior.
    fn random_jitter(&mut self) -> i64 {
        let jitter = self.config.jitter.as_nanos() as i64;
        if jitter == 0 {
            return 0;
        }
        self.rng.gen_range(0..jitter * 2) - jitter
    }

    /// Release pass: pop and emit every chunk whose due time has passed,
    /// stopping at the first head that is not yet due.
    async fn release_due<D>(
        &mut self,
        dst: &mut D,
        queue: &mut VecDeque<DelayedChunk>,
        frame_buf: &mut Vec<u8>,
        mut cancel: Option<&mut watch::Receiver<bool>>,
    ) -> Result<(), ShaperError>
    where
        D: AsyncWrite + Unpin,
    {
        let now = Instant::now();
        while queue.front().is_some_and(|head| head.due_time <= now) {
            let Some(chunk) = queue.pop_front() else { break };
            self.emit(dst, chunk.data, frame_buf, cancel.as_deref_mut()).await?;
        }
        Ok(())
    }

    /// Stages 2 and 4: split into chunk-sized pieces, then either buffer
    /// them for the next frame flush or hand each piece to the rate
    /// governor immediately.
    async fn emit<D>(
        &mut self,
        dst: &mut D,
        data: Vec<u8>,
        frame_buf: &mut Vec<u8>,
        mut cancel: Option<&mut watch::Receiver<bool>>,
    ) -> Result<(), ShaperError>
    where
        D: AsyncWrite + Unpin,
    {
        for piece in self.split_chunks(data) {
            if !self.config.frame_time.is_zero() {
                frame_buf.extend_from_slice(&piece);
            } else {
                self.write_shaped(dst, &piece, cancel.as_deref_mut()).await?;
            }
        }
        Ok(())
    }

    /// Stage 2: break `data` into owned pieces of at most `chunk_size`
    /// bytes, the last one carrying the remainder.
    ///
    /// Each piece is a fresh allocation so downstream stages can hold it
    /// independently of the input buffer.
    fn split_chunks(&self, data: Vec<u8>) -> Vec<Vec<u8>> {
        if self.config.chunk_size == 0 || data.len() <= self.config.chunk_size {
            return vec![data];
        }
        data.chunks(self.config.chunk_size)
            .map(<[u8]>::to_vec)
            .collect()
    }

    /// Stage 3: write `data` through the configured rate governor.
    ///
    /// `cancel` is observed during governor waits; `None` (the drain path)
    /// makes the write uninterruptible.
    async fn write_shaped<D>(
        &mut self,
        dst: &mut D,
        data: &[u8],
        cancel: Option<&mut watch::Receiver<bool>>,
    ) -> Result<(), ShaperError>
    where
        D: AsyncWrite + Unpin,
    {
        if self.config.rate == 0 {
            return write_all_flushed(dst, data).await;
        }
        if self.config.serial_mode {
            self.write_serialized(dst, data, cancel).await
        } else {
            self.write_bucketed(dst, data, cancel).await
        }
    }

    /// Wire-serializer governor: one write per byte, each spaced one
    /// byte-time behind the previous byte on the simulated wire.
    async fn write_serialized<D>(
        &mut self,
        dst: &mut D,
        data: &[u8],
        mut cancel: Option<&mut watch::Receiver<bool>>,
    ) -> Result<(), ShaperError>
    where
        D: AsyncWrite + Unpin,
    {
        let byte_time = Duration::from_secs_f64(1.0 / self.config.rate as f64);
        for &byte in data {
            // The wire frees one byte-time after it last went idle or after
            // the previous byte, whichever is later.
            let now = Instant::now();
            if now > self.wire_free_at {
                self.wire_free_at = now;
            }
            self.wire_free_at += byte_time;
            let transmit_at = self.wire_free_at;

            match cancel.as_deref_mut() {
                Some(stop) => {
                    tokio::select! {
                        biased;
                        _ = stop_requested(stop) => return Err(ShaperError::Cancelled),
                        _ = tokio::time::sleep_until(transmit_at) => {}
                    }
                }
                None => tokio::time::sleep_until(transmit_at).await,
            }

            write_all_flushed(dst, std::slice::from_ref(&byte)).await?;
        }
        Ok(())
    }

    /// Token-bucket governor: write in sub-pieces of at most one burst,
    /// each preceded by a wait for that many tokens.
    async fn write_bucketed<D>(
        &mut self,
        dst: &mut D,
        data: &[u8],
        mut cancel: Option<&mut watch::Receiver<bool>>,
    ) -> Result<(), ShaperError>
    where
        D: AsyncWrite + Unpin,
    {
        let Some(limiter) = self.limiter.as_mut() else {
            return write_all_flushed(dst, data).await;
        };
        for sub in data.chunks(limiter.burst()) {
            match cancel.as_deref_mut() {
                Some(stop) => {
                    tokio::select! {
                        biased;
                        _ = stop_requested(stop) => return Err(ShaperError::Cancelled),
                        _ = limiter.wait_n(sub.len()) => {}
                    }
                }
                None => limiter.wait_n(sub.len()).await,
            }
            write_all_flushed(dst, sub).await?;
        }
        Ok(())
    }

    /// Drain pass after a clean end-of-stream.
    ///
    /// Ignores the cancel signal, honors every remaining due time in
    /// enqueue order, then flushes the residual frame buffer. Rate limiting
    /// still applies; only destination errors abort a drain.
    async fn drain<D>(
        &mut self,
        dst: &mut D,
        mut queue: VecDeque<DelayedChunk>,
        mut frame_buf: Vec<u8>,
    ) -> Result<(), ShaperError>
    where
        D: AsyncWrite + Unpin,
    {
        while let Some(chunk) = queue.pop_front() {
            tokio::time::sleep_until(chunk.due_time).await;
            self.emit(dst, chunk.data, &mut frame_buf, None).await?;
        }
        if !frame_buf.is_empty() {
            self.write_shaped(dst, &frame_buf, None).await?;
        }
        debug!("drain complete");
        Ok(())
    }
}

/// Shape `source` into `destination` with a one-shot shaper and no external
/// cancel signal.
pub async fn copy<S, D>(config: ShaperConfig, source: S, destination: D) -> Result<(), ShaperError>
where
    S: AsyncRead + Unpin + Send + 'static,
    D: AsyncWrite + Unpin,
{
    let token = ShutdownToken::new();
    Shaper::new(config).run(token.subscribe(), source, destination).await
}

/// Spawn the source reader task.
///
/// The task reads into fresh owned buffers of up to [`READ_BUFFER_SIZE`]
/// bytes and delivers them over a bounded channel. Dropping the sender
/// signals end-of-stream; a read error is delivered in-band and ends the
/// task.
fn spawn_reader<S>(
    mut source: S,
    mut stop: watch::Receiver<bool>,
) -> mpsc::Receiver<io::Result<Vec<u8>>>
where
    S: AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(READ_CHANNEL_CAPACITY);
    tokio::spawn(async move {
        let mut buf = vec![0u8; READ_BUFFER_SIZE];
        loop {
            let result = tokio::select! {
                biased;
                _ = stop_requested(&mut stop) => break,
                result = source.read(&mut buf) => result,
            };
            match result {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(Ok(buf[..n].to_vec())).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    let _ = tx.send(Err(e)).await;
                    break;
                }
            }
        }
    });
    rx
}

/// Resolve once the stop signal reads `true`.
///
/// A closed channel means the caller dropped its [`ShutdownToken`] without
/// signalling; that counts as "never cancelled", not as a cancel.
async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    if stop.wait_for(|&stopped| stopped).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Tick the frame interval, or park forever when framing is disabled.
async fn frame_interval_tick(tick: Option<&mut Interval>) {
    match tick {
        Some(tick) => {
            tick.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Write `data` and flush. tokio's stdout handle buffers internally, so the
/// flush keeps each shaped write's timing visible at the terminal.
async fn write_all_flushed<D>(dst: &mut D, data: &[u8]) -> Result<(), ShaperError>
where
    D: AsyncWrite + Unpin,
{
    dst.write_all(data)
        .await
        .map_err(ShaperError::DestinationWrite)?;
    dst.flush().await.map_err(ShaperError::DestinationWrite)
}

fn wall_clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shaper_with_jitter(seed: u64) -> Shaper {
        Shaper::new(ShaperConfig {
            jitter: Duration::from_millis(30),
            seed,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn jitter_draws_stay_within_half_width() {
        let mut shaper = shaper_with_jitter(42);
        let bound = Duration::from_millis(30).as_nanos() as i64;
        for _ in 0..1000 {
            let j = shaper.random_jitter();
            assert!(j >= -bound && j < bound, "jitter {j} outside [-{bound}, {bound})");
        }
    }

    #[tokio::test]
    async fn jitter_sequence_is_deterministic_for_equal_seeds() {
        let mut a = shaper_with_jitter(42);
        let mut b = shaper_with_jitter(42);
        let draws_a: Vec<i64> = (0..64).map(|_| a.random_jitter()).collect();
        let draws_b: Vec<i64> = (0..64).map(|_| b.random_jitter()).collect();
        assert_eq!(draws_a, draws_b);
    }

    #[tokio::test]
    async fn jitter_sequence_differs_across_seeds() {
        let mut a = shaper_with_jitter(42);
        let mut b = shaper_with_jitter(43);
        let draws_a: Vec<i64> = (0..64).map(|_| a.random_jitter()).collect();
        let draws_b: Vec<i64> = (0..64).map(|_| b.random_jitter()).collect();
        assert_ne!(draws_a, draws_b);
    }

    #[tokio::test]
    async fn zero_jitter_draws_zero() {
        let mut shaper = Shaper::new(ShaperConfig {
            seed: 42,
            ..Default::default()
        });
        assert_eq!(shaper.random_jitter(), 0);
    }

    #[tokio::test]
    async fn split_chunks_exact_boundaries() {
        let shaper = Shaper::new(ShaperConfig {
            chunk_size: 3,
            seed: 42,
            ..Default::default()
        });
        let chunks = shaper.split_chunks(b"hello world".to_vec());
        let expected: Vec<&[u8]> = vec![b"hel", b"lo ", b"wor", b"ld"];
        assert_eq!(chunks, expected);
    }

    #[tokio::test]
    async fn split_chunks_passthrough_when_disabled() {
        let shaper = Shaper::new(ShaperConfig {
            seed: 42,
            ..Default::default()
        });
        let chunks = shaper.split_chunks(b"hello world".to_vec());
        assert_eq!(chunks, vec![b"hello world".to_vec()]);
    }

    #[tokio::test]
    async fn split_chunks_short_input_untouched() {
        let shaper = Shaper::new(ShaperConfig {
            chunk_size: 64,
            seed: 42,
            ..Default::default()
        });
        let chunks = shaper.split_chunks(b"hi".to_vec());
        assert_eq!(chunks, vec![b"hi".to_vec()]);
    }
}
