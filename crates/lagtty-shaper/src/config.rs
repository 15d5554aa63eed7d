//! Shaping parameters for one direction of a terminal session.

use std::time::Duration;

/// Upper bound on the auto-computed token-bucket burst. Without this cap a
/// fast configured rate would allow a multi-megabyte first write, defeating
/// the limiter entirely.
pub const MAX_AUTO_BURST: usize = 65536;

/// Configuration for one direction of traffic shaping.
///
/// Every field has a zero value that disables the corresponding stage, so
/// `ShaperConfig::default()` is a pure passthrough.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShaperConfig {
    /// Base delay applied to every input buffer.
    pub delay: Duration,
    /// Half-width of the uniform random variation added to `delay`.
    pub jitter: Duration,
    /// Throughput cap in bytes per second (0 = unlimited).
    pub rate: u64,
    /// Token-bucket burst in bytes (0 = auto-calculate).
    pub burst: usize,
    /// Maximum bytes per downstream write (0 = unlimited).
    pub chunk_size: usize,
    /// Interval for coalescing output into periodic bursts (zero = disabled).
    pub frame_time: Duration,
    /// Seed for the jitter RNG (0 = seed from the wall clock).
    pub seed: u64,
    /// Pace output byte-by-byte like a serial wire instead of the bursty
    /// token bucket.
    pub serial_mode: bool,
}

impl ShaperConfig {
    /// Effective token-bucket burst: the configured value if non-zero,
    /// otherwise 100 ms of data at `rate`, raised to at least one chunk and
    /// capped at [`MAX_AUTO_BURST`].
    pub fn effective_burst(&self) -> usize {
        if self.burst > 0 {
            return self.burst;
        }
        let mut burst = (self.rate / 10) as usize;
        if self.chunk_size > burst {
            burst = self.chunk_size;
        }
        if burst < 1 {
            burst = 1;
        }
        burst.min(MAX_AUTO_BURST)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_burst_wins() {
        let config = ShaperConfig {
            rate: 1_000_000,
            burst: 512,
            ..Default::default()
        };
        assert_eq!(config.effective_burst(), 512);
    }

    #[test]
    fn auto_burst_is_100ms_of_data() {
        let config = ShaperConfig {
            rate: 1000,
            ..Default::default()
        };
        assert_eq!(config.effective_burst(), 100);
    }

    #[test]
    fn auto_burst_never_smaller_than_one_chunk() {
        let config = ShaperConfig {
            rate: 1000,
            chunk_size: 4096,
            ..Default::default()
        };
        assert_eq!(config.effective_burst(), 4096);
    }

    #[test]
    fn auto_burst_floor_is_one_byte() {
        let config = ShaperConfig {
            rate: 5,
            ..Default::default()
        };
        assert_eq!(config.effective_burst(), 1);
    }

    #[test]
    fn auto_burst_caps_at_64k() {
        // 1 Gbit/s worth of bytes would otherwise allow a 12.5 MiB burst.
        let config = ShaperConfig {
            rate: 125_000_000,
            ..Default::default()
        };
        assert_eq!(config.effective_burst(), MAX_AUTO_BURST);
    }
}
