//! Command-line interface: flag definitions, duration and bandwidth string
//! parsing, and the derivation of the two per-direction shaper configs.

use std::time::Duration;

use clap::Parser;

use lagtty_shaper::ShaperConfig;

use crate::error::SessionError;
use crate::profiles;

/// Default bits per byte on a simulated serial line: 1 start + 8 data +
/// 1 stop (8N1).
pub const DEFAULT_BITS_PER_BYTE: u64 = 10;

#[derive(Debug, Parser)]
#[command(
    name = "lagtty",
    version,
    about = "Simulate laggy terminal connections",
    long_about = "Wraps a command in a PTY and applies configurable delay, jitter,\n\
                  and bandwidth limits to simulate slow network connections.",
    after_help = "Bandwidth formats: 100, 100bps, 56kbit, 56k, 1mbit, 100kb\n\
                  \x20 k=1000 (SI units), not 1024\n\
                  \n\
                  Examples:\n\
                  \x20 lagtty --serial 9600 -- bash\n\
                  \x20 lagtty --rtt 400ms --jitter 80ms --down 80kbit -- htop\n\
                  \x20 lagtty --profile 3g -- ssh user@host"
)]
pub struct Cli {
    /// Round-trip time, split evenly between directions (e.g. 200ms)
    #[arg(long, value_parser = parse_duration)]
    pub rtt: Option<Duration>,

    /// Upstream delay (user to child)
    #[arg(long, value_parser = parse_duration)]
    pub up_delay: Option<Duration>,

    /// Downstream delay (child to user)
    #[arg(long, value_parser = parse_duration)]
    pub down_delay: Option<Duration>,

    /// Jitter for both directions
    #[arg(short = 'j', long, value_parser = parse_duration)]
    pub jitter: Option<Duration>,

    /// Upstream jitter only
    #[arg(long, value_parser = parse_duration)]
    pub up_jitter: Option<Duration>,

    /// Downstream jitter only
    #[arg(long, value_parser = parse_duration)]
    pub down_jitter: Option<Duration>,

    /// Upstream bandwidth limit (e.g. 56kbit)
    #[arg(short = 'u', long = "up", value_parser = parse_bandwidth)]
    pub up_rate: Option<u64>,

    /// Downstream bandwidth limit (e.g. 1mbit)
    #[arg(short = 'd', long = "down", value_parser = parse_bandwidth)]
    pub down_rate: Option<u64>,

    /// Max bytes per write (0 = unlimited)
    #[arg(short = 'c', long = "chunk", default_value_t = 0)]
    pub chunk_size: usize,

    /// Coalesce output interval (e.g. 40ms)
    #[arg(long = "frame", value_parser = parse_duration)]
    pub frame_time: Option<Duration>,

    /// Serial port speed in bits per second (e.g. 9600)
    #[arg(short = 's', long, default_value_t = 0)]
    pub serial: u64,

    /// Bits per byte for serial calculation (10 = 8N1)
    #[arg(long, default_value_t = DEFAULT_BITS_PER_BYTE)]
    pub bits_per_byte: u64,

    /// Random seed for jitter (0 = seed from the clock)
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Preset connection profile (see --list-profiles)
    #[arg(short = 'p', long)]
    pub profile: Option<String>,

    /// List available profiles and exit
    #[arg(short = 'L', long)]
    pub list_profiles: bool,

    /// Command to run, after `--`
    #[arg(last = true)]
    pub command: Vec<String>,
}

/// Fully-resolved settings for one session.
#[derive(Debug, Clone)]
pub struct Settings {
    pub up: ShaperConfig,
    pub down: ShaperConfig,
    pub command: Vec<String>,
}

impl Cli {
    /// Resolve flags and profile into the two per-direction shaper configs.
    ///
    /// A profile applies first; every explicit flag overrides it. `--rtt`
    /// fills unset per-direction delays with half its value, global jitter
    /// fills unset per-direction jitter, and `--serial` derives byte rates
    /// for both directions and switches on wire serialization.
    pub fn into_settings(self) -> Result<Settings, SessionError> {
        let profile = match self.profile.as_deref() {
            Some(name) => Some(profiles::find(name).ok_or_else(|| {
                SessionError::Config(format!("unknown profile: {name}"))
            })?),
            None => None,
        };
        let profile = profile.unwrap_or_default();

        let rtt = self.rtt.unwrap_or(profile.rtt);
        let jitter = self.jitter.unwrap_or(profile.jitter);
        let mut up_rate = self.up_rate.unwrap_or(profile.up_rate);
        let mut down_rate = self.down_rate.unwrap_or(profile.down_rate);
        let mut serial_mode = profile.serial_mode;

        if self.serial > 0 {
            if self.bits_per_byte == 0 {
                return Err(SessionError::Config(
                    "--bits-per-byte must be at least 1".into(),
                ));
            }
            let bytes_per_sec = self.serial / self.bits_per_byte;
            if up_rate == 0 {
                up_rate = bytes_per_sec;
            }
            if down_rate == 0 {
                down_rate = bytes_per_sec;
            }
            // Serial speeds get the wire-serialization model for an
            // authentic character-by-character feel.
            serial_mode = true;
        }

        let half_rtt = rtt / 2;
        let up_delay = self.up_delay.unwrap_or(half_rtt);
        let down_delay = self.down_delay.unwrap_or(half_rtt);
        let up_jitter = self.up_jitter.unwrap_or(jitter);
        let down_jitter = self.down_jitter.unwrap_or(jitter);

        let frame_time = self.frame_time.unwrap_or(Duration::ZERO);

        let up = ShaperConfig {
            delay: up_delay,
            jitter: up_jitter,
            rate: up_rate,
            burst: 0,
            chunk_size: self.chunk_size,
            frame_time,
            seed: self.seed,
            serial_mode,
        };
        let down = ShaperConfig {
            // The two directions share chunking and framing but carry their
            // own delay/jitter/rate, and different seeds so their jitter
            // streams are independently reproducible.
            delay: down_delay,
            jitter: down_jitter,
            rate: down_rate,
            seed: self.seed.wrapping_add(1),
            ..up
        };

        Ok(Settings {
            up,
            down,
            command: self.command,
        })
    }
}

/// Parse a duration string: one or more `<number><unit>` segments summed
/// together, e.g. `200ms`, `1.5s`, or `1h30m`. Units are `ns`, `us`,
/// `ms`, `s`, `m`, `h`; a bare `0` needs no unit. Same grammar as Go's
/// `time.ParseDuration`, minus signs.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.is_empty() {
        return Err("empty duration".into());
    }

    let mut total = Duration::ZERO;
    let mut rest = s;
    while !rest.is_empty() {
        let unit_start = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .ok_or_else(|| format!("missing unit in duration {s:?} (try e.g. \"100ms\")"))?;
        let (number, tail) = rest.split_at(unit_start);
        let value: f64 = number
            .parse()
            .map_err(|_| format!("invalid duration {s:?}"))?;
        let unit_end = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, remainder) = tail.split_at(unit_end);
        let unit_seconds = match unit {
            "ns" => 1e-9,
            "us" | "\u{b5}s" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => return Err(format!("unknown duration unit {unit:?} in {s:?}")),
        };
        total += Duration::from_secs_f64(value * unit_seconds);
        rest = remainder;
    }
    Ok(total)
}

/// Parse a bandwidth string like `56kbit`, `1mbit`, or `100kb` into bytes
/// per second.
///
/// Suffixes use SI multipliers (k = 1000, not 1024). Bare numbers and
/// bit-flavored units are bits per second and divide by 8, truncating;
/// byte-flavored units (`b`, `kb`, `mb`) are bytes per second directly.
pub fn parse_bandwidth(s: &str) -> Result<u64, String> {
    let s = s.trim().to_ascii_lowercase();
    let unit_start = s
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(s.len());
    let (number, unit) = s.split_at(unit_start);
    if number.is_empty() {
        return Err(format!("invalid bandwidth {s:?}"));
    }
    let value: f64 = number
        .parse()
        .map_err(|_| format!("invalid bandwidth {s:?}"))?;

    let (multiplier, is_bytes) = match unit {
        "" | "bps" | "bit" | "bits" => (1.0, false),
        "k" | "kbit" | "kbps" => (1e3, false),
        "m" | "mbit" | "mbps" => (1e6, false),
        "g" | "gbit" | "gbps" => (1e9, false),
        "b" | "byte" | "bytes" => (1.0, true),
        "kb" => (1e3, true),
        "mb" => (1e6, true),
        _ => return Err(format!("unknown bandwidth unit {unit:?}")),
    };

    let scaled = value * multiplier;
    if is_bytes {
        Ok(scaled as u64)
    } else {
        Ok((scaled / 8.0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("lagtty").chain(args.iter().copied()))
    }

    #[test]
    fn parse_duration_units() {
        let cases = [
            ("100ms", Duration::from_millis(100)),
            ("1.5s", Duration::from_millis(1500)),
            ("2m", Duration::from_secs(120)),
            ("250us", Duration::from_micros(250)),
            ("1h", Duration::from_secs(3600)),
        ];
        for (input, expected) in cases {
            assert_eq!(parse_duration(input).unwrap(), expected, "input {input}");
        }
    }

    #[test]
    fn parse_duration_compound_segments() {
        let cases = [
            ("1h30m", Duration::from_secs(5400)),
            ("1h30m10s", Duration::from_secs(5410)),
            ("90m500ms", Duration::from_secs(5400) + Duration::from_millis(500)),
            ("1s500ms", Duration::from_millis(1500)),
        ];
        for (input, expected) in cases {
            assert_eq!(parse_duration(input).unwrap(), expected, "input {input}");
        }
    }

    #[test]
    fn parse_duration_bare_zero_needs_no_unit() {
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn parse_duration_rejects_garbage() {
        assert!(parse_duration("100").is_err());
        assert!(parse_duration("ms").is_err());
        assert!(parse_duration("5 parsecs").is_err());
        // Compound forms still need a unit on every segment.
        assert!(parse_duration("1h30").is_err());
        assert!(parse_duration("1h30x").is_err());
    }

    #[test]
    fn parse_bandwidth_bit_units() {
        let cases = [
            ("100", 12),
            ("100bps", 12),
            ("56kbit", 7000),
            ("56k", 7000),
            ("1mbit", 125_000),
            ("1g", 125_000_000),
        ];
        for (input, expected) in cases {
            assert_eq!(parse_bandwidth(input).unwrap(), expected, "input {input}");
        }
    }

    #[test]
    fn parse_bandwidth_byte_units() {
        let cases = [("100b", 100), ("100kb", 100_000), ("2mb", 2_000_000)];
        for (input, expected) in cases {
            assert_eq!(parse_bandwidth(input).unwrap(), expected, "input {input}");
        }
    }

    #[test]
    fn parse_bandwidth_is_case_insensitive() {
        assert_eq!(parse_bandwidth("56KBIT").unwrap(), 7000);
        assert_eq!(parse_bandwidth("100KB").unwrap(), 100_000);
    }

    #[test]
    fn parse_bandwidth_rejects_garbage() {
        assert!(parse_bandwidth("fast").is_err());
        assert!(parse_bandwidth("10lightyears").is_err());
        assert!(parse_bandwidth("").is_err());
    }

    #[test]
    fn rtt_splits_evenly() {
        let settings = parse(&["--rtt", "200ms", "--", "true"])
            .into_settings()
            .unwrap();
        assert_eq!(settings.up.delay, Duration::from_millis(100));
        assert_eq!(settings.down.delay, Duration::from_millis(100));
    }

    #[test]
    fn explicit_delay_beats_rtt() {
        let settings = parse(&["--rtt", "200ms", "--up-delay", "30ms", "--", "true"])
            .into_settings()
            .unwrap();
        assert_eq!(settings.up.delay, Duration::from_millis(30));
        assert_eq!(settings.down.delay, Duration::from_millis(100));
    }

    #[test]
    fn global_jitter_fills_both_directions() {
        let settings = parse(&["--jitter", "40ms", "--down-jitter", "10ms", "--", "true"])
            .into_settings()
            .unwrap();
        assert_eq!(settings.up.jitter, Duration::from_millis(40));
        assert_eq!(settings.down.jitter, Duration::from_millis(10));
    }

    #[test]
    fn serial_sets_rates_and_wire_mode() {
        let settings = parse(&["--serial", "9600", "--", "true"])
            .into_settings()
            .unwrap();
        assert_eq!(settings.up.rate, 960);
        assert_eq!(settings.down.rate, 960);
        assert!(settings.up.serial_mode);
        assert!(settings.down.serial_mode);
    }

    #[test]
    fn serial_respects_explicit_rates() {
        let settings = parse(&["--serial", "9600", "--down", "56kbit", "--", "true"])
            .into_settings()
            .unwrap();
        assert_eq!(settings.up.rate, 960);
        assert_eq!(settings.down.rate, 7000);
    }

    #[test]
    fn directions_get_adjacent_seeds() {
        let settings = parse(&["--seed", "42", "--", "true"])
            .into_settings()
            .unwrap();
        assert_eq!(settings.up.seed, 42);
        assert_eq!(settings.down.seed, 43);
    }

    #[test]
    fn profile_applies_and_flags_override() {
        let settings = parse(&["--profile", "3g", "--down", "56kbit", "--", "true"])
            .into_settings()
            .unwrap();
        // From the profile: 200ms RTT split evenly, 50ms jitter, 48kB/s up.
        assert_eq!(settings.up.delay, Duration::from_millis(100));
        assert_eq!(settings.up.jitter, Duration::from_millis(50));
        assert_eq!(settings.up.rate, 48_000);
        // Overridden on the command line.
        assert_eq!(settings.down.rate, 7000);
    }

    #[test]
    fn unknown_profile_is_an_error() {
        let result = parse(&["--profile", "telegraph", "--", "true"]).into_settings();
        assert!(result.is_err());
    }

    #[test]
    fn command_collects_after_separator() {
        let settings = parse(&["--rtt", "100ms", "--", "sh", "-c", "echo hi"])
            .into_settings()
            .unwrap();
        assert_eq!(settings.command, ["sh", "-c", "echo hi"]);
    }
}
