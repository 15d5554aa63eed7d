//! Preset connection profiles.
//!
//! Each profile bundles the delay/jitter/bandwidth characteristics of a
//! familiar link type. Profiles apply before explicit flags, so any field
//! can still be overridden on the command line.

use std::time::Duration;

/// Bandwidth and latency presets for one named connection type.
#[derive(Debug, Clone, Copy, Default)]
pub struct Profile {
    /// Round-trip time, split evenly between directions.
    pub rtt: Duration,
    /// Jitter applied to both directions.
    pub jitter: Duration,
    /// Upstream bytes per second (0 = unlimited).
    pub up_rate: u64,
    /// Downstream bytes per second (0 = unlimited).
    pub down_rate: u64,
    /// Whether the profile uses the smooth wire-serialization model.
    pub serial_mode: bool,
}

/// All built-in profiles with a short description, in display order.
/// Rates are stored in bytes per second; the comments carry the familiar
/// bit-rate figures.
pub const PROFILES: &[(&str, &str, Profile)] = &[
    // Serial connections: rate only, 10 bits per byte (8N1)
    (
        "9600",
        "9600 baud serial connection",
        Profile {
            rtt: Duration::ZERO,
            jitter: Duration::ZERO,
            up_rate: 960,
            down_rate: 960,
            serial_mode: false,
        },
    ),
    (
        "2400",
        "2400 baud serial connection",
        Profile {
            rtt: Duration::ZERO,
            jitter: Duration::ZERO,
            up_rate: 240,
            down_rate: 240,
            serial_mode: false,
        },
    ),
    // Dial-up modems
    (
        "dialup",
        "56k modem (150ms RTT, 30ms jitter, 56kbit down, 33.6kbit up)",
        Profile {
            rtt: Duration::from_millis(150),
            jitter: Duration::from_millis(30),
            up_rate: 33_600 / 8,
            down_rate: 56_000 / 8,
            serial_mode: false,
        },
    ),
    // Mobile networks
    (
        "edge",
        "2G/EDGE mobile (500ms RTT, 100ms jitter, 200kbit down, 100kbit up)",
        Profile {
            rtt: Duration::from_millis(500),
            jitter: Duration::from_millis(100),
            up_rate: 100_000 / 8,
            down_rate: 200_000 / 8,
            serial_mode: false,
        },
    ),
    (
        "3g",
        "3G mobile (200ms RTT, 50ms jitter, 1mbit down, 384kbit up)",
        Profile {
            rtt: Duration::from_millis(200),
            jitter: Duration::from_millis(50),
            up_rate: 384_000 / 8,
            down_rate: 1_000_000 / 8,
            serial_mode: false,
        },
    ),
    (
        "lte",
        "Good LTE (50ms RTT, 15ms jitter, 20mbit down, 5mbit up)",
        Profile {
            rtt: Duration::from_millis(50),
            jitter: Duration::from_millis(15),
            up_rate: 5_000_000 / 8,
            down_rate: 20_000_000 / 8,
            serial_mode: false,
        },
    ),
    (
        "lte-poor",
        "Poor LTE signal (150ms RTT, 50ms jitter, 2mbit down, 500kbit up)",
        Profile {
            rtt: Duration::from_millis(150),
            jitter: Duration::from_millis(50),
            up_rate: 500_000 / 8,
            down_rate: 2_000_000 / 8,
            serial_mode: false,
        },
    ),
    // Wired connections
    (
        "dsl",
        "Basic DSL (50ms RTT, 10ms jitter, 8mbit down, 1mbit up)",
        Profile {
            rtt: Duration::from_millis(50),
            jitter: Duration::from_millis(10),
            up_rate: 1_000_000 / 8,
            down_rate: 8_000_000 / 8,
            serial_mode: false,
        },
    ),
    (
        "cable",
        "Cable modem (30ms RTT, 5ms jitter, 50mbit down, 5mbit up)",
        Profile {
            rtt: Duration::from_millis(30),
            jitter: Duration::from_millis(5),
            up_rate: 5_000_000 / 8,
            down_rate: 50_000_000 / 8,
            serial_mode: false,
        },
    ),
    // Satellite
    (
        "satellite",
        "Modern satellite like Starlink (600ms RTT, 50ms jitter, 25mbit down, 5mbit up)",
        Profile {
            rtt: Duration::from_millis(600),
            jitter: Duration::from_millis(50),
            up_rate: 5_000_000 / 8,
            down_rate: 25_000_000 / 8,
            serial_mode: false,
        },
    ),
    (
        "satellite-geo",
        "Traditional geostationary VSAT (700ms RTT, 100ms jitter, 10mbit down, 2mbit up)",
        Profile {
            rtt: Duration::from_millis(700),
            jitter: Duration::from_millis(100),
            up_rate: 2_000_000 / 8,
            down_rate: 10_000_000 / 8,
            serial_mode: false,
        },
    ),
    // WiFi scenarios
    (
        "wifi-poor",
        "Poor WiFi (80ms RTT, 40ms jitter, 2mbit down, 1mbit up)",
        Profile {
            rtt: Duration::from_millis(80),
            jitter: Duration::from_millis(40),
            up_rate: 1_000_000 / 8,
            down_rate: 2_000_000 / 8,
            serial_mode: false,
        },
    ),
    (
        "wifi-bad",
        "Very bad WiFi (200ms RTT, 100ms jitter, 500kbit down, 250kbit up)",
        Profile {
            rtt: Duration::from_millis(200),
            jitter: Duration::from_millis(100),
            up_rate: 250_000 / 8,
            down_rate: 500_000 / 8,
            serial_mode: false,
        },
    ),
    // International/long-distance
    (
        "intercontinental",
        "Long-distance connection, e.g. US to Asia (250ms RTT, 30ms jitter, 10mbit down, 5mbit up)",
        Profile {
            rtt: Duration::from_millis(250),
            jitter: Duration::from_millis(30),
            up_rate: 5_000_000 / 8,
            down_rate: 10_000_000 / 8,
            serial_mode: false,
        },
    ),
];

/// Look up a profile by name.
pub fn find(name: &str) -> Option<Profile> {
    PROFILES
        .iter()
        .find(|(profile_name, _, _)| *profile_name == name)
        .map(|(_, _, profile)| *profile)
}

/// Print the profile table for `--list-profiles`.
pub fn print_listing() {
    println!("Available profiles:");
    println!();
    for (name, description, _) in PROFILES {
        println!("  {name:<18} {description}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_known_profile() {
        let profile = find("3g").expect("3g profile missing");
        assert_eq!(profile.rtt, Duration::from_millis(200));
        assert_eq!(profile.down_rate, 125_000);
        assert_eq!(profile.up_rate, 48_000);
    }

    #[test]
    fn find_unknown_profile_is_none() {
        assert!(find("carrier-pigeon").is_none());
    }

    #[test]
    fn serial_profiles_set_rates_only() {
        let profile = find("9600").unwrap();
        assert_eq!(profile.up_rate, 960);
        assert_eq!(profile.down_rate, 960);
        assert_eq!(profile.rtt, Duration::ZERO);
    }

    #[test]
    fn profile_names_are_unique() {
        for (i, (name, _, _)) in PROFILES.iter().enumerate() {
            assert!(
                !PROFILES[i + 1..].iter().any(|(other, _, _)| other == name),
                "duplicate profile name {name}"
            );
        }
    }
}
