//! Configuration of the filter wheel and its session.
//!
//! Every field has a default matching the FW103H, so an empty TOML document is
//! a valid configuration:
//!
//! ```
//! # use fw103h_filter_wheel::WheelConfig;
//! let config = WheelConfig::from_toml_str(
//!     r#"
//!     serial_number = "40154488"
//!     delay_ms = 250
//!
//!     [session]
//!     poll_interval_ms = 200
//!     move_timeout_ms = 5000
//!     "#,
//! )
//! .unwrap();
//! assert_eq!(config.session.max_speed, 7200);
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Number of filter slots on the wheel
pub const NUM_POSITIONS: u32 = 6;

/// Angle between two neighbouring slots, in degrees
pub const STEP_ANGLE: f64 = 360.0 / NUM_POSITIONS as f64;

/// Device units per degree. Empirically derived for the FW103H step resolution,
/// don't touch.
pub const ANGLE_TO_DEVICE_UNITS: f64 = 7.0 / 9.0 + 1137.0;

/// Device velocity units per unit of speed. The controller takes the speed as
/// is.
pub const SPEED_TO_DEVICE_UNITS: f64 = 1.0;

pub const DEFAULT_SERIAL_NUMBER: &str = "40154488";
pub const DEFAULT_MAX_SPEED: u32 = 7200;

#[derive(Error, Debug)]
pub enum ConfigError {
    /// Wrapper around [`toml::de::Error`]
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
    #[error("{0} must be greater than 0")]
    Zero(&'static str),
}

/// Everything that configures a single session
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Interval of the polling the Kinesis driver does in the background
    pub poll_interval_ms: u32,
    pub home_timeout_ms: u64,
    pub move_timeout_ms: u64,
    /// How long the bounded wait sleeps between two looks at the message queue
    pub queue_poll_ms: u64,
    /// The channel needs this long after being enabled before it accepts a home
    pub enable_settle_ms: u64,
    pub max_speed: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 200,
            home_timeout_ms: 5000,
            move_timeout_ms: 5000,
            queue_poll_ms: 100,
            enable_settle_ms: 3000,
            max_speed: DEFAULT_MAX_SPEED,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let nonzero = [
            ("poll_interval_ms", u64::from(self.poll_interval_ms)),
            ("home_timeout_ms", self.home_timeout_ms),
            ("move_timeout_ms", self.move_timeout_ms),
            ("queue_poll_ms", self.queue_poll_ms),
        ];
        match nonzero.iter().find(|(_, v)| *v == 0) {
            Some((name, _)) => Err(ConfigError::Zero(*name)),
            None => Ok(()),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.into())
    }

    pub fn queue_poll(&self) -> Duration {
        Duration::from_millis(self.queue_poll_ms)
    }

    pub fn enable_settle(&self) -> Duration {
        Duration::from_millis(self.enable_settle_ms)
    }
}

/// Configuration of the whole filter wheel device
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct WheelConfig {
    pub serial_number: String,
    /// Settling window after a position change during which the device reports
    /// busy
    pub delay_ms: u64,
    pub session: SessionConfig,
}

impl Default for WheelConfig {
    fn default() -> Self {
        Self {
            serial_number: DEFAULT_SERIAL_NUMBER.to_string(),
            delay_ms: 0,
            session: SessionConfig::default(),
        }
    }
}

impl WheelConfig {
    /// Parses and validates a TOML document
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.session.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        assert_eq!(WheelConfig::from_toml_str("").unwrap(), WheelConfig::default());
    }

    #[test]
    fn partial_session_table() {
        let config = WheelConfig::from_toml_str(
            r#"
            serial_number = "40000001"
            [session]
            move_timeout_ms = 1200
            "#,
        )
        .unwrap();
        assert_eq!(config.serial_number, "40000001");
        assert_eq!(config.session.move_timeout_ms, 1200);
        assert_eq!(config.session.home_timeout_ms, 5000);
        assert_eq!(config.session.poll_interval_ms, 200);
    }

    #[test]
    fn zero_values_are_rejected() {
        let r = WheelConfig::from_toml_str("[session]\npoll_interval_ms = 0\n");
        assert!(matches!(r, Err(ConfigError::Zero("poll_interval_ms"))));
        let r = WheelConfig::from_toml_str("[session]\nqueue_poll_ms = 0\n");
        assert!(matches!(r, Err(ConfigError::Zero("queue_poll_ms"))));
    }

    #[test]
    fn malformed_document() {
        let r = WheelConfig::from_toml_str("delay_ms = \"soon\"");
        assert!(matches!(r, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn step_angle() {
        assert_eq!(STEP_ANGLE, 60.0);
    }
}
