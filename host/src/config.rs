use std::path::Path;

use serde::{Deserialize, Serialize};
use simtrack_common::config::ModemConfig;

use crate::error::Error;

pub const DEFAULT_PORT: &str = "/dev/ttyS0";
pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Serial control line wired to the modem's power key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerLine {
    /// Power key is not connected, pulses are only logged.
    #[default]
    None,
    Dtr,
    Rts,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub port: String,
    pub baud_rate: u32,
    pub power_line: PowerLine,
    /// Reported when no temperature sensor can be read, in degrees Celsius.
    pub fallback_temperature: f32,
    pub modem: ModemConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT.to_owned(),
            baud_rate: DEFAULT_BAUD_RATE,
            power_line: PowerLine::None,
            fallback_temperature: 0.0,
            modem: ModemConfig::default(),
        }
    }
}

impl HostConfig {
    pub fn from_toml(text: &str) -> crate::Result<Self> {
        toml::from_str(text).map_err(|err| Error::ConfigError(err.to_string()))
    }

    pub fn load(path: &Path) -> crate::Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|err| Error::ConfigError(format!("{}: {err}", path.display())))?;
        Self::from_toml(&text)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use embassy_time::Duration;

    #[test]
    fn test_empty_config() {
        let config = HostConfig::from_toml("").unwrap();
        assert_eq!(config, HostConfig::default());
        assert_eq!(config.port, "/dev/ttyS0");
        assert_eq!(config.baud_rate, 115200);
        assert_eq!(config.modem.apn, "internet.econet");
    }

    #[test]
    fn test_full_config() {
        let config = HostConfig::from_toml(
            r#"
            port = "/dev/ttyUSB2"
            power_line = "dtr"
            fallback_temperature = 21.5

            [modem]
            apn = "internet"
            phone_number = "+421900123456"

            [modem.retry]
            gps_attempts = 10
            registration_delay_ms = 1000
            "#,
        )
        .unwrap();
        assert_eq!(config.port, "/dev/ttyUSB2");
        assert_eq!(config.baud_rate, 115200);
        assert_eq!(config.power_line, PowerLine::Dtr);
        assert_eq!(config.fallback_temperature, 21.5);
        assert_eq!(config.modem.apn, "internet");
        assert_eq!(config.modem.phone_number, "+421900123456");
        assert_eq!(config.modem.retry.gps_attempts, 10);
        assert_eq!(config.modem.retry.registration_delay(), Duration::from_secs(1));
        assert_eq!(config.modem.retry.registration_attempts, 2);
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            HostConfig::from_toml("power_line = \"gpio\""),
            Err(Error::ConfigError(_))
        ));
        // Longer than the APN capacity.
        assert!(matches!(
            HostConfig::from_toml("[modem]\napn = \"a.very.long.access.point.name.example\""),
            Err(Error::ConfigError(_))
        ));
        assert!(matches!(
            HostConfig::load(Path::new("/nonexistent/simtrack.toml")),
            Err(Error::ConfigError(_))
        ));
    }
}
