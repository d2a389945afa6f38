use core::str::FromStr;

use embassy_time::Duration;
use heapless::String;
use serde::{Deserialize, Serialize};

/// Timeout for a regular AT command.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(2);
/// Window in which the modem has to answer the liveness probe.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);
/// How long the power-enable line is held high.
pub const POWER_PULSE: Duration = Duration::from_secs(2);
/// Wait after a power pulse before talking to the modem.
pub const POWER_SETTLE: Duration = Duration::from_secs(8);
/// Upper bound for the echo command sent before each probe.
pub const ECHO_DELAY: Duration = Duration::from_secs(2);
/// Wait between two failed start-up attempts.
pub const STARTUP_RETRY_DELAY: Duration = Duration::from_secs(2);
pub const REGISTRATION_ATTEMPTS: u8 = 2;
pub const REGISTRATION_DELAY: Duration = Duration::from_secs(5);
/// Wait after enabling the GPS receiver.
pub const GPS_SETTLE: Duration = Duration::from_secs(2);
pub const GPS_ATTEMPTS: u8 = 5;
/// Window for collecting a single `+CGNSINF` report.
pub const GPS_QUERY_WINDOW: Duration = Duration::from_secs(2);
pub const GPS_RETRY_DELAY: Duration = Duration::from_secs(2);
/// How long to wait for `+CMGS` after the message body was submitted.
pub const SMS_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(10);
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

pub const DEFAULT_APN: &str = "internet.econet";
pub const DEFAULT_PHONE_NUMBER: &str = "+263784488466";

/// Timeouts, delays and retry counts for the whole run.
///
/// Durations are kept in milliseconds so the policy can be read from a config file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub command_timeout_ms: u64,
    pub probe_timeout_ms: u64,
    pub power_pulse_ms: u64,
    pub power_settle_ms: u64,
    pub echo_delay_ms: u64,
    pub startup_retry_delay_ms: u64,
    pub registration_attempts: u8,
    pub registration_delay_ms: u64,
    pub gps_settle_ms: u64,
    pub gps_attempts: u8,
    pub gps_query_window_ms: u64,
    pub gps_retry_delay_ms: u64,
    pub sms_confirmation_timeout_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            command_timeout_ms: COMMAND_TIMEOUT.as_millis(),
            probe_timeout_ms: PROBE_TIMEOUT.as_millis(),
            power_pulse_ms: POWER_PULSE.as_millis(),
            power_settle_ms: POWER_SETTLE.as_millis(),
            echo_delay_ms: ECHO_DELAY.as_millis(),
            startup_retry_delay_ms: STARTUP_RETRY_DELAY.as_millis(),
            registration_attempts: REGISTRATION_ATTEMPTS,
            registration_delay_ms: REGISTRATION_DELAY.as_millis(),
            gps_settle_ms: GPS_SETTLE.as_millis(),
            gps_attempts: GPS_ATTEMPTS,
            gps_query_window_ms: GPS_QUERY_WINDOW.as_millis(),
            gps_retry_delay_ms: GPS_RETRY_DELAY.as_millis(),
            sms_confirmation_timeout_ms: SMS_CONFIRMATION_TIMEOUT.as_millis(),
            poll_interval_ms: POLL_INTERVAL.as_millis(),
        }
    }
}

impl RetryPolicy {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn power_pulse(&self) -> Duration {
        Duration::from_millis(self.power_pulse_ms)
    }

    pub fn power_settle(&self) -> Duration {
        Duration::from_millis(self.power_settle_ms)
    }

    pub fn echo_delay(&self) -> Duration {
        Duration::from_millis(self.echo_delay_ms)
    }

    pub fn startup_retry_delay(&self) -> Duration {
        Duration::from_millis(self.startup_retry_delay_ms)
    }

    pub fn registration_delay(&self) -> Duration {
        Duration::from_millis(self.registration_delay_ms)
    }

    pub fn gps_settle(&self) -> Duration {
        Duration::from_millis(self.gps_settle_ms)
    }

    pub fn gps_query_window(&self) -> Duration {
        Duration::from_millis(self.gps_query_window_ms)
    }

    pub fn gps_retry_delay(&self) -> Duration {
        Duration::from_millis(self.gps_retry_delay_ms)
    }

    pub fn sms_confirmation_timeout(&self) -> Duration {
        Duration::from_millis(self.sms_confirmation_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModemConfig {
    /// Access point name (APN)
    pub apn: String<30>,
    /// Destination of the report SMS
    pub phone_number: String<20>,
    pub retry: RetryPolicy,
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            apn: String::from_str(DEFAULT_APN).unwrap_or_default(),
            phone_number: String::from_str(DEFAULT_PHONE_NUMBER).unwrap_or_default(),
            retry: RetryPolicy::default(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ModemConfig::default();
        assert_eq!(config.apn, DEFAULT_APN);
        assert_eq!(config.phone_number, DEFAULT_PHONE_NUMBER);
        assert_eq!(config.retry.registration_attempts, 2);
        assert_eq!(config.retry.gps_attempts, 5);
        assert_eq!(config.retry.command_timeout(), Duration::from_secs(2));
        assert_eq!(config.retry.power_settle(), Duration::from_secs(8));
    }
}
