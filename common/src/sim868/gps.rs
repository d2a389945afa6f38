use core::str::FromStr;

#[cfg(feature = "defmt")]
use defmt::{info, warn};
use heapless::String;
#[cfg(not(feature = "defmt"))]
use log::{info, warn};

use crate::at::response::ResponseBuffer;
use crate::config::RetryPolicy;
use crate::error::Error;
use crate::sim868::hw::ModemHw;

const GPS_POWER_ON: &str = "AT+CGNSPWR=1";
const GPS_POWER_OFF: &str = "AT+CGNSPWR=0";
const GPS_INFO: &str = "AT+CGNSINF";
const REPORT_PREFIX: &str = "+CGNSINF:";
/// Four or more consecutive empty fields in a `+CGNSINF` report mean there is no fix.
pub const NO_FIX_MARKER: &str = ",,,,";
pub const GPS_FIELD_SIZE: usize = 24;

// Positions in the comma-split response text. The echoed `+CGNSINF: <run status>` ends up in
// field 0, so these follow the SIM868 `<run>,<fix>,<UTC>,<lat>,<lon>` order. Needs checking
// before this is used with any other modem.
const TIMESTAMP_FIELD: usize = 2;
const LATITUDE_FIELD: usize = 3;
const LONGITUDE_FIELD: usize = 4;

/// A resolved GPS position, fields kept verbatim as reported by the modem.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GpsFix {
    pub latitude: String<GPS_FIELD_SIZE>,
    pub longitude: String<GPS_FIELD_SIZE>,
    /// UTC time as `yyyyMMddhhmmss.sss`
    pub timestamp: String<GPS_FIELD_SIZE>,
}

impl GpsFix {
    /// Parses a `+CGNSINF` response.
    ///
    /// Returns `Ok(None)` if the receiver has no fix yet and `ParseError` if the response is
    /// malformed or coordinates are not decimal numbers.
    pub fn from_response(response: &ResponseBuffer) -> crate::Result<Option<Self>> {
        let text = response.as_text().ok_or(Error::StringEncodingError)?;
        if text.contains(NO_FIX_MARKER) {
            return Ok(None);
        }
        let report = text.lines().find(|line| line.contains(REPORT_PREFIX)).unwrap_or(text);
        Self::parse(report).map(Some)
    }

    /// Extracts the fix fields by position from a comma separated report.
    pub fn parse(text: &str) -> crate::Result<Self> {
        let mut fields = text.split(',').map(str::trim);
        let timestamp = fields.nth(TIMESTAMP_FIELD).ok_or(Error::ParseError)?;
        let latitude = fields.nth(LATITUDE_FIELD - TIMESTAMP_FIELD - 1).ok_or(Error::ParseError)?;
        let longitude =
            fields.nth(LONGITUDE_FIELD - LATITUDE_FIELD - 1).ok_or(Error::ParseError)?;

        if timestamp.is_empty() {
            return Err(Error::ParseError);
        }
        for coordinate in [latitude, longitude] {
            coordinate.parse::<f64>().map_err(|_| Error::ParseError)?;
        }

        Ok(Self {
            latitude: Self::field(latitude)?,
            longitude: Self::field(longitude)?,
            timestamp: Self::field(timestamp)?,
        })
    }

    fn field(value: &str) -> crate::Result<String<GPS_FIELD_SIZE>> {
        String::from_str(value).map_err(|_| Error::BufferTooSmallError)
    }
}

/// GNSS part of the SIM868.
pub struct Gnss {
    retry: RetryPolicy,
}

impl Gnss {
    pub fn new(retry: RetryPolicy) -> Self {
        Self { retry }
    }

    /// Turns the GPS receiver on, polls it for a fix and turns it off again.
    ///
    /// The receiver is switched off exactly once, whether a fix was found or not.
    pub fn acquire_fix<M: ModemHw>(&self, modem: &mut M) -> Option<GpsFix> {
        info!("Retrieving GPS coordinates...");
        let outcome = modem.call(GPS_POWER_ON, "OK");
        if !outcome.is_matched() {
            warn!("Failed to turn on GPS receiver: {}", outcome);
        }
        modem.delay(self.retry.gps_settle());

        let fix = self.poll_fix(modem);

        let outcome = modem.call(GPS_POWER_OFF, "OK");
        if !outcome.is_matched() {
            warn!("Failed to turn off GPS receiver: {}", outcome);
        }
        fix
    }

    fn poll_fix<M: ModemHw>(&self, modem: &mut M) -> Option<GpsFix> {
        let attempts = self.retry.gps_attempts;
        for attempt in 1..=attempts {
            let response = modem.query(GPS_INFO, self.retry.gps_query_window());
            match GpsFix::from_response(&response) {
                Ok(Some(fix)) => {
                    info!(
                        "GPS fix: {}, {} at {}",
                        fix.latitude.as_str(),
                        fix.longitude.as_str(),
                        fix.timestamp.as_str()
                    );
                    return Some(fix);
                }
                Ok(None) => warn!("GPS is not ready ({}/{})", attempt, attempts),
                Err(err) => warn!(
                    "Failed to parse GPS data ({}/{}): {}, {}",
                    attempt, attempts, err, response
                ),
            }
            if attempt < attempts {
                modem.delay(self.retry.gps_retry_delay());
            }
        }
        warn!("GPS positioning failed, please check the GPS antenna");
        None
    }
}
