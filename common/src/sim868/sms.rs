use core::str::FromStr;

use chrono::{Datelike, NaiveDateTime, Timelike};
#[cfg(feature = "defmt")]
use defmt::{error, info, warn};
use embassy_time::Duration;
use heapless::{String, format};
#[cfg(not(feature = "defmt"))]
use log::{error, info, warn};

use crate::at::response::AT_COMMAND_SIZE;
use crate::config::RetryPolicy;
pub use crate::error::DispatchError;
use crate::error::Error;
use crate::sim868::gps::GpsFix;
use crate::sim868::hw::ModemHw;

/// Ctrl-Z, ends the message body in text mode.
pub const SMS_TERMINATOR: u8 = 0x1A;
pub const SMS_BODY_SIZE: usize = 256;
pub const PHONE_NUMBER_SIZE: usize = 20;
const TEXT_MODE: &str = "AT+CMGF=1";
const ADDRESSING_PROMPT: &str = ">";
const CONFIRMATION: &str = "+CMGS:";

/// The message was handed over to the modem.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Sent {
    /// Message reference from `+CMGS`, `None` if the confirmation did not arrive.
    pub reference: Option<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SmsMessage {
    destination: String<PHONE_NUMBER_SIZE>,
    body: String<SMS_BODY_SIZE>,
}

impl SmsMessage {
    pub fn new(destination: &str, body: &str) -> crate::Result<Self> {
        Ok(Self {
            destination: String::from_str(destination).map_err(|_| Error::BufferTooSmallError)?,
            body: String::from_str(body).map_err(|_| Error::BufferTooSmallError)?,
        })
    }

    /// Composes the location report.
    ///
    /// `local_time` is only called when there is no fix.
    pub fn compose<F>(
        destination: &str,
        temperature: f32,
        fix: Option<&GpsFix>,
        local_time: F,
    ) -> crate::Result<Self>
    where
        F: FnOnce() -> NaiveDateTime,
    {
        let body = match fix {
            Some(fix) => format!(
                SMS_BODY_SIZE;
                "Temperature: {temperature:.1} C\nGPS Coordinates:\nLatitude: {}\nLongitude: {}\nTimestamp: {}",
                fix.latitude, fix.longitude, fix.timestamp
            ),
            None => {
                let time = local_time();
                format!(
                    SMS_BODY_SIZE;
                    "Temperature: {temperature:.1} C\nFailed to obtain GPS data. Time: {:04}-{:02}-{:02} {:02}:{:02}:{:02}\nRetrying in 5 minutes",
                    time.year(),
                    time.month(),
                    time.day(),
                    time.hour(),
                    time.minute(),
                    time.second()
                )
            }
        }
        .map_err(|_| Error::BufferTooSmallError)?;
        Ok(Self {
            destination: String::from_str(destination).map_err(|_| Error::BufferTooSmallError)?,
            body,
        })
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn addressing_command(&self) -> crate::Result<String<AT_COMMAND_SIZE>> {
        Ok(format!(AT_COMMAND_SIZE; "AT+CMGS=\"{}\"", self.destination)?)
    }
}

/// Sends text-mode SMS messages.
pub struct SmsDispatcher {
    confirmation_timeout: Duration,
}

impl SmsDispatcher {
    pub fn new(retry: &RetryPolicy) -> Self {
        Self {
            confirmation_timeout: retry.sms_confirmation_timeout(),
        }
    }

    pub fn send<M: ModemHw>(
        &self,
        modem: &mut M,
        message: &SmsMessage,
    ) -> Result<Sent, DispatchError> {
        let addressing = message.addressing_command().map_err(DispatchError::InvalidMessage)?;

        let outcome = modem.call(TEXT_MODE, "OK");
        if !outcome.is_matched() {
            error!("Failed to set SMS text mode: {}", outcome);
            return Err(DispatchError::ModeSetFailed(outcome.kind()));
        }

        let outcome = modem.call(&addressing, ADDRESSING_PROMPT);
        if !outcome.is_matched() {
            error!("Failed to address SMS to {}: {}", message.destination(), outcome);
            return Err(DispatchError::AddressingFailed(outcome.kind()));
        }

        modem.write_raw(message.body().as_bytes()).map_err(|err| {
            error!("Failed to write SMS body: {}", err);
            DispatchError::BodyWriteFailed
        })?;
        modem.write_raw(&[SMS_TERMINATOR]).map_err(|err| {
            error!("Failed to terminate SMS body: {}", err);
            DispatchError::BodyWriteFailed
        })?;

        let outcome = modem.wait_for(CONFIRMATION, self.confirmation_timeout);
        let reference = outcome
            .response()
            .filter(|_| outcome.is_matched())
            .and_then(|response| response.command_response("CMGS"))
            .and_then(|response| response.parse1::<u8>([0]).ok());
        match reference {
            Some(reference) => info!("SMS sent to {}, reference {}", message.destination(), reference),
            None => warn!(
                "SMS to {} submitted without confirmation: {}",
                message.destination(),
                outcome
            ),
        }
        Ok(Sent { reference })
    }
}
