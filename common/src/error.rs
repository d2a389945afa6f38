use thiserror::Error;

use crate::at::response::OutcomeKind;

#[derive(Debug, Error, Eq, PartialEq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    #[error("Buffer too small")]
    BufferTooSmallError,
    #[error("Cannot parse string as the given type")]
    ParseError,
    #[error("Inconsistent AT response")]
    ModemError,
    #[error("String encoding error")]
    StringEncodingError,
    #[error("UART read error")]
    UartReadError,
    #[error("UART write error")]
    UartWriteError,
    #[error("Formatting error")]
    FormatError,
}

impl From<core::fmt::Error> for Error {
    fn from(_: core::fmt::Error) -> Self {
        Error::FormatError
    }
}

/// Why an SMS could not be handed over to the modem.
#[derive(Debug, Error, Eq, PartialEq, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DispatchError {
    #[error("Cannot switch to text mode: {0:?}")]
    ModeSetFailed(OutcomeKind),
    #[error("Modem did not prompt for the message body: {0:?}")]
    AddressingFailed(OutcomeKind),
    #[error("Failed to write the message body")]
    BodyWriteFailed,
    #[error("Invalid message: {0}")]
    InvalidMessage(Error),
}
