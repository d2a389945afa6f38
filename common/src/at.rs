pub mod engine;
#[cfg(feature = "std")]
pub mod fake_modem;
pub mod response;
pub mod transport;
