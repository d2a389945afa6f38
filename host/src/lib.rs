pub mod config;
pub mod error;
pub mod sensor;
pub mod serial;

pub type Result<T> = std::result::Result<T, error::Error>;
