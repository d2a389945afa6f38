use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Common error: {0}")]
    CommonError(#[from] simtrack_common::error::Error),
    #[error("Cannot open serial port: {0}")]
    ConnectionError(String),
    #[error("Invalid configuration: {0}")]
    ConfigError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
