#![no_std]

pub mod at;
pub mod config;
pub mod error;
pub mod sim868;
pub mod tracker;

pub type Result<T> = core::result::Result<T, error::Error>;
