pub mod gps;
pub mod hw;
pub mod lifecycle;
pub mod network;
pub mod sms;
