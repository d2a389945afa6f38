use embassy_time::{Duration, Instant};

/// Raw byte link to the modem, usually a UART.
///
/// Neither method waits for the device. Timing is the caller's job, see
/// [`AtEngine`](super::engine::AtEngine).
pub trait Transport {
    /// Write bytes to the TX part of the link.
    fn write(&mut self, bytes: &[u8]) -> crate::Result<()>;

    /// Copy whatever is already buffered on the RX side into `buf` and return the number of bytes
    /// copied. Returns `Ok(0)` when nothing has arrived, it never blocks.
    fn read_available(&mut self, buf: &mut [u8]) -> crate::Result<usize>;
}

/// Wall clock and delay source used for every timeout and wait in the crate.
pub trait Clock {
    fn now(&self) -> Instant;

    /// Blocks for `duration`.
    fn delay(&mut self, duration: Duration);
}
