use embassy_time::Duration;

use crate::at::{
    engine::AtEngine,
    response::{CommandOutcome, ResponseBuffer},
    transport::{Clock, Transport},
};

/// What the SIM868 components need from the AT layer.
///
/// Implemented by [`AtEngine`] for real hardware and by `FakeModem` in tests.
pub trait ModemHw {
    /// Default timeout for a command, used by [`ModemHw::call`].
    fn default_timeout(&self) -> Duration;

    /// Sends `command` and waits up to `timeout` for `expect` to appear in the response.
    fn send(&mut self, command: &str, expect: &str, timeout: Duration) -> CommandOutcome;

    /// Like [`ModemHw::send`] with the default timeout.
    fn call(&mut self, command: &str, expect: &str) -> CommandOutcome {
        let timeout = self.default_timeout();
        self.send(command, expect, timeout)
    }

    /// Waits up to `timeout` for `expect` without sending anything.
    fn wait_for(&mut self, expect: &str, timeout: Duration) -> CommandOutcome;

    /// Sends `command` and returns everything received during `window`.
    fn query(&mut self, command: &str, window: Duration) -> ResponseBuffer;

    /// Writes raw bytes, no line terminator is added.
    fn write_raw(&mut self, bytes: &[u8]) -> crate::Result<()>;

    fn delay(&mut self, duration: Duration);
}

impl<T: Transport, C: Clock> ModemHw for AtEngine<T, C> {
    fn default_timeout(&self) -> Duration {
        AtEngine::default_timeout(self)
    }

    fn send(&mut self, command: &str, expect: &str, timeout: Duration) -> CommandOutcome {
        AtEngine::send(self, command, expect, timeout)
    }

    fn wait_for(&mut self, expect: &str, timeout: Duration) -> CommandOutcome {
        AtEngine::wait_for(self, expect, timeout)
    }

    fn query(&mut self, command: &str, window: Duration) -> ResponseBuffer {
        AtEngine::query(self, command, window)
    }

    fn write_raw(&mut self, bytes: &[u8]) -> crate::Result<()> {
        AtEngine::write_raw(self, bytes)
    }

    fn delay(&mut self, duration: Duration) {
        AtEngine::delay(self, duration)
    }
}

/// Trait for controlling the modem power pin.
pub trait ModemPin {
    /// Sets the pin output to high.
    fn set_high(&mut self);
    /// Sets the pin output to low.
    fn set_low(&mut self);
}
