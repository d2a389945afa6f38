#[cfg(feature = "defmt")]
use defmt::{info, warn};
#[cfg(not(feature = "defmt"))]
use log::{info, warn};

use crate::config::ModemConfig;
use crate::sim868::hw::{ModemHw, ModemPin};

/// Answer the modem gives to the liveness probe once it is up.
pub const READY_TOKEN: &str = "OK";
const ECHO_ON: &str = "ATE1";
const LIVENESS_PROBE: &str = "AT";

/// Where the modem is in its bring-up.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceState {
    #[default]
    Off,
    PowerCycling,
    Probing,
    Ready,
    NetworkAttached,
}

/// Manages the SIM868 power state and its network connection.
pub struct ModemManager {
    config: ModemConfig,
    state: DeviceState,
    power_cycles: u32,
}

impl ModemManager {
    pub fn new(config: ModemConfig) -> Self {
        Self {
            config,
            state: DeviceState::Off,
            power_cycles: 0,
        }
    }

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn config(&self) -> &ModemConfig {
        &self.config
    }

    /// Number of power pulses issued so far.
    pub fn power_cycles(&self) -> u32 {
        self.power_cycles
    }

    pub(crate) fn set_state(&mut self, state: DeviceState) {
        self.state = state;
    }

    /// Powers on the modem and waits until it answers the liveness probe.
    ///
    /// There is no upper bound on the number of attempts, cold boot of the modem takes an
    /// unknown amount of time. Returns the number of power cycles it took.
    pub fn turn_on<M: ModemHw, P: ModemPin>(&mut self, modem: &mut M, modem_pin: &mut P) -> u32 {
        let start = self.power_cycles;
        while !matches!(self.state, DeviceState::Ready | DeviceState::NetworkAttached) {
            self.step(modem, modem_pin);
        }
        self.power_cycles - start
    }

    /// Performs a single transition of the bring-up state machine and returns the new state.
    ///
    /// `Ready` and `NetworkAttached` are final, stepping them does nothing.
    pub fn step<M: ModemHw, P: ModemPin>(
        &mut self,
        modem: &mut M,
        modem_pin: &mut P,
    ) -> DeviceState {
        let retry = self.config.retry;
        self.state = match self.state {
            DeviceState::Off => DeviceState::PowerCycling,
            DeviceState::PowerCycling => {
                self.power_cycles += 1;
                info!("Toggling SIM868 power, attempt {}", self.power_cycles);
                modem_pin.set_high();
                modem.delay(retry.power_pulse());
                modem_pin.set_low();
                modem.delay(retry.power_settle());
                DeviceState::Probing
            }
            DeviceState::Probing => {
                // Also swallows the echo, so it cannot leak into the probe response.
                let _ = modem.query(ECHO_ON, retry.echo_delay());
                let outcome = modem.send(LIVENESS_PROBE, READY_TOKEN, retry.probe_timeout());
                if outcome.is_matched() {
                    info!("SIM868 is ready");
                    DeviceState::Ready
                } else {
                    warn!("SIM868 is starting up, please wait... ({})", outcome);
                    modem.delay(retry.startup_retry_delay());
                    DeviceState::PowerCycling
                }
            }
            state @ (DeviceState::Ready | DeviceState::NetworkAttached) => state,
        };
        self.state
    }
}

#[cfg(feature = "std")]
#[cfg(test)]
mod test {
    use super::*;
    use crate::at::fake_modem::{FakeModem, FakePin};
    use embassy_time::Duration;

    #[test]
    fn test_step_transitions() {
        let mut modem = FakeModem::new(&[("ATE1", "ATE1\r\r\nOK\r\n"), ("AT", "AT\r\r\nOK\r\n")]);
        let mut pin = FakePin::default();
        let mut manager = ModemManager::new(ModemConfig::default());

        assert_eq!(manager.state(), DeviceState::Off);
        assert_eq!(manager.step(&mut modem, &mut pin), DeviceState::PowerCycling);
        assert_eq!(manager.step(&mut modem, &mut pin), DeviceState::Probing);
        assert_eq!(pin.levels(), &[true, false]);
        assert_eq!(
            modem.delays(),
            &[Duration::from_secs(2), Duration::from_secs(8)]
        );
        assert_eq!(manager.step(&mut modem, &mut pin), DeviceState::Ready);
        assert_eq!(manager.step(&mut modem, &mut pin), DeviceState::Ready);
        assert!(modem.all_done());
    }

    #[test]
    fn test_turn_on_retries_until_ready() {
        let mut modem = FakeModem::new(&[
            ("ATE1", ""),
            ("AT", ""),
            ("ATE1", "\u{0}\u{ff}"),
            ("AT", "garbage"),
            ("ATE1", "RDY\r\n"),
            ("AT", "ERROR\r\n"),
            ("ATE1", "ATE1\r\r\nOK\r\n"),
            ("AT", "AT\r\r\nOK\r\n"),
        ]);
        let mut pin = FakePin::default();
        let mut manager = ModemManager::new(ModemConfig::default());

        assert_eq!(manager.turn_on(&mut modem, &mut pin), 4);
        assert_eq!(manager.state(), DeviceState::Ready);
        assert_eq!(pin.pulses(), 4);
        assert!(modem.all_done());
        // Pulse and settle on every attempt, retry delay after each failed probe.
        assert_eq!(modem.delays().len(), 4 * 2 + 3);
    }

    #[test]
    fn test_turn_on_when_ready_is_noop() {
        let mut modem = FakeModem::new(&[]);
        let mut pin = FakePin::default();
        let mut manager = ModemManager::new(ModemConfig::default());
        manager.set_state(DeviceState::Ready);

        assert_eq!(manager.turn_on(&mut modem, &mut pin), 0);
        assert!(pin.levels().is_empty());
    }
}
