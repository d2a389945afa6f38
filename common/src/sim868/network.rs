#[cfg(feature = "defmt")]
use defmt::{debug, info, warn};
use heapless::{String, Vec, format};
#[cfg(not(feature = "defmt"))]
use log::{debug, info, warn};

use crate::at::response::{AT_COMMAND_SIZE, CommandOutcome, OutcomeKind};
use crate::sim868::hw::ModemHw;
use crate::sim868::lifecycle::{DeviceState, ModemManager};

const REGISTRATION_QUERY: &str = "AT+CGREG?";
/// `+CGREG: <n>,<stat>` with `stat` 1, registered to the home network.
const REGISTERED_STATUS: &str = "0,1";

/// One step of the fixed bring-up sequence that follows network registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BringUpStep {
    SimStatus,
    SignalQuality,
    Operator,
    AttachStatus,
    PdpContext,
    SetApn,
    ActivateBearer,
    LocalIp,
}

impl BringUpStep {
    /// All steps, in the order they are sent.
    pub const ALL: [BringUpStep; 8] = [
        BringUpStep::SimStatus,
        BringUpStep::SignalQuality,
        BringUpStep::Operator,
        BringUpStep::AttachStatus,
        BringUpStep::PdpContext,
        BringUpStep::SetApn,
        BringUpStep::ActivateBearer,
        BringUpStep::LocalIp,
    ];

    pub fn command(&self, apn: &str) -> crate::Result<String<AT_COMMAND_SIZE>> {
        let command = match self {
            BringUpStep::SimStatus => format!(AT_COMMAND_SIZE; "AT+CPIN?")?,
            BringUpStep::SignalQuality => format!(AT_COMMAND_SIZE; "AT+CSQ")?,
            BringUpStep::Operator => format!(AT_COMMAND_SIZE; "AT+COPS?")?,
            BringUpStep::AttachStatus => format!(AT_COMMAND_SIZE; "AT+CGATT?")?,
            BringUpStep::PdpContext => format!(AT_COMMAND_SIZE; "AT+CGDCONT?")?,
            BringUpStep::SetApn => format!(AT_COMMAND_SIZE; "AT+CSTT=\"{apn}\"")?,
            BringUpStep::ActivateBearer => format!(AT_COMMAND_SIZE; "AT+CIICR")?,
            BringUpStep::LocalIp => format!(AT_COMMAND_SIZE; "AT+CIFSR")?,
        };
        Ok(command)
    }

    pub fn expect(&self) -> &'static str {
        match self {
            BringUpStep::SimStatus => "READY",
            // The modem answers with a bare dotted address, there is no OK.
            BringUpStep::LocalIp => ".",
            _ => "OK",
        }
    }
}

/// What happened during [`ModemManager::attach_network`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkReport {
    pub registered: bool,
    pub registration_attempts: u8,
    /// RSSI reported by `+CSQ`, 0-31, 99 when unknown.
    pub rssi: Option<u8>,
    pub steps: Vec<(BringUpStep, OutcomeKind), 8>,
}

impl ModemManager {
    /// Registers to the network and brings up the packet data bearer.
    ///
    /// Registration is polled a bounded number of times. The bring-up sequence runs whether or
    /// not registration succeeded, its outcomes are only reported.
    pub fn attach_network<M: ModemHw>(&mut self, modem: &mut M) -> crate::Result<NetworkReport> {
        let (registered, registration_attempts) = self.poll_registration(modem);

        let apn = self.config().apn.clone();
        let mut report = NetworkReport {
            registered,
            registration_attempts,
            rssi: None,
            steps: Vec::new(),
        };
        for step in BringUpStep::ALL {
            let command = step.command(&apn)?;
            let outcome = modem.call(&command, step.expect());
            debug!("{:?}: {}", step, outcome);
            if step == BringUpStep::SignalQuality {
                report.rssi = Self::signal_quality(&outcome);
            }
            // Capacity matches the number of steps.
            let _ = report.steps.push((step, outcome.kind()));
        }

        if registered {
            self.set_state(DeviceState::NetworkAttached);
        }
        Ok(report)
    }

    fn poll_registration<M: ModemHw>(&self, modem: &mut M) -> (bool, u8) {
        let retry = self.config().retry;
        let attempts = retry.registration_attempts;
        for attempt in 1..=attempts {
            if modem.call(REGISTRATION_QUERY, REGISTERED_STATUS).is_matched() {
                info!("SIM868 is online");
                return (true, attempt);
            }
            warn!("SIM868 is offline, please wait... ({}/{})", attempt, attempts);
            if attempt < attempts {
                modem.delay(retry.registration_delay());
            }
        }
        warn!("Not registered after {} attempts, continuing anyway", attempts);
        (false, attempts)
    }

    /// RSSI out of `+CSQ: <rssi>,<ber>`.
    fn signal_quality(outcome: &CommandOutcome) -> Option<u8> {
        let (rssi, ber) = outcome
            .response()?
            .command_response("CSQ")?
            .parse2::<u8, u8>([0, 1])
            .ok()?;
        debug!("Signal quality: rssi {}, ber {}", rssi, ber);
        Some(rssi)
    }
}
