use chrono::NaiveDateTime;
#[cfg(feature = "defmt")]
use defmt::{info, warn};
#[cfg(not(feature = "defmt"))]
use log::{info, warn};

use crate::config::ModemConfig;
use crate::error::DispatchError;
use crate::sim868::gps::{Gnss, GpsFix};
use crate::sim868::hw::{ModemHw, ModemPin};
use crate::sim868::lifecycle::{DeviceState, ModemManager};
use crate::sim868::network::NetworkReport;
use crate::sim868::sms::{Sent, SmsDispatcher, SmsMessage};

/// Summary of one [`Tracker::run`].
#[derive(Debug, PartialEq)]
pub struct RunReport {
    pub power_cycles: u32,
    pub network: crate::Result<NetworkReport>,
    pub fix: Option<GpsFix>,
    pub sms: Result<Sent, DispatchError>,
}

/// Drives one SIM868 through power-on, network attach, GPS fix and the report SMS.
pub struct Tracker<M: ModemHw, P: ModemPin> {
    modem: M,
    modem_pin: P,
    manager: ModemManager,
    gnss: Gnss,
    sms: SmsDispatcher,
}

impl<M: ModemHw, P: ModemPin> Tracker<M, P> {
    pub fn new(modem: M, modem_pin: P, config: ModemConfig) -> Self {
        let gnss = Gnss::new(config.retry);
        let sms = SmsDispatcher::new(&config.retry);
        Self {
            modem,
            modem_pin,
            manager: ModemManager::new(config),
            gnss,
            sms,
        }
    }

    pub fn state(&self) -> DeviceState {
        self.manager.state()
    }

    pub fn config(&self) -> &ModemConfig {
        self.manager.config()
    }

    pub fn modem(&self) -> &M {
        &self.modem
    }

    pub fn into_parts(self) -> (M, P) {
        (self.modem, self.modem_pin)
    }

    /// Blocks until the modem answers, see [`ModemManager::turn_on`].
    pub fn turn_on(&mut self) -> u32 {
        self.manager.turn_on(&mut self.modem, &mut self.modem_pin)
    }

    pub fn attach_network(&mut self) -> crate::Result<NetworkReport> {
        self.manager.attach_network(&mut self.modem)
    }

    pub fn acquire_fix(&mut self) -> Option<GpsFix> {
        self.gnss.acquire_fix(&mut self.modem)
    }

    pub fn send_sms(&mut self, message: &SmsMessage) -> Result<Sent, DispatchError> {
        self.sms.send(&mut self.modem, message)
    }

    /// Runs the whole pipeline once and reports what happened.
    ///
    /// Nothing here is fatal. Without a fix the fallback message is sent, a failed SMS ends up
    /// in [`RunReport::sms`].
    pub fn run<F>(&mut self, temperature: f32, local_time: F) -> RunReport
    where
        F: FnOnce() -> NaiveDateTime,
    {
        let power_cycles = self.turn_on();
        let network = self.attach_network();
        if let Err(err) = &network {
            warn!("Network attach failed: {}", err);
        }

        let fix = self.acquire_fix();
        let sms = SmsMessage::compose(
            self.config().phone_number.as_str(),
            temperature,
            fix.as_ref(),
            local_time,
        )
        .map_err(DispatchError::InvalidMessage)
        .and_then(|message| self.send_sms(&message));
        match &sms {
            Ok(_) => info!("Report sent"),
            Err(err) => warn!("Report not sent: {}", err),
        }

        RunReport {
            power_cycles,
            network,
            fix,
            sms,
        }
    }
}
