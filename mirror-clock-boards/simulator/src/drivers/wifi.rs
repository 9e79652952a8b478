use core::cell::Cell;
use std::net::Ipv4Addr;

use mirror_clock_common::*;

/// Station link that associates after a fixed number of status polls.
pub struct SimulatedWifi {
    connect_after: Option<u32>,
    address: Ipv4Addr,
    polls: Cell<u32>,
    started: bool,
}

impl SimulatedWifi {
    pub fn new(connect_after: Option<u32>, address: Ipv4Addr) -> Self {
        Self {
            connect_after,
            address,
            polls: Cell::new(0),
            started: false,
        }
    }

    fn associated(&self) -> bool {
        self.started
            && self
                .connect_after
                .is_some_and(|after| self.polls.get() >= after)
    }
}

impl WifiLink for SimulatedWifi {
    type Error = NetworkError;

    fn begin(&mut self, ssid: &str, _password: &str) -> Result<(), Self::Error> {
        if ssid.is_empty() {
            return Err(NetworkError::AssociationFailed);
        }
        info!("[Simulator WiFi] Joining {}", ssid);
        self.started = true;
        self.polls.set(0);
        Ok(())
    }

    fn status(&self) -> LinkStatus {
        if !self.started {
            return LinkStatus::Idle;
        }
        if self.associated() {
            return LinkStatus::Connected;
        }

        self.polls.set(self.polls.get().saturating_add(1));
        if self.associated() {
            LinkStatus::Connected
        } else {
            LinkStatus::Connecting
        }
    }

    fn local_address(&self) -> Option<Ipv4Addr> {
        self.associated().then_some(self.address)
    }
}
