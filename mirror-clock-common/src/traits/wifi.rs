use core::net::Ipv4Addr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkStatus {
    Idle,
    Connecting,
    Connected,
    Failed,
}

/// Station mode wireless link.
///
/// `begin` only starts the association; progress is observed by polling
/// `status`, which must not block.
pub trait WifiLink {
    type Error;

    fn begin(&mut self, ssid: &str, password: &str) -> Result<(), Self::Error>;

    fn status(&self) -> LinkStatus;

    fn local_address(&self) -> Option<Ipv4Addr>;
}

/// Link for boards without a radio.
pub struct NoWifi;

impl WifiLink for NoWifi {
    type Error = core::convert::Infallible;

    fn begin(&mut self, _ssid: &str, _password: &str) -> Result<(), Self::Error> {
        Ok(())
    }

    fn status(&self) -> LinkStatus {
        LinkStatus::Idle
    }

    fn local_address(&self) -> Option<Ipv4Addr> {
        None
    }
}
