//! Hardware watchdog abstraction.

use core::convert::Infallible;

/// A watchdog timer that resets the device unless fed before its timeout.
///
/// Implemented by the on-chip watchdog of a board or by a simulated one on
/// the host.
pub trait Watchdog {
    type Error;

    /// Restarts the countdown.
    fn feed(&mut self) -> Result<(), Self::Error>;

    fn enable(&mut self) -> Result<(), Self::Error>;

    fn disable(&mut self) -> Result<(), Self::Error>;

    /// Current timeout in milliseconds.
    fn get_timeout(&self) -> Result<u32, Self::Error>;

    fn set_timeout(&mut self, timeout_ms: u32) -> Result<(), Self::Error>;
}

/// Boards without a watchdog.
impl Watchdog for () {
    type Error = Infallible;

    fn feed(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn enable(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn disable(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn get_timeout(&self) -> Result<u32, Self::Error> {
        Ok(0)
    }

    fn set_timeout(&mut self, _timeout_ms: u32) -> Result<(), Self::Error> {
        Ok(())
    }
}
