use mirror_clock_common::*;

/// Owns the hardware watchdog and switches it between the normal timeout and
/// the longer one used while a firmware image is being written.
pub struct WatchdogManager<W: Watchdog> {
    wdt: W,
    initialized: bool,
    timeout_ms: u32,
    session_timeout_ms: Option<u32>,
}

impl<W: Watchdog> WatchdogManager<W> {
    pub fn new(wdt: W, timeout_ms: u32) -> Self {
        Self {
            wdt,
            initialized: false,
            timeout_ms,
            session_timeout_ms: None,
        }
    }

    pub fn initialize(&mut self) -> SystemResult<()> {
        info!("Initializing watchdog manager");

        self.wdt
            .set_timeout(self.timeout_ms)
            .map_err(|_| SystemError::HardwareError(HardwareError::NotInitialized))?;
        self.wdt
            .enable()
            .map_err(|_| SystemError::HardwareError(HardwareError::NotInitialized))?;
        self.wdt
            .feed()
            .map_err(|_| SystemError::HardwareError(HardwareError::NotInitialized))?;

        self.initialized = true;

        info!("Watchdog initialized with {}ms timeout", self.timeout_ms);

        Ok(())
    }

    pub fn feed(&mut self) {
        if !self.initialized {
            return;
        }

        self.wdt.feed().ok();
    }

    /// Replaces the normal timeout with `timeout_ms` until
    /// [`end_session`](Self::end_session).
    pub fn begin_session(&mut self, timeout_ms: u32) {
        if !self.initialized {
            return;
        }

        self.wdt.disable().ok();
        self.wdt.set_timeout(timeout_ms).ok();
        self.wdt.enable().ok();
        self.wdt.feed().ok();
        self.session_timeout_ms = Some(timeout_ms);

        info!("Watchdog session started with {}ms timeout", timeout_ms);
    }

    /// Pushes the session deadline out by a full timeout.
    pub fn extend(&mut self) {
        if self.session_timeout_ms.is_none() {
            warn!("Watchdog extended outside of a session");
        }
        self.feed();
    }

    pub fn end_session(&mut self) {
        if self.session_timeout_ms.take().is_none() {
            return;
        }

        self.wdt.disable().ok();
        self.wdt.set_timeout(self.timeout_ms).ok();
        self.wdt.enable().ok();
        self.wdt.feed().ok();

        info!("Watchdog restored to {}ms timeout", self.timeout_ms);
    }

    pub fn in_session(&self) -> bool {
        self.session_timeout_ms.is_some()
    }

    /// Timeout currently programmed into the hardware.
    pub fn current_timeout_ms(&self) -> u32 {
        self.session_timeout_ms.unwrap_or(self.timeout_ms)
    }

    pub fn device(&self) -> &W {
        &self.wdt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingWdt {
        timeout_ms: u32,
        enabled: bool,
        feeds: u32,
        timeouts: Vec<u32>,
    }

    impl Watchdog for RecordingWdt {
        type Error = ();

        fn feed(&mut self) -> Result<(), ()> {
            self.feeds += 1;
            Ok(())
        }

        fn enable(&mut self) -> Result<(), ()> {
            self.enabled = true;
            Ok(())
        }

        fn disable(&mut self) -> Result<(), ()> {
            self.enabled = false;
            Ok(())
        }

        fn get_timeout(&self) -> Result<u32, ()> {
            Ok(self.timeout_ms)
        }

        fn set_timeout(&mut self, timeout_ms: u32) -> Result<(), ()> {
            self.timeout_ms = timeout_ms;
            self.timeouts.push(timeout_ms);
            Ok(())
        }
    }

    #[test]
    fn session_swaps_and_restores_timeout() {
        let mut manager = WatchdogManager::new(RecordingWdt::default(), 3000);
        manager.initialize().unwrap();

        manager.begin_session(8000);
        assert!(manager.in_session());
        assert_eq!(manager.device().timeout_ms, 8000);

        manager.extend();
        manager.end_session();

        assert!(!manager.in_session());
        assert!(manager.device().enabled);
        assert_eq!(manager.device().timeouts, [3000, 8000, 3000]);
        assert_eq!(manager.current_timeout_ms(), 3000);
    }

    #[test]
    fn uninitialized_manager_leaves_hardware_alone() {
        let mut manager = WatchdogManager::new(RecordingWdt::default(), 3000);
        manager.feed();
        manager.begin_session(8000);
        assert_eq!(manager.device().feeds, 0);
        assert!(manager.device().timeouts.is_empty());
    }
}
