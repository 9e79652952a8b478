use core::net::Ipv4Addr;

use embedded_hal::delay::DelayNs;
use mirror_clock_common::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectOutcome {
    Connected,
    Exhausted,
}

/// Bounded association with the configured access point.
pub struct NetworkConnector<W: WifiLink> {
    link: W,
}

impl<W: WifiLink> NetworkConnector<W> {
    pub fn new(link: W) -> Self {
        Self { link }
    }

    /// Starts association and polls the link at most `max_attempts` times,
    /// `interval_ms` apart. `on_attempt` runs before every poll with the
    /// 1-based attempt number so the caller can draw progress and feed the
    /// watchdog.
    pub fn connect<D, F>(
        &mut self,
        ssid: &str,
        password: &str,
        max_attempts: u8,
        interval_ms: u32,
        delay: &mut D,
        mut on_attempt: F,
    ) -> ConnectOutcome
    where
        D: DelayNs,
        F: FnMut(u8),
    {
        info!("Connecting to {}", ssid);

        if self.link.begin(ssid, password).is_err() {
            warn!("WiFi link refused to start association");
            return ConnectOutcome::Exhausted;
        }

        for attempt in 1..=max_attempts {
            on_attempt(attempt);

            match self.link.status() {
                LinkStatus::Connected => {
                    info!("WiFi connected after {} attempts", attempt);
                    return ConnectOutcome::Connected;
                }
                status => debug!("Attempt {}/{}: {:?}", attempt, max_attempts, status),
            }

            if attempt < max_attempts {
                delay.delay_ms(interval_ms);
            }
        }

        warn!("WiFi not connected after {} attempts", max_attempts);
        ConnectOutcome::Exhausted
    }

    pub fn is_connected(&self) -> bool {
        self.link.status() == LinkStatus::Connected
    }

    pub fn local_address(&self) -> Option<Ipv4Addr> {
        self.link.local_address()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;
    use embedded_hal_mock::eh1::delay::NoopDelay;

    struct ScriptedLink {
        polls: Cell<u32>,
        connect_on: Option<u32>,
    }

    impl ScriptedLink {
        fn new(connect_on: Option<u32>) -> Self {
            Self {
                polls: Cell::new(0),
                connect_on,
            }
        }
    }

    impl WifiLink for ScriptedLink {
        type Error = ();

        fn begin(&mut self, _ssid: &str, _password: &str) -> Result<(), ()> {
            Ok(())
        }

        fn status(&self) -> LinkStatus {
            let poll = self.polls.get() + 1;
            self.polls.set(poll);
            match self.connect_on {
                Some(n) if poll >= n => LinkStatus::Connected,
                _ => LinkStatus::Connecting,
            }
        }

        fn local_address(&self) -> Option<Ipv4Addr> {
            None
        }
    }

    #[test]
    fn gives_up_after_exactly_max_attempts() {
        let mut connector = NetworkConnector::new(ScriptedLink::new(None));
        let mut reported = std::vec::Vec::new();

        let outcome = connector.connect("home", "secret", 10, 500, &mut NoopDelay::new(), |n| {
            reported.push(n)
        });

        assert_eq!(outcome, ConnectOutcome::Exhausted);
        assert_eq!(connector.link.polls.get(), 10);
        assert_eq!(reported, (1..=10).collect::<std::vec::Vec<u8>>());
        assert!(!connector.is_connected());
    }

    #[test]
    fn stops_polling_once_connected() {
        let mut connector = NetworkConnector::new(ScriptedLink::new(Some(3)));

        let outcome = connector.connect("home", "secret", 10, 500, &mut NoopDelay::new(), |_| {});

        assert_eq!(outcome, ConnectOutcome::Connected);
        assert_eq!(connector.link.polls.get(), 3);
        assert!(connector.is_connected());
    }

    #[test]
    fn refused_association_makes_no_attempts() {
        struct DeadLink;
        impl WifiLink for DeadLink {
            type Error = ();
            fn begin(&mut self, _: &str, _: &str) -> Result<(), ()> {
                Err(())
            }
            fn status(&self) -> LinkStatus {
                LinkStatus::Failed
            }
            fn local_address(&self) -> Option<Ipv4Addr> {
                None
            }
        }

        let mut attempts = 0;
        let outcome = NetworkConnector::new(DeadLink).connect(
            "home",
            "secret",
            10,
            500,
            &mut NoopDelay::new(),
            |_| attempts += 1,
        );
        assert_eq!(outcome, ConnectOutcome::Exhausted);
        assert_eq!(attempts, 0);
    }
}
