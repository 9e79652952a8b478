use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use embassy_executor::{task, Spawner};
use embassy_time::{Duration, Instant, Timer};
use mirror_clock_common::Watchdog;

/// Exit code of the simulator when the watchdog fires.
pub const WATCHDOG_EXIT_CODE: i32 = 3;

const CHECK_INTERVAL_MS: u64 = 50;

static WATCHDOG_ENABLED: AtomicBool = AtomicBool::new(false);
static WATCHDOG_TIMEOUT_MS: AtomicU32 = AtomicU32::new(0);
static WATCHDOG_DEADLINE_MS: AtomicU64 = AtomicU64::new(u64::MAX);

/// Host stand-in for the on-chip watchdog. The countdown lives in statics so
/// the monitor task sees every feed.
pub struct SimulatedWdt {
    _private: (),
}

impl SimulatedWdt {
    pub fn new(timeout_ms: u32) -> Self {
        WATCHDOG_TIMEOUT_MS.store(timeout_ms, Ordering::SeqCst);
        Self { _private: () }
    }

    fn rearm() {
        let timeout = u64::from(WATCHDOG_TIMEOUT_MS.load(Ordering::SeqCst));
        let deadline = Instant::now().as_millis().saturating_add(timeout);
        WATCHDOG_DEADLINE_MS.store(deadline, Ordering::SeqCst);
    }
}

impl Watchdog for SimulatedWdt {
    type Error = core::convert::Infallible;

    fn feed(&mut self) -> Result<(), Self::Error> {
        if WATCHDOG_ENABLED.load(Ordering::SeqCst) {
            check_expiry();
            Self::rearm();
            log::trace!("Watchdog fed");
        }
        Ok(())
    }

    fn enable(&mut self) -> Result<(), Self::Error> {
        Self::rearm();
        WATCHDOG_ENABLED.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn disable(&mut self) -> Result<(), Self::Error> {
        WATCHDOG_ENABLED.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn get_timeout(&self) -> Result<u32, Self::Error> {
        Ok(WATCHDOG_TIMEOUT_MS.load(Ordering::SeqCst))
    }

    fn set_timeout(&mut self, timeout_ms: u32) -> Result<(), Self::Error> {
        WATCHDOG_TIMEOUT_MS.store(timeout_ms, Ordering::SeqCst);
        Self::rearm();
        log::debug!("Watchdog timeout set to {} ms", timeout_ms);
        Ok(())
    }
}

/// Resets the simulator once the deadline has passed.
fn check_expiry() {
    if !WATCHDOG_ENABLED.load(Ordering::SeqCst) {
        return;
    }
    if Instant::now().as_millis() > WATCHDOG_DEADLINE_MS.load(Ordering::SeqCst) {
        log::error!("Watchdog expired, resetting");
        std::process::exit(WATCHDOG_EXIT_CODE);
    }
}

#[task]
async fn watchdog_task() {
    loop {
        Timer::after(Duration::from_millis(CHECK_INTERVAL_MS)).await;
        check_expiry();
    }
}

pub fn start_watchdog(spawner: &Spawner) {
    spawner.spawn(watchdog_task()).ok();
}
