use crate::traits::{DisplayRenderer, FirmwareWriter, TimeSource, Watchdog, WifiLink};

/// Devices a board hands to the coordination core.
pub trait PlatformTrait: Sized {
    type TimeSourceDevice: TimeSource;

    type DisplayDevice: DisplayRenderer;

    type WifiDevice: WifiLink;

    type WatchdogDevice: Watchdog;

    type FirmwareDevice: FirmwareWriter;

    /// Resets the MCU. Never returns.
    fn sys_reset() -> !;
}

pub struct PlatformContext<P: PlatformTrait> {
    pub time_source: P::TimeSourceDevice,
    pub display: P::DisplayDevice,
    pub wifi: P::WifiDevice,
    pub sys_watch_dog: P::WatchdogDevice,
    pub firmware: P::FirmwareDevice,
}
