use embassy_time::Instant;
use embedded_hal::delay::DelayNs;
use mirror_clock_common::*;

use crate::managers::{DisplayManager, StatusModel, WatchdogManager};
use crate::scheduler::{Scheduler, TaskKind};
use crate::services::{ConnectOutcome, NetworkConnector, TimeService, UpdatePipeline};
use crate::{FIRMWARE_TITLE, FIRMWARE_VERSION};

/// Slice length used to keep the watchdog fed during boot pauses.
const PAUSE_SLICE_MS: u32 = 100;

/// Network side of the main loop. Called once per tick; any request it
/// accepts is handled to completion against the device before it returns.
pub trait RequestSource<P: PlatformTrait> {
    fn service(&mut self, device: &mut Device<P>, now: Instant);
}

/// Offline boards.
impl<P: PlatformTrait> RequestSource<P> for () {
    fn service(&mut self, _device: &mut Device<P>, _now: Instant) {}
}

/// The whole appliance: status model, periodic tasks, and the peripherals
/// they drive.
pub struct Device<P: PlatformTrait> {
    pub(crate) config: DeviceConfig,
    pub(crate) status: StatusModel,
    scheduler: Scheduler,
    time: TimeService<P::TimeSourceDevice>,
    pub(crate) display: DisplayManager<P::DisplayDevice>,
    pub(crate) network: NetworkConnector<P::WifiDevice>,
    pub(crate) watchdog: WatchdogManager<P::WatchdogDevice>,
    pub(crate) updates: UpdatePipeline<P::FirmwareDevice>,
    initialized: bool,
}

impl<P: PlatformTrait> Device<P> {
    pub fn new(ctx: PlatformContext<P>, config: DeviceConfig) -> Self {
        Self {
            status: StatusModel::new(config.display.initial_mode),
            scheduler: Scheduler::new(&config.schedule, config.display.demo_mode),
            time: TimeService::new(ctx.time_source),
            display: DisplayManager::new(ctx.display, FIRMWARE_VERSION),
            network: NetworkConnector::new(ctx.wifi),
            watchdog: WatchdogManager::new(ctx.sys_watch_dog, config.watchdog.timeout_ms),
            updates: UpdatePipeline::new(ctx.firmware, config.update),
            config,
            initialized: false,
        }
    }

    pub fn initialize(&mut self) -> SystemResult<()> {
        info!("Initializing {} {}", FIRMWARE_TITLE, FIRMWARE_VERSION);

        self.config.validate()?;
        self.watchdog.initialize()?;
        self.initialized = true;

        Ok(())
    }

    /// Start-up sequence: splash, first clock read, optional clock set,
    /// then the bounded Wi-Fi association with progress on screen.
    pub fn boot<D: DelayNs>(&mut self, delay: &mut D) -> ConnectOutcome {
        if !self.initialized {
            warn!("Booting before initialize, watchdog is not armed");
        }

        self.display.show(&Screen::Splash {
            title: FIRMWARE_TITLE,
            version: FIRMWARE_VERSION,
            demo: self.config.display.demo_mode,
        });
        self.pause(delay, self.config.display.splash_ms);

        if let Some(stamp) = self.config.set_time.clone() {
            let result = self.set_clock(&stamp.date, &stamp.time);
            self.display.show(&Screen::SettingTime(result));
            self.pause(delay, self.config.display.splash_ms);
        }

        self.time.refresh(&mut self.status).ok();

        let outcome = self.connect(delay);
        self.pause(delay, self.config.network.result_hold_ms);
        outcome
    }

    /// Writes a `Mmm dd yyyy` / `hh:mm:ss` stamp into the calendar clock.
    pub fn set_clock(&mut self, date: &str, time: &str) -> SetTimeResult {
        let Some(stamp) = CalendarTime::parse_build_stamp(date, time) else {
            warn!("Could not parse clock stamp {} {}", date, time);
            return SetTimeResult::ParseError;
        };

        match self.time.set_clock(&stamp) {
            Ok(()) => {
                self.status.set_time(stamp);
                SetTimeResult::Configured
            }
            Err(e) => {
                warn!("Clock write failed: {:?}", e);
                SetTimeResult::CommunicationError
            }
        }
    }

    pub fn connect<D: DelayNs>(&mut self, delay: &mut D) -> ConnectOutcome {
        let network = &self.config.network;
        let ssid = network.ssid.as_str();

        let outcome = if ssid.is_empty() {
            info!("No SSID configured, staying offline");
            ConnectOutcome::Exhausted
        } else {
            let display = &mut self.display;
            let watchdog = &mut self.watchdog;
            let max_attempts = network.max_attempts;
            self.network.connect(
                ssid,
                network.password.as_str(),
                max_attempts,
                network.attempt_interval_ms,
                delay,
                |attempt| {
                    watchdog.feed();
                    display.show(&Screen::Connecting {
                        ssid,
                        attempt,
                        max_attempts,
                    });
                },
            )
        };

        let connected = outcome == ConnectOutcome::Connected;
        self.status.set_connected(connected);
        if connected {
            self.display.show(&Screen::Connected { ssid });
        } else {
            self.display.show(&Screen::ConnectFailed { ssid });
        }
        outcome
    }

    /// One scheduler iteration: due periodic tasks in table order, the
    /// watchdog, then one poll of the network side.
    pub fn tick<R: RequestSource<P>>(&mut self, now: Instant, requests: &mut R) {
        for task in self.scheduler.due(now) {
            match task {
                TaskKind::RefreshTime => {
                    self.time.refresh(&mut self.status).ok();
                }
                TaskKind::RefreshDisplay => self.refresh_display(now),
                TaskKind::RotateMode => self.rotate_mode(now),
            }
        }

        self.watchdog.feed();
        requests.service(self, now);
    }

    /// One render pass over the current status.
    pub fn refresh_display(&mut self, now: Instant) {
        self.status.set_connected(self.network.is_connected());
        let snapshot = self.status.snapshot(now);
        self.display.render(&snapshot);
    }

    fn rotate_mode(&mut self, now: Instant) {
        if self.status.failure_hold_active(now) {
            debug!("Mode rotation held while an update failure is shown");
            return;
        }
        if self.status.activity() != Activity::Normal {
            return;
        }

        let next = self.status.display_mode().next();
        self.status.set_display_mode(next);
    }

    /// Announces the reboot on screen and resets. The caller must have
    /// flushed any pending response.
    pub fn restart(&mut self, now: Instant) -> ! {
        info!("Restarting");
        self.status.set_rebooting(true);
        self.refresh_display(now);
        P::sys_reset()
    }

    fn pause<D: DelayNs>(&mut self, delay: &mut D, ms: u32) {
        let mut remaining = ms;
        while remaining > 0 {
            let slice = remaining.min(PAUSE_SLICE_MS);
            delay.delay_ms(slice);
            self.watchdog.feed();
            remaining -= slice;
        }
    }

    pub fn status(&self) -> &StatusModel {
        &self.status
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn update_stage(&self) -> UpdateStage {
        self.updates.stage()
    }

    pub fn display(&self) -> &DisplayManager<P::DisplayDevice> {
        &self.display
    }

    pub fn watchdog(&self) -> &WatchdogManager<P::WatchdogDevice> {
        &self.watchdog
    }

    pub fn firmware(&self) -> &P::FirmwareDevice {
        self.updates.writer()
    }

    pub fn time_source(&self) -> &P::TimeSourceDevice {
        self.time.source()
    }
}
