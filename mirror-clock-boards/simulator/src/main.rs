mod config;
mod drivers;

use std::path::PathBuf;

use embassy_executor::Spawner;
use embassy_time::{Delay, Instant, Timer};
use mirror_clock_common::*;
use mirror_clock_core::storage::FlashImageWriter;
use mirror_clock_core::Device;
use simulated_rtc::SimulatedRtc;
use simulated_wdt::SimulatedWdt;

use config::SimulatorConfig;
use drivers::{ConsoleDisplay, HttpServer, SimulatedFlash, SimulatedWifi};

/// Main loop period.
const TICK_MS: u64 = 10;
/// Main loop period while an upload body is streaming in.
const UPLOAD_TICK_MS: u64 = 1;

pub struct SimulatorPlatform;

impl PlatformTrait for SimulatorPlatform {
    type TimeSourceDevice = SimulatedRtc;

    type DisplayDevice = ConsoleDisplay;

    type WifiDevice = SimulatedWifi;

    type WatchdogDevice = SimulatedWdt;

    type FirmwareDevice = FlashImageWriter<SimulatedFlash>;

    fn sys_reset() -> ! {
        info!("Simulator platform reset");
        std::process::exit(0)
    }
}

impl SimulatorPlatform {
    fn init(spawner: &Spawner, config: &SimulatorConfig) -> std::io::Result<PlatformContext<Self>> {
        let wdt = SimulatedWdt::new(config.device.watchdog.timeout_ms);
        simulated_wdt::start_watchdog(spawner);

        let rtc = if config.rtc_detached {
            SimulatedRtc::detached()
        } else {
            SimulatedRtc::new(config.device.timezone_hours, config.rtc_seed_from_host)
        };

        let flash = match &config.flash_file {
            Some(path) => SimulatedFlash::with_mirror(config.flash_size, path)?,
            None => SimulatedFlash::new(config.flash_size),
        };

        Ok(PlatformContext {
            time_source: rtc,
            display: ConsoleDisplay::new(),
            wifi: SimulatedWifi::new(config.wifi_connect_after, config.wifi_address),
            sys_watch_dog: wdt,
            firmware: FlashImageWriter::new(flash, config.image_slot, config.image_region_len()),
        })
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = match SimulatorConfig::load(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return;
        }
    };

    let mut server = match HttpServer::bind(&config.listen) {
        Ok(server) => server,
        Err(e) => {
            error!("Cannot listen on {}: {}", config.listen, e);
            return;
        }
    };

    let platform_ctx = match SimulatorPlatform::init(&spawner, &config) {
        Ok(ctx) => ctx,
        Err(e) => {
            error!("Platform init failed: {}", e);
            return;
        }
    };

    let mut device = Device::new(platform_ctx, config.device);
    if let Err(e) = device.initialize() {
        error!("Main task error: {:?}", e);
        return;
    }

    device.boot(&mut Delay);

    loop {
        device.tick(Instant::now(), &mut server);
        let period = if server.upload_in_flight() {
            UPLOAD_TICK_MS
        } else {
            TICK_MS
        };
        Timer::after_millis(period).await;
    }
}
