use std::cell::Cell;
use std::marker::PhantomData;
use std::net::Ipv4Addr;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use embassy_time::{Duration, Instant};
use embedded_hal_mock::eh1::delay::NoopDelay;
use embedded_storage::nor_flash::{ErrorType, NorFlash, NorFlashErrorKind, ReadNorFlash};
use mirror_clock_common::*;
use mirror_clock_core::http::{MultipartUpload, UploadEvent};
use mirror_clock_core::services::ConnectOutcome;
use mirror_clock_core::storage::FlashImageWriter;
use mirror_clock_core::{Device, Disposition};

const CHUNK: usize = 0x1000;
const CHUNKS: usize = 16;

struct TestClock {
    time: CalendarTime,
    stopped: bool,
}

impl TimeSource for TestClock {
    fn read(&mut self) -> Result<CalendarTime, TimeSourceError> {
        if self.stopped {
            return Err(TimeSourceError::Stopped);
        }
        Ok(self.time)
    }

    fn write(&mut self, time: &CalendarTime) -> Result<(), TimeSourceError> {
        self.time = *time;
        Ok(())
    }
}

#[derive(Default)]
struct RecordingDisplay {
    screens: Vec<String>,
}

impl RecordingDisplay {
    fn last(&self) -> &str {
        self.screens.last().map(String::as_str).unwrap_or("")
    }
}

impl DisplayRenderer for RecordingDisplay {
    fn draw(&mut self, screen: &Screen<'_>) {
        self.screens.push(format!("{screen:?}"));
    }
}

/// Never associates.
#[derive(Default)]
struct DeadLink {
    polls: Cell<u32>,
}

impl WifiLink for DeadLink {
    type Error = ();

    fn begin(&mut self, _ssid: &str, _password: &str) -> Result<(), ()> {
        Ok(())
    }

    fn status(&self) -> LinkStatus {
        self.polls.set(self.polls.get() + 1);
        LinkStatus::Connecting
    }

    fn local_address(&self) -> Option<Ipv4Addr> {
        Some(Ipv4Addr::new(10, 0, 0, 7))
    }
}

/// Firmware target with 0x10000 bytes of usable capacity after the margin.
struct ScriptedFirmware {
    short_write_at: Option<usize>,
    writes: usize,
    received: usize,
    sealed: bool,
}

impl ScriptedFirmware {
    fn new(short_write_at: Option<usize>) -> Self {
        Self {
            short_write_at,
            writes: 0,
            received: 0,
            sealed: false,
        }
    }
}

impl FirmwareWriter for ScriptedFirmware {
    type Error = ();

    fn free_space(&self) -> u32 {
        0x11000
    }

    fn begin(&mut self, capacity: u32) -> Result<(), ()> {
        assert_eq!(capacity, 0x10000);
        Ok(())
    }

    fn write(&mut self, chunk: &[u8]) -> usize {
        self.writes += 1;
        let accepted = if Some(self.writes) == self.short_write_at {
            chunk.len() - 1
        } else {
            chunk.len()
        };
        self.received += accepted;
        accepted
    }

    fn finish(&mut self, declared_size: u32) -> Result<(), ()> {
        if declared_size as usize == self.received {
            self.sealed = true;
            Ok(())
        } else {
            Err(())
        }
    }

    fn abort(&mut self) {}
}

struct RamFlash(Vec<u8>);

impl ErrorType for RamFlash {
    type Error = NorFlashErrorKind;
}

impl ReadNorFlash for RamFlash {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let start = offset as usize;
        bytes.copy_from_slice(&self.0[start..start + bytes.len()]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.0.len()
    }
}

impl NorFlash for RamFlash {
    const WRITE_SIZE: usize = 4;
    const ERASE_SIZE: usize = 0x1000;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        self.0[from as usize..to as usize].fill(0xFF);
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        let start = offset as usize;
        self.0[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}

/// Watchdog on a hand-advanced clock. Remembers whether it would have fired.
#[derive(Default)]
struct TestWdt {
    clock: Rc<Cell<u64>>,
    timeout_ms: u32,
    enabled: bool,
    last_feed_ms: u64,
    fired: bool,
}

impl TestWdt {
    fn reload(&mut self) {
        self.last_feed_ms = self.clock.get();
    }
}

impl Watchdog for TestWdt {
    type Error = ();

    fn feed(&mut self) -> Result<(), ()> {
        if self.enabled && self.clock.get() - self.last_feed_ms > u64::from(self.timeout_ms) {
            self.fired = true;
        }
        self.reload();
        Ok(())
    }

    fn enable(&mut self) -> Result<(), ()> {
        self.enabled = true;
        self.reload();
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
        self.reload();
        Ok(())
    }
}

struct TestPlatform<F>(PhantomData<F>);

impl<F: FirmwareWriter> PlatformTrait for TestPlatform<F> {
    type TimeSourceDevice = TestClock;
    type DisplayDevice = RecordingDisplay;
    type WifiDevice = DeadLink;
    type WatchdogDevice = TestWdt;
    type FirmwareDevice = F;

    fn sys_reset() -> ! {
        panic!("system reset");
    }
}

fn config() -> DeviceConfig {
    let mut config = DeviceConfig::default();
    config.network.ssid = "workshop".try_into().unwrap();
    config
}

fn build<F: FirmwareWriter>(
    config: DeviceConfig,
    clock: CalendarTime,
    firmware: F,
) -> Device<TestPlatform<F>> {
    let ctx = PlatformContext {
        time_source: TestClock {
            time: clock,
            stopped: false,
        },
        display: RecordingDisplay::default(),
        wifi: DeadLink::default(),
        sys_watch_dog: TestWdt::default(),
        firmware,
    };

    let mut device = Device::new(ctx, config);
    device.initialize().unwrap();
    device
}

fn device_with<F: FirmwareWriter>(firmware: F) -> Device<TestPlatform<F>> {
    build(config(), CalendarTime::new(2026, 10, 19, 10, 0, 0, 1), firmware)
}

fn device(short_write_at: Option<usize>) -> Device<TestPlatform<ScriptedFirmware>> {
    device_with(ScriptedFirmware::new(short_write_at))
}

fn image() -> Vec<u8> {
    (0..CHUNK * CHUNKS).map(|i| (i % 253) as u8).collect()
}

/// Streams `chunks` chunks of the image, then either ends or aborts.
fn upload<F: FirmwareWriter>(device: &mut Device<TestPlatform<F>>, chunks: usize, complete: bool) {
    let now = Instant::from_millis(1_000);
    let image = image();

    device.handle_upload(UploadEvent::Start { filename: "fw.bin" }, now);
    for chunk in image.chunks(CHUNK).take(chunks) {
        device.handle_upload(UploadEvent::Data(chunk), now);
    }
    if complete {
        device.handle_upload(
            UploadEvent::End {
                total_size: (chunks * CHUNK) as u32,
            },
            now,
        );
    } else {
        device.handle_upload(UploadEvent::Aborted, now);
    }
}

#[test]
fn full_image_succeeds_and_requests_restart() {
    let mut device = device(None);

    upload(&mut device, CHUNKS, true);

    assert_eq!(device.update_stage(), UpdateStage::Succeeded);
    assert!(!device.status().update_failed());
    assert!(device.firmware().sealed);

    let (response, disposition) = device.finish_upload(Instant::from_millis(1_000));
    assert_eq!(response.body.as_str(), "Last update OK");
    assert_eq!(response.content_type, "text/plain");
    assert_eq!(disposition, Disposition::Restart);
    assert!(!device.status().is_serving_request());
    assert!(!device.status().is_updating());

    let reset = catch_unwind(AssertUnwindSafe(|| device.restart(Instant::from_millis(1_001))));
    assert!(reset.is_err());
    assert!(device.status().is_rebooting());
    assert!(device.display().renderer().last().starts_with("Rebooting"));

    let response = device.handle_update_query();
    assert_eq!(response.content_type, "text/html");
    assert!(response.body.contains("url=http://10.0.0.7"));
}

#[test]
fn short_write_on_chunk_ten_fails_the_session() {
    let mut device = device(Some(10));

    upload(&mut device, CHUNKS, true);

    assert_eq!(
        device.update_stage(),
        UpdateStage::Failed(UpdateFailure::WriteError)
    );
    assert_eq!(device.status().update_failure(), Some(UpdateFailure::WriteError));
    // chunks 11..16 never reach the target
    assert_eq!(device.firmware().writes, 10);

    let (response, disposition) = device.finish_upload(Instant::from_millis(1_000));
    assert_eq!(response.body.as_str(), "Last update FAIL");
    assert_eq!(disposition, Disposition::Keep);
}

#[test]
fn peer_abort_after_five_chunks() {
    let mut device = device(None);

    upload(&mut device, 5, false);

    assert_eq!(device.update_stage(), UpdateStage::Aborted);
    assert_eq!(device.status().update_failure(), Some(UpdateFailure::Aborted));
    assert!(!device.status().is_updating());

    let (response, disposition) = device.finish_upload(Instant::from_millis(1_000));
    assert_eq!(response.body.as_str(), "Last update FAIL");
    assert_eq!(disposition, Disposition::Keep);
    assert!(!device.status().is_rebooting());
}

#[test]
fn connect_gives_up_after_ten_attempts() {
    let mut device = device(None);

    let outcome = device.connect(&mut NoopDelay::new());

    assert_eq!(outcome, ConnectOutcome::Exhausted);
    let screens = &device.display().renderer().screens;
    let attempts = screens.iter().filter(|s| s.starts_with("Connecting")).count();
    assert_eq!(attempts, 10);
    assert!(screens.iter().any(|s| s.contains("attempt: 10, max_attempts: 10")));
    assert!(device.display().renderer().last().starts_with("ConnectFailed"));
    assert!(!device.status().is_connected());
}

#[test]
fn new_session_clears_previous_failure() {
    let mut device = device(Some(3));
    upload(&mut device, 4, true);
    assert!(device.status().update_failed());

    device.handle_upload(UploadEvent::Start { filename: "fw.bin" }, Instant::from_millis(2_000));

    assert!(!device.status().update_failed());
    assert_eq!(device.status().update_failure(), None);
    assert!(device.status().is_updating());
    assert!(device.display().renderer().last().starts_with("FirmwareUpdate"));
}

#[test]
fn failure_screen_clears_before_next_rotation() {
    let mut device = device(None);
    let start = Instant::from_millis(0);
    device.tick(start, &mut ());
    let mode = device.status().display_mode();

    upload(&mut device, 2, false);

    // failure recorded at 1 s stays up until 4 s
    let during_hold = Instant::from_millis(3_900);
    device.refresh_display(during_hold);
    assert!(device.display().renderer().last().starts_with("UpdateFailed(Aborted)"));

    device.tick(start + Duration::from_secs(30), &mut ());
    assert_eq!(device.status().display_mode(), mode.next());
    assert!(device.display().renderer().last().starts_with("Clock"));
}

#[test]
fn rotation_waits_for_failure_hold() {
    let mut config = config();
    config.schedule.mode_rotation_ms = 2_000;
    let mut device = build(
        config,
        CalendarTime::new(2026, 10, 19, 10, 0, 0, 1),
        ScriptedFirmware::new(None),
    );
    device.tick(Instant::from_millis(0), &mut ());
    let mode = device.status().display_mode();

    // aborted at 1 s, held until 4 s
    upload(&mut device, 2, false);

    device.tick(Instant::from_millis(2_000), &mut ());
    assert_eq!(device.status().display_mode(), mode);
    assert!(device.display().renderer().last().starts_with("UpdateFailed(Aborted)"));

    device.tick(Instant::from_millis(4_000), &mut ());
    assert_eq!(device.status().display_mode(), mode.next());
    assert!(device.display().renderer().last().starts_with("Clock"));
}

#[test]
fn ignored_chunks_after_failure_keep_watchdog_fed() {
    let mut device = device(Some(3));
    let clock = device.watchdog().device().clock.clone();
    let at = |ms: u64| {
        clock.set(ms);
        Instant::from_millis(ms)
    };

    let mut now_ms = 1_000;
    device.handle_upload(UploadEvent::Start { filename: "fw.bin" }, at(now_ms));
    for chunk in image().chunks(CHUNK) {
        now_ms += 500;
        device.handle_upload(UploadEvent::Data(chunk), at(now_ms));
    }

    // thirteen ignored chunks over 6.5 s on the 3 s default timeout
    assert_eq!(
        device.update_stage(),
        UpdateStage::Failed(UpdateFailure::WriteError)
    );
    assert!(!device.watchdog().in_session());
    assert_eq!(device.watchdog().current_timeout_ms(), 3_000);

    let (response, _) = device.finish_upload(at(now_ms));
    assert_eq!(response.body.as_str(), "Last update FAIL");
    device.tick(at(now_ms + 10), &mut ());

    assert!(!device.watchdog().device().fired);
}

#[test]
fn status_request_renders_transfer_icon_then_clears() {
    let mut device = device(None);
    let now = Instant::from_millis(0);
    device.tick(now, &mut ());

    let response = device.handle_status_request(now);

    assert_eq!(response.status, 200);
    assert_eq!(response.content_type, "text/html");
    assert!(response.body.contains("Time: 10:00:00"));
    assert!(response.body.contains("Network: offline"));
    assert!(device.display().renderer().last().contains("icon: Transfer"));
    assert!(!device.status().is_serving_request());
}

#[test]
fn stopped_clock_still_lets_the_tick_finish() {
    let ctx = PlatformContext {
        time_source: TestClock {
            time: CalendarTime::new(2026, 10, 19, 10, 0, 0, 1),
            stopped: true,
        },
        display: RecordingDisplay::default(),
        wifi: DeadLink::default(),
        sys_watch_dog: TestWdt::default(),
        firmware: ScriptedFirmware::new(None),
    };
    let mut device: Device<TestPlatform<ScriptedFirmware>> = Device::new(ctx, config());
    device.initialize().unwrap();
    let clock = device.watchdog().device().clock.clone();

    clock.set(500);
    device.tick(Instant::from_millis(500), &mut ());

    assert_eq!(device.status().time_fault(), Some(TimeSourceError::Stopped));
    assert_eq!(device.display().renderer().last(), "TimeFault(Stopped)");
    assert_eq!(device.watchdog().device().last_feed_ms, 500);
    assert!(!device.watchdog().device().fired);
}

#[test]
fn boot_sets_clock_from_stamp() {
    let mut config = config();
    config.set_time = Some(SetTimeConfig {
        date: "Jan 02 2027".try_into().unwrap(),
        time: "08:15:00".try_into().unwrap(),
    });
    let mut device = build(
        config,
        CalendarTime::new(2000, 1, 1, 0, 0, 0, 6),
        ScriptedFirmware::new(None),
    );

    let outcome = device.boot(&mut NoopDelay::new());

    assert_eq!(outcome, ConnectOutcome::Exhausted);
    let screens = &device.display().renderer().screens;
    assert!(screens[0].starts_with("Splash"));
    assert_eq!(screens[1], "SettingTime(Configured)");
    assert_eq!(
        device.time_source().time,
        CalendarTime::new(2027, 1, 2, 8, 15, 0, 6)
    );
}

#[test]
fn multipart_body_flashes_image_end_to_end() {
    let flash = RamFlash(vec![0; 0x12000]);
    let mut device = device_with(FlashImageWriter::new(flash, 0x1000, 0x11000));
    let now = Instant::from_millis(500);

    let image = image();
    let mut body = Vec::new();
    body.extend_from_slice(b"--frontier\r\n");
    body.extend_from_slice(
        b"Content-Disposition: form-data; name=\"update\"; filename=\"mirror.bin\"\r\n\r\n",
    );
    body.extend_from_slice(&image);
    body.extend_from_slice(b"\r\n--frontier--\r\n");

    let mut parser = MultipartUpload::new("frontier").unwrap();
    let mut sink = |event: UploadEvent<'_>| device.handle_upload(event, now);
    for piece in body.chunks(1460) {
        parser.feed(piece, &mut sink).unwrap();
    }
    assert!(parser.finish(&mut sink));

    let (response, disposition) = device.finish_upload(now);
    assert_eq!(response.body.as_str(), "Last update OK");
    assert_eq!(disposition, Disposition::Restart);
    assert_eq!(device.firmware().image_len(), Some(image.len() as u32));
    assert_eq!(&device.firmware().flash().0[0x1000..0x1000 + image.len()], &image[..]);
}
