use core::fmt::Write;
use core::net::Ipv4Addr;

use mirror_clock_common::*;

use super::Body;

/// Status page served on `/`.
pub fn status_page(version: &str, snapshot: &StatusSnapshot, timezone_hours: i8) -> Body {
    let mut page = Body::new();
    write_status_page(&mut page, version, snapshot, timezone_hours).ok();
    page
}

fn write_status_page(
    page: &mut Body,
    version: &str,
    snapshot: &StatusSnapshot,
    timezone_hours: i8,
) -> core::fmt::Result {
    write!(
        page,
        "<!DOCTYPE html><html><head><meta charset='utf-8'>\
         <meta name='viewport' content='width=device-width, initial-scale=1'>\
         <title>{}</title></head><body>\
         <h2>Firmware version: {}</h2>",
        crate::FIRMWARE_TITLE,
        version
    )?;

    match snapshot.time {
        Some(time) => write!(
            page,
            "<p>Time: {:02}:{:02}:{:02}</p><p>Date: {:04}-{:02}-{:02}, {}</p>",
            time.hour,
            time.minute,
            time.second,
            time.year,
            time.month,
            time.day,
            weekday_name(time.weekday)
        )?,
        None => write!(
            page,
            "<p>Time: unavailable ({})</p>",
            snapshot.time_fault.unwrap_or(TimeSourceError::NotPresent)
        )?,
    }

    write!(
        page,
        "<p>Timezone: UTC{:+}</p><p>Face: {}</p><p>Network: {}</p>",
        timezone_hours,
        snapshot.mode.name(),
        if snapshot.connected { "connected" } else { "offline" }
    )?;

    page.push_str(
        "<form method='POST' action='/update' enctype='multipart/form-data'>\
         <input type='file' name='update' accept='.bin'>\
         <input type='submit' value='Update'></form></body></html>",
    )
    .map_err(|_| core::fmt::Error)
}

/// Page that sends the browser back to the device after `seconds`.
pub fn refresh_page(address: Option<Ipv4Addr>, seconds: u8) -> Body {
    let mut page = Body::new();
    match address {
        Some(address) => write!(
            page,
            "<!DOCTYPE html><html><head>\
             <meta http-equiv='refresh' content='{};url=http://{}'>\
             </head><body>Rebooting...</body></html>",
            seconds, address
        )
        .ok(),
        None => write!(
            page,
            "<!DOCTYPE html><html><head>\
             <meta http-equiv='refresh' content='{};url=/'>\
             </head><body>Rebooting...</body></html>",
            seconds
        )
        .ok(),
    };
    page
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(time: Option<CalendarTime>) -> StatusSnapshot {
        StatusSnapshot {
            time,
            time_fault: time.is_none().then_some(TimeSourceError::Stopped),
            mode: DisplayMode::Hybrid,
            flags: StatusFlags::default(),
            update_stage: UpdateStage::Idle,
            held_failure: None,
            connected: true,
        }
    }

    #[test]
    fn status_page_shows_time_and_upload_form() {
        let time = CalendarTime::new(2026, 10, 19, 7, 5, 9, 1);
        let page = status_page("1.1.0", &snapshot(Some(time)), 3);

        assert!(page.contains("Firmware version: 1.1.0"));
        assert!(page.contains("Time: 07:05:09"));
        assert!(page.contains("Date: 2026-10-19, Monday"));
        assert!(page.contains("UTC+3"));
        assert!(page.contains("Face: hybrid"));
        assert!(page.contains("Network: connected"));
        assert!(page.contains("name='update'"));
        assert!(page.ends_with("</html>"));
    }

    #[test]
    fn status_page_reports_clock_fault() {
        let page = status_page("1.1.0", &snapshot(None), -5);
        assert!(page.contains("Time: unavailable (time source is stopped)"));
        assert!(page.contains("UTC-5"));
    }

    #[test]
    fn refresh_page_points_at_device() {
        let page = refresh_page(Some(Ipv4Addr::new(192, 168, 1, 40)), 10);
        assert!(page.contains("content='10;url=http://192.168.1.40'"));
    }
}
