//! Request handlers: the bridge from the HTTP routes to the status model and
//! the update pipeline.

use embassy_time::Instant;
use mirror_clock_common::*;

use crate::device::Device;
use crate::http::{page, Disposition, Response, UploadEvent, UPDATE_FAIL_TEXT, UPDATE_OK_TEXT};
use crate::services::UpdateEvent;
use crate::FIRMWARE_VERSION;

/// Delay of the refresh page sent while rebooting.
const REFRESH_SECONDS: u8 = 10;

impl<P: PlatformTrait> Device<P> {
    /// `GET /`
    pub fn handle_status_request(&mut self, now: Instant) -> Response {
        if self.status.is_rebooting() {
            return self.refresh_response();
        }

        self.status.set_serving_request(true);
        self.refresh_display(now);

        let snapshot = self.status.snapshot(now);
        let body = page::status_page(FIRMWARE_VERSION, &snapshot, self.config.timezone_hours);

        self.status.set_serving_request(false);
        Response::html(body)
    }

    /// `GET /update`, and the final answer to `POST /update`.
    pub fn handle_update_query(&self) -> Response {
        if self.status.is_rebooting() {
            return self.refresh_response();
        }

        if self.status.update_failed() {
            Response::text(UPDATE_FAIL_TEXT)
        } else {
            Response::text(UPDATE_OK_TEXT)
        }
    }

    /// Feeds one event of a `POST /update` body into the update pipeline.
    pub fn handle_upload(&mut self, event: UploadEvent<'_>, now: Instant) {
        let update_event = match event {
            UploadEvent::Start { filename } => {
                info!("Firmware upload {} started", filename);
                self.status.set_serving_request(true);
                UpdateEvent::Begin
            }
            UploadEvent::Data(bytes) => UpdateEvent::Chunk(bytes),
            UploadEvent::End { total_size } => UpdateEvent::EndOfData {
                declared_size: total_size,
            },
            UploadEvent::Aborted => UpdateEvent::PeerAborted,
        };

        let before = self.updates.stage();
        let stage = self
            .updates
            .step(update_event, &mut self.status, &mut self.watchdog, now);

        if stage.is_terminal() {
            self.status.set_serving_request(false);
        }

        // Chunks ignored after a terminal stage still count as progress.
        self.watchdog.feed();

        // Chunks only redraw when they change the stage.
        if stage != before || !matches!(update_event, UpdateEvent::Chunk(_)) {
            self.refresh_display(now);
        }
    }

    /// Closes a `POST /update` request. With [`Disposition::Restart`] the
    /// transport sends the response and then calls
    /// [`Device::restart`](crate::Device::restart).
    pub fn finish_upload(&mut self, now: Instant) -> (Response, Disposition) {
        if self.updates.stage().is_active() {
            warn!("Upload request ended without closing the image");
            self.handle_upload(UploadEvent::Aborted, now);
        }
        self.status.set_serving_request(false);

        let disposition = if self.updates.stage() == UpdateStage::Succeeded {
            Disposition::Restart
        } else {
            Disposition::Keep
        };

        (self.handle_update_query(), disposition)
    }

    fn refresh_response(&self) -> Response {
        Response::html(page::refresh_page(self.network.local_address(), REFRESH_SECONDS))
    }
}
