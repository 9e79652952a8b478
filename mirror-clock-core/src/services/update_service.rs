//! Firmware update state machine.
//!
//! Every event of an upload goes through [`UpdatePipeline::step`], the only
//! place where the stage changes. Stages and their exits:
//!
//! ```text
//! Idle -> Starting -> Receiving -> Finalizing -> Succeeded
//!            |            |            |
//!            |            +------------+-> Failed(code)
//!            +-> Failed(ImageTooLarge)
//! Starting | Receiving | Finalizing -> Aborted   (peer went away)
//! ```

use embassy_time::{Duration, Instant};
use mirror_clock_common::*;

use crate::managers::{StatusModel, WatchdogManager};

/// Input of the state machine, produced by the request coordinator from the
/// upload stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UpdateEvent<'a> {
    Begin,
    Chunk(&'a [u8]),
    EndOfData { declared_size: u32 },
    PeerAborted,
}

impl UpdateEvent<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            UpdateEvent::Begin => "begin",
            UpdateEvent::Chunk(_) => "chunk",
            UpdateEvent::EndOfData { .. } => "end of data",
            UpdateEvent::PeerAborted => "peer abort",
        }
    }
}

/// Live state of one transfer. Exists only between `Begin` and a terminal
/// stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UpdateSession {
    pub received: u32,
    pub capacity: u32,
    pub stage: UpdateStage,
}

pub struct UpdatePipeline<F: FirmwareWriter> {
    writer: F,
    config: UpdateConfig,
    session: Option<UpdateSession>,
    last_outcome: Option<UpdateStage>,
}

impl<F: FirmwareWriter> UpdatePipeline<F> {
    pub fn new(writer: F, config: UpdateConfig) -> Self {
        Self {
            writer,
            config,
            session: None,
            last_outcome: None,
        }
    }

    /// Current stage: the open session's, else the last terminal stage.
    pub fn stage(&self) -> UpdateStage {
        match (self.session, self.last_outcome) {
            (Some(session), _) => session.stage,
            (None, Some(outcome)) => outcome,
            (None, None) => UpdateStage::Idle,
        }
    }

    pub fn session(&self) -> Option<UpdateSession> {
        self.session
    }

    /// Terminal stage of the most recent session.
    pub fn last_outcome(&self) -> Option<UpdateStage> {
        self.last_outcome
    }

    /// True unless the most recent session ended in a failure or abort.
    pub fn last_update_ok(&self) -> bool {
        !matches!(
            self.last_outcome,
            Some(UpdateStage::Failed(_) | UpdateStage::Aborted)
        )
    }

    /// Largest image the storage can take: free space minus the reserved
    /// margin, rounded down to the alignment. `None` when nothing fits.
    pub fn capacity(&self) -> Option<u32> {
        let available = self
            .writer
            .free_space()
            .checked_sub(self.config.reserved_margin)?;
        let capacity = available.checked_sub(available.checked_rem(self.config.alignment)?)?;
        (capacity > 0).then_some(capacity)
    }

    /// Applies one event and returns the resulting stage. Events that do not
    /// apply to the current stage leave it untouched.
    pub fn step<W: Watchdog>(
        &mut self,
        event: UpdateEvent<'_>,
        status: &mut StatusModel,
        watchdog: &mut WatchdogManager<W>,
        now: Instant,
    ) -> UpdateStage {
        let current = self.stage();
        let next = match (current, event) {
            (stage, UpdateEvent::Begin) if stage.is_active() => {
                warn!("Update already in progress, rejecting a second session");
                return stage;
            }
            (_, UpdateEvent::Begin) => self.start(status, watchdog),
            (UpdateStage::Receiving, UpdateEvent::Chunk(bytes)) => self.receive(bytes, watchdog),
            (UpdateStage::Receiving, UpdateEvent::EndOfData { declared_size }) => {
                self.finalize(declared_size, status, watchdog)
            }
            (stage, UpdateEvent::PeerAborted) if stage.is_active() => {
                warn!("Upload aborted by peer");
                UpdateStage::Aborted
            }
            (stage, event) => {
                debug!("Ignoring {} in stage {:?}", event.name(), stage);
                return stage;
            }
        };

        self.enter(next, status, watchdog, now);
        next
    }

    fn start<W: Watchdog>(
        &mut self,
        status: &mut StatusModel,
        watchdog: &mut WatchdogManager<W>,
    ) -> UpdateStage {
        status.set_updating(true);
        watchdog.begin_session(self.config.session_watchdog_ms);
        self.session = Some(UpdateSession {
            received: 0,
            capacity: 0,
            stage: UpdateStage::Starting,
        });
        status.set_update_stage(UpdateStage::Starting);

        let Some(capacity) = self.capacity() else {
            warn!(
                "No room for an image: {} bytes free, {} reserved",
                self.writer.free_space(),
                self.config.reserved_margin
            );
            return UpdateStage::Failed(UpdateFailure::ImageTooLarge);
        };

        if self.writer.begin(capacity).is_err() {
            warn!("Firmware storage rejected a {} byte image", capacity);
            return UpdateStage::Failed(UpdateFailure::ImageTooLarge);
        }

        if let Some(session) = self.session.as_mut() {
            session.capacity = capacity;
        }
        info!("Update started, capacity {} bytes", capacity);
        UpdateStage::Receiving
    }

    fn receive<W: Watchdog>(
        &mut self,
        bytes: &[u8],
        watchdog: &mut WatchdogManager<W>,
    ) -> UpdateStage {
        watchdog.extend();

        let accepted = self.writer.write(bytes);
        if accepted != bytes.len() {
            warn!("Short write: {} of {} bytes accepted", accepted, bytes.len());
            return UpdateStage::Failed(UpdateFailure::WriteError);
        }

        if let Some(session) = self.session.as_mut() {
            session.received = session.received.saturating_add(accepted as u32);
        }
        UpdateStage::Receiving
    }

    fn finalize<W: Watchdog>(
        &mut self,
        declared_size: u32,
        status: &mut StatusModel,
        watchdog: &mut WatchdogManager<W>,
    ) -> UpdateStage {
        let received = match self.session.as_mut() {
            Some(session) => {
                session.stage = UpdateStage::Finalizing;
                session.received
            }
            None => 0,
        };
        status.set_update_stage(UpdateStage::Finalizing);
        watchdog.extend();

        if received != declared_size {
            warn!("Image size mismatch: received {}, declared {}", received, declared_size);
            return UpdateStage::Failed(UpdateFailure::SizeMismatch);
        }

        match self.writer.finish(declared_size) {
            Ok(()) => {
                info!("Update finished: {} bytes", declared_size);
                UpdateStage::Succeeded
            }
            Err(_) => {
                warn!("Firmware storage failed to validate the image");
                UpdateStage::Failed(UpdateFailure::SizeMismatch)
            }
        }
    }

    /// Side effects of entering `stage`.
    fn enter<W: Watchdog>(
        &mut self,
        stage: UpdateStage,
        status: &mut StatusModel,
        watchdog: &mut WatchdogManager<W>,
        now: Instant,
    ) {
        status.set_update_stage(stage);

        if !stage.is_terminal() {
            if let Some(session) = self.session.as_mut() {
                session.stage = stage;
            }
            return;
        }

        if let Some(failure) = stage.failure() {
            self.writer.abort();
            let hold = Duration::from_millis(u64::from(self.config.failure_hold_ms));
            status.record_update_failure(failure, now + hold);
            warn!("Update failed: {}", failure.message());
        }

        self.session = None;
        self.last_outcome = Some(stage);
        status.set_updating(false);
        watchdog.end_session();
    }

    pub fn writer(&self) -> &F {
        &self.writer
    }
}
