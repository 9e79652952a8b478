use embassy_time::Instant;
use mirror_clock_common::*;

/// Process wide device status.
///
/// Owned by the [`Device`](crate::Device); every producer mutates it through
/// a `&mut` borrow that ends before the renderer takes its snapshot, so a
/// snapshot never observes half of an update.
pub struct StatusModel {
    time: Option<CalendarTime>,
    time_fault: Option<TimeSourceError>,
    mode: DisplayMode,
    flags: StatusFlags,
    update_stage: UpdateStage,
    failure_hold_until: Option<Instant>,
    connected: bool,
}

impl StatusModel {
    pub fn new(mode: DisplayMode) -> Self {
        Self {
            time: None,
            time_fault: None,
            mode,
            flags: StatusFlags::default(),
            update_stage: UpdateStage::Idle,
            failure_hold_until: None,
            connected: false,
        }
    }

    pub fn time(&self) -> Option<CalendarTime> {
        self.time
    }

    /// Replaces the whole reading and clears any previous fault.
    pub fn set_time(&mut self, time: CalendarTime) {
        self.time = Some(time);
        self.time_fault = None;
    }

    pub fn time_fault(&self) -> Option<TimeSourceError> {
        self.time_fault
    }

    /// A failed read invalidates the previous reading.
    pub fn set_time_fault(&mut self, fault: TimeSourceError) {
        if self.time_fault != Some(fault) {
            warn!("Time source fault: {:?}", fault);
        }
        self.time = None;
        self.time_fault = Some(fault);
    }

    pub fn display_mode(&self) -> DisplayMode {
        self.mode
    }

    pub fn set_display_mode(&mut self, mode: DisplayMode) {
        debug!("Display mode {:?} -> {:?}", self.mode, mode);
        self.mode = mode;
    }

    pub fn flags(&self) -> StatusFlags {
        self.flags
    }

    pub fn activity(&self) -> Activity {
        self.flags.activity()
    }

    pub fn is_serving_request(&self) -> bool {
        self.flags.serving_request
    }

    pub fn set_serving_request(&mut self, serving: bool) {
        self.flags.serving_request = serving;
    }

    pub fn is_updating(&self) -> bool {
        self.flags.updating
    }

    /// Starting an update wipes the failure left by the previous one.
    pub fn set_updating(&mut self, updating: bool) {
        self.flags.updating = updating;
        if updating {
            self.flags.update_failed = false;
            self.flags.update_failure = None;
            self.failure_hold_until = None;
        }
    }

    pub fn is_rebooting(&self) -> bool {
        self.flags.rebooting
    }

    pub fn set_rebooting(&mut self, rebooting: bool) {
        self.flags.rebooting = rebooting;
    }

    pub fn update_failed(&self) -> bool {
        self.flags.update_failed
    }

    pub fn update_failure(&self) -> Option<UpdateFailure> {
        if self.flags.update_failed {
            self.flags.update_failure
        } else {
            None
        }
    }

    /// Marks the last update as failed and keeps it on screen until
    /// `hold_until`.
    pub fn record_update_failure(&mut self, failure: UpdateFailure, hold_until: Instant) {
        self.flags.update_failed = true;
        self.flags.update_failure = Some(failure);
        self.failure_hold_until = Some(hold_until);
    }

    pub fn failure_hold_active(&self, now: Instant) -> bool {
        self.flags.update_failed && self.failure_hold_until.is_some_and(|until| now < until)
    }

    pub fn update_stage(&self) -> UpdateStage {
        self.update_stage
    }

    pub fn set_update_stage(&mut self, stage: UpdateStage) {
        self.update_stage = stage;
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    pub fn snapshot(&self, now: Instant) -> StatusSnapshot {
        StatusSnapshot {
            time: self.time,
            time_fault: self.time_fault,
            mode: self.mode,
            flags: self.flags,
            update_stage: self.update_stage,
            held_failure: if self.failure_hold_active(now) {
                self.update_failure()
            } else {
                None
            },
            connected: self.connected,
        }
    }
}

impl Default for StatusModel {
    fn default() -> Self {
        Self::new(DisplayMode::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_time::Duration;

    #[test]
    fn starting_update_clears_previous_failure() {
        let mut status = StatusModel::default();
        let now = Instant::from_millis(1_000);
        status.record_update_failure(UpdateFailure::WriteError, now + Duration::from_secs(3));
        assert!(status.update_failed());
        assert_eq!(status.update_failure(), Some(UpdateFailure::WriteError));

        status.set_updating(true);

        assert!(!status.update_failed());
        assert_eq!(status.update_failure(), None);
        assert!(!status.failure_hold_active(now));
    }

    #[test]
    fn failure_hold_expires() {
        let mut status = StatusModel::default();
        let now = Instant::from_millis(0);
        status.record_update_failure(UpdateFailure::Aborted, now + Duration::from_millis(3000));

        assert_eq!(status.snapshot(now).held_failure, Some(UpdateFailure::Aborted));
        assert!(status.failure_hold_active(Instant::from_millis(2999)));

        let later = Instant::from_millis(3000);
        assert!(!status.failure_hold_active(later));
        assert_eq!(status.snapshot(later).held_failure, None);
        // the flag itself outlives the hold
        assert!(status.update_failed());
    }

    #[test]
    fn time_is_replaced_as_a_whole() {
        let mut status = StatusModel::default();
        let first = CalendarTime::new(2026, 1, 2, 3, 4, 5, 5);
        status.set_time(first);
        assert_eq!(status.time(), Some(first));

        status.set_time_fault(TimeSourceError::Stopped);
        assert_eq!(status.time(), None);
        assert_eq!(status.time_fault(), Some(TimeSourceError::Stopped));

        let second = CalendarTime::new(2026, 1, 2, 3, 4, 6, 5);
        status.set_time(second);
        let snapshot = status.snapshot(Instant::from_millis(0));
        assert_eq!(snapshot.time, Some(second));
        assert_eq!(snapshot.time_fault, None);
    }
}
