use crate::types::{Activity, CalendarTime, DisplayMode, TimeSourceError, UpdateFailure, UpdateStage};

/// Transient device flags shared by the scheduler, the request handlers and
/// the update pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatusFlags {
    pub serving_request: bool,
    pub updating: bool,
    pub rebooting: bool,
    pub update_failed: bool,
    /// Only meaningful while `update_failed` is set.
    pub update_failure: Option<UpdateFailure>,
}

impl StatusFlags {
    pub fn activity(&self) -> Activity {
        if self.rebooting {
            Activity::Rebooting
        } else if self.updating {
            Activity::Updating
        } else if self.serving_request {
            Activity::ServingRequest
        } else {
            Activity::Normal
        }
    }
}

/// Plain copy of the status handed to the renderer and the status page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatusSnapshot {
    pub time: Option<CalendarTime>,
    pub time_fault: Option<TimeSourceError>,
    pub mode: DisplayMode,
    pub flags: StatusFlags,
    pub update_stage: UpdateStage,
    /// Failure still inside its on-screen hold window.
    pub held_failure: Option<UpdateFailure>,
    pub connected: bool,
}

impl StatusSnapshot {
    pub fn activity(&self) -> Activity {
        self.flags.activity()
    }
}
