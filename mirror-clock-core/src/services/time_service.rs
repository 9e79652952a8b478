use mirror_clock_common::*;

use crate::managers::StatusModel;

/// Samples the calendar clock into the status model.
pub struct TimeService<T: TimeSource> {
    source: T,
}

impl<T: TimeSource> TimeService<T> {
    pub fn new(source: T) -> Self {
        Self { source }
    }

    /// Reads the clock once. A good reading replaces the stored time; any
    /// failure, including an out of range reading, records a fault instead.
    pub fn refresh(&mut self, status: &mut StatusModel) -> Result<CalendarTime, TimeSourceError> {
        let reading = self.source.read().and_then(|time| {
            if time.is_valid() {
                Ok(time)
            } else {
                Err(TimeSourceError::Corrupted)
            }
        });

        match reading {
            Ok(time) => status.set_time(time),
            Err(fault) => status.set_time_fault(fault),
        }

        reading
    }

    pub fn set_clock(&mut self, time: &CalendarTime) -> Result<(), TimeSourceError> {
        info!(
            "Setting clock to {:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            time.year, time.month, time.day, time.hour, time.minute, time.second
        );
        self.source.write(time)
    }

    pub fn source(&self) -> &T {
        &self.source
    }
}
