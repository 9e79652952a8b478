use crate::types::{CalendarTime, TimeSourceError};

/// Battery backed calendar clock.
pub trait TimeSource {
    fn read(&mut self) -> Result<CalendarTime, TimeSourceError>;

    fn write(&mut self, time: &CalendarTime) -> Result<(), TimeSourceError>;
}
