use core::sync::atomic::{AtomicI64, Ordering};
use embassy_time::Instant;
use jiff::{civil, tz::Offset, Timestamp};
use mirror_clock_common::{CalendarTime, TimeSource, TimeSourceError};

/// Battery backed counter, shared by every handle in the process. Zero means
/// the oscillator was never started.
static RTC_TIMESTAMP: AtomicI64 = AtomicI64::new(0);

/// Calendar clock emulated on top of the host clock.
pub struct SimulatedRtc {
    offset: Offset,
    present: bool,
    base_timestamp: i64,
    boot_instant: Instant,
}

impl SimulatedRtc {
    /// A clock running in `timezone_hours`. With `seed_from_host` an unset
    /// clock starts from the host time instead of reporting itself stopped.
    pub fn new(timezone_hours: i8, seed_from_host: bool) -> Self {
        let offset = Offset::from_hours(timezone_hours).unwrap_or(Offset::UTC);

        let mut stored = RTC_TIMESTAMP.load(Ordering::SeqCst);
        if stored == 0 && seed_from_host {
            stored = host_timestamp();
            RTC_TIMESTAMP.store(stored, Ordering::SeqCst);
        }

        log::info!(
            "Simulated RTC initialized with base timestamp: {}",
            stored
        );

        Self {
            offset,
            present: true,
            base_timestamp: stored,
            boot_instant: Instant::now(),
        }
    }

    /// A clock chip that does not answer on the bus.
    pub fn detached() -> Self {
        Self {
            offset: Offset::UTC,
            present: false,
            base_timestamp: 0,
            boot_instant: Instant::now(),
        }
    }

    pub fn timestamp(&self) -> i64 {
        let elapsed = i64::try_from(self.boot_instant.elapsed().as_secs()).unwrap_or(0);
        self.base_timestamp + elapsed
    }
}

fn host_timestamp() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(0))
        .unwrap_or(0)
}

impl TimeSource for SimulatedRtc {
    fn read(&mut self) -> Result<CalendarTime, TimeSourceError> {
        if !self.present {
            return Err(TimeSourceError::NotPresent);
        }
        if self.base_timestamp == 0 {
            return Err(TimeSourceError::Stopped);
        }

        let timestamp =
            Timestamp::from_second(self.timestamp()).map_err(|_| TimeSourceError::Corrupted)?;
        Ok(CalendarTime::from(self.offset.to_datetime(timestamp)))
    }

    fn write(&mut self, time: &CalendarTime) -> Result<(), TimeSourceError> {
        if !self.present {
            return Err(TimeSourceError::NotPresent);
        }

        let datetime =
            civil::DateTime::try_from(*time).map_err(|_| TimeSourceError::Corrupted)?;
        let timestamp = self
            .offset
            .to_timestamp(datetime)
            .map_err(|_| TimeSourceError::Corrupted)?;

        self.base_timestamp = timestamp.as_second();
        self.boot_instant = Instant::now();
        RTC_TIMESTAMP.store(self.base_timestamp, Ordering::SeqCst);
        log::info!("Simulated RTC time set to: {}", self.base_timestamp);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detached_clock_is_not_present() {
        let mut rtc = SimulatedRtc::detached();
        assert_eq!(rtc.read(), Err(TimeSourceError::NotPresent));
        let time = CalendarTime::new(2027, 1, 2, 8, 15, 0, 6);
        assert_eq!(rtc.write(&time), Err(TimeSourceError::NotPresent));
    }

    #[test]
    fn written_time_reads_back_in_local_offset() {
        let mut rtc = SimulatedRtc::new(2, false);
        let time = CalendarTime::new(2027, 1, 2, 8, 15, 0, 6);
        rtc.write(&time).unwrap();

        let read = rtc.read().unwrap();
        assert_eq!((read.year, read.month, read.day), (2027, 1, 2));
        assert_eq!((read.hour, read.minute), (8, 15));
        assert_eq!(read.weekday, 6);

        let utc = rtc.timestamp();
        let expected = Offset::UTC
            .to_timestamp(civil::date(2027, 1, 2).at(6, 15, 0, 0))
            .unwrap()
            .as_second();
        assert!(utc - expected <= 1);
    }
}
