use core::fmt::Write;

use heapless::String;
use jiff::civil;

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

const WEEKDAY_ABBREVIATIONS: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

const WEEKDAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// Wall-clock reading of the calendar clock.
///
/// Always replaced as a whole; a failed read never produces a partially
/// updated value. `weekday` counts from Sunday = 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalendarTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub weekday: u8,
}

impl CalendarTime {
    pub fn new(
        year: u16,
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
        weekday: u8,
    ) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
            weekday,
        }
    }

    pub fn is_valid(&self) -> bool {
        (1..=12).contains(&self.month)
            && (1..=31).contains(&self.day)
            && self.hour < 24
            && self.minute < 60
            && self.second < 60
            && self.weekday < 7
    }

    /// Top bar text, e.g. `Oct 19 2026, MON`.
    pub fn date_line(&self) -> String<24> {
        let mut line = String::new();
        let _ = write!(
            line,
            "{} {:02} {:04}, {}",
            month_name(self.month),
            self.day,
            self.year,
            weekday_abbreviation(self.weekday)
        );
        line
    }

    /// `hh:mm`, the large digits of the digital faces.
    pub fn clock_line(&self) -> String<8> {
        let mut line = String::new();
        let _ = write!(line, "{:02}:{:02}", self.hour, self.minute);
        line
    }

    /// Parses a compiler style build stamp: `date` as `Oct 19 2026` and
    /// `time` as `12:34:56`. The weekday is derived from the date.
    pub fn parse_build_stamp(date: &str, time: &str) -> Option<Self> {
        let mut date_fields = date.split_whitespace();
        let month_field = date_fields.next()?;
        let month = MONTH_NAMES
            .iter()
            .position(|name| name.eq_ignore_ascii_case(month_field))?
            as u8
            + 1;
        let day: u8 = date_fields.next()?.parse().ok()?;
        let year: u16 = date_fields.next()?.parse().ok()?;
        if date_fields.next().is_some() {
            return None;
        }

        let mut time_fields = time.trim().split(':');
        let hour: u8 = time_fields.next()?.parse().ok()?;
        let minute: u8 = time_fields.next()?.parse().ok()?;
        let second: u8 = time_fields.next()?.parse().ok()?;
        if time_fields.next().is_some() {
            return None;
        }

        let datetime = civil::DateTime::new(
            i16::try_from(year).ok()?,
            month as i8,
            day as i8,
            hour as i8,
            minute as i8,
            second as i8,
            0,
        )
        .ok()?;

        Some(Self::from(datetime))
    }
}

impl From<civil::DateTime> for CalendarTime {
    fn from(datetime: civil::DateTime) -> Self {
        Self {
            year: datetime.year().max(0) as u16,
            month: datetime.month() as u8,
            day: datetime.day() as u8,
            hour: datetime.hour() as u8,
            minute: datetime.minute() as u8,
            second: datetime.second() as u8,
            weekday: datetime.weekday().to_sunday_zero_offset() as u8,
        }
    }
}

impl TryFrom<CalendarTime> for civil::DateTime {
    type Error = jiff::Error;

    fn try_from(time: CalendarTime) -> Result<Self, Self::Error> {
        // out of range years saturate and are rejected by jiff
        civil::DateTime::new(
            i16::try_from(time.year).unwrap_or(i16::MAX),
            time.month as i8,
            time.day as i8,
            time.hour as i8,
            time.minute as i8,
            time.second as i8,
            0,
        )
    }
}

pub fn month_name(month: u8) -> &'static str {
    MONTH_NAMES
        .get((month as usize).wrapping_sub(1))
        .copied()
        .unwrap_or("???")
}

pub fn weekday_abbreviation(weekday: u8) -> &'static str {
    WEEKDAY_ABBREVIATIONS[weekday as usize % 7]
}

pub fn weekday_name(weekday: u8) -> &'static str {
    WEEKDAY_NAMES[weekday as usize % 7]
}
