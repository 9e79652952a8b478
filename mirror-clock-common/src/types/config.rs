use heapless::String;
use serde::{Deserialize, Serialize};

use crate::types::{DisplayMode, SystemError, SystemResult};

/// Complete device configuration.
///
/// Every section falls back to its defaults when missing, so a partial JSON
/// document is enough to override a single value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub network: NetworkConfig,
    pub display: DisplayConfig,
    pub schedule: ScheduleConfig,
    pub update: UpdateConfig,
    pub watchdog: WatchdogConfig,
    /// Offset shown on the status page as `UTC+n`.
    pub timezone_hours: i8,
    /// Writes this stamp into the calendar clock during boot.
    pub set_time: Option<SetTimeConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub ssid: String<32>,
    pub password: String<64>,
    pub max_attempts: u8,
    pub attempt_interval_ms: u32,
    pub result_hold_ms: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub initial_mode: DisplayMode,
    /// Rotates through every face on a timer.
    pub demo_mode: bool,
    pub splash_ms: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub time_refresh_ms: u32,
    pub display_refresh_ms: u32,
    pub mode_rotation_ms: u32,
}

/// Storage layout and timing of firmware updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// Bytes of free space never handed to an image.
    pub reserved_margin: u32,
    /// Capacity is rounded down to a multiple of this.
    pub alignment: u32,
    /// Watchdog timeout while a session is open.
    pub session_watchdog_ms: u32,
    /// Minimum time a failure stays on screen.
    pub failure_hold_ms: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    pub timeout_ms: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetTimeConfig {
    /// `Mmm dd yyyy`
    pub date: String<12>,
    /// `hh:mm:ss`
    pub time: String<9>,
}

impl DeviceConfig {
    pub fn validate(&self) -> SystemResult<()> {
        if self.network.max_attempts == 0
            || self.update.alignment == 0
            || self.schedule.time_refresh_ms == 0
            || self.schedule.display_refresh_ms == 0
            || self.schedule.mode_rotation_ms == 0
            || self.watchdog.timeout_ms == 0
            || self.update.session_watchdog_ms == 0
        {
            return Err(SystemError::InvalidConfig);
        }
        Ok(())
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            ssid: String::new(),
            password: String::new(),
            max_attempts: 10,
            attempt_interval_ms: 1000,
            result_hold_ms: 2000,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            initial_mode: DisplayMode::default(),
            demo_mode: true,
            splash_ms: 2000,
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            time_refresh_ms: 500,
            display_refresh_ms: 500,
            mode_rotation_ms: 30_000,
        }
    }
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            reserved_margin: 0x1000,
            alignment: 0x1000,
            session_watchdog_ms: 8000,
            failure_hold_ms: 3000,
        }
    }
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self { timeout_ms: 3000 }
    }
}
