use serde::{Deserialize, Serialize};

use crate::types::{CalendarTime, TimeSourceError, UpdateFailure, UpdateStage};

/// Clock faces the renderer knows how to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    Digital,
    Analog,
    Hybrid,
    DialStrips,
    DialFramed,
    #[default]
    DialBoxed,
}

impl DisplayMode {
    pub const ALL: [DisplayMode; 6] = [
        DisplayMode::Digital,
        DisplayMode::Analog,
        DisplayMode::Hybrid,
        DisplayMode::DialStrips,
        DisplayMode::DialFramed,
        DisplayMode::DialBoxed,
    ];

    /// Next face in rotation order, wrapping from the last back to the first.
    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            DisplayMode::Digital => "digital",
            DisplayMode::Analog => "analog",
            DisplayMode::Hybrid => "hybrid",
            DisplayMode::DialStrips => "dial with strips",
            DisplayMode::DialFramed => "framed dial",
            DisplayMode::DialBoxed => "boxed dial",
        }
    }
}

/// The one activity the renderer observes at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Activity {
    Normal,
    ServingRequest,
    Updating,
    Rebooting,
}

/// Connectivity icon in the top bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StatusIcon {
    Disconnected,
    Connected,
    Transfer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SetTimeResult {
    Configured,
    CommunicationError,
    ParseError,
}

/// Everything the display can be asked to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Screen<'a> {
    Splash {
        title: &'a str,
        version: &'a str,
        demo: bool,
    },
    SettingTime(SetTimeResult),
    Connecting {
        ssid: &'a str,
        attempt: u8,
        max_attempts: u8,
    },
    Connected {
        ssid: &'a str,
    },
    ConnectFailed {
        ssid: &'a str,
    },
    FirmwareUpdate {
        version: &'a str,
        stage: UpdateStage,
    },
    Rebooting {
        version: &'a str,
    },
    UpdateFailed(UpdateFailure),
    TimeFault(TimeSourceError),
    Clock {
        mode: DisplayMode,
        time: CalendarTime,
        icon: StatusIcon,
    },
}
