use mirror_clock_common::*;

/// Prints each new frame to the log instead of an OLED panel.
pub struct ConsoleDisplay {
    last_frame: String,
    frames: usize,
}

impl ConsoleDisplay {
    pub fn new() -> Self {
        Self {
            last_frame: String::new(),
            frames: 0,
        }
    }

    /// Number of distinct frames shown so far.
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn last_frame(&self) -> &str {
        &self.last_frame
    }
}

impl Default for ConsoleDisplay {
    fn default() -> Self {
        Self::new()
    }
}

fn icon_glyph(icon: StatusIcon) -> &'static str {
    match icon {
        StatusIcon::Disconnected => "[--]",
        StatusIcon::Connected => "[wifi]",
        StatusIcon::Transfer => "[<->]",
    }
}

/// Text rendering of a screen, one entry per panel line.
pub fn frame_lines(screen: &Screen<'_>) -> Vec<String> {
    match *screen {
        Screen::Splash {
            title,
            version,
            demo,
        } => {
            let mut lines = vec![title.to_string(), format!("Version: {version}")];
            if demo {
                lines.push("Demo mode".to_string());
            }
            lines
        }
        Screen::SettingTime(SetTimeResult::Configured) => vec!["DS1307 configured".to_string()],
        Screen::SettingTime(SetTimeResult::CommunicationError) => {
            vec!["Communication Err".to_string()]
        }
        Screen::SettingTime(SetTimeResult::ParseError) => vec![
            "Could not parse".to_string(),
            "DATE and TIME".to_string(),
        ],
        Screen::Connecting {
            ssid,
            attempt,
            max_attempts,
        } => vec![
            "Configuring WiFi".to_string(),
            format!("SSID: {ssid}"),
            format!("Attempt {attempt}/{max_attempts}"),
        ],
        Screen::Connected { ssid } => vec!["WiFi connected".to_string(), ssid.to_string()],
        Screen::ConnectFailed { ssid } => {
            vec!["WiFi not connected".to_string(), ssid.to_string()]
        }
        Screen::FirmwareUpdate { version, stage } => vec![
            "Firmware update".to_string(),
            format!("Version: {version}"),
            stage.label().to_string(),
        ],
        Screen::Rebooting { version } => {
            vec!["Rebooting...".to_string(), format!("Version: {version}")]
        }
        Screen::UpdateFailed(failure) => {
            vec!["Update failed".to_string(), failure.message().to_string()]
        }
        Screen::TimeFault(TimeSourceError::Stopped) => vec![
            "DS1307 is stopped".to_string(),
            "Run the SetTime".to_string(),
        ],
        Screen::TimeFault(_) => vec![
            "DS1307 read error".to_string(),
            "Check circuitry".to_string(),
        ],
        Screen::Clock { mode, time, icon } => vec![
            format!("{} {}", icon_glyph(icon), time.date_line()),
            format!("[{}] {}", mode.name(), time.clock_line()),
        ],
    }
}

impl DisplayRenderer for ConsoleDisplay {
    fn draw(&mut self, screen: &Screen<'_>) {
        let frame = frame_lines(screen).join(" | ");
        if frame == self.last_frame {
            return;
        }

        info!("[Simulator Display] {}", frame);
        self.last_frame = frame;
        self.frames += 1;
    }
}
