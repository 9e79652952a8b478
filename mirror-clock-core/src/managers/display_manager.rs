use mirror_clock_common::*;

/// Picks the screen for a status snapshot and hands it to the renderer.
pub struct DisplayManager<D: DisplayRenderer> {
    renderer: D,
    version: &'static str,
    last_screen: Option<ScreenKind>,
}

/// Coarse screen identity, used to log transitions once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum ScreenKind {
    FirmwareUpdate,
    Rebooting,
    UpdateFailed,
    TimeFault,
    Clock,
    Other,
}

impl<D: DisplayRenderer> DisplayManager<D> {
    pub fn new(renderer: D, version: &'static str) -> Self {
        Self {
            renderer,
            version,
            last_screen: None,
        }
    }

    /// Screen priority: update progress, reboot notice, held update failure,
    /// clock fault, then the selected clock face.
    pub fn screen_for(&self, snapshot: &StatusSnapshot) -> Screen<'static> {
        match snapshot.activity() {
            Activity::Updating => {
                return Screen::FirmwareUpdate {
                    version: self.version,
                    stage: snapshot.update_stage,
                };
            }
            Activity::Rebooting => {
                return Screen::Rebooting {
                    version: self.version,
                };
            }
            Activity::Normal | Activity::ServingRequest => {}
        }

        if let Some(failure) = snapshot.held_failure {
            return Screen::UpdateFailed(failure);
        }

        match snapshot.time {
            Some(time) => Screen::Clock {
                mode: snapshot.mode,
                time,
                icon: status_icon(snapshot),
            },
            None => Screen::TimeFault(snapshot.time_fault.unwrap_or(TimeSourceError::NotPresent)),
        }
    }

    /// One render pass over `snapshot`.
    pub fn render(&mut self, snapshot: &StatusSnapshot) {
        let screen = self.screen_for(snapshot);
        self.show(&screen);
    }

    /// Draws a screen that does not come from the status model, such as the
    /// boot messages.
    pub fn show(&mut self, screen: &Screen<'_>) {
        let kind = ScreenKind::of(screen);
        if self.last_screen != Some(kind) {
            debug!("Display switched to {:?}", kind);
            self.last_screen = Some(kind);
        }
        self.renderer.draw(screen);
    }

    pub fn renderer(&self) -> &D {
        &self.renderer
    }
}

impl ScreenKind {
    fn of(screen: &Screen<'_>) -> Self {
        match screen {
            Screen::FirmwareUpdate { .. } => ScreenKind::FirmwareUpdate,
            Screen::Rebooting { .. } => ScreenKind::Rebooting,
            Screen::UpdateFailed(_) => ScreenKind::UpdateFailed,
            Screen::TimeFault(_) => ScreenKind::TimeFault,
            Screen::Clock { .. } => ScreenKind::Clock,
            _ => ScreenKind::Other,
        }
    }
}

fn status_icon(snapshot: &StatusSnapshot) -> StatusIcon {
    if snapshot.flags.serving_request {
        StatusIcon::Transfer
    } else if snapshot.connected {
        StatusIcon::Connected
    } else {
        StatusIcon::Disconnected
    }
}
