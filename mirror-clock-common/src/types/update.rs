/// Why an update session ended without a usable image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UpdateFailure {
    ImageTooLarge,
    SizeMismatch,
    WriteError,
    Aborted,
}

impl UpdateFailure {
    /// Short operator message for the error screen.
    pub fn message(self) -> &'static str {
        match self {
            UpdateFailure::ImageTooLarge => "FW is too BIG",
            UpdateFailure::SizeMismatch => "FW wrong size",
            UpdateFailure::WriteError => "Error uploading",
            UpdateFailure::Aborted => "Upload aborted",
        }
    }
}

/// Stage of the firmware update state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UpdateStage {
    #[default]
    Idle,
    Starting,
    Receiving,
    Finalizing,
    Succeeded,
    Failed(UpdateFailure),
    Aborted,
}

impl UpdateStage {
    pub fn is_active(self) -> bool {
        matches!(
            self,
            UpdateStage::Starting | UpdateStage::Receiving | UpdateStage::Finalizing
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            UpdateStage::Succeeded | UpdateStage::Failed(_) | UpdateStage::Aborted
        )
    }

    /// Failure code carried by a failed or aborted stage.
    pub fn failure(self) -> Option<UpdateFailure> {
        match self {
            UpdateStage::Failed(failure) => Some(failure),
            UpdateStage::Aborted => Some(UpdateFailure::Aborted),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            UpdateStage::Idle => "Waiting",
            UpdateStage::Starting => "Upload begin",
            UpdateStage::Receiving => "Uploading",
            UpdateStage::Finalizing | UpdateStage::Succeeded => "Upload end",
            UpdateStage::Failed(_) => "Upload failed",
            UpdateStage::Aborted => "Upload abort",
        }
    }
}
