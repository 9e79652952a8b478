pub type SystemResult<T> = core::result::Result<T, SystemError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SystemError {
    #[error("hardware error: {0}")]
    HardwareError(#[from] HardwareError),
    #[error("time source error: {0}")]
    TimeSource(#[from] TimeSourceError),
    #[error("network error: {0}")]
    NetworkError(#[from] NetworkError),
    #[error("invalid configuration")]
    InvalidConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HardwareError {
    #[error("device not initialized")]
    NotInitialized,
    #[error("invalid parameter")]
    InvalidParameter,
    #[error("communication error")]
    CommunicationError,
}

/// Failure of the calendar clock peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TimeSourceError {
    /// Chip does not answer on the bus.
    #[error("time source not present")]
    NotPresent,
    /// Chip answers but its oscillator is halted.
    #[error("time source is stopped")]
    Stopped,
    #[error("time source returned an invalid reading")]
    Corrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NetworkError {
    #[error("not connected")]
    NotConnected,
    #[error("association rejected")]
    AssociationFailed,
}
