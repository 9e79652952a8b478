mod display_manager;
mod status_model;
mod watchdog_manager;

pub use display_manager::DisplayManager;
pub use status_model::StatusModel;
pub use watchdog_manager::WatchdogManager;
