mod display;
mod firmware;
mod platform;
mod time_source;
mod watchdog;
mod wifi;

pub use display::*;
pub use firmware::*;
pub use platform::*;
pub use time_source::*;
pub use watchdog::*;
pub use wifi::*;
