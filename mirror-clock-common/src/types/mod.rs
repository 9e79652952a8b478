mod config;
mod display;
mod error;
mod status;
mod time;
mod update;

pub use config::*;
pub use display::*;
pub use error::*;
pub use status::*;
pub use time::*;
pub use update::*;
