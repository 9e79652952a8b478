mod display;
mod flash;
mod server;
mod wifi;

pub use display::ConsoleDisplay;
pub use flash::SimulatedFlash;
pub use server::HttpServer;
pub use wifi::SimulatedWifi;
