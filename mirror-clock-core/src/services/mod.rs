pub mod network_service;
pub mod time_service;
pub mod update_service;

pub use network_service::{ConnectOutcome, NetworkConnector};
pub use time_service::TimeService;
pub use update_service::{UpdateEvent, UpdatePipeline, UpdateSession};
