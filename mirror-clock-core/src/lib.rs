#![cfg_attr(not(test), no_std)]

mod coordinator;
pub mod device;
pub mod http;
pub mod managers;
pub mod scheduler;
pub mod services;
pub mod storage;

pub use device::{Device, RequestSource};
pub use http::{Disposition, Response};

pub const FIRMWARE_TITLE: &str = "Mirror Clock";
pub const FIRMWARE_VERSION: &str = env!("CARGO_PKG_VERSION");
