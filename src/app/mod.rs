pub mod busy;
pub mod controller;
pub mod rate_service;

pub use busy::BusyFlag;
pub use controller::{format_last_updated, Controller, ControllerView, Status, StatusKind};
pub use rate_service::RateService;
