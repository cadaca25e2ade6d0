pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod dom;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{CliArgs, Command};
pub use config::AppConfig;

pub use adapters::{ChannelNotifier, HttpRateSource, JsonFileStore, LocalTab, MemoryStore};
pub use app::{Controller, RateService};
pub use crate::core::{ContentSession, ConversionEngine, ConvertReport};
pub use dom::{html::parse_document, Document};
pub use domain::model::ConversionRate;
pub use utils::error::{PriceToggleError, Result};
