// Adapters layer: concrete implementations of the domain ports (http, storage, messaging)

pub mod channel;
pub mod http_rate;
pub mod storage;

pub use channel::{ChannelNotifier, LocalTab};
pub use http_rate::HttpRateSource;
pub use storage::{JsonFileStore, MemoryStore};
