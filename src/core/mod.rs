pub mod converter;
pub mod extractor;
pub mod ledger;
pub mod restorer;
pub mod session;
pub mod tooltip;
pub mod watcher;

pub use converter::{ConversionEngine, ConvertReport};
pub use session::ContentSession;
