use crate::domain::messages::{
    BackgroundRequest, BackgroundResponse, ContentRequest, ContentResponse, Notification,
};
use crate::domain::model::{ConversionRate, PersistedState};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Where fresh exchange rates come from (the network in production).
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn fetch_rate(&self) -> Result<ConversionRate>;
}

/// Persistence for the cached rate and the auto-convert setting.
pub trait StateStore: Send + Sync {
    fn load(&self) -> impl std::future::Future<Output = Result<PersistedState>> + Send;
    fn save(&self, state: &PersistedState) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Request/response channel into a page's content session.
#[async_trait]
pub trait ContentChannel: Send + Sync {
    async fn send(&self, request: ContentRequest) -> Result<ContentResponse>;
}

/// Request/response channel into the background rate service.
#[async_trait]
pub trait BackgroundChannel: Send + Sync {
    async fn send(&self, request: BackgroundRequest) -> Result<BackgroundResponse>;
}

/// Receives notifications emitted by the content session.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Drops every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, notification: Notification) {
        tracing::trace!("Dropping notification {:?}", notification);
    }
}
