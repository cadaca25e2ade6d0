use crate::core::session::ContentSession;
use crate::domain::messages::{ContentRequest, ContentResponse, Notification};
use crate::domain::ports::{ContentChannel, Notifier};
use crate::utils::error::{PriceToggleError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// In-process tab: delivers content requests to a shared session. A tab
/// without a session (page not loaded, or closed) fails like an
/// unreachable content script.
#[derive(Clone, Default)]
pub struct LocalTab {
    session: Arc<Mutex<Option<ContentSession>>>,
}

impl LocalTab {
    pub fn new(session: ContentSession) -> Self {
        Self {
            session: Arc::new(Mutex::new(Some(session))),
        }
    }

    /// A tab with no content session attached.
    pub fn empty() -> Self {
        Self::default()
    }

    pub async fn attach(&self, session: ContentSession) {
        *self.session.lock().await = Some(session);
    }

    pub async fn close(&self) -> Option<ContentSession> {
        self.session.lock().await.take()
    }

    /// Run `f` against the attached session, e.g. to let the page mutate
    /// its document.
    pub async fn with_session<T>(&self, f: impl FnOnce(&mut ContentSession) -> T) -> Result<T> {
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or_else(Self::unavailable)?;
        Ok(f(session))
    }

    fn unavailable() -> PriceToggleError {
        PriceToggleError::CommunicationError {
            message: "No content session in this tab".to_string(),
        }
    }
}

#[async_trait]
impl ContentChannel for LocalTab {
    async fn send(&self, request: ContentRequest) -> Result<ContentResponse> {
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or_else(Self::unavailable)?;
        Ok(session.handle(request))
    }
}

/// Forwards notifications to whoever holds the receiver. Sending after the
/// receiver is gone is not an error.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            tracing::debug!("Notification dropped: no listener");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::dom::html::parse_document;

    #[tokio::test]
    async fn test_empty_tab_is_unreachable() {
        let tab = LocalTab::empty();
        let result = tab.send(ContentRequest::GetConversionState).await;
        assert!(matches!(result, Err(PriceToggleError::CommunicationError { .. })));
    }

    #[tokio::test]
    async fn test_requests_reach_session_and_notify() {
        let (notifier, mut rx) = ChannelNotifier::new();
        let session = ContentSession::new(
            parse_document("<body><p class=\"price\">100 Lei</p></body>"),
            &AppConfig::default(),
            false,
            Arc::new(notifier),
        )
        .unwrap();
        let tab = LocalTab::new(session);

        let response = tab
            .send(ContentRequest::ConvertCurrency { exchange_rate: 0.22 })
            .await
            .unwrap();
        assert!(response.is_success());
        assert_eq!(rx.recv().await, Some(Notification::ConversionComplete { count: 1 }));

        tab.close().await;
        assert!(tab.send(ContentRequest::RestoreOriginalPrices).await.is_err());
    }
}
