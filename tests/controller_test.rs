use async_trait::async_trait;
use price_toggle::adapters::channel::{ChannelNotifier, LocalTab};
use price_toggle::app::{Controller, StatusKind};
use price_toggle::domain::messages::{BackgroundRequest, BackgroundResponse, RateResponse};
use price_toggle::domain::ports::BackgroundChannel;
use price_toggle::{parse_document, AppConfig, ContentSession, PriceToggleError, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// First request waits for the second one to finish before answering.
struct RacingBackground {
    calls: AtomicUsize,
    second_done: Notify,
}

impl RacingBackground {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            second_done: Notify::new(),
        }
    }
}

#[async_trait]
impl BackgroundChannel for RacingBackground {
    async fn send(&self, _request: BackgroundRequest) -> Result<BackgroundResponse> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let rate = if call == 0 {
            self.second_done.notified().await;
            0.20
        } else {
            self.second_done.notify_one();
            0.25
        };
        Ok(BackgroundResponse::Rate(RateResponse {
            exchange_rate: rate,
            last_updated: None,
        }))
    }
}

struct FixedBackground(f64);

#[async_trait]
impl BackgroundChannel for FixedBackground {
    async fn send(&self, _request: BackgroundRequest) -> Result<BackgroundResponse> {
        Ok(BackgroundResponse::Rate(RateResponse {
            exchange_rate: self.0,
            last_updated: Some(chrono::Utc::now()),
        }))
    }
}

fn tab(html: &str) -> LocalTab {
    let (notifier, _rx) = ChannelNotifier::new();
    LocalTab::new(
        ContentSession::new(parse_document(html), &AppConfig::default(), false, Arc::new(notifier)).unwrap(),
    )
}

#[tokio::test]
async fn test_latest_refresh_wins() {
    let controller = Controller::new(LocalTab::empty(), RacingBackground::new(), &AppConfig::default());

    let (older, newer) = tokio::join!(controller.refresh_rate(), controller.refresh_rate());
    assert_eq!(older.unwrap().exchange_rate, 0.20);
    assert_eq!(newer.unwrap().exchange_rate, 0.25);

    // the slower, older answer arrived last but was discarded
    assert_eq!(controller.rate_text(), "$0.2500");
}

#[tokio::test]
async fn test_convert_then_restore_through_controller() {
    let tab = tab(r#"<body><p class="product-new-price">100 Lei</p></body>"#);
    let controller = Controller::new(tab.clone(), FixedBackground(0.22), &AppConfig::default());

    controller.initialize().await.unwrap();
    assert_eq!(controller.status().text, "Ready to convert prices");
    assert!(controller.view().convert_enabled());
    assert_eq!(
        controller.last_updated_text(chrono::Utc::now()),
        "Last updated: Just now"
    );

    controller.convert().await.unwrap();
    assert_eq!(controller.status().text, "Prices converted to USD!");
    assert_eq!(controller.status().kind, StatusKind::Success);
    assert!(controller.view().restore_enabled());

    let text = tab
        .with_session(|s| s.document().inner_text(s.ledger().nodes()[0]))
        .await
        .unwrap();
    assert_eq!(text, "$22.00 USD");

    controller.restore().await.unwrap();
    assert_eq!(controller.status().text, "Original prices restored!");
    assert!(!controller.view().is_converted);
}

#[tokio::test]
async fn test_initialize_sees_converted_tab() {
    let tab = tab(r#"<body><p class="price">100 Lei</p></body>"#);
    tab.with_session(|s| s.convert(0.21)).await.unwrap().unwrap();

    let controller = Controller::new(tab, FixedBackground(0.22), &AppConfig::default());
    controller.initialize().await.unwrap();
    assert_eq!(controller.status().text, "Prices are currently in USD");
    // the tab's rate is what the page shows
    assert_eq!(controller.rate_text(), "$0.2100");
}

#[tokio::test]
async fn test_busy_rejects_overlapping_conversion() {
    let tab = tab(r#"<body><p class="price">100 Lei</p></body>"#);
    let controller = Controller::new(tab, RacingBackground::new(), &AppConfig::default());

    let (first, second) = tokio::join!(controller.convert(), async {
        tokio::task::yield_now().await;
        let second = controller.convert().await;
        // unblock the first request
        let _ = controller.refresh_rate().await;
        second
    });

    assert!(first.is_ok());
    assert!(matches!(second, Err(PriceToggleError::BusyError { .. })));
    assert!(!controller.view().busy);
}
