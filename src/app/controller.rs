//! Toolbar controller: drives the active tab's content session and the
//! background rate service, and keeps the status line the user sees.

use crate::config::AppConfig;
use crate::app::busy::{BusyFlag, BusyGuard};
use crate::domain::messages::{
    BackgroundRequest, BackgroundResponse, ContentRequest, ContentResponse, Notification, RateResponse,
};
use crate::domain::ports::{BackgroundChannel, ContentChannel};
use crate::utils::error::{PriceToggleError, Result};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusKind {
    #[default]
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Status {
    pub text: String,
    pub kind: StatusKind,
}

impl Status {
    fn new(text: impl Into<String>, kind: StatusKind) -> Self {
        Self {
            text: text.into(),
            kind,
        }
    }
}

/// What the controller currently shows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ControllerView {
    pub is_converted: bool,
    pub exchange_rate: Option<f64>,
    pub last_updated: Option<DateTime<Utc>>,
    pub status: Status,
    pub busy: bool,
}

impl ControllerView {
    pub fn convert_enabled(&self) -> bool {
        !self.busy && !self.is_converted
    }

    pub fn restore_enabled(&self) -> bool {
        !self.busy && self.is_converted
    }
}

/// `"Never updated"`, `"Just now"`, `"N minutes ago"`, `"N hours ago"`,
/// or the timestamp itself once it is a day old.
pub fn format_last_updated(timestamp: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(timestamp) = timestamp else {
        return "Never updated".to_string();
    };
    let minutes = now.signed_duration_since(timestamp).num_minutes();
    if minutes < 1 {
        "Just now".to_string()
    } else if minutes < 60 {
        format!("{} {} ago", minutes, if minutes == 1 { "minute" } else { "minutes" })
    } else if minutes < 1440 {
        let hours = minutes / 60;
        format!("{} {} ago", hours, if hours == 1 { "hour" } else { "hours" })
    } else {
        timestamp.format("%Y-%m-%d %H:%M UTC").to_string()
    }
}

pub struct Controller<C: ContentChannel, B: BackgroundChannel> {
    content: C,
    background: B,
    busy: BusyFlag,
    rate_generation: AtomicU64,
    view: Mutex<ControllerView>,
    source_code: String,
    target_code: String,
    target_symbol: String,
}

impl<C: ContentChannel, B: BackgroundChannel> Controller<C, B> {
    pub fn new(content: C, background: B, config: &AppConfig) -> Self {
        Self {
            content,
            background,
            busy: BusyFlag::new(),
            rate_generation: AtomicU64::new(0),
            view: Mutex::new(ControllerView::default()),
            source_code: config.currency.source_code.clone(),
            target_code: config.currency.target_code.clone(),
            target_symbol: config.currency.target_symbol.clone(),
        }
    }

    pub fn view(&self) -> ControllerView {
        let mut view = self.with_view(|v| v.clone());
        view.busy = self.busy.is_busy();
        view
    }

    pub fn status(&self) -> Status {
        self.with_view(|v| v.status.clone())
    }

    /// Rate as displayed, e.g. `$0.2200`.
    pub fn rate_text(&self) -> String {
        match self.with_view(|v| v.exchange_rate) {
            Some(rate) => format!("{}{:.4}", self.target_symbol, rate),
            None => "N/A".to_string(),
        }
    }

    pub fn last_updated_text(&self, now: DateTime<Utc>) -> String {
        format!(
            "Last updated: {}",
            format_last_updated(self.with_view(|v| v.last_updated), now)
        )
    }

    fn with_view<T>(&self, f: impl FnOnce(&mut ControllerView) -> T) -> T {
        match self.view.lock() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    fn set_status(&self, text: impl Into<String>, kind: StatusKind) {
        let status = Status::new(text, kind);
        tracing::debug!("Status: {:?}", status);
        self.with_view(|v| v.status = status);
    }

    fn begin(&self, operation: &str) -> Result<BusyGuard> {
        self.busy.try_begin().ok_or_else(|| PriceToggleError::BusyError {
            operation: operation.to_string(),
        })
    }

    /// Ask the background service for a rate. The display only takes the
    /// answer if no newer rate request started in the meantime.
    async fn request_rate(&self, request: BackgroundRequest) -> Result<RateResponse> {
        let generation = self.rate_generation.fetch_add(1, Ordering::AcqRel) + 1;
        let response = match self.background.send(request).await? {
            BackgroundResponse::Rate(rate) if rate.exchange_rate > 0.0 => rate,
            other => {
                return Err(PriceToggleError::CommunicationError {
                    message: format!("Invalid response from background service: {:?}", other),
                })
            }
        };

        if self.rate_generation.load(Ordering::Acquire) == generation {
            self.with_view(|v| {
                v.exchange_rate = Some(response.exchange_rate);
                v.last_updated = response.last_updated;
            });
        } else {
            tracing::debug!("Discarding rate from superseded request #{}", generation);
        }
        Ok(response)
    }

    /// Load the rate, then ask the tab whether it is already converted.
    pub async fn initialize(&self) -> Result<()> {
        let _guard = self.begin("initialization")?;

        if let Err(e) = self.request_rate(BackgroundRequest::GetExchangeRate).await {
            tracing::error!("❌ Initialization error: {}", e);
            self.set_status("Failed to load exchange rate", StatusKind::Error);
            return Err(e);
        }

        match self.content.send(ContentRequest::GetConversionState).await {
            Ok(ContentResponse::State(state)) if state.is_converted => {
                self.with_view(|v| {
                    v.is_converted = true;
                    if let Some(rate) = state.current_rate {
                        v.exchange_rate = Some(rate);
                    }
                });
                self.set_status(
                    format!("Prices are currently in {}", self.target_code),
                    StatusKind::Success,
                );
            }
            Ok(_) => {
                self.with_view(|v| v.is_converted = false);
                self.set_status("Ready to convert prices", StatusKind::Info);
            }
            Err(e) => {
                tracing::info!("Content script not available on this page: {}", e);
                self.with_view(|v| v.is_converted = false);
            }
        }
        Ok(())
    }

    pub async fn convert(&self) -> Result<()> {
        let _guard = self.begin("conversion")?;
        self.set_status("Converting prices...", StatusKind::Info);

        let outcome = async {
            let rate = self.request_rate(BackgroundRequest::GetExchangeRate).await?;
            let response = self
                .content
                .send(ContentRequest::ConvertCurrency {
                    exchange_rate: rate.exchange_rate,
                })
                .await
                .map_err(|e| PriceToggleError::CommunicationError {
                    message: format!("Content script error: {}", e),
                })?;
            if response.is_success() {
                Ok(())
            } else {
                Err(PriceToggleError::DocumentError {
                    message: "Conversion failed".to_string(),
                })
            }
        }
        .await;

        match outcome {
            Ok(()) => {
                self.with_view(|v| v.is_converted = true);
                self.set_status(
                    format!("Prices converted to {}!", self.target_code),
                    StatusKind::Success,
                );
                Ok(())
            }
            Err(e) => {
                tracing::error!("❌ Conversion failed: {}", e);
                self.set_status(format!("Error: {}", e.user_friendly_message()), StatusKind::Error);
                Err(e)
            }
        }
    }

    pub async fn restore(&self) -> Result<()> {
        let _guard = self.begin("restore")?;
        self.set_status("Restoring original prices...", StatusKind::Info);

        match self.content.send(ContentRequest::RestoreOriginalPrices).await {
            Ok(response) if response.is_success() => {
                self.with_view(|v| v.is_converted = false);
                self.set_status("Original prices restored!", StatusKind::Success);
                Ok(())
            }
            Ok(_) => {
                self.set_status("Failed to restore prices", StatusKind::Error);
                Err(PriceToggleError::DocumentError {
                    message: "Restore failed".to_string(),
                })
            }
            Err(e) => {
                tracing::error!("❌ Restore failed: {}", e);
                self.set_status("Error restoring prices", StatusKind::Error);
                Err(e)
            }
        }
    }

    /// Force a new rate. Not blocked by the busy flag: a newer refresh
    /// supersedes an older one still in flight.
    pub async fn refresh_rate(&self) -> Result<RateResponse> {
        self.set_status("Refreshing exchange rate...", StatusKind::Info);
        match self.request_rate(BackgroundRequest::ForceRefreshRate).await {
            Ok(response) => {
                self.set_status("Exchange rate refreshed!", StatusKind::Success);
                Ok(response)
            }
            Err(e) => {
                tracing::error!("❌ Rate refresh failed: {}", e);
                self.set_status("Error refreshing rate. Try again.", StatusKind::Error);
                Err(e)
            }
        }
    }

    pub fn handle_notification(&self, notification: Notification) {
        match notification {
            Notification::ConversionComplete { count } => {
                self.with_view(|v| v.is_converted = true);
                self.set_status(
                    format!("Converted {} prices to {}!", count, self.target_code),
                    StatusKind::Success,
                );
            }
            Notification::PricesRestored { count } => {
                self.with_view(|v| v.is_converted = false);
                self.set_status(
                    format!("Restored {} prices to {}!", count, self.source_code),
                    StatusKind::Success,
                );
            }
            Notification::ContentScriptReady { is_converted } => {
                self.with_view(|v| v.is_converted = is_converted);
            }
        }
    }
}
