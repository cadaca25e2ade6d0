//! Background rate service: owns the cached rate and the persisted
//! settings, and answers background requests.

use crate::config::AppConfig;
use crate::domain::messages::{BackgroundRequest, BackgroundResponse, RateResponse};
use crate::domain::model::{CachedRate, ConversionRate, PersistedState, Settings};
use crate::domain::ports::{BackgroundChannel, RateSource, StateStore};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

pub struct RateService<S: StateStore, R: RateSource> {
    store: S,
    source: R,
    max_age: chrono::Duration,
    fallback: ConversionRate,
    // load-modify-save 序列化
    write_lock: Mutex<()>,
}

impl<S: StateStore, R: RateSource> RateService<S, R> {
    pub fn new(store: S, source: R, config: &AppConfig) -> Result<Self> {
        Ok(Self {
            store,
            source,
            max_age: config.refresh_interval(),
            fallback: ConversionRate::new(config.currency.fallback_rate)?,
            write_lock: Mutex::new(()),
        })
    }

    async fn load_state(&self) -> PersistedState {
        match self.store.load().await {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!("⚠️ Could not read saved state, using defaults: {}", e);
                PersistedState::default()
            }
        }
    }

    /// Current rate: the cached one while fresh, otherwise a new fetch.
    pub async fn get_rate(&self) -> RateResponse {
        self.get_rate_at(Utc::now()).await
    }

    pub async fn get_rate_at(&self, now: DateTime<Utc>) -> RateResponse {
        let state = self.load_state().await;
        if let Some(cached) = state.cached_rate {
            if cached.is_fresh(now, self.max_age) {
                tracing::debug!("Serving cached rate {} from {}", cached.rate, cached.last_updated);
                return Self::response(Some(cached));
            }
            tracing::debug!("Cached rate from {} is stale", cached.last_updated);
        }
        self.refresh_at(now, state.cached_rate).await
    }

    /// Fetch a new rate regardless of cache age.
    pub async fn force_refresh(&self) -> RateResponse {
        let now = Utc::now();
        let cached = self.load_state().await.cached_rate;
        self.refresh_at(now, cached).await
    }

    async fn refresh_at(&self, now: DateTime<Utc>, cached: Option<CachedRate>) -> RateResponse {
        match self.source.fetch_rate().await {
            Ok(rate) => {
                let fresh = CachedRate {
                    rate,
                    last_updated: now,
                };
                if let Err(e) = self.update(|state| state.cached_rate = Some(fresh)).await {
                    tracing::warn!("⚠️ Could not persist fetched rate: {}", e);
                }
                Self::response(Some(fresh))
            }
            Err(e) => {
                tracing::error!("❌ Error fetching exchange rate: {}", e);
                match cached {
                    Some(cached) => {
                        tracing::warn!("Falling back to cached rate {}", cached.rate);
                        Self::response(Some(cached))
                    }
                    None => {
                        tracing::warn!("Falling back to default rate {}", self.fallback);
                        RateResponse {
                            exchange_rate: self.fallback.value(),
                            last_updated: None,
                        }
                    }
                }
            }
        }
    }

    fn response(cached: Option<CachedRate>) -> RateResponse {
        RateResponse {
            exchange_rate: cached.map(|c| c.rate.value()).unwrap_or_default(),
            last_updated: cached.map(|c| c.last_updated),
        }
    }

    pub async fn settings(&self) -> Settings {
        self.load_state().await.settings
    }

    pub async fn set_auto_convert(&self, enabled: bool) -> Result<()> {
        self.update(|state| state.settings.auto_convert = enabled).await?;
        tracing::info!("Auto-convert {}", if enabled { "enabled" } else { "disabled" });
        Ok(())
    }

    async fn update(&self, change: impl FnOnce(&mut PersistedState)) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut state = self.load_state().await;
        change(&mut state);
        self.store.save(&state).await
    }
}

#[async_trait]
impl<S: StateStore, R: RateSource> BackgroundChannel for RateService<S, R> {
    async fn send(&self, request: BackgroundRequest) -> Result<BackgroundResponse> {
        tracing::debug!("Background request: {:?}", request);
        Ok(match request {
            BackgroundRequest::GetExchangeRate => BackgroundResponse::Rate(self.get_rate().await),
            BackgroundRequest::ForceRefreshRate => BackgroundResponse::Rate(self.force_refresh().await),
            BackgroundRequest::GetSettings => BackgroundResponse::Settings {
                auto_convert: self.settings().await.auto_convert,
            },
            BackgroundRequest::SetAutoConvert { enabled } => {
                self.set_auto_convert(enabled).await?;
                BackgroundResponse::Ack { success: true }
            }
        })
    }
}
