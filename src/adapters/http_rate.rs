use crate::config::AppConfig;
use crate::domain::model::ConversionRate;
use crate::domain::ports::RateSource;
use crate::utils::error::{PriceToggleError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Fetches rates from a currency API answering
/// `{ "<source>": { "<target>": <rate>, ... } }` with lowercase codes.
#[derive(Debug, Clone)]
pub struct HttpRateSource {
    client: Client,
    endpoint: String,
    source_code: String,
    target_code: String,
}

impl HttpRateSource {
    pub fn new(endpoint: &str, source_code: &str, target_code: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            source_code: source_code.to_lowercase(),
            target_code: target_code.to_lowercase(),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(
            &config.rates.endpoint,
            &config.currency.source_code,
            &config.currency.target_code,
            Duration::from_secs(config.rates.timeout_seconds),
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn rate_from_body(&self, body: &serde_json::Value) -> Result<ConversionRate> {
        let value = body
            .get(&self.source_code)
            .and_then(|table| table.get(&self.target_code))
            .and_then(serde_json::Value::as_f64)
            .ok_or_else(|| PriceToggleError::RateUnavailable {
                reason: format!(
                    "response has no {}.{} rate",
                    self.source_code, self.target_code
                ),
            })?;
        ConversionRate::new(value)
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    async fn fetch_rate(&self) -> Result<ConversionRate> {
        tracing::debug!("Making rate request to: {}", self.endpoint);
        let response = self.client.get(&self.endpoint).send().await?;
        tracing::debug!("Rate API response status: {}", response.status());

        if !response.status().is_success() {
            return Err(PriceToggleError::RateUnavailable {
                reason: format!("rate API answered {}", response.status()),
            });
        }

        let body: serde_json::Value = response.json().await?;
        let rate = self.rate_from_body(&body)?;
        tracing::info!(
            "💱 Fetched rate 1 {} = {} {}",
            self.source_code.to_uppercase(),
            rate,
            self.target_code.to_uppercase()
        );
        Ok(rate)
    }
}
