use crate::dom::NodeId;
use crate::utils::error::{PriceToggleError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source-to-target multiplier. Always positive and finite.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct ConversionRate(f64);

impl ConversionRate {
    pub fn new(value: f64) -> Result<Self> {
        if value.is_finite() && value > 0.0 {
            Ok(Self(value))
        } else {
            Err(PriceToggleError::RateUnavailable {
                reason: format!("{} is not a positive finite rate", value),
            })
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// `round(amount * rate, 2)`
    pub fn apply(self, amount: f64) -> f64 {
        round_cents(amount * self.0)
    }

    /// Attribute form used for the on-page bookkeeping.
    pub fn to_attr(self) -> String {
        self.0.to_string()
    }

    pub fn from_attr(value: &str) -> Option<Self> {
        value.trim().parse::<f64>().ok().and_then(|v| Self::new(v).ok())
    }
}

impl<'de> Deserialize<'de> for ConversionRate {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        ConversionRate::new(value).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for ConversionRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.4}", self.0)
    }
}

pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Per-page conversion state. Lives exactly as long as the content session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub is_converted: bool,
    pub current_rate: Option<ConversionRate>,
    pub auto_convert_enabled: bool,
}

impl SessionState {
    pub fn new(auto_convert_enabled: bool) -> Self {
        Self {
            is_converted: false,
            current_rate: None,
            auto_convert_enabled,
        }
    }

    pub fn mark_converted(&mut self, rate: ConversionRate) {
        self.is_converted = true;
        self.current_rate = Some(rate);
    }

    pub fn mark_restored(&mut self) {
        self.is_converted = false;
    }

    pub fn snapshot(&self) -> ConversionState {
        ConversionState {
            is_converted: self.is_converted,
            current_rate: self.current_rate.map(ConversionRate::value),
            auto_convert_enabled: self.auto_convert_enabled,
        }
    }
}

/// Bookkeeping for one processed price element.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceRecord {
    pub node: NodeId,
    /// Text content captured before the first conversion. Never rewritten.
    pub original_text: String,
    /// Child nodes detached at capture time, put back on restore. Empty when
    /// the record was rebuilt from page attributes.
    pub original_children: Vec<NodeId>,
    /// Amount resolved at the first conversion; later rates reuse it.
    pub source_amount: Option<f64>,
    pub rate: Option<ConversionRate>,
    pub converted: bool,
    /// Kept across restores and reattached on the next conversion.
    pub wrapper: Option<NodeId>,
    /// Text node showing the converted amount, rewritten in place.
    pub converted_text: Option<NodeId>,
    pub hover_bound: bool,
}

impl PriceRecord {
    pub fn new(node: NodeId, original_text: String) -> Self {
        Self {
            node,
            original_text,
            original_children: Vec::new(),
            source_amount: None,
            rate: None,
            converted: false,
            wrapper: None,
            converted_text: None,
            hover_bound: false,
        }
    }

    pub fn is_current(&self, rate: ConversionRate) -> bool {
        self.converted && self.rate == Some(rate)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionState {
    pub is_converted: bool,
    pub current_rate: Option<f64>,
    pub auto_convert_enabled: bool,
}

/// Cached rate owned by the background rate service.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedRate {
    pub rate: ConversionRate,
    pub last_updated: DateTime<Utc>,
}

impl CachedRate {
    pub fn is_fresh(&self, now: DateTime<Utc>, max_age: chrono::Duration) -> bool {
        now.signed_duration_since(self.last_updated) < max_age
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub auto_convert: bool,
}

/// Everything the background collaborator persists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub cached_rate: Option<CachedRate>,
}
