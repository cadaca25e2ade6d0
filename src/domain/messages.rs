//! Message contract between the content session, the background rate
//! service and the controller. Wire names follow the extension's JSON
//! messages: tagged by `action`, camelCase fields.

use super::model::ConversionState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ContentRequest {
    #[serde(rename_all = "camelCase")]
    ConvertCurrency { exchange_rate: f64 },
    RestoreOriginalPrices,
    GetConversionState,
    SetAutoConvert { enabled: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContentResponse {
    State(ConversionState),
    Ack { success: bool },
}

impl ContentResponse {
    pub fn ack(success: bool) -> Self {
        ContentResponse::Ack { success }
    }

    pub fn is_success(&self) -> bool {
        match self {
            ContentResponse::Ack { success } => *success,
            ContentResponse::State(_) => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Notification {
    ConversionComplete {
        count: usize,
    },
    PricesRestored {
        count: usize,
    },
    #[serde(rename_all = "camelCase")]
    ContentScriptReady {
        is_converted: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum BackgroundRequest {
    GetExchangeRate,
    ForceRefreshRate,
    GetSettings,
    SetAutoConvert { enabled: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateResponse {
    pub exchange_rate: f64,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BackgroundResponse {
    Rate(RateResponse),
    Settings {
        #[serde(rename = "autoConvert")]
        auto_convert: bool,
    },
    Ack {
        success: bool,
    },
}
