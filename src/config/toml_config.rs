use crate::dom::SelectorList;
use crate::utils::error::{PriceToggleError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_RATE_ENDPOINT: &str =
    "https://cdn.jsdelivr.net/gh/fawazahmed0/currency-api@1/latest/currencies/ron.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub currency: CurrencyConfig,
    #[serde(default)]
    pub selectors: SelectorConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub rates: RatesConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrencyConfig {
    pub source_code: String,
    pub target_code: String,
    pub target_symbol: String,
    pub fallback_rate: f64,
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            source_code: "RON".to_string(),
            target_code: "USD".to_string(),
            target_symbol: "$".to_string(),
            fallback_rate: 0.22,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub price: Vec<String>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            price: vec![
                "p.product-new-price".to_string(),
                ".price".to_string(),
                ".product-price".to_string(),
                "[itemprop=price]".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Machine-readable price attributes, checked before any text heuristic.
    pub price_attributes: Vec<String>,
    /// Label tokens stripped from the text before number matching.
    pub label_tokens: Vec<String>,
    pub ancestor_depth: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            price_attributes: vec![
                "data-price".to_string(),
                "data-price-amount".to_string(),
                "content".to_string(),
            ],
            label_tokens: vec![
                "de la".to_string(),
                "price:".to_string(),
                "pret:".to_string(),
                "lei".to_string(),
                "ron".to_string(),
                "usd".to_string(),
            ],
            ancestor_depth: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub show_original: bool,
    pub tooltip: bool,
    pub tooltip_offset: i32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            show_original: true,
            tooltip: true,
            tooltip_offset: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatesConfig {
    pub endpoint: String,
    pub refresh_interval_minutes: u64,
    pub timeout_seconds: u64,
    pub state_file: String,
}

impl Default for RatesConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_RATE_ENDPOINT.to_string(),
            refresh_interval_minutes: 60,
            timeout_seconds: 10,
            state_file: "price-toggle-state.json".to_string(),
        }
    }
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(PriceToggleError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| PriceToggleError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${RATE_ENDPOINT})
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| PriceToggleError::ConfigError {
            message: format!("env substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn price_selectors(&self) -> Result<SelectorList> {
        SelectorList::parse_all(&self.selectors.price)
    }

    pub fn refresh_interval(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.rates.refresh_interval_minutes as i64)
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_non_empty_string("currency.source_code", &self.currency.source_code)?;
        validation::validate_non_empty_string("currency.target_code", &self.currency.target_code)?;
        validation::validate_positive_rate("currency.fallback_rate", self.currency.fallback_rate)?;

        validation::validate_non_empty_list("selectors.price", &self.selectors.price)?;
        self.price_selectors()?;

        validation::validate_range("extraction.ancestor_depth", self.extraction.ancestor_depth, 0, 10)?;
        for token in &self.extraction.label_tokens {
            validation::validate_non_empty_string("extraction.label_tokens", token)?;
        }

        validation::validate_url("rates.endpoint", &self.rates.endpoint)?;
        validation::validate_range("rates.refresh_interval_minutes", self.rates.refresh_interval_minutes, 1, 7 * 24 * 60)?;
        validation::validate_range("rates.timeout_seconds", self.rates.timeout_seconds, 1, 300)?;
        validation::validate_path("rates.state_file", &self.rates.state_file)?;

        Ok(())
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
