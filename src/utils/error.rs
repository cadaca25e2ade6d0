use thiserror::Error;

#[derive(Error, Debug)]
pub enum PriceToggleError {
    #[error("Rate request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Invalid selector '{selector}': {reason}")]
    SelectorError { selector: String, reason: String },

    #[error("Exchange rate unavailable: {reason}")]
    RateUnavailable { reason: String },

    #[error("Communication failed: {message}")]
    CommunicationError { message: String },

    #[error("Document error: {message}")]
    DocumentError { message: String },

    #[error("Busy: {operation} is already in progress")]
    BusyError { operation: String },
}

pub type Result<T> = std::result::Result<T, PriceToggleError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Storage,
    Document,
    Messaging,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl PriceToggleError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::HttpError(_) | Self::RateUnavailable { .. } => ErrorCategory::Network,
            Self::IoError(_) | Self::SerializationError(_) => ErrorCategory::Storage,
            Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::SelectorError { .. } => ErrorCategory::Configuration,
            Self::DocumentError { .. } => ErrorCategory::Document,
            Self::CommunicationError { .. } | Self::BusyError { .. } => ErrorCategory::Messaging,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::BusyError { .. } => ErrorSeverity::Low,
            Self::HttpError(_) | Self::RateUnavailable { .. } | Self::CommunicationError { .. } => {
                ErrorSeverity::Medium
            }
            Self::DocumentError { .. } | Self::SerializationError(_) => ErrorSeverity::High,
            Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::SelectorError { .. }
            | Self::IoError(_) => ErrorSeverity::Critical,
        }
    }

    /// 給使用者看的簡短訊息
    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::HttpError(_) => "Could not reach the exchange rate service".to_string(),
            Self::RateUnavailable { .. } => "No exchange rate is available right now".to_string(),
            Self::CommunicationError { .. } => {
                "Could not talk to the page. Reload it and try again".to_string()
            }
            Self::BusyError { operation } => format!("Please wait, {} is still running", operation),
            Self::IoError(e) => format!("File access failed: {}", e),
            Self::SerializationError(_) => "Saved state is corrupted".to_string(),
            Self::DocumentError { message } => format!("Page could not be processed: {}", message),
            Self::ConfigError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::SelectorError { .. } => format!("Configuration problem: {}", self),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => "Check the network connection or pass --rate explicitly",
            ErrorCategory::Storage => "Delete the state file to reset the cached rate and settings",
            ErrorCategory::Configuration => "Fix the configuration file and run again",
            ErrorCategory::Document => "Make sure the input is a complete HTML page",
            ErrorCategory::Messaging => "Wait for the current operation to finish and retry",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_unavailable_is_network_medium() {
        let err = PriceToggleError::RateUnavailable {
            reason: "no cached rate".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Network);
        assert_eq!(err.severity(), ErrorSeverity::Medium);
        assert!(err.to_string().contains("no cached rate"));
    }

    #[test]
    fn test_config_errors_are_critical() {
        let err = PriceToggleError::InvalidConfigValueError {
            field: "currency.fallback_rate".to_string(),
            value: "-1".to_string(),
            reason: "must be positive".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert!(err.user_friendly_message().starts_with("Configuration problem"));
    }
}
