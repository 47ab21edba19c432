use crate::domain::model::LifecycleStage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrmError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("API returned status {status}: {body}")]
    ApiStatus { status: u16, body: String },

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error in {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("No count found for lifecycle stage '{stage}'")]
    MissingStageData { stage: LifecycleStage },

    #[error("Lifecycle stage '{stage}' appears more than once")]
    DuplicateStageData { stage: LifecycleStage },

    #[error("Unknown lifecycle stage: {value}")]
    UnknownStage { value: String },

    #[error("Invalid period {value}: {reason}")]
    InvalidPeriod { value: String, reason: String },

    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    #[error("Fetch task failed: {message}")]
    TaskError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Configuration,
    Data,
    Storage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl CrmError {
    pub fn invalid_data(message: impl Into<String>) -> Self {
        CrmError::InvalidData {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            CrmError::ApiError(_) | CrmError::ApiStatus { .. } | CrmError::TaskError { .. } => {
                ErrorCategory::Network
            }
            CrmError::ConfigValidationError { .. }
            | CrmError::InvalidConfigValueError { .. }
            | CrmError::MissingConfigError { .. } => ErrorCategory::Configuration,
            CrmError::ZipError(_) | CrmError::IoError(_) | CrmError::CsvError(_) => {
                ErrorCategory::Storage
            }
            CrmError::SerializationError(_)
            | CrmError::MissingStageData { .. }
            | CrmError::DuplicateStageData { .. }
            | CrmError::UnknownStage { .. }
            | CrmError::InvalidPeriod { .. }
            | CrmError::InvalidData { .. } => ErrorCategory::Data,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 網路錯誤通常可以重試
            CrmError::ApiError(_) => ErrorSeverity::Medium,
            CrmError::ApiStatus { status, .. } if *status >= 500 => ErrorSeverity::Medium,
            CrmError::ApiStatus { .. } => ErrorSeverity::High,
            CrmError::TaskError { .. } => ErrorSeverity::Medium,
            CrmError::ConfigValidationError { .. }
            | CrmError::InvalidConfigValueError { .. }
            | CrmError::MissingConfigError { .. } => ErrorSeverity::High,
            CrmError::IoError(_) | CrmError::ZipError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => {
                "Check that the CRM proxy is reachable and the API token is valid, then retry"
            }
            ErrorCategory::Configuration => {
                "Review the command line flags or the TOML configuration file"
            }
            ErrorCategory::Data => {
                "The CRM proxy returned incomplete or malformed data; inspect the raw response"
            }
            ErrorCategory::Storage => "Check that the output directory exists and is writable",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            CrmError::ApiError(_) | CrmError::ApiStatus { .. } => {
                format!("Could not fetch data from the CRM proxy ({})", self)
            }
            CrmError::MissingStageData { stage } => format!(
                "The CRM did not report any count for the '{}' stage, the funnel cannot be computed",
                stage
            ),
            _ => self.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CrmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let missing = CrmError::MissingStageData {
            stage: LifecycleStage::Lead,
        };
        assert_eq!(missing.category(), ErrorCategory::Data);
        assert_eq!(missing.severity(), ErrorSeverity::High);
        assert!(missing.user_friendly_message().contains("'lead'"));

        let unavailable = CrmError::ApiStatus {
            status: 503,
            body: String::new(),
        };
        assert_eq!(unavailable.category(), ErrorCategory::Network);
        assert_eq!(unavailable.severity(), ErrorSeverity::Medium);

        let forbidden = CrmError::ApiStatus {
            status: 403,
            body: "forbidden".to_string(),
        };
        assert_eq!(forbidden.severity(), ErrorSeverity::High);

        let aborted = CrmError::TaskError {
            message: "task panicked".to_string(),
        };
        assert_eq!(aborted.category(), ErrorCategory::Network);
        assert_eq!(aborted.severity(), ErrorSeverity::Medium);
        assert!(!aborted.recovery_suggestion().contains("output directory"));
    }
}
