use crate::config::{
    validate_provider, DEFAULT_COMPANY_SEPARATOR, DEFAULT_CONCURRENT_REQUESTS,
    DEFAULT_EARLIEST_MONTH_LABEL,
};
use crate::core::period::DEFAULT_WINDOW_MONTHS;
use crate::domain::model::{LifecycleStage, StageLabel, StageTaxonomy};
use crate::domain::ports::ConfigProvider;
use crate::utils::error::{CrmError, Result};
use crate::utils::validation::Validate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub source: SourceConfig,
    pub periods: Option<PeriodsConfig>,
    pub extract: Option<ExtractConfig>,
    pub deals: Option<DealsConfig>,
    pub load: LoadConfig,
    /// Label overrides keyed by lifecycle stage code.
    pub stages: Option<BTreeMap<String, StageLabel>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub base_url: String,
    pub token: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodsConfig {
    pub window_months: Option<u32>,
    pub earliest_month: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    pub concurrent_requests: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DealsConfig {
    pub company_separator: Option<char>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    pub output_path: String,
}

impl TomlConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(CrmError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        let mut config: Self =
            toml::from_str(&processed_content).map_err(|e| CrmError::ConfigValidationError {
                field: "toml_parsing".to_string(),
                message: format!("TOML parsing error: {}", e),
            })?;

        // An unset token variable means "no token", not a literal "${...}".
        if config
            .source
            .token
            .as_deref()
            .is_some_and(|t| t.trim().is_empty() || t.contains("${"))
        {
            config.source.token = None;
        }

        Ok(config)
    }

    /// Replaces `${VAR_NAME}` with the environment value; unknown names are left as is.
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| CrmError::ConfigValidationError {
            field: "env_substitution".to_string(),
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_provider(self)?;

        if let Some(stages) = &self.stages {
            for (code, label) in stages {
                code.parse::<LifecycleStage>()
                    .map_err(|_| CrmError::InvalidConfigValueError {
                        field: "stages".to_string(),
                        value: code.clone(),
                        reason: "Unknown lifecycle stage".to_string(),
                    })?;
                if label.title.trim().is_empty() {
                    return Err(CrmError::InvalidConfigValueError {
                        field: format!("stages.{}.title", code),
                        value: label.title.clone(),
                        reason: "Title cannot be empty".to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}

impl ConfigProvider for TomlConfig {
    fn api_base_url(&self) -> &str {
        &self.source.base_url
    }

    fn api_token(&self) -> Option<&str> {
        self.source.token.as_deref()
    }

    fn output_path(&self) -> &str {
        &self.load.output_path
    }

    fn concurrent_requests(&self) -> usize {
        self.extract
            .as_ref()
            .and_then(|e| e.concurrent_requests)
            .unwrap_or(DEFAULT_CONCURRENT_REQUESTS)
    }

    fn window_months(&self) -> u32 {
        self.periods
            .as_ref()
            .and_then(|p| p.window_months)
            .unwrap_or(DEFAULT_WINDOW_MONTHS)
    }

    fn earliest_month(&self) -> &str {
        self.periods
            .as_ref()
            .and_then(|p| p.earliest_month.as_deref())
            .unwrap_or(DEFAULT_EARLIEST_MONTH_LABEL)
    }

    fn company_separator(&self) -> char {
        self.deals
            .as_ref()
            .and_then(|d| d.company_separator)
            .unwrap_or(DEFAULT_COMPANY_SEPARATOR)
    }

    fn taxonomy(&self) -> StageTaxonomy {
        let overrides = self
            .stages
            .iter()
            .flatten()
            .filter_map(|(code, label)| match code.parse::<LifecycleStage>() {
                Ok(stage) => Some((stage, label.clone())),
                Err(_) => {
                    tracing::warn!("Ignoring labels for unknown stage '{}'", code);
                    None
                }
            })
            .collect();
        StageTaxonomy::default().with_overrides(overrides)
    }

    fn timeout_seconds(&self) -> Option<u64> {
        self.source.timeout_seconds
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
