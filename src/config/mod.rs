pub mod cli;
pub mod toml_config;

use crate::core::period::DEFAULT_WINDOW_MONTHS;
use crate::domain::model::StageTaxonomy;
use crate::domain::ports::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_month, validate_path, validate_range, validate_separator, validate_url, Validate,
};

pub const DEFAULT_CONCURRENT_REQUESTS: usize = 6;
pub const MAX_CONCURRENT_REQUESTS: usize = 50;
pub const MAX_WINDOW_MONTHS: u32 = 120;

pub const DEFAULT_EARLIEST_MONTH_LABEL: &str = "2023-05";
pub use crate::adapters::proxy_client::DEFAULT_COMPANY_SEPARATOR;

/// Range and format checks shared by every configuration source.
pub(crate) fn validate_provider<C: ConfigProvider + ?Sized>(config: &C) -> Result<()> {
    validate_url("api_base_url", config.api_base_url())?;
    validate_path("output_path", config.output_path())?;
    validate_range(
        "concurrent_requests",
        config.concurrent_requests(),
        1,
        MAX_CONCURRENT_REQUESTS,
    )?;
    validate_range("window_months", config.window_months(), 1, MAX_WINDOW_MONTHS)?;
    validate_month("earliest_month", config.earliest_month())?;
    validate_separator("company_separator", config.company_separator())?;
    Ok(())
}

#[cfg(feature = "cli")]
pub use self::cli_args::CliConfig;

#[cfg(feature = "cli")]
mod cli_args {
    use super::*;
    use clap::Parser;
    use serde::{Deserialize, Serialize};

    #[derive(Clone, Serialize, Deserialize, Parser)]
    #[command(name = "crm-insights")]
    #[command(about = "Funnel and revenue report from a CRM proxy API")]
    pub struct CliConfig {
        #[arg(long, default_value = "http://localhost:3000/")]
        pub api_base_url: String,

        #[arg(long, env = "CRM_API_TOKEN", hide_env_values = true)]
        pub api_token: Option<String>,

        #[arg(long, default_value = "./output")]
        pub output_path: String,

        #[arg(long, default_value_t = DEFAULT_WINDOW_MONTHS)]
        pub window_months: u32,

        #[arg(long, default_value = DEFAULT_EARLIEST_MONTH_LABEL)]
        pub earliest_month: String,

        #[arg(long, default_value_t = DEFAULT_CONCURRENT_REQUESTS)]
        pub concurrent_requests: usize,

        #[arg(long, default_value_t = DEFAULT_COMPANY_SEPARATOR)]
        pub company_separator: char,

        /// Read settings from a TOML file instead of the flags above.
        #[arg(long)]
        pub config: Option<String>,

        #[arg(long, help = "Enable verbose output")]
        pub verbose: bool,

        /// Emit logs as JSON lines.
        #[arg(long)]
        pub json_logs: bool,
    }

    // the token never reaches the logs
    impl std::fmt::Debug for CliConfig {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("CliConfig")
                .field("api_base_url", &self.api_base_url)
                .field("api_token", &self.api_token.as_ref().map(|_| "***"))
                .field("output_path", &self.output_path)
                .field("window_months", &self.window_months)
                .field("earliest_month", &self.earliest_month)
                .field("concurrent_requests", &self.concurrent_requests)
                .field("company_separator", &self.company_separator)
                .field("config", &self.config)
                .field("verbose", &self.verbose)
                .field("json_logs", &self.json_logs)
                .finish()
        }
    }

    impl ConfigProvider for CliConfig {
        fn api_base_url(&self) -> &str {
            &self.api_base_url
        }

        fn api_token(&self) -> Option<&str> {
            self.api_token.as_deref()
        }

        fn output_path(&self) -> &str {
            &self.output_path
        }

        fn concurrent_requests(&self) -> usize {
            self.concurrent_requests
        }

        fn window_months(&self) -> u32 {
            self.window_months
        }

        fn earliest_month(&self) -> &str {
            &self.earliest_month
        }

        fn company_separator(&self) -> char {
            self.company_separator
        }

        fn taxonomy(&self) -> StageTaxonomy {
            StageTaxonomy::default()
        }
    }

    impl Validate for CliConfig {
        fn validate(&self) -> Result<()> {
            validate_provider(self)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_defaults_are_valid() {
            let config = CliConfig::parse_from(["crm-insights"]);
            assert_eq!(config.window_months, 24);
            assert_eq!(config.earliest_month, "2023-05");
            assert!(config.validate().is_ok());
        }

        #[test]
        fn test_debug_output_hides_token() {
            let config =
                CliConfig::parse_from(["crm-insights", "--api-token", "s3cr3t-value"]);

            let printed = format!("{:?}", config);

            assert!(!printed.contains("s3cr3t-value"));
            assert!(printed.contains("api_token: Some(\"***\")"));
            assert!(printed.contains("api_base_url"));
        }

        #[test]
        fn test_json_logs_flag() {
            assert!(!CliConfig::parse_from(["crm-insights"]).json_logs);
            assert!(CliConfig::parse_from(["crm-insights", "--json-logs"]).json_logs);
        }

        #[test]
        fn test_rejects_bad_values() {
            let config = CliConfig::parse_from([
                "crm-insights",
                "--earliest-month",
                "2023-13",
            ]);
            assert!(config.validate().is_err());

            let config =
                CliConfig::parse_from(["crm-insights", "--concurrent-requests", "0"]);
            assert!(config.validate().is_err());

            let config = CliConfig::parse_from(["crm-insights", "--api-base-url", "nope"]);
            assert!(config.validate().is_err());
        }
    }
}
