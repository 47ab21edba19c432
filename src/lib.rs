pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::{cli::LocalStorage, toml_config::TomlConfig};

pub use adapters::proxy_client::ProxyClient;
pub use app::DashboardPipeline;
pub use core::engine::ReportEngine;
pub use utils::error::{CrmError, Result};
