use clap::Parser;
use crm_insights::domain::ports::ConfigProvider;
use crm_insights::utils::error::{CrmError, ErrorSeverity};
use crm_insights::utils::{logger, validation::Validate};
use crm_insights::{
    CliConfig, DashboardPipeline, LocalStorage, ProxyClient, ReportEngine, TomlConfig,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CliConfig::parse();

    if config.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(config.verbose);
    }

    tracing::info!("Starting crm-insights CLI");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    let exit_code = match config.config.clone() {
        Some(path) => {
            tracing::info!("📁 Loading configuration from: {}", path);
            match TomlConfig::from_file(&path) {
                Ok(toml_config) => run(toml_config).await,
                Err(e) => {
                    eprintln!("❌ Failed to load config file '{}': {}", path, e);
                    eprintln!("💡 {}", e.recovery_suggestion());
                    1
                }
            }
        }
        None => run(config).await,
    };

    if exit_code > 0 {
        std::process::exit(exit_code);
    }

    Ok(())
}

async fn run<C: ConfigProvider + Validate>(config: C) -> i32 {
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        return 1;
    }

    let source = match ProxyClient::from_config(&config) {
        Ok(source) => source,
        Err(e) => return report_failure(&e),
    };
    let storage = LocalStorage::new(config.output_path().to_string());
    let pipeline = DashboardPipeline::new(storage, config, source);
    let engine = ReportEngine::new(pipeline);

    match engine.run().await {
        Ok(output_path) => {
            tracing::info!("✅ Report completed successfully!");
            println!("✅ Report completed successfully!");
            println!("📁 Output saved to: {}", output_path);
            0
        }
        Err(e) => report_failure(&e),
    }
}

fn report_failure(e: &CrmError) -> i32 {
    tracing::error!(
        "❌ Report failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

    match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    }
}
