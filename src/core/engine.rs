use crate::domain::ports::Pipeline;
use crate::utils::error::Result;
use std::time::Instant;

pub struct ReportEngine<P: Pipeline> {
    pipeline: P,
}

impl<P: Pipeline> ReportEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self { pipeline }
    }

    pub async fn run(&self) -> Result<String> {
        let started = Instant::now();
        tracing::info!("🚀 Starting dashboard report");

        // Extract
        tracing::info!("📥 Fetching CRM data...");
        let data = self.pipeline.extract().await?;
        tracing::info!(
            "Fetched {} months, {} customers, {} current-month deals",
            data.periods.len(),
            data.customers.len(),
            data.current_month_contracts.len()
        );

        // Transform
        tracing::info!("🔄 Computing metrics...");
        let report = self.pipeline.transform(data).await?;
        tracing::info!(
            "Computed funnel over {} stages and {} monthly amounts",
            report.funnel.len(),
            report.amounts_by_month.len()
        );

        // Load
        tracing::info!("💾 Writing report...");
        let output_path = self.pipeline.load(report).await?;
        tracing::info!("Report saved to: {} ({:?})", output_path, started.elapsed());

        Ok(output_path)
    }
}
