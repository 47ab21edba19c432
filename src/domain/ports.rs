use crate::domain::model::{
    Contact, Contract, DealStage, LifecycleStage, Objectives, Period, StageCount, StageTaxonomy,
};
use crate::domain::report::{DashboardData, DashboardReport};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn api_base_url(&self) -> &str;
    fn api_token(&self) -> Option<&str>;
    fn output_path(&self) -> &str;
    fn concurrent_requests(&self) -> usize;
    fn window_months(&self) -> u32;
    fn earliest_month(&self) -> &str;
    fn company_separator(&self) -> char;
    fn taxonomy(&self) -> StageTaxonomy;

    fn timeout_seconds(&self) -> Option<u64> {
        None
    }
}

/// Read access to the CRM proxy API.
#[async_trait]
pub trait CrmSource: Send + Sync {
    /// Contacts that entered each stage during the period.
    async fn stage_counts(&self, period: &Period) -> Result<Vec<StageCount>>;
    /// Contacts currently in each stage, counted once in their most advanced stage.
    async fn current_stage_counts(&self) -> Result<Vec<StageCount>>;
    async fn contacts_by_stage(&self, stage: Option<LifecycleStage>) -> Result<Vec<Contact>>;
    async fn contracts(
        &self,
        stage: Option<&DealStage>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Contract>>;
    async fn objectives(&self) -> Result<Objectives>;
    async fn update_objectives(&self, objectives: &Objectives) -> Result<()>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<DashboardData>;
    async fn transform(&self, data: DashboardData) -> Result<DashboardReport>;
    async fn load(&self, report: DashboardReport) -> Result<String>;
}
