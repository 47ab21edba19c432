use crate::domain::model::{Contact, Contract, LifecycleStage, MonthlyBucket, Objectives, Period, StageCount};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageRollup {
    /// Contacts in this stage or any more advanced one.
    pub current_total: u64,
    /// Contacts in this stage not yet counted in the next tier up.
    pub to_convert: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunnelStageView {
    pub stage: LifecycleStage,
    pub title: String,
    pub content: String,
    pub objective: Option<f64>,
    pub current_total: u64,
    pub to_convert: u64,
    /// Share of this stage's total that reached the next stage.
    pub conversion_rate: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConversionSummary {
    pub lead_to_close_days: Option<f64>,
    pub subscriber_to_close_days: Option<f64>,
    pub customers: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MonthlyValue {
    pub period: Period,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MergedMonthlyValue {
    pub period: Period,
    pub quoted_value: f64,
    pub closed_value: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CurrentMonthAmounts {
    pub quoted: f64,
    pub closed: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageMonthlySeries {
    pub stage: LifecycleStage,
    pub counts: Vec<StageCount>,
    /// Entries of the latest month against the stage's monthly objective, in percent.
    pub current_month_progress: Option<f64>,
}

/// Raw data pulled from the CRM proxy.
#[derive(Debug, Clone, Default)]
pub struct DashboardData {
    pub periods: Vec<Period>,
    pub monthly_stage_counts: Vec<Vec<StageCount>>,
    pub current_stage_counts: Vec<StageCount>,
    pub customers: Vec<Contact>,
    pub monthly_contracts: Vec<MonthlyBucket<Contract>>,
    pub current_month_contracts: Vec<Contract>,
    /// Signed deals since January 1st.
    pub year_to_date_contracts: Vec<Contract>,
    pub objectives: Objectives,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardReport {
    pub periods: Vec<Period>,
    pub funnel: Vec<FunnelStageView>,
    pub stage_series: Vec<StageMonthlySeries>,
    pub conversion: ConversionSummary,
    pub quoted_by_month: Vec<MonthlyValue>,
    pub closed_by_month: Vec<MonthlyValue>,
    pub amounts_by_month: Vec<MergedMonthlyValue>,
    pub current_month: CurrentMonthAmounts,
    pub quoted_progress: Option<f64>,
    pub closed_progress: Option<f64>,
    /// Amount signed since January 1st.
    pub signed_year_to_date: f64,
    pub contracts: Vec<Contract>,
}
