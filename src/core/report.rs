use crate::core::conversion::summarize_conversion_times;
use crate::core::deals::{sort_contracts, ContractSortKey, SortDirection};
use crate::core::funnel::{build_funnel, monthly_stage_series, objective_progress};
use crate::core::monthly::{
    current_month_amounts, merge_by_shared_month, signed_only, signed_total, sum_by_month,
    ValuationField,
};
use crate::domain::model::{LifecycleStage, StageTaxonomy};
use crate::domain::report::{DashboardData, DashboardReport, StageMonthlySeries};
use crate::utils::error::{CrmError, Result};

/// Runs every computation of the dashboard over the fetched data.
pub fn build_report(data: DashboardData, taxonomy: &StageTaxonomy) -> Result<DashboardReport> {
    let funnel = build_funnel(&data.current_stage_counts, &data.objectives, taxonomy)?;

    let stage_series = LifecycleStage::ALL
        .into_iter()
        .map(|stage| {
            let counts = monthly_stage_series(&data.monthly_stage_counts, stage);
            let current_month_progress = counts.last().and_then(|latest| {
                objective_progress(latest.count as f64, data.objectives.objective_for(stage))
            });
            StageMonthlySeries {
                stage,
                counts,
                current_month_progress,
            }
        })
        .collect();

    let conversion = summarize_conversion_times(&data.customers);

    let quoted_by_month = sum_by_month(&data.monthly_contracts, ValuationField::Quoted);
    let closed_by_month = sum_by_month(&signed_only(&data.monthly_contracts), ValuationField::Closed);
    let amounts_by_month = merge_by_shared_month(&quoted_by_month, &closed_by_month);

    let current_month = current_month_amounts(&data.current_month_contracts);
    let quoted_progress =
        objective_progress(current_month.quoted, data.objectives.monthly_expected_revenue);
    let closed_progress =
        objective_progress(current_month.closed, data.objectives.monthly_signed_revenue);

    let signed_year_to_date = signed_total(&data.year_to_date_contracts);

    let mut periods = data.periods;
    periods.sort();

    // newest first, as the deal table opens
    let mut contracts = data.current_month_contracts;
    sort_contracts(&mut contracts, ContractSortKey::SentDate, SortDirection::Desc);

    Ok(DashboardReport {
        periods,
        funnel,
        stage_series,
        conversion,
        quoted_by_month,
        closed_by_month,
        amounts_by_month,
        current_month,
        quoted_progress,
        closed_progress,
        signed_year_to_date,
        contracts,
    })
}

pub fn funnel_csv(report: &DashboardReport) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "stage",
        "title",
        "current_total",
        "to_convert",
        "conversion_rate",
        "objective",
    ])?;

    for view in &report.funnel {
        writer.write_record([
            view.stage.code().to_string(),
            view.title.clone(),
            view.current_total.to_string(),
            view.to_convert.to_string(),
            optional_cell(view.conversion_rate),
            optional_cell(view.objective),
        ])?;
    }

    into_string(writer)
}

pub fn monthly_amounts_csv(report: &DashboardReport) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["month", "quoted", "closed"])?;

    for entry in &report.amounts_by_month {
        writer.write_record([
            entry.period.label(),
            entry.quoted_value.to_string(),
            entry.closed_value.to_string(),
        ])?;
    }

    into_string(writer)
}

fn optional_cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn into_string(writer: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = writer.into_inner().map_err(|e| {
        CrmError::IoError(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
    })?;
    String::from_utf8(bytes).map_err(|e| CrmError::invalid_data(e.to_string()))
}
