//! Funnel rollups: cumulative stage totals and what is left to convert.

use crate::domain::model::{LifecycleStage, Objectives, StageCount, StageTaxonomy};
use crate::domain::report::{FunnelStageView, StageRollup};
use crate::utils::error::{CrmError, Result};
use std::collections::BTreeMap;

/// Indexes a snapshot by stage. Every stage must appear exactly once.
fn counts_by_stage(counts: &[StageCount]) -> Result<BTreeMap<LifecycleStage, u64>> {
    let mut by_stage = BTreeMap::new();
    for entry in counts {
        if by_stage.insert(entry.stage, entry.count).is_some() {
            return Err(CrmError::DuplicateStageData { stage: entry.stage });
        }
    }

    if let Some(stage) = LifecycleStage::ALL
        .into_iter()
        .find(|stage| !by_stage.contains_key(stage))
    {
        return Err(CrmError::MissingStageData { stage });
    }

    Ok(by_stage)
}

fn cumulative_total(by_stage: &BTreeMap<LifecycleStage, u64>, stage: LifecycleStage) -> u64 {
    by_stage.range(stage..).map(|(_, count)| count).sum()
}

/// Total of contacts at or beyond `target`, and how many of them have not
/// reached the next stage yet.
pub fn compute_stage_rollup(counts: &[StageCount], target: LifecycleStage) -> Result<StageRollup> {
    let by_stage = counts_by_stage(counts)?;
    let current_total = cumulative_total(&by_stage, target);

    let to_convert = match target.next() {
        Some(next) => current_total - cumulative_total(&by_stage, next),
        None => 0,
    };

    Ok(StageRollup {
        current_total,
        to_convert,
    })
}

/// One view per stage, least advanced first.
pub fn build_funnel(
    counts: &[StageCount],
    objectives: &Objectives,
    taxonomy: &StageTaxonomy,
) -> Result<Vec<FunnelStageView>> {
    let mut views = Vec::with_capacity(LifecycleStage::ALL.len());

    for stage in LifecycleStage::ALL {
        let rollup = compute_stage_rollup(counts, stage)?;
        let conversion_rate = match stage.next() {
            Some(next) if rollup.current_total > 0 => {
                let next_total = compute_stage_rollup(counts, next)?.current_total;
                Some(next_total as f64 / rollup.current_total as f64)
            }
            _ => None,
        };
        let label = taxonomy.label(stage);

        views.push(FunnelStageView {
            stage,
            title: label.title,
            content: label.content,
            objective: objectives.objective_for(stage),
            current_total: rollup.current_total,
            to_convert: rollup.to_convert,
            conversion_rate,
        });
    }

    tracing::debug!(
        "Funnel built: {} contacts in total, {} customers",
        views.first().map(|v| v.current_total).unwrap_or(0),
        views.last().map(|v| v.current_total).unwrap_or(0)
    );

    Ok(views)
}

/// The given stage's count for every month, ascending by period. Months may
/// arrive in any order; entries without a period are skipped.
pub fn monthly_stage_series(per_month: &[Vec<StageCount>], stage: LifecycleStage) -> Vec<StageCount> {
    let mut series: Vec<StageCount> = per_month
        .iter()
        .flatten()
        .filter(|entry| entry.stage == stage)
        .filter(|entry| {
            if entry.period.is_none() {
                tracing::warn!("Ignoring '{}' count without a period", entry.stage);
            }
            entry.period.is_some()
        })
        .cloned()
        .collect();

    series.sort_by_key(|entry| entry.period);
    series
}

/// Percentage of a monthly objective reached.
pub fn objective_progress(value: f64, objective: Option<f64>) -> Option<f64> {
    match objective {
        Some(target) if target != 0.0 => Some(value / target * 100.0),
        _ => None,
    }
}
