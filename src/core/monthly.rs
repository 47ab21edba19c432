//! Per-month deal amounts.

use crate::domain::model::{Contract, DealStage, MonthlyBucket, Period};
use crate::domain::report::{CurrentMonthAmounts, MergedMonthlyValue, MonthlyValue};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValuationField {
    /// Amount proposed in the quote.
    Quoted,
    /// Final signed amount.
    Closed,
}

impl ValuationField {
    pub fn value_of(&self, contract: &Contract) -> f64 {
        match self {
            ValuationField::Quoted => contract.quoted_amount,
            ValuationField::Closed => contract.closed_amount,
        }
    }
}

/// Starts from +0.0: `Iterator::sum` on floats yields -0.0 for no items.
fn total(values: impl Iterator<Item = f64>) -> f64 {
    values.fold(0.0, |acc, value| acc + value)
}

pub fn sum_field(contracts: &[Contract], field: ValuationField) -> f64 {
    total(contracts.iter().map(|contract| field.value_of(contract)))
}

/// One value per bucket, ascending by period. Empty buckets sum to 0.
pub fn sum_by_month(buckets: &[MonthlyBucket<Contract>], field: ValuationField) -> Vec<MonthlyValue> {
    let mut values: Vec<MonthlyValue> = buckets
        .iter()
        .map(|bucket| MonthlyValue {
            period: bucket.period,
            value: sum_field(&bucket.items, field),
        })
        .collect();

    values.sort_by_key(|entry| entry.period);
    values
}

/// Pairs two series by calendar month. A month missing on one side counts as 0.
pub fn merge_by_shared_month(
    quoted: &[MonthlyValue],
    closed: &[MonthlyValue],
) -> Vec<MergedMonthlyValue> {
    let mut merged: Vec<MergedMonthlyValue> = quoted
        .iter()
        .map(|entry| MergedMonthlyValue {
            period: entry.period,
            quoted_value: entry.value,
            closed_value: 0.0,
        })
        .collect();

    for entry in closed {
        match merged.iter_mut().find(|m| m.period.same_month(&entry.period)) {
            Some(existing) => existing.closed_value += entry.value,
            None => merged.push(MergedMonthlyValue {
                period: entry.period,
                quoted_value: 0.0,
                closed_value: entry.value,
            }),
        }
    }

    merged.sort_by_key(|entry| entry.period);
    merged
}

/// Groups items into the given periods by their relevant date. Each period
/// gets a bucket, even an empty one; items outside every period are dropped.
pub fn bucket_by_period<T, F>(items: Vec<T>, periods: &[Period], date_of: F) -> Vec<MonthlyBucket<T>>
where
    F: Fn(&T) -> DateTime<Utc>,
{
    let mut buckets: Vec<MonthlyBucket<T>> = periods
        .iter()
        .map(|period| MonthlyBucket::new(*period, Vec::new()))
        .collect();
    let mut dropped = 0usize;

    for item in items {
        let date = date_of(&item);
        match buckets.iter_mut().find(|bucket| bucket.period.contains(date)) {
            Some(bucket) => bucket.items.push(item),
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        tracing::debug!("{} items fell outside the requested periods", dropped);
    }

    buckets.sort_by_key(|bucket| bucket.period);
    buckets
}

/// Same buckets holding only the signed deals.
pub fn signed_only(buckets: &[MonthlyBucket<Contract>]) -> Vec<MonthlyBucket<Contract>> {
    buckets
        .iter()
        .map(|bucket| {
            let signed = bucket
                .items
                .iter()
                .filter(|contract| contract.stage == DealStage::ClosedWon)
                .cloned()
                .collect();
            MonthlyBucket::new(bucket.period, signed)
        })
        .collect()
}

/// Closed amount of the signed deals in the list.
pub fn signed_total(contracts: &[Contract]) -> f64 {
    total(
        contracts
            .iter()
            .filter(|contract| contract.stage == DealStage::ClosedWon)
            .map(|contract| contract.closed_amount),
    )
}

/// Quoted covers every deal of the month whatever its stage; closed only
/// counts signed deals.
pub fn current_month_amounts(contracts: &[Contract]) -> CurrentMonthAmounts {
    CurrentMonthAmounts {
        quoted: sum_field(contracts, ValuationField::Quoted),
        closed: signed_total(contracts),
    }
}
