use crate::domain::model::{Contact, LifecycleStage};
use crate::domain::report::ConversionSummary;
use chrono::{DateTime, Utc};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FromMilestone {
    /// Lead date, or creation date for contacts that skipped the lead stage.
    Lead,
    Subscriber,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToMilestone {
    Close,
}

pub fn resolve_start_date(contact: &Contact, from: FromMilestone) -> Option<DateTime<Utc>> {
    match from {
        FromMilestone::Lead => contact.lead_date.or(contact.created_date),
        FromMilestone::Subscriber => contact.subscriber_date,
    }
}

fn resolve_end_date(contact: &Contact, to: ToMilestone) -> Option<DateTime<Utc>> {
    match to {
        ToMilestone::Close => contact.close_date,
    }
}

/// Whole days between two instants, partial days rounded up.
pub fn elapsed_days(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    let millis = (end - start).num_milliseconds() as f64;
    (millis / MILLIS_PER_DAY).ceil() as i64
}

/// Mean number of days customers took to go from one milestone to the other.
/// `None` when no customer has both dates.
pub fn compute_average_transition_days(
    contacts: &[Contact],
    from: FromMilestone,
    to: ToMilestone,
) -> Option<f64> {
    let samples: Vec<i64> = contacts
        .iter()
        .filter(|contact| contact.lifecycle_stage == LifecycleStage::Customer)
        .filter_map(|contact| {
            let start = resolve_start_date(contact, from);
            let end = resolve_end_date(contact, to);
            match (start, end) {
                (Some(start), Some(end)) => Some(elapsed_days(start, end)),
                _ => {
                    tracing::debug!(
                        "Contact {} skipped: missing {:?} or {:?} date",
                        contact.id,
                        from,
                        to
                    );
                    None
                }
            }
        })
        .collect();

    if samples.is_empty() {
        return None;
    }

    let total: i64 = samples.iter().sum();
    Some(total as f64 / samples.len() as f64)
}

pub fn summarize_conversion_times(contacts: &[Contact]) -> ConversionSummary {
    ConversionSummary {
        lead_to_close_days: compute_average_transition_days(
            contacts,
            FromMilestone::Lead,
            ToMilestone::Close,
        ),
        subscriber_to_close_days: compute_average_transition_days(
            contacts,
            FromMilestone::Subscriber,
            ToMilestone::Close,
        ),
        customers: contacts
            .iter()
            .filter(|contact| contact.lifecycle_stage == LifecycleStage::Customer)
            .count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
    }

    fn customer(id: u64) -> Contact {
        Contact {
            id,
            lifecycle_stage: LifecycleStage::Customer,
            ..Default::default()
        }
    }

    #[test]
    fn test_single_customer_ten_days() {
        let contact = Contact {
            lead_date: Some(date(2024, 1, 1)),
            close_date: Some(date(2024, 1, 11)),
            ..customer(1)
        };

        let average =
            compute_average_transition_days(&[contact], FromMilestone::Lead, ToMilestone::Close);
        assert_eq!(average, Some(10.0));
    }

    #[test]
    fn test_no_customers_is_none() {
        let lead = Contact {
            id: 1,
            lifecycle_stage: LifecycleStage::Lead,
            lead_date: Some(date(2024, 1, 1)),
            close_date: Some(date(2024, 1, 11)),
            ..Default::default()
        };

        assert_eq!(
            compute_average_transition_days(&[lead], FromMilestone::Lead, ToMilestone::Close),
            None
        );
        assert_eq!(
            compute_average_transition_days(&[], FromMilestone::Lead, ToMilestone::Close),
            None
        );
    }

    #[test]
    fn test_lead_falls_back_to_creation_date() {
        let contact = Contact {
            created_date: Some(date(2024, 2, 1)),
            close_date: Some(date(2024, 2, 5)),
            ..customer(7)
        };

        assert_eq!(
            resolve_start_date(&contact, FromMilestone::Lead),
            Some(date(2024, 2, 1))
        );
        assert_eq!(resolve_start_date(&contact, FromMilestone::Subscriber), None);
        assert_eq!(
            compute_average_transition_days(&[contact], FromMilestone::Lead, ToMilestone::Close),
            Some(4.0)
        );
    }

    #[test]
    fn test_partial_days_round_up() {
        let start = date(2024, 1, 1);
        let end = Utc.with_ymd_and_hms(2024, 1, 3, 1, 0, 0).unwrap();
        assert_eq!(elapsed_days(start, end), 3);
        assert_eq!(elapsed_days(start, start), 0);
    }

    #[test]
    fn test_incomplete_contacts_are_skipped() {
        let contacts = vec![
            Contact {
                lead_date: Some(date(2024, 1, 1)),
                close_date: Some(date(2024, 1, 11)),
                ..customer(1)
            },
            Contact {
                lead_date: Some(date(2024, 1, 1)),
                close_date: Some(date(2024, 1, 21)),
                ..customer(2)
            },
            // no close date
            Contact {
                lead_date: Some(date(2024, 1, 1)),
                ..customer(3)
            },
            // no start date at all
            Contact {
                close_date: Some(date(2024, 3, 1)),
                ..customer(4)
            },
        ];

        assert_eq!(
            compute_average_transition_days(&contacts, FromMilestone::Lead, ToMilestone::Close),
            Some(15.0)
        );
    }

    #[test]
    fn test_summary_averages_each_milestone_separately() {
        let contacts = vec![
            Contact {
                lead_date: Some(date(2024, 1, 1)),
                subscriber_date: Some(date(2024, 1, 9)),
                close_date: Some(date(2024, 1, 11)),
                ..customer(1)
            },
            Contact {
                lead_date: Some(date(2024, 1, 1)),
                close_date: Some(date(2024, 1, 31)),
                ..customer(2)
            },
        ];

        let summary = summarize_conversion_times(&contacts);
        assert_eq!(summary.lead_to_close_days, Some(20.0));
        assert_eq!(summary.subscriber_to_close_days, Some(2.0));
        assert_eq!(summary.customers, 2);
    }
}
