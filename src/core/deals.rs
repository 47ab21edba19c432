use crate::domain::model::Contract;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractSortKey {
    Company,
    QuotedAmount,
    SentDate,
    ClosedAmount,
    ClosedDate,
    Stage,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// Clicking the same column again flips the direction.
    pub fn toggled(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

/// Company name: the part of the deal name before the separator.
pub fn company_from_deal_name(deal_name: &str, separator: char) -> String {
    deal_name
        .split(separator)
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

fn compare_by(a: &Contract, b: &Contract, key: ContractSortKey) -> Ordering {
    match key {
        ContractSortKey::Company => a.company.cmp(&b.company),
        ContractSortKey::QuotedAmount => a.quoted_amount.total_cmp(&b.quoted_amount),
        ContractSortKey::SentDate => a.sent_date.cmp(&b.sent_date),
        ContractSortKey::ClosedAmount => a.closed_amount.total_cmp(&b.closed_amount),
        ContractSortKey::ClosedDate => a.closed_date.cmp(&b.closed_date),
        ContractSortKey::Stage => a.stage.code().cmp(b.stage.code()),
    }
}

/// Stable sort of the deals table by one column.
pub fn sort_contracts(contracts: &mut [Contract], key: ContractSortKey, direction: SortDirection) {
    contracts.sort_by(|a, b| {
        let ordering = compare_by(a, b, key);
        match direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::DealStage;
    use chrono::{TimeZone, Utc};

    fn deal(company: &str, quoted: f64, day: u32, closed_day: Option<u32>) -> Contract {
        Contract {
            company: company.to_string(),
            quoted_amount: quoted,
            closed_amount: 0.0,
            stage: if closed_day.is_some() {
                DealStage::ClosedWon
            } else {
                DealStage::ContractSent
            },
            sent_date: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            closed_date: closed_day.map(|d| Utc.with_ymd_and_hms(2024, 2, d, 0, 0, 0).unwrap()),
        }
    }

    #[test]
    fn test_company_from_deal_name() {
        assert_eq!(company_from_deal_name("Acme Corp - Website redesign", '-'), "Acme Corp");
        assert_eq!(company_from_deal_name("Solo", '-'), "Solo");
        assert_eq!(company_from_deal_name("Globex | Audit", '|'), "Globex");
        assert_eq!(company_from_deal_name("", '-'), "");
    }

    #[test]
    fn test_sort_by_amount_both_directions() {
        let mut deals = vec![deal("B", 300.0, 2, None), deal("A", 100.0, 3, None), deal("C", 200.0, 1, None)];

        sort_contracts(&mut deals, ContractSortKey::QuotedAmount, SortDirection::Asc);
        let companies: Vec<&str> = deals.iter().map(|d| d.company.as_str()).collect();
        assert_eq!(companies, vec!["A", "C", "B"]);

        sort_contracts(&mut deals, ContractSortKey::QuotedAmount, SortDirection::Desc);
        let companies: Vec<&str> = deals.iter().map(|d| d.company.as_str()).collect();
        assert_eq!(companies, vec!["B", "C", "A"]);
    }

    #[test]
    fn test_sort_by_closed_date_puts_open_deals_first() {
        let mut deals = vec![deal("Won late", 1.0, 1, Some(20)), deal("Open", 1.0, 2, None), deal("Won early", 1.0, 3, Some(5))];

        sort_contracts(&mut deals, ContractSortKey::ClosedDate, SortDirection::Asc);
        let companies: Vec<&str> = deals.iter().map(|d| d.company.as_str()).collect();
        assert_eq!(companies, vec!["Open", "Won early", "Won late"]);
    }

    #[test]
    fn test_sort_is_stable() {
        let mut deals = vec![deal("first", 1.0, 1, None), deal("second", 1.0, 1, None)];
        sort_contracts(&mut deals, ContractSortKey::Stage, SortDirection::Desc);
        assert_eq!(deals[0].company, "first");
        assert_eq!(SortDirection::Asc.toggled(), SortDirection::Desc);
    }
}
