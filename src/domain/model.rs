use crate::utils::error::{CrmError, Result};
use chrono::{DateTime, Datelike, Days, Duration, Months, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// One calendar month, from its first to its last instant (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    // always the first day of the month
    first_day: NaiveDate,
}

impl Period {
    pub fn month(year: i32, month: u32) -> Result<Self> {
        let first_day = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
            CrmError::InvalidPeriod {
                value: format!("{:04}-{:02}", year, month),
                reason: "month must be between 1 and 12".to_string(),
            }
        })?;
        Ok(Self { first_day })
    }

    /// Month containing the given day.
    pub fn containing(date: NaiveDate) -> Self {
        Self {
            first_day: date - Days::new(u64::from(date.day0())),
        }
    }

    pub fn containing_instant(instant: DateTime<Utc>) -> Self {
        Self::containing(instant.date_naive())
    }

    /// Parses a `YYYY-MM` month label.
    pub fn parse(value: &str) -> Result<Self> {
        let invalid = |reason: &str| CrmError::InvalidPeriod {
            value: value.to_string(),
            reason: reason.to_string(),
        };

        let (year, month) = value
            .trim()
            .split_once('-')
            .ok_or_else(|| invalid("expected YYYY-MM"))?;
        let year: i32 = year.parse().map_err(|_| invalid("year is not a number"))?;
        let month: u32 = month.parse().map_err(|_| invalid("month is not a number"))?;

        Self::month(year, month)
    }

    pub fn date_from(&self) -> DateTime<Utc> {
        self.first_day.and_time(NaiveTime::MIN).and_utc()
    }

    pub fn date_to(&self) -> DateTime<Utc> {
        let next_month = self.first_day + Months::new(1);
        next_month.and_time(NaiveTime::MIN).and_utc() - Duration::milliseconds(1)
    }

    pub fn first_day(&self) -> NaiveDate {
        self.first_day
    }

    pub fn last_day(&self) -> NaiveDate {
        self.first_day + Months::new(1) - Days::new(1)
    }

    pub fn year(&self) -> i32 {
        self.first_day.year()
    }

    pub fn month_number(&self) -> u32 {
        self.first_day.month()
    }

    pub fn previous(&self) -> Self {
        Self {
            first_day: self.first_day - Months::new(1),
        }
    }

    /// Same calendar month and year, regardless of how the periods were built.
    pub fn same_month(&self, other: &Period) -> bool {
        self.year() == other.year() && self.month_number() == other.month_number()
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.date_from() && instant <= self.date_to()
    }

    pub fn from_millis(&self) -> i64 {
        self.date_from().timestamp_millis()
    }

    pub fn to_millis(&self) -> i64 {
        self.date_to().timestamp_millis()
    }

    pub fn label(&self) -> String {
        format!("{:04}-{:02}", self.year(), self.month_number())
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl FromStr for Period {
    type Err = CrmError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct PeriodRepr {
            month: String,
            date_from: DateTime<Utc>,
            date_to: DateTime<Utc>,
        }

        PeriodRepr {
            month: self.label(),
            date_from: self.date_from(),
            date_to: self.date_to(),
        }
        .serialize(serializer)
    }
}

/// Funnel stages, least to most advanced. The declaration order is the rank.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleStage {
    #[default]
    Other,
    Lead,
    Opportunity,
    Subscriber,
    Customer,
}

impl LifecycleStage {
    pub const ALL: [LifecycleStage; 5] = [
        LifecycleStage::Other,
        LifecycleStage::Lead,
        LifecycleStage::Opportunity,
        LifecycleStage::Subscriber,
        LifecycleStage::Customer,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            LifecycleStage::Other => "other",
            LifecycleStage::Lead => "lead",
            LifecycleStage::Opportunity => "opportunity",
            LifecycleStage::Subscriber => "subscriber",
            LifecycleStage::Customer => "customer",
        }
    }

    /// Contact property holding the date the contact entered this stage.
    pub fn date_property(&self) -> &'static str {
        match self {
            LifecycleStage::Other => "hs_lifecyclestage_other_date",
            LifecycleStage::Lead => "hs_lifecyclestage_lead_date",
            LifecycleStage::Opportunity => "hs_lifecyclestage_opportunity_date",
            LifecycleStage::Subscriber => "hs_lifecyclestage_subscriber_date",
            LifecycleStage::Customer => "hs_lifecyclestage_customer_date",
        }
    }

    /// Next more advanced stage, `None` for customers.
    pub fn next(&self) -> Option<Self> {
        match self {
            LifecycleStage::Other => Some(LifecycleStage::Lead),
            LifecycleStage::Lead => Some(LifecycleStage::Opportunity),
            LifecycleStage::Opportunity => Some(LifecycleStage::Subscriber),
            LifecycleStage::Subscriber => Some(LifecycleStage::Customer),
            LifecycleStage::Customer => None,
        }
    }
}

impl fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for LifecycleStage {
    type Err = CrmError;

    fn from_str(s: &str) -> Result<Self> {
        LifecycleStage::ALL
            .into_iter()
            .find(|stage| stage.code() == s || stage.date_property() == s)
            .ok_or_else(|| CrmError::UnknownStage {
                value: s.to_string(),
            })
    }
}

/// How many contacts entered a stage during a period, or sit in it right now
/// when `period` is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageCount {
    pub stage: LifecycleStage,
    pub count: u64,
    pub period: Option<Period>,
}

impl StageCount {
    pub fn new(stage: LifecycleStage, count: u64) -> Self {
        Self {
            stage,
            count,
            period: None,
        }
    }

    pub fn with_period(mut self, period: Period) -> Self {
        self.period = Some(period);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Contact {
    pub id: u64,
    pub lifecycle_stage: LifecycleStage,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub email: Option<String>,
    pub created_date: Option<DateTime<Utc>>,
    pub lead_date: Option<DateTime<Utc>>,
    pub subscriber_date: Option<DateTime<Utc>>,
    pub close_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DealStage {
    ContractSent,
    ClosedWon,
    ClosedLost,
    Other(String),
}

impl DealStage {
    pub fn from_code(code: &str) -> Self {
        match code {
            "contractsent" => DealStage::ContractSent,
            "closedwon" => DealStage::ClosedWon,
            "closedlost" => DealStage::ClosedLost,
            other => DealStage::Other(other.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            DealStage::ContractSent => "contractsent",
            DealStage::ClosedWon => "closedwon",
            DealStage::ClosedLost => "closedlost",
            DealStage::Other(code) => code,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DealStage::ContractSent => "Contract sent",
            DealStage::ClosedWon => "Signed quote",
            DealStage::ClosedLost => "Lost opportunity",
            DealStage::Other(_) => "Other",
        }
    }
}

impl Serialize for DealStage {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

/// A deal, as shown in the contracts table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contract {
    pub company: String,
    /// Amount proposed while the deal is in its quoted stage.
    pub quoted_amount: f64,
    /// Final signed amount.
    pub closed_amount: f64,
    pub stage: DealStage,
    pub sent_date: DateTime<Utc>,
    pub closed_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyBucket<T> {
    pub period: Period,
    pub items: Vec<T>,
}

impl<T> MonthlyBucket<T> {
    pub fn new(period: Period, items: Vec<T>) -> Self {
        Self { period, items }
    }
}

/// Monthly targets, stored by the proxy under their historical names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Objectives {
    #[serde(rename = "MONTHLY_CONTACTS_OBJ", default)]
    pub monthly_contacts: Option<f64>,
    #[serde(rename = "MONTHLY_LEADS_OBJ", default)]
    pub monthly_leads: Option<f64>,
    #[serde(rename = "MONTHLY_PROSPECTS_OBJ", default)]
    pub monthly_prospects: Option<f64>,
    #[serde(rename = "MONTHLY_ADVANCED_PROSPECTS_OBJ", default)]
    pub monthly_advanced_prospects: Option<f64>,
    #[serde(rename = "MONTHLY_CLIENTS_OBJ", default)]
    pub monthly_clients: Option<f64>,
    #[serde(rename = "MONTHLY_EXPECTED_CA", default)]
    pub monthly_expected_revenue: Option<f64>,
    #[serde(rename = "MONTHLY_SIGNED_CA", default)]
    pub monthly_signed_revenue: Option<f64>,
}

impl Objectives {
    pub const NAMES: [&'static str; 7] = [
        "MONTHLY_CONTACTS_OBJ",
        "MONTHLY_LEADS_OBJ",
        "MONTHLY_PROSPECTS_OBJ",
        "MONTHLY_ADVANCED_PROSPECTS_OBJ",
        "MONTHLY_CLIENTS_OBJ",
        "MONTHLY_EXPECTED_CA",
        "MONTHLY_SIGNED_CA",
    ];

    pub fn objective_for(&self, stage: LifecycleStage) -> Option<f64> {
        match stage {
            LifecycleStage::Other => self.monthly_contacts,
            LifecycleStage::Lead => self.monthly_leads,
            LifecycleStage::Opportunity => self.monthly_prospects,
            LifecycleStage::Subscriber => self.monthly_advanced_prospects,
            LifecycleStage::Customer => self.monthly_clients,
        }
    }

    /// Sets a target by its stored name; `None` clears it.
    pub fn set(&mut self, name: &str, value: Option<f64>) -> Result<()> {
        let slot = match name {
            "MONTHLY_CONTACTS_OBJ" => &mut self.monthly_contacts,
            "MONTHLY_LEADS_OBJ" => &mut self.monthly_leads,
            "MONTHLY_PROSPECTS_OBJ" => &mut self.monthly_prospects,
            "MONTHLY_ADVANCED_PROSPECTS_OBJ" => &mut self.monthly_advanced_prospects,
            "MONTHLY_CLIENTS_OBJ" => &mut self.monthly_clients,
            "MONTHLY_EXPECTED_CA" => &mut self.monthly_expected_revenue,
            "MONTHLY_SIGNED_CA" => &mut self.monthly_signed_revenue,
            _ => {
                return Err(CrmError::InvalidConfigValueError {
                    field: "objective".to_string(),
                    value: name.to_string(),
                    reason: format!("Known objectives: {}", Self::NAMES.join(", ")),
                })
            }
        };
        *slot = value;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageLabel {
    /// Chart title (e.g. "Leads").
    pub title: String,
    /// Legend of the charted value.
    pub content: String,
}

/// Display names of the funnel stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTaxonomy {
    labels: BTreeMap<LifecycleStage, StageLabel>,
}

impl StageTaxonomy {
    pub fn new(labels: BTreeMap<LifecycleStage, StageLabel>) -> Self {
        Self { labels }
    }

    pub fn with_overrides(mut self, overrides: BTreeMap<LifecycleStage, StageLabel>) -> Self {
        self.labels.extend(overrides);
        self
    }

    pub fn label(&self, stage: LifecycleStage) -> StageLabel {
        self.labels.get(&stage).cloned().unwrap_or_else(|| StageLabel {
            title: stage.code().to_string(),
            content: format!("Number of {}", stage.code()),
        })
    }
}

impl Default for StageTaxonomy {
    fn default() -> Self {
        let label = |title: &str, content: &str| StageLabel {
            title: title.to_string(),
            content: content.to_string(),
        };

        let labels = BTreeMap::from([
            (LifecycleStage::Other, label("Contacts", "Number of contacts")),
            (LifecycleStage::Lead, label("Leads", "Number of leads")),
            (
                LifecycleStage::Opportunity,
                label("Prospects", "Number of prospects"),
            ),
            (
                LifecycleStage::Subscriber,
                label("Advanced prospects", "Number of advanced prospects"),
            ),
            (LifecycleStage::Customer, label("Clients", "Number of clients")),
        ]);

        Self { labels }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_period_bounds() {
        let february = Period::month(2024, 2).unwrap();
        assert_eq!(
            february.date_from(),
            Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()
        );
        assert_eq!(february.last_day(), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(
            february.date_to(),
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() - Duration::milliseconds(1)
        );
        assert!(february.date_from() <= february.date_to());

        let december = Period::month(2023, 12).unwrap();
        assert_eq!(december.last_day(), NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
        assert_eq!(december.previous().label(), "2023-11");
        assert_eq!(Period::month(2024, 1).unwrap().previous(), december);
    }

    #[test]
    fn test_period_parse_and_contains() {
        let period = Period::parse("2023-05").unwrap();
        assert_eq!(period, Period::month(2023, 5).unwrap());
        assert!(Period::parse("2023-13").is_err());
        assert!(Period::parse("may 2023").is_err());

        let inside = Utc.with_ymd_and_hms(2023, 5, 31, 23, 59, 59).unwrap();
        let outside = Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap();
        assert!(period.contains(inside));
        assert!(!period.contains(outside));
        assert_eq!(Period::containing_instant(inside), period);
    }

    #[test]
    fn test_period_ordering_and_same_month() {
        let a = Period::month(2023, 12).unwrap();
        let b = Period::month(2024, 1).unwrap();
        assert!(a < b);
        assert!(b.same_month(&Period::containing(NaiveDate::from_ymd_opt(2024, 1, 17).unwrap())));
        assert!(!a.same_month(&Period::month(2024, 12).unwrap()));
    }

    #[test]
    fn test_lifecycle_stage_rank_and_parsing() {
        assert!(LifecycleStage::Other < LifecycleStage::Lead);
        assert!(LifecycleStage::Subscriber < LifecycleStage::Customer);
        assert_eq!(LifecycleStage::Subscriber.next(), Some(LifecycleStage::Customer));
        assert_eq!(LifecycleStage::Customer.next(), None);

        assert_eq!(
            "opportunity".parse::<LifecycleStage>().unwrap(),
            LifecycleStage::Opportunity
        );
        assert_eq!(
            "hs_lifecyclestage_subscriber_date"
                .parse::<LifecycleStage>()
                .unwrap(),
            LifecycleStage::Subscriber
        );
        assert!("Customer".parse::<LifecycleStage>().is_err());
        assert!("salesqualifiedlead".parse::<LifecycleStage>().is_err());
    }

    #[test]
    fn test_objectives_lookup_and_update() {
        let mut objectives: Objectives = serde_json::from_value(serde_json::json!({
            "MONTHLY_LEADS_OBJ": 40,
            "MONTHLY_SIGNED_CA": 15000.5
        }))
        .unwrap();

        assert_eq!(objectives.objective_for(LifecycleStage::Lead), Some(40.0));
        assert_eq!(objectives.objective_for(LifecycleStage::Customer), None);
        assert_eq!(objectives.monthly_signed_revenue, Some(15000.5));

        objectives.set("MONTHLY_CLIENTS_OBJ", Some(3.0)).unwrap();
        assert_eq!(objectives.objective_for(LifecycleStage::Customer), Some(3.0));
        assert!(objectives.set("MONTHLY_UNKNOWN", Some(1.0)).is_err());
    }

    #[test]
    fn test_taxonomy_overrides() {
        let taxonomy = StageTaxonomy::default().with_overrides(BTreeMap::from([(
            LifecycleStage::Lead,
            StageLabel {
                title: "Pistes".to_string(),
                content: "Nombre de leads".to_string(),
            },
        )]));

        assert_eq!(taxonomy.label(LifecycleStage::Lead).title, "Pistes");
        assert_eq!(taxonomy.label(LifecycleStage::Customer).title, "Clients");
    }
}
