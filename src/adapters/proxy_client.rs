use crate::core::deals::company_from_deal_name;
use crate::domain::model::{Contact, Contract, DealStage, LifecycleStage, Objectives, Period, StageCount};
use crate::domain::ports::{ConfigProvider, CrmSource};
use crate::utils::error::{CrmError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

const STAGE_COUNTS_BY_MONTH_PATH: &str = "contacts/lifecyclestages/count/by/months";
const CURRENT_STAGE_COUNTS_PATH: &str = "contacts/lifecyclestages/total/count/";
const CONTACTS_BY_STAGE_PATH: &str = "contacts/by/lifecyclestage";
const DEALS_BY_STAGE_PATH: &str = "deals/by/stage";
const OBJECTIVES_PATH: &str = "objectives";

pub const DEFAULT_COMPANY_SEPARATOR: char = '-';

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StageCountRecord {
    lifecycle_stage: String,
    count: u64,
}

impl TryFrom<StageCountRecord> for StageCount {
    type Error = CrmError;

    fn try_from(record: StageCountRecord) -> Result<Self> {
        Ok(StageCount::new(record.lifecycle_stage.parse()?, record.count))
    }
}

#[derive(Debug, Deserialize)]
struct ContactRecord {
    id: serde_json::Value,
    #[serde(default)]
    properties: ContactProperties,
}

#[derive(Debug, Default, Deserialize)]
struct ContactProperties {
    firstname: Option<String>,
    lastname: Option<String>,
    email: Option<String>,
    closedate: Option<String>,
    createdate: Option<String>,
    #[serde(alias = "leaddate")]
    hs_lifecyclestage_lead_date: Option<String>,
    #[serde(alias = "subscriberdate")]
    hs_lifecyclestage_subscriber_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DealRecord {
    properties: DealProperties,
}

#[derive(Debug, Deserialize)]
struct DealProperties {
    dealname: Option<String>,
    #[serde(default)]
    amount: serde_json::Value,
    #[serde(default)]
    montant_devise: serde_json::Value,
    dealstage: Option<String>,
    createdate: Option<String>,
    closedate: Option<String>,
}

/// Parses the date formats found in CRM properties. Empty values are absent.
pub fn parse_crm_date(value: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    let raw = match value.map(str::trim) {
        None | Some("") => return Ok(None),
        Some(raw) => raw,
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(Some(parsed.with_timezone(&Utc)));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(Some(date.and_time(NaiveTime::MIN).and_utc()));
    }
    // epoch milliseconds
    if let Ok(millis) = raw.parse::<i64>() {
        if let Some(instant) = Utc.timestamp_millis_opt(millis).single() {
            return Ok(Some(instant));
        }
    }

    Err(CrmError::invalid_data(format!("unrecognized date '{}'", raw)))
}

/// Amounts come as strings; missing or empty ones count as zero.
pub fn parse_amount(field: &str, value: &serde_json::Value) -> Result<f64> {
    match value {
        serde_json::Value::Null => Ok(0.0),
        serde_json::Value::Number(number) => number
            .as_f64()
            .ok_or_else(|| CrmError::invalid_data(format!("{} is out of range", field))),
        serde_json::Value::String(text) if text.trim().is_empty() => Ok(0.0),
        serde_json::Value::String(text) => text.trim().parse::<f64>().map_err(|_| {
            CrmError::invalid_data(format!("{} is not a number: '{}'", field, text))
        }),
        other => Err(CrmError::invalid_data(format!(
            "{} has an unexpected type: {}",
            field, other
        ))),
    }
}

fn parse_contact_id(value: &serde_json::Value) -> Result<u64> {
    let parsed = match value {
        serde_json::Value::Number(number) => number.as_u64(),
        serde_json::Value::String(text) => text.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| CrmError::invalid_data(format!("invalid contact id {}", value)))
}

fn contact_from_record(record: ContactRecord, stage: LifecycleStage) -> Result<Contact> {
    let properties = record.properties;
    Ok(Contact {
        id: parse_contact_id(&record.id)?,
        lifecycle_stage: stage,
        firstname: properties.firstname,
        lastname: properties.lastname,
        email: properties.email,
        created_date: parse_crm_date(properties.createdate.as_deref())?,
        lead_date: parse_crm_date(properties.hs_lifecyclestage_lead_date.as_deref())?,
        subscriber_date: parse_crm_date(properties.hs_lifecyclestage_subscriber_date.as_deref())?,
        close_date: parse_crm_date(properties.closedate.as_deref())?,
    })
}

fn contract_from_record(record: DealRecord, separator: char) -> Result<Contract> {
    let properties = record.properties;
    let deal_name = properties.dealname.unwrap_or_default();
    let stage = DealStage::from_code(properties.dealstage.as_deref().unwrap_or_default());

    let sent_date = parse_crm_date(properties.createdate.as_deref())?.ok_or_else(|| {
        CrmError::invalid_data(format!("deal '{}' has no creation date", deal_name))
    })?;
    // the CRM fills closedate with an expected date on open deals
    let closed_date = match stage {
        DealStage::ClosedWon => parse_crm_date(properties.closedate.as_deref())?,
        _ => None,
    };

    Ok(Contract {
        company: company_from_deal_name(&deal_name, separator),
        quoted_amount: parse_amount("montant_devise", &properties.montant_devise)?,
        closed_amount: parse_amount("amount", &properties.amount)?,
        stage,
        sent_date,
        closed_date,
    })
}

/// Decodes a JSON body, also accepting a payload that was JSON-encoded twice.
fn decode_body<T: DeserializeOwned>(body: serde_json::Value) -> Result<T> {
    match body {
        serde_json::Value::String(inner) => Ok(serde_json::from_str(&inner)?),
        other => Ok(serde_json::from_value(other)?),
    }
}

/// HTTP client for the CRM proxy.
#[derive(Debug, Clone)]
pub struct ProxyClient {
    client: Client,
    base_url: Url,
    token: Option<String>,
    company_separator: char,
}

impl ProxyClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let mut normalized = base_url.trim().to_string();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        let base_url = Url::parse(&normalized).map_err(|e| CrmError::InvalidConfigValueError {
            field: "api_base_url".to_string(),
            value: base_url.to_string(),
            reason: format!("Invalid URL format: {}", e),
        })?;

        Ok(Self {
            client: Client::new(),
            base_url,
            token: None,
            company_separator: DEFAULT_COMPANY_SEPARATOR,
        })
    }

    pub fn from_config<C: ConfigProvider>(config: &C) -> Result<Self> {
        let mut client = Self::new(config.api_base_url())?
            .with_company_separator(config.company_separator());
        if let Some(token) = config.api_token() {
            client = client.with_token(token);
        }
        if let Some(seconds) = config.timeout_seconds() {
            client = client.with_timeout(Duration::from_secs(seconds))?;
        }
        Ok(client)
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_company_separator(mut self, separator: char) -> Self {
        self.company_separator = separator;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(|e| CrmError::InvalidConfigValueError {
            field: "api_base_url".to_string(),
            value: self.base_url.to_string(),
            reason: format!("Cannot build endpoint '{}': {}", path, e),
        })
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn check_status(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        tracing::error!("CRM proxy answered {}: {}", status, body);
        Err(CrmError::ApiStatus {
            status: status.as_u16(),
            body,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        tracing::debug!("GET {}", url);
        let response = self.authorize(self.client.get(url)).send().await?;
        let response = Self::check_status(response).await?;
        let body: serde_json::Value = response.json().await?;
        decode_body(body)
    }
}

#[async_trait]
impl CrmSource for ProxyClient {
    async fn stage_counts(&self, period: &Period) -> Result<Vec<StageCount>> {
        let mut url = self.endpoint(STAGE_COUNTS_BY_MONTH_PATH)?;
        url.query_pairs_mut()
            .append_pair("from", &period.from_millis().to_string())
            .append_pair("to", &period.to_millis().to_string());

        let records: Vec<StageCountRecord> = self.get_json(url).await?;
        records
            .into_iter()
            .map(|record| StageCount::try_from(record).map(|count| count.with_period(*period)))
            .collect()
    }

    async fn current_stage_counts(&self) -> Result<Vec<StageCount>> {
        let url = self.endpoint(CURRENT_STAGE_COUNTS_PATH)?;
        let records: Vec<StageCountRecord> = self.get_json(url).await?;
        records.into_iter().map(StageCount::try_from).collect()
    }

    async fn contacts_by_stage(&self, stage: Option<LifecycleStage>) -> Result<Vec<Contact>> {
        let mut url = self.endpoint(CONTACTS_BY_STAGE_PATH)?;
        if let Some(stage) = stage {
            url.query_pairs_mut().append_pair("stage", stage.code());
        }

        // without a stage filter the proxy lists customers
        let assigned = stage.unwrap_or(LifecycleStage::Customer);
        let records: Vec<ContactRecord> = self.get_json(url).await?;
        records
            .into_iter()
            .map(|record| contact_from_record(record, assigned))
            .collect()
    }

    async fn contracts(
        &self,
        stage: Option<&DealStage>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Contract>> {
        let mut url = self.endpoint(DEALS_BY_STAGE_PATH)?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("since", &from.timestamp_millis().to_string())
                .append_pair("to", &to.timestamp_millis().to_string());
            if let Some(stage) = stage {
                query.append_pair("stage", stage.code());
            }
        }

        let records: Vec<DealRecord> = self.get_json(url).await?;
        records
            .into_iter()
            .map(|record| contract_from_record(record, self.company_separator))
            .collect()
    }

    async fn objectives(&self) -> Result<Objectives> {
        let url = self.endpoint(OBJECTIVES_PATH)?;
        self.get_json(url).await
    }

    async fn update_objectives(&self, objectives: &Objectives) -> Result<()> {
        let url = self.endpoint(OBJECTIVES_PATH)?;
        tracing::debug!("PUT {}", url);
        let response = self
            .authorize(self.client.put(url))
            .json(objectives)
            .send()
            .await?;
        Self::check_status(response).await?;
        Ok(())
    }
}
