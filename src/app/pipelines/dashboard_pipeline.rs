use crate::core::period::{current_month_to_date, year_to_date, PeriodSettings};
use crate::core::report::{build_report, funnel_csv, monthly_amounts_csv};
use crate::core::{
    ConfigProvider, Contract, CrmSource, LifecycleStage, MonthlyBucket, Period, Pipeline,
    StageCount, Storage,
};
use crate::domain::model::DealStage;
use crate::domain::report::{DashboardData, DashboardReport};
use crate::utils::error::{CrmError, Result};
use chrono::Utc;
use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::Semaphore;
use zip::write::{FileOptions, ZipWriter};

pub const REPORT_ARCHIVE: &str = "crm_report.zip";

pub struct DashboardPipeline<S: Storage, C: ConfigProvider, A: CrmSource + 'static> {
    pub(crate) storage: S,
    pub(crate) config: C,
    pub(crate) source: Arc<A>,
}

impl<S: Storage, C: ConfigProvider, A: CrmSource + 'static> DashboardPipeline<S, C, A> {
    pub fn new(storage: S, config: C, source: A) -> Self {
        Self {
            storage,
            config,
            source: Arc::new(source),
        }
    }

    /// Runs `fetch` once per period, at most `concurrent_requests` at a time.
    /// Results come back ordered by period whatever the completion order.
    async fn fetch_per_period<T, F, Fut>(&self, periods: &[Period], fetch: F) -> Result<Vec<(Period, T)>>
    where
        T: Send + 'static,
        F: Fn(Arc<A>, Period) -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrent_requests().max(1)));
        let mut handles = Vec::with_capacity(periods.len());

        for period in periods.iter().copied() {
            let semaphore = Arc::clone(&semaphore);
            let request = fetch(Arc::clone(&self.source), period);
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.map_err(task_error)?;
                request.await.map(|value| (period, value))
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(handle.await.map_err(task_error)??);
        }

        results.sort_by_key(|(period, _)| *period);
        Ok(results)
    }
}

fn task_error<E: std::fmt::Display>(error: E) -> CrmError {
    CrmError::TaskError {
        message: error.to_string(),
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider, A: CrmSource + 'static> Pipeline for DashboardPipeline<S, C, A> {
    async fn extract(&self) -> Result<DashboardData> {
        let settings =
            PeriodSettings::from_label(self.config.window_months(), self.config.earliest_month())?;
        let now = Utc::now();
        let periods = settings.trailing_months(now.date_naive());
        tracing::debug!(
            "Fetching {} months ({} concurrent requests)",
            periods.len(),
            self.config.concurrent_requests()
        );

        let monthly_stage_counts: Vec<Vec<StageCount>> = self
            .fetch_per_period(&periods, |source, period| async move {
                source.stage_counts(&period).await
            })
            .await?
            .into_iter()
            .map(|(period, counts)| {
                counts
                    .into_iter()
                    .map(|count| count.with_period(period))
                    .collect()
            })
            .collect();

        // the proxy decides which deals belong to a month; they are kept as returned
        let monthly_contracts: Vec<MonthlyBucket<Contract>> = self
            .fetch_per_period(&periods, |source, period| async move {
                source
                    .contracts(None, period.date_from(), period.date_to())
                    .await
            })
            .await?
            .into_iter()
            .map(|(period, contracts)| MonthlyBucket::new(period, contracts))
            .collect();

        let current_stage_counts = self.source.current_stage_counts().await?;
        let customers = self
            .source
            .contacts_by_stage(Some(LifecycleStage::Customer))
            .await?;

        let (month_start, month_end) = current_month_to_date(now);
        let current_month_contracts = self.source.contracts(None, month_start, month_end).await?;
        let (year_start, year_end) = year_to_date(now);
        let year_to_date_contracts = self
            .source
            .contracts(Some(&DealStage::ClosedWon), year_start, year_end)
            .await?;
        let objectives = self.source.objectives().await?;

        Ok(DashboardData {
            periods,
            monthly_stage_counts,
            current_stage_counts,
            customers,
            monthly_contracts,
            current_month_contracts,
            year_to_date_contracts,
            objectives,
        })
    }

    async fn transform(&self, data: DashboardData) -> Result<DashboardReport> {
        build_report(data, &self.config.taxonomy())
    }

    async fn load(&self, report: DashboardReport) -> Result<String> {
        let output_path = format!("{}/{}", self.config.output_path(), REPORT_ARCHIVE);

        let report_json = serde_json::to_string_pretty(&report)?;
        let funnel = funnel_csv(&report)?;
        let amounts = monthly_amounts_csv(&report)?;

        let zip_data = {
            let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));

            zip.start_file::<_, ()>("report.json", FileOptions::default())?;
            zip.write_all(report_json.as_bytes())?;

            zip.start_file::<_, ()>("funnel.csv", FileOptions::default())?;
            zip.write_all(funnel.as_bytes())?;

            zip.start_file::<_, ()>("monthly_amounts.csv", FileOptions::default())?;
            zip.write_all(amounts.as_bytes())?;

            let cursor = zip.finish()?;
            cursor.into_inner()
        };

        tracing::debug!("Writing report archive ({} bytes) to storage", zip_data.len());
        self.storage.write_file(REPORT_ARCHIVE, &zip_data).await?;

        Ok(output_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Contact, Objectives, StageTaxonomy};
    use async_trait::async_trait;
    use chrono::{DateTime, Duration};
    use std::collections::HashMap;
    use std::io::Read;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockStorage {
        files: Mutex<HashMap<String, Vec<u8>>>,
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            self.files
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .ok_or_else(|| CrmError::invalid_data(format!("no file {}", path)))
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            self.files
                .lock()
                .unwrap()
                .insert(path.to_string(), data.to_vec());
            Ok(())
        }
    }

    struct TestConfig {
        window_months: u32,
        concurrent_requests: usize,
    }

    impl ConfigProvider for TestConfig {
        fn api_base_url(&self) -> &str {
            "http://localhost:3000/"
        }
        fn api_token(&self) -> Option<&str> {
            None
        }
        fn output_path(&self) -> &str {
            "./test-output"
        }
        fn concurrent_requests(&self) -> usize {
            self.concurrent_requests
        }
        fn window_months(&self) -> u32 {
            self.window_months
        }
        fn earliest_month(&self) -> &str {
            "2000-01"
        }
        fn company_separator(&self) -> char {
            '-'
        }
        fn taxonomy(&self) -> StageTaxonomy {
            StageTaxonomy::default()
        }
    }

    /// In-memory source that records how many requests overlap.
    #[derive(Default)]
    struct FakeSource {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        /// Days between the deal's creation and the start of the requested range.
        created_days_before: i64,
        signed_ranges: Mutex<Vec<(DateTime<Utc>, DateTime<Utc>)>>,
    }

    impl FakeSource {
        async fn track(&self) {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }

        fn snapshot() -> Vec<StageCount> {
            LifecycleStage::ALL
                .into_iter()
                .map(|stage| StageCount::new(stage, 2))
                .collect()
        }
    }

    #[async_trait]
    impl CrmSource for FakeSource {
        async fn stage_counts(&self, _period: &Period) -> Result<Vec<StageCount>> {
            self.track().await;
            Ok(Self::snapshot())
        }

        async fn current_stage_counts(&self) -> Result<Vec<StageCount>> {
            Ok(Self::snapshot())
        }

        async fn contacts_by_stage(&self, stage: Option<LifecycleStage>) -> Result<Vec<Contact>> {
            let close = Utc::now();
            Ok(vec![Contact {
                id: 7,
                lifecycle_stage: stage.unwrap_or(LifecycleStage::Customer),
                lead_date: Some(close - Duration::days(3)),
                close_date: Some(close),
                ..Default::default()
            }])
        }

        async fn contracts(
            &self,
            stage: Option<&DealStage>,
            from: DateTime<Utc>,
            to: DateTime<Utc>,
        ) -> Result<Vec<Contract>> {
            if stage == Some(&DealStage::ClosedWon) {
                self.signed_ranges.lock().unwrap().push((from, to));
            }
            self.track().await;
            Ok(vec![Contract {
                company: "Acme".to_string(),
                quoted_amount: 100.0,
                closed_amount: 80.0,
                stage: DealStage::ClosedWon,
                sent_date: from - Duration::days(self.created_days_before),
                closed_date: Some(from),
            }])
        }

        async fn objectives(&self) -> Result<Objectives> {
            Ok(Objectives {
                monthly_signed_revenue: Some(160.0),
                ..Default::default()
            })
        }

        async fn update_objectives(&self, _objectives: &Objectives) -> Result<()> {
            Ok(())
        }
    }

    fn pipeline(window_months: u32, concurrent_requests: usize) -> DashboardPipeline<MockStorage, TestConfig, FakeSource> {
        pipeline_with_source(window_months, concurrent_requests, FakeSource::default())
    }

    fn pipeline_with_source(
        window_months: u32,
        concurrent_requests: usize,
        source: FakeSource,
    ) -> DashboardPipeline<MockStorage, TestConfig, FakeSource> {
        DashboardPipeline::new(
            MockStorage::default(),
            TestConfig {
                window_months,
                concurrent_requests,
            },
            source,
        )
    }

    #[tokio::test]
    async fn test_extract_orders_months_and_bounds_concurrency() {
        let pipeline = pipeline(6, 2);

        let data = pipeline.extract().await.unwrap();

        assert_eq!(data.periods.len(), 6);
        assert!(data.periods.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(data.monthly_stage_counts.len(), 6);
        for (counts, period) in data.monthly_stage_counts.iter().zip(&data.periods) {
            assert!(counts.iter().all(|c| c.period == Some(*period)));
        }
        assert_eq!(data.monthly_contracts.len(), 6);
        assert!(data.monthly_contracts.iter().all(|b| b.items.len() == 1));
        assert_eq!(data.customers.len(), 1);
        assert!(pipeline.source.max_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_run_writes_report_archive() {
        let pipeline = pipeline(3, 4);

        let data = pipeline.extract().await.unwrap();
        let report = pipeline.transform(data).await.unwrap();
        assert_eq!(report.conversion.lead_to_close_days, Some(3.0));
        assert_eq!(report.current_month.closed, 80.0);
        assert_eq!(report.closed_progress, Some(50.0));

        let output_path = pipeline.load(report).await.unwrap();
        assert_eq!(output_path, "./test-output/crm_report.zip");

        let zip_data = pipeline.storage.read_file(REPORT_ARCHIVE).await.unwrap();
        let mut archive = zip::ZipArchive::new(std::io::Cursor::new(zip_data)).unwrap();
        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(names, vec!["funnel.csv", "monthly_amounts.csv", "report.json"]);

        let mut amounts = String::new();
        archive
            .by_name("monthly_amounts.csv")
            .unwrap()
            .read_to_string(&mut amounts)
            .unwrap();
        assert_eq!(amounts.lines().count(), 4);
        assert!(amounts.lines().skip(1).all(|line| line.ends_with(",100,80")));
    }

    #[tokio::test]
    async fn test_deals_created_before_their_month_are_kept() {
        let source = FakeSource {
            created_days_before: 40,
            ..Default::default()
        };
        let pipeline = pipeline_with_source(3, 2, source);

        let data = pipeline.extract().await.unwrap();
        assert!(data.monthly_contracts.iter().all(|b| b.items.len() == 1));

        let report = pipeline.transform(data).await.unwrap();
        assert_eq!(report.closed_by_month.len(), 3);
        assert!(report.closed_by_month.iter().all(|m| m.value == 80.0));
        assert_eq!(report.closed_by_month[2].value, report.current_month.closed);
    }

    #[tokio::test]
    async fn test_extract_fetches_signed_deals_since_january() {
        let pipeline = pipeline(2, 2);

        let data = pipeline.extract().await.unwrap();
        let ranges = pipeline.source.signed_ranges.lock().unwrap().clone();
        assert_eq!(ranges.len(), 1);
        let (from, to) = ranges[0];
        assert_eq!(from, year_to_date(to).0);
        assert_eq!(from.format("%m-%d %H:%M:%S").to_string(), "01-01 00:00:00");

        let report = pipeline.transform(data).await.unwrap();
        assert_eq!(report.signed_year_to_date, 80.0);
    }

    #[tokio::test]
    async fn test_failed_fetch_task_is_reported_as_task_error() {
        let handle = tokio::spawn(async {
            if true {
                panic!("fetch aborted");
            }
        });

        let err = handle.await.map_err(task_error).unwrap_err();

        assert!(matches!(err, CrmError::TaskError { .. }));
        assert_eq!(err.category(), crate::utils::error::ErrorCategory::Network);
    }
}
