pub mod conversion;
pub mod deals;
pub mod engine;
pub mod funnel;
pub mod monthly;
pub mod period;
pub mod report;

pub use crate::domain::model::{Contact, Contract, LifecycleStage, MonthlyBucket, Period, StageCount};
pub use crate::domain::ports::{ConfigProvider, CrmSource, Pipeline, Storage};
pub use crate::utils::error::Result;
