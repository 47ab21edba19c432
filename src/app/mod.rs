pub mod pipelines;

pub use pipelines::dashboard_pipeline::DashboardPipeline;
