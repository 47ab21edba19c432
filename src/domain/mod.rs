// Domain layer: CRM value objects, report shapes and ports. No I/O here.

pub mod model;
pub mod ports;
pub mod report;
