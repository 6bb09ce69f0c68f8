//! Observability for the WDI dashboard: logging, metrics and audit samples.

pub mod audit;
pub mod logging;
pub mod metrics;

pub use audit::{AuditLog, AuditRecord, IndicatorSample};
pub use logging::init_logging;
pub use metrics::Metrics;
