//! Database layer for the World Development Indicators dashboard.
//!
//! Provides the SQLite pool and schema migrations, the read-only
//! [`IndicatorRepository`] used by the presentation layer, reshaping helpers
//! for charting, and the [`WdiWriter`] used by the offline loader.

pub mod error;
pub mod models;
pub mod pool;
pub mod query;
pub mod repository;
pub mod reshape;
pub mod writer;

pub use error::{RepoError, RepoResult};
pub use models::{
    Country, Indicator, IndicatorPoint, Observation, ObservationRecord, SummaryCount,
};
pub use pool::{DbConfig, DbPool};
pub use query::{CountryCode, IndicatorCode, IndicatorQuery, QueryError, YearRange};
pub use repository::{IndicatorRepository, SqliteIndicatorRepository};
pub use reshape::{group_by_country, pivot_wide, CountrySeries, WideTable};
pub use writer::WdiWriter;
