//! Database models and result rows.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A country, keyed by its ISO3 code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Country {
    pub iso3: String,
    pub name: String,
}

/// Indicator metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Indicator {
    pub indicator_code: String,
    pub indicator_name: String,
    /// Unit of measure; empty when the source does not publish one.
    pub unit: String,
    pub source_note: Option<String>,
    pub source_org: Option<String>,
    /// Comma-separated World Bank topic ids the indicator was found under.
    pub topic_ids: Option<String>,
}

/// One (country, indicator, year) measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Observation {
    pub country_iso3: String,
    pub indicator_code: String,
    pub year: i32,
    pub value: Option<f64>,
}

/// A row of the joined, chart-ready fetch result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct IndicatorPoint {
    pub country_iso3: String,
    pub country_name: String,
    pub year: i32,
    /// `None` marks a year the source reports without a value.
    pub value: Option<f64>,
    pub unit: String,
}

/// An observation with its country name, as written to exports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ObservationRecord {
    pub country_iso3: String,
    pub country: Option<String>,
    pub indicator: String,
    pub year: i32,
    pub value: Option<f64>,
}

/// Number of non-null observations per country and indicator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct SummaryCount {
    pub country_iso3: String,
    pub indicator_code: String,
    pub num_points: i64,
}
