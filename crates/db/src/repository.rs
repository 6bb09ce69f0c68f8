//! Indicator repository: the read path behind the dashboard.
//!
//! All SQL for reading countries, indicators and observations lives here.
//! The presentation layer only sees typed rows.

use crate::error::{RepoError, RepoResult};
use crate::models::{Country, Indicator, IndicatorPoint, ObservationRecord, SummaryCount};
use crate::pool::DbPool;
use crate::query::IndicatorQuery;
use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite};
use std::future::Future;
use tokio::time::Instant;
use tracing::{debug, warn};
use wdi_telemetry::Metrics;

const FETCH_SELECT_SQL: &str = "SELECT
    o.country_iso3 AS country_iso3,
    c.name AS country_name,
    o.year AS year,
    o.value AS value,
    i.unit AS unit
FROM observations o
INNER JOIN indicators i ON i.indicator_code = o.indicator_code
INNER JOIN countries c ON c.iso3 = o.country_iso3";

// Case-insensitive name first, then exact name and iso3 so equal names still
// sort deterministically.
const FETCH_ORDER_SQL: &str =
    " ORDER BY c.name COLLATE NOCASE ASC, c.name ASC, o.country_iso3 ASC, o.year ASC";

const COUNTRIES_SQL: &str =
    "SELECT iso3, name FROM countries ORDER BY name COLLATE NOCASE ASC, iso3 ASC";

const INDICATORS_SQL: &str = "SELECT
    indicator_code,
    indicator_name,
    unit,
    source_note,
    source_org,
    topic_ids
FROM indicators
ORDER BY indicator_code ASC";

// Left join so an observation whose country row is missing still exports.
const OBSERVATIONS_SQL: &str = "SELECT
    o.country_iso3 AS country_iso3,
    c.name AS country,
    o.indicator_code AS indicator,
    o.year AS year,
    o.value AS value
FROM observations o
LEFT JOIN countries c ON c.iso3 = o.country_iso3
ORDER BY o.country_iso3 ASC, o.indicator_code ASC, o.year ASC";

const SUMMARY_SQL: &str = "SELECT
    country_iso3,
    indicator_code,
    COUNT(value) AS num_points
FROM observations
GROUP BY country_iso3, indicator_code
ORDER BY country_iso3 ASC, num_points DESC, indicator_code ASC";

/// Read-only access to indicator data.
#[async_trait]
pub trait IndicatorRepository: Send + Sync {
    /// Observations for the query's countries, indicator and years, joined
    /// with country names and the indicator unit.
    ///
    /// Rows are ordered by country name (case-insensitive), then year. An
    /// unknown indicator yields an empty vector, not an error.
    async fn fetch(&self, query: &IndicatorQuery) -> RepoResult<Vec<IndicatorPoint>>;

    /// All countries ordered by name.
    async fn countries(&self) -> RepoResult<Vec<Country>>;

    /// All indicator metadata ordered by code.
    async fn indicators(&self) -> RepoResult<Vec<Indicator>>;

    /// Every observation with its country name, ordered by country,
    /// indicator and year.
    async fn observations(&self) -> RepoResult<Vec<ObservationRecord>>;

    /// Non-null observation counts per country and indicator.
    async fn summary_counts(&self) -> RepoResult<Vec<SummaryCount>>;
}

/// SQLite-backed indicator repository.
#[derive(Clone)]
pub struct SqliteIndicatorRepository {
    db: DbPool,
    metrics: Option<Metrics>,
}

impl SqliteIndicatorRepository {
    /// Create a repository over an existing pool handle.
    pub fn new(db: DbPool) -> Self {
        Self { db, metrics: None }
    }

    /// Record query latency and failures in `metrics`.
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Run one query under the configured statement timeout, recording the
    /// outcome. No retries: the first failure is returned.
    async fn run<T, F>(&self, operation: &'static str, query: F) -> RepoResult<T>
    where
        T: Send,
        F: Future<Output = Result<T, sqlx::Error>> + Send,
    {
        let start = Instant::now();
        let outcome = match self.db.config().statement_timeout {
            Some(limit) => match tokio::time::timeout(limit, query).await {
                Ok(result) => result.map_err(RepoError::from),
                Err(_) => Err(RepoError::Connectivity(format!(
                    "{} exceeded statement timeout of {:?}",
                    operation, limit
                ))),
            },
            None => query.await.map_err(RepoError::from),
        };
        let elapsed = start.elapsed().as_secs_f64();

        if let Some(metrics) = &self.metrics {
            metrics.observe_fetch_latency(operation, elapsed);
            if let Err(e) = &outcome {
                metrics.inc_fetch_errors(e.kind());
            }
        }
        if let Err(e) = &outcome {
            warn!(operation, kind = e.kind(), "Repository query failed: {}", e);
        }

        outcome
    }
}

fn build_fetch_query(query: &IndicatorQuery) -> QueryBuilder<'_, Sqlite> {
    let years = query.years();
    let mut builder = QueryBuilder::<Sqlite>::new(FETCH_SELECT_SQL);

    builder
        .push(" WHERE o.indicator_code = ")
        .push_bind(query.indicator().as_str())
        .push(" AND o.year BETWEEN ")
        .push_bind(years.from())
        .push(" AND ")
        .push_bind(years.to())
        .push(" AND o.country_iso3 IN (");

    let mut countries = builder.separated(", ");
    for country in query.countries() {
        countries.push_bind(country.as_str());
    }
    countries.push_unseparated(")");

    if query.drops_missing() {
        builder.push(" AND o.value IS NOT NULL");
    }
    builder.push(FETCH_ORDER_SQL);
    builder
}

#[async_trait]
impl IndicatorRepository for SqliteIndicatorRepository {
    async fn fetch(&self, query: &IndicatorQuery) -> RepoResult<Vec<IndicatorPoint>> {
        if let Some(metrics) = &self.metrics {
            metrics.inc_fetch_requests();
        }

        let mut builder = build_fetch_query(query);
        let points = self
            .run(
                "fetch",
                builder
                    .build_query_as::<IndicatorPoint>()
                    .fetch_all(self.db.pool()),
            )
            .await?;

        if let Some(metrics) = &self.metrics {
            metrics.inc_fetch_rows(points.len() as u64);
        }
        debug!(
            indicator = %query.indicator(),
            countries = query.countries().len(),
            year_from = query.years().from(),
            year_to = query.years().to(),
            rows = points.len(),
            "Fetched indicator points"
        );

        Ok(points)
    }

    async fn countries(&self) -> RepoResult<Vec<Country>> {
        self.run(
            "countries",
            sqlx::query_as::<_, Country>(COUNTRIES_SQL)
                .fetch_all(self.db.pool()),
        )
        .await
    }

    async fn indicators(&self) -> RepoResult<Vec<Indicator>> {
        self.run(
            "indicators",
            sqlx::query_as::<_, Indicator>(INDICATORS_SQL)
                .fetch_all(self.db.pool()),
        )
        .await
    }

    async fn observations(&self) -> RepoResult<Vec<ObservationRecord>> {
        self.run(
            "observations",
            sqlx::query_as::<_, ObservationRecord>(OBSERVATIONS_SQL)
                .fetch_all(self.db.pool()),
        )
        .await
    }

    async fn summary_counts(&self) -> RepoResult<Vec<SummaryCount>> {
        self.run(
            "summary_counts",
            sqlx::query_as::<_, SummaryCount>(SUMMARY_SQL)
                .fetch_all(self.db.pool()),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_sql_binds_every_filter() {
        let query =
            IndicatorQuery::new(["BRA", "ARG", "CHL"], "NY.GDP.MKTP.CD", 2000, 2010).unwrap();
        let builder = build_fetch_query(&query);
        let sql = builder.sql();

        assert!(sql.contains("o.indicator_code = ?"));
        assert!(sql.contains("o.year BETWEEN ? AND ?"));
        assert!(sql.contains("o.country_iso3 IN (?, ?, ?)"));
        assert!(!sql.contains("NY.GDP"));
        assert!(!sql.contains("IS NOT NULL"));
        assert!(sql.ends_with(FETCH_ORDER_SQL));
    }

    #[test]
    fn drop_missing_filters_nulls_in_sql() {
        let query = IndicatorQuery::new(["ARG"], "NY.GDP.MKTP.CD", 2000, 2010)
            .unwrap()
            .drop_missing(true);
        let builder = build_fetch_query(&query);
        assert!(builder.sql().contains("AND o.value IS NOT NULL"));
    }
}
