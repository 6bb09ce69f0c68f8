//! Write path used by the offline loader.
//!
//! Every write is an upsert keyed on the table's primary key, so loading the
//! same series twice leaves the tables unchanged.

use crate::error::RepoResult;
use crate::models::{Country, Indicator, Observation};
use crate::pool::DbPool;
use tracing::debug;

const UPSERT_COUNTRY_SQL: &str = "INSERT INTO countries (iso3, name) VALUES (?, ?)
ON CONFLICT (iso3) DO UPDATE SET name = excluded.name";

const UPSERT_INDICATOR_SQL: &str = "INSERT INTO indicators (
    indicator_code, indicator_name, unit, source_note, source_org, topic_ids
) VALUES (?, ?, ?, ?, ?, ?)
ON CONFLICT (indicator_code) DO UPDATE SET
    indicator_name = excluded.indicator_name,
    unit = excluded.unit,
    source_note = excluded.source_note,
    source_org = excluded.source_org,
    topic_ids = excluded.topic_ids";

const UPSERT_OBSERVATION_SQL: &str = "INSERT INTO observations (
    country_iso3, indicator_code, year, value
) VALUES (?, ?, ?, ?)
ON CONFLICT (country_iso3, indicator_code, year) DO UPDATE SET value = excluded.value";

/// Loader-side writer for the three WDI tables.
#[derive(Clone)]
pub struct WdiWriter {
    db: DbPool,
}

impl WdiWriter {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Insert or update indicator metadata in one transaction.
    pub async fn upsert_indicators(&self, indicators: &[Indicator]) -> RepoResult<u64> {
        let mut tx = self.db.pool().begin().await?;
        for indicator in indicators {
            sqlx::query(UPSERT_INDICATOR_SQL)
                .bind(&indicator.indicator_code)
                .bind(&indicator.indicator_name)
                .bind(&indicator.unit)
                .bind(&indicator.source_note)
                .bind(&indicator.source_org)
                .bind(&indicator.topic_ids)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        debug!("Upserted {} indicators", indicators.len());
        Ok(indicators.len() as u64)
    }

    /// Insert or update countries and their observations in one transaction.
    ///
    /// Countries are written first so observations always reference an
    /// existing row. Returns the number of observations written.
    pub async fn write_series(
        &self,
        countries: &[Country],
        observations: &[Observation],
    ) -> RepoResult<u64> {
        let mut tx = self.db.pool().begin().await?;
        for country in countries {
            sqlx::query(UPSERT_COUNTRY_SQL)
                .bind(&country.iso3)
                .bind(&country.name)
                .execute(&mut *tx)
                .await?;
        }
        for observation in observations {
            sqlx::query(UPSERT_OBSERVATION_SQL)
                .bind(&observation.country_iso3)
                .bind(&observation.indicator_code)
                .bind(observation.year)
                .bind(observation.value)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        debug!(
            countries = countries.len(),
            observations = observations.len(),
            "Wrote series"
        );
        Ok(observations.len() as u64)
    }
}
