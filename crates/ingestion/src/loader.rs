//! Load pipeline: topics → indicators → series → database.

use crate::api_client::{IndicatorRecord, SeriesRecord, WorldBankClient};
use crate::topics::{default_keyword_sets, select_topic_ids};
use anyhow::Context;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use wdi_db::{Country, CountryCode, Indicator, Observation, WdiWriter, YearRange};
use wdi_telemetry::{AuditLog, IndicatorSample, Metrics};

/// Mercosur members (Venezuela suspended) plus Chile.
pub const DEFAULT_COUNTRIES: &[&str] = &["ARG", "BRA", "PRY", "URY", "VEN", "CHL"];
pub const DEFAULT_START_YEAR: i32 = 2000;
pub const DEFAULT_END_YEAR: i32 = 2024;

const PROGRESS_EVERY: usize = 25;

/// What to load.
#[derive(Debug, Clone)]
pub struct LoadConfig {
    pub countries: Vec<CountryCode>,
    pub years: YearRange,
    /// Pause between indicators.
    pub pause: Duration,
    pub keyword_sets: Vec<Vec<String>>,
    /// JSON-lines file receiving one record per indicator and one per run.
    pub audit_path: Option<PathBuf>,
}

impl LoadConfig {
    pub fn new(countries: Vec<CountryCode>, years: YearRange) -> Self {
        Self {
            countries,
            years,
            pause: Duration::from_millis(100),
            keyword_sets: default_keyword_sets(),
            audit_path: None,
        }
    }

    /// Default countries and years.
    pub fn standard() -> anyhow::Result<Self> {
        let countries = DEFAULT_COUNTRIES
            .iter()
            .map(|c| c.parse::<CountryCode>())
            .collect::<Result<Vec<_>, _>>()?;
        let years = YearRange::new(DEFAULT_START_YEAR, DEFAULT_END_YEAR)?;
        Ok(Self::new(countries, years))
    }
}

/// Outcome of a load run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub topic_ids: Vec<String>,
    pub indicators: usize,
    pub indicators_failed: usize,
    pub observations: u64,
}

#[derive(Debug, Serialize)]
struct IndicatorFailure<'a> {
    indicator_code: &'a str,
    error: String,
}

/// Merge per-topic indicator listings into table rows.
///
/// An indicator listed under several topics appears once, with every topic
/// id recorded in `topic_ids`. Output is sorted by code.
pub fn merge_indicators(per_topic: Vec<(String, Vec<IndicatorRecord>)>) -> Vec<Indicator> {
    let mut merged: BTreeMap<String, Indicator> = BTreeMap::new();
    for (topic_id, records) in per_topic {
        for record in records {
            match merged.get_mut(&record.id) {
                Some(existing) => {
                    let topics = existing.topic_ids.get_or_insert_with(String::new);
                    if !topics.split(',').any(|t| t == topic_id) {
                        if !topics.is_empty() {
                            topics.push(',');
                        }
                        topics.push_str(&topic_id);
                    }
                }
                None => {
                    merged.insert(
                        record.id.clone(),
                        Indicator {
                            indicator_code: record.id,
                            indicator_name: record.name,
                            unit: record.unit.unwrap_or_default(),
                            source_note: record.source_note,
                            source_org: record.source_organization,
                            topic_ids: Some(topic_id.clone()),
                        },
                    );
                }
            }
        }
    }
    merged.into_values().collect()
}

/// Convert series records into country and observation rows.
///
/// Records without an ISO3 code (regional aggregates) or without a numeric
/// year are skipped. A country without a name falls back to its code.
pub fn series_to_rows(
    indicator_code: &str,
    records: &[SeriesRecord],
) -> (Vec<Country>, Vec<Observation>) {
    let mut countries: BTreeMap<String, String> = BTreeMap::new();
    let mut observations = Vec::with_capacity(records.len());

    for record in records {
        let iso3 = match record.countryiso3code.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => code.to_ascii_uppercase(),
            _ => continue,
        };
        let year = match record.date.as_deref().and_then(|d| d.trim().parse::<i32>().ok()) {
            Some(year) => year,
            None => continue,
        };
        let name = record
            .country
            .as_ref()
            .and_then(|c| c.value.clone())
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| iso3.clone());

        countries.entry(iso3.clone()).or_insert(name);
        observations.push(Observation {
            country_iso3: iso3,
            indicator_code: indicator_code.to_string(),
            year,
            value: record.value,
        });
    }

    let countries = countries
        .into_iter()
        .map(|(iso3, name)| Country { iso3, name })
        .collect();
    (countries, observations)
}

/// Populates the database from the World Bank API.
pub struct Loader {
    client: WorldBankClient,
    writer: WdiWriter,
    metrics: Metrics,
    audit: AuditLog,
    config: LoadConfig,
}

impl Loader {
    pub fn new(
        client: WorldBankClient,
        writer: WdiWriter,
        metrics: Metrics,
        config: LoadConfig,
    ) -> Self {
        Self {
            client,
            writer,
            metrics,
            audit: AuditLog::new(config.audit_path.clone()),
            config,
        }
    }

    fn record_audit<T: Serialize>(&self, kind: &str, payload: &T) {
        if let Err(e) = self.audit.record(kind, payload) {
            warn!("Failed to write audit record: {:#}", e);
        }
    }

    /// Run a full load.
    ///
    /// Fails when no topic matches or when indicator metadata cannot be
    /// listed or stored. A single indicator's failure is logged and skipped.
    pub async fn run(&self) -> anyhow::Result<LoadReport> {
        info!("Listing World Bank topics");
        let topics = self.client.list_topics().await.context("listing topics")?;

        for keywords in &self.config.keyword_sets {
            if select_topic_ids(&topics, std::slice::from_ref(keywords)).is_empty() {
                warn!("No topic matches keywords {:?}", keywords);
            }
        }
        let topic_ids = select_topic_ids(&topics, &self.config.keyword_sets);
        if topic_ids.is_empty() {
            anyhow::bail!("no World Bank topic matches the configured keywords");
        }

        info!("Listing indicators for topics {:?}", topic_ids);
        let mut per_topic = Vec::with_capacity(topic_ids.len());
        for topic_id in &topic_ids {
            let records = self
                .client
                .list_indicators_for_topic(topic_id)
                .await
                .with_context(|| format!("listing indicators for topic {}", topic_id))?;
            per_topic.push((topic_id.clone(), records));
        }
        let indicators = merge_indicators(per_topic);
        self.writer
            .upsert_indicators(&indicators)
            .await
            .context("storing indicator metadata")?;
        info!("Stored metadata for {} indicators", indicators.len());

        let mut report = LoadReport {
            topic_ids,
            indicators: indicators.len(),
            ..LoadReport::default()
        };

        info!(
            year_from = self.config.years.from(),
            year_to = self.config.years.to(),
            countries = ?self
                .config
                .countries
                .iter()
                .map(CountryCode::as_str)
                .collect::<Vec<_>>(),
            "Downloading series for {} indicators",
            indicators.len()
        );
        for (index, indicator) in indicators.iter().enumerate() {
            match self.load_indicator(&indicator.indicator_code).await {
                Ok(count) => report.observations += count,
                Err(e) => {
                    report.indicators_failed += 1;
                    error!("Failed to load indicator {}: {:#}", indicator.indicator_code, e);
                    let failure = IndicatorFailure {
                        indicator_code: &indicator.indicator_code,
                        error: format!("{:#}", e),
                    };
                    self.record_audit("indicator_failed", &failure);
                }
            }
            sleep(self.config.pause).await;

            if (index + 1) % PROGRESS_EVERY == 0 {
                info!("Progress: {}/{} indicators", index + 1, indicators.len());
            }
        }

        info!(
            indicators = report.indicators,
            failed = report.indicators_failed,
            observations = report.observations,
            "Load completed"
        );
        self.record_audit("load_completed", &report);
        Ok(report)
    }

    async fn load_indicator(&self, indicator_code: &str) -> anyhow::Result<u64> {
        let records = self
            .client
            .fetch_series(
                indicator_code,
                &self.config.countries,
                self.config.years.from(),
                self.config.years.to(),
            )
            .await?;

        let (countries, observations) = series_to_rows(indicator_code, &records);
        let written = if observations.is_empty() {
            0
        } else {
            self.writer.write_series(&countries, &observations).await?
        };
        self.metrics.inc_observations_loaded(written);

        let sample = IndicatorSample {
            indicator_code: indicator_code.to_string(),
            countries: countries.len(),
            observations: observations.len(),
            non_null: observations.iter().filter(|o| o.value.is_some()).count(),
            written,
        };
        debug!(
            indicator = indicator_code,
            rows = sample.observations,
            coverage = sample.coverage(),
            "Loaded indicator"
        );
        self.record_audit("indicator_loaded", &sample);

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_client::NamedRef;

    fn record(id: &str, name: &str) -> IndicatorRecord {
        IndicatorRecord {
            id: id.to_string(),
            name: name.to_string(),
            unit: None,
            source_note: None,
            source_organization: Some("World Bank".to_string()),
        }
    }

    fn series(
        iso3: Option<&str>,
        name: Option<&str>,
        date: Option<&str>,
        value: Option<f64>,
    ) -> SeriesRecord {
        SeriesRecord {
            countryiso3code: iso3.map(str::to_string),
            country: name.map(|n| NamedRef {
                id: None,
                value: Some(n.to_string()),
            }),
            date: date.map(str::to_string),
            value,
        }
    }

    #[test]
    fn indicators_are_merged_and_sorted() {
        let merged = merge_indicators(vec![
            (
                "3".to_string(),
                vec![
                    record("NY.GDP.MKTP.CD", "GDP (current US$)"),
                    record("BN.CAB.XOKA.CD", "Current account balance"),
                ],
            ),
            ("20".to_string(), vec![record("NY.GDP.MKTP.CD", "GDP (current US$)")]),
        ]);

        let codes: Vec<&str> = merged.iter().map(|i| i.indicator_code.as_str()).collect();
        assert_eq!(codes, vec!["BN.CAB.XOKA.CD", "NY.GDP.MKTP.CD"]);
        assert_eq!(merged[1].topic_ids.as_deref(), Some("3,20"));
        assert_eq!(merged[0].topic_ids.as_deref(), Some("3"));
        assert_eq!(merged[0].unit, "");
    }

    #[test]
    fn aggregates_and_bad_dates_are_skipped() {
        let records = vec![
            series(Some("ARG"), Some("Argentina"), Some("2020"), Some(400.0)),
            series(Some(""), Some("Latin America & Caribbean"), Some("2020"), Some(5000.0)),
            series(None, None, Some("2020"), Some(1.0)),
            series(Some("BRA"), Some("Brazil"), Some("2020Q1"), Some(1.0)),
            series(Some("BRA"), Some("Brazil"), Some("2020"), None),
            series(Some("ury"), None, Some("2019"), Some(56.0)),
        ];

        let (countries, observations) = series_to_rows("NY.GDP.MKTP.CD", &records);
        assert_eq!(
            countries,
            vec![
                Country { iso3: "ARG".into(), name: "Argentina".into() },
                Country { iso3: "BRA".into(), name: "Brazil".into() },
                Country { iso3: "URY".into(), name: "URY".into() },
            ]
        );
        assert_eq!(observations.len(), 3);
        assert_eq!(observations[1].value, None);
        assert!(observations.iter().all(|o| o.indicator_code == "NY.GDP.MKTP.CD"));
    }

    #[test]
    fn standard_config_covers_mercosur_and_chile() {
        let config = LoadConfig::standard().unwrap();
        assert_eq!(config.countries.len(), 6);
        assert_eq!(config.years.from(), DEFAULT_START_YEAR);
        assert_eq!(config.years.to(), DEFAULT_END_YEAR);
        assert_eq!(config.keyword_sets.len(), 2);
    }
}
