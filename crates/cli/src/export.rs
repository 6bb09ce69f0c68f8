//! Flat-file exports of the whole store: CSV files plus one Excel workbook.

use crate::output::{format_value, write_csv};
use anyhow::Context;
use rust_xlsxwriter::{Workbook, Worksheet};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;
use wdi_db::{Indicator, IndicatorRepository, ObservationRecord};

const INDICATOR_HEADERS: [&str; 6] = [
    "indicator_code",
    "indicator_name",
    "unit",
    "source_note",
    "source_org",
    "topic_ids",
];

const OBSERVATION_HEADERS: [&str; 5] = ["country_iso3", "country", "indicator", "year", "value"];

/// Files written for one output prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportPaths {
    pub indicators: PathBuf,
    pub observations: PathBuf,
    pub summary: PathBuf,
    /// `indicators_meta` and `observations` sheets.
    pub workbook: PathBuf,
}

impl ExportPaths {
    pub fn for_prefix(prefix: &str) -> Self {
        Self {
            indicators: PathBuf::from(format!("{}_indicators_meta.csv", prefix)),
            observations: PathBuf::from(format!("{}_observations.csv", prefix)),
            summary: PathBuf::from(format!("{}_summary_counts.csv", prefix)),
            workbook: PathBuf::from(format!("{}.xlsx", prefix)),
        }
    }
}

fn create_file(path: &Path) -> anyhow::Result<File> {
    File::create(path).with_context(|| format!("creating {}", path.display()))
}

fn observation_cells(row: &ObservationRecord) -> [String; 5] {
    [
        row.country_iso3.clone(),
        row.country.clone().unwrap_or_default(),
        row.indicator.clone(),
        row.year.to_string(),
        format_value(row.value),
    ]
}

fn write_observations_csv(path: &Path, rows: &[ObservationRecord]) -> anyhow::Result<()> {
    let mut csv = csv::Writer::from_writer(create_file(path)?);
    csv.write_record(OBSERVATION_HEADERS)?;
    for row in rows {
        csv.write_record(observation_cells(row))?;
    }
    csv.flush()?;
    Ok(())
}

fn write_header(sheet: &mut Worksheet, headers: &[&str]) -> anyhow::Result<()> {
    for (col, header) in headers.iter().enumerate() {
        sheet.write_string(0, col as u16, *header)?;
    }
    Ok(())
}

fn write_text(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    text: Option<&str>,
) -> anyhow::Result<()> {
    if let Some(text) = text {
        sheet.write_string(row, col, text)?;
    }
    Ok(())
}

fn write_workbook(
    path: &Path,
    indicators: &[Indicator],
    observations: &[ObservationRecord],
) -> anyhow::Result<()> {
    let mut workbook = Workbook::new();

    let sheet = workbook.add_worksheet();
    sheet.set_name("indicators_meta")?;
    write_header(sheet, &INDICATOR_HEADERS)?;
    for (i, indicator) in indicators.iter().enumerate() {
        let row = i as u32 + 1;
        sheet.write_string(row, 0, &indicator.indicator_code)?;
        sheet.write_string(row, 1, &indicator.indicator_name)?;
        sheet.write_string(row, 2, &indicator.unit)?;
        write_text(sheet, row, 3, indicator.source_note.as_deref())?;
        write_text(sheet, row, 4, indicator.source_org.as_deref())?;
        write_text(sheet, row, 5, indicator.topic_ids.as_deref())?;
    }

    let sheet = workbook.add_worksheet();
    sheet.set_name("observations")?;
    write_header(sheet, &OBSERVATION_HEADERS)?;
    for (i, observation) in observations.iter().enumerate() {
        let row = i as u32 + 1;
        sheet.write_string(row, 0, &observation.country_iso3)?;
        write_text(sheet, row, 1, observation.country.as_deref())?;
        sheet.write_string(row, 2, &observation.indicator)?;
        sheet.write_number(row, 3, observation.year as f64)?;
        if let Some(value) = observation.value {
            sheet.write_number(row, 4, value)?;
        }
    }

    workbook
        .save(path)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// Write indicator metadata, observations and summary counts as CSV files,
/// and metadata plus observations as an Excel workbook.
pub async fn export<R>(repo: &R, prefix: &str) -> anyhow::Result<ExportPaths>
where
    R: IndicatorRepository + ?Sized,
{
    let paths = ExportPaths::for_prefix(prefix);

    let indicators = repo.indicators().await?;
    write_csv(create_file(&paths.indicators)?, &indicators)?;
    info!("Wrote {} ({} indicators)", paths.indicators.display(), indicators.len());

    let observations = repo.observations().await?;
    write_observations_csv(&paths.observations, &observations)?;
    info!("Wrote {} ({} rows)", paths.observations.display(), observations.len());

    let summary = repo.summary_counts().await?;
    write_csv(create_file(&paths.summary)?, &summary)?;
    info!("Wrote {} ({} rows)", paths.summary.display(), summary.len());

    write_workbook(&paths.workbook, &indicators, &observations)?;
    info!("Wrote {}", paths.workbook.display());

    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wdi_db::{Country, DbPool, Observation, SqliteIndicatorRepository, WdiWriter};

    const GDP: &str = "NY.GDP.MKTP.CD";

    async fn seeded_repo(dir: &Path) -> SqliteIndicatorRepository {
        let db = DbPool::new(dir.join("wdi.db").to_str().unwrap())
            .await
            .unwrap();
        db.migrate().await.unwrap();

        let writer = WdiWriter::new(db.clone());
        writer
            .upsert_indicators(&[Indicator {
                indicator_code: GDP.into(),
                indicator_name: "GDP (current US$)".into(),
                unit: "current US$".into(),
                source_note: None,
                source_org: Some("World Bank".into()),
                topic_ids: Some("3".into()),
            }])
            .await
            .unwrap();

        let obs = |iso3: &str, year: i32, value: Option<f64>| Observation {
            country_iso3: iso3.into(),
            indicator_code: GDP.into(),
            year,
            value,
        };
        writer
            .write_series(
                &[
                    Country {
                        iso3: "ARG".into(),
                        name: "Argentina".into(),
                    },
                    Country {
                        iso3: "BRA".into(),
                        name: "Brazil".into(),
                    },
                ],
                &[
                    obs("ARG", 2020, Some(400.0)),
                    obs("BRA", 2020, Some(1400.5)),
                    obs("BRA", 2021, None),
                ],
            )
            .await
            .unwrap();

        SqliteIndicatorRepository::new(db)
    }

    #[tokio::test]
    async fn export_writes_csvs_and_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let repo = seeded_repo(dir.path()).await;
        let prefix = dir.path().join("wdi");

        let paths = export(&repo, prefix.to_str().unwrap()).await.unwrap();

        let observations = std::fs::read_to_string(&paths.observations).unwrap();
        let lines: Vec<&str> = observations.lines().collect();
        assert_eq!(
            lines,
            vec![
                "country_iso3,country,indicator,year,value",
                "ARG,Argentina,NY.GDP.MKTP.CD,2020,400",
                "BRA,Brazil,NY.GDP.MKTP.CD,2020,1400.5",
                "BRA,Brazil,NY.GDP.MKTP.CD,2021,",
            ]
        );

        let indicators = std::fs::read_to_string(&paths.indicators).unwrap();
        assert_eq!(
            indicators.lines().next().unwrap(),
            "indicator_code,indicator_name,unit,source_note,source_org,topic_ids"
        );
        assert_eq!(indicators.lines().count(), 2);

        let summary = std::fs::read_to_string(&paths.summary).unwrap();
        assert_eq!(
            summary.lines().collect::<Vec<_>>(),
            vec![
                "country_iso3,indicator_code,num_points",
                "ARG,NY.GDP.MKTP.CD,1",
                "BRA,NY.GDP.MKTP.CD,1",
            ]
        );

        // xlsx files are zip archives.
        let workbook = std::fs::read(&paths.workbook).unwrap();
        assert!(workbook.starts_with(b"PK"));
        assert_eq!(paths.workbook, dir.path().join("wdi.xlsx"));
    }

    #[tokio::test]
    async fn empty_store_still_writes_headers() {
        let dir = tempfile::tempdir().unwrap();
        let db = DbPool::new(dir.path().join("wdi.db").to_str().unwrap())
            .await
            .unwrap();
        db.migrate().await.unwrap();
        let repo = SqliteIndicatorRepository::new(db);

        let paths = export(&repo, dir.path().join("empty").to_str().unwrap())
            .await
            .unwrap();

        let observations = std::fs::read_to_string(&paths.observations).unwrap();
        assert_eq!(observations, "country_iso3,country,indicator,year,value\n");
        assert!(paths.workbook.exists());
    }
}
