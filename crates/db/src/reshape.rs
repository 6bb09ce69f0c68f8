//! Reshaping of fetched points for charts and tables.

use crate::models::IndicatorPoint;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// One line of a chart: a country's values over time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountrySeries {
    pub country_iso3: String,
    pub country_name: String,
    pub unit: String,
    pub points: Vec<(i32, Option<f64>)>,
}

/// Years down, countries across.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WideTable {
    pub years: Vec<i32>,
    /// Country names, one per column.
    pub columns: Vec<String>,
    /// ISO3 codes aligned with `columns`.
    pub codes: Vec<String>,
    /// `rows[i][j]` is the value for `years[i]` and `columns[j]`.
    pub rows: Vec<Vec<Option<f64>>>,
}

impl WideTable {
    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    /// Value for a year and ISO3 code, if the cell exists and is not null.
    pub fn get(&self, year: i32, country_iso3: &str) -> Option<f64> {
        let row = self.years.iter().position(|y| *y == year)?;
        let col = self.codes.iter().position(|c| c == country_iso3)?;
        self.rows[row][col]
    }
}

/// Split fetch output into per-country series, keeping the input order of
/// countries and years.
///
/// Countries are told apart by ISO3 code, so two countries sharing a name
/// stay separate series.
pub fn group_by_country(points: &[IndicatorPoint]) -> Vec<CountrySeries> {
    let mut series: Vec<CountrySeries> = Vec::new();
    for point in points {
        match series.last_mut() {
            Some(current) if current.country_iso3 == point.country_iso3 => {
                current.points.push((point.year, point.value));
            }
            _ => series.push(CountrySeries {
                country_iso3: point.country_iso3.clone(),
                country_name: point.country_name.clone(),
                unit: point.unit.clone(),
                points: vec![(point.year, point.value)],
            }),
        }
    }
    series
}

/// Pivot fetch output into a year × country table.
///
/// Columns follow the first appearance of each ISO3 code; years are sorted.
/// Missing cells and null values are both `None`.
pub fn pivot_wide(points: &[IndicatorPoint]) -> WideTable {
    let mut codes: Vec<String> = Vec::new();
    let mut columns: Vec<String> = Vec::new();
    for point in points {
        if !codes.iter().any(|c| c == &point.country_iso3) {
            codes.push(point.country_iso3.clone());
            columns.push(point.country_name.clone());
        }
    }

    let years: Vec<i32> = points
        .iter()
        .map(|p| p.year)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut cells: BTreeMap<(i32, usize), Option<f64>> = BTreeMap::new();
    for point in points {
        if let Some(col) = codes.iter().position(|c| c == &point.country_iso3) {
            cells.insert((point.year, col), point.value);
        }
    }

    let rows = years
        .iter()
        .map(|year| {
            (0..columns.len())
                .map(|col| cells.get(&(*year, col)).copied().flatten())
                .collect()
        })
        .collect();

    WideTable {
        years,
        columns,
        codes,
        rows,
    }
}
