//! Rendering of repository results for the terminal and for CSV exports.

use clap::ValueEnum;
use serde::Serialize;
use std::io::Write;
use wdi_db::{IndicatorPoint, WideTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Csv,
    Json,
}

/// Shortest round-trip form (`400`, `0.5`); empty for nulls. Every text
/// format goes through this so table and CSV cells agree.
pub fn format_value(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Left-aligned text table with a header rule.
fn render_text_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let line = |cells: &[String]| {
        cells
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{:<width$}", c, width = widths[i]))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = line(headers);
    out.push('\n');
    out.push_str(
        &widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    out.push('\n');
    for row in rows {
        out.push_str(&line(row.as_slice()));
        out.push('\n');
    }
    out
}

/// Serialize rows as CSV with a header from the row type.
pub fn write_csv<W: Write, T: Serialize>(writer: W, rows: &[T]) -> anyhow::Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    for row in rows {
        csv.serialize(row)?;
    }
    csv.flush()?;
    Ok(())
}

fn csv_string<T: Serialize>(rows: &[T]) -> anyhow::Result<String> {
    let mut buffer = Vec::new();
    write_csv(&mut buffer, rows)?;
    Ok(String::from_utf8(buffer)?)
}

fn csv_records(headers: &[String], rows: &[Vec<String>]) -> anyhow::Result<String> {
    let mut buffer = Vec::new();
    {
        let mut csv = csv::Writer::from_writer(&mut buffer);
        csv.write_record(headers)?;
        for row in rows {
            csv.write_record(row)?;
        }
        csv.flush()?;
    }
    Ok(String::from_utf8(buffer)?)
}

/// Render fetch output in the requested format.
pub fn render_points(points: &[IndicatorPoint], format: OutputFormat) -> anyhow::Result<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(points)?);
    }

    let rows: Vec<Vec<String>> = points
        .iter()
        .map(|p| {
            vec![
                p.country_iso3.clone(),
                p.country_name.clone(),
                p.year.to_string(),
                format_value(p.value),
                p.unit.clone(),
            ]
        })
        .collect();

    match format {
        OutputFormat::Table => {
            let headers = ["iso3", "country", "year", "value", "unit"].map(String::from);
            Ok(render_text_table(&headers, &rows))
        }
        _ => {
            let headers =
                ["country_iso3", "country_name", "year", "value", "unit"].map(String::from);
            csv_records(&headers, &rows)
        }
    }
}

/// Render a pivoted year × country table.
pub fn render_wide(table: &WideTable, format: OutputFormat) -> anyhow::Result<String> {
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(table)?);
    }

    let mut headers = vec!["year".to_string()];
    headers.extend(table.columns.iter().cloned());
    let rows: Vec<Vec<String>> = table
        .years
        .iter()
        .zip(&table.rows)
        .map(|(year, cells)| {
            std::iter::once(year.to_string())
                .chain(cells.iter().map(|v| format_value(*v)))
                .collect()
        })
        .collect();

    match format {
        OutputFormat::Table => Ok(render_text_table(&headers, &rows)),
        _ => csv_records(&headers, &rows),
    }
}

/// Render any serializable listing (countries, indicators, summary counts).
pub fn render_rows<T: Serialize>(rows: &[T], format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(rows)?),
        _ => csv_string(rows),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wdi_db::pivot_wide;

    fn points() -> Vec<IndicatorPoint> {
        vec![
            IndicatorPoint {
                country_iso3: "ARG".into(),
                country_name: "Argentina".into(),
                year: 2020,
                value: Some(400.0),
                unit: "current US$".into(),
            },
            IndicatorPoint {
                country_iso3: "BRA".into(),
                country_name: "Brazil".into(),
                year: 2020,
                value: None,
                unit: "current US$".into(),
            },
        ]
    }

    #[test]
    fn csv_has_header_and_empty_nulls() {
        let out = render_points(&points(), OutputFormat::Csv).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "country_iso3,country_name,year,value,unit");
        assert_eq!(lines[1], "ARG,Argentina,2020,400,current US$");
        assert_eq!(lines[2], "BRA,Brazil,2020,,current US$");
    }

    #[test]
    fn table_is_aligned() {
        let out = render_points(&points(), OutputFormat::Table).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "iso3  country    year  value  unit");
        assert!(lines[1].starts_with("----  ---------  ----"));
        assert_eq!(lines[2], "ARG   Argentina  2020  400    current US$");
        assert_eq!(lines[3], "BRA   Brazil     2020         current US$");
    }

    #[test]
    fn table_and_csv_print_values_alike() {
        let mut points = points();
        points[1].value = Some(0.25);
        let csv = render_points(&points, OutputFormat::Csv).unwrap();
        let table = render_points(&points, OutputFormat::Table).unwrap();

        for value in ["400", "0.25"] {
            assert!(csv.contains(&format!(",{},", value)), "csv: {}", csv);
            assert!(table.contains(&format!("  {}  ", value)), "table: {}", table);
        }
        assert!(!csv.contains("400.0"));
    }

    #[test]
    fn json_round_trips_nulls() {
        let out = render_points(&points(), OutputFormat::Json).unwrap();
        let parsed: Vec<IndicatorPoint> = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed, points());
    }

    #[test]
    fn wide_csv_has_country_columns() {
        let out = render_wide(&pivot_wide(&points()), OutputFormat::Csv).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines, vec!["year,Argentina,Brazil", "2020,400,"]);
    }
}
