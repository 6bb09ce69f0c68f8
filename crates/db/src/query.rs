//! Typed, validated fetch parameters.
//!
//! An [`IndicatorQuery`] can only be built from values that pass validation,
//! so the repository never has to re-check its input and never interpolates
//! caller strings into SQL.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Earliest year accepted in a query.
pub const MIN_YEAR: i32 = 1900;
/// Latest year accepted in a query.
pub const MAX_YEAR: i32 = 2100;
/// Longest indicator code accepted in a query.
pub const MAX_INDICATOR_CODE_LEN: usize = 64;

/// Validation failure while building a query.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("country set must not be empty")]
    EmptyCountries,
    #[error("invalid ISO3 country code `{0}`")]
    InvalidCountryCode(String),
    #[error("invalid indicator code `{0}`")]
    InvalidIndicatorCode(String),
    #[error("year {0} is outside the supported range {}..={}", MIN_YEAR, MAX_YEAR)]
    ImplausibleYear(i32),
    #[error("year range {from}..={to} is reversed")]
    ReversedRange { from: i32, to: i32 },
}

/// A three-letter ISO country code, stored upper case.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CountryCode(String);

impl CountryCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for CountryCode {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.len() == 3 && trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            Ok(Self(trimmed.to_ascii_uppercase()))
        } else {
            Err(QueryError::InvalidCountryCode(s.to_string()))
        }
    }
}

impl TryFrom<String> for CountryCode {
    type Error = QueryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CountryCode> for String {
    fn from(code: CountryCode) -> Self {
        code.0
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A World Bank indicator code such as `NY.GDP.MKTP.CD`.
///
/// Case is preserved; codes are matched exactly.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IndicatorCode(String);

impl IndicatorCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for IndicatorCode {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let valid = !trimmed.is_empty()
            && trimmed.len() <= MAX_INDICATOR_CODE_LEN
            && trimmed
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_');
        if valid {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(QueryError::InvalidIndicatorCode(s.to_string()))
        }
    }
}

impl TryFrom<String> for IndicatorCode {
    type Error = QueryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<IndicatorCode> for String {
    fn from(code: IndicatorCode) -> Self {
        code.0
    }
}

impl fmt::Display for IndicatorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Inclusive year range with `from <= to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct YearRange {
    from: i32,
    to: i32,
}

impl YearRange {
    pub fn new(from: i32, to: i32) -> Result<Self, QueryError> {
        for year in [from, to] {
            if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
                return Err(QueryError::ImplausibleYear(year));
            }
        }
        if from > to {
            return Err(QueryError::ReversedRange { from, to });
        }
        Ok(Self { from, to })
    }

    pub fn from(&self) -> i32 {
        self.from
    }

    pub fn to(&self) -> i32 {
        self.to
    }
}

/// Filters for [`IndicatorRepository::fetch`](crate::IndicatorRepository::fetch).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndicatorQuery {
    countries: BTreeSet<CountryCode>,
    indicator: IndicatorCode,
    years: YearRange,
    drop_missing: bool,
}

impl IndicatorQuery {
    /// Build a query from raw filter values.
    ///
    /// Country codes are normalised to upper case and deduplicated. Null
    /// values are kept unless [`drop_missing`](Self::drop_missing) is set.
    pub fn new<I, S>(
        countries: I,
        indicator: &str,
        year_from: i32,
        year_to: i32,
    ) -> Result<Self, QueryError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let countries = countries
            .into_iter()
            .map(|c| c.as_ref().parse::<CountryCode>())
            .collect::<Result<BTreeSet<_>, _>>()?;
        if countries.is_empty() {
            return Err(QueryError::EmptyCountries);
        }

        Ok(Self {
            countries,
            indicator: indicator.parse()?,
            years: YearRange::new(year_from, year_to)?,
            drop_missing: false,
        })
    }

    /// Exclude rows whose value is null.
    pub fn drop_missing(mut self, drop: bool) -> Self {
        self.drop_missing = drop;
        self
    }

    pub fn countries(&self) -> &BTreeSet<CountryCode> {
        &self.countries
    }

    pub fn indicator(&self) -> &IndicatorCode {
        &self.indicator
    }

    pub fn years(&self) -> YearRange {
        self.years
    }

    pub fn drops_missing(&self) -> bool {
        self.drop_missing
    }
}
