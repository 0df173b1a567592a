#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Derived views and query parameters.
//!
//! Every type here is a value object recomputed per query and owned by the
//! caller. Nothing is persisted.

use std::str::FromStr;

use crimes_france_source_models::TableId;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Error returned when a scope string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeParseError {
    input: String,
    expected: &'static str,
}

impl std::fmt::Display for ScopeParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid scope {:?}, expected {}", self.input, self.expected)
    }
}

impl std::error::Error for ScopeParseError {}

/// Geographic extent of a series or aggregate.
///
/// Parses from and formats to `national`, `department:<code>` and
/// `commune:<code>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "code", rename_all = "camelCase")]
pub enum Scope {
    /// Whole country, from the department table summed over departments.
    National,
    /// One department, from the department table.
    Department(String),
    /// One commune, from the main table.
    Commune(String),
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::National => write!(f, "national"),
            Self::Department(code) => write!(f, "department:{code}"),
            Self::Commune(code) => write!(f, "commune:{code}"),
        }
    }
}

impl FromStr for Scope {
    type Err = ScopeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let error = || ScopeParseError {
            input: s.to_string(),
            expected: "national, department:<code> or commune:<code>",
        };
        let s = s.trim();
        if s.eq_ignore_ascii_case("national") {
            return Ok(Self::National);
        }
        let (kind, code) = s.split_once(':').ok_or_else(error)?;
        let code = code.trim();
        if code.is_empty() {
            return Err(error());
        }
        match kind.trim().to_ascii_lowercase().as_str() {
            "department" | "dep" => Ok(Self::Department(code.to_string())),
            "commune" | "city" => Ok(Self::Commune(code.to_string())),
            _ => Err(error()),
        }
    }
}

/// Population of the geographic units a ranking compares.
///
/// Parses from and formats to `communes`, `communes:<department code>` and
/// `departments`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "department", rename_all = "camelCase")]
pub enum RankingScope {
    /// Every commune of the main table.
    Communes,
    /// Communes of one department.
    CommunesIn(String),
    /// Departments of the department table.
    Departments,
}

impl std::fmt::Display for RankingScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Communes => write!(f, "communes"),
            Self::CommunesIn(code) => write!(f, "communes:{code}"),
            Self::Departments => write!(f, "departments"),
        }
    }
}

impl FromStr for RankingScope {
    type Err = ScopeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let error = || ScopeParseError {
            input: s.to_string(),
            expected: "communes, communes:<department code> or departments",
        };
        let s = s.trim();
        match s.split_once(':') {
            None if s.eq_ignore_ascii_case("communes") => Ok(Self::Communes),
            None if s.eq_ignore_ascii_case("departments") => Ok(Self::Departments),
            Some((kind, code)) if kind.trim().eq_ignore_ascii_case("communes") => {
                let code = code.trim();
                if code.is_empty() {
                    Err(error())
                } else {
                    Ok(Self::CommunesIn(code.to_string()))
                }
            }
            _ => Err(error()),
        }
    }
}

/// Field a ranking sorts on.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RankBy {
    /// Offense count.
    #[default]
    RawCount,
    /// Offenses per inhabitant.
    PerCapitaRate,
}

/// Where the population of a series entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PopulationSource {
    /// Published in the table.
    Recorded,
    /// Taken from the external national reference.
    Reference,
    /// Carried forward from the latest prior year with a population.
    CarriedForward,
}

/// One year of a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearSeriesEntry {
    /// Four-digit year.
    pub year: i32,
    /// Offenses over every category.
    pub total_offenses: u64,
    /// Population of the scope, when known.
    pub population: Option<u64>,
    /// Where `population` came from.
    pub population_source: Option<PopulationSource>,
    /// Offenses per 1000 inhabitants, rounded to 2 decimals. Undefined
    /// without a population.
    pub offenses_per_1000: Option<f64>,
    /// Change of `total_offenses` from the previous entry, in percent,
    /// rounded to 2 decimals. Undefined for the first entry and after a
    /// year with zero offenses.
    pub relative_change_pct: Option<f64>,
}

/// Offense total of one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAggregate {
    /// Category label.
    pub category: String,
    /// Offenses recorded under the category.
    pub total_offenses: u64,
}

/// Share of one category in the sum of all category totals.
///
/// Categories overlap, so the sum of all category totals is not the number
/// of distinct incidents. Shares describe the breakdown of recorded class
/// totals, not a partition of incidents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryShare {
    /// Category label.
    pub category: String,
    /// Offenses recorded under the category.
    pub total_offenses: u64,
    /// Percentage of the sum of all category totals, rounded to 2
    /// decimals.
    pub share_pct: f64,
}

/// Offense total of one category in one year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryYearEntry {
    /// Four-digit year.
    pub year: i32,
    /// Category label.
    pub category: String,
    /// Offenses recorded under the category that year.
    pub total_offenses: u64,
}

/// Parameters for a top-N ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopNParams {
    /// Four-digit year.
    pub year: i32,
    /// Category label.
    pub category: String,
    /// Units to rank.
    pub scope: RankingScope,
    /// Maximum number of units returned.
    pub n: usize,
    /// Sort field.
    pub rank_by: RankBy,
}

/// One geographic unit of a ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedUnit {
    /// Canonical commune or department code.
    pub geography_code: String,
    /// Display name.
    pub geography_name: String,
    /// Offenses in the ranked category and year.
    pub offense_count: u64,
    /// Offenses per inhabitant. Undefined without a population.
    pub rate_per_capita: Option<f64>,
    /// Population, when known.
    pub population: Option<u64>,
    /// Department code.
    pub department_code: String,
    /// Department name.
    pub department_name: String,
}

/// One department on the map view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentPoint {
    /// Canonical department code.
    pub department_code: String,
    /// Department name.
    pub department_name: String,
    /// Offenses over every category.
    pub total_offenses: u64,
    /// Population, when known.
    pub population: Option<u64>,
    /// Offenses per inhabitant. Undefined without a population.
    pub offenses_per_inhabitant: Option<f64>,
    /// Centroid latitude.
    pub lat: f64,
    /// Centroid longitude.
    pub lon: f64,
}

/// Number of rows of one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRowCount {
    /// Category label.
    pub category: String,
    /// Rows with this category.
    pub rows: usize,
}

/// Summary of one normalized table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSummary {
    /// Table identifier.
    pub table: TableId,
    /// Rows after normalization.
    pub rows: usize,
    /// Rows dropped during normalization.
    pub dropped_rows: usize,
    /// Distinct years, ascending.
    pub years: Vec<i32>,
    /// Rows per category, most frequent first.
    pub category_counts: Vec<CategoryRowCount>,
}

/// Summary of the whole dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetSummary {
    /// One entry per table.
    pub tables: Vec<TableSummary>,
}
