#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Typed schemas for the three raw tables of the release.
//!
//! The publishing agency ships a per-commune table, a per-department table
//! and a commune metadata spreadsheet. Each is decoded once, at parse time,
//! into the record types below; nothing downstream looks columns up by
//! name.

use crimes_france_geography_models::GeographyMetadata;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Identifies one of the three raw tables.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TableId {
    /// Per-commune offense counts.
    Main,
    /// Per-department offense counts.
    Department,
    /// Commune names and department membership.
    CommuneMetadata,
}

impl TableId {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Main, Self::Department, Self::CommuneMetadata]
    }
}

/// One row of the main or department table.
///
/// For the main table `geography_code` is a commune code; for the
/// department table it is the department code. Codes and years are kept as
/// published until the key normalizer rewrites them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OffenseRecord {
    /// Commune code (main table) or department code (department table).
    pub geography_code: String,
    /// Department the row belongs to. Main-table rows carry `None` until
    /// normalization derives it from the commune code.
    pub department_code: Option<String>,
    /// Year as published (two digits, offset +2000) or, once normalized,
    /// the four-digit year.
    pub year: i32,
    /// Offense class label (`classe`).
    pub category: String,
    /// Recorded offenses. Unpublished values count as zero.
    pub offense_count: u64,
    /// Whether `offense_count` was published. The agency withholds small
    /// counts for privacy.
    pub published: bool,
    /// Resident population of the geography for that year, when recorded.
    pub population: Option<u64>,
}

/// A decoded main or department table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OffenseTable {
    /// Which table these records came from.
    pub table: TableId,
    /// Records in file order.
    pub records: Vec<OffenseRecord>,
}

/// The decoded commune metadata sheet.
///
/// Rows whose sheet carries no department name have an empty
/// `department_name` until normalization fills it in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeographyTable {
    /// One entry per commune, in sheet order.
    pub entries: Vec<GeographyMetadata>,
}

/// Any of the three decoded tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Table {
    /// Main or department table.
    Offenses(OffenseTable),
    /// Commune metadata table.
    Geography(GeographyTable),
}

impl Table {
    /// Returns the identifier of this table.
    #[must_use]
    pub const fn id(&self) -> TableId {
        match self {
            Self::Offenses(table) => table.table,
            Self::Geography(_) => TableId::CommuneMetadata,
        }
    }

    /// Number of rows in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Offenses(table) => table.records.len(),
            Self::Geography(table) => table.entries.len(),
        }
    }

    /// Whether the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the offense table, if this is the main or department table.
    #[must_use]
    pub const fn as_offenses(&self) -> Option<&OffenseTable> {
        match self {
            Self::Offenses(table) => Some(table),
            Self::Geography(_) => None,
        }
    }

    /// Returns the geography table, if this is the commune metadata table.
    #[must_use]
    pub const fn as_geography(&self) -> Option<&GeographyTable> {
        match self {
            Self::Geography(table) => Some(table),
            Self::Offenses(_) => None,
        }
    }
}
