//! Join-key normalization.
//!
//! The three tables disagree on key formats: spreadsheets lose the leading
//! zero of `01001`, years are published as two digits, and the department
//! table and the metadata sheet spell department codes differently. The
//! [`KeyNormalizer`] rewrites every row into one canonical form:
//!
//! * commune codes: five characters, zero-padded, 2023 geography
//!   (`"01001"`, `"2A004"`, `"97411"`)
//! * department codes: `"01"`..`"95"`, `"2A"`, `"2B"`, `"971"`..`"976"`
//! * years: four digits
//!
//! Rows whose geography code has no canonical form are dropped and reported
//! in a [`NormalizationReport`]. Normalization never fails as a whole.

use std::collections::{BTreeSet, HashMap, HashSet};

use crimes_france_geography_models::{
    GeographyMetadata,
    departments::{
        canonical_commune_code, canonical_department_code, commune_department_code,
        department_name,
    },
};
use crimes_france_source_models::{GeographyTable, OffenseRecord, OffenseTable, Table, TableId};
use serde::{Deserialize, Serialize};

/// Why a row was left out of a normalized table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DropReason {
    /// The geography code has no mapping in the canonical code space.
    UnknownGeographyCode,
    /// A metadata row repeats a commune code already seen.
    DuplicateGeographyCode,
}

/// A row left out of a normalized table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DroppedRow {
    /// Geography code as published.
    pub code: String,
    /// Why the row was dropped.
    pub reason: DropReason,
}

/// Outcome of normalizing one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizationReport {
    /// Table that was normalized.
    pub table: TableId,
    /// Rows before normalization.
    pub input_rows: usize,
    /// Rows after normalization.
    pub output_rows: usize,
    /// Rows folded into an earlier row with the same normalized key.
    pub merged_rows: usize,
    /// Rows that were dropped, in input order.
    pub dropped: Vec<DroppedRow>,
}

impl NormalizationReport {
    const fn new(table: TableId, input_rows: usize) -> Self {
        Self {
            table,
            input_rows,
            output_rows: 0,
            merged_rows: 0,
            dropped: Vec::new(),
        }
    }

    /// Number of dropped rows.
    #[must_use]
    pub const fn dropped_count(&self) -> usize {
        self.dropped.len()
    }

    /// Distinct published codes among the dropped rows.
    #[must_use]
    pub fn dropped_codes(&self) -> BTreeSet<&str> {
        self.dropped.iter().map(|row| row.code.as_str()).collect()
    }

    fn drop_row(&mut self, code: &str, reason: DropReason) {
        self.dropped.push(DroppedRow {
            code: code.to_string(),
            reason,
        });
    }

    fn log(&self) {
        log::info!(
            "{}: normalized {} of {} rows ({} merged, {} dropped)",
            self.table,
            self.output_rows,
            self.input_rows,
            self.merged_rows,
            self.dropped_count()
        );
        if !self.dropped.is_empty() {
            let codes = self.dropped_codes();
            let sample: Vec<&str> = codes.iter().take(10).copied().collect();
            log::warn!(
                "{}: dropped {} rows with {} unmapped codes (e.g. {})",
                self.table,
                self.dropped_count(),
                codes.len(),
                sample.join(", ")
            );
        }
    }
}

/// A normalized table together with its report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized<T> {
    /// The normalized table.
    pub table: T,
    /// What happened to the input rows.
    pub report: NormalizationReport,
}

/// Converts a published year to four digits.
///
/// The tables publish `annee` as an offset from 2000 (`16` for 2016).
/// Four-digit years pass through unchanged.
#[must_use]
pub const fn normalize_year(year: i32) -> i32 {
    if year >= 0 && year < 100 {
        year + 2000
    } else {
        year
    }
}

fn add_populations(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a + b),
        (a, b) => a.or(b),
    }
}

/// Rewrites table keys into the canonical code space.
///
/// Deterministic and pure: the same input always yields the same output
/// and report.
#[derive(Debug, Clone, Default)]
pub struct KeyNormalizer {
    /// When set, commune codes must belong to this set.
    communes: Option<HashSet<String>>,
    /// Legacy commune codes mapped to their 2023 successor.
    crosswalk: HashMap<String, String>,
}

impl KeyNormalizer {
    /// Creates a normalizer that accepts any well-formed commune code of a
    /// known department.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts commune codes to the given (canonical) codes, typically
    /// those of the normalized metadata table.
    #[must_use]
    pub fn with_known_communes<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.communes = Some(codes.into_iter().map(Into::into).collect());
        self
    }

    /// Adds legacy-to-2023 commune code mappings for communes that merged
    /// or were renumbered. Pairs whose codes are malformed are ignored.
    #[must_use]
    pub fn with_crosswalk<I, S>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: AsRef<str>,
    {
        for (legacy, current) in pairs {
            if let (Some(legacy), Some(current)) = (
                canonical_commune_code(legacy.as_ref()),
                canonical_commune_code(current.as_ref()),
            ) {
                self.crosswalk.insert(legacy, current);
            }
        }
        self
    }

    /// Returns the canonical 2023 code for a raw commune code, or `None` if
    /// it has no mapping.
    #[must_use]
    pub fn commune_code(&self, raw: &str) -> Option<String> {
        let code = canonical_commune_code(raw)?;
        let code = self.crosswalk.get(&code).cloned().unwrap_or(code);
        match &self.communes {
            Some(known) if !known.contains(&code) => None,
            _ => Some(code),
        }
    }

    /// Returns the canonical code for a raw department code, or `None` if
    /// it has no mapping.
    #[must_use]
    pub fn department_code(&self, raw: &str) -> Option<String> {
        canonical_department_code(raw)
    }

    /// Normalizes any of the three tables.
    #[must_use]
    pub fn normalize(&self, table: &Table) -> Normalized<Table> {
        match table {
            Table::Offenses(offenses) => {
                let Normalized { table, report } = self.normalize_offenses(offenses);
                Normalized {
                    table: Table::Offenses(table),
                    report,
                }
            }
            Table::Geography(geography) => {
                let Normalized { table, report } = self.normalize_geography(geography);
                Normalized {
                    table: Table::Geography(table),
                    report,
                }
            }
        }
    }

    /// Normalizes the main or department table.
    ///
    /// Rows that collapse onto the same `(code, year, category)` key (a
    /// legacy code and its successor, or the same code spelled two ways)
    /// are merged by summing their counts. Populations are summed across
    /// distinct source communes and kept once for repeats of the same
    /// commune.
    #[must_use]
    pub fn normalize_offenses(&self, table: &OffenseTable) -> Normalized<OffenseTable> {
        let mut report = NormalizationReport::new(table.table, table.records.len());
        let mut records: Vec<OffenseRecord> = Vec::with_capacity(table.records.len());
        let mut index: HashMap<(String, i32, String), (usize, HashSet<String>)> = HashMap::new();

        for record in &table.records {
            let keys = match table.table {
                TableId::Department => self
                    .department_code(&record.geography_code)
                    .map(|dep| (dep.clone(), dep.clone(), dep)),
                _ => canonical_commune_code(&record.geography_code).and_then(|source| {
                    let code = self.commune_code(&source)?;
                    let dep = commune_department_code(&code)?.to_string();
                    Some((source, code, dep))
                }),
            };
            let Some((source, code, department)) = keys else {
                report.drop_row(&record.geography_code, DropReason::UnknownGeographyCode);
                continue;
            };

            let year = normalize_year(record.year);
            let category = record.category.trim().to_string();
            let key = (code.clone(), year, category.clone());

            if let Some((existing, sources)) = index.get_mut(&key) {
                let merged = &mut records[*existing];
                merged.offense_count += record.offense_count;
                merged.published |= record.published;
                merged.population = if sources.insert(source) {
                    add_populations(merged.population, record.population)
                } else {
                    merged.population.or(record.population)
                };
                report.merged_rows += 1;
                continue;
            }

            index.insert(key, (records.len(), HashSet::from([source])));
            records.push(OffenseRecord {
                geography_code: code,
                department_code: Some(department),
                year,
                category,
                offense_count: record.offense_count,
                published: record.published,
                population: record.population,
            });
        }

        report.output_rows = records.len();
        report.log();

        Normalized {
            table: OffenseTable {
                table: table.table,
                records,
            },
            report,
        }
    }

    /// Normalizes the commune metadata table.
    ///
    /// The department code comes from the `DEP` column when it is valid and
    /// from the commune code otherwise; a missing department name is filled
    /// from the department table. Only the first row of a repeated commune
    /// code is kept.
    #[must_use]
    pub fn normalize_geography(&self, table: &GeographyTable) -> Normalized<GeographyTable> {
        let mut report = NormalizationReport::new(TableId::CommuneMetadata, table.entries.len());
        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(table.entries.len());

        for entry in &table.entries {
            let Some(code) = canonical_commune_code(&entry.geography_code) else {
                report.drop_row(&entry.geography_code, DropReason::UnknownGeographyCode);
                continue;
            };
            let Some(department) = self
                .department_code(&entry.department_code)
                .or_else(|| commune_department_code(&code).map(str::to_string))
            else {
                report.drop_row(&entry.geography_code, DropReason::UnknownGeographyCode);
                continue;
            };
            if !seen.insert(code.clone()) {
                report.drop_row(&entry.geography_code, DropReason::DuplicateGeographyCode);
                continue;
            }

            let department_name = if entry.department_name.trim().is_empty() {
                department_name(&department).to_string()
            } else {
                entry.department_name.trim().to_string()
            };

            entries.push(GeographyMetadata {
                geography_code: code,
                geography_name: entry.geography_name.trim().to_string(),
                department_code: department,
                department_name,
            });
        }

        report.output_rows = entries.len();
        report.log();

        Normalized {
            table: GeographyTable { entries },
            report,
        }
    }
}
