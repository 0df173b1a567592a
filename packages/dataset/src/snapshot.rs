//! Normalized, immutable view of the three tables.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crimes_france_geography_models::GeographyMetadata;
use crimes_france_source::parsing::fold_text;
use crimes_france_source_models::{OffenseRecord, Table, TableId};

use crate::{DatasetError, KeyNormalizer, NormalizationReport, Normalized};

/// Commune metadata indexed by canonical commune code.
#[derive(Debug, Clone, Default)]
pub struct GeographyIndex {
    entries: Vec<GeographyMetadata>,
    by_code: HashMap<String, usize>,
    /// Folded `"<name> (<dep>)"` labels, parallel to `entries`.
    folded_labels: Vec<String>,
}

impl GeographyIndex {
    /// Indexes normalized metadata entries. Later duplicates of a code are
    /// ignored.
    #[must_use]
    pub fn new(entries: Vec<GeographyMetadata>) -> Self {
        let mut by_code = HashMap::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            by_code.entry(entry.geography_code.clone()).or_insert(i);
        }
        let folded_labels = entries.iter().map(|e| fold_text(&e.label())).collect();
        Self {
            entries,
            by_code,
            folded_labels,
        }
    }

    /// Looks up a commune by canonical code.
    #[must_use]
    pub fn get(&self, code: &str) -> Option<&GeographyMetadata> {
        self.by_code.get(code).map(|&i| &self.entries[i])
    }

    /// All communes, in metadata order.
    #[must_use]
    pub fn entries(&self) -> &[GeographyMetadata] {
        &self.entries
    }

    /// Number of communes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Finds communes whose label matches `query`, ignoring case, accents
    /// and punctuation.
    ///
    /// Exact name matches come first, then names starting with the query,
    /// then any other match. Within a group results are ordered by label.
    /// An empty query matches every commune.
    #[must_use]
    pub fn search(&self, query: &str, limit: usize) -> Vec<&GeographyMetadata> {
        let needle = fold_text(query);
        let mut matches: Vec<(u8, &GeographyMetadata)> = self
            .entries
            .iter()
            .zip(&self.folded_labels)
            .filter(|(entry, label)| {
                label.contains(&needle) || entry.geography_code.eq_ignore_ascii_case(query.trim())
            })
            .map(|(entry, label)| {
                let name = fold_text(&entry.geography_name);
                let rank = if name == needle {
                    0
                } else if label.starts_with(&needle) {
                    1
                } else {
                    2
                };
                (rank, entry)
            })
            .collect();

        matches.sort_by(|(rank_a, a), (rank_b, b)| {
            rank_a
                .cmp(rank_b)
                .then_with(|| a.geography_name.cmp(&b.geography_name))
                .then_with(|| a.department_code.cmp(&b.department_code))
        });
        matches.into_iter().take(limit).map(|(_, entry)| entry).collect()
    }
}

/// The normalized tables of one dataset release.
///
/// Built once and shared read-only between every aggregation.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    main: Vec<OffenseRecord>,
    department: Vec<OffenseRecord>,
    geography: GeographyIndex,
    national_population: BTreeMap<i32, u64>,
    reports: Vec<NormalizationReport>,
}

impl Snapshot {
    /// Creates a snapshot from already normalized rows.
    #[must_use]
    pub fn new(
        main: Vec<OffenseRecord>,
        department: Vec<OffenseRecord>,
        geography: Vec<GeographyMetadata>,
    ) -> Self {
        Self {
            main,
            department,
            geography: GeographyIndex::new(geography),
            national_population: BTreeMap::new(),
            reports: Vec::new(),
        }
    }

    /// Sets the external national population reference, keyed by year.
    #[must_use]
    pub fn with_national_population(mut self, population: BTreeMap<i32, u64>) -> Self {
        self.national_population = population;
        self
    }

    /// Normalizes the three raw tables into a snapshot.
    ///
    /// The metadata table is normalized first; its communes then define the
    /// code space the main table is checked against.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetError::WrongTableKind`] if a table is not of the
    /// expected kind.
    pub fn from_tables(
        normalizer: &KeyNormalizer,
        main: &Table,
        department: &Table,
        metadata: &Table,
    ) -> Result<Self, DatasetError> {
        let main = main.as_offenses().ok_or(DatasetError::WrongTableKind {
            table: main.id(),
            expected: "an offense table",
        })?;
        let department = department.as_offenses().ok_or(DatasetError::WrongTableKind {
            table: department.id(),
            expected: "an offense table",
        })?;
        let metadata = metadata.as_geography().ok_or(DatasetError::WrongTableKind {
            table: metadata.id(),
            expected: "the commune metadata table",
        })?;

        let Normalized {
            table: geography,
            report: geography_report,
        } = normalizer.normalize_geography(metadata);

        let communes = normalizer.clone().with_known_communes(
            geography
                .entries
                .iter()
                .map(|entry| entry.geography_code.clone()),
        );
        let Normalized {
            table: main,
            report: main_report,
        } = communes.normalize_offenses(main);
        let Normalized {
            table: department,
            report: department_report,
        } = normalizer.normalize_offenses(department);

        Ok(Self {
            main: main.records,
            department: department.records,
            geography: GeographyIndex::new(geography.entries),
            national_population: BTreeMap::new(),
            reports: vec![main_report, department_report, geography_report],
        })
    }

    /// Normalized rows of the main or department table. The metadata table
    /// has no offense rows.
    #[must_use]
    pub fn records(&self, table: TableId) -> &[OffenseRecord] {
        match table {
            TableId::Main => &self.main,
            TableId::Department => &self.department,
            TableId::CommuneMetadata => &[],
        }
    }

    /// Normalized per-commune rows.
    #[must_use]
    pub fn main(&self) -> &[OffenseRecord] {
        &self.main
    }

    /// Normalized per-department rows.
    #[must_use]
    pub fn department(&self) -> &[OffenseRecord] {
        &self.department
    }

    /// Commune metadata.
    #[must_use]
    pub const fn geography(&self) -> &GeographyIndex {
        &self.geography
    }

    /// External national population reference, keyed by year.
    #[must_use]
    pub const fn national_population(&self) -> &BTreeMap<i32, u64> {
        &self.national_population
    }

    /// Normalization reports, one per table, when the snapshot was built
    /// from raw tables.
    #[must_use]
    pub fn reports(&self) -> &[NormalizationReport] {
        &self.reports
    }

    /// The normalization report of one table.
    #[must_use]
    pub fn report(&self, table: TableId) -> Option<&NormalizationReport> {
        self.reports.iter().find(|r| r.table == table)
    }

    /// Distinct years present in a table.
    #[must_use]
    pub fn years(&self, table: TableId) -> BTreeSet<i32> {
        self.records(table).iter().map(|r| r.year).collect()
    }

    /// Distinct categories present in a table.
    #[must_use]
    pub fn categories(&self, table: TableId) -> BTreeSet<&str> {
        self.records(table)
            .iter()
            .map(|r| r.category.as_str())
            .collect()
    }

    /// Whether a department code appears in the department table.
    #[must_use]
    pub fn has_department(&self, code: &str) -> bool {
        self.department.iter().any(|r| r.geography_code == code)
    }
}

#[cfg(test)]
mod tests {
    use crimes_france_source_models::{GeographyTable, OffenseTable};

    use super::*;

    fn meta(code: &str, name: &str, dep: &str) -> GeographyMetadata {
        GeographyMetadata {
            geography_code: code.to_string(),
            geography_name: name.to_string(),
            department_code: dep.to_string(),
            department_name: String::new(),
        }
    }

    fn record(code: &str, year: i32, count: u64) -> OffenseRecord {
        OffenseRecord {
            geography_code: code.to_string(),
            department_code: None,
            year,
            category: "Vols avec armes".to_string(),
            offense_count: count,
            published: true,
            population: Some(500),
        }
    }

    #[test]
    fn search_ranks_exact_then_prefix_then_substring() {
        let index = GeographyIndex::new(vec![
            meta("33063", "Bordeaux", "33"),
            meta("75056", "Paris", "75"),
            meta("76498", "Sainte-Marguerite-sur-Mer", "76"),
            meta("42218", "Saint-Étienne", "42"),
            meta("95585", "Saint-Ouen-l'Aumône", "95"),
            meta("93070", "Saint-Ouen-sur-Seine", "93"),
        ]);

        let names: Vec<&str> = index
            .search("saint ouen", 10)
            .into_iter()
            .map(|m| m.geography_name.as_str())
            .collect();
        assert_eq!(names, vec!["Saint-Ouen-l'Aumône", "Saint-Ouen-sur-Seine"]);

        let etienne = index.search("saint-etienne", 10);
        assert_eq!(etienne.len(), 1);
        assert_eq!(etienne[0].geography_code, "42218");

        assert_eq!(index.search("PARIS (75)", 10)[0].geography_code, "75056");
        assert_eq!(index.search("33063", 10)[0].geography_name, "Bordeaux");
        assert_eq!(index.search("", 2).len(), 2);
        assert!(index.search("lyon", 10).is_empty());
    }

    #[test]
    fn builds_from_raw_tables() {
        let main = Table::Offenses(OffenseTable {
            table: TableId::Main,
            records: vec![record("1001", 16, 3), record("1002", 16, 4)],
        });
        let department = Table::Offenses(OffenseTable {
            table: TableId::Department,
            records: vec![record("1", 16, 7)],
        });
        let metadata = Table::Geography(GeographyTable {
            entries: vec![meta("01001", "L'Abergement-Clémenciat", "01")],
        });

        let snapshot =
            Snapshot::from_tables(&KeyNormalizer::new(), &main, &department, &metadata).unwrap();

        assert_eq!(snapshot.main().len(), 1);
        assert_eq!(snapshot.main()[0].geography_code, "01001");
        assert_eq!(snapshot.department()[0].geography_code, "01");
        assert_eq!(snapshot.report(TableId::Main).unwrap().dropped_count(), 1);
        assert_eq!(snapshot.years(TableId::Main), BTreeSet::from([2016]));
        assert!(snapshot.has_department("01"));
        assert_eq!(snapshot.geography().get("01001").unwrap().department_name, "Ain");
    }

    #[test]
    fn rejects_tables_of_the_wrong_kind() {
        let metadata = Table::Geography(GeographyTable::default());
        let err = Snapshot::from_tables(&KeyNormalizer::new(), &metadata, &metadata, &metadata)
            .unwrap_err();
        assert!(matches!(err, DatasetError::WrongTableKind { .. }));
    }
}
