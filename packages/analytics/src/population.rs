//! Population by year, with backfill for years the tables leave empty.
//!
//! Population is repeated on every class row of a geography-year, so it is
//! read from the [`REFERENCE_CLASS`] row only and never summed across
//! classes. Over several geographies (the national scope) the reference
//! populations of each geography are added up, and a year counts as
//! recorded only when every geography present in it reports one.
//!
//! A population of zero is treated as missing.

use std::collections::{BTreeMap, BTreeSet};

use crimes_france_analytics_models::PopulationSource;
use crimes_france_crime_models::REFERENCE_CLASS;
use crimes_france_source_models::OffenseRecord;

/// How missing years are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backfill<'a> {
    /// Use the external reference for the year, then carry the latest prior
    /// year forward.
    Reference(&'a BTreeMap<i32, u64>),
    /// Carry the latest prior year forward.
    CarryForward,
}

/// Population recorded against the reference class, per year.
///
/// Years in which some geography has rows but no reference population are
/// absent, as are years with no reference population at all.
#[must_use]
pub fn recorded_by_year<'a>(
    rows: impl IntoIterator<Item = &'a OffenseRecord>,
) -> BTreeMap<i32, u64> {
    let reference = REFERENCE_CLASS.label();
    let mut present: BTreeMap<i32, BTreeSet<&'a str>> = BTreeMap::new();
    let mut reported: BTreeMap<i32, (BTreeSet<&'a str>, u64)> = BTreeMap::new();

    for row in rows {
        present
            .entry(row.year)
            .or_default()
            .insert(row.geography_code.as_str());
        if row.category != reference {
            continue;
        }
        if let Some(population) = row.population.filter(|p| *p > 0) {
            let (codes, total) = reported.entry(row.year).or_default();
            codes.insert(row.geography_code.as_str());
            *total += population;
        }
    }

    reported
        .into_iter()
        .filter(|(year, (codes, _))| {
            let complete = present.get(year).is_some_and(|all| all.len() == codes.len());
            if !complete {
                log::debug!("{year}: reference population missing for some geographies");
            }
            complete
        })
        .map(|(year, (_, total))| (year, total))
        .collect()
}

/// Resolves the population of each year in `years` (ascending).
#[must_use]
pub fn resolve(
    years: &[i32],
    recorded: &BTreeMap<i32, u64>,
    backfill: Backfill<'_>,
) -> Vec<Option<(u64, PopulationSource)>> {
    let mut last: Option<u64> = None;

    years
        .iter()
        .map(|year| {
            let resolved = recorded
                .get(year)
                .map(|p| (*p, PopulationSource::Recorded))
                .or_else(|| match backfill {
                    Backfill::Reference(reference) => reference
                        .get(year)
                        .filter(|p| **p > 0)
                        .map(|p| (*p, PopulationSource::Reference)),
                    Backfill::CarryForward => None,
                })
                .or_else(|| last.map(|p| (p, PopulationSource::CarriedForward)));

            if let Some((population, _)) = resolved {
                last = Some(population);
            }
            resolved
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{REFERENCE, reference, row};

    #[test]
    fn reads_population_from_the_reference_class_only() {
        let rows = [
            row("13", 2021, REFERENCE, 10, Some(2_000)),
            row("13", 2021, "Vols avec armes", 3, Some(2_000)),
            row("75", 2021, REFERENCE, 10, Some(3_000)),
            row("75", 2022, REFERENCE, 10, Some(0)),
        ];
        let recorded = recorded_by_year(&rows);
        assert_eq!(recorded, reference(&[(2021, 5_000)]));
    }

    #[test]
    fn partial_coverage_is_not_recorded() {
        let rows = [
            row("13", 2020, REFERENCE, 10, Some(1_000_000)),
            row("75", 2020, REFERENCE, 10, Some(1_000_000)),
            row("13", 2021, REFERENCE, 10, Some(1_010_000)),
            row("75", 2021, REFERENCE, 10, None),
            row("13", 2022, REFERENCE, 10, Some(1_020_000)),
            row("75", 2022, "Vols avec armes", 2, Some(1_000_000)),
        ];
        let recorded = recorded_by_year(&rows);
        assert_eq!(recorded, reference(&[(2020, 2_000_000)]));
    }

    #[test]
    fn national_backfill_prefers_reference_then_carries_forward() {
        let recorded = reference(&[(2019, 100), (2020, 110)]);
        let national = reference(&[(2021, 130)]);

        let resolved = resolve(
            &[2019, 2020, 2021, 2022],
            &recorded,
            Backfill::Reference(&national),
        );
        assert_eq!(
            resolved,
            vec![
                Some((100, PopulationSource::Recorded)),
                Some((110, PopulationSource::Recorded)),
                Some((130, PopulationSource::Reference)),
                Some((130, PopulationSource::CarriedForward)),
            ]
        );
    }

    #[test]
    fn local_backfill_carries_the_latest_prior_year() {
        let recorded = reference(&[(2017, 50), (2019, 60)]);
        let resolved = resolve(&[2016, 2017, 2018, 2019], &recorded, Backfill::CarryForward);
        assert_eq!(
            resolved,
            vec![
                None,
                Some((50, PopulationSource::Recorded)),
                Some((50, PopulationSource::CarriedForward)),
                Some((60, PopulationSource::Recorded)),
            ]
        );
    }
}
