//! Year-indexed offense series.

use std::{collections::BTreeMap, sync::Arc};

use crimes_france_analytics_models::{Scope, YearSeriesEntry};
use crimes_france_dataset::Snapshot;

use crate::{
    AnalyticsError, ratio, round2,
    population::{self, Backfill},
    scoped_rows,
};

/// Builds year series over a snapshot.
#[derive(Debug, Clone)]
pub struct YearSeriesBuilder {
    snapshot: Arc<Snapshot>,
}

impl YearSeriesBuilder {
    /// Creates a builder over `snapshot`.
    #[must_use]
    pub const fn new(snapshot: Arc<Snapshot>) -> Self {
        Self { snapshot }
    }

    /// Offenses per year for `scope`, ascending by year.
    ///
    /// National scope sums the department table; population gaps are filled
    /// from the national reference, then carried forward. Department and
    /// commune scope only carry forward.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::UnknownScope`] if the scope is unknown.
    #[allow(clippy::cast_precision_loss)]
    pub fn build(&self, scope: &Scope) -> Result<Vec<YearSeriesEntry>, AnalyticsError> {
        let rows = scoped_rows(&self.snapshot, scope)?;

        let mut totals: BTreeMap<i32, u64> = BTreeMap::new();
        for row in &rows {
            *totals.entry(row.year).or_insert(0) += row.offense_count;
        }

        let recorded = population::recorded_by_year(rows.iter().copied());
        let backfill = match scope {
            Scope::National => Backfill::Reference(self.snapshot.national_population()),
            Scope::Department(_) | Scope::Commune(_) => Backfill::CarryForward,
        };
        let years: Vec<i32> = totals.keys().copied().collect();
        let populations = population::resolve(&years, &recorded, backfill);

        let mut previous: Option<u64> = None;
        let series: Vec<YearSeriesEntry> = totals
            .into_iter()
            .zip(populations)
            .map(|((year, total), population)| {
                let relative_change_pct = previous
                    .filter(|p| *p > 0)
                    .map(|p| round2((total as f64 - p as f64) / p as f64 * 100.0));
                previous = Some(total);

                let population_value = population.map(|(p, _)| p);
                YearSeriesEntry {
                    year,
                    total_offenses: total,
                    population: population_value,
                    population_source: population.map(|(_, source)| source),
                    offenses_per_1000: ratio(total, population_value).map(|r| round2(r * 1000.0)),
                    relative_change_pct,
                }
            })
            .collect();

        log::debug!("year series for {scope}: {} entries", series.len());
        Ok(series)
    }
}
