//! Per-department totals placed on department centroids.

use std::{collections::BTreeMap, sync::Arc};

use crimes_france_analytics_models::DepartmentPoint;
use crimes_france_dataset::Snapshot;
use crimes_france_geography_models::departments::department;
use crimes_france_source_models::OffenseRecord;

use crate::{population, ratio};

/// Builds the department map view.
#[derive(Debug, Clone)]
pub struct DepartmentMap {
    snapshot: Arc<Snapshot>,
}

impl DepartmentMap {
    /// Creates a map builder over `snapshot`.
    #[must_use]
    pub const fn new(snapshot: Arc<Snapshot>) -> Self {
        Self { snapshot }
    }

    /// One point per department with rows in `year`, ordered by department
    /// code.
    ///
    /// Population is the reference-class population of that year; the rate
    /// is undefined when it is missing.
    #[must_use]
    pub fn points(&self, year: i32) -> Vec<DepartmentPoint> {
        let mut by_department: BTreeMap<&str, Vec<&OffenseRecord>> = BTreeMap::new();
        for row in self.snapshot.department().iter().filter(|r| r.year == year) {
            by_department
                .entry(row.geography_code.as_str())
                .or_default()
                .push(row);
        }

        by_department
            .into_iter()
            .filter_map(|(code, rows)| {
                let Some(info) = department(code) else {
                    log::warn!("no centroid for department {code}, skipping");
                    return None;
                };
                let total_offenses = rows.iter().map(|r| r.offense_count).sum();
                let population = population::recorded_by_year(rows.iter().copied())
                    .get(&year)
                    .copied();

                Some(DepartmentPoint {
                    department_code: info.code.to_string(),
                    department_name: info.name.to_string(),
                    total_offenses,
                    population,
                    offenses_per_inhabitant: ratio(total_offenses, population),
                    lat: info.lat,
                    lon: info.lon,
                })
            })
            .collect()
    }
}
