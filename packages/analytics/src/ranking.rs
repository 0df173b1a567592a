//! Top-N rankings of communes or departments.

use std::{cmp::Ordering, collections::HashMap, sync::Arc};

use crimes_france_analytics_models::{RankBy, RankedUnit, RankingScope, TopNParams};
use crimes_france_crime_models::REFERENCE_CLASS;
use crimes_france_dataset::Snapshot;
use crimes_france_geography_models::departments::department_name;
use crimes_france_source_models::OffenseRecord;

use crate::{AnalyticsError, department_scope, ratio};

/// Ranks geographic units by offense count or per-capita rate.
#[derive(Debug, Clone)]
pub struct RateRanker {
    snapshot: Arc<Snapshot>,
}

impl RateRanker {
    /// Creates a ranker over `snapshot`.
    #[must_use]
    pub const fn new(snapshot: Arc<Snapshot>) -> Self {
        Self { snapshot }
    }

    /// The first `params.n` units for one year and category, sorted
    /// descending by the chosen field with ties broken by name.
    ///
    /// Population is the unit's reference-class population for the year.
    /// Units without one, and units whose count was withheld, have no rate
    /// and sort after every unit that has one. No matching rows gives an
    /// empty ranking.
    ///
    /// # Errors
    ///
    /// * [`AnalyticsError::InvalidParameter`] if the category is blank
    /// * [`AnalyticsError::UnknownScope`] if a department restriction names
    ///   an unknown department
    pub fn top_n(&self, params: &TopNParams) -> Result<Vec<RankedUnit>, AnalyticsError> {
        let category = params.category.trim();
        if category.is_empty() {
            return Err(AnalyticsError::InvalidParameter {
                name: "category",
                message: "must not be empty".to_string(),
            });
        }
        if params.n == 0 {
            return Ok(Vec::new());
        }

        let matches = |row: &&OffenseRecord| row.year == params.year && row.category == category;

        let communes = || reference_populations(self.snapshot.main(), params.year);

        let mut units: Vec<RankedUnit> = match &params.scope {
            RankingScope::Communes => {
                let populations = communes();
                self.snapshot
                    .main()
                    .iter()
                    .filter(matches)
                    .map(|row| self.commune_unit(row, &populations))
                    .collect()
            }
            RankingScope::CommunesIn(code) => {
                let department = department_scope(code)?;
                if !self.snapshot.has_department(&department)
                    && !self
                        .snapshot
                        .main()
                        .iter()
                        .any(|r| r.department_code.as_deref() == Some(department.as_str()))
                {
                    return Err(AnalyticsError::UnknownScope {
                        kind: "department",
                        code: code.clone(),
                    });
                }
                let populations = communes();
                self.snapshot
                    .main()
                    .iter()
                    .filter(matches)
                    .filter(|row| row.department_code.as_deref() == Some(department.as_str()))
                    .map(|row| self.commune_unit(row, &populations))
                    .collect()
            }
            RankingScope::Departments => {
                let populations = reference_populations(self.snapshot.department(), params.year);
                self.snapshot
                    .department()
                    .iter()
                    .filter(matches)
                    .map(|row| department_unit(row, &populations))
                    .collect()
            }
        };

        units.sort_by(|a, b| compare(a, b, params.rank_by));
        units.truncate(params.n);

        if units.is_empty() {
            log::debug!(
                "no {category:?} rows in {} for {}",
                params.year,
                params.scope
            );
        }
        Ok(units)
    }

    fn commune_unit(&self, row: &OffenseRecord, populations: &HashMap<&str, u64>) -> RankedUnit {
        let population = populations.get(row.geography_code.as_str()).copied();
        let (geography_name, department_code, department_name) =
            match self.snapshot.geography().get(&row.geography_code) {
                Some(meta) => (
                    meta.geography_name.clone(),
                    meta.department_code.clone(),
                    meta.department_name.clone(),
                ),
                None => {
                    let department = row.department_code.clone().unwrap_or_default();
                    let name = department_name(&department).to_string();
                    (row.geography_code.clone(), department, name)
                }
            };

        RankedUnit {
            geography_code: row.geography_code.clone(),
            geography_name,
            offense_count: row.offense_count,
            rate_per_capita: rate(row, population),
            population,
            department_code,
            department_name,
        }
    }
}

/// Reference-class population of each geography in `year`.
fn reference_populations(rows: &[OffenseRecord], year: i32) -> HashMap<&str, u64> {
    let reference = REFERENCE_CLASS.label();
    rows.iter()
        .filter(|row| row.year == year && row.category == reference)
        .filter_map(|row| {
            row.population
                .filter(|p| *p > 0)
                .map(|p| (row.geography_code.as_str(), p))
        })
        .collect()
}

fn rate(row: &OffenseRecord, population: Option<u64>) -> Option<f64> {
    if row.published {
        ratio(row.offense_count, population)
    } else {
        None
    }
}

fn department_unit(row: &OffenseRecord, populations: &HashMap<&str, u64>) -> RankedUnit {
    let population = populations.get(row.geography_code.as_str()).copied();
    let name = department_name(&row.geography_code).to_string();
    RankedUnit {
        geography_code: row.geography_code.clone(),
        geography_name: name.clone(),
        offense_count: row.offense_count,
        rate_per_capita: rate(row, population),
        population,
        department_code: row.geography_code.clone(),
        department_name: name,
    }
}

fn compare(a: &RankedUnit, b: &RankedUnit, rank_by: RankBy) -> Ordering {
    let primary = match rank_by {
        RankBy::RawCount => b.offense_count.cmp(&a.offense_count),
        RankBy::PerCapitaRate => match (a.rate_per_capita, b.rate_per_capita) {
            (Some(a), Some(b)) => b.total_cmp(&a),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
    };
    primary
        .then_with(|| a.geography_name.cmp(&b.geography_name))
        .then_with(|| a.geography_code.cmp(&b.geography_code))
}
