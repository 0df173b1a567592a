#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Aggregations over a normalized dataset snapshot.
//!
//! Each component takes the shared [`Snapshot`] in its constructor and
//! computes derived views synchronously, without touching the store:
//!
//! * [`YearSeriesBuilder`]: offenses and population by year
//! * [`CategoryAggregator`]: totals and shares by offense class
//! * [`RateRanker`]: top-N communes or departments by count or rate
//! * [`DepartmentMap`]: per-department totals with centroids
//!
//! [`Analytics`] ties them to a [`DatasetStore`], building the snapshot on
//! first use.

pub mod categories;
pub mod map;
pub mod population;
pub mod ranking;
pub mod series;
pub mod summary;

use std::sync::Arc;

use crimes_france_analytics_models::{
    CategoryAggregate, CategoryShare, CategoryYearEntry, DatasetSummary, DepartmentPoint,
    RankedUnit, Scope, TopNParams, YearSeriesEntry,
};
use crimes_france_dataset::{DatasetError, DatasetStore, Snapshot};
use crimes_france_geography_models::{
    GeographyMetadata,
    departments::{canonical_commune_code, canonical_department_code},
};
use crimes_france_source_models::OffenseRecord;
use thiserror::Error;

pub use categories::CategoryAggregator;
pub use map::DepartmentMap;
pub use ranking::RateRanker;
pub use series::YearSeriesBuilder;

/// Errors that can occur during analytics operations.
#[derive(Debug, Clone, Error)]
pub enum AnalyticsError {
    /// The dataset could not be loaded.
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    /// The requested commune or department is not in the dataset.
    #[error("Unknown {kind} {code:?}")]
    UnknownScope {
        /// `"commune"` or `"department"`.
        kind: &'static str,
        /// Code as requested.
        code: String,
    },

    /// A query parameter is out of range or malformed.
    #[error("Invalid parameter {name}: {message}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Description of what is wrong.
        message: String,
    },
}

/// Rounds to two decimals.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `numerator / denominator`, undefined for a zero denominator.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn ratio(numerator: u64, denominator: Option<u64>) -> Option<f64> {
    denominator
        .filter(|d| *d > 0)
        .map(|d| numerator as f64 / d as f64)
}

/// Canonical department code, or [`AnalyticsError::UnknownScope`].
pub(crate) fn department_scope(code: &str) -> Result<String, AnalyticsError> {
    canonical_department_code(code).ok_or_else(|| AnalyticsError::UnknownScope {
        kind: "department",
        code: code.to_string(),
    })
}

/// Rows covered by `scope`: the department table for national and
/// department scope, the main table for commune scope.
///
/// # Errors
///
/// Returns [`AnalyticsError::UnknownScope`] if the code is malformed or
/// names a geography the snapshot does not know.
pub(crate) fn scoped_rows<'a>(
    snapshot: &'a Snapshot,
    scope: &Scope,
) -> Result<Vec<&'a OffenseRecord>, AnalyticsError> {
    match scope {
        Scope::National => Ok(snapshot.department().iter().collect()),
        Scope::Department(code) => {
            let canonical = department_scope(code)?;
            if !snapshot.has_department(&canonical) {
                return Err(AnalyticsError::UnknownScope {
                    kind: "department",
                    code: code.clone(),
                });
            }
            Ok(snapshot
                .department()
                .iter()
                .filter(|r| r.geography_code == canonical)
                .collect())
        }
        Scope::Commune(code) => {
            let unknown = || AnalyticsError::UnknownScope {
                kind: "commune",
                code: code.clone(),
            };
            let canonical = canonical_commune_code(code).ok_or_else(unknown)?;
            let rows: Vec<&OffenseRecord> = snapshot
                .main()
                .iter()
                .filter(|r| r.geography_code == canonical)
                .collect();
            if rows.is_empty() && snapshot.geography().get(&canonical).is_none() {
                return Err(unknown());
            }
            Ok(rows)
        }
    }
}

/// Entry point for every aggregation, backed by a shared store.
///
/// The normalized snapshot is built on the first query and reused by every
/// later one. A failed build is not kept; the next query tries again.
#[derive(Debug, Clone)]
pub struct Analytics {
    store: Arc<DatasetStore>,
}

impl Analytics {
    /// Creates the facade over `store`.
    #[must_use]
    pub const fn new(store: Arc<DatasetStore>) -> Self {
        Self { store }
    }

    /// The backing store.
    #[must_use]
    pub const fn store(&self) -> &Arc<DatasetStore> {
        &self.store
    }

    /// Returns the normalized snapshot, building it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Dataset`] if a table cannot be loaded.
    pub async fn snapshot(&self) -> Result<Arc<Snapshot>, AnalyticsError> {
        Ok(self.store.snapshot().await?)
    }

    /// Offenses and population by year for `scope`.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError`] if the dataset cannot be loaded or the
    /// scope is unknown.
    pub async fn year_series(&self, scope: &Scope) -> Result<Vec<YearSeriesEntry>, AnalyticsError> {
        YearSeriesBuilder::new(self.snapshot().await?).build(scope)
    }

    /// Category totals for one year, largest first.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError`] if the dataset cannot be loaded or the
    /// scope is unknown.
    pub async fn categories(
        &self,
        year: i32,
        scope: &Scope,
    ) -> Result<Vec<CategoryAggregate>, AnalyticsError> {
        CategoryAggregator::new(self.snapshot().await?).aggregate_by_category(year, scope)
    }

    /// Category shares for one year, largest first.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError`] if the dataset cannot be loaded or the
    /// scope is unknown.
    pub async fn proportions(
        &self,
        year: i32,
        scope: &Scope,
    ) -> Result<Vec<CategoryShare>, AnalyticsError> {
        CategoryAggregator::new(self.snapshot().await?).proportions(year, scope)
    }

    /// Category totals for every year.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError`] if the dataset cannot be loaded or the
    /// scope is unknown.
    pub async fn category_series(
        &self,
        scope: &Scope,
    ) -> Result<Vec<CategoryYearEntry>, AnalyticsError> {
        CategoryAggregator::new(self.snapshot().await?).category_series(scope)
    }

    /// Top-N ranking.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError`] if the dataset cannot be loaded or the
    /// parameters are invalid.
    pub async fn top_n(&self, params: &TopNParams) -> Result<Vec<RankedUnit>, AnalyticsError> {
        RateRanker::new(self.snapshot().await?).top_n(params)
    }

    /// Per-department map points for one year.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Dataset`] if the dataset cannot be loaded.
    pub async fn department_map(&self, year: i32) -> Result<Vec<DepartmentPoint>, AnalyticsError> {
        Ok(DepartmentMap::new(self.snapshot().await?).points(year))
    }

    /// Communes matching `query`, best matches first.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Dataset`] if the dataset cannot be loaded.
    pub async fn search_communes(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<GeographyMetadata>, AnalyticsError> {
        let snapshot = self.snapshot().await?;
        Ok(snapshot
            .geography()
            .search(query, limit)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Row counts, years and category frequencies of every table.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::Dataset`] if the dataset cannot be loaded.
    pub async fn summary(&self) -> Result<DatasetSummary, AnalyticsError> {
        Ok(summary::summarize(&*self.snapshot().await?))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::BTreeMap;

    use crimes_france_geography_models::{
        GeographyMetadata,
        departments::{commune_department_code, department_name},
    };
    use crimes_france_source_models::OffenseRecord;

    pub const REFERENCE: &str = "Coups et blessures volontaires";

    pub fn row(code: &str, year: i32, category: &str, count: u64, population: Option<u64>) -> OffenseRecord {
        let department = if code.len() == 5 {
            commune_department_code(code).map_or_else(|| code[..2].to_string(), str::to_string)
        } else {
            code.to_string()
        };
        OffenseRecord {
            geography_code: code.to_string(),
            department_code: Some(department),
            year,
            category: category.to_string(),
            offense_count: count,
            published: true,
            population,
        }
    }

    pub fn commune(code: &str, name: &str) -> GeographyMetadata {
        let department = commune_department_code(code).unwrap_or("??").to_string();
        GeographyMetadata {
            geography_code: code.to_string(),
            geography_name: name.to_string(),
            department_name: department_name(&department).to_string(),
            department_code: department,
        }
    }

    pub fn reference(pairs: &[(i32, u64)]) -> BTreeMap<i32, u64> {
        pairs.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;
    use crimes_france_analytics_models::{RankBy, RankingScope};
    use crimes_france_source::{Fetcher, SourceError, config::SourcesConfig};

    use super::*;

    const CONFIG: &str = r#"
        [tables.main]
        url = "main"
        format = "csv"
        [tables.department]
        url = "department"
        format = "csv"
        [tables.commune_metadata]
        url = "metadata"
        format = "csv"
        delimiter = ","
        [population.national]
        2022 = 68_000_000
    "#;

    const MAIN_CSV: &str = "\
CODGEO_2023;annee;classe;faits;POP
13022;21;Coups et blessures volontaires;10;7500
13022;21;Vols avec armes;1;7500
13022;22;Coups et blessures volontaires;12;7500
75056;22;Coups et blessures volontaires;9000;2100000
";

    const DEPARTMENT_CSV: &str = "\
Code.département;annee;classe;faits;POP
13;21;Coups et blessures volontaires;15000;2043110
75;21;Coups et blessures volontaires;14000;2145906
13;22;Coups et blessures volontaires;16000;
75;22;Coups et blessures volontaires;15000;
";

    const METADATA_CSV: &str = "\
CODGEO,LIBGEO,DEP
13022,Cassis,13
75056,Paris,75
";

    #[derive(Default)]
    struct StaticFetcher {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Fetcher for StaticFetcher {
        async fn fetch(&self, location: &str) -> Result<Vec<u8>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(SourceError::Status {
                    status: 503,
                    url: location.to_string(),
                });
            }
            let payloads: HashMap<&str, &str> = [
                ("main", MAIN_CSV),
                ("department", DEPARTMENT_CSV),
                ("metadata", METADATA_CSV),
            ]
            .into_iter()
            .collect();
            Ok(payloads.get(location).copied().unwrap_or_default().as_bytes().to_vec())
        }
    }

    fn analytics(fetcher: Arc<StaticFetcher>) -> Analytics {
        let config = SourcesConfig::from_toml(CONFIG).unwrap();
        Analytics::new(Arc::new(DatasetStore::new(fetcher, config)))
    }

    #[tokio::test]
    async fn answers_queries_from_one_snapshot() {
        let fetcher = Arc::new(StaticFetcher::default());
        let analytics = analytics(Arc::clone(&fetcher));

        let national = analytics.year_series(&Scope::National).await.unwrap();
        assert_eq!(national.len(), 2);
        assert_eq!(national[0].total_offenses, 29_000);
        assert_eq!(national[0].population, Some(2_043_110 + 2_145_906));
        assert_eq!(national[1].population, Some(68_000_000));

        let cassis = analytics
            .year_series(&Scope::Commune("13022".to_string()))
            .await
            .unwrap();
        assert_eq!(cassis[0].total_offenses, 11);
        assert_eq!(cassis[1].relative_change_pct, Some(9.09));

        let top = analytics
            .top_n(&TopNParams {
                year: 2022,
                category: "Coups et blessures volontaires".to_string(),
                scope: RankingScope::Communes,
                n: 1,
                rank_by: RankBy::RawCount,
            })
            .await
            .unwrap();
        assert_eq!(top[0].geography_name, "Paris");

        let found = analytics.search_communes("cass", 5).await.unwrap();
        assert_eq!(found[0].label(), "Cassis (13)");

        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn unavailable_dataset_surfaces_as_retryable_error() {
        let fetcher = Arc::new(StaticFetcher {
            fail: true,
            ..StaticFetcher::default()
        });
        let err = analytics(fetcher).summary().await.unwrap_err();
        let AnalyticsError::Dataset(err) = err else {
            panic!("expected dataset error, got {err:?}");
        };
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn unknown_scope_is_reported() {
        let analytics = analytics(Arc::new(StaticFetcher::default()));
        let err = analytics
            .year_series(&Scope::Commune("01001".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::UnknownScope { kind: "commune", .. }));

        let err = analytics
            .categories(2022, &Scope::Department("20".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::UnknownScope { kind: "department", .. }));
    }

    #[test]
    fn rounds_to_two_decimals() {
        assert!((round2(9.090_909) - 9.09).abs() < f64::EPSILON);
        assert!((round2(-3.335_1) + 3.34).abs() < f64::EPSILON);
        assert_eq!(ratio(5, Some(0)), None);
        assert_eq!(ratio(5, None), None);
    }
}
