//! Offense totals grouped by category.
//!
//! Categories overlap: one incident can be recorded under several classes.
//! Category totals therefore never add up to a number of incidents, and the
//! shares returned by [`CategoryAggregator::proportions`] describe the
//! breakdown of recorded class totals only.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use crimes_france_analytics_models::{
    CategoryAggregate, CategoryShare, CategoryYearEntry, Scope,
};
use crimes_france_dataset::Snapshot;

use crate::{AnalyticsError, round2, scoped_rows};

/// Groups offense rows by category over a snapshot.
#[derive(Debug, Clone)]
pub struct CategoryAggregator {
    snapshot: Arc<Snapshot>,
}

impl CategoryAggregator {
    /// Creates an aggregator over `snapshot`.
    #[must_use]
    pub const fn new(snapshot: Arc<Snapshot>) -> Self {
        Self { snapshot }
    }

    /// Totals per category for `year` in `scope`, largest first, ties by
    /// category name.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::UnknownScope`] if the scope is unknown.
    pub fn aggregate_by_category(
        &self,
        year: i32,
        scope: &Scope,
    ) -> Result<Vec<CategoryAggregate>, AnalyticsError> {
        let mut totals: HashMap<&str, u64> = HashMap::new();
        for row in scoped_rows(&self.snapshot, scope)? {
            if row.year == year {
                *totals.entry(row.category.as_str()).or_insert(0) += row.offense_count;
            }
        }

        let mut aggregates: Vec<CategoryAggregate> = totals
            .into_iter()
            .map(|(category, total_offenses)| CategoryAggregate {
                category: category.to_string(),
                total_offenses,
            })
            .collect();
        aggregates.sort_by(|a, b| {
            b.total_offenses
                .cmp(&a.total_offenses)
                .then_with(|| a.category.cmp(&b.category))
        });

        log::debug!(
            "{} categories for {scope} in {year}",
            aggregates.len()
        );
        Ok(aggregates)
    }

    /// Share of each category in the sum of all category totals, in the
    /// order of [`Self::aggregate_by_category`].
    ///
    /// The sum of all category totals counts an incident once per category
    /// it falls under, so a share is not the fraction of incidents of that
    /// kind. Shares are 0 when every total is 0.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::UnknownScope`] if the scope is unknown.
    #[allow(clippy::cast_precision_loss)]
    pub fn proportions(
        &self,
        year: i32,
        scope: &Scope,
    ) -> Result<Vec<CategoryShare>, AnalyticsError> {
        let aggregates = self.aggregate_by_category(year, scope)?;
        let sum: u64 = aggregates.iter().map(|a| a.total_offenses).sum();

        Ok(aggregates
            .into_iter()
            .map(|a| CategoryShare {
                share_pct: if sum == 0 {
                    0.0
                } else {
                    round2(a.total_offenses as f64 / sum as f64 * 100.0)
                },
                category: a.category,
                total_offenses: a.total_offenses,
            })
            .collect())
    }

    /// Totals per category and year in `scope`, sorted by year then
    /// category name.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyticsError::UnknownScope`] if the scope is unknown.
    pub fn category_series(&self, scope: &Scope) -> Result<Vec<CategoryYearEntry>, AnalyticsError> {
        let mut totals: BTreeMap<(i32, &str), u64> = BTreeMap::new();
        for row in scoped_rows(&self.snapshot, scope)? {
            *totals.entry((row.year, row.category.as_str())).or_insert(0) += row.offense_count;
        }

        Ok(totals
            .into_iter()
            .map(|((year, category), total_offenses)| CategoryYearEntry {
                year,
                category: category.to_string(),
                total_offenses,
            })
            .collect())
    }
}
