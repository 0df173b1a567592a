#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the crimes-france server.
//!
//! Derived views (series, aggregates, rankings) are returned as the
//! analytics models themselves. The types here cover query strings and the
//! responses that have no analytics counterpart.

use crimes_france_crime_models::OffenseClass;
use crimes_france_geography_models::GeographyMetadata;
use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the server is healthy.
    pub healthy: bool,
    /// Server version.
    pub version: String,
    /// Whether the dataset snapshot has been built.
    pub dataset_loaded: bool,
}

/// Error body returned with every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Human-readable message.
    pub error: String,
    /// Whether the same request may succeed later.
    pub retryable: bool,
}

/// An offense class of the taxonomy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiOffenseClass {
    /// Label as published.
    pub label: String,
    /// English description.
    pub english_label: String,
    /// Whether population by year is read from this class.
    pub reference: bool,
}

impl From<OffenseClass> for ApiOffenseClass {
    fn from(class: OffenseClass) -> Self {
        Self {
            label: class.label().to_string(),
            english_label: class.english_label().to_string(),
            reference: class == crimes_france_crime_models::REFERENCE_CLASS,
        }
    }
}

/// A commune as returned by the search endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCommune {
    /// Canonical commune code.
    pub code: String,
    /// Commune name.
    pub name: String,
    /// Display label, `"<name> (<department code>)"`.
    pub label: String,
    /// Department code.
    pub department_code: String,
    /// Department name.
    pub department_name: String,
}

impl From<GeographyMetadata> for ApiCommune {
    fn from(meta: GeographyMetadata) -> Self {
        Self {
            label: meta.label(),
            code: meta.geography_code,
            name: meta.geography_name,
            department_code: meta.department_code,
            department_name: meta.department_name,
        }
    }
}

/// Query parameters carrying only a scope.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeParams {
    /// `national`, `department:<code>` or `commune:<code>`. Defaults to
    /// national.
    pub scope: Option<String>,
}

/// Query parameters for one year of one scope.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearScopeParams {
    /// Four-digit year.
    pub year: i32,
    /// `national`, `department:<code>` or `commune:<code>`. Defaults to
    /// national.
    pub scope: Option<String>,
}

/// Query parameters for the ranking endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingParams {
    /// Four-digit year.
    pub year: i32,
    /// Category label.
    pub category: String,
    /// `communes`, `communes:<department code>` or `departments`.
    /// Defaults to communes.
    pub scope: Option<String>,
    /// Number of units. Defaults to 10.
    pub n: Option<usize>,
    /// `raw_count` or `per_capita_rate`. Defaults to raw count.
    pub rank_by: Option<String>,
}

/// Query parameters for the department map endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapParams {
    /// Four-digit year.
    pub year: i32,
}

/// Query parameters for the commune search endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommuneSearchParams {
    /// Search text. Matches every commune when absent.
    pub q: Option<String>,
    /// Maximum number of results. Defaults to 20.
    pub limit: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commune_carries_its_label() {
        let commune = ApiCommune::from(GeographyMetadata {
            geography_code: "13022".to_string(),
            geography_name: "Cassis".to_string(),
            department_code: "13".to_string(),
            department_name: "Bouches-du-Rhône".to_string(),
        });
        assert_eq!(commune.label, "Cassis (13)");
        assert_eq!(commune.code, "13022");
    }

    #[test]
    fn reference_class_is_flagged() {
        let flagged: Vec<ApiOffenseClass> = OffenseClass::all()
            .iter()
            .copied()
            .map(ApiOffenseClass::from)
            .filter(|c| c.reference)
            .collect();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].label, "Coups et blessures volontaires");
    }
}
