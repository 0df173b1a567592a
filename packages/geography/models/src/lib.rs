#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Commune and department geography types.
//!
//! Geography metadata is only ever used to attach display names to
//! aggregated results. It never takes part in the aggregation itself.

pub mod departments;

use serde::{Deserialize, Serialize};

/// Display metadata for one commune of the 2023 geography.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeographyMetadata {
    /// Canonical five-character commune code (e.g. `"75056"`, `"2A004"`).
    pub geography_code: String,
    /// Commune name (e.g. `"Paris"`).
    pub geography_name: String,
    /// Canonical department code (e.g. `"75"`, `"2A"`, `"971"`).
    pub department_code: String,
    /// Department name (e.g. `"Paris"`).
    pub department_name: String,
}

impl GeographyMetadata {
    /// Returns the selector label `"<commune name> (<department code>)"`.
    ///
    /// Commune names repeat across departments, so the department code is
    /// what makes the label unique.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} ({})", self.geography_name, self.department_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_includes_department_code() {
        let meta = GeographyMetadata {
            geography_code: "13022".to_string(),
            geography_name: "Cassis".to_string(),
            department_code: "13".to_string(),
            department_name: "Bouches-du-Rhône".to_string(),
        };
        assert_eq!(meta.label(), "Cassis (13)");
    }
}
