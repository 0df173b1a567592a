#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Offense class taxonomy published by the SSMSI.
//!
//! The municipal and departmental crime tables label every row with a
//! `classe`. Classes are **not** mutually exclusive: a single incident may
//! be recorded under more than one class, so per-class totals never form a
//! partition of a geography's grand total.
//!
//! Raw tables keep the class as the published label string so that a new
//! class added upstream does not break parsing. [`OffenseClass`] gives the
//! known labels a typed form for validation, display and the population
//! reference class.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString, IntoStaticStr};

/// Offense classes published in the 2023-geography release.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    IntoStaticStr,
)]
pub enum OffenseClass {
    /// Intentional assault and battery (all contexts).
    #[serde(rename = "Coups et blessures volontaires")]
    #[strum(serialize = "Coups et blessures volontaires")]
    IntentionalAssault,
    /// Intentional assault and battery within the family.
    #[serde(rename = "Coups et blessures volontaires intrafamiliaux")]
    #[strum(serialize = "Coups et blessures volontaires intrafamiliaux")]
    DomesticAssault,
    /// Intentional assault and battery outside the family.
    #[serde(rename = "Autres coups et blessures volontaires")]
    #[strum(serialize = "Autres coups et blessures volontaires")]
    OtherAssault,
    /// Sexual violence.
    #[serde(rename = "Violences sexuelles")]
    #[strum(serialize = "Violences sexuelles")]
    SexualViolence,
    /// Armed robbery.
    #[serde(rename = "Vols avec armes")]
    #[strum(serialize = "Vols avec armes")]
    ArmedRobbery,
    /// Violent theft without a weapon.
    #[serde(rename = "Vols violents sans arme")]
    #[strum(serialize = "Vols violents sans arme")]
    UnarmedViolentTheft,
    /// Non-violent theft from persons.
    #[serde(rename = "Vols sans violence contre des personnes")]
    #[strum(serialize = "Vols sans violence contre des personnes")]
    NonViolentTheft,
    /// Residential burglary.
    #[serde(rename = "Cambriolages de logement")]
    #[strum(serialize = "Cambriolages de logement")]
    ResidentialBurglary,
    /// Vehicle theft.
    #[serde(rename = "Vols de véhicules")]
    #[strum(serialize = "Vols de véhicules")]
    VehicleTheft,
    /// Theft from vehicles.
    #[serde(rename = "Vols dans les véhicules")]
    #[strum(serialize = "Vols dans les véhicules")]
    TheftFromVehicle,
    /// Theft of vehicle accessories.
    #[serde(rename = "Vols d'accessoires sur véhicules")]
    #[strum(serialize = "Vols d'accessoires sur véhicules")]
    VehicleAccessoryTheft,
    /// Intentional damage and destruction.
    #[serde(rename = "Destructions et dégradations volontaires")]
    #[strum(serialize = "Destructions et dégradations volontaires")]
    IntentionalDamage,
    /// Drug use.
    #[serde(rename = "Usage de stupéfiants")]
    #[strum(serialize = "Usage de stupéfiants")]
    DrugUse,
    /// Drug trafficking.
    #[serde(rename = "Trafic de stupéfiants")]
    #[strum(serialize = "Trafic de stupéfiants")]
    DrugTrafficking,
}

/// The class whose rows carry the population used for every
/// population-by-year lookup.
///
/// Population is repeated on every class row of a geography-year, so it is
/// read from exactly one class instead of being summed. This class has a
/// published row for every geography and every year of the release.
pub const REFERENCE_CLASS: OffenseClass = OffenseClass::IntentionalAssault;

impl OffenseClass {
    /// Returns the published (French) label, as it appears in the tables.
    #[must_use]
    pub fn label(self) -> &'static str {
        self.into()
    }

    /// Returns an English description of the class.
    #[must_use]
    pub const fn english_label(self) -> &'static str {
        match self {
            Self::IntentionalAssault => "Intentional assault and battery",
            Self::DomesticAssault => "Domestic assault and battery",
            Self::OtherAssault => "Other assault and battery",
            Self::SexualViolence => "Sexual violence",
            Self::ArmedRobbery => "Armed robbery",
            Self::UnarmedViolentTheft => "Violent theft without a weapon",
            Self::NonViolentTheft => "Non-violent theft from persons",
            Self::ResidentialBurglary => "Residential burglary",
            Self::VehicleTheft => "Vehicle theft",
            Self::TheftFromVehicle => "Theft from vehicles",
            Self::VehicleAccessoryTheft => "Theft of vehicle accessories",
            Self::IntentionalDamage => "Intentional damage and destruction",
            Self::DrugUse => "Drug use",
            Self::DrugTrafficking => "Drug trafficking",
        }
    }

    /// Parses a published label, ignoring surrounding whitespace.
    ///
    /// Returns `None` for labels outside the known taxonomy.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        label.trim().parse().ok()
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::IntentionalAssault,
            Self::DomesticAssault,
            Self::OtherAssault,
            Self::SexualViolence,
            Self::ArmedRobbery,
            Self::UnarmedViolentTheft,
            Self::NonViolentTheft,
            Self::ResidentialBurglary,
            Self::VehicleTheft,
            Self::TheftFromVehicle,
            Self::VehicleAccessoryTheft,
            Self::IntentionalDamage,
            Self::DrugUse,
            Self::DrugTrafficking,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_roundtrip_through_from_str() {
        for class in OffenseClass::all() {
            assert_eq!(OffenseClass::from_label(class.label()), Some(*class));
            assert_eq!(class.to_string(), class.label());
            assert_eq!(class.as_ref(), class.label());
        }
    }

    #[test]
    fn labels_are_unique() {
        let mut labels: Vec<&str> = OffenseClass::all().iter().map(|c| c.label()).collect();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), OffenseClass::all().len());
    }

    #[test]
    fn from_label_trims_and_rejects_unknown() {
        assert_eq!(
            OffenseClass::from_label("  Violences sexuelles "),
            Some(OffenseClass::SexualViolence)
        );
        assert_eq!(OffenseClass::from_label("Escroqueries"), None);
    }
}
