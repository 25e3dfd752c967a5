//! User-adjustable calculation defaults.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::engine::CO2_PER_C;
use crate::types::{ValidationError, check_range};

/// Upper bound for the extra annual loss, in t C/ha.
pub const MAX_EXTRA_ANNUAL_LOSS: f64 = 10.0;

/// How the extra annual loss is subtracted during aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossPolicy {
    /// The loss is not subtracted at all.
    Disabled,
    /// The loss is subtracted once per parcel, independent of its crop count.
    #[default]
    PerParcel,
}

impl LossPolicy {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::PerParcel => "per_parcel",
        }
    }
}

impl fmt::Display for LossPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LossPolicy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "disabled" | "off" => Ok(Self::Disabled),
            "per_parcel" | "parcel" => Ok(Self::PerParcel),
            _ => Err(ValidationError::UnknownLossPolicy {
                value: s.to_string(),
            }),
        }
    }
}

/// Process-wide defaults used when a crop-level value is absent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Carbon fraction of dry residue for crops missing from the table.
    pub default_carbon_fraction: f64,
    /// Fraction of residue carbon humified under conventional tillage.
    pub default_residue_humification: f64,
    /// Fraction of manure/compost carbon humified.
    pub default_manure_humification: f64,
    /// Extra soil carbon lost each year, t C/ha.
    pub extra_annual_loss_per_ha: f64,
    /// Residue retention for crops with no tabulated default.
    pub default_residue_retention: f64,
    pub loss_policy: LossPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_carbon_fraction: 0.45,
            default_residue_humification: 0.20,
            default_manure_humification: 0.35,
            extra_annual_loss_per_ha: 0.0,
            default_residue_retention: 1.0,
            loss_policy: LossPolicy::PerParcel,
        }
    }
}

impl Settings {
    /// Checks every field against its accepted range.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_range(
            "default carbon fraction",
            self.default_carbon_fraction,
            0.0,
            1.0,
        )?;
        check_range(
            "residue humification",
            self.default_residue_humification,
            0.0,
            1.0,
        )?;
        check_range(
            "manure humification",
            self.default_manure_humification,
            0.0,
            1.0,
        )?;
        check_range(
            "extra annual loss",
            self.extra_annual_loss_per_ha,
            0.0,
            MAX_EXTRA_ANNUAL_LOSS,
        )?;
        check_range(
            "default residue retention",
            self.default_residue_retention,
            0.0,
            1.0,
        )?;
        Ok(())
    }

    /// CO₂ subtracted once per parcel per hectare, or zero when disabled.
    pub fn annual_loss_co2_per_ha(&self) -> f64 {
        match self.loss_policy {
            LossPolicy::Disabled => 0.0,
            LossPolicy::PerParcel => self.extra_annual_loss_per_ha * CO2_PER_C,
        }
    }
}
