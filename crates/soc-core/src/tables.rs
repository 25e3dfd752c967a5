//! Static reference tables: per-crop coefficients, tillage multipliers and
//! texture decay fractions.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::types::{ValidationError, check_range};

/// Crop names that mark an unfilled form row rather than a real crop.
pub const PLACEHOLDER_CROPS: &[&str] = &["None", "Nessuna"];

/// Returns true if `crop` is a placeholder for "no crop selected".
pub fn is_placeholder_crop(crop: &str) -> bool {
    PLACEHOLDER_CROPS.contains(&crop.trim())
}

/// Canonical crop coefficients: (name, harvest index, carbon fraction, residue retention).
const CANONICAL_CROPS: &[(&str, f64, f64, f64)] = &[
    ("Mais granella", 0.50, 0.45, 1.0),
    ("Mais trinciato", 1.00, 0.45, 1.0),
    ("Frumento", 0.45, 0.45, 1.0),
    ("Frumento trinciato", 1.00, 0.45, 1.0),
    ("Orzo", 0.45, 0.45, 1.0),
    ("Sorgo da granella", 0.50, 0.45, 1.0),
    ("Sorgo trinciato", 1.00, 0.45, 1.0),
    ("Avena", 0.45, 0.45, 1.0),
    ("Erba medica", 1.00, 0.45, 1.0),
    ("Fieno/erba", 1.00, 0.40, 1.0),
    ("Soia", 0.40, 0.45, 1.0),
    ("Girasole", 0.45, 0.45, 1.0),
    ("Colza", 0.45, 0.45, 1.0),
    ("Triticale", 0.45, 0.45, 1.0),
];

static STANDARD_TABLES: LazyLock<ReferenceTables> = LazyLock::new(|| {
    let mut tables = ReferenceTables::empty();
    for &(crop, harvest_index, carbon_fraction, retention) in CANONICAL_CROPS {
        tables.harvest_index.insert(crop.to_string(), harvest_index);
        tables.carbon_fraction.insert(crop.to_string(), carbon_fraction);
        tables.residue_retention.insert(crop.to_string(), retention);
    }
    tables
});

/// Per-crop coefficient tables.
///
/// The three maps are independent: a crop may have a harvest index but no
/// carbon fraction or retention default, in which case the engine falls
/// back to [`Settings`](crate::Settings).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReferenceTables {
    harvest_index: BTreeMap<String, f64>,
    carbon_fraction: BTreeMap<String, f64>,
    residue_retention: BTreeMap<String, f64>,
}

impl ReferenceTables {
    /// The canonical tables shipped with the calculator.
    pub fn standard() -> &'static Self {
        &STANDARD_TABLES
    }

    /// Tables with no crops at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Sets a crop's harvest index. Zero is accepted and yields no residue.
    pub fn with_harvest_index(
        mut self,
        crop: impl Into<String>,
        value: f64,
    ) -> Result<Self, ValidationError> {
        let value = check_range("harvest index", value, 0.0, 1.0)?;
        self.harvest_index.insert(crop.into(), value);
        Ok(self)
    }

    /// Sets a crop's residue carbon fraction.
    pub fn with_carbon_fraction(
        mut self,
        crop: impl Into<String>,
        value: f64,
    ) -> Result<Self, ValidationError> {
        let value = check_range("carbon fraction", value, 0.0, 1.0)?;
        self.carbon_fraction.insert(crop.into(), value);
        Ok(self)
    }

    /// Sets a crop's default residue retention fraction.
    pub fn with_residue_retention(
        mut self,
        crop: impl Into<String>,
        value: f64,
    ) -> Result<Self, ValidationError> {
        let value = check_range("residue retention", value, 0.0, 1.0)?;
        self.residue_retention.insert(crop.into(), value);
        Ok(self)
    }

    /// Removes a crop's carbon fraction so the settings default applies.
    #[must_use]
    pub fn without_carbon_fraction(mut self, crop: &str) -> Self {
        self.carbon_fraction.remove(crop);
        self
    }

    /// Removes a crop's retention default so the settings default applies.
    #[must_use]
    pub fn without_residue_retention(mut self, crop: &str) -> Self {
        self.residue_retention.remove(crop);
        self
    }

    pub fn harvest_index(&self, crop: &str) -> Option<f64> {
        self.harvest_index.get(crop).copied()
    }

    pub fn carbon_fraction(&self, crop: &str) -> Option<f64> {
        self.carbon_fraction.get(crop).copied()
    }

    pub fn residue_retention(&self, crop: &str) -> Option<f64> {
        self.residue_retention.get(crop).copied()
    }

    /// Returns true if the crop has a harvest index, i.e. can be computed.
    pub fn is_known(&self, crop: &str) -> bool {
        self.harvest_index.contains_key(crop)
    }

    /// Crop names with a harvest index, in alphabetical order.
    pub fn crops(&self) -> impl Iterator<Item = &str> {
        self.harvest_index.keys().map(String::as_str)
    }
}

/// Soil disturbance regime, adjusting residue humification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tillage {
    #[default]
    Conventional,
    MinimumTillage,
    NoTill,
}

impl Tillage {
    pub const ALL: [Self; 3] = [Self::Conventional, Self::MinimumTillage, Self::NoTill];

    /// Humification multiplier; grows as disturbance decreases.
    pub const fn multiplier(self) -> f64 {
        match self {
            Self::Conventional => 1.00,
            Self::MinimumTillage => 1.05,
            Self::NoTill => 1.10,
        }
    }

    /// Stable key for storage.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Conventional => "conventional",
            Self::MinimumTillage => "minimum_tillage",
            Self::NoTill => "no_till",
        }
    }

    /// Label shown to users.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Conventional => "Convenzionale",
            Self::MinimumTillage => "Minima lavorazione",
            Self::NoTill => "No-till",
        }
    }
}

impl fmt::Display for Tillage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Tillage {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "conventional" | "convenzionale" => Ok(Self::Conventional),
            "minimum_tillage" | "minimum-tillage" | "minimum" | "minima lavorazione" => {
                Ok(Self::MinimumTillage)
            }
            "no_till" | "no-till" | "notill" => Ok(Self::NoTill),
            _ => Err(ValidationError::UnknownTillage {
                value: s.to_string(),
            }),
        }
    }
}

/// Soil texture class for the single-shot estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoilTexture {
    Sandy,
    SandyLoam,
    SiltLoam,
    ClayLoam,
    Clay,
}

impl SoilTexture {
    pub const ALL: [Self; 5] = [
        Self::Sandy,
        Self::SandyLoam,
        Self::SiltLoam,
        Self::ClayLoam,
        Self::Clay,
    ];

    /// Fraction of residue carbon lost rather than stabilized.
    pub const fn decay_fraction(self) -> f64 {
        match self {
            Self::Sandy => 0.30,
            Self::SandyLoam => 0.25,
            Self::SiltLoam => 0.20,
            Self::ClayLoam => 0.15,
            Self::Clay => 0.10,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sandy => "sandy",
            Self::SandyLoam => "sandy_loam",
            Self::SiltLoam => "silt_loam",
            Self::ClayLoam => "clay_loam",
            Self::Clay => "clay",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Sandy => "Sabbioso",
            Self::SandyLoam => "Franco-sabbioso",
            Self::SiltLoam => "Franco-limoso",
            Self::ClayLoam => "Franco-argilloso",
            Self::Clay => "Argilloso",
        }
    }
}

impl fmt::Display for SoilTexture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SoilTexture {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "sandy" | "sabbioso" => Ok(Self::Sandy),
            "sandy_loam" | "franco_sabbioso" => Ok(Self::SandyLoam),
            "silt_loam" | "franco_limoso" => Ok(Self::SiltLoam),
            "clay_loam" | "franco_argilloso" => Ok(Self::ClayLoam),
            "clay" | "argilloso" => Ok(Self::Clay),
            _ => Err(ValidationError::UnknownTexture {
                value: s.to_string(),
            }),
        }
    }
}
