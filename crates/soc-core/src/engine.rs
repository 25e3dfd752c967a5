//! Carbon accounting formulas.
//!
//! # Derivation chain
//!
//! For a crop entry:
//!
//! 1. `biomass = yield / harvest_index` (zero when the index is zero)
//! 2. `residue = max(0, biomass - yield) * retention`
//! 3. `residue_carbon = residue * carbon_fraction`
//! 4. `humified = residue_carbon * residue_humification * tillage_multiplier`
//! 5. `manure_carbon = manure * manure_carbon_fraction * manure_humification`
//! 6. `delta_soc = humified + manure_carbon`
//! 7. `delta_co2 = delta_soc * 44/12`
//!
//! The texture variant replaces steps 4-6 with a flat decay keyed by soil
//! texture. The stock estimate is a separate snapshot of the carbon already
//! in the soil and is never added to annual deltas.

use serde::Serialize;
use thiserror::Error;

use crate::settings::Settings;
use crate::store::CropEntry;
use crate::tables::{ReferenceTables, SoilTexture};
use crate::types::{ValidationError, check_range};

/// Mass of CO₂ per unit mass of carbon (molar mass ratio).
pub const CO2_PER_C: f64 = 44.0 / 12.0;

/// Converts `% × g/cm³ × cm` into t/ha.
const STOCK_UNIT_FACTOR: f64 = 10.0;

/// Deepest sampled layer accepted by the stock estimate, cm.
pub const MAX_DEPTH_CM: f64 = 300.0;

/// Per-entry computation errors. These are reported and skipped during
/// aggregation, never fatal.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    /// The crop has no harvest index.
    #[error("unknown crop: {0}")]
    UnknownCrop(String),

    /// The yield is zero or negative.
    #[error("crop '{crop}' has a non-positive yield ({yield_t_per_ha} t/ha)")]
    NonPositiveYield { crop: String, yield_t_per_ha: f64 },

    #[error(transparent)]
    InvalidInput(#[from] ValidationError),
}

/// Annual carbon balance of one crop entry, per hectare.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CropBalance {
    pub crop: String,
    pub total_biomass_t_per_ha: f64,
    pub residue_t_per_ha: f64,
    pub residue_carbon_t_per_ha: f64,
    pub humified_carbon_t_per_ha: f64,
    pub manure_carbon_t_per_ha: f64,
    pub delta_soc_t_per_ha: f64,
    pub delta_co2_t_per_ha: f64,
}

/// Steps 1-3 of the chain, shared by both formula variants.
#[derive(Debug, Clone, Copy)]
struct ResidueCarbon {
    total_biomass: f64,
    residue: f64,
    residue_carbon: f64,
}

fn residue_carbon(
    crop: &str,
    yield_t_per_ha: f64,
    retention_pct: Option<f64>,
    tables: &ReferenceTables,
    settings: &Settings,
) -> Result<ResidueCarbon, EngineError> {
    let harvest_index = tables
        .harvest_index(crop)
        .ok_or_else(|| EngineError::UnknownCrop(crop.to_string()))?;
    if yield_t_per_ha.is_nan() || yield_t_per_ha <= 0.0 {
        return Err(EngineError::NonPositiveYield {
            crop: crop.to_string(),
            yield_t_per_ha,
        });
    }

    let total_biomass = if harvest_index > 0.0 {
        yield_t_per_ha / harvest_index
    } else {
        0.0
    };
    let retention = retention_pct
        .map(|pct| pct / 100.0)
        .or_else(|| tables.residue_retention(crop))
        .unwrap_or(settings.default_residue_retention)
        .clamp(0.0, 1.0);
    let residue = (total_biomass - yield_t_per_ha).max(0.0) * retention;
    let carbon_fraction = tables
        .carbon_fraction(crop)
        .unwrap_or(settings.default_carbon_fraction);

    Ok(ResidueCarbon {
        total_biomass,
        residue,
        residue_carbon: residue * carbon_fraction,
    })
}

/// Computes the per-hectare balance of a crop entry.
pub fn crop_balance(
    entry: &CropEntry,
    tables: &ReferenceTables,
    settings: &Settings,
) -> Result<CropBalance, EngineError> {
    let base = residue_carbon(
        entry.crop(),
        entry.yield_t_per_ha(),
        entry.residue_retention_pct(),
        tables,
        settings,
    )?;

    let humification = settings.default_residue_humification * entry.tillage().multiplier();
    let humified = base.residue_carbon * humification;
    let manure_carbon = entry.manure_t_per_ha()
        * entry.manure_carbon_fraction()
        * settings.default_manure_humification;
    let delta_soc = humified + manure_carbon;

    Ok(CropBalance {
        crop: entry.crop().to_string(),
        total_biomass_t_per_ha: base.total_biomass,
        residue_t_per_ha: base.residue,
        residue_carbon_t_per_ha: base.residue_carbon,
        humified_carbon_t_per_ha: humified,
        manure_carbon_t_per_ha: manure_carbon,
        delta_soc_t_per_ha: delta_soc,
        delta_co2_t_per_ha: delta_soc * CO2_PER_C,
    })
}

/// Inputs of the single-field, texture-based estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureInput {
    pub crop: String,
    pub yield_t_per_ha: f64,
    pub texture: SoilTexture,
    /// Overrides the tabulated retention, in percent.
    pub residue_retention_pct: Option<f64>,
}

/// Result of the texture-based estimate, per hectare.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextureBalance {
    pub crop: String,
    pub texture: SoilTexture,
    pub total_biomass_t_per_ha: f64,
    pub residue_t_per_ha: f64,
    pub residue_carbon_t_per_ha: f64,
    pub decay_fraction: f64,
    pub delta_soc_t_per_ha: f64,
    pub delta_co2_t_per_ha: f64,
}

impl TextureBalance {
    /// Total CO₂ for a field of `area_ha`.
    pub fn total_co2_t(&self, area_ha: f64) -> f64 {
        self.delta_co2_t_per_ha * area_ha
    }
}

/// Single-shot estimate: residue carbon minus a texture-keyed decay.
pub fn texture_balance(
    input: &TextureInput,
    tables: &ReferenceTables,
    settings: &Settings,
) -> Result<TextureBalance, EngineError> {
    if let Some(pct) = input.residue_retention_pct {
        check_range("residue retention", pct, 0.0, 100.0)?;
    }
    let base = residue_carbon(
        &input.crop,
        input.yield_t_per_ha,
        input.residue_retention_pct,
        tables,
        settings,
    )?;
    let decay_fraction = input.texture.decay_fraction();
    let delta_soc = base.residue_carbon * (1.0 - decay_fraction);

    Ok(TextureBalance {
        crop: input.crop.clone(),
        texture: input.texture,
        total_biomass_t_per_ha: base.total_biomass,
        residue_t_per_ha: base.residue,
        residue_carbon_t_per_ha: base.residue_carbon,
        decay_fraction,
        delta_soc_t_per_ha: delta_soc,
        delta_co2_t_per_ha: delta_soc * CO2_PER_C,
    })
}

/// Measured or looked-up soil properties for one depth slice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SoilSample {
    /// Organic carbon, percent of dry mass.
    pub organic_carbon_pct: f64,
    /// Bulk density, g/cm³.
    pub bulk_density_g_cm3: f64,
    /// Thickness of the sampled layer, cm.
    pub depth_cm: f64,
}

impl SoilSample {
    pub fn new(
        organic_carbon_pct: f64,
        bulk_density_g_cm3: f64,
        depth_cm: f64,
    ) -> Result<Self, ValidationError> {
        check_range("organic carbon", organic_carbon_pct, 0.0, 100.0)?;
        check_range("bulk density", bulk_density_g_cm3, 0.0, 3.0)?;
        if depth_cm.is_nan() || depth_cm <= 0.0 {
            return Err(ValidationError::NotPositive {
                field: "depth",
                value: depth_cm,
            });
        }
        check_range("depth", depth_cm, 0.0, MAX_DEPTH_CM)?;
        Ok(Self {
            organic_carbon_pct,
            bulk_density_g_cm3,
            depth_cm,
        })
    }
}

/// Current carbon stock of a field. Not an annual delta.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SoilStock {
    pub stock_c_t_per_ha: f64,
    pub stock_co2_t_per_ha: f64,
    pub area_ha: f64,
    pub total_co2_t: f64,
}

/// Estimates the carbon stock held in the sampled layer.
pub fn soil_stock(sample: &SoilSample, area_ha: f64) -> Result<SoilStock, ValidationError> {
    if area_ha.is_nan() || area_ha <= 0.0 {
        return Err(ValidationError::NotPositive {
            field: "area",
            value: area_ha,
        });
    }
    let stock_c = (sample.organic_carbon_pct / 100.0)
        * sample.bulk_density_g_cm3
        * sample.depth_cm
        * STOCK_UNIT_FACTOR;
    let stock_co2 = stock_c * CO2_PER_C;
    Ok(SoilStock {
        stock_c_t_per_ha: stock_c,
        stock_co2_t_per_ha: stock_co2,
        area_ha,
        total_co2_t: stock_co2 * area_ha,
    })
}
