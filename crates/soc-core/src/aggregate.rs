//! Parcel, year and multi-year aggregation.
//!
//! Sums are taken with [`stable_sum`], which sorts its terms before a
//! compensated summation. Permuting crops or parcels therefore yields
//! bit-identical totals.

use serde::Serialize;

use crate::engine::{CO2_PER_C, CropBalance, EngineError, crop_balance};
use crate::settings::Settings;
use crate::store::{ParcelRecord, Store, YearRecord};
use crate::tables::ReferenceTables;
use crate::types::Year;

/// Order-independent sum (sorted Neumaier summation).
pub fn stable_sum(values: impl IntoIterator<Item = f64>) -> f64 {
    let mut terms: Vec<f64> = values.into_iter().collect();
    terms.sort_by(f64::total_cmp);

    let mut sum = 0.0_f64;
    let mut compensation = 0.0_f64;
    for term in terms {
        let next = sum + term;
        if sum.abs() >= term.abs() {
            compensation += (sum - next) + term;
        } else {
            compensation += (term - next) + sum;
        }
        sum = next;
    }
    sum + compensation
}

/// Why a crop entry was left out of a total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    UnknownCrop,
    NonPositiveYield,
    InvalidInput,
}

impl From<&EngineError> for SkipReason {
    fn from(err: &EngineError) -> Self {
        match err {
            EngineError::UnknownCrop(_) => Self::UnknownCrop,
            EngineError::NonPositiveYield { .. } => Self::NonPositiveYield,
            EngineError::InvalidInput(_) => Self::InvalidInput,
        }
    }
}

/// A crop entry that contributed nothing to its parcel's total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedEntry {
    /// Position in the parcel's crop list (zero-based).
    pub index: usize,
    pub crop: String,
    pub reason: SkipReason,
    pub message: String,
}

/// Balance of one parcel for one year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParcelSummary {
    pub name: String,
    pub area_ha: f64,
    pub crops: Vec<CropBalance>,
    pub skipped: Vec<SkippedEntry>,
    /// Sum of crop ΔSOC, t C/ha.
    pub delta_soc_t_per_ha: f64,
    /// Sum of crop ΔCO₂ before the annual loss, t CO₂/ha.
    pub delta_co2_t_per_ha: f64,
    /// Annual loss subtracted once for the parcel, t CO₂/ha.
    pub annual_loss_co2_t_per_ha: f64,
    /// `delta_co2 - annual_loss`, t CO₂/ha.
    pub net_co2_t_per_ha: f64,
    /// `net_co2 * area`, t CO₂.
    pub total_co2_t: f64,
}

/// Computes a parcel's balance, skipping and reporting invalid entries.
pub fn summarize_parcel(
    name: &str,
    parcel: &ParcelRecord,
    tables: &ReferenceTables,
    settings: &Settings,
) -> ParcelSummary {
    let mut crops = Vec::new();
    let mut skipped = Vec::new();

    for (index, entry) in parcel.crop_entries().iter().enumerate() {
        match crop_balance(entry, tables, settings) {
            Ok(balance) => {
                tracing::debug!(
                    parcel = name,
                    crop = entry.crop(),
                    delta_co2 = balance.delta_co2_t_per_ha,
                    "computed crop balance"
                );
                crops.push(balance);
            }
            Err(err) => {
                tracing::warn!(parcel = name, crop = entry.crop(), error = %err, "skipping crop entry");
                skipped.push(SkippedEntry {
                    index,
                    crop: entry.crop().to_string(),
                    reason: SkipReason::from(&err),
                    message: err.to_string(),
                });
            }
        }
    }

    let delta_soc = stable_sum(crops.iter().map(|c| c.delta_soc_t_per_ha));
    let delta_co2 = stable_sum(crops.iter().map(|c| c.delta_co2_t_per_ha));
    let annual_loss = settings.annual_loss_co2_per_ha();
    let net_co2 = delta_co2 - annual_loss;

    ParcelSummary {
        name: name.to_string(),
        area_ha: parcel.area_ha(),
        crops,
        skipped,
        delta_soc_t_per_ha: delta_soc,
        delta_co2_t_per_ha: delta_co2,
        annual_loss_co2_t_per_ha: annual_loss,
        net_co2_t_per_ha: net_co2,
        total_co2_t: net_co2 * parcel.area_ha(),
    }
}

impl ParcelSummary {
    /// Net soil carbon change after the annual loss, t C/ha.
    pub fn net_soc_t_per_ha(&self) -> f64 {
        self.net_co2_t_per_ha / CO2_PER_C
    }
}

/// All parcels of a single year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSummary {
    pub year: Year,
    pub parcels: Vec<ParcelSummary>,
    pub total_area_ha: f64,
    pub total_co2_t: f64,
}

impl PortfolioSummary {
    /// Number of crop entries skipped across all parcels.
    pub fn skipped_count(&self) -> usize {
        self.parcels.iter().map(|p| p.skipped.len()).sum()
    }
}

/// Sums every parcel recorded for `year`.
pub fn summarize_year(
    year: Year,
    record: &YearRecord,
    tables: &ReferenceTables,
    settings: &Settings,
) -> PortfolioSummary {
    let parcels: Vec<ParcelSummary> = record
        .parcels()
        .map(|(name, parcel)| summarize_parcel(name.as_str(), parcel, tables, settings))
        .collect();

    PortfolioSummary {
        year,
        total_area_ha: stable_sum(parcels.iter().map(|p| p.area_ha)),
        total_co2_t: stable_sum(parcels.iter().map(|p| p.total_co2_t)),
        parcels,
    }
}

/// Every tracked year, plus the grand total across years.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreSummary {
    pub years: Vec<PortfolioSummary>,
    pub total_co2_t: f64,
}

/// Sums every year in the store.
pub fn summarize_store(
    store: &Store,
    tables: &ReferenceTables,
    settings: &Settings,
) -> StoreSummary {
    let years: Vec<PortfolioSummary> = store
        .years()
        .map(|(year, record)| summarize_year(year, record, tables, settings))
        .collect();
    StoreSummary {
        total_co2_t: stable_sum(years.iter().map(|y| y.total_co2_t)),
        years,
    }
}
