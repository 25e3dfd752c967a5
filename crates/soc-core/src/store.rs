//! Session record store: `Year → ParcelName → ParcelRecord`.
//!
//! Every mutation validates first and only then touches state, so a failed
//! call leaves the store exactly as it was.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use crate::tables::{Tillage, is_placeholder_crop};
use crate::types::{ParcelName, ValidationError, Year, YearRange, check_range};

/// Largest accepted yield or manure rate, t/ha.
pub const MAX_RATE_T_PER_HA: f64 = 100.0;

/// Largest accepted parcel surface, ha.
pub const MAX_AREA_HA: f64 = 10_000.0;

/// Manure carbon fraction used when none is given.
pub const DEFAULT_MANURE_CARBON_FRACTION: f64 = 0.25;

/// Record store errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    /// A name, number or index failed validation.
    #[error("invalid input: {0}")]
    InvalidInput(#[from] ValidationError),

    /// A parcel with this name already exists under the year.
    #[error("parcel '{name}' already exists for {year}")]
    DuplicateName { year: Year, name: String },

    /// None of the submitted crop entries had a crop and a positive yield.
    #[error("no valid crop entries: select a crop and a yield greater than zero")]
    NoValidEntries,

    /// Removal requested on a parcel with no crop entries.
    #[error("parcel '{name}' has no crop entries")]
    EmptyList { name: String },

    /// The year has not been added.
    #[error("year {0} is not tracked")]
    UnknownYear(Year),

    /// The parcel does not exist under the year.
    #[error("parcel '{name}' not found for {year}")]
    UnknownParcel { year: Year, name: String },
}

/// One crop grown on a parcel in a given year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CropEntry {
    crop: String,
    yield_t_per_ha: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    residue_retention_pct: Option<f64>,
    tillage: Tillage,
    manure_t_per_ha: f64,
    manure_carbon_fraction: f64,
}

impl CropEntry {
    /// Creates an entry with conventional tillage, no manure and the
    /// tabulated residue retention.
    pub fn new(crop: impl Into<String>, yield_t_per_ha: f64) -> Result<Self, ValidationError> {
        let crop = crop.into().trim().to_string();
        if crop.is_empty() {
            return Err(ValidationError::Empty { field: "crop" });
        }
        let yield_t_per_ha = check_range("yield", yield_t_per_ha, 0.0, MAX_RATE_T_PER_HA)?;
        Ok(Self {
            crop,
            yield_t_per_ha,
            residue_retention_pct: None,
            tillage: Tillage::default(),
            manure_t_per_ha: 0.0,
            manure_carbon_fraction: DEFAULT_MANURE_CARBON_FRACTION,
        })
    }

    /// Overrides the share of residues left on the field, in percent.
    pub fn with_retention_pct(mut self, pct: f64) -> Result<Self, ValidationError> {
        self.residue_retention_pct = Some(check_range("residue retention", pct, 0.0, 100.0)?);
        Ok(self)
    }

    #[must_use]
    pub const fn with_tillage(mut self, tillage: Tillage) -> Self {
        self.tillage = tillage;
        self
    }

    /// Adds a manure or compost application with its carbon fraction.
    pub fn with_manure(
        mut self,
        t_per_ha: f64,
        carbon_fraction: f64,
    ) -> Result<Self, ValidationError> {
        self.manure_t_per_ha = check_range("manure", t_per_ha, 0.0, MAX_RATE_T_PER_HA)?;
        self.manure_carbon_fraction =
            check_range("manure carbon fraction", carbon_fraction, 0.0, 1.0)?;
        Ok(self)
    }

    pub fn crop(&self) -> &str {
        &self.crop
    }

    pub const fn yield_t_per_ha(&self) -> f64 {
        self.yield_t_per_ha
    }

    pub const fn residue_retention_pct(&self) -> Option<f64> {
        self.residue_retention_pct
    }

    pub const fn tillage(&self) -> Tillage {
        self.tillage
    }

    pub const fn manure_t_per_ha(&self) -> f64 {
        self.manure_t_per_ha
    }

    pub const fn manure_carbon_fraction(&self) -> f64 {
        self.manure_carbon_fraction
    }

    /// True if the entry names a real crop and has a positive yield.
    pub fn is_submittable(&self) -> bool {
        !is_placeholder_crop(&self.crop) && self.yield_t_per_ha > 0.0
    }
}

/// A parcel's surface and its crops, in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParcelRecord {
    area_ha: f64,
    crop_entries: Vec<CropEntry>,
}

impl ParcelRecord {
    /// Creates an empty parcel; the area must be in `(0, 10000]`.
    pub fn new(area_ha: f64) -> Result<Self, ValidationError> {
        if area_ha.is_nan() || area_ha <= 0.0 {
            return Err(ValidationError::NotPositive {
                field: "area",
                value: area_ha,
            });
        }
        check_range("area", area_ha, 0.0, MAX_AREA_HA)?;
        Ok(Self {
            area_ha,
            crop_entries: Vec::new(),
        })
    }

    pub const fn area_ha(&self) -> f64 {
        self.area_ha
    }

    pub fn crop_entries(&self) -> &[CropEntry] {
        &self.crop_entries
    }

    fn check_index(&self, index: usize) -> Result<(), ValidationError> {
        if index >= self.crop_entries.len() {
            return Err(ValidationError::IndexOutOfRange {
                index,
                len: self.crop_entries.len(),
            });
        }
        Ok(())
    }
}

/// Parcels recorded for a single year.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct YearRecord {
    parcels: BTreeMap<ParcelName, ParcelRecord>,
}

impl YearRecord {
    pub fn parcel(&self, name: &str) -> Option<&ParcelRecord> {
        self.parcels.get(name.trim())
    }

    /// Parcels ordered by name.
    pub fn parcels(&self) -> impl Iterator<Item = (&ParcelName, &ParcelRecord)> {
        self.parcels.iter()
    }

    pub fn len(&self) -> usize {
        self.parcels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parcels.is_empty()
    }
}

/// The in-memory store owned by one session.
#[derive(Debug, Clone, PartialEq)]
pub struct Store {
    range: YearRange,
    years: BTreeMap<Year, YearRecord>,
}

impl Store {
    /// Creates an empty store accepting years in `range`.
    pub const fn new(range: YearRange) -> Self {
        Self {
            range,
            years: BTreeMap::new(),
        }
    }

    pub const fn range(&self) -> YearRange {
        self.range
    }

    /// Tracks a year. Returns `false` if it was already present.
    pub fn add_year(&mut self, year: Year) -> Result<bool, StoreError> {
        let year = self.range.check(year)?;
        if self.years.contains_key(&year) {
            return Ok(false);
        }
        self.years.insert(year, YearRecord::default());
        tracing::info!(%year, "added year");
        Ok(true)
    }

    /// Stops tracking a year, returning its parcels.
    pub fn remove_year(&mut self, year: Year) -> Result<YearRecord, StoreError> {
        let record = self
            .years
            .remove(&year)
            .ok_or(StoreError::UnknownYear(year))?;
        tracing::info!(%year, parcels = record.len(), "removed year");
        Ok(record)
    }

    /// Adds an empty parcel under an existing year.
    pub fn add_parcel(&mut self, year: Year, name: &str, area_ha: f64) -> Result<(), StoreError> {
        let name = ParcelName::new(name)?;
        let record = ParcelRecord::new(area_ha)?;
        let parcels = &mut self.year_mut(year)?.parcels;
        if parcels.contains_key(&name) {
            return Err(StoreError::DuplicateName {
                year,
                name: name.into(),
            });
        }
        tracing::info!(%year, parcel = %name, area_ha, "added parcel");
        parcels.insert(name, record);
        Ok(())
    }

    /// Removes a parcel and returns its record.
    pub fn remove_parcel(&mut self, year: Year, name: &str) -> Result<ParcelRecord, StoreError> {
        let parcels = &mut self.year_mut(year)?.parcels;
        let record = parcels
            .remove(name.trim())
            .ok_or_else(|| StoreError::UnknownParcel {
                year,
                name: name.to_string(),
            })?;
        tracing::info!(%year, parcel = name.trim(), "removed parcel");
        Ok(record)
    }

    /// Appends the submittable entries of a batch; rows without a crop or
    /// with a zero yield are dropped. Returns how many were appended.
    pub fn add_crop_entries(
        &mut self,
        year: Year,
        parcel: &str,
        entries: impl IntoIterator<Item = CropEntry>,
    ) -> Result<usize, StoreError> {
        let record = self.parcel_mut(year, parcel)?;
        let valid: Vec<CropEntry> = entries
            .into_iter()
            .filter(CropEntry::is_submittable)
            .collect();
        if valid.is_empty() {
            return Err(StoreError::NoValidEntries);
        }
        let count = valid.len();
        record.crop_entries.extend(valid);
        tracing::info!(%year, parcel = parcel.trim(), count, "saved crop entries");
        Ok(count)
    }

    /// Removes and returns the most recently added crop entry.
    pub fn remove_last_crop_entry(
        &mut self,
        year: Year,
        parcel: &str,
    ) -> Result<CropEntry, StoreError> {
        let record = self.parcel_mut(year, parcel)?;
        let removed = record
            .crop_entries
            .pop()
            .ok_or_else(|| StoreError::EmptyList {
                name: parcel.trim().to_string(),
            })?;
        tracing::info!(%year, parcel = parcel.trim(), crop = removed.crop(), "removed last crop entry");
        Ok(removed)
    }

    /// Removes the crop entry at `index` (zero-based).
    pub fn remove_crop_entry(
        &mut self,
        year: Year,
        parcel: &str,
        index: usize,
    ) -> Result<CropEntry, StoreError> {
        let record = self.parcel_mut(year, parcel)?;
        record.check_index(index)?;
        let removed = record.crop_entries.remove(index);
        tracing::info!(%year, parcel = parcel.trim(), index, crop = removed.crop(), "removed crop entry");
        Ok(removed)
    }

    /// Replaces the crop entry at `index`, returning the previous one.
    ///
    /// The replacement must be submittable, like every entry in the store.
    pub fn replace_crop_entry(
        &mut self,
        year: Year,
        parcel: &str,
        index: usize,
        entry: CropEntry,
    ) -> Result<CropEntry, StoreError> {
        if !entry.is_submittable() {
            return Err(StoreError::NoValidEntries);
        }
        let record = self.parcel_mut(year, parcel)?;
        record.check_index(index)?;
        tracing::info!(%year, parcel = parcel.trim(), index, crop = entry.crop(), "replaced crop entry");
        Ok(std::mem::replace(&mut record.crop_entries[index], entry))
    }

    pub fn year(&self, year: Year) -> Option<&YearRecord> {
        self.years.get(&year)
    }

    pub fn parcel(&self, year: Year, name: &str) -> Option<&ParcelRecord> {
        self.years.get(&year)?.parcel(name)
    }

    /// Tracked years in ascending order.
    pub fn years(&self) -> impl Iterator<Item = (Year, &YearRecord)> {
        self.years.iter().map(|(year, record)| (*year, record))
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    fn year_mut(&mut self, year: Year) -> Result<&mut YearRecord, StoreError> {
        self.years
            .get_mut(&year)
            .ok_or(StoreError::UnknownYear(year))
    }

    fn parcel_mut(&mut self, year: Year, name: &str) -> Result<&mut ParcelRecord, StoreError> {
        self.year_mut(year)?
            .parcels
            .get_mut(name.trim())
            .ok_or_else(|| StoreError::UnknownParcel {
                year,
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YEAR: Year = Year::new(2024);

    fn store_with_parcel() -> Store {
        let mut store = Store::new(YearRange::until(2025).unwrap());
        store.add_year(YEAR).unwrap();
        store.add_parcel(YEAR, "Campo nord", 2.5).unwrap();
        store
    }

    fn entry(crop: &str, yield_t_per_ha: f64) -> CropEntry {
        CropEntry::new(crop, yield_t_per_ha).unwrap()
    }

    #[test]
    fn add_year_is_idempotent() {
        let mut store = Store::new(YearRange::until(2025).unwrap());
        assert!(store.add_year(YEAR).unwrap());
        assert!(!store.add_year(YEAR).unwrap());
        assert!(store.year(YEAR).unwrap().is_empty());
    }

    #[test]
    fn add_year_rejects_out_of_range() {
        let mut store = Store::new(YearRange::until(2025).unwrap());
        assert!(matches!(
            store.add_year(Year::new(1900)),
            Err(StoreError::InvalidInput(ValidationError::YearOutOfRange { .. }))
        ));
        assert!(store.is_empty());
    }

    #[test]
    fn add_parcel_rejects_blank_name() {
        let mut store = store_with_parcel();
        assert!(matches!(
            store.add_parcel(YEAR, "  ", 1.0),
            Err(StoreError::InvalidInput(ValidationError::Empty { .. }))
        ));
    }

    #[test]
    fn add_parcel_rejects_bad_area() {
        let mut store = store_with_parcel();
        assert!(store.add_parcel(YEAR, "Sud", 0.0).is_err());
        assert!(store.add_parcel(YEAR, "Sud", -1.0).is_err());
        assert!(store.add_parcel(YEAR, "Sud", 20_000.0).is_err());
        assert_eq!(store.year(YEAR).unwrap().len(), 1);
    }

    #[test]
    fn add_parcel_requires_tracked_year() {
        let mut store = store_with_parcel();
        assert_eq!(
            store.add_parcel(Year::new(2023), "Sud", 1.0),
            Err(StoreError::UnknownYear(Year::new(2023)))
        );
    }

    #[test]
    fn duplicate_parcel_leaves_existing_data_unchanged() {
        let mut store = store_with_parcel();
        store
            .add_crop_entries(YEAR, "Campo nord", [entry("Frumento", 5.0)])
            .unwrap();
        let before = store.clone();

        let result = store.add_parcel(YEAR, "Campo nord", 9.0);
        assert!(matches!(result, Err(StoreError::DuplicateName { .. })));
        assert_eq!(store, before);
        assert_eq!(store.parcel(YEAR, "Campo nord").unwrap().area_ha(), 2.5);
    }

    #[test]
    fn same_parcel_name_allowed_in_different_years() {
        let mut store = store_with_parcel();
        store.add_year(Year::new(2023)).unwrap();
        assert!(store.add_parcel(Year::new(2023), "Campo nord", 1.0).is_ok());
    }

    #[test]
    fn add_crop_entries_filters_invalid_rows() {
        let mut store = store_with_parcel();
        let added = store
            .add_crop_entries(
                YEAR,
                "Campo nord",
                [
                    entry("Nessuna", 0.0),
                    entry("Mais granella", 10.0),
                    entry("Frumento", 0.0),
                    entry("None", 4.0),
                ],
            )
            .unwrap();
        assert_eq!(added, 1);
        let crops: Vec<_> = store
            .parcel(YEAR, "Campo nord")
            .unwrap()
            .crop_entries()
            .iter()
            .map(CropEntry::crop)
            .collect();
        assert_eq!(crops, ["Mais granella"]);
    }

    #[test]
    fn add_crop_entries_with_no_valid_rows_changes_nothing() {
        let mut store = store_with_parcel();
        let before = store.clone();
        assert_eq!(
            store.add_crop_entries(YEAR, "Campo nord", [entry("Nessuna", 3.0)]),
            Err(StoreError::NoValidEntries)
        );
        assert_eq!(store, before);
    }

    #[test]
    fn crop_entries_keep_insertion_order() {
        let mut store = store_with_parcel();
        store
            .add_crop_entries(YEAR, "Campo nord", [entry("Orzo", 4.0)])
            .unwrap();
        store
            .add_crop_entries(YEAR, "Campo nord", [entry("Soia", 3.0), entry("Avena", 2.0)])
            .unwrap();
        let crops: Vec<_> = store
            .parcel(YEAR, "Campo nord")
            .unwrap()
            .crop_entries()
            .iter()
            .map(CropEntry::crop)
            .collect();
        assert_eq!(crops, ["Orzo", "Soia", "Avena"]);
    }

    #[test]
    fn remove_last_on_empty_parcel_fails_without_change() {
        let mut store = store_with_parcel();
        let before = store.clone();
        assert!(matches!(
            store.remove_last_crop_entry(YEAR, "Campo nord"),
            Err(StoreError::EmptyList { .. })
        ));
        assert_eq!(store, before);
    }

    #[test]
    fn remove_last_returns_last_entry() {
        let mut store = store_with_parcel();
        store
            .add_crop_entries(YEAR, "Campo nord", [entry("Orzo", 4.0), entry("Soia", 3.0)])
            .unwrap();
        let removed = store.remove_last_crop_entry(YEAR, "Campo nord").unwrap();
        assert_eq!(removed.crop(), "Soia");
        assert_eq!(store.parcel(YEAR, "Campo nord").unwrap().crop_entries().len(), 1);
    }

    #[test]
    fn remove_and_replace_by_index() {
        let mut store = store_with_parcel();
        store
            .add_crop_entries(
                YEAR,
                "Campo nord",
                [entry("Orzo", 4.0), entry("Soia", 3.0), entry("Avena", 2.0)],
            )
            .unwrap();

        let removed = store.remove_crop_entry(YEAR, "Campo nord", 1).unwrap();
        assert_eq!(removed.crop(), "Soia");

        let old = store
            .replace_crop_entry(YEAR, "Campo nord", 0, entry("Colza", 3.5))
            .unwrap();
        assert_eq!(old.crop(), "Orzo");

        let crops: Vec<_> = store
            .parcel(YEAR, "Campo nord")
            .unwrap()
            .crop_entries()
            .iter()
            .map(CropEntry::crop)
            .collect();
        assert_eq!(crops, ["Colza", "Avena"]);

        assert!(matches!(
            store.remove_crop_entry(YEAR, "Campo nord", 5),
            Err(StoreError::InvalidInput(ValidationError::IndexOutOfRange {
                index: 5,
                len: 2
            }))
        ));
    }

    #[test]
    fn replace_rejects_non_submittable_entry() {
        let mut store = store_with_parcel();
        store
            .add_crop_entries(YEAR, "Campo nord", [entry("Orzo", 4.0)])
            .unwrap();
        let before = store.clone();

        assert_eq!(
            store.replace_crop_entry(YEAR, "Campo nord", 0, entry("Nessuna", 0.0)),
            Err(StoreError::NoValidEntries)
        );
        assert_eq!(
            store.replace_crop_entry(YEAR, "Campo nord", 0, entry("Frumento", 0.0)),
            Err(StoreError::NoValidEntries)
        );
        assert_eq!(
            store.replace_crop_entry(YEAR, "Campo nord", 0, entry("None", 5.0)),
            Err(StoreError::NoValidEntries)
        );
        assert_eq!(store, before);
    }

    #[test]
    fn remove_parcel_and_year() {
        let mut store = store_with_parcel();
        store.remove_parcel(YEAR, "Campo nord").unwrap();
        assert!(store.year(YEAR).unwrap().is_empty());
        assert!(matches!(
            store.remove_parcel(YEAR, "Campo nord"),
            Err(StoreError::UnknownParcel { .. })
        ));
        store.remove_year(YEAR).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn crop_entry_validates_ranges() {
        assert!(CropEntry::new("Frumento", -1.0).is_err());
        assert!(CropEntry::new("Frumento", 101.0).is_err());
        assert!(CropEntry::new("", 5.0).is_err());
        let base = entry("Frumento", 5.0);
        assert!(base.clone().with_retention_pct(120.0).is_err());
        assert!(base.clone().with_manure(10.0, 1.5).is_err());
        let full = base
            .with_retention_pct(50.0)
            .unwrap()
            .with_tillage(Tillage::NoTill)
            .with_manure(20.0, 0.3)
            .unwrap();
        assert_eq!(full.residue_retention_pct(), Some(50.0));
        assert_eq!(full.tillage(), Tillage::NoTill);
        assert_eq!(full.manure_t_per_ha(), 20.0);
    }
}
