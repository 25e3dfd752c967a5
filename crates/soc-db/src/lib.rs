//! Storage layer for the soil carbon calculator.
//!
//! Persists a session [`Store`] and its [`Settings`] using `rusqlite`, and
//! keeps user credentials in a JSON file (see [`credentials`]).
//!
//! # Thread Safety
//!
//! [`Database`] wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! One session owns one `Database`; nothing here is shared across threads.
//!
//! # Schema
//!
//! Years, parcels and crop entries live in three tables keyed by
//! `(year, parcel)`. Crop entries carry a `position` column that preserves
//! insertion order. Settings are stored as a single JSON row so new fields
//! fall back to their defaults when older data is read.
//!
//! The store is always written whole inside one transaction; loading goes
//! back through the core API so every invariant is re-checked.

pub mod credentials;

use std::collections::BTreeMap;
use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};
use soc_core::{CropEntry, Settings, Store, StoreError, ValidationError, Year, YearRange};
use thiserror::Error;

pub use credentials::{CredentialError, CredentialStore};

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Stored rows violate a store invariant.
    #[error("stored data rejected: {0}")]
    Store(#[from] StoreError),
    /// A stored value failed validation.
    #[error("invalid stored value: {0}")]
    Invalid(#[from] ValidationError),
    /// Settings JSON could not be encoded or decoded.
    #[error("invalid settings payload: {0}")]
    Settings(#[from] serde_json::Error),
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// A crop entry row before validation.
struct CropRow {
    year: i32,
    parcel: String,
    crop: String,
    yield_t_per_ha: f64,
    residue_retention_pct: Option<f64>,
    tillage: String,
    manure_t_per_ha: f64,
    manure_carbon_fraction: f64,
}

impl CropRow {
    fn into_entry(self) -> Result<CropEntry, ValidationError> {
        let mut entry = CropEntry::new(self.crop, self.yield_t_per_ha)?
            .with_tillage(self.tillage.parse()?)
            .with_manure(self.manure_t_per_ha, self.manure_carbon_fraction)?;
        if let Some(pct) = self.residue_retention_pct {
            entry = entry.with_retention_pct(pct)?;
        }
        Ok(entry)
    }
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS years (
                year INTEGER PRIMARY KEY
            );

            CREATE TABLE IF NOT EXISTS parcels (
                year INTEGER NOT NULL,
                name TEXT NOT NULL,
                area_ha REAL NOT NULL,
                PRIMARY KEY (year, name),
                FOREIGN KEY (year) REFERENCES years(year) ON DELETE CASCADE
            );

            -- position: zero-based insertion order within the parcel
            -- residue_retention_pct: NULL means the tabulated default applies
            CREATE TABLE IF NOT EXISTS crop_entries (
                year INTEGER NOT NULL,
                parcel TEXT NOT NULL,
                position INTEGER NOT NULL,
                crop TEXT NOT NULL,
                yield_t_per_ha REAL NOT NULL,
                residue_retention_pct REAL,
                tillage TEXT NOT NULL,
                manure_t_per_ha REAL NOT NULL DEFAULT 0,
                manure_carbon_fraction REAL NOT NULL,
                PRIMARY KEY (year, parcel, position),
                FOREIGN KEY (year, parcel) REFERENCES parcels(year, name) ON DELETE CASCADE
            );

            -- single row holding the Settings JSON
            CREATE TABLE IF NOT EXISTS settings (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                data TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    /// Replaces everything stored with the contents of `store`.
    pub fn save_store(&mut self, store: &Store) -> Result<(), DbError> {
        let tx = self.conn.transaction()?;
        tx.execute_batch(
            "
            DELETE FROM crop_entries;
            DELETE FROM parcels;
            DELETE FROM years;
            ",
        )?;
        let mut entries_written = 0;
        {
            let mut year_stmt = tx.prepare("INSERT INTO years (year) VALUES (?)")?;
            let mut parcel_stmt =
                tx.prepare("INSERT INTO parcels (year, name, area_ha) VALUES (?, ?, ?)")?;
            let mut entry_stmt = tx.prepare(
                "
                INSERT INTO crop_entries
                (year, parcel, position, crop, yield_t_per_ha, residue_retention_pct,
                 tillage, manure_t_per_ha, manure_carbon_fraction)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ",
            )?;

            for (year, record) in store.years() {
                year_stmt.execute(params![year.value()])?;
                for (name, parcel) in record.parcels() {
                    parcel_stmt.execute(params![year.value(), name.as_str(), parcel.area_ha()])?;
                    for (position, entry) in parcel.crop_entries().iter().enumerate() {
                        entry_stmt.execute(params![
                            year.value(),
                            name.as_str(),
                            position,
                            entry.crop(),
                            entry.yield_t_per_ha(),
                            entry.residue_retention_pct(),
                            entry.tillage().as_str(),
                            entry.manure_t_per_ha(),
                            entry.manure_carbon_fraction(),
                        ])?;
                        entries_written += 1;
                    }
                }
            }
        }
        tx.commit()?;
        tracing::debug!(entries = entries_written, "saved store");
        Ok(())
    }

    /// Rebuilds a store from the database, accepting years in `range`.
    pub fn load_store(&self, range: YearRange) -> Result<Store, DbError> {
        let mut store = Store::new(range);

        let mut stmt = self.conn.prepare("SELECT year FROM years ORDER BY year ASC")?;
        let years = stmt
            .query_map([], |row| row.get::<_, i32>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        for year in years {
            store.add_year(Year::new(year))?;
        }

        let mut stmt = self
            .conn
            .prepare("SELECT year, name, area_ha FROM parcels ORDER BY year ASC, name ASC")?;
        let parcels = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i32>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        for (year, name, area_ha) in parcels {
            store.add_parcel(Year::new(year), &name, area_ha)?;
        }

        let mut stmt = self.conn.prepare(
            "
            SELECT year, parcel, crop, yield_t_per_ha, residue_retention_pct,
                   tillage, manure_t_per_ha, manure_carbon_fraction
            FROM crop_entries
            ORDER BY year ASC, parcel ASC, position ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(CropRow {
                year: row.get(0)?,
                parcel: row.get(1)?,
                crop: row.get(2)?,
                yield_t_per_ha: row.get(3)?,
                residue_retention_pct: row.get(4)?,
                tillage: row.get(5)?,
                manure_t_per_ha: row.get(6)?,
                manure_carbon_fraction: row.get(7)?,
            })
        })?;

        let mut grouped: BTreeMap<(i32, String), Vec<CropEntry>> = BTreeMap::new();
        for row in rows {
            let row = row?;
            let key = (row.year, row.parcel.clone());
            grouped.entry(key).or_default().push(row.into_entry()?);
        }
        for ((year, parcel), entries) in grouped {
            store.add_crop_entries(Year::new(year), &parcel, entries)?;
        }

        Ok(store)
    }

    /// Returns the stored settings, or `None` if never saved.
    pub fn load_settings(&self) -> Result<Option<Settings>, DbError> {
        let data: Option<String> = self
            .conn
            .query_row("SELECT data FROM settings WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()?;
        let Some(data) = data else {
            return Ok(None);
        };
        let settings: Settings = serde_json::from_str(&data)?;
        settings.validate()?;
        Ok(Some(settings))
    }

    /// Validates and stores the settings, replacing any previous value.
    pub fn save_settings(&self, settings: &Settings) -> Result<(), DbError> {
        settings.validate()?;
        let data = serde_json::to_string(settings)?;
        self.conn.execute(
            "INSERT INTO settings (id, data) VALUES (1, ?)
             ON CONFLICT(id) DO UPDATE SET data = excluded.data",
            params![data],
        )?;
        Ok(())
    }

    /// Removes stored settings so defaults apply again.
    pub fn clear_settings(&self) -> Result<(), DbError> {
        self.conn.execute("DELETE FROM settings", [])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use soc_core::{LossPolicy, Tillage};

    fn range() -> YearRange {
        YearRange::until(2025).unwrap()
    }

    fn sample_store() -> Store {
        let mut store = Store::new(range());
        let year = Year::new(2024);
        store.add_year(year).unwrap();
        store.add_year(Year::new(2019)).unwrap();
        store.add_parcel(year, "Campo nord", 2.5).unwrap();
        store.add_parcel(year, "Vigna", 0.8).unwrap();
        store
            .add_crop_entries(
                year,
                "Campo nord",
                [
                    CropEntry::new("Soia", 3.2).unwrap(),
                    CropEntry::new("Mais granella", 10.0)
                        .unwrap()
                        .with_retention_pct(60.0)
                        .unwrap()
                        .with_tillage(Tillage::NoTill)
                        .with_manure(12.0, 0.3)
                        .unwrap(),
                    CropEntry::new("Avena", 2.0).unwrap(),
                ],
            )
            .unwrap();
        store
    }

    #[test]
    fn open_creates_schema_on_disk() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("soc.db");
        {
            let mut db = Database::open(&path).unwrap();
            db.save_store(&sample_store()).unwrap();
        }
        let db = Database::open(&path).unwrap();
        let loaded = db.load_store(range()).unwrap();
        assert_eq!(loaded, sample_store());
    }

    #[test]
    fn empty_database_loads_empty_store() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.load_store(range()).unwrap().is_empty());
    }

    #[test]
    fn loaded_crop_entries_keep_insertion_order() {
        let mut db = Database::open_in_memory().unwrap();
        db.save_store(&sample_store()).unwrap();
        let loaded = db.load_store(range()).unwrap();
        let crops: Vec<_> = loaded
            .parcel(Year::new(2024), "Campo nord")
            .unwrap()
            .crop_entries()
            .iter()
            .map(CropEntry::crop)
            .collect();
        assert_eq!(crops, ["Soia", "Mais granella", "Avena"]);
    }

    #[test]
    fn save_replaces_previous_contents() {
        let mut db = Database::open_in_memory().unwrap();
        let mut store = sample_store();
        db.save_store(&store).unwrap();

        store.remove_year(Year::new(2019)).unwrap();
        store
            .remove_last_crop_entry(Year::new(2024), "Campo nord")
            .unwrap();
        db.save_store(&store).unwrap();

        let loaded = db.load_store(range()).unwrap();
        assert_eq!(loaded, store);
        assert!(loaded.year(Year::new(2019)).is_none());
    }

    #[test]
    fn replaced_entries_survive_reload() {
        let mut db = Database::open_in_memory().unwrap();
        let year = Year::new(2024);
        let mut store = Store::new(range());
        store.add_year(year).unwrap();
        store.add_parcel(year, "Campo", 1.0).unwrap();
        store
            .add_crop_entries(year, "Campo", [CropEntry::new("Orzo", 4.0).unwrap()])
            .unwrap();

        assert!(
            store
                .replace_crop_entry(year, "Campo", 0, CropEntry::new("Nessuna", 0.0).unwrap())
                .is_err()
        );
        store
            .replace_crop_entry(year, "Campo", 0, CropEntry::new("Frumento", 6.0).unwrap())
            .unwrap();
        db.save_store(&store).unwrap();

        let loaded = db.load_store(range()).unwrap();
        assert_eq!(loaded, store);
        assert_eq!(
            loaded.parcel(year, "Campo").unwrap().crop_entries()[0].crop(),
            "Frumento"
        );
    }

    #[test]
    fn years_outside_range_are_rejected_on_load() {
        let mut db = Database::open_in_memory().unwrap();
        db.save_store(&sample_store()).unwrap();
        let narrow = YearRange::new(2020, 2025).unwrap();
        assert!(matches!(
            db.load_store(narrow),
            Err(DbError::Store(StoreError::InvalidInput(_)))
        ));
    }

    #[test]
    fn corrupt_tillage_is_reported() {
        let mut db = Database::open_in_memory().unwrap();
        db.save_store(&sample_store()).unwrap();
        db.conn
            .execute("UPDATE crop_entries SET tillage = 'ripper'", [])
            .unwrap();
        assert!(matches!(
            db.load_store(range()),
            Err(DbError::Invalid(ValidationError::UnknownTillage { .. }))
        ));
    }

    #[test]
    fn settings_roundtrip_and_reset() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.load_settings().unwrap(), None);

        let settings = Settings {
            default_residue_humification: 0.25,
            extra_annual_loss_per_ha: 0.1,
            loss_policy: LossPolicy::Disabled,
            ..Settings::default()
        };
        db.save_settings(&settings).unwrap();
        db.save_settings(&settings).unwrap();
        assert_eq!(db.load_settings().unwrap(), Some(settings));

        db.clear_settings().unwrap();
        assert_eq!(db.load_settings().unwrap(), None);
    }

    #[test]
    fn invalid_settings_are_not_saved() {
        let db = Database::open_in_memory().unwrap();
        let settings = Settings {
            default_manure_humification: 2.0,
            ..Settings::default()
        };
        assert!(matches!(
            db.save_settings(&settings),
            Err(DbError::Invalid(_))
        ));
        assert_eq!(db.load_settings().unwrap(), None);
    }
}
