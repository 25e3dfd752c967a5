//! `soc crop`: crop entries of a parcel.

use std::io::Write;

use anyhow::{Context, Result};

use soc_core::{CropEntry, StoreError, Year};

use super::util::parse_crop_entry;
use crate::session::Session;

/// Appends a batch of `CROP;key=value` entries.
///
/// Blank strings and placeholder or zero-yield rows are dropped; the batch is
/// rejected only when nothing valid remains.
pub fn add<W: Write>(
    writer: &mut W,
    session: &mut Session,
    year: i32,
    parcel: &str,
    raw: &[String],
) -> Result<()> {
    let year = Year::new(year);
    let entries = raw
        .iter()
        .filter(|s| !s.trim().is_empty())
        .map(|s| parse_crop_entry(s).with_context(|| format!("invalid crop entry '{s}'")))
        .collect::<Result<Vec<CropEntry>>>()?;

    let submitted = entries.len();
    let saved = session.store.add_crop_entries(year, parcel, entries)?;
    session.save()?;

    writeln!(writer, "Saved {saved} crop entr{} for '{}' ({year}).", plural(saved), parcel.trim())?;
    let dropped = raw.len() - saved;
    if dropped > 0 {
        tracing::debug!(submitted, saved, "dropped crop entries without crop or yield");
        writeln!(writer, "Ignored {dropped} entr{} without a crop or yield.", plural(dropped))?;
    }
    Ok(())
}

pub fn list<W: Write>(writer: &mut W, session: &Session, year: i32, parcel: &str) -> Result<()> {
    let year = Year::new(year);
    let record = session
        .store
        .parcel(year, parcel)
        .ok_or_else(|| StoreError::UnknownParcel {
            year,
            name: parcel.trim().to_string(),
        })?;

    writeln!(writer, "{} ({year}, {:.2} ha)", parcel.trim(), record.area_ha())?;
    if record.crop_entries().is_empty() {
        writeln!(writer, "No crop entries.")?;
        return Ok(());
    }

    for (i, entry) in record.crop_entries().iter().enumerate() {
        write!(writer, "{}. ", i + 1)?;
        write_entry(writer, session, entry)?;
    }
    Ok(())
}

/// Removes the entry at a 1-based `position`.
pub fn remove<W: Write>(
    writer: &mut W,
    session: &mut Session,
    year: i32,
    parcel: &str,
    position: usize,
) -> Result<()> {
    let Some(index) = position.checked_sub(1) else {
        anyhow::bail!("Crop positions start at 1");
    };
    let removed = session.store.remove_crop_entry(Year::new(year), parcel, index)?;
    session.save()?;
    write!(writer, "Removed ")?;
    write_entry(writer, session, &removed)?;
    Ok(())
}

pub fn remove_last<W: Write>(
    writer: &mut W,
    session: &mut Session,
    year: i32,
    parcel: &str,
) -> Result<()> {
    let removed = session.store.remove_last_crop_entry(Year::new(year), parcel)?;
    session.save()?;
    write!(writer, "Removed ")?;
    write_entry(writer, session, &removed)?;
    Ok(())
}

fn write_entry<W: Write>(writer: &mut W, session: &Session, entry: &CropEntry) -> Result<()> {
    let retention_pct = entry
        .residue_retention_pct()
        .or_else(|| {
            session
                .tables()
                .residue_retention(entry.crop())
                .map(|r| r * 100.0)
        })
        .unwrap_or(session.settings.default_residue_retention * 100.0);

    write!(
        writer,
        "{}: yield {:.2} t/ha, residues {retention_pct:.0}%, tillage {}",
        entry.crop(),
        entry.yield_t_per_ha(),
        entry.tillage()
    )?;
    if entry.manure_t_per_ha() > 0.0 {
        write!(
            writer,
            ", manure {:.2} t/ha ({:.0}% C)",
            entry.manure_t_per_ha(),
            entry.manure_carbon_fraction() * 100.0
        )?;
    }
    writeln!(writer)?;
    Ok(())
}

const fn plural(n: usize) -> &'static str {
    if n == 1 { "y" } else { "ies" }
}
