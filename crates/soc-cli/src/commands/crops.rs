//! `soc crops`: reference coefficient table.

use std::io::Write;

use anyhow::Result;

use soc_core::ReferenceTables;

pub fn run<W: Write>(writer: &mut W, tables: &ReferenceTables) -> Result<()> {
    writeln!(writer, "{:<20} {:>5} {:>6} {:>9}", "CROP", "HI", "C", "RETENTION")?;
    for crop in tables.crops() {
        let cell = |value: Option<f64>| value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"));
        writeln!(
            writer,
            "{crop:<20} {:>5} {:>6} {:>9}",
            cell(tables.harvest_index(crop)),
            cell(tables.carbon_fraction(crop)),
            cell(tables.residue_retention(crop)),
        )?;
    }
    Ok(())
}
