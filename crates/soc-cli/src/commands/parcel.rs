//! `soc parcel`: parcels of a year.

use std::io::Write;

use anyhow::Result;

use soc_core::{StoreError, Year};

use crate::session::Session;

pub fn add<W: Write>(
    writer: &mut W,
    session: &mut Session,
    year: i32,
    name: &str,
    area_ha: f64,
) -> Result<()> {
    let year = Year::new(year);
    session.store.add_parcel(year, name, area_ha)?;
    session.save()?;
    writeln!(
        writer,
        "Added parcel '{}' ({area_ha:.2} ha) to {year}.",
        name.trim()
    )?;
    Ok(())
}

pub fn list<W: Write>(writer: &mut W, session: &Session, year: i32) -> Result<()> {
    let year = Year::new(year);
    let record = session
        .store
        .year(year)
        .ok_or(StoreError::UnknownYear(year))?;

    if record.is_empty() {
        writeln!(writer, "No parcels for {year}.")?;
        return Ok(());
    }

    for (name, parcel) in record.parcels() {
        writeln!(
            writer,
            "{name}: {:.2} ha, {} crop entr{}",
            parcel.area_ha(),
            parcel.crop_entries().len(),
            if parcel.crop_entries().len() == 1 { "y" } else { "ies" }
        )?;
    }
    Ok(())
}

pub fn remove<W: Write>(writer: &mut W, session: &mut Session, year: i32, name: &str) -> Result<()> {
    let year = Year::new(year);
    let removed = session.store.remove_parcel(year, name)?;
    session.save()?;
    writeln!(
        writer,
        "Removed parcel '{}' from {year} ({} crop entries dropped).",
        name.trim(),
        removed.crop_entries().len()
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use soc_core::CropEntry;

    use crate::commands::test_support::session_with_year;

    #[test]
    fn add_and_list_parcels() {
        let mut session = session_with_year(2024);
        let mut output = Vec::new();

        add(&mut output, &mut session, 2024, "  Campo nord ", 2.5).unwrap();
        add(&mut output, &mut session, 2024, "Vigna", 0.75).unwrap();
        session
            .store
            .add_crop_entries(
                Year::new(2024),
                "Vigna",
                [CropEntry::new("Vite", 8.0).unwrap()],
            )
            .unwrap();
        list(&mut output, &session, 2024).unwrap();

        let output = String::from_utf8(output).unwrap();
        insta::assert_snapshot!(output, @r"
        Added parcel 'Campo nord' (2.50 ha) to 2024.
        Added parcel 'Vigna' (0.75 ha) to 2024.
        Campo nord: 2.50 ha, 0 crop entries
        Vigna: 0.75 ha, 1 crop entry
        ");
    }

    #[test]
    fn duplicate_and_invalid_parcels_are_rejected() {
        let mut session = session_with_year(2024);
        let mut output = Vec::new();

        add(&mut output, &mut session, 2024, "Campo", 1.0).unwrap();
        let err = add(&mut output, &mut session, 2024, "Campo", 3.0).unwrap_err();
        assert!(err.to_string().contains("already exists"), "{err}");
        assert!(add(&mut output, &mut session, 2024, "Altro", 0.0).is_err());
        assert!(add(&mut output, &mut session, 2024, "   ", 1.0).is_err());
        assert!(add(&mut output, &mut session, 2023, "Campo", 1.0).is_err());

        assert_eq!(session.store.year(Year::new(2024)).unwrap().len(), 1);
    }

    #[test]
    fn remove_parcel_and_list_empty_year() {
        let mut session = session_with_year(2024);
        let mut output = Vec::new();

        add(&mut output, &mut session, 2024, "Campo", 1.0).unwrap();
        remove(&mut output, &mut session, 2024, "Campo").unwrap();
        list(&mut output, &session, 2024).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert!(output.ends_with("No parcels for 2024.\n"), "{output}");
        assert!(remove(&mut output.into_bytes(), &mut session, 2024, "Campo").is_err());
    }
}
