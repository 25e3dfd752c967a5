//! `soc year`: tracked years.

use std::io::Write;

use anyhow::Result;

use soc_core::{Year, stable_sum};

use crate::session::Session;

pub fn add<W: Write>(writer: &mut W, session: &mut Session, year: i32) -> Result<()> {
    let year = Year::new(year);
    if session.store.add_year(year)? {
        session.save()?;
        writeln!(writer, "Added year {year}.")?;
    } else {
        writeln!(writer, "Year {year} is already tracked.")?;
    }
    Ok(())
}

pub fn list<W: Write>(writer: &mut W, session: &Session) -> Result<()> {
    if session.store.is_empty() {
        writeln!(writer, "No years tracked. Add one with 'soc year add <YEAR>'.")?;
        return Ok(());
    }

    for (year, record) in session.store.years() {
        let area = stable_sum(record.parcels().map(|(_, parcel)| parcel.area_ha()));
        writeln!(
            writer,
            "{year}: {} parcel(s), {area:.2} ha",
            record.len()
        )?;
    }
    Ok(())
}

pub fn remove<W: Write>(writer: &mut W, session: &mut Session, year: i32) -> Result<()> {
    let year = Year::new(year);
    let removed = session.store.remove_year(year)?;
    session.save()?;
    writeln!(
        writer,
        "Removed year {year} and {} parcel(s).",
        removed.len()
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::commands::test_support::session;

    #[test]
    fn add_list_remove_years() {
        let mut session = session();
        let mut output = Vec::new();

        add(&mut output, &mut session, 2024).unwrap();
        add(&mut output, &mut session, 2024).unwrap();
        add(&mut output, &mut session, 2023).unwrap();
        session.store.add_parcel(Year::new(2024), "Campo", 1.5).unwrap();
        list(&mut output, &session).unwrap();
        remove(&mut output, &mut session, 2024).unwrap();
        list(&mut output, &session).unwrap();

        let output = String::from_utf8(output).unwrap();
        insta::assert_snapshot!(output, @r"
        Added year 2024.
        Year 2024 is already tracked.
        Added year 2023.
        2023: 0 parcel(s), 0.00 ha
        2024: 1 parcel(s), 1.50 ha
        Removed year 2024 and 1 parcel(s).
        2023: 0 parcel(s), 0.00 ha
        ");
    }

    #[test]
    fn out_of_range_year_is_rejected() {
        let mut session = session();
        let mut output = Vec::new();
        let err = add(&mut output, &mut session, 1900).unwrap_err();
        assert!(err.to_string().contains("1900"), "{err}");
        assert!(session.store.is_empty());
    }

    #[test]
    fn removing_unknown_year_fails() {
        let mut session = session();
        let mut output = Vec::new();
        assert!(remove(&mut output, &mut session, 2020).is_err());
    }
}
