//! `soc report`: ΔSOC and ΔCO₂ per parcel, per year, and across years.

use std::io::Write;

use anyhow::Result;

use soc_core::{
    ParcelSummary, PortfolioSummary, StoreError, StoreSummary, Year, summarize_parcel,
    summarize_store, summarize_year,
};

use crate::session::Session;

/// What the report covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    All,
    Year(Year),
    Parcel { year: Year, name: String },
}

impl Scope {
    pub fn from_args(year: Option<i32>, parcel: Option<&str>) -> Self {
        match (year, parcel) {
            (Some(year), Some(name)) => Self::Parcel {
                year: Year::new(year),
                name: name.to_string(),
            },
            (Some(year), None) => Self::Year(Year::new(year)),
            (None, _) => Self::All,
        }
    }
}

pub fn run<W: Write>(writer: &mut W, session: &Session, scope: &Scope, json: bool) -> Result<()> {
    let tables = session.tables();
    let settings = &session.settings;

    match scope {
        Scope::All => {
            let summary = summarize_store(&session.store, tables, settings);
            if json {
                writeln!(writer, "{}", serde_json::to_string_pretty(&summary)?)?;
            } else {
                write_store(writer, &summary)?;
            }
        }
        Scope::Year(year) => {
            let record = session
                .store
                .year(*year)
                .ok_or(StoreError::UnknownYear(*year))?;
            let summary = summarize_year(*year, record, tables, settings);
            if json {
                writeln!(writer, "{}", serde_json::to_string_pretty(&summary)?)?;
            } else {
                write_year(writer, &summary)?;
            }
        }
        Scope::Parcel { year, name } => {
            let record =
                session
                    .store
                    .parcel(*year, name)
                    .ok_or_else(|| StoreError::UnknownParcel {
                        year: *year,
                        name: name.trim().to_string(),
                    })?;
            let summary = summarize_parcel(name.trim(), record, tables, settings);
            if json {
                writeln!(writer, "{}", serde_json::to_string_pretty(&summary)?)?;
            } else {
                write_parcel(writer, &summary)?;
            }
        }
    }
    Ok(())
}

fn write_store<W: Write>(writer: &mut W, summary: &StoreSummary) -> Result<()> {
    if summary.years.is_empty() {
        writeln!(writer, "No years tracked.")?;
        return Ok(());
    }
    for year in &summary.years {
        write_year(writer, year)?;
        writeln!(writer)?;
    }
    writeln!(
        writer,
        "Grand total over {} year(s): {:.3} t CO₂",
        summary.years.len(),
        summary.total_co2_t
    )?;
    Ok(())
}

fn write_year<W: Write>(writer: &mut W, summary: &PortfolioSummary) -> Result<()> {
    writeln!(
        writer,
        "== {} == {} parcel(s), {:.2} ha",
        summary.year,
        summary.parcels.len(),
        summary.total_area_ha
    )?;
    for parcel in &summary.parcels {
        write_parcel(writer, parcel)?;
    }
    writeln!(writer, "Total {}: {:.3} t CO₂", summary.year, summary.total_co2_t)?;
    Ok(())
}

fn write_parcel<W: Write>(writer: &mut W, summary: &ParcelSummary) -> Result<()> {
    writeln!(writer, "{} ({:.2} ha)", summary.name, summary.area_ha)?;
    for crop in &summary.crops {
        writeln!(
            writer,
            "  {}: residues {:.2} t/ha, C residues {:.3}, C humified {:.3}, C manure {:.3}, \
             ΔSOC {:.3} t C/ha, ΔCO₂ {:.3} t/ha",
            crop.crop,
            crop.residue_t_per_ha,
            crop.residue_carbon_t_per_ha,
            crop.humified_carbon_t_per_ha,
            crop.manure_carbon_t_per_ha,
            crop.delta_soc_t_per_ha,
            crop.delta_co2_t_per_ha
        )?;
    }
    for skipped in &summary.skipped {
        writeln!(writer, "  skipped #{}: {}", skipped.index + 1, skipped.message)?;
    }
    if summary.annual_loss_co2_t_per_ha > 0.0 {
        writeln!(
            writer,
            "  annual loss: -{:.3} t CO₂/ha",
            summary.annual_loss_co2_t_per_ha
        )?;
    }
    writeln!(
        writer,
        "  net: {:.3} t CO₂/ha, {:.3} t CO₂ total",
        summary.net_co2_t_per_ha, summary.total_co2_t
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use soc_core::{CropEntry, LossPolicy};

    use crate::commands::test_support::session_with_parcel;

    fn populated() -> Session {
        let mut session = session_with_parcel(2024, "Campo nord", 2.0);
        let year = Year::new(2024);
        session
            .store
            .add_crop_entries(
                year,
                "Campo nord",
                [
                    CropEntry::new("Mais granella", 10.0).unwrap(),
                    CropEntry::new("Riso", 6.0).unwrap(),
                ],
            )
            .unwrap();
        session.store.add_parcel(year, "Prato", 1.0).unwrap();
        session
            .store
            .add_crop_entries(
                year,
                "Prato",
                [CropEntry::new("Erba medica", 8.0)
                    .unwrap()
                    .with_manure(10.0, 0.2)
                    .unwrap()],
            )
            .unwrap();
        session
    }

    #[test]
    fn year_report() {
        let session = populated();
        let mut output = Vec::new();
        run(&mut output, &session, &Scope::Year(Year::new(2024)), false).unwrap();

        let output = String::from_utf8(output).unwrap();
        insta::assert_snapshot!(output, @r"
        == 2024 == 2 parcel(s), 3.00 ha
        Campo nord (2.00 ha)
          Mais granella: residues 10.00 t/ha, C residues 4.500, C humified 0.900, C manure 0.000, ΔSOC 0.900 t C/ha, ΔCO₂ 3.300 t/ha
          skipped #2: unknown crop: Riso
          net: 3.300 t CO₂/ha, 6.600 t CO₂ total
        Prato (1.00 ha)
          Erba medica: residues 0.00 t/ha, C residues 0.000, C humified 0.000, C manure 0.700, ΔSOC 0.700 t C/ha, ΔCO₂ 2.567 t/ha
          net: 2.567 t CO₂/ha, 2.567 t CO₂ total
        Total 2024: 9.167 t CO₂
        ");
    }

    #[test]
    fn annual_loss_is_shown_once_per_parcel() {
        let mut session = populated();
        session.settings.extra_annual_loss_per_ha = 0.3;
        let scope = Scope::from_args(Some(2024), Some("Campo nord"));
        let mut output = Vec::new();
        run(&mut output, &session, &scope, false).unwrap();

        let output = String::from_utf8(output).unwrap();
        assert_eq!(output.matches("annual loss").count(), 1, "{output}");
        assert!(output.contains("annual loss: -1.100 t CO₂/ha"), "{output}");
        assert!(output.contains("net: 2.200 t CO₂/ha, 4.400 t CO₂ total"), "{output}");

        session.settings.loss_policy = LossPolicy::Disabled;
        let mut output = Vec::new();
        run(&mut output, &session, &scope, false).unwrap();
        let output = String::from_utf8(output).unwrap();
        assert!(!output.contains("annual loss"), "{output}");
    }

    #[test]
    fn json_report_for_all_years() {
        let session = populated();
        let mut output = Vec::new();
        run(&mut output, &session, &Scope::All, true).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
        let years = value["years"].as_array().unwrap();
        assert_eq!(years.len(), 1);
        assert_eq!(years[0]["year"], 2024);
        assert_eq!(years[0]["parcels"][0]["skipped"][0]["crop"], "Riso");
        let total = value["total_co2_t"].as_f64().unwrap();
        assert!((total - (6.6 + 0.7 * 44.0 / 12.0)).abs() < 1e-9);
    }

    #[test]
    fn unknown_scope_is_an_error() {
        let session = populated();
        let mut output = Vec::new();
        assert!(run(&mut output, &session, &Scope::Year(Year::new(2020)), false).is_err());
        let scope = Scope::from_args(Some(2024), Some("Vigna"));
        assert!(run(&mut output, &session, &scope, false).is_err());
    }

    #[test]
    fn empty_store() {
        let session = crate::commands::test_support::session();
        let mut output = Vec::new();
        run(&mut output, &session, &Scope::All, false).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "No years tracked.\n");
    }
}
