//! Shared utilities for CLI commands.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;

use soc_core::store::DEFAULT_MANURE_CARBON_FRACTION;
use soc_core::{CropEntry, Tillage};
use soc_soil::DepthRange;

/// Pre-compiled regex for depth bands such as `0-30cm` or `15 - 60`.
static DEPTH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\d+)\s*-\s*(\d+)\s*(?:cm)?\s*$").unwrap());

/// Parse a depth band in centimetres, `TOP-BOTTOM[cm]`.
pub fn parse_depth_range(s: &str) -> Result<DepthRange> {
    let Some(caps) = DEPTH_RE.captures(s) else {
        anyhow::bail!("Invalid depth: {s}. Use TOP-BOTTOM in cm (e.g., 0-30cm)");
    };
    let top: u32 = caps[1].parse().context("depth top is too large")?;
    let bottom: u32 = caps[2].parse().context("depth bottom is too large")?;
    Ok(DepthRange::new(top, bottom)?)
}

/// Parse one crop entry of the form
/// `CROP;yield=T;retention=PCT;tillage=KIND;manure=T;manure-c=FRAC`.
///
/// Only the crop name is required. A missing yield is zero, which makes the
/// entry non-submittable.
pub fn parse_crop_entry(s: &str) -> Result<CropEntry> {
    let mut parts = s.split(';');
    let crop = parts.next().unwrap_or_default().trim();

    let mut yield_t_per_ha = 0.0;
    let mut retention = None;
    let mut tillage = Tillage::default();
    let mut manure = 0.0;
    let mut manure_carbon = DEFAULT_MANURE_CARBON_FRACTION;

    for part in parts.map(str::trim).filter(|p| !p.is_empty()) {
        let Some((key, value)) = part.split_once('=') else {
            anyhow::bail!("Invalid crop field '{part}' in '{s}'. Use KEY=VALUE");
        };
        let value = value.trim();
        match key.trim().to_lowercase().as_str() {
            "yield" | "y" => yield_t_per_ha = parse_number(key, value)?,
            "retention" | "residues" => retention = Some(parse_number(key, value)?),
            "tillage" => tillage = value.parse()?,
            "manure" => manure = parse_number(key, value)?,
            "manure-c" | "manure_c" | "manure-carbon" => {
                manure_carbon = parse_number(key, value)?;
            }
            other => anyhow::bail!("Unknown crop field: {other}"),
        }
    }

    let mut entry = CropEntry::new(crop, yield_t_per_ha)?
        .with_tillage(tillage)
        .with_manure(manure, manure_carbon)?;
    if let Some(pct) = retention {
        entry = entry.with_retention_pct(pct)?;
    }
    Ok(entry)
}

fn parse_number(key: &str, value: &str) -> Result<f64> {
    value
        .parse()
        .with_context(|| format!("{key} must be a number, got '{value}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_depth_range() {
        let range = parse_depth_range("0-30cm").unwrap();
        assert_eq!((range.top_cm(), range.bottom_cm()), (0, 30));

        let range = parse_depth_range(" 15 - 60 ").unwrap();
        assert_eq!((range.top_cm(), range.bottom_cm()), (15, 60));
    }

    #[test]
    fn test_parse_depth_range_rejects_bad_input() {
        assert!(parse_depth_range("thirty").is_err());
        assert!(parse_depth_range("30-0cm").is_err());
        assert!(parse_depth_range("-5-30").is_err());
    }

    #[test]
    fn test_parse_crop_entry_with_all_fields() {
        let entry = parse_crop_entry(
            "Mais granella; yield=10; retention=50; tillage=no-till; manure=20; manure-c=0.3",
        )
        .unwrap();
        assert_eq!(entry.crop(), "Mais granella");
        assert!((entry.yield_t_per_ha() - 10.0).abs() < f64::EPSILON);
        assert_eq!(entry.residue_retention_pct(), Some(50.0));
        assert_eq!(entry.tillage(), Tillage::NoTill);
        assert!((entry.manure_t_per_ha() - 20.0).abs() < f64::EPSILON);
        assert!((entry.manure_carbon_fraction() - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_crop_entry_defaults() {
        let entry = parse_crop_entry("Orzo;yield=4.5").unwrap();
        assert_eq!(entry.residue_retention_pct(), None);
        assert_eq!(entry.tillage(), Tillage::Conventional);
        assert!(entry.manure_t_per_ha().abs() < f64::EPSILON);
        assert!(
            (entry.manure_carbon_fraction() - DEFAULT_MANURE_CARBON_FRACTION).abs() < f64::EPSILON
        );
        assert!(entry.is_submittable());

        assert!(!parse_crop_entry("Orzo").unwrap().is_submittable());
    }

    #[test]
    fn test_parse_crop_entry_errors() {
        assert!(parse_crop_entry("Orzo;yield=lots").is_err());
        assert!(parse_crop_entry("Orzo;colour=green").is_err());
        assert!(parse_crop_entry("Orzo;yield").is_err());
        assert!(parse_crop_entry("Orzo;yield=500").is_err());
        assert!(parse_crop_entry("Orzo;yield=5;tillage=plough").is_err());
    }
}
