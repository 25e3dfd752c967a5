//! `soc stock`: current soil carbon stock from measured or looked-up properties.

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;

use soc_core::{SoilStock, soil_stock};
use soc_soil::{DepthRange, SoilGridsClient, SoilProperties, SoilQuery, lookup_or_fallback};

use super::util::parse_depth_range;
use crate::{Config, StockArgs};

/// Where the soil properties came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Measured,
    Soilgrids,
    Fallback,
}

#[derive(Debug, Serialize)]
struct StockOutput<'a> {
    depth: String,
    source: Source,
    organic_carbon_pct: f64,
    bulk_density_g_cm3: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    warning: Option<&'a str>,
    #[serde(flatten)]
    stock: SoilStock,
}

pub fn run<W: Write>(writer: &mut W, args: &StockArgs, config: &Config) -> Result<()> {
    let depth = parse_depth_range(args.depth.as_deref().unwrap_or(&config.depth))?;

    let (properties, source, warning) = match (args.carbon_pct, args.bulk_density, args.lat, args.lon)
    {
        (Some(organic_carbon_pct), Some(bulk_density_g_cm3), _, _) => (
            SoilProperties {
                organic_carbon_pct,
                bulk_density_g_cm3,
            },
            Source::Measured,
            None,
        ),
        (_, _, Some(lat), Some(lon)) => {
            let query = SoilQuery::new(lat, lon, depth)?;
            let client = SoilGridsClient::new(
                config.soil_api_url.clone(),
                Duration::from_secs(config.soil_timeout_secs),
            )?;
            let runtime =
                tokio::runtime::Runtime::new().context("failed to initialize tokio runtime")?;
            let lookup = runtime.block_on(lookup_or_fallback(&client, &query));
            let source = if lookup.is_fallback() {
                Source::Fallback
            } else {
                Source::Soilgrids
            };
            (lookup.properties, source, lookup.warning)
        }
        _ => anyhow::bail!("Provide --lat and --lon, or --carbon-pct and --bulk-density"),
    };

    render(
        writer,
        &properties,
        source,
        warning.as_deref(),
        depth,
        args.area,
        args.json,
    )
}

/// Computes the stock and writes it.
pub fn render<W: Write>(
    writer: &mut W,
    properties: &SoilProperties,
    source: Source,
    warning: Option<&str>,
    depth: DepthRange,
    area_ha: f64,
    json: bool,
) -> Result<()> {
    let sample = properties.sample(depth)?;
    let stock = soil_stock(&sample, area_ha)?;

    if json {
        let output = StockOutput {
            depth: depth.to_string(),
            source,
            organic_carbon_pct: properties.organic_carbon_pct,
            bulk_density_g_cm3: properties.bulk_density_g_cm3,
            warning,
            stock,
        };
        writeln!(writer, "{}", serde_json::to_string_pretty(&output)?)?;
        return Ok(());
    }

    if let Some(warning) = warning {
        writeln!(writer, "Warning: {warning}")?;
    }
    writeln!(
        writer,
        "Depth {depth}: organic carbon {:.2}%, bulk density {:.2} g/cm³ ({})",
        properties.organic_carbon_pct,
        properties.bulk_density_g_cm3,
        match source {
            Source::Measured => "measured",
            Source::Soilgrids => "SoilGrids",
            Source::Fallback => "reference defaults",
        }
    )?;
    writeln!(
        writer,
        "  Stock: {:.3} t C/ha ({:.3} t CO₂/ha)",
        stock.stock_c_t_per_ha, stock.stock_co2_t_per_ha
    )?;
    writeln!(
        writer,
        "  Total ({:.2} ha): {:.3} t CO₂",
        stock.area_ha, stock.total_co2_t
    )?;
    Ok(())
}
