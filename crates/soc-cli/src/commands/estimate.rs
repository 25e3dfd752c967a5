//! `soc estimate`: single-field estimate from crop, yield, and soil texture.

use std::io::Write;

use anyhow::{Context, Result};
use serde::Serialize;

use soc_core::{ReferenceTables, Settings, TextureBalance, TextureInput, texture_balance};

use crate::EstimateArgs;

#[derive(Debug, Serialize)]
struct EstimateOutput<'a> {
    #[serde(flatten)]
    balance: &'a TextureBalance,
    area_ha: f64,
    total_co2_t: f64,
}

pub fn run<W: Write>(
    writer: &mut W,
    args: &EstimateArgs,
    tables: &ReferenceTables,
    settings: &Settings,
) -> Result<()> {
    if args.area.is_nan() || args.area <= 0.0 {
        anyhow::bail!("Area must be greater than zero, got {}", args.area);
    }

    let input = TextureInput {
        crop: args.crop.trim().to_string(),
        yield_t_per_ha: args.yield_t_per_ha,
        texture: args.texture,
        residue_retention_pct: args.retention,
    };
    let balance = texture_balance(&input, tables, settings)
        .with_context(|| format!("cannot estimate '{}'", input.crop))?;
    let total_co2_t = balance.total_co2_t(args.area);

    if args.json {
        let output = EstimateOutput {
            balance: &balance,
            area_ha: args.area,
            total_co2_t,
        };
        writeln!(writer, "{}", serde_json::to_string_pretty(&output)?)?;
        return Ok(());
    }

    writeln!(writer, "{} on {} soil", balance.crop, balance.texture)?;
    writeln!(writer, "  Total biomass:    {:.2} t/ha", balance.total_biomass_t_per_ha)?;
    writeln!(writer, "  Residues:         {:.2} t/ha", balance.residue_t_per_ha)?;
    writeln!(writer, "  Residue carbon:   {:.3} t C/ha", balance.residue_carbon_t_per_ha)?;
    writeln!(writer, "  Decay:            {:.0}%", balance.decay_fraction * 100.0)?;
    writeln!(writer, "  ΔSOC:             {:.3} t C/ha", balance.delta_soc_t_per_ha)?;
    writeln!(writer, "  ΔCO₂:             {:.3} t CO₂/ha", balance.delta_co2_t_per_ha)?;
    writeln!(writer, "  Total ({:.2} ha): {total_co2_t:.3} t CO₂", args.area)?;
    Ok(())
}
