//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use soc_core::{LossPolicy, SoilTexture};

/// Soil organic carbon calculator.
///
/// Records yearly crop data per parcel and estimates the resulting change in
/// soil organic carbon and the equivalent CO₂.
#[derive(Debug, Parser)]
#[command(name = "soc", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Manage tracked years.
    #[command(subcommand)]
    Year(YearAction),

    /// Manage the parcels of a year.
    #[command(subcommand)]
    Parcel(ParcelAction),

    /// Manage the crop entries of a parcel.
    #[command(subcommand)]
    Crop(CropAction),

    /// Show or change calculation defaults.
    #[command(subcommand)]
    Settings(SettingsAction),

    /// Show ΔSOC and ΔCO₂ per parcel, year, and overall.
    Report {
        /// Restrict to one year.
        #[arg(long)]
        year: Option<i32>,

        /// Restrict to one parcel (requires --year).
        #[arg(long, requires = "year")]
        parcel: Option<String>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List the reference crops and their coefficients.
    Crops,

    /// Quick single-field estimate from crop, yield, and soil texture.
    Estimate(EstimateArgs),

    /// Estimate the current soil carbon stock of a field.
    Stock(StockArgs),

    /// Manage local users.
    #[command(subcommand)]
    User(UserAction),
}

#[derive(Debug, Subcommand)]
pub enum YearAction {
    /// Start tracking a year.
    Add { year: i32 },
    /// List tracked years.
    List,
    /// Delete a year with all its parcels.
    Remove { year: i32 },
}

#[derive(Debug, Subcommand)]
pub enum ParcelAction {
    /// Add a parcel to a year.
    Add {
        #[arg(long)]
        year: i32,
        /// Parcel name, unique within the year.
        name: String,
        /// Area in hectares.
        #[arg(long)]
        area: f64,
    },
    /// List the parcels of a year.
    List {
        #[arg(long)]
        year: i32,
    },
    /// Delete a parcel with its crop entries.
    Remove {
        #[arg(long)]
        year: i32,
        name: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum CropAction {
    /// Append a batch of crop entries to a parcel.
    ///
    /// Each entry is `CROP;yield=T;retention=PCT;tillage=KIND;manure=T;manure-c=FRAC`.
    /// Only the crop name is positional; entries without a crop or with a
    /// zero yield are dropped.
    Add {
        #[arg(long)]
        year: i32,
        #[arg(long)]
        parcel: String,
        #[arg(required = true)]
        entries: Vec<String>,
    },
    /// List the crop entries of a parcel.
    List {
        #[arg(long)]
        year: i32,
        #[arg(long)]
        parcel: String,
    },
    /// Remove one crop entry by its 1-based position.
    Remove {
        #[arg(long)]
        year: i32,
        #[arg(long)]
        parcel: String,
        #[arg(long)]
        index: usize,
    },
    /// Remove the most recently added crop entry.
    RemoveLast {
        #[arg(long)]
        year: i32,
        #[arg(long)]
        parcel: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum SettingsAction {
    /// Show the current defaults.
    Show {
        #[arg(long)]
        json: bool,
    },
    /// Change one or more defaults.
    Set(SettingsUpdate),
    /// Restore the built-in defaults.
    Reset,
}

/// Fields accepted by `soc settings set`; omitted fields keep their value.
#[derive(Debug, Default, Args)]
pub struct SettingsUpdate {
    /// Carbon fraction of residue dry matter (0-1).
    #[arg(long)]
    pub carbon_fraction: Option<f64>,
    /// Humification coefficient of residues (0-1).
    #[arg(long)]
    pub residue_humification: Option<f64>,
    /// Humification coefficient of manure (0-1).
    #[arg(long)]
    pub manure_humification: Option<f64>,
    /// Extra annual loss, t C/ha (0-10).
    #[arg(long)]
    pub extra_loss: Option<f64>,
    /// Residue retention for untabulated crops (0-1).
    #[arg(long)]
    pub residue_retention: Option<f64>,
    /// How the extra loss is applied: per-parcel or disabled.
    #[arg(long)]
    pub loss_policy: Option<LossPolicy>,
}

#[derive(Debug, Args)]
pub struct EstimateArgs {
    #[arg(long)]
    pub crop: String,
    /// Yield, t/ha.
    #[arg(long = "yield")]
    pub yield_t_per_ha: f64,
    /// sandy, sandy-loam, silt-loam, clay-loam, or clay.
    #[arg(long)]
    pub texture: SoilTexture,
    /// Residue retention override, percent.
    #[arg(long)]
    pub retention: Option<f64>,
    /// Field area, ha.
    #[arg(long, default_value_t = 1.0)]
    pub area: f64,
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct StockArgs {
    /// Latitude for a SoilGrids lookup.
    #[arg(long, allow_hyphen_values = true, requires = "lon", conflicts_with = "carbon_pct")]
    pub lat: Option<f64>,
    #[arg(long, allow_hyphen_values = true, requires = "lat")]
    pub lon: Option<f64>,
    /// Measured organic carbon, percent.
    #[arg(long, requires = "bulk_density")]
    pub carbon_pct: Option<f64>,
    /// Measured bulk density, g/cm³.
    #[arg(long, requires = "carbon_pct")]
    pub bulk_density: Option<f64>,
    /// Depth band, e.g. `0-30cm`; defaults to the configured band.
    #[arg(long)]
    pub depth: Option<String>,
    /// Field area, ha.
    #[arg(long, default_value_t = 1.0)]
    pub area: f64,
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Subcommand)]
pub enum UserAction {
    /// Register a new user.
    Register {
        username: String,
        /// Read the password from the first line of stdin.
        #[arg(long)]
        password_stdin: bool,
    },
    /// Check a user's password.
    Login {
        username: String,
        /// Read the password from the first line of stdin.
        #[arg(long)]
        password_stdin: bool,
    },
}
