//! Soil organic carbon calculator CLI library.
//!
//! This crate provides the `soc` command-line interface over the record
//! store, the calculation engine, and the soil lookup client.

mod cli;
pub mod commands;
mod config;
pub mod session;

pub use cli::{
    Cli, Commands, CropAction, EstimateArgs, ParcelAction, SettingsAction, SettingsUpdate,
    StockArgs, UserAction, YearAction,
};
pub use config::Config;
