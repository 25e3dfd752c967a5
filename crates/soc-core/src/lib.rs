//! Core domain logic for the soil carbon calculator.
//!
//! This crate contains:
//! - Record store: years, parcels and their crop entries
//! - Reference tables and user-adjustable settings
//! - Carbon engine: per-crop ΔSOC/ΔCO₂, texture estimate, stock estimate
//! - Aggregation: parcel, year and multi-year totals

mod aggregate;
pub mod engine;
pub mod settings;
pub mod store;
pub mod tables;
pub mod types;

pub use aggregate::{
    ParcelSummary, PortfolioSummary, SkipReason, SkippedEntry, StoreSummary, stable_sum,
    summarize_parcel, summarize_store, summarize_year,
};
pub use engine::{
    CO2_PER_C, CropBalance, EngineError, SoilSample, SoilStock, TextureBalance, TextureInput,
    crop_balance, soil_stock, texture_balance,
};
pub use settings::{LossPolicy, Settings};
pub use store::{CropEntry, ParcelRecord, Store, StoreError, YearRecord};
pub use tables::{ReferenceTables, SoilTexture, Tillage};
pub use types::{ParcelName, ValidationError, Year, YearRange};
