//! CLI subcommand implementations.

pub mod crop;
pub mod crops;
pub mod estimate;
pub mod parcel;
pub mod report;
pub mod settings;
pub mod stock;
pub mod user;
pub mod util;
pub mod year;
