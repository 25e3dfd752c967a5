use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use soc_cli::commands::report::Scope;
use soc_cli::commands::{crop, crops, estimate, parcel, report, settings, stock, user, year};
use soc_cli::session::Session;
use soc_cli::{
    Cli, Commands, Config, CropAction, ParcelAction, SettingsAction, UserAction, YearAction,
};
use soc_core::ReferenceTables;
use soc_db::CredentialStore;

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

/// Load config and open the session database.
fn open_session(config_path: Option<&Path>) -> Result<Session> {
    let config = load_config(config_path)?;
    Session::open(&config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Logs go to stderr so command output stays clean.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let config_path = cli.config.as_deref();
    let mut out = io::stdout().lock();

    match &cli.command {
        Some(Commands::Year(action)) => {
            let mut session = open_session(config_path)?;
            match action {
                YearAction::Add { year } => year::add(&mut out, &mut session, *year)?,
                YearAction::List => year::list(&mut out, &session)?,
                YearAction::Remove { year } => year::remove(&mut out, &mut session, *year)?,
            }
        }
        Some(Commands::Parcel(action)) => {
            let mut session = open_session(config_path)?;
            match action {
                ParcelAction::Add { year, name, area } => {
                    parcel::add(&mut out, &mut session, *year, name, *area)?;
                }
                ParcelAction::List { year } => parcel::list(&mut out, &session, *year)?,
                ParcelAction::Remove { year, name } => {
                    parcel::remove(&mut out, &mut session, *year, name)?;
                }
            }
        }
        Some(Commands::Crop(action)) => {
            let mut session = open_session(config_path)?;
            match action {
                CropAction::Add {
                    year,
                    parcel,
                    entries,
                } => crop::add(&mut out, &mut session, *year, parcel, entries)?,
                CropAction::List { year, parcel } => {
                    crop::list(&mut out, &session, *year, parcel)?;
                }
                CropAction::Remove {
                    year,
                    parcel,
                    index,
                } => crop::remove(&mut out, &mut session, *year, parcel, *index)?,
                CropAction::RemoveLast { year, parcel } => {
                    crop::remove_last(&mut out, &mut session, *year, parcel)?;
                }
            }
        }
        Some(Commands::Settings(action)) => {
            let mut session = open_session(config_path)?;
            match action {
                SettingsAction::Show { json } => settings::show(&mut out, &session, *json)?,
                SettingsAction::Set(update) => settings::set(&mut out, &mut session, update)?,
                SettingsAction::Reset => settings::reset(&mut out, &mut session)?,
            }
        }
        Some(Commands::Report { year, parcel, json }) => {
            let session = open_session(config_path)?;
            let scope = Scope::from_args(*year, parcel.as_deref());
            report::run(&mut out, &session, &scope, *json)?;
        }
        Some(Commands::Crops) => {
            crops::run(&mut out, ReferenceTables::standard())?;
        }
        Some(Commands::Estimate(args)) => {
            let session = open_session(config_path)?;
            estimate::run(&mut out, args, session.tables(), &session.settings)?;
        }
        Some(Commands::Stock(args)) => {
            let config = load_config(config_path)?;
            stock::run(&mut out, args, &config)?;
        }
        Some(Commands::User(action)) => {
            let config = load_config(config_path)?;
            let store = CredentialStore::new(&config.users_path);
            let mut stdin = io::stdin().lock();
            match action {
                UserAction::Register {
                    username,
                    password_stdin,
                } => {
                    let password = user::read_password(&mut stdin, *password_stdin)?;
                    user::register(&mut out, &store, username, &password)?;
                }
                UserAction::Login {
                    username,
                    password_stdin,
                } => {
                    let password = user::read_password(&mut stdin, *password_stdin)?;
                    user::login(&mut out, &store, username, &password)?;
                }
            }
        }
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
