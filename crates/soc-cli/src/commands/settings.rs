//! `soc settings`: calculation defaults.

use std::io::Write;

use anyhow::Result;

use soc_core::Settings;

use crate::SettingsUpdate;
use crate::session::Session;

pub fn show<W: Write>(writer: &mut W, session: &Session, json: bool) -> Result<()> {
    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&session.settings)?)?;
    } else {
        write_settings(writer, &session.settings)?;
    }
    Ok(())
}

/// Applies the given fields, rejecting the whole update if any is out of range.
pub fn set<W: Write>(writer: &mut W, session: &mut Session, update: &SettingsUpdate) -> Result<()> {
    let mut settings = session.settings;
    if let Some(value) = update.carbon_fraction {
        settings.default_carbon_fraction = value;
    }
    if let Some(value) = update.residue_humification {
        settings.default_residue_humification = value;
    }
    if let Some(value) = update.manure_humification {
        settings.default_manure_humification = value;
    }
    if let Some(value) = update.extra_loss {
        settings.extra_annual_loss_per_ha = value;
    }
    if let Some(value) = update.residue_retention {
        settings.default_residue_retention = value;
    }
    if let Some(policy) = update.loss_policy {
        settings.loss_policy = policy;
    }
    settings.validate()?;

    session.settings = settings;
    session.save_settings()?;
    tracing::info!(?settings, "updated settings");
    writeln!(writer, "Settings saved.")?;
    write_settings(writer, &session.settings)?;
    Ok(())
}

pub fn reset<W: Write>(writer: &mut W, session: &mut Session) -> Result<()> {
    session.reset_settings()?;
    writeln!(writer, "Settings reset to defaults.")?;
    write_settings(writer, &session.settings)?;
    Ok(())
}

fn write_settings<W: Write>(writer: &mut W, settings: &Settings) -> Result<()> {
    writeln!(writer, "Carbon fraction:        {:.2}", settings.default_carbon_fraction)?;
    writeln!(writer, "Residue humification:   {:.2}", settings.default_residue_humification)?;
    writeln!(writer, "Manure humification:    {:.2}", settings.default_manure_humification)?;
    writeln!(writer, "Extra annual loss:      {:.2} t C/ha", settings.extra_annual_loss_per_ha)?;
    writeln!(writer, "Residue retention:      {:.2}", settings.default_residue_retention)?;
    writeln!(writer, "Loss policy:            {}", settings.loss_policy)?;
    Ok(())
}
