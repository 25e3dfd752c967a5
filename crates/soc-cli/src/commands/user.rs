//! `soc user`: local accounts in the JSON credential store.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};

use soc_db::CredentialStore;

/// Reads the password from the first line of `reader`.
pub fn read_password<R: BufRead>(reader: &mut R, from_stdin: bool) -> Result<String> {
    if !from_stdin {
        anyhow::bail!("Pass --password-stdin and provide the password on standard input");
    }
    let mut line = String::new();
    reader
        .read_line(&mut line)
        .context("failed to read password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

pub fn register<W: Write>(
    writer: &mut W,
    store: &CredentialStore,
    username: &str,
    password: &str,
) -> Result<()> {
    store.register(username, password)?;
    writeln!(writer, "Registered user '{}'.", username.trim())?;
    Ok(())
}

pub fn login<W: Write>(
    writer: &mut W,
    store: &CredentialStore,
    username: &str,
    password: &str,
) -> Result<()> {
    store.login(username, password)?;
    writeln!(writer, "Welcome, {}.", username.trim())?;
    Ok(())
}
