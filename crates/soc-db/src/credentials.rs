//! Flat-file user credential store.
//!
//! Users live in a JSON object `username → { "password": hash, "salt": … }`.
//! Each call is a locked load-modify-save: an exclusive `fs2` lock on a
//! sibling `.lock` file, then a write to a temp file renamed over the store.
//!
//! Hashes are SHA-256 over `salt || password` with a random per-user salt.
//! Records without a salt (unsalted SHA-256 hex, as older files contain)
//! are still accepted and are re-hashed with a fresh salt on the next
//! successful login.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

/// Credential store errors.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Username or password was blank.
    #[error("{field} cannot be empty")]
    InvalidInput { field: &'static str },
    /// Registration for a name that is already taken.
    #[error("user '{0}' already exists")]
    DuplicateUser(String),
    /// Login for a name that was never registered.
    #[error("user '{0}' not found")]
    UserNotFound(String),
    /// The password does not match.
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("credential store I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("credential store is not valid JSON: {0}")]
    Format(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct UserRecord {
    #[serde(rename = "password")]
    password_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    salt: Option<String>,
}

impl UserRecord {
    fn new(password: &str) -> Self {
        let salt = Uuid::new_v4().simple().to_string();
        Self {
            password_hash: hash_password(Some(&salt), password),
            salt: Some(salt),
        }
    }

    fn verify(&self, password: &str) -> bool {
        hash_password(self.salt.as_deref(), password) == self.password_hash
    }

    const fn is_legacy(&self) -> bool {
        self.salt.is_none()
    }
}

type Users = BTreeMap<String, UserRecord>;

fn hash_password(salt: Option<&str>, password: &str) -> String {
    let mut hasher = Sha256::new();
    if let Some(salt) = salt {
        hasher.update(salt.as_bytes());
    }
    hasher.update(password.as_bytes());
    let hash = hasher.finalize();
    format!("{hash:x}")
}

/// JSON-file credential store.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Uses the file at `path`; it is created on first registration.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Adds a new user.
    pub fn register(&self, username: &str, password: &str) -> Result<(), CredentialError> {
        let username = validate(username, password)?;
        self.update(|users| {
            if users.contains_key(username) {
                return Err(CredentialError::DuplicateUser(username.to_string()));
            }
            users.insert(username.to_string(), UserRecord::new(password));
            tracing::info!(username, "registered user");
            Ok(true)
        })
    }

    /// Checks a user's password, upgrading unsalted records on success.
    pub fn login(&self, username: &str, password: &str) -> Result<(), CredentialError> {
        let username = validate(username, password)?;
        self.update(|users| {
            let record = users
                .get_mut(username)
                .ok_or_else(|| CredentialError::UserNotFound(username.to_string()))?;
            if !record.verify(password) {
                tracing::debug!(username, "password mismatch");
                return Err(CredentialError::InvalidCredentials);
            }
            if record.is_legacy() {
                *record = UserRecord::new(password);
                tracing::info!(username, "upgraded unsalted password hash");
                return Ok(true);
            }
            Ok(false)
        })
    }

    /// Returns true if the user exists.
    pub fn contains(&self, username: &str) -> Result<bool, CredentialError> {
        let _lock = self.lock()?;
        Ok(self.load()?.contains_key(username.trim()))
    }

    /// Runs `f` under the lock; `f` returns whether the users changed.
    fn update<F>(&self, f: F) -> Result<(), CredentialError>
    where
        F: FnOnce(&mut Users) -> Result<bool, CredentialError>,
    {
        let _lock = self.lock()?;
        let mut users = self.load()?;
        if f(&mut users)? {
            self.save(&users)?;
        }
        Ok(())
    }

    fn lock(&self) -> Result<File, CredentialError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let lock_file = File::create(self.path.with_extension("lock"))?;
        lock_file.lock_exclusive()?;
        Ok(lock_file)
    }

    fn load(&self) -> Result<Users, CredentialError> {
        match fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(Users::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Users::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, users: &Users) -> Result<(), CredentialError> {
        let tmp_path = self.path.with_extension("tmp");
        let json = serde_json::to_string_pretty(users)?;
        fs::write(&tmp_path, json)?;
        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        Ok(())
    }
}

fn validate<'a>(username: &'a str, password: &str) -> Result<&'a str, CredentialError> {
    let username = username.trim();
    if username.is_empty() {
        return Err(CredentialError::InvalidInput { field: "username" });
    }
    if password.is_empty() {
        return Err(CredentialError::InvalidInput { field: "password" });
    }
    Ok(username)
}
