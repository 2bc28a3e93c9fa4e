use anyhow::{Context, Result, bail};
use std::fs;
use std::path::PathBuf;

use kopilka_core::Session;
use kopilka_data::{AuthService, DataError, DataManager, FileStore, Remote};

use crate::config::Config;

pub type Manager = DataManager<FileStore, Remote>;

/// `$KOPILKA_HOME`, or `~/.kopilka`.
pub fn kopilka_home() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os("KOPILKA_HOME").filter(|d| !d.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".kopilka"))
}

pub fn ensure_kopilka_home() -> Result<PathBuf> {
    let dir = kopilka_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

/// Directory holding one JSON file per storage key.
pub fn store_dir() -> Result<PathBuf> {
    Ok(ensure_kopilka_home()?.join("store"))
}

pub fn open_manager(cfg: &Config) -> Result<Manager> {
    let dir = store_dir()?;
    let store = FileStore::open(&dir).with_context(|| format!("open store {}", dir.display()))?;
    let remote = Remote::from_base_url(cfg.server.base_url.as_deref());
    Ok(DataManager::new(store, remote, cfg.manager_options()?))
}

/// Everything a command needs: config, the data manager and the auth service.
pub struct App {
    pub cfg: Config,
    pub dm: Manager,
    pub auth: AuthService,
}

impl App {
    pub fn open(cfg: Config) -> Result<Self> {
        let dm = open_manager(&cfg)?;
        let auth = AuthService::new(cfg.auth_config());
        Ok(Self { cfg, dm, auth })
    }

    /// Resume the persisted session or fail with a hint to log in.
    pub fn require_session(&mut self) -> Result<Session> {
        match self.auth.resume(&mut self.dm) {
            Ok(session) => Ok(session),
            Err(DataError::NotAuthenticated) => bail!("Not signed in (or the session expired). Run: kopilka login"),
            Err(e) => Err(e.into()),
        }
    }

    pub fn currency(&self) -> &str {
        &self.cfg.profile.currency
    }
}
