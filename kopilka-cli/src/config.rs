use anyhow::{Context, Result};
use chrono::Duration;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use kopilka_core::time::parse_timezone;
use kopilka_data::journal::LogLevel;
use kopilka_data::{AuthConfig, ManagerOptions};

use crate::state::ensure_kopilka_home;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerSection,
    pub session: SessionSection,
    pub sync: SyncSection,
    pub profile: ProfileSection,
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Root of the sync server, e.g. "http://localhost:3000". Absent means local only.
    pub base_url: Option<String>,
    pub offline: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    pub timeout_minutes: i64,
    pub max_login_attempts: u32,
    pub lockout_minutes: i64,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            timeout_minutes: 30,
            max_login_attempts: 5,
            lockout_minutes: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSection {
    pub interval_seconds: u64,
    pub cache_ttl_seconds: i64,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            interval_seconds: 60,
            cache_ttl_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileSection {
    pub timezone: String,
    pub currency: String,
}

impl Default for ProfileSection {
    fn default() -> Self {
        Self {
            timezone: "Europe/Moscow".to_string(),
            currency: "RUB".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn timezone(&self) -> Result<Tz> {
        parse_timezone(&self.profile.timezone).context("config [profile] timezone")
    }

    pub fn manager_options(&self) -> Result<ManagerOptions> {
        Ok(ManagerOptions {
            cache_ttl: Duration::seconds(self.sync.cache_ttl_seconds.max(0)),
            offline: self.server.offline || self.server.base_url.is_none(),
            timezone: self.timezone()?,
            log_level: LogLevel::parse(&self.logging.level).unwrap_or(LogLevel::Info),
        })
    }

    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig {
            max_login_attempts: self.session.max_login_attempts.max(1),
            lockout: Duration::minutes(self.session.lockout_minutes.max(1)),
            session_timeout: Duration::minutes(self.session.timeout_minutes.max(1)),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_kopilka_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    let p = config_path()?;
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    toml::from_str(&s).context("parse config.toml")
}

pub fn save_config(cfg: &Config) -> Result<()> {
    let p = config_path()?;
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config(&Config::default())?;
    println!("Wrote {}", p.display());
    Ok(())
}

pub fn show_config() -> Result<()> {
    let cfg = load_config()?;
    println!("# {}", config_path()?.display());
    print!("{}", toml::to_string_pretty(&cfg).context("serialize config")?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [server]
            base_url = "http://localhost:3000"

            [session]
            timeout_minutes = 10
            "#,
        )
        .unwrap();
        assert_eq!(cfg.session.timeout_minutes, 10);
        assert_eq!(cfg.session.max_login_attempts, 5);
        assert_eq!(cfg.sync.interval_seconds, 60);
        assert_eq!(cfg.profile.timezone, "Europe/Moscow");

        let opts = cfg.manager_options().unwrap();
        assert!(!opts.offline);
        assert_eq!(opts.cache_ttl, Duration::seconds(300));
        assert_eq!(cfg.auth_config().session_timeout, Duration::minutes(10));
    }

    #[test]
    fn test_no_server_means_offline() {
        let opts = Config::default().manager_options().unwrap();
        assert!(opts.offline);
    }

    #[test]
    fn test_bad_timezone() {
        let mut cfg = Config::default();
        cfg.profile.timezone = "Mars/Olympus".into();
        assert!(cfg.manager_options().is_err());
    }

    #[test]
    fn test_defaults_round_trip_through_toml() {
        let text = toml::to_string_pretty(&Config::default()).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back.logging.level, "info");
        assert!(back.server.base_url.is_none());
    }
}
