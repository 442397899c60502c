use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use reggie_core::id::MAX_WORKER_ID;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// SQLite file; `:memory:` is accepted for throwaway instances.
    pub database_path: PathBuf,
    /// When unset, an in-process cache is used instead of Redis.
    pub redis_url: Option<String>,
    pub upload_dir: PathBuf,
    /// Directory holding the `backend/` and `front/` web assets.
    pub static_dir: Option<PathBuf>,
    pub session_ttl: Duration,
    pub worker_id: u16,
    /// When unset, verification codes are only written to the log.
    pub smtp: Option<SmtpConfig>,
    /// Create the default `admin` account when no employee exists.
    pub bootstrap_admin: bool,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = get("PORT")
            .unwrap_or_else(|| "8080".to_string())
            .parse::<u16>()
            .context("PORT must be a valid number")?;

        let database_path = get("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("reggie.db"));

        let upload_dir = get("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("uploads"));

        let session_minutes = get("SESSION_TTL_MINUTES")
            .unwrap_or_else(|| "30".to_string())
            .parse::<u64>()
            .context("SESSION_TTL_MINUTES must be a valid number")?;
        if session_minutes == 0 {
            bail!("SESSION_TTL_MINUTES must be greater than zero");
        }
        let Some(session_secs) = session_minutes.checked_mul(60) else {
            bail!("SESSION_TTL_MINUTES is too large");
        };

        let worker_id = get("WORKER_ID")
            .unwrap_or_else(|| "1".to_string())
            .parse::<u16>()
            .context("WORKER_ID must be a valid number")?;
        if worker_id > MAX_WORKER_ID {
            bail!("WORKER_ID must be at most {}", MAX_WORKER_ID);
        }

        let smtp = match get("SMTP_HOST") {
            Some(host) => {
                let port = get("SMTP_PORT")
                    .unwrap_or_else(|| "587".to_string())
                    .parse::<u16>()
                    .context("SMTP_PORT must be a valid number")?;
                let username = get("SMTP_USERNAME");
                let from = get("SMTP_FROM")
                    .or_else(|| username.clone())
                    .context("SMTP_FROM or SMTP_USERNAME is required when SMTP_HOST is set")?;
                Some(SmtpConfig {
                    host,
                    port,
                    username,
                    password: get("SMTP_PASSWORD"),
                    from,
                })
            }
            None => None,
        };

        Ok(Config {
            port,
            database_path,
            redis_url: get("REDIS_URL"),
            upload_dir,
            static_dir: get("STATIC_DIR").map(PathBuf::from),
            session_ttl: Duration::from_secs(session_secs),
            worker_id,
            smtp,
            bootstrap_admin: parse_flag(get("BOOTSTRAP_ADMIN").as_deref(), true),
        })
    }
}

/// Parse a boolean flag, falling back to `default` for missing or
/// unrecognised values.
pub fn parse_flag(value: Option<&str>, default: bool) -> bool {
    match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        Some("1" | "true" | "yes" | "on") => true,
        Some("0" | "false" | "no" | "off") => false,
        _ => default,
    }
}
