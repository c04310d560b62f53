use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::types::{valid_latitude, valid_longitude};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub notice_env: String,
    pub api_bind: String,
    pub data_dir: PathBuf,
    pub admin_token_hash: Option<String>,
    pub push_subject: String,
    pub push_timeout: Duration,
    pub push_concurrency: usize,
    pub purge_interval: Duration,
    pub purge_batch: i64,
    pub telegram: Option<TelegramSettings>,
    pub region: RegionSettings,
}

/// Bot credentials for channel alerts. Present only when both values are set.
#[derive(Clone, PartialEq, Eq)]
pub struct TelegramSettings {
    pub bot_token: String,
    pub chat_id: String,
}

impl std::fmt::Debug for TelegramSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramSettings")
            .field("chat_id", &self.chat_id)
            .finish_non_exhaustive()
    }
}

/// Map area the frontend opens on.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionSettings {
    pub name: String,
    pub lat: f64,
    pub long: f64,
    pub zoom: u8,
}

impl Default for RegionSettings {
    fn default() -> Self {
        Self {
            name: "My City".to_string(),
            lat: 39.7392,
            long: -104.9903,
            zoom: 14,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup. `from_env` is this with
    /// the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("NOTICE_DATABASE_URL")
            .or_else(|| lookup("DATABASE_URL"))
            .unwrap_or_else(|| "sqlite://notice.db".to_string());
        let notice_env = lookup("NOTICE_ENV").unwrap_or_else(|| "dev".to_string());
        let api_bind = lookup("NOTICE_API_BIND").unwrap_or_else(|| "0.0.0.0:8090".to_string());
        let data_dir = lookup("NOTICE_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./notice_data"));
        let admin_token_hash = lookup("NOTICE_ADMIN_TOKEN_HASH").filter(|v| !v.trim().is_empty());
        let push_subject = lookup("NOTICE_PUSH_SUBJECT")
            .unwrap_or_else(|| "mailto:admin@notice.local".to_string());
        let push_timeout_secs: u64 = parse_or(&lookup, "NOTICE_PUSH_TIMEOUT_SECS", 10)?;
        let push_concurrency: usize = parse_or(&lookup, "NOTICE_PUSH_CONCURRENCY", 8)?;
        let purge_interval_secs: u64 = parse_or(&lookup, "NOTICE_PURGE_INTERVAL_SECS", 3600)?;
        let purge_batch: i64 = parse_or(&lookup, "NOTICE_PURGE_BATCH", 1000)?;
        let telegram = telegram_from(&lookup);
        let region = region_from(&lookup)?;

        if push_concurrency == 0 {
            return Err(ConfigError::Invalid {
                key: "NOTICE_PUSH_CONCURRENCY",
                value: "0".to_string(),
            });
        }
        if purge_batch <= 0 {
            return Err(ConfigError::Invalid {
                key: "NOTICE_PURGE_BATCH",
                value: purge_batch.to_string(),
            });
        }

        Ok(Self {
            database_url,
            notice_env,
            api_bind,
            data_dir,
            admin_token_hash,
            push_subject,
            push_timeout: Duration::from_secs(push_timeout_secs),
            push_concurrency,
            purge_interval: Duration::from_secs(purge_interval_secs.max(1)),
            purge_batch,
            telegram,
            region,
        })
    }
}

// Also read without the NOTICE_ prefix; the prefixed name wins.
const TELEGRAM_TOKEN_KEYS: &[&str] = &["NOTICE_TELEGRAM_BOT_TOKEN", "TELEGRAM_BOT_TOKEN"];
const TELEGRAM_CHAT_KEYS: &[&str] = &["NOTICE_TELEGRAM_CHAT_ID", "TELEGRAM_CHAT_ID"];
const REGION_NAME_KEYS: &[&str] = &["NOTICE_REGION_NAME", "REGION_NAME"];
const REGION_LAT_KEYS: &[&str] = &["NOTICE_REGION_LAT", "REGION_LAT"];
const REGION_LONG_KEYS: &[&str] = &["NOTICE_REGION_LONG", "REGION_LONG"];
const REGION_ZOOM_KEYS: &[&str] = &["NOTICE_REGION_ZOOM", "REGION_ZOOM"];

fn telegram_from<F>(lookup: &F) -> Option<TelegramSettings>
where
    F: Fn(&str) -> Option<String>,
{
    let non_blank = |keys: &[&'static str]| {
        lookup_any(lookup, keys)
            .map(|(_, value)| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };
    Some(TelegramSettings {
        bot_token: non_blank(TELEGRAM_TOKEN_KEYS)?,
        chat_id: non_blank(TELEGRAM_CHAT_KEYS)?,
    })
}

fn region_from<F>(lookup: &F) -> Result<RegionSettings, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = RegionSettings::default();
    let name = lookup_any(lookup, REGION_NAME_KEYS)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or(defaults.name);
    let lat: f64 = parse_any_or(lookup, REGION_LAT_KEYS, defaults.lat)?;
    let long: f64 = parse_any_or(lookup, REGION_LONG_KEYS, defaults.long)?;
    let zoom: u8 = parse_any_or(lookup, REGION_ZOOM_KEYS, defaults.zoom)?;

    if !valid_latitude(lat) {
        return Err(ConfigError::Invalid {
            key: REGION_LAT_KEYS[0],
            value: lat.to_string(),
        });
    }
    if !valid_longitude(long) {
        return Err(ConfigError::Invalid {
            key: REGION_LONG_KEYS[0],
            value: long.to_string(),
        });
    }

    Ok(RegionSettings {
        name,
        lat,
        long,
        zoom,
    })
}

fn lookup_any<F>(lookup: &F, keys: &[&'static str]) -> Option<(&'static str, String)>
where
    F: Fn(&str) -> Option<String>,
{
    keys.iter().find_map(|key| lookup(key).map(|value| (*key, value)))
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    parse_any_or(lookup, &[key], default)
}

fn parse_any_or<F, T>(lookup: &F, keys: &[&'static str], default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup_any(lookup, keys) {
        Some((key, value)) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}
