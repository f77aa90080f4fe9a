//! Configuration types.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::error::ConfigError;

const DEFAULT_TIMEZONE: &str = "Europe/London";

const DEFAULT_INFO: &str = "We're a mobile tyre fitting service. We come to you at home/work. \
Same-day slots often available.";

/// Business details shown to customers, plus the zone used for "today".
#[derive(Debug, Clone)]
pub struct BusinessConfig {
    /// Display name used in the menu and info text.
    pub name: String,
    /// Optional call/text number appended to the info text.
    pub phone: String,
    /// Service area description.
    pub areas: String,
    /// Free-text blurb.
    pub info: String,
    pub call_out_fee: String,
    pub payment_methods: String,
    /// Zone for date validation and displayed timestamps.
    pub timezone: Tz,
}

impl Default for BusinessConfig {
    fn default() -> Self {
        Self {
            name: "Mobile Tyre Fitter".to_string(),
            phone: String::new(),
            areas: "Local area".to_string(),
            info: DEFAULT_INFO.to_string(),
            call_out_fee: "£0".to_string(),
            payment_methods: "Card / Bank transfer / Cash".to_string(),
            timezone: chrono_tz::Europe::London,
        }
    }
}

impl BusinessConfig {
    /// Build from `BUSINESS_*`, `CALL_OUT_FEE`, `PAYMENT_METHODS` and
    /// `APP_TIMEZONE`, falling back to defaults for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let var = |key: &str, fallback: String| std::env::var(key).unwrap_or(fallback);

        let timezone_name =
            std::env::var("APP_TIMEZONE").unwrap_or_else(|_| DEFAULT_TIMEZONE.to_string());

        Self {
            name: var("BUSINESS_NAME", defaults.name),
            phone: var("BUSINESS_PHONE", defaults.phone),
            areas: var("BUSINESS_AREAS", defaults.areas),
            info: var("BUSINESS_INFO", defaults.info),
            call_out_fee: var("CALL_OUT_FEE", defaults.call_out_fee),
            payment_methods: var("PAYMENT_METHODS", defaults.payment_methods),
            timezone: parse_timezone(&timezone_name),
        }
    }

    /// Current instant in the configured zone.
    pub fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.timezone)
    }

    /// Current calendar day in the configured zone.
    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Parse an IANA zone name, falling back to UTC when it is unknown.
pub fn parse_timezone(name: &str) -> Tz {
    match name.trim().parse::<Tz>() {
        Ok(tz) => tz,
        Err(_) => {
            tracing::warn!(timezone = name, "Unknown timezone, falling back to UTC");
            Tz::UTC
        }
    }
}

/// Process-level settings for the HTTP server and storage.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// SQLite database file.
    pub db_path: PathBuf,
    pub bind_addr: String,
    pub port: u16,
    /// When set, logs are also written to a daily rolling file here.
    pub log_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/intake-bot.db"),
            bind_addr: "127.0.0.1".to_string(),
            port: 5000,
            log_dir: None,
        }
    }
}

impl ServerConfig {
    /// Build from `DB_PATH`, `INTAKE_BIND`, `INTAKE_PORT` and `INTAKE_LOG_DIR`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let port = match std::env::var("INTAKE_PORT") {
            Ok(raw) => parse_port(&raw)?,
            Err(_) => defaults.port,
        };

        Ok(Self {
            db_path: std::env::var("DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            bind_addr: std::env::var("INTAKE_BIND").unwrap_or(defaults.bind_addr),
            port,
            log_dir: std::env::var("INTAKE_LOG_DIR")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
        })
    }

    /// `host:port` string for binding the listener.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

fn parse_port(raw: &str) -> Result<u16, ConfigError> {
    raw.trim()
        .parse::<u16>()
        .map_err(|e| ConfigError::InvalidValue {
            key: "INTAKE_PORT".to_string(),
            message: format!("{raw:?} is not a port number: {e}"),
        })
}
