/// Connection configuration
///
/// Options are accepted either as a typed [`ConnectionConfig`] or as a flat
/// list of string key/value pairs (the form connection properties usually take).
/// Unknown keys are ignored.
use crate::constants::DEFAULT_BUSY_TIMEOUT_MS;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::time::Duration;

/// Locking behaviour of the transaction opened when auto-commit is switched off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionMode {
    #[default]
    Deferred,
    Immediate,
    Exclusive,
}

impl TransactionMode {
    /// Parse a mode name, case-insensitively.
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_uppercase().as_str() {
            "DEFERRED" => Some(TransactionMode::Deferred),
            "IMMEDIATE" => Some(TransactionMode::Immediate),
            "EXCLUSIVE" => Some(TransactionMode::Exclusive),
            _ => None,
        }
    }

    pub fn begin_sql(self) -> &'static str {
        match self {
            TransactionMode::Deferred => "BEGIN DEFERRED",
            TransactionMode::Immediate => "BEGIN IMMEDIATE",
            TransactionMode::Exclusive => "BEGIN EXCLUSIVE",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// How long the engine waits on a locked database before reporting busy
    pub busy_timeout: Duration,
    /// Mode used for every `BEGIN` issued when leaving auto-commit
    pub transaction_mode: TransactionMode,
    /// `PRAGMA foreign_keys` value applied on open; engine default when `None`
    pub foreign_keys: Option<bool>,
    /// Whether statements may be asked for generated keys
    pub get_generated_keys: bool,
    /// Initial fetch size of new statements
    pub default_fetch_size: u32,
    /// Encryption-at-rest key (AES-256-CBC)
    pub encryption_key: Option<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
            transaction_mode: TransactionMode::Deferred,
            foreign_keys: None,
            get_generated_keys: true,
            default_fetch_size: 0,
            encryption_key: None,
        }
    }
}

impl ConnectionConfig {
    /// Build a configuration from string properties.
    ///
    /// Recognised keys: `busy_timeout` (ms), `transaction_mode`, `foreign_keys`,
    /// `get_generated_keys`, `default_fetch_size`, `encryption_key`.
    pub fn from_properties<'a, I>(props: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let map: HashMap<String, &str> = props
            .into_iter()
            .map(|(key, value)| (key.trim().to_ascii_lowercase(), value))
            .collect();

        let mut config = ConnectionConfig::default();

        if let Some(value) = map.get("busy_timeout") {
            let millis: u64 = value.trim().parse().map_err(|_| Error::Config {
                key: "busy_timeout".to_string(),
                reason: format!("expected milliseconds, got '{value}'"),
            })?;
            config.busy_timeout = Duration::from_millis(millis);
        }

        if let Some(value) = map.get("transaction_mode") {
            config.transaction_mode =
                TransactionMode::parse(value).ok_or_else(|| Error::Config {
                    key: "transaction_mode".to_string(),
                    reason: format!("expected DEFERRED, IMMEDIATE or EXCLUSIVE, got '{value}'"),
                })?;
        }

        if let Some(value) = map.get("foreign_keys") {
            config.foreign_keys = Some(parse_bool("foreign_keys", value)?);
        }

        if let Some(value) = map.get("get_generated_keys") {
            config.get_generated_keys = parse_bool("get_generated_keys", value)?;
        }

        if let Some(value) = map.get("default_fetch_size") {
            config.default_fetch_size = value.trim().parse().map_err(|_| Error::Config {
                key: "default_fetch_size".to_string(),
                reason: format!("expected a non-negative integer, got '{value}'"),
            })?;
        }

        if let Some(value) = map.get("encryption_key") {
            config.encryption_key = Some((*value).to_string());
        }

        Ok(config)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Ok(true),
        "false" | "0" | "off" | "no" => Ok(false),
        _ => Err(Error::Config {
            key: key.to_string(),
            reason: format!("expected a boolean, got '{value}'"),
        }),
    }
}
