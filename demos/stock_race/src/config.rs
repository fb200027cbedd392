// demos/stock_race/src/config.rs

use crate::errors::{AppError, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use stockguard::{IsolationLevel, ReadMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
  Memory,
  Postgres,
}

impl FromStr for StoreBackend {
  type Err = String;

  fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "memory" => Ok(StoreBackend::Memory),
      "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
      other => Err(format!("unknown store backend '{}'", other)),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
  Pretty,
  Json,
}

impl FromStr for LogFormat {
  type Err = String;

  fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "pretty" | "text" => Ok(LogFormat::Pretty),
      "json" => Ok(LogFormat::Json),
      other => Err(format!("unknown log format '{}'", other)),
    }
  }
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
  pub max_connections: u32,
  pub acquire_timeout: Duration,
  pub idle_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
  pub backend: StoreBackend,
  pub database_url: Option<String>,
  pub schema: String,
  pub pool: PoolConfig,

  pub isolation: IsolationLevel,
  pub read_mode: ReadMode,
  pub hold: Duration,
  pub lock_timeout: Option<Duration>,
  pub enforce_non_negative: bool,

  pub order_count: usize,
  pub max_in_flight: Option<usize>,
  pub retry_max: usize,
  pub retry_initial_delay: Duration,

  pub seed_products: Vec<(String, i64)>,
  pub log_format: LogFormat,
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok(); // Load .env file if present
    Self::from_lookup(|name| env::var(name).ok())
  }

  /// Builds the configuration from any variable source.
  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
    let get = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());
    let parse = |name: &str, default: &str| -> Result<u64> {
      get(name, default)
        .trim()
        .parse::<u64>()
        .map_err(|e| AppError::Config(format!("Invalid {}: {}", name, e)))
    };
    let optional = |name: &str| -> Result<Option<u64>> {
      match lookup(name).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
          .trim()
          .parse::<u64>()
          .map(Some)
          .map_err(|e| AppError::Config(format!("Invalid {}: {}", name, e))),
        None => Ok(None),
      }
    };

    let backend = get("STORE_BACKEND", "memory").parse::<StoreBackend>().map_err(AppError::Config)?;
    let database_url = lookup("DATABASE_URL");
    if backend == StoreBackend::Postgres && database_url.is_none() {
      return Err(AppError::Config(
        "Missing environment variable 'DATABASE_URL' (required for the postgres backend)".to_string(),
      ));
    }

    let schema = get("DB_SCHEMA", "test");
    validate_identifier(&schema)?;

    let pool = PoolConfig {
      max_connections: u32::try_from(parse("DB_POOL_MAX", "150")?)
        .map_err(|e| AppError::Config(format!("Invalid DB_POOL_MAX: {}", e)))?,
      acquire_timeout: Duration::from_millis(parse("DB_POOL_ACQUIRE_TIMEOUT_MS", "30000")?),
      idle_timeout: Duration::from_millis(parse("DB_POOL_IDLE_TIMEOUT_MS", "10000")?),
    };

    let isolation = get("ISOLATION_LEVEL", "read_uncommitted")
      .parse::<IsolationLevel>()
      .map_err(AppError::Config)?;
    let read_mode = get("READ_MODE", "plain").parse::<ReadMode>().map_err(AppError::Config)?;
    let enforce_non_negative = get("ENFORCE_NON_NEGATIVE", "false")
      .trim()
      .parse::<bool>()
      .map_err(|e| AppError::Config(format!("Invalid ENFORCE_NON_NEGATIVE value: {}", e)))?;

    Ok(Self {
      backend,
      database_url,
      schema,
      pool,
      isolation,
      read_mode,
      hold: Duration::from_millis(parse("HOLD_MS", "3000")?),
      lock_timeout: optional("LOCK_TIMEOUT_MS")?.map(Duration::from_millis),
      enforce_non_negative,
      order_count: parse("ORDER_COUNT", "100")? as usize,
      max_in_flight: optional("MAX_IN_FLIGHT")?.map(|n| n as usize),
      retry_max: parse("RETRY_MAX", "0")? as usize,
      retry_initial_delay: Duration::from_millis(parse("RETRY_INITIAL_DELAY_MS", "10")?),
      seed_products: parse_seed_products(&get("SEED_PRODUCTS", "a:200,b:300"))?,
      log_format: get("LOG_FORMAT", "pretty").parse::<LogFormat>().map_err(AppError::Config)?,
    })
  }
}

/// Parses `name:quantity` pairs separated by commas.
pub fn parse_seed_products(raw: &str) -> Result<Vec<(String, i64)>> {
  raw
    .split(',')
    .map(str::trim)
    .filter(|entry| !entry.is_empty())
    .map(|entry| {
      let (name, quantity) = entry
        .split_once(':')
        .ok_or_else(|| AppError::Config(format!("Invalid SEED_PRODUCTS entry '{}': expected name:quantity", entry)))?;
      let name = name.trim();
      if name.is_empty() {
        return Err(AppError::Config(format!("Invalid SEED_PRODUCTS entry '{}': empty name", entry)));
      }
      let quantity = quantity
        .trim()
        .parse::<i64>()
        .map_err(|e| AppError::Config(format!("Invalid SEED_PRODUCTS quantity for '{}': {}", name, e)))?;
      Ok((name.to_string(), quantity))
    })
    .collect()
}

/// Schema names are spliced into SQL, so only plain identifiers are accepted.
fn validate_identifier(name: &str) -> Result<()> {
  let mut chars = name.chars();
  let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
    && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
  if valid {
    Ok(())
  } else {
    Err(AppError::Config(format!("Invalid DB_SCHEMA '{}': must be a plain identifier", name)))
  }
}
