//! Centralized configuration (environment variables + defaults).

use anyhow::{bail, Context};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    /// Process-local tables; nothing survives a restart.
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "pg" => Ok(StoreBackend::Postgres),
            "memory" | "mem" => Ok(StoreBackend::Memory),
            other => bail!("STORE_BACKEND must be 'postgres' or 'memory', got '{other}'"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub backend: StoreBackend,
    /// Required for the Postgres backend.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub bootstrap_schema: bool,
    pub bind_addr: SocketAddr,
    pub blob_dir: PathBuf,
    pub daily_report_max_attempts: u32,
    pub snapshot_max_attempts: u32,
    pub strict_progress: bool,
}

impl Config {
    /// Reads `.env` (if present) and the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let backend: StoreBackend = env_or("STORE_BACKEND", StoreBackend::Postgres)?;
        let database_url = std::env::var("DATABASE_URL").ok().filter(|s| !s.trim().is_empty());
        if backend == StoreBackend::Postgres && database_url.is_none() {
            bail!("DATABASE_URL must be set when STORE_BACKEND=postgres");
        }

        Ok(Self {
            backend,
            database_url,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", 5u32)?.max(1),
            bootstrap_schema: env_flag("BOOTSTRAP_SCHEMA")?,
            bind_addr: env_or("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)))?,
            blob_dir: std::env::var("BLOB_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./blobs")),
            daily_report_max_attempts: env_or("DAILY_REPORT_MAX_ATTEMPTS", 8u32)?.max(1),
            snapshot_max_attempts: env_or("SNAPSHOT_MAX_ATTEMPTS", 6u32)?.max(1),
            strict_progress: env_flag("STRICT_PROGRESS")?,
        })
    }

    /// In-memory configuration used by tests and local demos.
    pub fn in_memory() -> Self {
        Self {
            backend: StoreBackend::Memory,
            database_url: None,
            db_max_connections: 1,
            bootstrap_schema: false,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            blob_dir: PathBuf::from("./blobs"),
            daily_report_max_attempts: 8,
            snapshot_max_attempts: 6,
            strict_progress: false,
        }
    }
}

fn env_or<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("{name} has an invalid value '{raw}'")),
        _ => Ok(default),
    }
}

fn env_flag(name: &str) -> anyhow::Result<bool> {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().to_lowercase().as_str() {
            "" | "0" | "false" | "no" | "off" => Ok(false),
            "1" | "true" | "yes" | "on" => Ok(true),
            other => bail!("{name} must be a boolean, got '{other}'"),
        },
        Err(_) => Ok(false),
    }
}
