//! Process configuration, read from the environment.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use storefront_infra::{AccessConfig, DeleteMode, ReconcilerConfig, SchedulerConfig, SyncRoot};

const DEV_JWT_SECRET: &str = "dev-secret";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("{0} is required when USE_PERSISTENT_STORES is set")]
    Missing(&'static str),
}

/// Listing backend for catalog sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingBackend {
    /// Scripted in-memory provider (dev/test).
    InMemory,
    /// Drive-compatible HTTP API.
    Drive { api_base: String, api_key: Option<String> },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    /// `Some(url)` selects the Postgres stores.
    pub database_url: Option<String>,
    pub listing: ListingBackend,
    pub reconciler: ReconcilerConfig,
    pub access: AccessConfig,
    pub scheduler: Option<SchedulerConfig>,
}

impl AppConfig {
    /// In-memory everything, for tests and local runs.
    pub fn in_memory(jwt_secret: impl Into<String>) -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            jwt_secret: jwt_secret.into(),
            database_url: None,
            listing: ListingBackend::InMemory,
            reconciler: ReconcilerConfig::default(),
            access: AccessConfig::default(),
            scheduler: None,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let jwt_secret = get("JWT_SECRET").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            DEV_JWT_SECRET.to_string()
        });
        let mut config = Self::in_memory(jwt_secret);

        if let Some(addr) = get("BIND_ADDR") {
            config.bind_addr = parse("BIND_ADDR", &addr)?;
        }

        let persistent = get("USE_PERSISTENT_STORES")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        if persistent {
            config.database_url = Some(get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?);
        }

        if let Some(api_base) = get("LISTING_API_BASE") {
            config.listing = ListingBackend::Drive {
                api_base,
                api_key: get("LISTING_API_KEY"),
            };
        }

        if let Some(v) = get("SYNC_CONCURRENCY") {
            config.reconciler = config.reconciler.with_concurrency(parse("SYNC_CONCURRENCY", &v)?);
        }
        if let Some(v) = get("PROVIDER_TIMEOUT_SECS") {
            let secs: u64 = parse("PROVIDER_TIMEOUT_SECS", &v)?;
            config.reconciler = config.reconciler.with_provider_timeout(Duration::from_secs(secs));
        }
        if let Some(v) = get("SYNC_DELETE_MODE") {
            let mode: DeleteMode = parse("SYNC_DELETE_MODE", &v)?;
            config.reconciler = config.reconciler.with_delete_mode(mode);
        }
        if let Some(v) = get("VIEWER_URL_TTL_SECS") {
            let secs: u64 = parse("VIEWER_URL_TTL_SECS", &v)?;
            config.access = config.access.with_viewer_ttl(Duration::from_secs(secs));
        }

        if let Some(v) = get("SYNC_INTERVAL_SECS") {
            let secs: u64 = parse("SYNC_INTERVAL_SECS", &v)?;
            if secs == 0 {
                return Err(ConfigError::Invalid {
                    key: "SYNC_INTERVAL_SECS",
                    reason: "must be greater than zero".into(),
                });
            }
            let roots = get("SYNC_ROOTS")
                .map(|raw| {
                    raw.split(',')
                        .filter(|s| !s.trim().is_empty())
                        .map(|s| parse::<SyncRoot>("SYNC_ROOTS", s))
                        .collect::<Result<Vec<_>, _>>()
                })
                .transpose()?
                .unwrap_or_default();
            config.scheduler = Some(SchedulerConfig {
                interval: Duration::from_secs(secs),
                roots,
            });
        }

        Ok(config)
    }
}

fn parse<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })
}
