//! Connection pool for the lease store.

use std::str::FromStr;
use std::time::Duration;

use sqlx_core::pool::PoolOptions;
use sqlx_postgres::{PgConnectOptions, PgPool, Postgres};
use tracing::{debug, info, instrument};

use crate::config::PostgresConfig;
use crate::error::{PostgresError, Result};

pub type PgPoolOptions = PoolOptions<Postgres>;

/// Per-connection settings: the URL plus session name and statement timeout.
pub(crate) fn connect_options(config: &PostgresConfig) -> Result<PgConnectOptions> {
    let mut options = PgConnectOptions::from_str(&config.url)?;
    if !config.application_name.is_empty() {
        options = options.application_name(&config.application_name);
    }
    if let Some(timeout) = config.statement_timeout_ms {
        options = options.options([("statement_timeout", format!("{timeout}ms"))]);
    }
    Ok(options)
}

/// Pool sizing; `min_connections` defaults to a quarter of the pool.
fn pool_options(config: &PostgresConfig) -> PgPoolOptions {
    let min_connections = config
        .min_connections
        .unwrap_or(config.pool_size / 4)
        .clamp(1, config.pool_size);

    let mut options = PgPoolOptions::new()
        .max_connections(config.pool_size)
        .min_connections(min_connections)
        .acquire_timeout(Duration::from_millis(config.connect_timeout_ms));

    if let Some(lifetime) = config.max_lifetime_secs {
        options = options.max_lifetime(Duration::from_secs(lifetime));
    }
    if let Some(idle_timeout) = config.idle_timeout_ms {
        options = options.idle_timeout(Duration::from_millis(idle_timeout));
    }
    options
}

/// Creates a connection pool from `config`.
#[instrument(skip(config), fields(url = %mask_password(&config.url)))]
pub async fn create_pool(config: &PostgresConfig) -> Result<PgPool> {
    if config.pool_size == 0 {
        return Err(PostgresError::config("pool_size must be at least 1"));
    }

    let connect = connect_options(config)?;
    info!(
        pool_size = config.pool_size,
        application_name = %config.application_name,
        statement_timeout_ms = ?config.statement_timeout_ms,
        "Opening lease store pool"
    );

    let pool = pool_options(config).connect_with(connect).await?;
    debug!(size = pool.size(), "Lease store pool ready");
    Ok(pool)
}

/// Masks the password in a database URL for logging.
pub(crate) fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.find('@')
        && let Some(colon_pos) = url[..at_pos].rfind(':')
    {
        let scheme_end = url.find("://").map(|p| p + 3).unwrap_or(0);
        if colon_pos > scheme_end {
            return format!("{}:****{}", &url[..colon_pos], &url[at_pos..]);
        }
    }
    url.to_string()
}
