//! Repository layer for database operations

pub mod books;
pub mod loans;
pub mod reports;
pub mod users;

use std::{future::Future, str::FromStr, time::Duration};

use chrono::{DateTime, SubsecRound, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};

use crate::{
    config::DatabaseConfig,
    error::{AppError, AppResult},
};

/// Bounded retry applied when the store reports lock contention
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &DatabaseConfig) -> Self {
        Self {
            attempts: config.connect_retries.max(1),
            delay: Duration::from_millis(config.retry_delay_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&DatabaseConfig::default())
    }
}

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: SqlitePool,
    pub retry: RetryPolicy,
    pub users: users::UsersRepository,
    pub books: books::BooksRepository,
    pub loans: loans::LoansRepository,
    pub reports: reports::ReportsRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: SqlitePool, retry: RetryPolicy) -> Self {
        Self {
            users: users::UsersRepository::new(pool.clone()),
            books: books::BooksRepository::new(pool.clone()),
            loans: loans::LoansRepository::new(pool.clone()),
            reports: reports::ReportsRepository::new(pool.clone()),
            retry,
            pool,
        }
    }

    /// Open the store, apply migrations and build the repository.
    ///
    /// In-memory URLs get a single long-lived connection so every caller
    /// sees the same database.
    #[tracing::instrument(skip(config))]
    pub async fn connect(config: &DatabaseConfig) -> AppResult<Self> {
        let in_memory = config.url.contains(":memory:");
        let options = SqliteConnectOptions::from_str(&config.url)?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(config.busy_timeout_secs))
            .create_if_missing(true);

        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
                .max_connections(config.max_connections)
                .min_connections(config.min_connections)
        };

        let retry = RetryPolicy::from_config(config);
        let pool = retry_on_busy(retry, || {
            pool_options.clone().connect_with(options.clone())
        })
        .await
        .map_err(|e| match e {
            AppError::StoreBusy(msg) => {
                AppError::StoreBusy(format!("Could not connect to the database: {}", msg))
            }
            other => other,
        })?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::debug!("database ready");

        Ok(Self::new(pool, retry))
    }

    /// Round-trip to the store
    pub async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Run `op`, retrying while the store reports lock contention.
///
/// Gives up with [`AppError::StoreBusy`] once the policy's attempts are spent;
/// any other error is returned immediately.
pub async fn retry_on_busy<T, E, F, Fut>(policy: RetryPolicy, mut op: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Into<AppError>,
{
    let mut attempt = 1;
    loop {
        match op().await.map_err(Into::into) {
            Err(err) if err.is_busy() => {
                if attempt >= policy.attempts {
                    return Err(AppError::StoreBusy(format!(
                        "Database is busy after {} attempts: {}",
                        attempt, err
                    )));
                }
                tracing::warn!(attempt, error = %err, "database busy, retrying");
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}

/// Current time as stored: UTC, whole seconds
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

/// Separates fields inside a `search_text` column
const SEARCH_SEPARATOR: char = '\u{1f}';

/// Lowercased, separator-joined fields stored in `search_text`.
///
/// SQLite's `LOWER()` folds ASCII only, so folding happens here and the
/// column is compared with `LIKE` against [`contains_pattern`].
pub(crate) fn search_text(fields: &[&str]) -> String {
    fields
        .iter()
        .map(|field| field.to_lowercase())
        .collect::<Vec<_>>()
        .join(&SEARCH_SEPARATOR.to_string())
}

/// `LIKE` pattern matching `needle` anywhere in a `search_text` column; use with `ESCAPE '\'`
pub(crate) fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.trim().to_lowercase().chars() {
        if c == SEARCH_SEPARATOR {
            continue;
        }
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
