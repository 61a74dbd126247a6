//! tokenindex-storage: relational backends for the ownership table.
//!
//! Backends:
//! - [`sqlite`]: SQLite via `sqlx` (embedded, single-file persistence)
//! - [`postgres`]: PostgreSQL via `sqlx` (production)
//!
//! The in-memory store lives in `tokenindex_core::store` and is selected by
//! [`connect`] for `memory:` URLs.

use std::sync::Arc;

use tokenindex_core::store::{FungibleMode, MemoryOwnershipStore, OwnershipStore};
use tokenindex_core::IndexerError;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "sqlite")]
pub mod sqlite;

/// Open the backend named by `database_url`.
///
/// - `postgres://…` / `postgresql://…` → [`postgres::PostgresOwnershipStore`]
/// - `memory:` → [`MemoryOwnershipStore`]
/// - anything else (`sqlite:…` or a file path) → [`sqlite::SqliteOwnershipStore`]
pub async fn connect(
    database_url: &str,
    mode: FungibleMode,
) -> Result<Arc<dyn OwnershipStore>, IndexerError> {
    if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        return connect_postgres(database_url, mode).await;
    }
    if database_url == "memory:" {
        return Ok(Arc::new(MemoryOwnershipStore::with_fungible_mode(mode)));
    }
    connect_sqlite(database_url, mode).await
}

#[cfg(feature = "postgres")]
async fn connect_postgres(
    url: &str,
    mode: FungibleMode,
) -> Result<Arc<dyn OwnershipStore>, IndexerError> {
    let store = postgres::PostgresOwnershipStore::connect(url).await?;
    Ok(Arc::new(store.with_fungible_mode(mode)))
}

#[cfg(not(feature = "postgres"))]
async fn connect_postgres(
    _url: &str,
    _mode: FungibleMode,
) -> Result<Arc<dyn OwnershipStore>, IndexerError> {
    Err(IndexerError::Config(
        "built without the `postgres` feature".into(),
    ))
}

#[cfg(feature = "sqlite")]
async fn connect_sqlite(
    url: &str,
    mode: FungibleMode,
) -> Result<Arc<dyn OwnershipStore>, IndexerError> {
    let store = sqlite::SqliteOwnershipStore::open(url).await?;
    Ok(Arc::new(store.with_fungible_mode(mode)))
}

#[cfg(not(feature = "sqlite"))]
async fn connect_sqlite(
    _url: &str,
    _mode: FungibleMode,
) -> Result<Arc<dyn OwnershipStore>, IndexerError> {
    Err(IndexerError::Config("built without the `sqlite` feature".into()))
}

/// Columns are signed 64-bit; reject values that would wrap.
#[cfg_attr(not(any(feature = "sqlite", feature = "postgres")), allow(dead_code))]
pub(crate) fn db_int(value: u64, field: &str) -> Result<i64, IndexerError> {
    i64::try_from(value)
        .map_err(|_| IndexerError::Storage(format!("{field} {value} exceeds the column range")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_int_range() {
        assert_eq!(db_int(42, "token_idx").unwrap(), 42);
        assert!(matches!(
            db_int(u64::MAX, "amount"),
            Err(IndexerError::Storage(msg)) if msg.contains("amount")
        ));
    }

    #[tokio::test]
    async fn memory_url_selects_memory_store() {
        let store = connect("memory:", FungibleMode::Replace).await.unwrap();
        assert!(store.checkpoint("CF1").await.unwrap().is_none());
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn sqlite_url_selects_sqlite_store() {
        let store = connect("sqlite::memory:", FungibleMode::Strict).await.unwrap();
        assert!(store.tokens_of("CF1", "A").await.unwrap().is_empty());
    }
}
