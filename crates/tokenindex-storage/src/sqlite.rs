//! SQLite ownership store.
//!
//! Embedded single-file persistence, and an in-memory mode for tests.
//!
//! # Usage
//! ```rust,no_run
//! use tokenindex_storage::sqlite::SqliteOwnershipStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SqliteOwnershipStore::open("./ownership.db").await?;
//! let store = SqliteOwnershipStore::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::debug;

use tokenindex_core::store::{
    duplicate_credit, reconcile_missing_sender, Checkpoint, FungibleMode, OwnershipStore,
    TransferAction,
};
use tokenindex_core::{ContractDescriptor, IndexerError, OwnershipChange};

use crate::db_int;

/// SQLite-backed ownership store.
#[derive(Clone)]
pub struct SqliteOwnershipStore {
    pool: SqlitePool,
    mode: FungibleMode,
}

impl SqliteOwnershipStore {
    /// Open (or create) a database at `path`, either a plain file path or a
    /// full `sqlite:` URL.
    pub async fn open(path: &str) -> Result<Self, IndexerError> {
        if path == "sqlite::memory:" || path == ":memory:" {
            return Self::in_memory().await;
        }
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };
        let pool = SqlitePool::connect(&url)
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;

        let store = Self {
            pool,
            mode: FungibleMode::default(),
        };
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&store.pool)
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;
        store.init_schema().await?;
        Ok(store)
    }

    /// Open a private in-memory database. Data is lost when dropped.
    pub async fn in_memory() -> Result<Self, IndexerError> {
        // Each connection would otherwise see its own empty database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;

        let store = Self {
            pool,
            mode: FungibleMode::default(),
        };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn with_fungible_mode(mut self, mode: FungibleMode) -> Self {
        self.mode = mode;
        self
    }

    async fn init_schema(&self) -> Result<(), IndexerError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS token_ownership (
                contract_id TEXT    NOT NULL,
                user_addr   TEXT    NOT NULL,
                token_idx   INTEGER NOT NULL,
                amount      INTEGER,
                UNIQUE (contract_id, user_addr, token_idx)
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_token_ownership_token
             ON token_ownership (contract_id, token_idx);",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS indexer_checkpoints (
                contract_id TEXT    PRIMARY KEY,
                next_height INTEGER NOT NULL,
                updated_at  INTEGER NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;

        Ok(())
    }

    async fn apply_transfer(
        tx: &mut Transaction<'_, Sqlite>,
        contract_id: &str,
        sender: &str,
        recipient: &str,
        token_index: u64,
    ) -> Result<(), IndexerError> {
        let idx = db_int(token_index, "token_idx")?;

        let deleted = sqlx::query(
            "DELETE FROM token_ownership
             WHERE contract_id = ? AND user_addr = ? AND token_idx = ?",
        )
        .bind(contract_id)
        .bind(sender)
        .bind(idx)
        .execute(&mut **tx)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?
        .rows_affected();

        if deleted == 0 {
            let owner: Option<String> = sqlx::query(
                "SELECT user_addr FROM token_ownership
                 WHERE contract_id = ? AND token_idx = ? LIMIT 1",
            )
            .bind(contract_id)
            .bind(idx)
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?
            .map(|row| row.get("user_addr"));

            let action = reconcile_missing_sender(
                contract_id,
                sender,
                recipient,
                token_index,
                owner.as_deref(),
            )?;
            if action == TransferAction::AlreadyApplied {
                debug!(contract_id, token_index, recipient, "transfer already applied");
                return Ok(());
            }
        }

        sqlx::query(
            "INSERT INTO token_ownership (contract_id, user_addr, token_idx, amount)
             VALUES (?, ?, ?, NULL)
             ON CONFLICT (contract_id, user_addr, token_idx) DO NOTHING",
        )
        .bind(contract_id)
        .bind(recipient)
        .bind(idx)
        .execute(&mut **tx)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;

        Ok(())
    }

    async fn apply_credit(
        tx: &mut Transaction<'_, Sqlite>,
        mode: FungibleMode,
        contract_id: &str,
        recipient: &str,
        token_index: u64,
        amount: u64,
    ) -> Result<(), IndexerError> {
        let sql = match mode {
            FungibleMode::Strict => {
                "INSERT INTO token_ownership (contract_id, user_addr, token_idx, amount)
                 VALUES (?, ?, ?, ?)
                 ON CONFLICT (contract_id, user_addr, token_idx) DO NOTHING"
            }
            FungibleMode::Replace => {
                "INSERT INTO token_ownership (contract_id, user_addr, token_idx, amount)
                 VALUES (?, ?, ?, ?)
                 ON CONFLICT (contract_id, user_addr, token_idx)
                 DO UPDATE SET amount = excluded.amount"
            }
        };

        let inserted = sqlx::query(sql)
            .bind(contract_id)
            .bind(recipient)
            .bind(db_int(token_index, "token_idx")?)
            .bind(db_int(amount, "amount")?)
            .execute(&mut **tx)
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?
            .rows_affected();

        if inserted == 0 {
            return Err(duplicate_credit(contract_id, recipient, token_index));
        }
        Ok(())
    }
}

#[async_trait]
impl OwnershipStore for SqliteOwnershipStore {
    async fn ensure_schema(&self, contract: &ContractDescriptor) -> Result<(), IndexerError> {
        self.init_schema().await?;
        debug!(contract = %contract.id, "schema ready");
        Ok(())
    }

    async fn apply_batch(
        &self,
        contract: &ContractDescriptor,
        records: &[OwnershipChange],
        next_height: u64,
    ) -> Result<(), IndexerError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;

        for record in records {
            match record {
                OwnershipChange::Transfer {
                    sender,
                    recipient,
                    contract_id,
                    token_index,
                } => {
                    Self::apply_transfer(&mut tx, contract_id, sender, recipient, *token_index)
                        .await?
                }
                OwnershipChange::Credit {
                    recipient,
                    contract_id,
                    token_index,
                    amount,
                } => {
                    Self::apply_credit(
                        &mut tx,
                        self.mode,
                        contract_id,
                        recipient,
                        *token_index,
                        *amount,
                    )
                    .await?
                }
            }
        }

        sqlx::query(
            "INSERT INTO indexer_checkpoints (contract_id, next_height, updated_at)
             VALUES (?, ?, ?)
             ON CONFLICT (contract_id)
             DO UPDATE SET next_height = excluded.next_height, updated_at = excluded.updated_at",
        )
        .bind(&contract.id)
        .bind(db_int(next_height, "next_height")?)
        .bind(chrono::Utc::now().timestamp())
        .execute(&mut *tx)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| IndexerError::Storage(e.to_string()))?;

        debug!(contract = %contract.id, records = records.len(), next_height, "batch committed");
        Ok(())
    }

    async fn checkpoint(&self, contract_id: &str) -> Result<Option<Checkpoint>, IndexerError> {
        let row = sqlx::query(
            "SELECT contract_id, next_height, updated_at
             FROM indexer_checkpoints WHERE contract_id = ?",
        )
        .bind(contract_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;

        Ok(row.map(|r| Checkpoint {
            contract_id: r.get("contract_id"),
            next_height: r.get::<i64, _>("next_height") as u64,
            updated_at: r.get("updated_at"),
        }))
    }

    async fn tokens_of(&self, contract_id: &str, user: &str) -> Result<Vec<u64>, IndexerError> {
        let rows = sqlx::query(
            "SELECT token_idx FROM token_ownership
             WHERE contract_id = ? AND user_addr = ? ORDER BY token_idx",
        )
        .bind(contract_id)
        .bind(user)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;

        Ok(rows
            .iter()
            .map(|r| r.get::<i64, _>("token_idx") as u64)
            .collect())
    }

    async fn amount_of(&self, contract_id: &str, user: &str) -> Result<Option<u64>, IndexerError> {
        let row = sqlx::query(
            "SELECT amount FROM token_ownership
             WHERE contract_id = ? AND user_addr = ? AND token_idx = 0",
        )
        .bind(contract_id)
        .bind(user)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;

        Ok(row
            .and_then(|r| r.get::<Option<i64>, _>("amount"))
            .map(|a| a as u64))
    }

    async fn owner_of(
        &self,
        contract_id: &str,
        token_index: u64,
    ) -> Result<Option<String>, IndexerError> {
        let row = sqlx::query(
            "SELECT user_addr FROM token_ownership
             WHERE contract_id = ? AND token_idx = ? LIMIT 1",
        )
        .bind(contract_id)
        .bind(db_int(token_index, "token_idx")?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| IndexerError::Storage(e.to_string()))?;

        Ok(row.map(|r| r.get("user_addr")))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
