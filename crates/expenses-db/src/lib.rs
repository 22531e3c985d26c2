//! # expenses-db
//!
//! PostgreSQL + pgvector storage layer for the expenses transaction store.
//!
//! This crate provides:
//! - Connection pool management
//! - A parameterized predicate builder for transaction filters
//! - The transaction repository (create, get, query, batch mutations)
//! - Embedding similarity ranking with pgvector
//! - Yearly spending totals by tag
//!
//! ## Example
//!
//! ```rust,ignore
//! use expenses_db::{Database, IdBatch, TagMutation, TagSet, TransactionRepository};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/expenses").await?;
//!
//!     let ids = IdBatch::parse("10 11 12")?;
//!     let tags = TagSet::try_new(["food"])?;
//!     db.transactions.mutate_tags(&ids, TagMutation::Add(tags)).await?;
//!     Ok(())
//! }
//! ```
pub mod config;
pub mod overview;
pub mod pool;
pub mod predicate;
pub mod schema;
pub mod similarity;
pub mod transactions;

// Always compiled so integration tests (in tests/) can use it.
pub mod test_fixtures;

// Re-export core types
pub use expenses_core::*;

/// Escape LIKE/ILIKE wildcard characters (`%`, `_`, `\`) in user input.
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

pub use config::{DistanceMetric, EngineConfig};
pub use overview::PgSpendingOverview;
pub use pool::{create_pool, create_pool_with_config, PoolConfig};
pub use predicate::{FilterSql, Predicate, PredicateBuilder, QueryParam};
pub use similarity::PgSimilarityEngine;
pub use transactions::PgTransactionRepository;

/// Database handle holding the pool and the transaction repository.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Transaction repository.
    pub transactions: PgTransactionRepository,
    config: EngineConfig,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self::with_engine_config(pool, EngineConfig::default())
    }

    pub fn with_engine_config(pool: sqlx::Pool<sqlx::Postgres>, config: EngineConfig) -> Self {
        Self {
            transactions: PgTransactionRepository::with_config(pool.clone(), config),
            pool,
            config,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool and engine configuration.
    pub async fn connect_with_config(
        url: &str,
        pool_config: PoolConfig,
        engine_config: EngineConfig,
    ) -> Result<Self> {
        let pool = create_pool_with_config(url, pool_config).await?;
        Ok(Self::with_engine_config(pool, engine_config))
    }

    /// Create the transactions table and indexes if missing.
    pub async fn ensure_schema(&self) -> Result<()> {
        schema::ensure_schema(&self.pool, self.config.distance).await
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("plain"), "plain");
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b"), "a\\_b");
        assert_eq!(escape_like("c:\\dir"), "c:\\\\dir");
    }
}
