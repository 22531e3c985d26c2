//! Test fixtures for database integration tests.
//!
//! Each [`TestDatabase`] owns a freshly created schema holding its own
//! `transactions` table, so tests can run in parallel against one server.
//!
//! ## Configuration
//!
//! The test database URL is configured via the `DATABASE_URL` environment variable.
//! If not set, defaults to [`DEFAULT_TEST_DATABASE_URL`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use expenses_db::test_fixtures::{TestDatabase, TransactionBuilder};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let test_db = TestDatabase::new().await;
//!     let id = test_db.insert(TransactionBuilder::new("Coffee").tags(&["food"])).await;
//!
//!     // Run your tests...
//!
//!     test_db.cleanup().await;
//! }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::NaiveDate;
use sqlx::PgPool;

use expenses_core::defaults::{DATABASE_URL, EMBED_DIMENSION};
use expenses_core::{Embedding, NewTransaction, TagSet, TransactionId, TransactionRepository};

use crate::config::{DistanceMetric, EngineConfig};
use crate::pool::{create_pool_in_schema, PoolConfig};
use crate::schema::statements;
use crate::transactions::PgTransactionRepository;

/// Default test database URL when DATABASE_URL is not set.
pub const DEFAULT_TEST_DATABASE_URL: &str = DATABASE_URL;

static SCHEMA_SEQ: AtomicU64 = AtomicU64::new(0);

fn unique_schema_name() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!(
        "test_{}_{}_{}",
        std::process::id(),
        nanos,
        SCHEMA_SEQ.fetch_add(1, Ordering::Relaxed)
    )
}

/// Test database connection with automatic cleanup.
pub struct TestDatabase {
    pub pool: PgPool,
    pub repo: PgTransactionRepository,
    admin: PgPool,
    schema_name: String,
    cleanup_on_drop: bool,
}

impl TestDatabase {
    /// Create a new test database instance using cosine distance.
    pub async fn new() -> Self {
        Self::with_distance(DistanceMetric::Cosine).await
    }

    /// Create a test database without automatic cleanup (useful for debugging).
    pub async fn without_cleanup() -> Self {
        let mut db = Self::with_distance(DistanceMetric::Cosine).await;
        db.cleanup_on_drop = false;
        db
    }

    pub async fn with_distance(distance: DistanceMetric) -> Self {
        dotenvy::dotenv().ok();
        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_TEST_DATABASE_URL.to_string());

        let config = PoolConfig::new()
            .max_connections(5)
            .min_connections(1)
            .connect_timeout(Duration::from_secs(30));

        let admin = crate::pool::create_pool_with_config(&database_url, config.clone())
            .await
            .expect("Failed to create test database pool");

        let schema_name = unique_schema_name();
        // Parallel tests may race on this; the loser sees a duplicate error.
        let _ = sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(&admin)
            .await;
        sqlx::query(&format!("CREATE SCHEMA {}", schema_name))
            .execute(&admin)
            .await
            .expect("Failed to create test schema");

        let pool = create_pool_in_schema(&database_url, config, &schema_name)
            .await
            .expect("Failed to create schema-scoped pool");

        // Extension lives in public; skip re-creating it per schema.
        for stmt in statements(distance).into_iter().skip(1) {
            sqlx::query(&stmt)
                .execute(&pool)
                .await
                .expect("Failed to create transactions table");
        }

        let repo =
            PgTransactionRepository::with_config(pool.clone(), EngineConfig::new().distance(distance));

        Self {
            pool,
            repo,
            admin,
            schema_name,
            cleanup_on_drop: true,
        }
    }

    /// Insert a transaction built by `builder`, returning its id.
    pub async fn insert(&self, builder: TransactionBuilder) -> TransactionId {
        self.repo
            .create(builder.build())
            .await
            .expect("Failed to insert test transaction")
    }

    /// Set a stored tag array directly, bypassing validation (e.g. NULL).
    pub async fn set_raw_tags(&self, id: TransactionId, tags: Option<Vec<String>>) {
        sqlx::query("UPDATE transactions SET tags = $1 WHERE id = $2")
            .bind(tags)
            .bind(id)
            .execute(&self.pool)
            .await
            .expect("Failed to set raw tags");
    }

    /// Manually clean up test data and drop schema.
    pub async fn cleanup(mut self) {
        if self.cleanup_on_drop {
            self.cleanup_impl().await;
            self.cleanup_on_drop = false;
        }
    }

    async fn cleanup_impl(&self) {
        self.pool.close().await;
        let _ = sqlx::query(&format!(
            "DROP SCHEMA IF EXISTS {} CASCADE",
            self.schema_name
        ))
        .execute(&self.admin)
        .await;
    }
}

impl Drop for TestDatabase {
    fn drop(&mut self) {
        if self.cleanup_on_drop {
            eprintln!(
                "TestDatabase dropped without cleanup(); schema {} left behind",
                self.schema_name
            );
        }
    }
}

/// Builder for test transactions with sensible defaults.
#[derive(Debug, Clone)]
pub struct TransactionBuilder {
    date: NaiveDate,
    description: String,
    amount_cents: i64,
    source: String,
    tags: Vec<String>,
    embedding: Option<Vec<f32>>,
}

impl TransactionBuilder {
    pub fn new(description: &str) -> Self {
        Self {
            date: NaiveDate::from_ymd_opt(2024, 1, 15).expect("valid date"),
            description: description.to_string(),
            amount_cents: -1000,
            source: "checking".to_string(),
            tags: Vec::new(),
            embedding: None,
        }
    }

    pub fn date(mut self, y: i32, m: u32, d: u32) -> Self {
        self.date = NaiveDate::from_ymd_opt(y, m, d).expect("valid date");
        self
    }

    pub fn amount_cents(mut self, cents: i64) -> Self {
        self.amount_cents = cents;
        self
    }

    pub fn source(mut self, source: &str) -> Self {
        self.source = source.to_string();
        self
    }

    pub fn tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn embedding(mut self, values: Vec<f32>) -> Self {
        self.embedding = Some(values);
        self
    }

    pub fn build(self) -> NewTransaction {
        NewTransaction {
            date: self.date,
            description: self.description,
            amount_cents: self.amount_cents,
            source: self.source,
            tags: TagSet::try_new(self.tags).expect("valid test tags"),
            embedding: self
                .embedding
                .map(|v| Embedding::try_from_vec(v).expect("valid test embedding")),
        }
    }
}

/// A unit-length embedding pointing mostly along `axis`, tilted toward
/// `axis + 1` by `tilt`.
pub fn axis_embedding(axis: usize, tilt: f32) -> Vec<f32> {
    let mut v = vec![0.0f32; EMBED_DIMENSION];
    v[axis % EMBED_DIMENSION] = 1.0;
    v[(axis + 1) % EMBED_DIMENSION] = tilt;
    let norm = (1.0 + tilt * tilt).sqrt();
    v.iter_mut().for_each(|x| *x /= norm);
    v
}
