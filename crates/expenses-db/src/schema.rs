//! Table and index definitions.

use sqlx::PgPool;
use tracing::info;

use expenses_core::defaults::EMBED_DIMENSION;
use expenses_core::Result;

use crate::config::DistanceMetric;

/// `pgvector` operator class for an HNSW index under `metric`.
pub fn vector_ops(metric: DistanceMetric) -> &'static str {
    match metric {
        DistanceMetric::Cosine => "vector_cosine_ops",
        DistanceMetric::L2 => "vector_l2_ops",
    }
}

/// DDL statements, in execution order.
pub fn statements(metric: DistanceMetric) -> Vec<String> {
    vec![
        "CREATE EXTENSION IF NOT EXISTS vector".to_string(),
        format!(
            "CREATE TABLE IF NOT EXISTS transactions (
                id BIGSERIAL PRIMARY KEY,
                date DATE NOT NULL,
                description TEXT NOT NULL,
                amount_cents BIGINT NOT NULL,
                source TEXT NOT NULL,
                tags TEXT[],
                desc_embedding vector({})
            )",
            EMBED_DIMENSION
        ),
        "CREATE INDEX IF NOT EXISTS transactions_date_idx ON transactions (date)".to_string(),
        "CREATE INDEX IF NOT EXISTS transactions_tags_idx ON transactions USING GIN (tags)"
            .to_string(),
        format!(
            "CREATE INDEX IF NOT EXISTS transactions_desc_embedding_{metric}_idx \
             ON transactions USING hnsw (desc_embedding {})",
            vector_ops(metric)
        ),
    ]
}

/// Create the transactions table and its indexes if missing.
pub async fn ensure_schema(pool: &PgPool, metric: DistanceMetric) -> Result<()> {
    for stmt in statements(metric) {
        sqlx::query(&stmt).execute(pool).await?;
    }
    info!(
        subsystem = "database",
        component = "schema",
        op = "ensure",
        distance = %metric,
        "Transactions schema ready"
    );
    Ok(())
}
