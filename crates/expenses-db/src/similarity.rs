//! Similarity ranking over description embeddings.
//!
//! The reference rows' embeddings are averaged into a single search center
//! and every other embedded transaction passing the secondary filter is
//! ranked by its distance to that center, closest first.

use std::time::Instant;

use pgvector::Vector;
use sqlx::{Pool, Postgres};
use tracing::{debug, info};

use expenses_core::{
    Embedding, Error, IdBatch, Result, SimilarTransactions, Transaction, TransactionQuery,
};

use crate::config::DistanceMetric;
use crate::predicate::{bind_params, predicates_for, Predicate, PredicateBuilder};
use crate::transactions::{map_row, COLUMNS_WITH_EMBEDDING};

const CANDIDATE_COLUMNS: &str = "t.id, t.date, t.description, t.amount_cents, t.source, t.tags";

/// Nearest-neighbour search across transactions.
#[derive(Clone)]
pub struct PgSimilarityEngine {
    pool: Pool<Postgres>,
    distance: DistanceMetric,
}

impl PgSimilarityEngine {
    pub fn new(pool: Pool<Postgres>, distance: DistanceMetric) -> Self {
        Self { pool, distance }
    }

    pub fn distance(&self) -> DistanceMetric {
        self.distance
    }

    /// Rank transactions by closeness to the mean embedding of `ids`.
    ///
    /// `filter` narrows the candidate pool and its `limit` caps the number
    /// of similar rows. Reference rows without an embedding are still
    /// returned in `selected` but do not contribute to the mean. When none
    /// of them has one, `similar` is empty.
    pub async fn rank(&self, ids: &IdBatch, filter: &TransactionQuery) -> Result<SimilarTransactions> {
        let start = Instant::now();
        filter.validate()?;

        let selected = self.references(ids).await?;
        let mean = Embedding::mean(selected.iter().filter_map(|t| t.embedding.as_ref()));
        let center = match mean {
            Some(center) => center,
            None => {
                debug!(
                    subsystem = "database",
                    component = "similarity",
                    op = "rank",
                    references = selected.len(),
                    "No reference embeddings, skipping ranking"
                );
                return Ok(SimilarTransactions {
                    selected,
                    similar: Vec::new(),
                });
            }
        };

        let mut predicates = predicates_for(filter)?;
        predicates.push(Predicate::ExcludeIds(ids.to_vec()));
        predicates.push(Predicate::HasEmbedding);

        let sql_filter = PredicateBuilder::new(1).with_alias("t").render(&predicates);
        let limit_idx = sql_filter.params.len() + 2;
        let sql = format!(
            "SELECT {CANDIDATE_COLUMNS} FROM transactions t
             WHERE {}
             ORDER BY t.desc_embedding {} $1::vector
             LIMIT ${limit_idx}",
            sql_filter.where_clause(),
            self.distance.operator()
        );

        let query = sqlx::query(&sql).bind(Vector::from(center.into_inner()));
        let rows = bind_params(query, sql_filter.params)
            .bind(filter.effective_limit())
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let similar = rows
            .iter()
            .map(|row| map_row(row, false))
            .collect::<Result<Vec<_>>>()?;

        info!(
            subsystem = "database",
            component = "similarity",
            op = "rank",
            distance = %self.distance,
            references = selected.len(),
            result_count = similar.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Similarity ranking complete"
        );

        Ok(SimilarTransactions { selected, similar })
    }

    async fn references(&self, ids: &IdBatch) -> Result<Vec<Transaction>> {
        let sql = format!(
            "SELECT {COLUMNS_WITH_EMBEDDING} FROM transactions
             WHERE id = ANY($1::bigint[])
             ORDER BY id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        rows.iter().map(|row| map_row(row, true)).collect()
    }
}
