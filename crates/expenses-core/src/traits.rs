//! Repository traits for the transaction store.
//!
//! The storage crate implements these against PostgreSQL; callers depend
//! only on the trait so an alternate backend can be swapped in.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    Embedding, IdBatch, NewTransaction, OverviewQuery, SimilarTransactions, TagMutation,
    Transaction, TransactionId, TransactionUpdate, YearlyTagTotal,
};
use crate::query::TransactionQuery;

/// Repository for transaction records.
///
/// Every call is independent and shares no in-process state. Dropping a
/// returned future cancels the in-flight store call; batch mutations that
/// have not committed are rolled back.
#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Insert a transaction and return its store-assigned id.
    async fn create(&self, txn: NewTransaction) -> Result<TransactionId>;

    /// Fetch one transaction, including its embedding.
    async fn get(&self, id: TransactionId) -> Result<Option<Transaction>>;

    /// List transactions matching `query`, ascending by id.
    async fn query(&self, query: &TransactionQuery) -> Result<Vec<Transaction>>;

    /// Apply a tag change to every id in the batch, atomically.
    ///
    /// Returns the number of rows updated, which always equals the batch
    /// size; any shortfall rolls back and fails with `PartialFailure`.
    /// An add or remove with no tags fails with `NoOp` before touching
    /// the store.
    async fn mutate_tags(&self, ids: &IdBatch, mutation: TagMutation) -> Result<u64>;

    /// Replace the embedding of a single transaction.
    async fn set_embedding(&self, ids: &IdBatch, embedding: Embedding) -> Result<()>;

    /// Apply a partial update to every id in the batch, atomically.
    async fn update(&self, ids: &IdBatch, update: TransactionUpdate) -> Result<u64>;

    /// Rank transactions by similarity to the mean embedding of `ids`.
    ///
    /// `filter` narrows the candidate pool only; the reference rows are
    /// always returned in `selected`.
    async fn similar(
        &self,
        ids: &IdBatch,
        filter: &TransactionQuery,
    ) -> Result<SimilarTransactions>;

    /// Per-year, per-tag debit totals, newest year first.
    async fn yearly_overview(&self, query: OverviewQuery) -> Result<Vec<YearlyTagTotal>>;
}
