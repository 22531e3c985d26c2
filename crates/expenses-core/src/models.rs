//! Core data models for the expenses transaction store.
//!
//! These types are shared across all expenses crates and represent the
//! domain entities and mutation payloads.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::defaults::{EMBED_DIMENSION, MAX_BATCH_IDS};
use crate::error::{Error, Result};
use crate::validation::{validate_tags, Field};

/// Store-assigned transaction identifier.
pub type TransactionId = i64;

// =============================================================================
// TRANSACTION
// =============================================================================

/// A stored financial transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub date: NaiveDate,
    pub description: String,
    /// Signed amount in cents; negative values are debits.
    pub amount_cents: i64,
    pub source: String,
    /// Tags in stored order. Empty when the column is NULL.
    pub tags: Vec<String>,
    /// Only loaded by point lookups and similarity reference fetches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Embedding>,
}

/// A validated transaction ready for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub date: NaiveDate,
    pub description: String,
    pub amount_cents: i64,
    pub source: String,
    pub tags: TagSet,
    pub embedding: Option<Embedding>,
}

// =============================================================================
// TAG SET
// =============================================================================

/// A validated set of tags.
///
/// Backed by a sorted set so equality and containment never depend on the
/// order a caller supplied. Converted to the store's array type only at the
/// persistence edge via [`TagSet::to_vec`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TagSet(BTreeSet<String>);

impl TagSet {
    /// The empty tag set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and collect tags. Duplicates collapse into one member.
    pub fn try_new<I, S>(tags: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tags: Vec<String> = tags.into_iter().map(Into::into).collect();
        validate_tags(&tags)
    }

    pub(crate) fn from_validated(tags: BTreeSet<String>) -> Self {
        Self(tags)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// True when every member of `other` is also in `self`.
    pub fn is_superset(&self, other: &TagSet) -> bool {
        self.0.is_superset(&other.0)
    }

    /// True when the two sets share at least one member.
    pub fn intersects(&self, other: &TagSet) -> bool {
        !self.0.is_disjoint(&other.0)
    }

    /// Sorted members, for binding as a `text[]` parameter.
    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

// =============================================================================
// EMBEDDING
// =============================================================================

/// A description embedding of exactly [`EMBED_DIMENSION`] finite components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>", into = "Vec<f32>")]
pub struct Embedding(Vec<f32>);

impl Embedding {
    /// Wrap a vector, enforcing dimension and finiteness.
    pub fn try_from_vec(values: Vec<f32>) -> Result<Self> {
        if values.len() != EMBED_DIMENSION {
            return Err(Error::invalid(
                Field::Embedding,
                format!(
                    "vector had invalid length, got {}, want {}",
                    values.len(),
                    EMBED_DIMENSION
                ),
            ));
        }
        if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
            return Err(Error::invalid(
                Field::Embedding,
                format!("component {} is not a finite number", pos),
            ));
        }
        Ok(Self(values))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }

    /// Component-wise mean of the given embeddings.
    ///
    /// Returns `None` when the iterator is empty.
    pub fn mean<'a, I>(embeddings: I) -> Option<Embedding>
    where
        I: IntoIterator<Item = &'a Embedding>,
    {
        let mut sum = vec![0f64; EMBED_DIMENSION];
        let mut count = 0usize;
        for e in embeddings {
            for (acc, v) in sum.iter_mut().zip(e.0.iter()) {
                *acc += f64::from(*v);
            }
            count += 1;
        }
        if count == 0 {
            return None;
        }
        let n = count as f64;
        Some(Embedding(sum.into_iter().map(|s| (s / n) as f32).collect()))
    }
}

impl TryFrom<Vec<f32>> for Embedding {
    type Error = Error;

    fn try_from(values: Vec<f32>) -> Result<Self> {
        Self::try_from_vec(values)
    }
}

impl From<Embedding> for Vec<f32> {
    fn from(e: Embedding) -> Self {
        e.0
    }
}

// =============================================================================
// ID BATCHES
// =============================================================================

/// A non-empty, bounded, duplicate-free set of transaction ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdBatch(BTreeSet<TransactionId>);

impl IdBatch {
    /// Validate a list of ids: 1..=[`MAX_BATCH_IDS`] entries, each `>= 0`.
    pub fn new<I>(ids: I) -> Result<Self>
    where
        I: IntoIterator<Item = TransactionId>,
    {
        let mut set = BTreeSet::new();
        let mut given = 0usize;
        for id in ids {
            given += 1;
            if id < 0 {
                return Err(Error::invalid(
                    Field::Ids,
                    format!("'{}' is not a valid transaction ID, want >= 0", id),
                ));
            }
            set.insert(id);
        }
        if given == 0 || given > MAX_BATCH_IDS {
            return Err(Error::invalid(
                Field::Ids,
                format!(
                    "invalid number of ids, got {}, want > 0 and <= {}",
                    given, MAX_BATCH_IDS
                ),
            ));
        }
        Ok(Self(set))
    }

    /// Parse a whitespace-separated list of base-10 ids.
    pub fn parse(raw: &str) -> Result<Self> {
        let ids = raw
            .split_whitespace()
            .map(|s| {
                s.parse::<TransactionId>().map_err(|e| {
                    Error::invalid(
                        Field::Ids,
                        format!(
                            "'{}' is not a valid transaction ID, expecting a base 10 64-bit integer: {}",
                            s, e
                        ),
                    )
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(ids)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, id: TransactionId) -> bool {
        self.0.contains(&id)
    }

    /// The single id of a one-element batch.
    pub fn single(&self) -> Option<TransactionId> {
        if self.0.len() == 1 {
            self.0.iter().next().copied()
        } else {
            None
        }
    }

    /// Ascending ids, for binding as a `bigint[]` parameter.
    pub fn to_vec(&self) -> Vec<TransactionId> {
        self.0.iter().copied().collect()
    }
}

// =============================================================================
// MUTATIONS
// =============================================================================

/// A tag change applied to every transaction in a batch.
#[derive(Debug, Clone, PartialEq)]
pub enum TagMutation {
    /// Set union with the stored tags.
    Add(TagSet),
    /// Set difference from the stored tags.
    Remove(TagSet),
    /// Overwrite the stored tags; an empty set clears them.
    Replace(TagSet),
}

impl TagMutation {
    /// Build a mutation from a raw op name (`add|remove|clear|replace`).
    pub fn parse(op: &str, tags: TagSet) -> Result<Self> {
        match op {
            "add" | "remove" if tags.is_empty() => Err(Error::invalid(
                Field::Tags,
                format!("op '{}' requires at least one tag", op),
            )),
            "add" => Ok(TagMutation::Add(tags)),
            "remove" => Ok(TagMutation::Remove(tags)),
            "clear" if !tags.is_empty() => Err(Error::invalid(
                Field::Tags,
                "tags can't be specified when op is clear",
            )),
            "clear" => Ok(TagMutation::Replace(TagSet::new())),
            "replace" => Ok(TagMutation::Replace(tags)),
            other => Err(Error::invalid(
                Field::Operator,
                format!(
                    "unknown op '{}', supported ops are add|remove|clear|replace",
                    other
                ),
            )),
        }
    }

    /// Operation name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            TagMutation::Add(_) => "add_tags",
            TagMutation::Remove(_) => "remove_tags",
            TagMutation::Replace(_) => "replace_tags",
        }
    }
}

/// In-place field updates applied to a batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionUpdate {
    /// Replacement tag set.
    pub tags: Option<TagSet>,
    /// Replacement embedding; only valid for a single-id batch.
    pub embedding: Option<Embedding>,
}

impl TransactionUpdate {
    pub fn is_empty(&self) -> bool {
        self.tags.is_none() && self.embedding.is_none()
    }
}

// =============================================================================
// RESULTS
// =============================================================================

/// Partitioned result of a similarity query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimilarTransactions {
    /// The reference rows, in store order.
    pub selected: Vec<Transaction>,
    /// Candidates ranked by ascending distance to the reference mean.
    pub similar: Vec<Transaction>,
}

/// Bounds for the yearly spending overview.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverviewQuery {
    pub from_year: Option<i32>,
    pub to_year: Option<i32>,
}

/// Total debit spending for one tag in one calendar year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearlyTagTotal {
    pub year: i32,
    pub tag: String,
    /// Absolute total in cents.
    pub amount_cents: i64,
}
