//! Projection of stored rows into their external representation.
//!
//! Amounts become `<dollars>.<cc>` strings, dates become `yyyy/mm/dd`, and
//! ids become strings. A page carries a synthetic `next_id` cursor so
//! callers can paginate forward without a count query.

use serde::Serialize;

use crate::defaults::DATE_FORMAT;
use crate::models::{SimilarTransactions, Transaction, TransactionId, YearlyTagTotal};

/// Render cents as a dollar string.
///
/// The sign lives only on the dollar portion and the cents are always two
/// non-negative digits: `-525` renders as `"-5.25"`, `-50` as `"-0.50"`.
pub fn format_amount(amount_cents: i64) -> String {
    let sign = if amount_cents < 0 { "-" } else { "" };
    let abs = amount_cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Forward pagination cursor: one past the largest id seen.
///
/// `None` for an empty page, or when the largest id is `i64::MAX` and no
/// later id can exist.
pub fn next_id(transactions: &[Transaction]) -> Option<TransactionId> {
    transactions
        .iter()
        .map(|t| t.id)
        .max()
        .and_then(|id| id.checked_add(1))
}

/// External representation of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionView {
    pub id: String,
    pub date: String,
    pub description: String,
    pub amount: String,
    pub source: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl From<&Transaction> for TransactionView {
    fn from(t: &Transaction) -> Self {
        Self {
            id: t.id.to_string(),
            date: t.date.format(DATE_FORMAT).to_string(),
            description: t.description.clone(),
            amount: format_amount(t.amount_cents),
            source: t.source.clone(),
            tags: t.tags.clone(),
        }
    }
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionPage {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub txns: Vec<TransactionView>,
    #[serde(rename = "nextId", skip_serializing_if = "Option::is_none")]
    pub next_id: Option<String>,
}

impl TransactionPage {
    pub fn from_transactions(transactions: &[Transaction]) -> Self {
        Self {
            txns: transactions.iter().map(TransactionView::from).collect(),
            next_id: next_id(transactions).map(|id| id.to_string()),
        }
    }
}

/// External representation of a similarity result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimilarView {
    #[serde(rename = "selected_txns", skip_serializing_if = "Vec::is_empty")]
    pub selected: Vec<TransactionView>,
    #[serde(rename = "similar_txns", skip_serializing_if = "Vec::is_empty")]
    pub similar: Vec<TransactionView>,
}

impl From<&SimilarTransactions> for SimilarView {
    fn from(s: &SimilarTransactions) -> Self {
        Self {
            selected: s.selected.iter().map(TransactionView::from).collect(),
            similar: s.similar.iter().map(TransactionView::from).collect(),
        }
    }
}

/// External representation of a yearly spending total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearlyTagTotalView {
    pub year: i32,
    pub tag: String,
    pub amount: String,
}

impl From<&YearlyTagTotal> for YearlyTagTotalView {
    fn from(t: &YearlyTagTotal) -> Self {
        Self {
            year: t.year,
            tag: t.tag.clone(),
            amount: format_amount(t.amount_cents),
        }
    }
}
