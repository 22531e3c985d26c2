//! Query specification for listing and filtering transactions.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::defaults::{DEFAULT_QUERY_LIMIT, MAX_QUERY_LIMIT};
use crate::error::{Error, Result};
use crate::models::{TagSet, TransactionId};
use crate::validation::{
    parse_amount, parse_date, parse_operator, validate_filter_text, validate_tags, Field,
};

/// How a filter value is compared against a stored field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operator {
    /// Case-insensitive substring for text; superset containment for tags.
    Match,
    /// Negation of [`Operator::Match`].
    NotMatch,
    /// No tags present. Tags only.
    Empty,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Match => "match",
            Operator::NotMatch => "not-match",
            Operator::Empty => "empty",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "match" => Ok(Operator::Match),
            "not-match" => Ok(Operator::NotMatch),
            "empty" => Ok(Operator::Empty),
            other => Err(Error::invalid(
                Field::Operator,
                format!("got '{}', must be one of match|not-match|empty", other),
            )),
        }
    }
}

/// Filter on a free-text column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFilter {
    pub value: String,
    pub op: Operator,
}

/// Filter on the tag column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagFilter {
    pub tags: TagSet,
    pub op: Operator,
}

/// A validated query specification.
///
/// Every field is optional; an unset field places no constraint on results.
/// Build one with the chained setters or from transport strings via
/// [`RawTransactionQuery::validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionQuery {
    /// Inclusive lower date bound.
    pub from_date: Option<NaiveDate>,
    /// Inclusive upper date bound.
    pub to_date: Option<NaiveDate>,
    pub description: Option<TextFilter>,
    pub source: Option<TextFilter>,
    pub tags: Option<TagFilter>,
    pub amount_cents: Option<i64>,
    /// Inclusive lower id bound.
    pub start_id: TransactionId,
    /// Page size; `0` means [`DEFAULT_QUERY_LIMIT`].
    pub limit: i64,
}

impl TransactionQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_date(mut self, date: NaiveDate) -> Self {
        self.from_date = Some(date);
        self
    }

    pub fn to_date(mut self, date: NaiveDate) -> Self {
        self.to_date = Some(date);
        self
    }

    pub fn description(mut self, op: Operator, value: impl Into<String>) -> Self {
        self.description = Some(TextFilter {
            value: value.into(),
            op,
        });
        self
    }

    pub fn source(mut self, op: Operator, value: impl Into<String>) -> Self {
        self.source = Some(TextFilter {
            value: value.into(),
            op,
        });
        self
    }

    pub fn tags(mut self, op: Operator, tags: TagSet) -> Self {
        self.tags = Some(TagFilter { tags, op });
        self
    }

    pub fn amount_cents(mut self, cents: i64) -> Self {
        self.amount_cents = Some(cents);
        self
    }

    pub fn start_id(mut self, id: TransactionId) -> Self {
        self.start_id = id;
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    /// Page size actually applied.
    pub fn effective_limit(&self) -> i64 {
        if self.limit == 0 {
            DEFAULT_QUERY_LIMIT
        } else {
            self.limit
        }
    }

    /// Check pagination bounds and filter values.
    ///
    /// Operator/field pairings are left to the predicate builder, which
    /// reports them as [`Error::UnsupportedOperator`].
    pub fn validate(&self) -> Result<()> {
        if self.start_id < 0 {
            return Err(Error::invalid(
                Field::StartId,
                format!("got {}, want >= 0", self.start_id),
            ));
        }
        if self.limit < 0 || self.limit > MAX_QUERY_LIMIT {
            return Err(Error::invalid(
                Field::Limit,
                format!("got {}, want >= 0 and <= {}", self.limit, MAX_QUERY_LIMIT),
            ));
        }
        if let Some(ref f) = self.description {
            validate_filter_text(Field::Description, &f.value)?;
        }
        if let Some(ref f) = self.source {
            validate_filter_text(Field::Source, &f.value)?;
        }
        if let Some(ref f) = self.tags {
            if f.op == Operator::Empty && !f.tags.is_empty() {
                return Err(Error::invalid(
                    Field::Tags,
                    "tags can't be specified with the empty operator",
                ));
            }
        }
        Ok(())
    }
}

/// Query parameters exactly as they arrive from a transport layer.
///
/// Empty strings mean "not supplied". Dates use `yyyy/mm/dd`, tags are
/// space-separated, and amounts use `<dollars>[.<cents>]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawTransactionQuery {
    pub from_date: String,
    pub to_date: String,
    pub description: String,
    pub description_op: String,
    pub source: String,
    pub source_op: String,
    pub tags: String,
    pub tags_op: String,
    pub amount: String,
    pub start_id: String,
    pub limit: String,
}

impl RawTransactionQuery {
    /// Validate every supplied parameter and build a [`TransactionQuery`].
    ///
    /// Parameters are checked in a fixed order so the first failing field
    /// is always the one reported.
    pub fn validate(&self) -> Result<TransactionQuery> {
        let mut q = TransactionQuery::new();

        if !self.from_date.is_empty() {
            q.from_date = Some(parse_date(&self.from_date)?);
        }
        if !self.to_date.is_empty() {
            q.to_date = Some(parse_date(&self.to_date)?);
        }
        if !self.description.is_empty() {
            validate_filter_text(Field::Description, &self.description)?;
            q.description = Some(TextFilter {
                value: self.description.clone(),
                op: optional_operator(&self.description_op)?,
            });
        }
        if !self.source.is_empty() {
            validate_filter_text(Field::Source, &self.source)?;
            q.source = Some(TextFilter {
                value: self.source.clone(),
                op: optional_operator(&self.source_op)?,
            });
        }
        let tags: Vec<String> = self.tags.split_whitespace().map(String::from).collect();
        if !tags.is_empty() || !self.tags_op.is_empty() {
            let op = optional_operator(&self.tags_op)?;
            let tags = validate_tags(&tags)?;
            // `match` without tags is the same as no tag filter at all.
            if !(op == Operator::Match && tags.is_empty()) {
                q.tags = Some(TagFilter { tags, op });
            }
        }
        if !self.amount.is_empty() {
            q.amount_cents = Some(parse_amount(&self.amount)?);
        }
        if !self.start_id.is_empty() {
            q.start_id = self.start_id.parse().map_err(|_| {
                Error::invalid(
                    Field::StartId,
                    format!("got '{}', want number >= 0", self.start_id),
                )
            })?;
        }
        if !self.limit.is_empty() {
            q.limit = self.limit.parse().map_err(|_| {
                Error::invalid(
                    Field::Limit,
                    format!(
                        "got '{}', want number >= 0 and <= {}",
                        self.limit, MAX_QUERY_LIMIT
                    ),
                )
            })?;
        }

        q.validate()?;
        Ok(q)
    }
}

fn optional_operator(raw: &str) -> Result<Operator> {
    if raw.is_empty() {
        Ok(Operator::Match)
    } else {
        parse_operator(raw)
    }
}
