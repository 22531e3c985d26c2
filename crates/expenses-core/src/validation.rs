//! Field validators.
//!
//! Every check on transaction input lives here. Validators are pure: they
//! take a raw value and return either the normalized value or an
//! [`Error::InvalidInput`] naming the offending field.
//!
//! Which fields a call-site validates is spelled out with a
//! [`ValidationScope`] rather than implied by option toggles, so each
//! call-site's contract can be read (and tested) on its own.

use std::collections::BTreeSet;
use std::fmt;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::defaults::{
    DATE_FORMAT, DESCRIPTION_MAX_LEN, MAX_TAGS, SOURCE_MAX_LEN, TAG_MAX_LEN,
};
use crate::error::{Error, Result};
use crate::models::{Embedding, NewTransaction, TagSet, TransactionUpdate};
use crate::query::Operator;

/// Word characters, whitespace, and hyphens (ASCII).
static FILTER_CHARSET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?-u:[\w\s-])+$").expect("charset pattern is valid"));

/// A validated input field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Date,
    Description,
    Amount,
    Source,
    Tags,
    Embedding,
    Operator,
    Ids,
    Batch,
    StartId,
    Limit,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Date => "date",
            Field::Description => "description",
            Field::Amount => "amount",
            Field::Source => "source",
            Field::Tags => "tags",
            Field::Embedding => "embedding",
            Field::Operator => "operator",
            Field::Ids => "ids",
            Field::Batch => "batch",
            Field::StartId => "start_id",
            Field::Limit => "limit",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// SCOPE
// =============================================================================

/// The set of transaction fields a call-site validates.
///
/// Fields outside the scope are ignored entirely, even when populated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationScope {
    fields: BTreeSet<Field>,
}

impl ValidationScope {
    /// Validate exactly the listed fields.
    pub fn only(fields: &[Field]) -> Self {
        Self {
            fields: fields.iter().copied().collect(),
        }
    }

    /// Scope for creating a transaction: every stored field.
    pub fn create() -> Self {
        Self::only(&[
            Field::Date,
            Field::Description,
            Field::Amount,
            Field::Source,
            Field::Tags,
            Field::Embedding,
        ])
    }

    /// Scope for patching a transaction: only the mutable fields.
    pub fn patch() -> Self {
        Self::only(&[Field::Tags, Field::Embedding])
    }

    pub fn contains(&self, field: Field) -> bool {
        self.fields.contains(&field)
    }
}

// =============================================================================
// FIELD VALIDATORS
// =============================================================================

/// Parse an external `yyyy/mm/dd` date.
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| {
        Error::invalid(
            Field::Date,
            format!("invalid date '{}', want format yyyy/mm/dd", raw),
        )
    })
}

fn text_limit(field: Field) -> usize {
    match field {
        Field::Source => SOURCE_MAX_LEN,
        _ => DESCRIPTION_MAX_LEN,
    }
}

/// Check a stored text value (description or source): `0 < len <= limit`.
pub fn validate_text(field: Field, value: &str) -> Result<()> {
    let limit = text_limit(field);
    let len = value.chars().count();
    if len == 0 || len > limit {
        return Err(Error::invalid(
            field,
            format!("invalid length, got {}, want > 0 and <= {}", len, limit),
        ));
    }
    Ok(())
}

/// Check a text value used as a query filter: length within the field
/// limit and characters restricted to word characters, spaces, and hyphens.
pub fn validate_filter_text(field: Field, value: &str) -> Result<()> {
    let limit = text_limit(field);
    let len = value.chars().count();
    if len > limit {
        return Err(Error::invalid(
            field,
            format!("too long, got length {}, want <= {}", len, limit),
        ));
    }
    if len > 0 && !FILTER_CHARSET.is_match(value) {
        return Err(Error::invalid(
            field,
            format!(
                "invalid characters in '{}', only alphanumeric, spaces, underscores and hyphens are allowed",
                value
            ),
        ));
    }
    Ok(())
}

/// Convert `<dollars>[.<cents>]` to a signed number of cents.
///
/// The sign of the dollar portion applies to the cents, so `"-5.25"` is
/// `-525`. A single cents digit is tenths of a dollar: `"5.5"` is `550`.
pub fn parse_amount(raw: &str) -> Result<i64> {
    let invalid = |msg: String| Error::invalid(Field::Amount, msg);

    let mut parts = raw.split('.');
    let dollars = parts.next().unwrap_or_default();
    let cents = parts.next();
    if parts.next().is_some() {
        return Err(invalid(format!(
            "invalid amount '{}', want <dollars>.<cents>",
            raw
        )));
    }

    let d: i64 = dollars.parse().map_err(|e| {
        invalid(format!(
            "invalid dollar portion '{}' in amount '{}', expected base 10 64-bit integer: {}",
            dollars, raw, e
        ))
    })?;

    let c: i64 = match cents {
        None => 0,
        Some(c) if !c.is_empty() && c.len() <= 2 && c.bytes().all(|b| b.is_ascii_digit()) => {
            let v: i64 = c.parse().map_err(|e| {
                invalid(format!(
                    "invalid cents portion '{}' in amount '{}': {}",
                    c, raw, e
                ))
            })?;
            if c.len() == 1 {
                v * 10
            } else {
                v
            }
        }
        Some(c) => {
            return Err(invalid(format!(
                "invalid cents portion '{}' in amount '{}', want one or two digits < 100",
                c, raw
            )))
        }
    };

    let c = if dollars.starts_with('-') { -c } else { c };
    d.checked_mul(100)
        .and_then(|v| v.checked_add(c))
        .ok_or_else(|| invalid(format!("amount '{}' is out of range", raw)))
}

/// Validate a list of tags and collect them into a [`TagSet`].
pub fn validate_tags(tags: &[String]) -> Result<TagSet> {
    if tags.len() > MAX_TAGS {
        return Err(Error::invalid(
            Field::Tags,
            format!(
                "invalid number of tags, got {}, want <= {}",
                tags.len(),
                MAX_TAGS
            ),
        ));
    }
    let mut set = BTreeSet::new();
    for (i, t) in tags.iter().enumerate() {
        let len = t.chars().count();
        if len == 0 || len > TAG_MAX_LEN {
            return Err(Error::invalid(
                Field::Tags,
                format!(
                    "invalid tag at index {}, got size {}, want size > 0 and <= {}",
                    i, len, TAG_MAX_LEN
                ),
            ));
        }
        if !FILTER_CHARSET.is_match(t) {
            return Err(Error::invalid(
                Field::Tags,
                format!(
                    "illegal characters in tag at index {}, got '{}', only alphanumeric, spaces, underscores and hyphens are allowed",
                    i, t
                ),
            ));
        }
        set.insert(t.clone());
    }
    Ok(TagSet::from_validated(set))
}

/// Decode a JSON list of numbers into an [`Embedding`].
pub fn parse_embedding(raw: &str) -> Result<Embedding> {
    let values: Vec<f32> = serde_json::from_str(raw).map_err(|e| {
        Error::invalid(
            Field::Embedding,
            format!("not a valid JSON list of 32-bit floats: {}", e),
        )
    })?;
    Embedding::try_from_vec(values)
}

/// Parse an operator name.
pub fn parse_operator(raw: &str) -> Result<Operator> {
    raw.parse()
}

// =============================================================================
// RAW TRANSACTIONS
// =============================================================================

/// A transaction exactly as it arrives from a transport layer.
///
/// Empty strings and lists mean "not supplied".
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawTransaction {
    pub date: String,
    pub description: String,
    pub amount: String,
    pub source: String,
    pub tags: Vec<String>,
    pub desc_embedding: String,
}

/// Fields of a [`RawTransaction`] that passed validation.
///
/// Each field is `Some` only when it was in scope (and, for the optional
/// fields, supplied).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedTransaction {
    pub date: Option<NaiveDate>,
    pub description: Option<String>,
    pub amount_cents: Option<i64>,
    pub source: Option<String>,
    pub tags: Option<TagSet>,
    pub embedding: Option<Embedding>,
}

impl RawTransaction {
    /// Validate the fields in `scope`, in a fixed order.
    ///
    /// Date, description, amount, and source are required when in scope.
    /// Tags and embedding are optional and only checked when supplied.
    pub fn validate(&self, scope: &ValidationScope) -> Result<ValidatedTransaction> {
        let mut v = ValidatedTransaction::default();
        if scope.contains(Field::Date) {
            v.date = Some(parse_date(&self.date)?);
        }
        if scope.contains(Field::Description) {
            validate_text(Field::Description, &self.description)?;
            v.description = Some(self.description.clone());
        }
        if scope.contains(Field::Amount) {
            v.amount_cents = Some(parse_amount(&self.amount)?);
        }
        if scope.contains(Field::Source) {
            validate_text(Field::Source, &self.source)?;
            v.source = Some(self.source.clone());
        }
        if scope.contains(Field::Tags) && !self.tags.is_empty() {
            v.tags = Some(validate_tags(&self.tags)?);
        }
        if scope.contains(Field::Embedding) && !self.desc_embedding.is_empty() {
            v.embedding = Some(parse_embedding(&self.desc_embedding)?);
        }
        Ok(v)
    }

    /// Validate every field for insertion, in the same order as
    /// [`ValidationScope::create`].
    pub fn into_new_transaction(self) -> Result<NewTransaction> {
        let date = parse_date(&self.date)?;
        validate_text(Field::Description, &self.description)?;
        let amount_cents = parse_amount(&self.amount)?;
        validate_text(Field::Source, &self.source)?;
        let tags = if self.tags.is_empty() {
            TagSet::new()
        } else {
            validate_tags(&self.tags)?
        };
        let embedding = if self.desc_embedding.is_empty() {
            None
        } else {
            Some(parse_embedding(&self.desc_embedding)?)
        };

        Ok(NewTransaction {
            date,
            description: self.description,
            amount_cents,
            source: self.source,
            tags,
            embedding,
        })
    }

    /// Validate for an in-place update with [`ValidationScope::patch`].
    pub fn into_update(self) -> Result<TransactionUpdate> {
        let v = self.validate(&ValidationScope::patch())?;
        Ok(TransactionUpdate {
            tags: v.tags,
            embedding: v.embedding,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::EMBED_DIMENSION;

    fn raw_txn() -> RawTransaction {
        RawTransaction {
            date: "2024/03/15".into(),
            description: "Coffee shop".into(),
            amount: "-4.50".into(),
            source: "visa".into(),
            tags: vec!["food".into()],
            desc_embedding: String::new(),
        }
    }

    fn embedding_json(len: usize) -> String {
        serde_json::to_string(&vec![0.25f32; len]).unwrap()
    }

    #[test]
    fn test_parse_amount_examples() {
        assert_eq!(parse_amount("-5.25").unwrap(), -525);
        assert_eq!(parse_amount("5").unwrap(), 500);
        assert_eq!(parse_amount("5.5").unwrap(), 550);
        assert_eq!(parse_amount("5.05").unwrap(), 505);
        assert_eq!(parse_amount("-0.50").unwrap(), -50);
        assert_eq!(parse_amount("0").unwrap(), 0);
        assert_eq!(parse_amount("+3.10").unwrap(), 310);
    }

    #[test]
    fn test_parse_amount_rejects_malformed() {
        for raw in ["", "abc", "1.2.3", "5.", "5.100", "5.-1", "5.1a", ".5", "5.123"] {
            let err = parse_amount(raw).unwrap_err();
            assert_eq!(err.field(), Some(Field::Amount), "input {:?}", raw);
        }
    }

    #[test]
    fn test_parse_amount_overflow() {
        assert!(parse_amount("92233720368547759").is_err());
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2024/02/29").unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert!(parse_date("2023/02/29").is_err());
        assert!(parse_date("2024-02-01").is_err());
        assert_eq!(parse_date("").unwrap_err().field(), Some(Field::Date));
    }

    #[test]
    fn test_validate_text_length() {
        assert!(validate_text(Field::Description, "a").is_ok());
        assert!(validate_text(Field::Description, &"a".repeat(100)).is_ok());
        assert!(validate_text(Field::Description, &"a".repeat(101)).is_err());
        let err = validate_text(Field::Source, "").unwrap_err();
        assert_eq!(err.field(), Some(Field::Source));
    }

    #[test]
    fn test_validate_filter_text_charset() {
        assert!(validate_filter_text(Field::Description, "whole foods-market 2").is_ok());
        assert!(validate_filter_text(Field::Description, "").is_ok());
        assert!(validate_filter_text(Field::Description, "100%").is_err());
        assert!(validate_filter_text(Field::Source, "a'b").is_err());
        assert!(validate_filter_text(Field::Source, &"a".repeat(101)).is_err());
    }

    #[test]
    fn test_validate_tags_cardinality() {
        let ok: Vec<String> = (0..30).map(|i| format!("t{}", i)).collect();
        assert_eq!(validate_tags(&ok).unwrap().len(), 30);

        let too_many: Vec<String> = (0..31).map(|i| format!("t{}", i)).collect();
        let err = validate_tags(&too_many).unwrap_err();
        assert_eq!(err.field(), Some(Field::Tags));
    }

    #[test]
    fn test_validate_tags_members() {
        assert!(validate_tags(&["eating out".into(), "a_b-c".into()]).is_ok());
        assert!(validate_tags(&["".into()]).is_err());
        assert!(validate_tags(&["elevenchars".into()]).is_err());
        assert!(validate_tags(&["tenchars10".into()]).is_ok());
        assert!(validate_tags(&["a,b".into()]).is_err());
    }

    #[test]
    fn test_parse_embedding() {
        assert_eq!(
            parse_embedding(&embedding_json(EMBED_DIMENSION))
                .unwrap()
                .as_slice()
                .len(),
            EMBED_DIMENSION
        );
        assert!(parse_embedding(&embedding_json(767)).is_err());
        let err = parse_embedding("not json").unwrap_err();
        assert_eq!(err.field(), Some(Field::Embedding));
    }

    #[test]
    fn test_scope_create_validates_everything() {
        let v = raw_txn().validate(&ValidationScope::create()).unwrap();
        assert_eq!(v.amount_cents, Some(-450));
        assert_eq!(v.tags.unwrap().len(), 1);
        assert!(v.embedding.is_none());
    }

    #[test]
    fn test_scope_skips_out_of_scope_fields() {
        let raw = RawTransaction {
            date: "garbage".into(),
            amount: "garbage".into(),
            ..raw_txn()
        };
        let v = raw
            .validate(&ValidationScope::only(&[Field::Description, Field::Source]))
            .unwrap();
        assert!(v.date.is_none());
        assert!(v.amount_cents.is_none());
        assert_eq!(v.description.as_deref(), Some("Coffee shop"));
    }

    #[test]
    fn test_scope_first_failing_field_wins() {
        let raw = RawTransaction {
            description: String::new(),
            amount: "bad".into(),
            ..raw_txn()
        };
        let err = raw.validate(&ValidationScope::create()).unwrap_err();
        assert_eq!(err.field(), Some(Field::Description));
    }

    #[test]
    fn test_into_new_transaction() {
        let raw = RawTransaction {
            desc_embedding: embedding_json(EMBED_DIMENSION),
            ..raw_txn()
        };
        let txn = raw.into_new_transaction().unwrap();
        assert_eq!(txn.date, NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
        assert_eq!(txn.amount_cents, -450);
        assert!(txn.embedding.is_some());
    }

    #[test]
    fn test_into_update_patch_scope() {
        let raw = RawTransaction {
            tags: vec!["rent".into()],
            ..RawTransaction::default()
        };
        let update = raw.into_update().unwrap();
        assert_eq!(update.tags.unwrap().to_vec(), vec!["rent".to_string()]);
        assert!(update.embedding.is_none());

        assert!(RawTransaction::default().into_update().unwrap().is_empty());
    }

    #[test]
    fn test_into_new_transaction_reports_missing_field() {
        let err = RawTransaction {
            source: String::new(),
            ..raw_txn()
        }
        .into_new_transaction()
        .unwrap_err();
        assert_eq!(err.field(), Some(Field::Source));

        let err = RawTransaction {
            description: String::new(),
            source: String::new(),
            ..raw_txn()
        }
        .into_new_transaction()
        .unwrap_err();
        assert_eq!(err.field(), Some(Field::Description));

        let err = RawTransaction {
            amount: String::new(),
            ..raw_txn()
        }
        .into_new_transaction()
        .unwrap_err();
        assert_eq!(err.field(), Some(Field::Amount));
    }
}
