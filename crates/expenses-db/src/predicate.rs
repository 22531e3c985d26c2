//! Predicate builder for transaction filters.
//!
//! A [`TransactionQuery`] is first lowered into typed [`Predicate`]s, then a
//! [`PredicateBuilder`] renders them into SQL clause fragments with
//! positional placeholders and a parameter list in placeholder order.
//! User values are never interpolated into SQL text.

use chrono::NaiveDate;
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::Query;

use expenses_core::{Error, Field, Operator, Result, TransactionId, TransactionQuery};

use crate::escape_like;

/// Type-safe parameter binding for SQL queries.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    /// 64-bit integer (ids, cents).
    Int64(i64),
    /// Array of 64-bit integers (for ANY/ALL operations).
    Int64Array(Vec<i64>),
    /// Calendar date.
    Date(NaiveDate),
    /// String parameter.
    String(String),
    /// Array of strings (tag sets).
    StringArray(Vec<String>),
}

/// Free-text columns that support substring matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextColumn {
    Description,
    Source,
}

impl TextColumn {
    fn as_str(&self) -> &'static str {
        match self {
            TextColumn::Description => "description",
            TextColumn::Source => "source",
        }
    }
}

/// A single typed condition on the transactions table.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `id >= start_id`.
    MinId(TransactionId),
    /// `date >= from` (inclusive).
    DateFrom(NaiveDate),
    /// `date <= to` (inclusive).
    DateTo(NaiveDate),
    /// Case-insensitive substring match, optionally negated.
    TextContains {
        column: TextColumn,
        value: String,
        negated: bool,
    },
    /// Exact amount.
    AmountEquals(i64),
    /// Amount at most the given cents (debits when 0).
    AmountAtMost(i64),
    /// Stored tags are a superset of the given tags.
    TagsContain(Vec<String>),
    /// Stored tags are absent or share nothing with the given tags.
    TagsDisjoint(Vec<String>),
    /// Stored tags are null or empty.
    TagsEmpty,
    /// Row id is not one of the given ids.
    ExcludeIds(Vec<TransactionId>),
    /// Row has a description embedding.
    HasEmbedding,
}

/// Lower a query into predicates.
///
/// Clause order is fixed: id bound, dates, description, source, amount,
/// tags. An empty text value applies no constraint. Fails with
/// [`Error::UnsupportedOperator`] when `empty` is used on a text field.
pub fn predicates_for(query: &TransactionQuery) -> Result<Vec<Predicate>> {
    let mut predicates = vec![Predicate::MinId(query.start_id)];

    if let Some(from) = query.from_date {
        predicates.push(Predicate::DateFrom(from));
    }
    if let Some(to) = query.to_date {
        predicates.push(Predicate::DateTo(to));
    }

    let text_filters = [
        (TextColumn::Description, Field::Description, &query.description),
        (TextColumn::Source, Field::Source, &query.source),
    ];
    for (column, field, filter) in text_filters {
        let Some(filter) = filter else { continue };
        if filter.value.is_empty() {
            continue;
        }
        let negated = match filter.op {
            Operator::Match => false,
            Operator::NotMatch => true,
            Operator::Empty => {
                return Err(Error::UnsupportedOperator {
                    field,
                    op: filter.op,
                })
            }
        };
        predicates.push(Predicate::TextContains {
            column,
            value: filter.value.clone(),
            negated,
        });
    }

    if let Some(cents) = query.amount_cents {
        predicates.push(Predicate::AmountEquals(cents));
    }

    if let Some(ref filter) = query.tags {
        match filter.op {
            Operator::Match if filter.tags.is_empty() => {}
            Operator::Match => predicates.push(Predicate::TagsContain(filter.tags.to_vec())),
            Operator::NotMatch if filter.tags.is_empty() => {}
            Operator::NotMatch => predicates.push(Predicate::TagsDisjoint(filter.tags.to_vec())),
            Operator::Empty if filter.tags.is_empty() => predicates.push(Predicate::TagsEmpty),
            Operator::Empty => {
                return Err(Error::invalid(
                    Field::Tags,
                    "tags can't be specified with the empty operator",
                ))
            }
        }
    }

    Ok(predicates)
}

/// Rendered WHERE clause fragments plus their parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSql {
    pub clauses: Vec<String>,
    pub params: Vec<QueryParam>,
}

impl FilterSql {
    /// Clauses joined with `AND`, or `TRUE` when there are none.
    pub fn where_clause(&self) -> String {
        if self.clauses.is_empty() {
            "TRUE".to_string()
        } else {
            self.clauses.join(" AND ")
        }
    }
}

/// Renders predicates into parameterized SQL.
///
/// # Example
///
/// ```rust,ignore
/// let filter = PredicateBuilder::new(1)
///     .with_alias("t")
///     .render(&[Predicate::MinId(5), Predicate::TagsEmpty]);
/// // filter.where_clause(): "t.id >= $2 AND (t.tags IS NULL OR cardinality(t.tags) = 0)"
/// // filter.params: [QueryParam::Int64(5)]
/// ```
#[derive(Debug, Clone, Default)]
pub struct PredicateBuilder {
    param_offset: usize,
    prefix: String,
}

impl PredicateBuilder {
    /// `param_offset` is the number of placeholders already used by the
    /// enclosing statement.
    pub fn new(param_offset: usize) -> Self {
        Self {
            param_offset,
            prefix: String::new(),
        }
    }

    /// Qualify every column with `alias.`.
    pub fn with_alias(mut self, alias: &str) -> Self {
        self.prefix = format!("{}.", alias);
        self
    }

    pub fn render(&self, predicates: &[Predicate]) -> FilterSql {
        let mut out = FilterSql::default();
        for predicate in predicates {
            let clause = self.render_one(predicate, &mut out.params);
            out.clauses.push(clause);
        }
        out
    }

    fn render_one(&self, predicate: &Predicate, params: &mut Vec<QueryParam>) -> String {
        let p = &self.prefix;
        let mut next = |param: QueryParam| {
            params.push(param);
            self.param_offset + params.len()
        };

        match predicate {
            Predicate::MinId(id) => format!("{p}id >= ${}", next(QueryParam::Int64(*id))),
            Predicate::DateFrom(d) => format!("{p}date >= ${}", next(QueryParam::Date(*d))),
            Predicate::DateTo(d) => format!("{p}date <= ${}", next(QueryParam::Date(*d))),
            Predicate::TextContains {
                column,
                value,
                negated,
            } => {
                let idx = next(QueryParam::String(escape_like(value)));
                let not = if *negated { "NOT " } else { "" };
                format!(
                    "{p}{} {not}ILIKE '%' || ${idx} || '%' ESCAPE '\\'",
                    column.as_str()
                )
            }
            Predicate::AmountEquals(c) => {
                format!("{p}amount_cents = ${}", next(QueryParam::Int64(*c)))
            }
            Predicate::AmountAtMost(c) => {
                format!("{p}amount_cents <= ${}", next(QueryParam::Int64(*c)))
            }
            Predicate::TagsContain(tags) => {
                let idx = next(QueryParam::StringArray(tags.clone()));
                format!("{p}tags @> ${idx}::text[]")
            }
            Predicate::TagsDisjoint(tags) => {
                let idx = next(QueryParam::StringArray(tags.clone()));
                format!(
                    "({p}tags IS NULL OR cardinality({p}tags) = 0 OR NOT ({p}tags && ${idx}::text[]))"
                )
            }
            Predicate::TagsEmpty => format!("({p}tags IS NULL OR cardinality({p}tags) = 0)"),
            Predicate::ExcludeIds(ids) => {
                let idx = next(QueryParam::Int64Array(ids.clone()));
                format!("{p}id <> ALL(${idx}::bigint[])")
            }
            Predicate::HasEmbedding => format!("{p}desc_embedding IS NOT NULL"),
        }
    }
}

/// Bind parameters onto a query in placeholder order.
pub fn bind_params<'q>(
    mut q: Query<'q, Postgres, PgArguments>,
    params: Vec<QueryParam>,
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        q = match param {
            QueryParam::Int64(v) => q.bind(v),
            QueryParam::Int64Array(v) => q.bind(v),
            QueryParam::Date(v) => q.bind(v),
            QueryParam::String(v) => q.bind(v),
            QueryParam::StringArray(v) => q.bind(v),
        };
    }
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use expenses_core::TagSet;

    fn tags(values: &[&str]) -> TagSet {
        TagSet::try_new(values.iter().copied()).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_empty_query_only_bounds_id() {
        let predicates = predicates_for(&TransactionQuery::new()).unwrap();
        assert_eq!(predicates, vec![Predicate::MinId(0)]);

        let sql = PredicateBuilder::new(0).render(&predicates);
        assert_eq!(sql.where_clause(), "id >= $1");
        assert_eq!(sql.params, vec![QueryParam::Int64(0)]);
    }

    #[test]
    fn test_no_predicates_renders_true() {
        assert_eq!(PredicateBuilder::new(0).render(&[]).where_clause(), "TRUE");
    }

    #[test]
    fn test_full_query_order_and_alignment() {
        let query = TransactionQuery::new()
            .from_date(date(2024, 1, 1))
            .to_date(date(2024, 12, 31))
            .description(Operator::Match, "coffee")
            .source(Operator::NotMatch, "amex")
            .amount_cents(-525)
            .tags(Operator::Match, tags(&["food"]))
            .start_id(10);

        let sql = PredicateBuilder::new(0).render(&predicates_for(&query).unwrap());
        assert_eq!(
            sql.clauses,
            vec![
                "id >= $1",
                "date >= $2",
                "date <= $3",
                "description ILIKE '%' || $4 || '%' ESCAPE '\\'",
                "source NOT ILIKE '%' || $5 || '%' ESCAPE '\\'",
                "amount_cents = $6",
                "tags @> $7::text[]",
            ]
        );
        assert_eq!(
            sql.params,
            vec![
                QueryParam::Int64(10),
                QueryParam::Date(date(2024, 1, 1)),
                QueryParam::Date(date(2024, 12, 31)),
                QueryParam::String("coffee".into()),
                QueryParam::String("amex".into()),
                QueryParam::Int64(-525),
                QueryParam::StringArray(vec!["food".into()]),
            ]
        );
    }

    #[test]
    fn test_offset_and_alias() {
        let sql = PredicateBuilder::new(1).with_alias("t").render(&[
            Predicate::MinId(5),
            Predicate::ExcludeIds(vec![1, 2]),
            Predicate::HasEmbedding,
            Predicate::TagsEmpty,
        ]);
        assert_eq!(
            sql.where_clause(),
            "t.id >= $2 AND t.id <> ALL($3::bigint[]) AND t.desc_embedding IS NOT NULL \
             AND (t.tags IS NULL OR cardinality(t.tags) = 0)"
        );
        assert_eq!(sql.params.len(), 2);
    }

    #[test]
    fn test_text_filter_escapes_wildcards() {
        let query = TransactionQuery::new().description(Operator::Match, "50_off");
        let sql = PredicateBuilder::new(0).render(&predicates_for(&query).unwrap());
        assert_eq!(sql.params[1], QueryParam::String("50\\_off".into()));
    }

    #[test]
    fn test_empty_text_value_is_no_filter() {
        for op in [Operator::Match, Operator::NotMatch] {
            let query = TransactionQuery::new()
                .description(op, "")
                .source(op, "");
            assert_eq!(
                predicates_for(&query).unwrap(),
                vec![Predicate::MinId(0)],
                "operator {:?}",
                op
            );
        }
    }

    #[test]
    fn test_empty_operator_on_text_is_unsupported() {
        let query = TransactionQuery::new().source(Operator::Empty, "x");
        match predicates_for(&query) {
            Err(Error::UnsupportedOperator { field, op }) => {
                assert_eq!(field, Field::Source);
                assert_eq!(op, Operator::Empty);
            }
            other => panic!("expected UnsupportedOperator, got {:?}", other),
        }
    }

    #[test]
    fn test_tag_operators() {
        let not_match = TransactionQuery::new().tags(Operator::NotMatch, tags(&["food", "rent"]));
        let sql = PredicateBuilder::new(0).render(&predicates_for(&not_match).unwrap());
        assert_eq!(
            sql.clauses[1],
            "(tags IS NULL OR cardinality(tags) = 0 OR NOT (tags && $2::text[]))"
        );
        assert_eq!(
            sql.params[1],
            QueryParam::StringArray(vec!["food".into(), "rent".into()])
        );

        let empty = TransactionQuery::new().tags(Operator::Empty, TagSet::new());
        assert_eq!(
            predicates_for(&empty).unwrap(),
            vec![Predicate::MinId(0), Predicate::TagsEmpty]
        );

        let unconstrained = TransactionQuery::new().tags(Operator::Match, TagSet::new());
        assert_eq!(
            predicates_for(&unconstrained).unwrap(),
            vec![Predicate::MinId(0)]
        );
    }

    #[test]
    fn test_empty_operator_with_tags_rejected() {
        let query = TransactionQuery::new().tags(Operator::Empty, tags(&["x"]));
        assert!(matches!(
            predicates_for(&query),
            Err(Error::InvalidInput {
                field: Field::Tags,
                ..
            })
        ));
    }
}
