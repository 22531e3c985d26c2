//! Yearly spending totals by tag.

use std::time::Instant;

use chrono::NaiveDate;
use sqlx::{Pool, Postgres, Row};
use tracing::info;

use expenses_core::defaults::TRANSFER_TAG;
use expenses_core::{Error, Field, OverviewQuery, Result, YearlyTagTotal};

use crate::predicate::{bind_params, Predicate, PredicateBuilder};

/// Aggregates debit transactions per calendar year and tag.
#[derive(Clone)]
pub struct PgSpendingOverview {
    pool: Pool<Postgres>,
}

/// Predicates selecting debits in the requested year range, excluding
/// transfers between accounts.
pub fn overview_predicates(query: OverviewQuery) -> Result<Vec<Predicate>> {
    if let (Some(from), Some(to)) = (query.from_year, query.to_year) {
        if from > to {
            return Err(Error::invalid(
                Field::Date,
                format!("from year {} is after to year {}", from, to),
            ));
        }
    }

    let mut predicates = vec![
        Predicate::AmountAtMost(0),
        Predicate::TagsDisjoint(vec![TRANSFER_TAG.to_string()]),
    ];
    if let Some(year) = query.from_year {
        predicates.push(Predicate::DateFrom(year_bound(year, 1, 1)?));
    }
    if let Some(year) = query.to_year {
        predicates.push(Predicate::DateTo(year_bound(year, 12, 31)?));
    }
    Ok(predicates)
}

fn year_bound(year: i32, month: u32, day: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| Error::invalid(Field::Date, format!("year {} is out of range", year)))
}

impl PgSpendingOverview {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Totals per `(year, tag)`, newest year first then tag ascending.
    ///
    /// A transaction with several tags counts toward each of them. Amounts
    /// are absolute cents.
    pub async fn yearly(&self, query: OverviewQuery) -> Result<Vec<YearlyTagTotal>> {
        let start = Instant::now();
        let filter = PredicateBuilder::new(0)
            .with_alias("t")
            .render(&overview_predicates(query)?);
        let sql = format!(
            "SELECT EXTRACT(YEAR FROM t.date)::int AS year,
                    u.tag AS tag,
                    SUM(ABS(t.amount_cents))::bigint AS amount_cents
             FROM transactions t
             CROSS JOIN LATERAL unnest(t.tags) AS u(tag)
             WHERE {}
             GROUP BY year, u.tag
             ORDER BY year DESC, u.tag ASC",
            filter.where_clause()
        );

        let rows = bind_params(sqlx::query(&sql), filter.params)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let totals: Vec<YearlyTagTotal> = rows
            .into_iter()
            .map(|row| YearlyTagTotal {
                year: row.get("year"),
                tag: row.get("tag"),
                amount_cents: row.get("amount_cents"),
            })
            .collect();

        info!(
            subsystem = "database",
            component = "overview",
            op = "yearly",
            result_count = totals.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Spending overview complete"
        );
        Ok(totals)
    }
}
