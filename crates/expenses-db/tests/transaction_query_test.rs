//! Integration tests for creating, fetching, and filtering transactions.
//!
//! Require PostgreSQL with pgvector at `DATABASE_URL`; run with
//! `cargo test -p expenses-db -- --ignored`.

use expenses_db::test_fixtures::{TestDatabase, TransactionBuilder};
use expenses_db::{
    Error, Field, Operator, RawTransactionQuery, TagSet, TransactionPage, TransactionQuery,
    TransactionRepository,
};

fn tags(values: &[&str]) -> TagSet {
    TagSet::try_new(values.iter().copied()).expect("valid tags")
}

fn ids(txns: &[expenses_db::Transaction]) -> Vec<i64> {
    txns.iter().map(|t| t.id).collect()
}

#[tokio::test]
#[ignore = "requires PostgreSQL with pgvector"]
async fn test_create_and_get() {
    let test_db = TestDatabase::new().await;

    let id = test_db
        .insert(
            TransactionBuilder::new("Grocery run")
                .date(2024, 3, 9)
                .amount_cents(-525)
                .source("visa")
                .tags(&["food", "weekly"]),
        )
        .await;

    let txn = test_db
        .repo
        .get(id)
        .await
        .expect("get failed")
        .expect("transaction should exist");
    assert_eq!(txn.description, "Grocery run");
    assert_eq!(txn.amount_cents, -525);
    assert_eq!(txn.source, "visa");
    assert_eq!(txn.tags, vec!["food".to_string(), "weekly".to_string()]);
    assert!(txn.embedding.is_none());

    assert!(test_db.repo.get(id + 1000).await.unwrap().is_none());

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL with pgvector"]
async fn test_tag_match_and_not_match() {
    let test_db = TestDatabase::new().await;
    let both = test_db
        .insert(TransactionBuilder::new("Lunch").tags(&["food", "rent"]))
        .await;
    let other = test_db
        .insert(TransactionBuilder::new("Gas").tags(&["car"]))
        .await;

    let matched = test_db
        .repo
        .query(&TransactionQuery::new().tags(Operator::Match, tags(&["food"])))
        .await
        .unwrap();
    assert_eq!(ids(&matched), vec![both]);

    let not_matched = test_db
        .repo
        .query(&TransactionQuery::new().tags(Operator::NotMatch, tags(&["food"])))
        .await
        .unwrap();
    assert_eq!(ids(&not_matched), vec![other]);

    // Superset semantics: both tags must be present.
    let superset = test_db
        .repo
        .query(&TransactionQuery::new().tags(Operator::Match, tags(&["food", "car"])))
        .await
        .unwrap();
    assert!(superset.is_empty());

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL with pgvector"]
async fn test_empty_operator_matches_null_and_empty_tags() {
    let test_db = TestDatabase::new().await;
    let null_tags = test_db.insert(TransactionBuilder::new("Null")).await;
    test_db.set_raw_tags(null_tags, None).await;
    let empty_tags = test_db.insert(TransactionBuilder::new("Empty")).await;
    test_db.set_raw_tags(empty_tags, Some(vec![])).await;
    let tagged = test_db
        .insert(TransactionBuilder::new("Tagged").tags(&["x"]))
        .await;

    let empty = test_db
        .repo
        .query(&TransactionQuery::new().tags(Operator::Empty, TagSet::new()))
        .await
        .unwrap();
    assert_eq!(ids(&empty), vec![null_tags, empty_tags]);

    // Null tags count as "no tags" and so satisfy not-match.
    let not_x = test_db
        .repo
        .query(&TransactionQuery::new().tags(Operator::NotMatch, tags(&["x"])))
        .await
        .unwrap();
    assert_eq!(ids(&not_x), vec![null_tags, empty_tags]);
    assert!(!ids(&not_x).contains(&tagged));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL with pgvector"]
async fn test_text_filters_are_case_insensitive_substrings() {
    let test_db = TestDatabase::new().await;
    let coffee = test_db
        .insert(TransactionBuilder::new("Blue Bottle COFFEE").source("amex"))
        .await;
    let rent = test_db
        .insert(TransactionBuilder::new("Monthly rent").source("checking"))
        .await;
    let underscore = test_db
        .insert(TransactionBuilder::new("promo_code refund").source("checking"))
        .await;

    let found = test_db
        .repo
        .query(&TransactionQuery::new().description(Operator::Match, "coffee"))
        .await
        .unwrap();
    assert_eq!(ids(&found), vec![coffee]);

    let not_amex = test_db
        .repo
        .query(&TransactionQuery::new().source(Operator::NotMatch, "AMEX"))
        .await
        .unwrap();
    assert_eq!(ids(&not_amex), vec![rent, underscore]);

    // `_` is literal, not a single-character wildcard.
    let literal = test_db
        .repo
        .query(&TransactionQuery::new().description(Operator::Match, "o_c"))
        .await
        .unwrap();
    assert_eq!(ids(&literal), vec![underscore]);

    let err = test_db
        .repo
        .query(&TransactionQuery::new().description(Operator::Empty, "x"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::UnsupportedOperator {
            field: Field::Description,
            op: Operator::Empty
        }
    ));

    test_db.cleanup().await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL with pgvector"]
async fn test_date_amount_and_pagination() {
    let test_db = TestDatabase::new().await;
    let mut created = Vec::new();
    for day in 1..=5 {
        created.push(
            test_db
                .insert(
                    TransactionBuilder::new("Daily")
                        .date(2024, 2, day)
                        .amount_cents(-100 * day as i64),
                )
                .await,
        );
    }

    let ranged = test_db
        .repo
        .query(
            &RawTransactionQuery {
                from_date: "2024/02/02".into(),
                to_date: "2024/02/04".into(),
                ..Default::default()
            }
            .validate()
            .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(ids(&ranged), created[1..4].to_vec());

    let exact = test_db
        .repo
        .query(&TransactionQuery::new().amount_cents(-300))
        .await
        .unwrap();
    assert_eq!(ids(&exact), vec![created[2]]);

    let first_page = test_db
        .repo
        .query(&TransactionQuery::new().limit(2))
        .await
        .unwrap();
    assert_eq!(ids(&first_page), created[0..2].to_vec());

    let page = TransactionPage::from_transactions(&first_page);
    let next: i64 = page.next_id.expect("next id").parse().unwrap();
    let second_page = test_db
        .repo
        .query(&TransactionQuery::new().start_id(next).limit(2))
        .await
        .unwrap();
    assert_eq!(ids(&second_page), created[2..4].to_vec());

    // Zero means the maximum page size.
    let all = test_db
        .repo
        .query(&TransactionQuery::new().limit(0))
        .await
        .unwrap();
    assert_eq!(all.len(), 5);

    let err = test_db
        .repo
        .query(&TransactionQuery::new().limit(1001))
        .await
        .unwrap_err();
    assert_eq!(err.field(), Some(Field::Limit));

    test_db.cleanup().await;
}
