//! expenses: command-line access to the transaction store.
//!
//! Every subcommand prints its result as JSON on stdout. Logs go to stderr.
//!
//! Environment:
//!   DATABASE_URL        - PostgreSQL connection string
//!   DB_MAX_CONNECTIONS  - pool size (default: 10)
//!   VECTOR_DISTANCE     - "cosine" or "l2" (default: "cosine")
//!   LOG_FORMAT          - "json" or "text" (default: "text")
//!   RUST_LOG            - standard env filter (default: "expenses_cli=info,expenses_db=info")

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use expenses_core::defaults::DATABASE_URL;
use expenses_core::validation::parse_embedding;
use expenses_core::{
    IdBatch, OverviewQuery, RawTransaction, RawTransactionQuery, SimilarView, TagMutation, TagSet,
    TransactionId, TransactionPage, TransactionRepository, TransactionView, YearlyTagTotalView,
};
use expenses_db::{Database, EngineConfig, PoolConfig};

#[derive(Parser)]
#[command(name = "expenses")]
#[command(author, version, about = "Query and tag expense transactions")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the transactions table and indexes if missing
    Init,

    /// Insert a transaction
    Create {
        /// Date as yyyy/mm/dd
        #[arg(long)]
        date: String,

        /// Free-text description (1-100 characters)
        #[arg(long)]
        description: String,

        /// Amount as <dollars>[.<cents>], negative for debits
        #[arg(long, allow_hyphen_values = true)]
        amount: String,

        /// Account or statement the transaction came from
        #[arg(long)]
        source: String,

        /// Tags (can specify multiple)
        #[arg(long, num_args = 0..)]
        tags: Vec<String>,

        /// Description embedding as a JSON array of 768 numbers
        #[arg(long, default_value = "")]
        embedding: String,
    },

    /// Fetch a transaction by id
    Get {
        /// Transaction id
        id: TransactionId,
    },

    /// List transactions matching a filter
    Query {
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Rank transactions by similarity to a set of reference transactions
    Similar {
        /// Space-separated reference ids
        #[arg(long)]
        ids: String,

        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Change the tags of a batch of transactions
    Tag {
        /// Space-separated transaction ids
        #[arg(long)]
        ids: String,

        /// One of add, remove, clear, replace
        #[arg(long)]
        op: String,

        /// Tags to apply (can specify multiple)
        #[arg(long, num_args = 0..)]
        tags: Vec<String>,
    },

    /// Replace the description embedding of one transaction
    SetEmbedding {
        /// Transaction id
        #[arg(long)]
        id: TransactionId,

        /// JSON array of 768 numbers
        #[arg(long)]
        embedding: String,
    },

    /// Replace tags and/or the embedding of a batch of transactions
    Update {
        /// Space-separated transaction ids
        #[arg(long)]
        ids: String,

        /// Replacement tags (can specify multiple)
        #[arg(long, num_args = 0..)]
        tags: Vec<String>,

        /// Replacement embedding; only valid for a single id
        #[arg(long, default_value = "")]
        embedding: String,
    },

    /// Per-year spending totals by tag
    Overview {
        /// First year to include
        #[arg(long)]
        from_year: Option<i32>,

        /// Last year to include
        #[arg(long)]
        to_year: Option<i32>,
    },
}

/// Filter flags shared by `query` and `similar`.
#[derive(Args)]
struct FilterArgs {
    /// Earliest date (yyyy/mm/dd), inclusive
    #[arg(long, default_value = "")]
    from_date: String,

    /// Latest date (yyyy/mm/dd), inclusive
    #[arg(long, default_value = "")]
    to_date: String,

    /// Description substring
    #[arg(long, default_value = "")]
    description: String,

    /// match or not-match
    #[arg(long, default_value = "")]
    description_op: String,

    /// Source substring
    #[arg(long, default_value = "")]
    source: String,

    /// match or not-match
    #[arg(long, default_value = "")]
    source_op: String,

    /// Space-separated tags
    #[arg(long, default_value = "")]
    tags: String,

    /// match, not-match, or empty
    #[arg(long, default_value = "")]
    tags_op: String,

    /// Exact amount as <dollars>[.<cents>]
    #[arg(long, default_value = "", allow_hyphen_values = true)]
    amount: String,

    /// Smallest id to return
    #[arg(long, default_value = "")]
    start_id: String,

    /// Maximum rows to return (0 means 1000)
    #[arg(long, default_value = "")]
    limit: String,
}

impl From<FilterArgs> for RawTransactionQuery {
    fn from(a: FilterArgs) -> Self {
        Self {
            from_date: a.from_date,
            to_date: a.to_date,
            description: a.description,
            description_op: a.description_op,
            source: a.source,
            source_op: a.source_op,
            tags: a.tags,
            tags_op: a.tags_op,
            amount: a.amount,
            start_id: a.start_id,
            limit: a.limit,
        }
    }
}

#[derive(Serialize)]
struct Created {
    id: String,
}

#[derive(Serialize)]
struct Updated {
    updated: u64,
}

fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "expenses_cli=info,expenses_db=info".into());
    let registry = tracing_subscriber::registry().with(env_filter);

    if log_format == "json" {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn connect() -> Result<Database> {
    let url = std::env::var("DATABASE_URL").unwrap_or_else(|_| DATABASE_URL.to_string());
    let pool_config = PoolConfig::from_env()?;
    let engine_config = EngineConfig::from_env()?;
    info!(
        subsystem = "cli",
        op = "connect",
        distance = %engine_config.distance,
        max_connections = pool_config.max_connections,
        "Connecting to transaction store"
    );
    Database::connect_with_config(&url, pool_config, engine_config)
        .await
        .context("failed to connect to the database")
}

async fn run(command: Commands) -> Result<()> {
    let db = connect().await?;
    let repo = &db.transactions;

    match command {
        Commands::Init => {
            db.ensure_schema().await?;
        }
        Commands::Create {
            date,
            description,
            amount,
            source,
            tags,
            embedding,
        } => {
            let txn = RawTransaction {
                date,
                description,
                amount,
                source,
                tags,
                desc_embedding: embedding,
            }
            .into_new_transaction()?;
            let id = repo.create(txn).await?;
            print_json(&Created { id: id.to_string() })?;
        }
        Commands::Get { id } => {
            let txn = repo
                .get(id)
                .await?
                .with_context(|| format!("transaction {} not found", id))?;
            print_json(&TransactionView::from(&txn))?;
        }
        Commands::Query { filter } => {
            let query = RawTransactionQuery::from(filter).validate()?;
            let txns = repo.query(&query).await?;
            print_json(&TransactionPage::from_transactions(&txns))?;
        }
        Commands::Similar { ids, filter } => {
            let ids = IdBatch::parse(&ids)?;
            let query = RawTransactionQuery::from(filter).validate()?;
            let result = repo.similar(&ids, &query).await?;
            print_json(&SimilarView::from(&result))?;
        }
        Commands::Tag { ids, op, tags } => {
            let ids = IdBatch::parse(&ids)?;
            let mutation = TagMutation::parse(&op, TagSet::try_new(tags)?)?;
            let updated = repo.mutate_tags(&ids, mutation).await?;
            print_json(&Updated { updated })?;
        }
        Commands::SetEmbedding { id, embedding } => {
            let ids = IdBatch::new([id])?;
            repo.set_embedding(&ids, parse_embedding(&embedding)?).await?;
            print_json(&Updated { updated: 1 })?;
        }
        Commands::Update {
            ids,
            tags,
            embedding,
        } => {
            let ids = IdBatch::parse(&ids)?;
            let update = RawTransaction {
                tags,
                desc_embedding: embedding,
                ..Default::default()
            }
            .into_update()?;
            let updated = repo.update(&ids, update).await?;
            print_json(&Updated { updated })?;
        }
        Commands::Overview { from_year, to_year } => {
            let totals = repo
                .yearly_overview(OverviewQuery { from_year, to_year })
                .await?;
            let view: Vec<YearlyTagTotalView> =
                totals.iter().map(YearlyTagTotalView::from).collect();
            print_json(&view)?;
        }
    }

    db.pool.close().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    run(cli.command).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_filter_args_into_raw_query() {
        let cli = Cli::parse_from([
            "expenses",
            "query",
            "--tags",
            "food rent",
            "--tags-op",
            "not-match",
            "--amount",
            "-5.25",
            "--limit",
            "10",
        ]);
        let Commands::Query { filter } = cli.command else {
            panic!("expected query subcommand");
        };
        let query = RawTransactionQuery::from(filter).validate().unwrap();
        assert_eq!(query.amount_cents, Some(-525));
        assert_eq!(query.limit, 10);
        assert_eq!(query.tags.unwrap().tags.len(), 2);
    }

    #[test]
    fn test_tag_subcommand_parses_multiple_tags() {
        let cli = Cli::parse_from([
            "expenses", "tag", "--ids", "10 11 12", "--op", "add", "--tags", "food", "rent",
        ]);
        let Commands::Tag { ids, op, tags } = cli.command else {
            panic!("expected tag subcommand");
        };
        assert_eq!(IdBatch::parse(&ids).unwrap().len(), 3);
        assert_eq!(op, "add");
        assert_eq!(tags, vec!["food", "rent"]);
    }
}
