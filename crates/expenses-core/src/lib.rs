//! # expenses-core
//!
//! Core types, validators, and projections for the expenses transaction
//! store.
//!
//! This crate holds everything that does not touch the database: the
//! transaction model, the query specification, field validation, result
//! projection, and the repository trait the storage crate implements.

pub mod defaults;
pub mod error;
pub mod models;
pub mod projection;
pub mod query;
pub mod traits;
pub mod validation;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use projection::{
    format_amount, next_id, SimilarView, TransactionPage, TransactionView, YearlyTagTotalView,
};
pub use query::{Operator, RawTransactionQuery, TagFilter, TextFilter, TransactionQuery};
pub use traits::TransactionRepository;
pub use validation::{Field, RawTransaction, ValidatedTransaction, ValidationScope};
