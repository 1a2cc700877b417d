//! Query repository and per-slot query contexts for queryperf.
//!
//! The repository turns an input file of `<name> [<type>]` lines into
//! pre-encoded query templates. Each dispatcher slot owns one
//! [`QueryContext`], obtained from a [`QueryContextCreator`], which stamps the
//! next template with the slot's current message id.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod repository;

use std::path::PathBuf;
use thiserror::Error;

pub use context::{DnsQueryContext, QueryContext, QueryContextCreator, RepositoryContextCreator};
pub use repository::{QueryRepository, QuerySpec};

/// Corpus errors
#[derive(Error, Debug)]
pub enum CorpusError {
    /// I/O error reading the input file
    #[error("failed to read {path}: {source}")]
    Io {
        /// Input file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
    /// I/O error on a reader without a path
    #[error("I/O error: {0}")]
    Read(#[from] std::io::Error),
    /// A line could not be turned into a query
    #[error("line {line}: {reason}")]
    Parse {
        /// 1-based line number
        line: usize,
        /// What was wrong with it
        reason: String,
    },
    /// The input contained no queries
    #[error("no queries found in input")]
    Empty,
}
