//! Query repository loaded from an input file.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use qperf_wire::{build_query, QueryOptions, RecordType};
use tracing::{debug, info};

use crate::CorpusError;

/// One parsed input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    /// Query name
    pub name: String,
    /// Query type
    pub rtype: RecordType,
}

impl QuerySpec {
    /// Parse a `<name> [<type>]` line; blank lines and comments yield `None`
    pub fn parse_line(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            return Ok(None);
        }

        let mut fields = line.split_whitespace();
        let name = match fields.next() {
            Some(name) => name.to_string(),
            None => return Ok(None),
        };
        let rtype = match fields.next() {
            Some(t) => t.parse::<RecordType>().map_err(|e| e.to_string())?,
            None => RecordType::A,
        };
        if let Some(extra) = fields.next() {
            return Err(format!("unexpected trailing field {:?}", extra));
        }

        Ok(Some(Self { name, rtype }))
    }
}

/// Pre-encoded queries cycled through by every context
///
/// The cursor is shared: contexts of different slots draw from the same
/// sequence, so the corpus is replayed in order regardless of which slot
/// completes first.
#[derive(Debug)]
pub struct QueryRepository {
    templates: Vec<Bytes>,
    cursor: AtomicUsize,
}

impl QueryRepository {
    /// Load and encode every query in `path`
    pub fn load<P: AsRef<Path>>(path: P, options: &QueryOptions) -> Result<Self, CorpusError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| CorpusError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let repo = Self::from_reader(BufReader::new(file), options)?;
        info!("Loaded {} queries from {:?}", repo.len(), path);
        Ok(repo)
    }

    /// Load and encode every query from a reader
    pub fn from_reader<R: BufRead>(reader: R, options: &QueryOptions) -> Result<Self, CorpusError> {
        let mut templates = Vec::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let parsed = match QuerySpec::parse_line(&line) {
                Ok(Some(parsed)) => parsed,
                Ok(None) => continue,
                Err(reason) => return Err(CorpusError::Parse { line: idx + 1, reason }),
            };
            let template = build_query(&parsed.name, parsed.rtype, options).map_err(|e| {
                CorpusError::Parse {
                    line: idx + 1,
                    reason: e.to_string(),
                }
            })?;
            templates.push(template);
        }

        if templates.is_empty() {
            return Err(CorpusError::Empty);
        }
        debug!("Encoded {} query templates", templates.len());

        Ok(Self {
            templates,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Number of distinct queries
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Always false for a loaded repository
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Next template in round-robin order (message id 0)
    pub fn next_template(&self) -> &Bytes {
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % self.templates.len();
        &self.templates[idx]
    }
}
