//! Per-slot query contexts.

use std::path::PathBuf;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use qperf_wire::{set_query_id, MessageHeader, QueryOptions, Qid};
use tracing::debug;

use crate::{CorpusError, QueryRepository};

/// Request state owned by one dispatcher slot
pub trait QueryContext: Send {
    /// Render the next query on the wire with message id `qid`
    fn start(&mut self, qid: Qid) -> Bytes;

    /// Further check an id-matched response
    ///
    /// Every response is accepted by default; the id match done by the
    /// dispatcher is the only mandatory check.
    fn check_response(&self, _header: &MessageHeader) -> bool {
        true
    }
}

/// Factory producing one context per dispatcher slot
pub trait QueryContextCreator: Send {
    /// Create a fresh context
    fn create(&mut self) -> Result<Box<dyn QueryContext>, CorpusError>;
}

/// Context replaying the shared repository
pub struct DnsQueryContext {
    repo: Arc<QueryRepository>,
    buffer: BytesMut,
}

impl DnsQueryContext {
    /// Create a context drawing from `repo`
    pub fn new(repo: Arc<QueryRepository>) -> Self {
        Self {
            repo,
            buffer: BytesMut::with_capacity(512),
        }
    }
}

impl QueryContext for DnsQueryContext {
    fn start(&mut self, qid: Qid) -> Bytes {
        self.buffer.clear();
        self.buffer.extend_from_slice(self.repo.next_template());
        set_query_id(&mut self.buffer, qid);
        self.buffer.split().freeze()
    }
}

enum Source {
    Pending { path: PathBuf, options: QueryOptions },
    Loaded(Arc<QueryRepository>),
}

/// Creator handing out [`DnsQueryContext`]s over one repository
///
/// The repository is either supplied up front, preloaded from a file, or
/// loaded from the file on the first `create`.
pub struct RepositoryContextCreator {
    source: Source,
}

impl RepositoryContextCreator {
    /// Use an already loaded repository
    pub fn new(repo: Arc<QueryRepository>) -> Self {
        Self {
            source: Source::Loaded(repo),
        }
    }

    /// Read queries from `path`, now if `preload` is set, otherwise on first use
    pub fn from_file(path: impl Into<PathBuf>, options: QueryOptions, preload: bool) -> Result<Self, CorpusError> {
        let path = path.into();
        let source = if preload {
            Source::Loaded(Arc::new(QueryRepository::load(&path, &options)?))
        } else {
            Source::Pending { path, options }
        };
        Ok(Self { source })
    }

    /// Whether the repository has been loaded
    pub fn is_loaded(&self) -> bool {
        matches!(self.source, Source::Loaded(_))
    }

    fn repository(&mut self) -> Result<Arc<QueryRepository>, CorpusError> {
        let repo = match &self.source {
            Source::Loaded(repo) => return Ok(repo.clone()),
            Source::Pending { path, options } => {
                debug!("Loading query repository {:?} on first use", path);
                Arc::new(QueryRepository::load(path, options)?)
            }
        };
        self.source = Source::Loaded(repo.clone());
        Ok(repo)
    }
}

impl QueryContextCreator for RepositoryContextCreator {
    fn create(&mut self) -> Result<Box<dyn QueryContext>, CorpusError> {
        Ok(Box::new(DnsQueryContext::new(self.repository()?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;

    fn repo(input: &str) -> Arc<QueryRepository> {
        Arc::new(QueryRepository::from_reader(Cursor::new(input.to_string()), &QueryOptions::default()).unwrap())
    }

    #[test]
    fn test_context_stamps_qid() {
        let mut ctx = DnsQueryContext::new(repo("a.example A\nb.example AAAA\n"));

        let first = ctx.start(7);
        let second = ctx.start(8);
        assert_eq!(MessageHeader::decode(&first).unwrap().id, 7);
        assert_eq!(MessageHeader::decode(&second).unwrap().id, 8);
        assert_ne!(&first[2..], &second[2..]);
        assert!(ctx.check_response(&MessageHeader::query(7)));
    }

    #[test]
    fn test_contexts_share_cursor() {
        let shared = repo("a.example A\nb.example A\n");
        let mut creator = RepositoryContextCreator::new(shared);
        let mut one = creator.create().unwrap();
        let mut two = creator.create().unwrap();

        let q1 = one.start(1);
        let q2 = two.start(1);
        let q3 = one.start(1);
        assert_ne!(q1, q2);
        assert_eq!(q1, q3);
    }

    #[test]
    fn test_lazy_load() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"example.com A\n").unwrap();

        let mut creator = RepositoryContextCreator::from_file(file.path(), QueryOptions::default(), false).unwrap();
        assert!(!creator.is_loaded());
        creator.create().unwrap();
        assert!(creator.is_loaded());

        let eager = RepositoryContextCreator::from_file(file.path(), QueryOptions::default(), true).unwrap();
        assert!(eager.is_loaded());
    }

    #[test]
    fn test_lazy_load_missing_file_fails_on_create() {
        let mut creator =
            RepositoryContextCreator::from_file("/nonexistent/q.txt", QueryOptions::default(), false).unwrap();
        assert!(creator.create().is_err());
        assert!(RepositoryContextCreator::from_file("/nonexistent/q.txt", QueryOptions::default(), true).is_err());
    }
}
