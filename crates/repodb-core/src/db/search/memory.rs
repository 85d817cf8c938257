use crate::db::search::{
    AddOptions, QueryOptions, SearchClient, SearchError, SolrDocument, parse_query,
};
use std::{
    cell::{Cell, RefCell},
    cmp::Ordering,
};
use tracing::debug;

///
/// MemorySearch
///
/// In-process index. Adds and deletes are pending until committed, which
/// models the consistency window of a real engine. Committed documents keep
/// insertion order; re-adding a document moves it to the end.
///

#[derive(Debug, Default)]
pub struct MemorySearch {
    committed: RefCell<Vec<SolrDocument>>,
    pending: RefCell<Vec<PendingOp>>,
    log: RefCell<Vec<QueryLogEntry>>,
    counts: Cell<u64>,
    commits: Cell<u64>,
    unavailable: Cell<bool>,
}

#[derive(Debug)]
enum PendingOp {
    Add(SolrDocument),
    Delete(String),
}

impl MemorySearch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.set(unavailable);
    }

    /// Every select query executed so far, oldest first.
    #[must_use]
    pub fn query_log(&self) -> Vec<QueryLogEntry> {
        self.log.borrow().clone()
    }

    pub fn clear_log(&self) {
        self.log.borrow_mut().clear();
        self.counts.set(0);
    }

    /// Number of `count` calls since the log was last cleared.
    #[must_use]
    pub fn count_calls(&self) -> u64 {
        self.counts.get()
    }

    #[must_use]
    pub fn commits(&self) -> u64 {
        self.commits.get()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.committed.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.committed.borrow().is_empty()
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Committed document by id.
    #[must_use]
    pub fn document(&self, id: &str) -> Option<SolrDocument> {
        self.committed
            .borrow()
            .iter()
            .find(|doc| doc.id() == Some(id))
            .cloned()
    }

    fn check_available(&self) -> Result<(), SearchError> {
        if self.unavailable.get() {
            return Err(SearchError::Unavailable {
                message: "simulated outage".to_string(),
            });
        }

        Ok(())
    }
}

impl SearchClient for MemorySearch {
    fn query(&self, query: &str, options: &QueryOptions) -> Result<Vec<SolrDocument>, SearchError> {
        self.check_available()?;
        let node = parse_query(query)?;

        let mut hits: Vec<SolrDocument> = self
            .committed
            .borrow()
            .iter()
            .filter(|doc| node.matches(doc))
            .cloned()
            .collect();

        if let Some(sort) = &options.sort {
            sort_documents(&mut hits, sort);
        }
        if let Some(rows) = options.rows {
            hits.truncate(rows);
        }

        debug!(query, rows = ?options.rows, returned = hits.len(), "index query");
        self.log.borrow_mut().push(QueryLogEntry {
            query: query.to_string(),
            rows: options.rows,
            returned: hits.len(),
        });

        Ok(hits)
    }

    fn count(&self, query: &str) -> Result<usize, SearchError> {
        self.check_available()?;
        let node = parse_query(query)?;
        self.counts.set(self.counts.get() + 1);

        let count = self
            .committed
            .borrow()
            .iter()
            .filter(|doc| node.matches(doc))
            .count();
        debug!(query, count, "index count");

        Ok(count)
    }

    fn add(&self, document: SolrDocument, options: AddOptions) -> Result<(), SearchError> {
        self.check_available()?;
        if document.id().is_none_or(str::is_empty) {
            return Err(SearchError::InvalidDocument {
                message: "document has no id".to_string(),
            });
        }

        self.pending.borrow_mut().push(PendingOp::Add(document));
        if options.commit {
            self.commit()?;
        }

        Ok(())
    }

    fn delete_by_id(&self, id: &str) -> Result<(), SearchError> {
        self.check_available()?;
        self.pending
            .borrow_mut()
            .push(PendingOp::Delete(id.to_string()));

        Ok(())
    }

    fn commit(&self) -> Result<(), SearchError> {
        self.check_available()?;

        let ops = std::mem::take(&mut *self.pending.borrow_mut());
        let applied = ops.len();
        let mut committed = self.committed.borrow_mut();
        for op in ops {
            match op {
                PendingOp::Add(doc) => {
                    committed.retain(|existing| existing.id() != doc.id());
                    committed.push(doc);
                }
                PendingOp::Delete(id) => {
                    committed.retain(|existing| existing.id() != Some(id.as_str()));
                }
            }
        }
        self.commits.set(self.commits.get() + 1);
        debug!(applied, documents = committed.len(), "index commit");

        Ok(())
    }
}

// `<field> asc|desc`; unknown directions sort ascending.
fn sort_documents(docs: &mut [SolrDocument], sort: &str) {
    let mut parts = sort.split_whitespace();
    let Some(field) = parts.next() else {
        return;
    };
    let descending = parts.next() == Some("desc");

    docs.sort_by(|a, b| {
        let ordering = match (a.first(field), b.first(field)) {
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        if descending {
            ordering.reverse()
        } else {
            ordering
        }
    });
}

///
/// QueryLogEntry
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct QueryLogEntry {
    pub query: String,
    pub rows: Option<usize>,
    pub returned: usize,
}
