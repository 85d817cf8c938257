//! Module: db
//! Responsibility: the `Db` handle binding a storage client, a search client,
//! the class registry, config, and the URI translator; entry point for
//! persistence and association access.
//! Does not own: backend wire formats.
//!
//! Invariants:
//! - Every operation runs synchronously on the caller's thread; nothing is
//!   retried and nothing is rolled back.

pub mod association;
pub mod entity;
pub mod persistence;
pub mod registry;
pub mod search;
pub mod store;

use crate::{
    config::{CommitPolicy, Config},
    db::{
        registry::ClassRegistry,
        search::{MemorySearch, QueryOptions, SearchClient, SolrDocument},
        store::{MemoryStorage, ObjectRecord, StorageClient, StoreError},
    },
    error::InternalError,
    model::EntityModel,
    obs::{EventCounters, EventReport, MetricsEvent, MetricsSink},
    types::{BaseUriTranslator, Pid, UriTranslator},
};
use tracing::debug;

///
/// Db
///
/// Explicit handle passed to every repository operation. The in-memory
/// backends are the defaults; any [`StorageClient`] / [`SearchClient`] pair
/// can be bound instead.
///

pub struct Db<S: StorageClient = MemoryStorage, I: SearchClient = MemorySearch> {
    storage: S,
    search: I,
    registry: ClassRegistry,
    config: Config,
    translator: Box<dyn UriTranslator>,
    counters: EventCounters,
    sinks: Vec<Box<dyn MetricsSink>>,
}

impl<S: StorageClient, I: SearchClient> Db<S, I> {
    /// Bind backends under a validated config. The URI translator defaults to
    /// `<uri.base>/<pid>`.
    pub fn new(storage: S, search: I, config: Config) -> Result<Self, InternalError> {
        config.validate()?;
        let translator = BaseUriTranslator::new(config.uri.base.clone());

        Ok(Self {
            storage,
            search,
            registry: ClassRegistry::new(),
            config,
            translator: Box::new(translator),
            counters: EventCounters::new(),
            sinks: Vec::new(),
        })
    }

    /// Replace the identifier-to-URI mapping.
    #[must_use]
    pub fn with_translator(mut self, translator: impl UriTranslator + 'static) -> Self {
        self.translator = Box::new(translator);
        self
    }

    /// Forward every metrics event to `sink` as well as the built-in counters.
    #[must_use]
    pub fn with_sink(mut self, sink: impl MetricsSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn register(&mut self, model: &'static EntityModel) -> Result<(), InternalError> {
        self.registry.register(model)
    }

    #[must_use]
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    #[must_use]
    pub const fn search(&self) -> &I {
        &self.search
    }

    #[must_use]
    pub const fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    #[must_use]
    pub const fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn translator(&self) -> &dyn UriTranslator {
        self.translator.as_ref()
    }

    #[must_use]
    pub fn uri_for(&self, pid: &Pid) -> String {
        self.translator.id_to_uri(pid)
    }

    #[must_use]
    pub fn metrics(&self) -> EventReport {
        self.counters.report()
    }

    pub fn reset_metrics(&self) {
        self.counters.reset();
    }

    pub(crate) fn record(&self, event: MetricsEvent) {
        self.counters.record(event);
        for sink in &self.sinks {
            sink.record(event);
        }
    }

    pub(crate) fn commit_immediately(&self) -> bool {
        self.config.indexing.commit == CommitPolicy::Immediate
    }

    ///
    /// BACKEND ROUND TRIPS
    ///

    // Leaf error is kept so callers can tell absence from failure.
    pub(crate) fn fetch_record(&self, pid: &Pid) -> Result<ObjectRecord, StoreError> {
        debug!(%pid, "storage fetch");
        self.record(MetricsEvent::Fetch);

        self.storage.fetch(pid)
    }

    pub(crate) fn select(
        &self,
        query: &str,
        options: &QueryOptions,
    ) -> Result<Vec<SolrDocument>, InternalError> {
        debug!(query, rows = ?options.rows, "search query");
        let hits = self.search.query(query, options)?;
        self.record(MetricsEvent::Query {
            rows_returned: hits.len() as u64,
        });

        Ok(hits)
    }

    pub(crate) fn count_hits(&self, query: &str) -> Result<usize, InternalError> {
        debug!(query, "search count");

        Ok(self.search.count(query)?)
    }
}

///
/// TESTS
///
