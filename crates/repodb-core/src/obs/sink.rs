//! Metrics sink boundary.
//!
//! Core logic emits `MetricsEvent`s and never touches counters directly.

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MetricsEvent {
    Create {
        entity_path: &'static str,
    },
    Update {
        entity_path: &'static str,
    },
    Delete {
        entity_path: &'static str,
    },
    Fetch,
    Query {
        rows_returned: u64,
    },
    IndexWrite,
    IndexDelete,
    /// Association target loaded from storage or the index.
    AssociationLoad {
        reflection: &'static str,
    },
    /// The index referenced an object storage no longer holds.
    Divergence {
        reflection: &'static str,
    },
    /// A belongs_to foreign key pointed at nothing.
    DanglingReference {
        reflection: &'static str,
    },
}

///
/// MetricsSink
///

pub trait MetricsSink {
    fn record(&self, event: MetricsEvent);
}
