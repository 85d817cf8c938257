//! Observability: per-handle event counters and sink abstractions.
//!
//! Counters live on the `Db` handle rather than in process globals; a custom
//! [`MetricsSink`] can be attached alongside them.

pub(crate) mod metrics;
pub(crate) mod sink;

pub use metrics::{EventCounters, EventReport};
pub use sink::{MetricsEvent, MetricsSink};
