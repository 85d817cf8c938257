use crate::obs::sink::{MetricsEvent, MetricsSink};
use std::cell::Cell;

///
/// EventCounters
///
/// Default sink owned by each `Db`. Single-threaded by construction, so plain
/// `Cell`s are enough.
///

#[derive(Debug, Default)]
pub struct EventCounters {
    creates: Cell<u64>,
    updates: Cell<u64>,
    deletes: Cell<u64>,
    fetches: Cell<u64>,
    queries: Cell<u64>,
    rows_returned: Cell<u64>,
    index_writes: Cell<u64>,
    index_deletes: Cell<u64>,
    association_loads: Cell<u64>,
    divergences: Cell<u64>,
    dangling_references: Cell<u64>,
}

impl EventCounters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn report(&self) -> EventReport {
        EventReport {
            creates: self.creates.get(),
            updates: self.updates.get(),
            deletes: self.deletes.get(),
            fetches: self.fetches.get(),
            queries: self.queries.get(),
            rows_returned: self.rows_returned.get(),
            index_writes: self.index_writes.get(),
            index_deletes: self.index_deletes.get(),
            association_loads: self.association_loads.get(),
            divergences: self.divergences.get(),
            dangling_references: self.dangling_references.get(),
        }
    }

    pub fn reset(&self) {
        for cell in [
            &self.creates,
            &self.updates,
            &self.deletes,
            &self.fetches,
            &self.queries,
            &self.rows_returned,
            &self.index_writes,
            &self.index_deletes,
            &self.association_loads,
            &self.divergences,
            &self.dangling_references,
        ] {
            cell.set(0);
        }
    }
}

fn bump(cell: &Cell<u64>, by: u64) {
    cell.set(cell.get().saturating_add(by));
}

impl MetricsSink for EventCounters {
    fn record(&self, event: MetricsEvent) {
        match event {
            MetricsEvent::Create { .. } => bump(&self.creates, 1),
            MetricsEvent::Update { .. } => bump(&self.updates, 1),
            MetricsEvent::Delete { .. } => bump(&self.deletes, 1),
            MetricsEvent::Fetch => bump(&self.fetches, 1),
            MetricsEvent::Query { rows_returned } => {
                bump(&self.queries, 1);
                bump(&self.rows_returned, rows_returned);
            }
            MetricsEvent::IndexWrite => bump(&self.index_writes, 1),
            MetricsEvent::IndexDelete => bump(&self.index_deletes, 1),
            MetricsEvent::AssociationLoad { .. } => bump(&self.association_loads, 1),
            MetricsEvent::Divergence { .. } => bump(&self.divergences, 1),
            MetricsEvent::DanglingReference { .. } => bump(&self.dangling_references, 1),
        }
    }
}

///
/// EventReport
/// Point-in-time snapshot of [`EventCounters`].
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct EventReport {
    pub creates: u64,
    pub updates: u64,
    pub deletes: u64,
    pub fetches: u64,
    pub queries: u64,
    pub rows_returned: u64,
    pub index_writes: u64,
    pub index_deletes: u64,
    pub association_loads: u64,
    pub divergences: u64,
    pub dangling_references: u64,
}
