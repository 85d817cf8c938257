use crate::{
    db::store::{ObjectRecord, SaveRequest, StorageClient, StoreError, StoredDatastream},
    types::Pid,
};
use std::{
    cell::{Cell, RefCell},
    collections::BTreeMap,
};
use tracing::debug;

///
/// MemoryStorage
///
/// In-process repository. Mints `namespace:N` identifiers from a per-namespace
/// sequence and keeps a version counter per datastream.
///

#[derive(Debug, Default)]
pub struct MemoryStorage {
    objects: RefCell<BTreeMap<Pid, ObjectRecord>>,
    sequences: RefCell<BTreeMap<String, u64>>,
    fail_next_mint: Cell<bool>,
    unavailable: Cell<bool>,
    mints: Cell<u64>,
    fetches: Cell<u64>,
    saves: Cell<u64>,
    deletes: Cell<u64>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `mint_identifier` call fail.
    pub fn fail_next_mint(&self) {
        self.fail_next_mint.set(true);
    }

    /// Toggle a simulated outage; every call fails while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.set(unavailable);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.borrow().is_empty()
    }

    #[must_use]
    pub fn contains(&self, pid: &Pid) -> bool {
        self.objects.borrow().contains_key(pid)
    }

    #[must_use]
    pub fn calls(&self) -> StorageCallReport {
        StorageCallReport {
            mints: self.mints.get(),
            fetches: self.fetches.get(),
            saves: self.saves.get(),
            deletes: self.deletes.get(),
        }
    }

    pub fn reset_calls(&self) {
        for cell in [&self.mints, &self.fetches, &self.saves, &self.deletes] {
            cell.set(0);
        }
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.get() {
            return Err(StoreError::Unavailable {
                message: "simulated outage".to_string(),
            });
        }

        Ok(())
    }
}

fn bump(cell: &Cell<u64>) {
    cell.set(cell.get().saturating_add(1));
}

impl StorageClient for MemoryStorage {
    fn mint_identifier(&self, namespace: &str) -> Result<Pid, StoreError> {
        bump(&self.mints);
        self.check_available()?;

        if self.fail_next_mint.replace(false) {
            return Err(StoreError::MintFailed {
                namespace: namespace.to_string(),
                message: "injected failure".to_string(),
            });
        }

        let mut sequences = self.sequences.borrow_mut();
        let next = sequences.entry(namespace.to_string()).or_insert(0);
        *next += 1;
        let pid = Pid::new(format!("{namespace}:{next}"));
        debug!(%pid, "minted identifier");

        Ok(pid)
    }

    fn fetch(&self, pid: &Pid) -> Result<ObjectRecord, StoreError> {
        bump(&self.fetches);
        self.check_available()?;

        self.objects
            .borrow()
            .get(pid)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { pid: pid.clone() })
    }

    fn save(&self, pid: &Pid, request: &SaveRequest) -> Result<bool, StoreError> {
        bump(&self.saves);
        self.check_available()?;

        let mut objects = self.objects.borrow_mut();
        let created = !objects.contains_key(pid);
        let record = objects.entry(pid.clone()).or_insert_with(|| ObjectRecord {
            pid: pid.clone(),
            profile: request.profile.clone(),
            datastreams: BTreeMap::new(),
        });
        record.profile = request.profile.clone();

        for (dsid, write) in &request.datastreams {
            let version = record
                .datastreams
                .get(dsid)
                .map_or(1, |existing| existing.version + 1);
            record.datastreams.insert(
                dsid.clone(),
                StoredDatastream {
                    dsid: dsid.clone(),
                    label: write.label.clone(),
                    mime_type: write.mime_type.clone(),
                    version,
                    content: write.content.clone(),
                },
            );
        }
        debug!(%pid, created, datastreams = request.datastreams.len(), "saved object");

        Ok(created)
    }

    fn delete(&self, pid: &Pid) -> Result<(), StoreError> {
        bump(&self.deletes);
        self.check_available()?;

        if self.objects.borrow_mut().remove(pid).is_none() {
            return Err(StoreError::NotFound { pid: pid.clone() });
        }
        debug!(%pid, "deleted object");

        Ok(())
    }
}

///
/// StorageCallReport
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct StorageCallReport {
    pub mints: u64,
    pub fetches: u64,
    pub saves: u64,
    pub deletes: u64,
}

///
/// TESTS
///
