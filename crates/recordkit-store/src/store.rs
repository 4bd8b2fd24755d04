//! Canonical in-memory representation of one record family.
//!
//! This is the core boundary of `recordkit-store`:
//! - create/read/update/delete by key, atomically per call
//! - predicate search and sorted views in deterministic order
//! - aggregate statistics over the family's measure and category
//!
//! The store never touches a terminal and never logs; snapshot load/save
//! delegate to [`crate::jsonl`].

use crate::error::StoreError;
use crate::jsonl::{
    JsonlError, PendingWrite, SnapshotHeader, read_snapshot_from_path, snapshot_ref, stage_snapshot,
};
use crate::query::SortOrder;
use crate::record::{Keyed, Record, RecordKey};
use crate::stats::Statistics;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::path::Path;

/// Errors raised while loading or saving a store snapshot.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error(transparent)]
    Jsonl(#[from] JsonlError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone)]
struct Slot<K, R> {
    position: u64,
    row: Keyed<K, R>,
}

/// A validated working copy produced by [`RecordStore::stage`].
///
/// Only the store can mint one, so a committed record has always been
/// through `derive` and `validate`.
#[derive(Debug, Clone)]
pub struct Staged<K, R> {
    key: K,
    record: R,
}

impl<K, R> Staged<K, R> {
    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn record(&self) -> &R {
        &self.record
    }
}

/// Uniquely keyed, insertion-ordered record collection.
#[derive(Debug, Clone)]
pub struct RecordStore<K, R> {
    rows: BTreeMap<K, Slot<K, R>>,
    order: BTreeMap<u64, K>,
    next_key: u64,
    next_position: u64,
}

impl<K, R> Default for RecordStore<K, R> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            order: BTreeMap::new(),
            next_key: 1,
            next_position: 0,
        }
    }
}

impl<K: RecordKey, R: Record> RecordStore<K, R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store by replaying keyed rows through `create_with_key`.
    ///
    /// Duplicate keys and invalid rows are rejected; derived fields are
    /// recomputed rather than trusted.
    pub fn from_rows(rows: impl IntoIterator<Item = Keyed<K, R>>) -> Result<Self, StoreError> {
        let mut store = Self::new();
        for row in rows {
            store.create_with_key(row.key, row.record)?;
        }
        Ok(store)
    }

    /// Total number of records.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.rows.contains_key(key)
    }

    /// Iterate records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Keyed<K, R>> {
        self.order
            .values()
            .filter_map(|key| self.rows.get(key))
            .map(|slot| &slot.row)
    }

    /// Insert a record under the next automatic key.
    ///
    /// The counter only advances when the record is accepted, and never
    /// hands out a key twice, even after the record holding it is deleted.
    pub fn create(&mut self, record: R) -> Result<K, StoreError> {
        let record = prepare(record)?;
        let mut seq = self.next_key;
        let key = loop {
            if seq == u64::MAX {
                return Err(StoreError::KeysExhausted);
            }
            let candidate = K::from_sequence(seq);
            if !self.rows.contains_key(&candidate) {
                break candidate;
            }
            seq += 1;
        };
        self.next_key = seq + 1;
        self.insert_row(key.clone(), record);
        Ok(key)
    }

    /// Insert a record under a caller-supplied key.
    pub fn create_with_key(&mut self, key: K, record: R) -> Result<K, StoreError> {
        if self.rows.contains_key(&key) {
            return Err(StoreError::duplicate_key(&key));
        }
        let record = prepare(record)?;
        if let Some(seq) = key.sequence()
            && seq >= self.next_key
        {
            self.next_key = seq.saturating_add(1);
        }
        self.insert_row(key.clone(), record);
        Ok(key)
    }

    /// Lookup one record by key.
    pub fn read<Q>(&self, key: &Q) -> Result<&Keyed<K, R>, StoreError>
    where
        K: Borrow<Q>,
        Q: Ord + Display + ?Sized,
    {
        self.rows
            .get(key)
            .map(|slot| &slot.row)
            .ok_or_else(|| StoreError::not_found(key))
    }

    /// Apply the supplied fields of `patch`, leaving the rest untouched.
    pub fn update<Q>(&mut self, key: &Q, patch: R::Patch) -> Result<&Keyed<K, R>, StoreError>
    where
        K: Borrow<Q>,
        Q: Ord + Display + ?Sized,
    {
        let (staged, ()) = self.stage(key, |record| {
            record.apply(patch);
            Ok(())
        })?;
        self.commit(staged)
    }

    /// Run a fallible domain mutation against one record.
    ///
    /// The closure works on a copy; the copy replaces the stored record only
    /// if the closure succeeds and the result validates.
    pub fn modify<Q, T, F>(&mut self, key: &Q, mutate: F) -> Result<T, StoreError>
    where
        K: Borrow<Q>,
        Q: Ord + Display + ?Sized,
        F: FnOnce(&mut R) -> Result<T, StoreError>,
    {
        let (staged, value) = self.stage(key, mutate)?;
        self.commit(staged)?;
        Ok(value)
    }

    /// Prepare a validated replacement for one record without applying it.
    ///
    /// Used when several records must change together: stage all of them,
    /// then commit all of them.
    pub fn stage<Q, T, F>(&self, key: &Q, mutate: F) -> Result<(Staged<K, R>, T), StoreError>
    where
        K: Borrow<Q>,
        Q: Ord + Display + ?Sized,
        F: FnOnce(&mut R) -> Result<T, StoreError>,
    {
        let current = self.read(key)?;
        let mut working = current.record.clone();
        let value = mutate(&mut working)?;
        let record = prepare(working)?;
        Ok((
            Staged {
                key: current.key.clone(),
                record,
            },
            value,
        ))
    }

    /// Replace a record with a staged copy.
    pub fn commit(&mut self, staged: Staged<K, R>) -> Result<&Keyed<K, R>, StoreError> {
        let slot = self
            .rows
            .get_mut(&staged.key)
            .ok_or_else(|| StoreError::not_found(&staged.key))?;
        slot.row.record = staged.record;
        Ok(&slot.row)
    }

    /// Remove a record entirely, returning it.
    pub fn delete<Q>(&mut self, key: &Q) -> Result<Keyed<K, R>, StoreError>
    where
        K: Borrow<Q>,
        Q: Ord + Display + ?Sized,
    {
        let slot = self
            .rows
            .remove(key)
            .ok_or_else(|| StoreError::not_found(key))?;
        self.order.remove(&slot.position);
        Ok(slot.row)
    }

    /// All records matching `predicate`, in insertion order.
    pub fn find<P>(&self, predicate: P) -> Vec<&Keyed<K, R>>
    where
        P: Fn(&Keyed<K, R>) -> bool,
    {
        self.iter().filter(|row| predicate(row)).collect()
    }

    /// A new ordered sequence of every record; storage order is unchanged.
    pub fn sorted_view(&self, order: SortOrder) -> Vec<&Keyed<K, R>> {
        let mut rows: Vec<&Keyed<K, R>> = self.iter().collect();
        rows.sort_by(|a, b| order.compare(a, b));
        rows
    }

    /// Count, mean, min and max of the measure plus category counts.
    pub fn aggregate(&self) -> Statistics {
        Statistics::collect(self.iter().map(|row| &row.record))
    }

    fn insert_row(&mut self, key: K, record: R) {
        let position = self.next_position;
        self.next_position += 1;
        self.order.insert(position, key.clone());
        self.rows.insert(
            key.clone(),
            Slot {
                position,
                row: Keyed::new(key, record),
            },
        );
    }
}

impl<K, R> RecordStore<K, R>
where
    K: RecordKey + Serialize + DeserializeOwned,
    R: Record + Serialize + DeserializeOwned,
{
    /// Load store state from a JSONL snapshot.
    ///
    /// The key counter resumes from the snapshot's `next_key` header, or from
    /// the highest loaded key when the header is absent.
    pub fn load_jsonl(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let (header, rows): (SnapshotHeader, Vec<Keyed<K, R>>) = read_snapshot_from_path(path)?;
        let mut store = Self::from_rows(rows)?;
        if let Some(next_key) = header.next_key {
            store.next_key = store.next_key.max(next_key);
        }
        Ok(store)
    }

    /// Load a snapshot, treating a missing file as an empty store.
    pub fn load_jsonl_or_empty(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load_jsonl(path)
        } else {
            Ok(Self::new())
        }
    }

    /// Persist store state to a JSONL snapshot, insertion order preserved.
    pub fn save_jsonl(&self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        self.stage_jsonl(path)?.publish()?;
        Ok(())
    }

    /// Write the snapshot to a temporary sibling without replacing `path`.
    ///
    /// Publish the returned write to make it visible; stores that must change
    /// together stage every file before publishing any.
    pub fn stage_jsonl(&self, path: impl AsRef<Path>) -> Result<PendingWrite, SnapshotError> {
        let rows: Vec<&Keyed<K, R>> = self.iter().collect();
        let header = SnapshotHeader {
            next_key: Some(self.next_key),
        };
        Ok(stage_snapshot(path, &header, &rows)?)
    }

    /// Content digest of the current snapshot (`sha256:<hex>`).
    pub fn snapshot_ref(&self) -> Result<String, SnapshotError> {
        let rows: Vec<&Keyed<K, R>> = self.iter().collect();
        Ok(snapshot_ref(&rows)?)
    }
}

fn prepare<R: Record>(mut record: R) -> Result<R, StoreError> {
    record.derive();
    record.validate()?;
    Ok(record)
}
