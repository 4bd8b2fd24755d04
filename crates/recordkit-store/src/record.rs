//! Record and key traits shared by every record family.

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display};

/// A key type a [`RecordStore`](crate::RecordStore) can index by.
///
/// Keys are totally ordered so sorted views can break ties deterministically.
/// Automatic keys are minted from the store's private counter.
pub trait RecordKey: Ord + Clone + Debug + Display {
    /// Build the key for counter value `seq` (counter starts at 1).
    fn from_sequence(seq: u64) -> Self;

    /// Counter value this key corresponds to, if any.
    ///
    /// Caller-supplied keys with a sequence value push the counter past them.
    fn sequence(&self) -> Option<u64>;
}

impl RecordKey for u64 {
    fn from_sequence(seq: u64) -> Self {
        seq
    }

    fn sequence(&self) -> Option<u64> {
        Some(*self)
    }
}

impl RecordKey for String {
    fn from_sequence(seq: u64) -> Self {
        seq.to_string()
    }

    fn sequence(&self) -> Option<u64> {
        self.parse().ok()
    }
}

/// One record family: the named fields, their derived fields, and their domains.
pub trait Record: Clone {
    /// Partial update: every `None` field is left untouched.
    type Patch: Default;

    /// Recompute derived fields from their sources.
    ///
    /// Must be a pure function of the source fields; the store calls it once
    /// per mutation, before `validate`.
    fn derive(&mut self);

    /// Check required fields and numeric domains.
    fn validate(&self) -> Result<(), StoreError>;

    /// Apply the supplied fields of a patch.
    fn apply(&mut self, patch: Self::Patch);

    /// Display name, used by name search and name ordering.
    fn name(&self) -> &str;

    /// The numeric field used by measure ordering and statistics.
    fn measure(&self) -> Option<f64> {
        None
    }

    /// The categorical field counted by statistics.
    fn category(&self) -> Option<String> {
        None
    }
}

/// A record together with the key it is stored under.
///
/// Serializes flat: `{"key": ..., <record fields>}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyed<K, R> {
    pub key: K,
    #[serde(flatten)]
    pub record: R,
}

impl<K, R> Keyed<K, R> {
    pub fn new(key: K, record: R) -> Self {
        Self { key, record }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_keys_report_numeric_sequence_only() {
        assert_eq!("12".to_string().sequence(), Some(12));
        assert_eq!("U001".to_string().sequence(), None);
        assert_eq!(String::from_sequence(3), "3");
    }

    #[test]
    fn integer_keys_are_their_own_sequence() {
        assert_eq!(u64::from_sequence(5), 5);
        assert_eq!(9u64.sequence(), Some(9));
    }
}
