//! # recordkit-store
//!
//! Record layer for keyed in-memory collections.
//!
//! This crate provides:
//! - `RecordStore<K, R>`: create/read/update/delete, search, sorted views, statistics
//! - the `Record` and `RecordKey` traits every record family implements
//! - record families: students, bank accounts, library books and members
//! - the lending state machine behind borrow/return
//! - JSONL snapshots with lock-scoped mutation, and the flat notes file
//!
//! The store itself never performs I/O. Snapshot and notes helpers sit
//! beside it and are the only parts that touch the filesystem.
//!
//! ## Data model
//!
//! ```text
//! JSONL (on disk, one line per record)
//!     <->  load / save
//! RecordStore (insertion-ordered, uniquely keyed, derived fields consistent)
//! ```

pub mod account;
pub mod atomic_store;
pub mod error;
pub mod jsonl;
pub mod lending;
pub mod library;
pub mod notes;
pub mod query;
pub mod record;
pub mod stats;
pub mod store;
pub mod student;

pub use account::{Account, AccountBook, AccountPatch, Transaction, TransactionKind};
pub use atomic_store::{
    AtomicStoreMutationError, mutate_snapshot, snapshot_lock_path, with_snapshot_lock,
};
pub use error::StoreError;
pub use jsonl::{
    JsonlError, PendingWrite, SnapshotHeader, read_rows_from_path, read_snapshot_from_path,
    snapshot_ref, stage_snapshot, write_rows_to_path,
};
pub use lending::{LendAction, LendState};
pub use library::{Book, BookPatch, Library, Member, MemberPatch};
pub use notes::{NoteFile, NotesError};
pub use query::{SortOrder, key_is, name_contains, pattern_matches, text_contains};
pub use record::{Keyed, Record, RecordKey};
pub use stats::Statistics;
pub use store::{RecordStore, SnapshotError, Staged};
pub use student::{Grade, Student, StudentPatch};
