//! JSONL snapshots: one record per line.
//!
//! Every row of a store is a single JSON line, preceded by `# next_key=N`
//! carrying the store's key counter. Files are replaced atomically: the body
//! goes to a temporary sibling which is synced and renamed over the target.

use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::ffi::OsString;
use std::fmt::Display;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

const NEXT_KEY_FIELD: &str = "next_key";

/// Store metadata carried in `# name=value` comment lines ahead of the rows.
///
/// Readers that only want rows skip these lines like any other comment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotHeader {
    /// Next automatic key counter value of the saved store.
    pub next_key: Option<u64>,
}

impl SnapshotHeader {
    fn lines(&self) -> Vec<String> {
        self.next_key
            .map(|next_key| format!("# {NEXT_KEY_FIELD}={next_key}"))
            .into_iter()
            .collect()
    }

    fn absorb(&mut self, line_no: usize, comment: &str) -> Result<(), JsonlError> {
        let Some((name, value)) = comment.split_once('=') else {
            return Ok(());
        };
        if name.trim() != NEXT_KEY_FIELD {
            return Ok(());
        }
        let next_key = value
            .trim()
            .parse()
            .map_err(|e| JsonlError::Parse(line_no, format!("{NEXT_KEY_FIELD}: {e}")))?;
        self.next_key = Some(next_key);
        Ok(())
    }
}

/// Read the header and rows of a JSONL snapshot. Blank lines are skipped.
pub fn read_snapshot<T: DeserializeOwned>(
    reader: impl BufRead,
) -> Result<(SnapshotHeader, Vec<T>), JsonlError> {
    let mut header = SnapshotHeader::default();
    let mut rows = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.map_err(|e| JsonlError::Io(line_no, e.to_string()))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(comment) = trimmed.strip_prefix('#') {
            header.absorb(line_no, comment)?;
            continue;
        }
        let row: T =
            serde_json::from_str(trimmed).map_err(|e| JsonlError::Parse(line_no, e.to_string()))?;
        rows.push(row);
    }
    Ok((header, rows))
}

/// Read rows from a JSONL reader. Blank lines and `#` comments are skipped.
pub fn read_rows<T: DeserializeOwned>(reader: impl BufRead) -> Result<Vec<T>, JsonlError> {
    read_snapshot(reader).map(|(_, rows)| rows)
}

/// Write rows to a JSONL writer.
pub fn write_rows<T: Serialize>(writer: &mut impl Write, rows: &[T]) -> Result<(), JsonlError> {
    for row in rows {
        let line = serde_json::to_string(row).map_err(|e| JsonlError::Serialize(e.to_string()))?;
        writeln!(writer, "{line}").map_err(|e| JsonlError::Io(0, e.to_string()))?;
    }
    Ok(())
}

/// Read the header and rows of a JSONL file path.
pub fn read_snapshot_from_path<T: DeserializeOwned>(
    path: impl AsRef<Path>,
) -> Result<(SnapshotHeader, Vec<T>), JsonlError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| io_at(path, e))?;
    validate_substrate_bytes(path, &bytes)?;
    let (header, rows) = read_snapshot(BufReader::new(bytes.as_slice()))?;
    tracing::debug!(
        path = %path.display(),
        rows = rows.len(),
        next_key = ?header.next_key,
        "snapshot loaded"
    );
    Ok((header, rows))
}

/// Read rows from a JSONL file path.
pub fn read_rows_from_path<T: DeserializeOwned>(
    path: impl AsRef<Path>,
) -> Result<Vec<T>, JsonlError> {
    read_snapshot_from_path(path).map(|(_, rows)| rows)
}

/// Render and stage a snapshot without touching `path` yet.
pub fn stage_snapshot<T: Serialize>(
    path: impl AsRef<Path>,
    header: &SnapshotHeader,
    rows: &[T],
) -> Result<PendingWrite, JsonlError> {
    let mut body = Vec::new();
    for line in header.lines() {
        writeln!(body, "{line}").map_err(|e| JsonlError::Io(0, e.to_string()))?;
    }
    write_rows(&mut body, rows)?;
    PendingWrite::stage(path, &body)
}

/// Write rows to a JSONL file path, replacing it atomically.
pub fn write_rows_to_path<T: Serialize>(
    path: impl AsRef<Path>,
    rows: &[T],
) -> Result<(), JsonlError> {
    stage_snapshot(path, &SnapshotHeader::default(), rows)?.publish()
}

/// Content digest of the JSONL rendering of `rows`, as `sha256:<hex>`.
pub fn snapshot_ref<T: Serialize>(rows: &[T]) -> Result<String, JsonlError> {
    let mut buf = Vec::new();
    write_rows(&mut buf, rows)?;
    Ok(format!("sha256:{:x}", Sha256::digest(&buf)))
}

/// A synced temporary sibling waiting to be renamed over its target.
///
/// Several files can be staged first and published only once every write
/// has succeeded. Dropping an unpublished write removes the temporary file
/// and leaves the target untouched.
#[derive(Debug)]
pub struct PendingWrite {
    target: PathBuf,
    tmp_path: PathBuf,
    published: bool,
}

impl PendingWrite {
    /// Write `contents` to a temporary sibling of `path` and fsync it.
    pub fn stage(path: impl AsRef<Path>, contents: &[u8]) -> Result<Self, JsonlError> {
        let target = path.as_ref().to_path_buf();
        if let Some(parent) = target.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| io_at(parent, e))?;
        }

        let pending = Self {
            tmp_path: tmp_write_path(&target),
            target,
            published: false,
        };
        let write_result = (|| -> Result<(), JsonlError> {
            let mut file =
                File::create(&pending.tmp_path).map_err(|e| io_at(&pending.tmp_path, e))?;
            file.write_all(contents)
                .map_err(|e| io_at(&pending.tmp_path, e))?;
            file.sync_all().map_err(|e| io_at(&pending.tmp_path, e))?;
            Ok(())
        })();

        if let Err(error) = write_result {
            tracing::warn!(path = %pending.target.display(), %error, "snapshot write failed");
            return Err(error);
        }
        Ok(pending)
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Rename the staged file over its target and sync the directory.
    pub fn publish(mut self) -> Result<(), JsonlError> {
        fs::rename(&self.tmp_path, &self.target).map_err(|e| {
            JsonlError::Io(
                0,
                format!(
                    "{} -> {}: {e}",
                    self.tmp_path.display(),
                    self.target.display()
                ),
            )
        })?;
        self.published = true;

        if let Some(parent) = self.target.parent()
            && !parent.as_os_str().is_empty()
        {
            let dir = File::open(parent).map_err(|e| io_at(parent, e))?;
            dir.sync_all().map_err(|e| io_at(parent, e))?;
        }

        tracing::debug!(path = %self.target.display(), "snapshot saved");
        Ok(())
    }
}

impl Drop for PendingWrite {
    fn drop(&mut self) {
        if !self.published {
            let _ = fs::remove_file(&self.tmp_path);
        }
    }
}

fn io_at(path: &Path, err: impl Display) -> JsonlError {
    JsonlError::Io(0, format!("{}: {err}", path.display()))
}

fn tmp_write_path(path: &Path) -> PathBuf {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let mut tmp: OsString = path.as_os_str().to_os_string();
    tmp.push(format!(".tmp.{}.{}", std::process::id(), unique));
    PathBuf::from(tmp)
}

fn validate_substrate_bytes(path: &Path, bytes: &[u8]) -> Result<(), JsonlError> {
    if bytes.contains(&0) {
        return Err(JsonlError::Corrupt(format!(
            "{}: contains NUL byte(s)",
            path.display()
        )));
    }
    if std::str::from_utf8(bytes).is_err() {
        return Err(JsonlError::Corrupt(format!(
            "{}: contains non-UTF-8 byte sequence(s)",
            path.display()
        )));
    }
    Ok(())
}

/// Errors from JSONL operations.
#[derive(Debug, thiserror::Error)]
pub enum JsonlError {
    #[error("line {0}: I/O error: {1}")]
    Io(usize, String),

    #[error("line {0}: parse error: {1}")]
    Parse(usize, String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("corrupted snapshot: {0}")]
    Corrupt(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Keyed;
    use crate::student::Student;
    use std::fs;

    fn temp_path(prefix: &str) -> PathBuf {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "recordkit-jsonl-{prefix}-{}-{unique}.jsonl",
            std::process::id()
        ))
    }

    #[test]
    fn read_rows_from_path_rejects_nul_payload() {
        let path = temp_path("nul");
        fs::write(&path, b"{\"key\":1,\"name\":\"Alice\",\"marks\":80}\n\0garbage")
            .expect("fixture should write");

        let result = read_rows_from_path::<Keyed<u64, Student>>(&path);
        match result {
            Err(JsonlError::Corrupt(message)) => {
                assert!(message.contains("contains NUL"));
            }
            other => panic!("expected corrupt snapshot error, got {other:?}"),
        }

        let _ = fs::remove_file(path);
    }

    #[test]
    fn read_rows_from_path_rejects_non_utf8_payload() {
        let path = temp_path("non-utf8");
        fs::write(&path, [0xff, 0xfe, 0xfd]).expect("fixture should write");

        let result = read_rows_from_path::<Keyed<u64, Student>>(&path);
        match result {
            Err(JsonlError::Corrupt(message)) => {
                assert!(message.contains("non-UTF-8"));
            }
            other => panic!("expected corrupt snapshot error, got {other:?}"),
        }

        let _ = fs::remove_file(path);
    }

    #[test]
    fn read_rows_skips_blank_and_comment_lines() {
        let raw = "# students\n\n{\"key\":3,\"name\":\"Carol Davis\",\"marks\":76.5}\n";
        let rows: Vec<Keyed<u64, Student>> =
            read_rows(BufReader::new(raw.as_bytes())).expect("rows should parse");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].key, 3);
        assert_eq!(rows[0].record.name, "Carol Davis");
    }

    #[test]
    fn parse_errors_report_line_numbers() {
        let raw = "{\"key\":1,\"name\":\"Alice\",\"marks\":80}\nnot json\n";
        let err = read_rows::<Keyed<u64, Student>>(BufReader::new(raw.as_bytes()))
            .expect_err("bad line must error");
        assert!(matches!(err, JsonlError::Parse(2, _)));
    }

    #[test]
    fn write_rows_to_path_replaces_file_atomically() {
        let path = temp_path("atomic-write");
        let first = Keyed::new(1u64, Student::new("First Student", 70.0));
        write_rows_to_path(&path, &[first]).expect("first write should succeed");

        let second = Keyed::new(2u64, Student::new("Second Student", 80.0));
        write_rows_to_path(&path, &[second]).expect("second write should succeed");

        let lines = fs::read_to_string(&path).expect("jsonl should exist");
        assert!(!lines.contains("First Student"));
        assert!(lines.contains("Second Student"));

        let _ = fs::remove_file(path);
    }

    #[test]
    fn snapshot_ref_tracks_content() {
        let a = [Keyed::new(1u64, Student::new("Alice", 80.0))];
        let b = [Keyed::new(1u64, Student::new("Alice", 81.0))];
        let ref_a = snapshot_ref(&a).expect("digest");
        assert!(ref_a.starts_with("sha256:"));
        assert_eq!(ref_a, snapshot_ref(&a).expect("digest"));
        assert_ne!(ref_a, snapshot_ref(&b).expect("digest"));
    }

    #[test]
    fn header_round_trips_and_other_comments_are_ignored() {
        let path = temp_path("header");
        let rows = [Keyed::new(1u64, Student::new("Alice", 80.0))];
        let header = SnapshotHeader { next_key: Some(7) };
        stage_snapshot(&path, &header, &rows)
            .expect("stage should succeed")
            .publish()
            .expect("publish should succeed");

        let text = fs::read_to_string(&path).expect("snapshot should exist");
        assert!(text.starts_with("# next_key=7\n"));

        let (read_header, read): (SnapshotHeader, Vec<Keyed<u64, Student>>) =
            read_snapshot_from_path(&path).expect("snapshot should parse");
        assert_eq!(read_header, header);
        assert_eq!(read.len(), 1);

        let raw = "# exported by hand\n";
        let (plain, _) = read_snapshot::<Keyed<u64, Student>>(BufReader::new(raw.as_bytes()))
            .expect("plain comment should parse");
        assert_eq!(plain.next_key, None);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn malformed_next_key_is_a_parse_error() {
        let raw = "# next_key=lots\n";
        let err = read_snapshot::<Keyed<u64, Student>>(BufReader::new(raw.as_bytes()))
            .expect_err("bad counter must error");
        assert!(matches!(err, JsonlError::Parse(1, _)));
    }

    #[test]
    fn unpublished_write_leaves_target_and_no_temp_file() {
        let dir = temp_path("pending-dir");
        fs::create_dir_all(&dir).expect("dir should be created");
        let target = dir.join("books.jsonl");
        fs::write(&target, "old\n").expect("fixture should write");

        let pending = PendingWrite::stage(&target, b"new\n").expect("stage should succeed");
        assert_eq!(pending.target(), target.as_path());
        drop(pending);

        assert_eq!(fs::read_to_string(&target).expect("target"), "old\n");
        let entries = fs::read_dir(&dir).expect("dir should list").count();
        assert_eq!(entries, 1);

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn stage_fails_when_parent_is_a_file() {
        let blocker = temp_path("blocker");
        fs::write(&blocker, "not a directory").expect("fixture should write");

        let result = PendingWrite::stage(blocker.join("members.jsonl"), b"{}\n");
        assert!(matches!(result, Err(JsonlError::Io(..))));

        let _ = fs::remove_file(blocker);
    }
}
