//! Flat notes file: newline-delimited UTF-8, one opaque note per line.
//!
//! Appending adds one line at the end; deleting atomically replaces the
//! whole file without the chosen line. A missing file is an empty collection.

use crate::jsonl::PendingWrite;
use std::fmt::Display;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum NotesError {
    #[error("{path}: I/O error: {message}")]
    Io { path: String, message: String },

    #[error("note must not be empty")]
    EmptyNote,

    #[error("note must be a single line")]
    MultiLine,

    #[error("no note numbered {number} (have {count})")]
    OutOfRange { number: usize, count: usize },
}

/// Handle on one notes file. Holds no state beyond the path.
#[derive(Debug, Clone)]
pub struct NoteFile {
    path: PathBuf,
}

impl NoteFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All notes in file order.
    pub fn list(&self) -> Result<Vec<String>, NotesError> {
        Ok(self.read_text()?.lines().map(str::to_string).collect())
    }

    /// Append one note, returning its 1-based number.
    pub fn append(&self, note: &str) -> Result<usize, NotesError> {
        if note.trim().is_empty() {
            return Err(NotesError::EmptyNote);
        }
        if note.contains('\n') || note.contains('\r') {
            return Err(NotesError::MultiLine);
        }
        let text = self.read_text()?;
        let count = text.lines().count();
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;
        // A hand-edited file may lack its final newline.
        let separator = if text.is_empty() || text.ends_with('\n') {
            ""
        } else {
            "\n"
        };
        writeln!(file, "{separator}{note}").map_err(|e| self.io_error(e))?;
        Ok(count + 1)
    }

    /// Delete note `number` (1-based), returning its text.
    pub fn delete(&self, number: usize) -> Result<String, NotesError> {
        let mut notes = self.list()?;
        if number == 0 || number > notes.len() {
            return Err(NotesError::OutOfRange {
                number,
                count: notes.len(),
            });
        }
        let removed = notes.remove(number - 1);
        let mut body = String::new();
        for note in &notes {
            body.push_str(note);
            body.push('\n');
        }
        PendingWrite::stage(&self.path, body.as_bytes())
            .and_then(PendingWrite::publish)
            .map_err(|e| self.io_error(e))?;
        tracing::debug!(
            path = %self.path.display(),
            number,
            remaining = notes.len(),
            "notes rewritten"
        );
        Ok(removed)
    }

    /// Notes containing `term`, case-insensitively, as `(number, note)` pairs.
    pub fn search(&self, term: &str) -> Result<Vec<(usize, String)>, NotesError> {
        let term = term.to_lowercase();
        Ok(self
            .list()?
            .into_iter()
            .enumerate()
            .filter(|(_, note)| note.to_lowercase().contains(&term))
            .map(|(idx, note)| (idx + 1, note))
            .collect())
    }

    fn read_text(&self) -> Result<String, NotesError> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(text),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(String::new()),
            Err(err) => Err(self.io_error(err)),
        }
    }

    fn io_error(&self, err: impl Display) -> NotesError {
        NotesError::Io {
            path: self.path.display().to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_notes(prefix: &str) -> NoteFile {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        NoteFile::new(std::env::temp_dir().join(format!(
            "recordkit-notes-{prefix}-{}-{unique}.txt",
            std::process::id()
        )))
    }

    #[test]
    fn missing_file_lists_empty() {
        let notes = temp_notes("missing");
        assert!(notes.list().expect("list").is_empty());
        assert!(notes.search("x").expect("search").is_empty());
    }

    #[test]
    fn delete_rewrites_without_the_chosen_line() {
        let notes = temp_notes("delete");
        for text in ["buy milk", "call Bob", "water plants"] {
            notes.append(text).expect("append");
        }
        assert_eq!(notes.delete(2).expect("delete"), "call Bob");
        assert_eq!(
            notes.list().expect("list"),
            vec!["buy milk".to_string(), "water plants".to_string()]
        );
        let _ = fs::remove_file(notes.path());
    }

    #[test]
    fn delete_out_of_range_leaves_file_alone() {
        let notes = temp_notes("range");
        notes.append("only note").expect("append");
        for number in [0, 2] {
            let err = notes.delete(number).expect_err("out of range must error");
            assert!(matches!(err, NotesError::OutOfRange { count: 1, .. }));
        }
        assert_eq!(notes.list().expect("list").len(), 1);
        let _ = fs::remove_file(notes.path());
    }

    #[test]
    fn blank_and_multiline_notes_are_rejected() {
        let notes = temp_notes("blank");
        assert!(matches!(notes.append("   "), Err(NotesError::EmptyNote)));
        assert!(matches!(notes.append("a\nb"), Err(NotesError::MultiLine)));
        assert!(!notes.path().exists());
    }

    #[test]
    fn search_is_case_insensitive_and_numbered() {
        let notes = temp_notes("search");
        for text in ["Buy MILK", "call Bob", "milkshake recipe"] {
            notes.append(text).expect("append");
        }
        let hits = notes.search("milk").expect("search");
        assert_eq!(
            hits,
            vec![
                (1, "Buy MILK".to_string()),
                (3, "milkshake recipe".to_string())
            ]
        );
        let _ = fs::remove_file(notes.path());
    }

    #[test]
    fn append_after_missing_final_newline_keeps_notes_apart() {
        let notes = temp_notes("newline");
        fs::write(notes.path(), "first\nsecond").expect("fixture should write");
        assert_eq!(notes.append("third").expect("append"), 3);
        assert_eq!(
            notes.list().expect("list"),
            vec![
                "first".to_string(),
                "second".to_string(),
                "third".to_string()
            ]
        );
        let _ = fs::remove_file(notes.path());
    }

    #[test]
    fn delete_leaves_no_temporary_files_behind() {
        let dir = std::env::temp_dir().join(format!(
            "recordkit-notes-dir-{}-{}",
            std::process::id(),
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock should be after unix epoch")
                .as_nanos()
        ));
        let notes = NoteFile::new(dir.join("notes.txt"));
        for text in ["a", "b"] {
            notes.append(text).expect("append");
        }
        notes.delete(1).expect("delete");
        assert_eq!(notes.list().expect("list"), vec!["b".to_string()]);
        assert_eq!(fs::read_dir(&dir).expect("dir should list").count(), 1);
        let _ = fs::remove_dir_all(dir);
    }
}
