use crate::cli::NotesCommands;
use crate::support::{Settings, exit_with, print_json};
use recordkit_store::NoteFile;
use serde_json::json;

pub fn run(settings: &Settings, command: NotesCommands, json_output: bool) {
    let notes = NoteFile::new(&settings.notes);
    match command {
        NotesCommands::List => run_list(&notes, json_output),
        NotesCommands::Add { text } => run_add(&notes, text, json_output),
        NotesCommands::Delete { number } => run_delete(&notes, number, json_output),
        NotesCommands::Search { term } => run_search(&notes, term, json_output),
    }
}

fn run_list(notes: &NoteFile, json_output: bool) {
    let items = notes.list().unwrap_or_else(|e| exit_with(e));

    if json_output {
        let numbered = items
            .iter()
            .enumerate()
            .map(|(idx, text)| json!({ "number": idx + 1, "text": text }))
            .collect::<Vec<_>>();
        print_json(&json!({
            "action": "notes.list",
            "notesPath": notes.path().display().to_string(),
            "count": items.len(),
            "items": numbered,
        }));
    } else {
        println!("recordkit notes list");
        if items.is_empty() {
            println!("  (none)");
        }
        for (idx, text) in items.iter().enumerate() {
            println!("  {:>3}. {text}", idx + 1);
        }
    }
}

fn run_add(notes: &NoteFile, text: String, json_output: bool) {
    let number = notes.append(&text).unwrap_or_else(|e| exit_with(e));
    tracing::info!(number, "note added");

    if json_output {
        print_json(&json!({
            "action": "notes.add",
            "notesPath": notes.path().display().to_string(),
            "number": number,
            "text": text,
        }));
    } else {
        println!(
            "recordkit notes add\n  Added: #{number}\n  Path: {}",
            notes.path().display()
        );
    }
}

fn run_delete(notes: &NoteFile, number: usize, json_output: bool) {
    let removed = notes.delete(number).unwrap_or_else(|e| exit_with(e));
    tracing::info!(number, "note deleted");

    if json_output {
        print_json(&json!({
            "action": "notes.delete",
            "notesPath": notes.path().display().to_string(),
            "number": number,
            "text": removed,
        }));
    } else {
        println!("recordkit notes delete\n  Deleted: #{number} {removed}");
    }
}

fn run_search(notes: &NoteFile, term: String, json_output: bool) {
    let hits = notes.search(&term).unwrap_or_else(|e| exit_with(e));

    if json_output {
        let items = hits
            .iter()
            .map(|(number, text)| json!({ "number": number, "text": text }))
            .collect::<Vec<_>>();
        print_json(&json!({
            "action": "notes.search",
            "term": term,
            "count": hits.len(),
            "items": items,
        }));
    } else {
        println!("recordkit notes search\n  {} match(es) for {term:?}", hits.len());
        for (number, text) in &hits {
            println!("  {number:>3}. {text}");
        }
    }
}
