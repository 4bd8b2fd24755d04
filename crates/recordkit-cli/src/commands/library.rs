use crate::cli::LibraryCommands;
use crate::support::{Settings, exit_with, load_or_empty_or_exit, mutation_or_exit, print_json};
use recordkit_store::{
    AtomicStoreMutationError, Book, BookPatch, Keyed, LendState, Library, Member, RecordStore,
    StoreError, with_snapshot_lock,
};
use serde_json::{Value, json};

pub fn run(settings: &Settings, command: LibraryCommands, json_output: bool) {
    match command {
        LibraryCommands::AddBook {
            isbn,
            title,
            author,
        } => run_add_book(settings, isbn, title, author, json_output),

        LibraryCommands::UpdateBook {
            isbn,
            title,
            author,
        } => run_update_book(settings, isbn, BookPatch { title, author }, json_output),

        LibraryCommands::RemoveBook { isbn } => run_remove_book(settings, isbn, json_output),

        LibraryCommands::AddMember { user_id, name } => {
            run_add_member(settings, user_id, name, json_output)
        }

        LibraryCommands::RemoveMember { user_id } => {
            run_remove_member(settings, user_id, json_output)
        }

        LibraryCommands::Borrow { user_id, isbn } => {
            run_lend(settings, user_id, isbn, Lend::Borrow, json_output)
        }

        LibraryCommands::Return { user_id, isbn } => {
            run_lend(settings, user_id, isbn, Lend::Return, json_output)
        }

        LibraryCommands::Books => run_books(settings, false, json_output),

        LibraryCommands::Available => run_books(settings, true, json_output),

        LibraryCommands::Members => run_members(settings, json_output),

        LibraryCommands::Seed => run_seed(settings, json_output),
    }
}

#[derive(Clone, Copy)]
enum Lend {
    Borrow,
    Return,
}

/// Load both library snapshots under the books lock, mutate, then save both.
///
/// Either snapshot may be missing; a missing file is an empty store. Both
/// files are written and synced before either replaces its target.
fn mutate_library_or_exit<T, F>(settings: &Settings, mutate: F) -> T
where
    F: FnOnce(&mut Library) -> Result<T, StoreError>,
{
    mutation_or_exit(with_snapshot_lock::<_, StoreError, _>(&settings.books, || {
        let books: RecordStore<String, Book> = RecordStore::load_jsonl_or_empty(&settings.books)
            .map_err(AtomicStoreMutationError::Store)?;
        let members: RecordStore<String, Member> =
            RecordStore::load_jsonl_or_empty(&settings.members)
                .map_err(AtomicStoreMutationError::Store)?;
        let mut library =
            Library::from_stores(books, members).map_err(AtomicStoreMutationError::Mutation)?;
        let value = mutate(&mut library).map_err(AtomicStoreMutationError::Mutation)?;
        let (books, members) = library.into_stores();
        let staged_books = books
            .stage_jsonl(&settings.books)
            .map_err(AtomicStoreMutationError::Store)?;
        let staged_members = members
            .stage_jsonl(&settings.members)
            .map_err(AtomicStoreMutationError::Store)?;
        for staged in [staged_books, staged_members] {
            staged
                .publish()
                .map_err(|e| AtomicStoreMutationError::Store(e.into()))?;
        }
        Ok(value)
    }))
}

fn load_library_or_exit(settings: &Settings) -> Library {
    if !settings.books.exists() && !settings.members.exists() {
        exit_with(format!("snapshot not found: {}", settings.books.display()));
    }
    let books = load_or_empty_or_exit(&settings.books);
    let members = load_or_empty_or_exit(&settings.members);
    Library::from_stores(books, members).unwrap_or_else(|e| exit_with(e))
}

fn run_add_book(
    settings: &Settings,
    isbn: String,
    title: String,
    author: String,
    json_output: bool,
) {
    let row = mutate_library_or_exit(settings, |library| {
        let key = library.add_book(isbn, Book::new(title, author))?;
        Ok(library.books().read(key.as_str())?.clone())
    });
    tracing::info!(isbn = %row.key, "book added");

    if json_output {
        print_json(&json!({
            "action": "library.add-book",
            "booksPath": settings.books.display().to_string(),
            "book": book_json(&row),
        }));
    } else {
        println!(
            "recordkit library add-book\n  Added: {} {}\n  Path: {}",
            row.key,
            row.record.title,
            settings.books.display()
        );
    }
}

fn run_update_book(settings: &Settings, isbn: String, patch: BookPatch, json_output: bool) {
    let row = mutate_library_or_exit(settings, |library| {
        Ok(library.update_book(&isbn, patch)?.clone())
    });
    tracing::info!(isbn = %row.key, "book updated");

    if json_output {
        print_json(&json!({
            "action": "library.update-book",
            "booksPath": settings.books.display().to_string(),
            "book": book_json(&row),
        }));
    } else {
        println!(
            "recordkit library update-book\n  Updated: {} {} ({})",
            row.key, row.record.title, row.record.author
        );
    }
}

fn run_remove_book(settings: &Settings, isbn: String, json_output: bool) {
    let row = mutate_library_or_exit(settings, |library| library.remove_book(&isbn));
    tracing::info!(isbn = %row.key, "book removed");

    if json_output {
        print_json(&json!({
            "action": "library.remove-book",
            "booksPath": settings.books.display().to_string(),
            "book": book_json(&row),
        }));
    } else {
        println!(
            "recordkit library remove-book\n  Removed: {} {}",
            row.key, row.record.title
        );
    }
}

fn run_add_member(settings: &Settings, user_id: String, name: String, json_output: bool) {
    let row = mutate_library_or_exit(settings, |library| {
        let key = library.add_member(user_id, Member::new(name))?;
        Ok(library.members().read(key.as_str())?.clone())
    });
    tracing::info!(user_id = %row.key, "member added");

    if json_output {
        print_json(&json!({
            "action": "library.add-member",
            "membersPath": settings.members.display().to_string(),
            "member": member_json(&row),
        }));
    } else {
        println!(
            "recordkit library add-member\n  Added: {} {}\n  Path: {}",
            row.key,
            row.record.name,
            settings.members.display()
        );
    }
}

fn run_remove_member(settings: &Settings, user_id: String, json_output: bool) {
    let row = mutate_library_or_exit(settings, |library| library.remove_member(&user_id));
    tracing::info!(user_id = %row.key, "member removed");

    if json_output {
        print_json(&json!({
            "action": "library.remove-member",
            "membersPath": settings.members.display().to_string(),
            "member": member_json(&row),
        }));
    } else {
        println!(
            "recordkit library remove-member\n  Removed: {} {}",
            row.key, row.record.name
        );
    }
}

fn run_lend(settings: &Settings, user_id: String, isbn: String, lend: Lend, json_output: bool) {
    let state = mutate_library_or_exit(settings, |library| match lend {
        Lend::Borrow => library.borrow(&user_id, &isbn),
        Lend::Return => library.return_book(&user_id, &isbn),
    });
    let (action, verb) = match lend {
        Lend::Borrow => ("library.borrow", "Borrowed"),
        Lend::Return => ("library.return", "Returned"),
    };
    tracing::info!(%isbn, %user_id, state = %state, "lending state changed");

    if json_output {
        print_json(&json!({
            "action": action,
            "isbn": isbn,
            "userId": user_id,
            "state": state_json(&state),
        }));
    } else {
        println!(
            "recordkit {}\n  {verb}: {isbn} ({user_id})\n  Now: {state}",
            action.replace('.', " ")
        );
    }
}

fn run_books(settings: &Settings, only_available: bool, json_output: bool) {
    let library = load_library_or_exit(settings);
    let rows: Vec<&Keyed<String, Book>> = if only_available {
        library.available_books()
    } else {
        library.books().iter().collect()
    };
    let action = if only_available {
        "library.available"
    } else {
        "library.books"
    };

    if json_output {
        print_json(&json!({
            "action": action,
            "booksPath": settings.books.display().to_string(),
            "count": rows.len(),
            "items": rows.iter().map(|row| book_json(row)).collect::<Vec<_>>(),
        }));
    } else {
        println!("recordkit {}", action.replace('.', " "));
        if rows.is_empty() {
            println!("  (none)");
        }
        for row in rows {
            println!(
                "  {:<8} {:<28} {:<24} {}",
                row.key,
                row.record.title,
                row.record.author,
                row.record.lending()
            );
        }
    }
}

fn run_members(settings: &Settings, json_output: bool) {
    let library = load_library_or_exit(settings);
    let rows: Vec<&Keyed<String, Member>> = library.members().iter().collect();

    if json_output {
        print_json(&json!({
            "action": "library.members",
            "membersPath": settings.members.display().to_string(),
            "count": rows.len(),
            "items": rows.iter().map(|row| member_json(row)).collect::<Vec<_>>(),
        }));
    } else {
        println!("recordkit library members");
        if rows.is_empty() {
            println!("  (none)");
        }
        for row in rows {
            let held = row.record.borrowed();
            if held.is_empty() {
                println!("  {:<8} {}", row.key, row.record.name);
            } else {
                println!(
                    "  {:<8} {} (holding {})",
                    row.key,
                    row.record.name,
                    held.join(", ")
                );
            }
        }
    }
}

fn run_seed(settings: &Settings, json_output: bool) {
    let (books, members) = mutate_library_or_exit(settings, |library| {
        if !library.books().is_empty() || !library.members().is_empty() {
            return Err(StoreError::InvalidStateTransition {
                key: "library".to_string(),
                from: format!(
                    "holding {} book(s) and {} member(s)",
                    library.books().len(),
                    library.members().len()
                ),
                action: "seed".to_string(),
            });
        }
        *library = Library::sample()?;
        Ok((library.books().len(), library.members().len()))
    });
    tracing::info!(books, members, "sample library seeded");

    if json_output {
        print_json(&json!({
            "action": "library.seed",
            "booksPath": settings.books.display().to_string(),
            "membersPath": settings.members.display().to_string(),
            "books": books,
            "members": members,
        }));
    } else {
        println!(
            "recordkit library seed\n  Added: {books} book(s), {members} member(s)\n  Path: {}",
            settings.data_dir.display()
        );
    }
}

fn book_json(row: &Keyed<String, Book>) -> Value {
    json!({
        "isbn": row.key,
        "title": row.record.title,
        "author": row.record.author,
        "available": row.record.is_available(),
        "lending": state_json(row.record.lending()),
    })
}

fn member_json(row: &Keyed<String, Member>) -> Value {
    json!({
        "userId": row.key,
        "name": row.record.name,
        "borrowed": row.record.borrowed(),
    })
}

fn state_json(state: &LendState) -> Value {
    json!({
        "available": state.is_available(),
        "holder": state.holder(),
    })
}
