use crate::cli::{StudentCommands, StudentFieldArg, StudentSortArg};
use crate::support::{
    Settings, exit_with, load_existing_or_exit, mutation_or_exit, print_json,
    snapshot_ref_or_exit, to_json_or_exit,
};
use recordkit_store::{
    Keyed, Record, RecordStore, SortOrder, StoreError, Student, StudentPatch, mutate_snapshot,
    pattern_matches, text_contains,
};
use regex::Regex;
use serde_json::json;

type StudentRow = Keyed<u64, Student>;

pub fn run(settings: &Settings, command: StudentCommands, json_output: bool) {
    match command {
        StudentCommands::Add {
            name,
            marks,
            email,
            phone,
        } => run_add(settings, name, marks, email, phone, json_output),

        StudentCommands::List => run_list(settings, json_output),

        StudentCommands::Show { id } => run_show(settings, id, json_output),

        StudentCommands::Update {
            id,
            name,
            marks,
            email,
            phone,
        } => run_update(
            settings,
            id,
            StudentPatch {
                name,
                marks,
                email,
                phone,
            },
            json_output,
        ),

        StudentCommands::Delete { id } => run_delete(settings, id, json_output),

        StudentCommands::Find { term, field, regex } => {
            run_find(settings, term, field, regex, json_output)
        }

        StudentCommands::Sort { by } => run_sort(settings, by, json_output),

        StudentCommands::Stats => run_stats(settings, json_output),

        StudentCommands::Seed => run_seed(settings, json_output),
    }
}

fn run_add(
    settings: &Settings,
    name: String,
    marks: f64,
    email: String,
    phone: String,
    json_output: bool,
) {
    let student = Student::new(name, marks)
        .with_email(email)
        .with_phone(phone);
    let row = mutation_or_exit(mutate_snapshot::<u64, Student, _, StoreError, _>(
        &settings.students,
        |store| {
            let key = store.create(student)?;
            Ok((store.read(&key)?.clone(), true))
        },
    ));
    tracing::info!(key = row.key, grade = %row.record.grade(), "student added");

    if json_output {
        print_json(&json!({
            "action": "student.add",
            "studentsPath": settings.students.display().to_string(),
            "student": to_json_or_exit(&row),
        }));
    } else {
        println!(
            "recordkit student add\n  Added: {} {} [{}]\n  Path: {}",
            row.key,
            row.record.name,
            row.record.grade(),
            settings.students.display()
        );
    }
}

fn run_list(settings: &Settings, json_output: bool) {
    let store: RecordStore<u64, Student> = load_existing_or_exit(&settings.students);
    let rows: Vec<&StudentRow> = store.iter().collect();

    if json_output {
        print_json(&json!({
            "action": "student.list",
            "studentsPath": settings.students.display().to_string(),
            "snapshotRef": snapshot_ref_or_exit(&store),
            "count": rows.len(),
            "items": to_json_or_exit(&rows),
        }));
    } else {
        println!("recordkit student list");
        print_rows(&rows);
    }
}

fn run_show(settings: &Settings, id: u64, json_output: bool) {
    let store: RecordStore<u64, Student> = load_existing_or_exit(&settings.students);
    let row = store.read(&id).unwrap_or_else(|e| exit_with(e));

    if json_output {
        print_json(&json!({
            "action": "student.show",
            "student": to_json_or_exit(row),
        }));
    } else {
        let student = &row.record;
        println!("recordkit student show");
        println!("  ID: {}", row.key);
        println!("  Name: {}", student.name);
        println!("  Marks: {:.2}", student.marks);
        println!("  Grade: {}", student.grade());
        if !student.email().is_empty() {
            println!("  Email: {}", student.email());
        }
        if !student.phone().is_empty() {
            println!("  Phone: {}", student.phone());
        }
    }
}

fn run_update(settings: &Settings, id: u64, patch: StudentPatch, json_output: bool) {
    let changed = !patch.is_empty();
    let row = mutation_or_exit(mutate_snapshot::<u64, Student, _, StoreError, _>(
        &settings.students,
        |store| Ok((store.update(&id, patch)?.clone(), changed)),
    ));
    tracing::info!(key = row.key, changed, "student updated");

    if json_output {
        print_json(&json!({
            "action": "student.update",
            "studentsPath": settings.students.display().to_string(),
            "changed": changed,
            "student": to_json_or_exit(&row),
        }));
    } else {
        println!(
            "recordkit student update\n  Updated: {} {} [{}]",
            row.key,
            row.record.name,
            row.record.grade()
        );
    }
}

fn run_delete(settings: &Settings, id: u64, json_output: bool) {
    let row = mutation_or_exit(mutate_snapshot::<u64, Student, _, StoreError, _>(
        &settings.students,
        |store| Ok((store.delete(&id)?, true)),
    ));
    tracing::info!(key = row.key, "student deleted");

    if json_output {
        print_json(&json!({
            "action": "student.delete",
            "studentsPath": settings.students.display().to_string(),
            "student": to_json_or_exit(&row),
        }));
    } else {
        println!(
            "recordkit student delete\n  Deleted: {} {}",
            row.key, row.record.name
        );
    }
}

fn run_find(
    settings: &Settings,
    term: String,
    field: StudentFieldArg,
    use_regex: bool,
    json_output: bool,
) {
    let store: RecordStore<u64, Student> = load_existing_or_exit(&settings.students);
    let accessor: fn(&Student) -> &str = match field {
        StudentFieldArg::Name => <Student as Record>::name,
        StudentFieldArg::Email => Student::email,
        StudentFieldArg::Phone => Student::phone,
    };
    let rows = if use_regex {
        let pattern = Regex::new(&term)
            .unwrap_or_else(|e| exit_with(format!("invalid pattern {term:?}: {e}")));
        store.find(pattern_matches(accessor, pattern))
    } else {
        store.find(text_contains(accessor, &term))
    };

    if json_output {
        print_json(&json!({
            "action": "student.find",
            "term": term,
            "field": field_name(field),
            "regex": use_regex,
            "count": rows.len(),
            "items": to_json_or_exit(&rows),
        }));
    } else {
        println!(
            "recordkit student find\n  {} match(es) for {term:?} in {}",
            rows.len(),
            field_name(field)
        );
        print_rows(&rows);
    }
}

fn run_sort(settings: &Settings, by: StudentSortArg, json_output: bool) {
    let store: RecordStore<u64, Student> = load_existing_or_exit(&settings.students);
    let order = SortOrder::from(by);
    let rows = store.sorted_view(order);

    if json_output {
        print_json(&json!({
            "action": "student.sort",
            "order": order.as_str(),
            "count": rows.len(),
            "items": to_json_or_exit(&rows),
        }));
    } else {
        println!("recordkit student sort ({})", order.as_str());
        print_rows(&rows);
    }
}

fn run_stats(settings: &Settings, json_output: bool) {
    let store: RecordStore<u64, Student> = load_existing_or_exit(&settings.students);
    let stats = store.aggregate();

    if json_output {
        print_json(&json!({
            "action": "student.stats",
            "stats": to_json_or_exit(&stats),
        }));
    } else {
        println!("recordkit student stats");
        println!("  Students: {}", stats.count);
        println!("  Mean: {}", format_measure(stats.mean));
        println!("  Min: {}", format_measure(stats.min));
        println!("  Max: {}", format_measure(stats.max));
        if !stats.group_counts.is_empty() {
            println!("  Grades:");
            for (grade, count) in &stats.group_counts {
                println!("    {grade:<2} {count}");
            }
        }
    }
}

fn run_seed(settings: &Settings, json_output: bool) {
    let keys = mutation_or_exit(mutate_snapshot::<u64, Student, _, String, _>(
        &settings.students,
        |store| {
            if !store.is_empty() {
                return Err(format!(
                    "register already holds {} student(s); seed needs an empty register",
                    store.len()
                ));
            }
            let keys = Student::sample_roster()
                .into_iter()
                .map(|student| store.create(student))
                .collect::<Result<Vec<u64>, StoreError>>()
                .map_err(|e| e.to_string())?;
            Ok((keys, true))
        },
    ));
    tracing::info!(count = keys.len(), "sample roster seeded");

    if json_output {
        print_json(&json!({
            "action": "student.seed",
            "studentsPath": settings.students.display().to_string(),
            "keys": keys,
        }));
    } else {
        println!(
            "recordkit student seed\n  Added: {} student(s)\n  Path: {}",
            keys.len(),
            settings.students.display()
        );
    }
}

fn print_rows(rows: &[&StudentRow]) {
    if rows.is_empty() {
        println!("  (none)");
        return;
    }
    for row in rows {
        let student = &row.record;
        println!(
            "  {:>4}  {:<24} {:>6.2}  {:<2}  {}",
            row.key,
            student.name,
            student.marks,
            student.grade(),
            student.email()
        );
    }
}

fn field_name(field: StudentFieldArg) -> &'static str {
    match field {
        StudentFieldArg::Name => "name",
        StudentFieldArg::Email => "email",
        StudentFieldArg::Phone => "phone",
    }
}

fn format_measure(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}"))
}
