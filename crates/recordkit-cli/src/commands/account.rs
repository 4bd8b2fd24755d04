use crate::cli::{AccountCommands, AccountSortArg};
use crate::support::{
    Settings, exit_with, load_existing_or_exit, mutation_or_exit, print_json,
    snapshot_ref_or_exit,
};
use recordkit_store::{
    Account, AccountBook, Keyed, RecordStore, SortOrder, StoreError, Transaction, mutate_snapshot,
};
use serde_json::{Value, json};

pub fn run(settings: &Settings, command: AccountCommands, json_output: bool) {
    match command {
        AccountCommands::Open {
            number,
            holder,
            initial,
        } => run_open(settings, number, holder, initial, json_output),

        AccountCommands::Deposit { number, amount } => {
            run_move(settings, number, amount, Direction::Deposit, json_output)
        }

        AccountCommands::Withdraw { number, amount } => {
            run_move(settings, number, amount, Direction::Withdraw, json_output)
        }

        AccountCommands::Show { number } => run_show(settings, number, json_output),

        AccountCommands::History { number } => run_history(settings, number, json_output),

        AccountCommands::Rename { number, holder } => {
            run_rename(settings, number, holder, json_output)
        }

        AccountCommands::Close { number } => run_close(settings, number, json_output),

        AccountCommands::List { by } => run_list(settings, by, json_output),
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Deposit,
    Withdraw,
}

impl Direction {
    fn action(self) -> &'static str {
        match self {
            Direction::Deposit => "account.deposit",
            Direction::Withdraw => "account.withdraw",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Direction::Deposit => "Deposited",
            Direction::Withdraw => "Withdrew",
        }
    }
}

/// Run one lock-scoped mutation against the account book; saves on success.
fn mutate_book_or_exit<T, F>(settings: &Settings, mutate: F) -> T
where
    F: FnOnce(&mut AccountBook) -> Result<T, StoreError>,
{
    mutation_or_exit(mutate_snapshot::<String, Account, _, StoreError, _>(
        &settings.accounts,
        |store| {
            let mut book = AccountBook::from(std::mem::take(store));
            let value = mutate(&mut book)?;
            *store = book.into_store();
            Ok((value, true))
        },
    ))
}

fn run_open(settings: &Settings, number: String, holder: String, initial: f64, json_output: bool) {
    let row = mutate_book_or_exit(settings, |book| {
        Ok(book.open(number, holder, initial)?.clone())
    });
    tracing::info!(number = %row.key, balance = row.record.balance(), "account opened");

    if json_output {
        print_json(&json!({
            "action": "account.open",
            "accountsPath": settings.accounts.display().to_string(),
            "account": account_json(&row),
        }));
    } else {
        println!(
            "recordkit account open\n  Opened: {} ({})\n  Balance: {:.2}\n  Path: {}",
            row.key,
            row.record.holder,
            row.record.balance(),
            settings.accounts.display()
        );
    }
}

fn run_move(
    settings: &Settings,
    number: String,
    amount: f64,
    direction: Direction,
    json_output: bool,
) {
    let balance = mutate_book_or_exit(settings, |book| match direction {
        Direction::Deposit => book.deposit(&number, amount),
        Direction::Withdraw => book.withdraw(&number, amount),
    });
    tracing::info!(
        number = %number,
        amount,
        balance,
        action = direction.action(),
        "balance changed"
    );

    if json_output {
        print_json(&json!({
            "action": direction.action(),
            "accountsPath": settings.accounts.display().to_string(),
            "number": number,
            "amount": amount,
            "balance": balance,
        }));
    } else {
        println!(
            "recordkit {}\n  {}: {amount:.2}\n  Balance: {balance:.2}",
            direction.action().replace('.', " "),
            direction.label()
        );
    }
}

fn run_show(settings: &Settings, number: String, json_output: bool) {
    let store: RecordStore<String, Account> = load_existing_or_exit(&settings.accounts);
    let row = store.read(number.as_str()).unwrap_or_else(|e| exit_with(e));

    if json_output {
        print_json(&json!({
            "action": "account.show",
            "account": account_json(row),
        }));
    } else {
        println!("recordkit account show");
        println!("  Number: {}", row.key);
        println!("  Holder: {}", row.record.holder);
        println!("  Balance: {:.2}", row.record.balance());
        println!("  Transactions: {}", row.record.transaction_count());
    }
}

fn run_history(settings: &Settings, number: String, json_output: bool) {
    let book = AccountBook::from(load_existing_or_exit::<String, Account>(
        &settings.accounts,
    ));
    let history = book.history(&number).unwrap_or_else(|e| exit_with(e));

    if json_output {
        print_json(&json!({
            "action": "account.history",
            "number": number,
            "count": history.len(),
            "items": history.iter().map(transaction_json).collect::<Vec<_>>(),
        }));
    } else {
        println!("recordkit account history {number}");
        for entry in history {
            println!(
                "  {}  {:<10} {:>12.2}  balance {:>12.2}",
                entry.at.format("%Y-%m-%d %H:%M:%S"),
                entry.kind.as_str(),
                entry.amount,
                entry.balance_after
            );
        }
    }
}

fn run_rename(settings: &Settings, number: String, holder: String, json_output: bool) {
    let row = mutate_book_or_exit(settings, |book| {
        Ok(book.rename_holder(&number, holder)?.clone())
    });

    if json_output {
        print_json(&json!({
            "action": "account.rename",
            "accountsPath": settings.accounts.display().to_string(),
            "account": account_json(&row),
        }));
    } else {
        println!(
            "recordkit account rename\n  Renamed: {} ({})",
            row.key, row.record.holder
        );
    }
}

fn run_close(settings: &Settings, number: String, json_output: bool) {
    let row = mutate_book_or_exit(settings, |book| book.close(&number));
    tracing::info!(number = %row.key, balance = row.record.balance(), "account closed");

    if json_output {
        print_json(&json!({
            "action": "account.close",
            "accountsPath": settings.accounts.display().to_string(),
            "account": account_json(&row),
        }));
    } else {
        println!(
            "recordkit account close\n  Closed: {} ({})\n  Final balance: {:.2}",
            row.key,
            row.record.holder,
            row.record.balance()
        );
    }
}

fn run_list(settings: &Settings, by: AccountSortArg, json_output: bool) {
    let store: RecordStore<String, Account> = load_existing_or_exit(&settings.accounts);
    let order = SortOrder::from(by);
    let rows = store.sorted_view(order);

    if json_output {
        print_json(&json!({
            "action": "account.list",
            "accountsPath": settings.accounts.display().to_string(),
            "snapshotRef": snapshot_ref_or_exit(&store),
            "order": order.as_str(),
            "count": rows.len(),
            "items": rows.iter().map(|row| account_json(row)).collect::<Vec<_>>(),
        }));
    } else {
        println!("recordkit account list");
        if rows.is_empty() {
            println!("  (none)");
        }
        for row in rows {
            println!(
                "  {:<10} {:<24} {:>12.2}",
                row.key,
                row.record.holder,
                row.record.balance()
            );
        }
    }
}

fn account_json(row: &Keyed<String, Account>) -> Value {
    json!({
        "number": row.key,
        "holder": row.record.holder,
        "balance": row.record.balance(),
        "transactionCount": row.record.transaction_count(),
    })
}

fn transaction_json(entry: &Transaction) -> Value {
    json!({
        "kind": entry.kind.as_str(),
        "amount": entry.amount,
        "balanceAfter": entry.balance_after,
        "at": entry.at.to_rfc3339(),
    })
}
