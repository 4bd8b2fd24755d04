//! recordkit CLI: the `recordkit` command.

mod cli;
mod commands;
mod support;

use clap::Parser;
use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();
    let settings =
        support::Settings::resolve(&cli.data_dir).unwrap_or_else(|e| support::exit_with(e));
    support::init_tracing(settings.log_filter.as_deref());
    tracing::debug!(data_dir = %settings.data_dir.display(), "settings resolved");

    let json = cli.json;
    match cli.command {
        Commands::Student { command } => commands::student::run(&settings, command, json),
        Commands::Account { command } => commands::account::run(&settings, command, json),
        Commands::Library { command } => commands::library::run(&settings, command, json),
        Commands::Notes { command } => commands::notes::run(&settings, command, json),
    }
}
