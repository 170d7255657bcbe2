//! ledgerdb CLI — a thin driver over [`ledgerdb_api::Database`].
//!
//! Two modes:
//! - **Shell mode**: `ledgerdb --db ./data COMMAND ...` — run one command, exit
//! - **REPL mode**: `ledgerdb --db ./data` with no trailing command — interactive prompt

mod commands;
mod repl;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use ledgerdb_api::Database;

#[derive(Parser)]
#[command(name = "ledgerdb", about = "Embedded document store CLI")]
struct Cli {
    /// Directory the database lives in.
    #[arg(long, default_value = "./data")]
    db: PathBuf,

    /// A single command to run (e.g. `begin`, `read <txn> <key>`). If
    /// omitted, starts an interactive REPL.
    #[arg(trailing_var_arg = true)]
    command: Vec<String>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let db = match Database::open(&cli.db) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("failed to open {}: {e}", cli.db.display());
            return ExitCode::FAILURE;
        }
    };

    if cli.command.is_empty() {
        repl::run(&db);
        ExitCode::SUCCESS
    } else {
        let line = cli.command.join(" ");
        match commands::dispatch(&db, &line) {
            Ok(output) => {
                println!("{output}");
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("error: {err}");
                ExitCode::FAILURE
            }
        }
    }
}
