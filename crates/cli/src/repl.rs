//! Interactive loop: prompt, read a line, dispatch it, print the result.
//! Also doubles as pipe mode when stdin is not a TTY — the loop itself
//! doesn't care either way, it just reads until EOF.

use std::io::{self, BufRead, Write};

use ledgerdb_api::Database;

use crate::commands::dispatch;

/// Run the REPL until `quit`/`exit` or EOF on stdin.
pub fn run(db: &Database) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("ledgerdb> ");
        let _ = stdout.flush();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {}
            Err(e) => {
                eprintln!("error reading stdin: {e}");
                break;
            }
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed == "quit" || trimmed == "exit" {
            break;
        }

        match dispatch(db, trimmed) {
            Ok(output) => println!("{output}"),
            Err(err) => eprintln!("error: {err}"),
        }
    }
}
