//! Line-oriented command dispatch: parses one input line and drives a
//! [`Database`] through it. Shared between shell mode and REPL mode.

use ledgerdb_api::Database;
use ledgerdb_core::TransactionId;
use uuid::Uuid;

/// Parse `line` and execute it against `db`, returning the text to print.
pub fn dispatch(db: &Database, line: &str) -> Result<String, String> {
    let mut parts = line.split_whitespace();
    let command = parts.next().ok_or_else(|| "empty command".to_string())?;
    let rest: Vec<&str> = parts.collect();

    match command {
        "begin" => {
            let txn = db.begin_transaction().map_err(|e| e.to_string())?;
            Ok(format!("txn {}", txn))
        }
        "write" => {
            let [txn, key] = take2(&rest, "write <txn> <key> <json>")?;
            let json_text = remainder(line, 3);
            let patch = serde_json::from_str(&json_text)
                .map_err(|e| format!("invalid JSON patch: {}", e))?;
            db.write(parse_txn(txn)?, key, patch)
                .map_err(|e| e.to_string())?;
            Ok("ok".to_string())
        }
        "read" => {
            let [txn, key] = take2(&rest, "read <txn> <key>")?;
            match db.read(parse_txn(txn)?, key).map_err(|e| e.to_string())? {
                Some(value) => Ok(value.to_string()),
                None => Ok("null".to_string()),
            }
        }
        "delete" => {
            let [txn, key] = take2(&rest, "delete <txn> <key>")?;
            db.delete(parse_txn(txn)?, key).map_err(|e| e.to_string())?;
            Ok("ok".to_string())
        }
        "commit" => {
            let txn = take1(&rest, "commit <txn>")?;
            db.commit(parse_txn(txn)?).map_err(|e| e.to_string())?;
            Ok("committed".to_string())
        }
        "rollback" => {
            let txn = take1(&rest, "rollback <txn>")?;
            db.rollback(parse_txn(txn)?).map_err(|e| e.to_string())?;
            Ok("rolled back".to_string())
        }
        "checkpoint" => {
            db.force_checkpoint().map_err(|e| e.to_string())?;
            Ok("checkpoint written".to_string())
        }
        "active" => {
            let ids = db.active_transactions();
            if ids.is_empty() {
                Ok("(no active transactions)".to_string())
            } else {
                Ok(ids
                    .iter()
                    .map(|id| id.to_string())
                    .collect::<Vec<_>>()
                    .join("\n"))
            }
        }
        "shutdown" => {
            db.shutdown().map_err(|e| e.to_string())?;
            Ok("shutdown complete".to_string())
        }
        "help" => Ok(HELP_TEXT.to_string()),
        other => Err(format!("unknown command: {other} (try `help`)")),
    }
}

const HELP_TEXT: &str = "\
begin                        start a transaction, prints its id
write <txn> <key> <json>     deep-merge <json> onto <key> under <txn>
read <txn> <key>              read <key>'s value visible to <txn>
delete <txn> <key>            delete <key> under <txn>
commit <txn>                  commit <txn>
rollback <txn>                roll back <txn>
checkpoint                    force a WAL checkpoint
active                        list active transaction ids
shutdown                       roll back all active transactions, flush
help                           show this text
quit                          exit";

fn parse_txn(text: &str) -> Result<TransactionId, String> {
    Uuid::parse_str(text)
        .map(TransactionId)
        .map_err(|_| format!("not a valid transaction id: {text}"))
}

fn take1<'a>(rest: &[&'a str], usage: &str) -> Result<&'a str, String> {
    rest.first().copied().ok_or_else(|| format!("usage: {usage}"))
}

fn take2<'a>(rest: &[&'a str], usage: &str) -> Result<[&'a str; 2], String> {
    match rest {
        [a, b, ..] => Ok([a, b]),
        _ => Err(format!("usage: {usage}")),
    }
}

/// The input line's whitespace-delimited tokens from `skip` onward, rejoined
/// verbatim so a JSON patch argument can itself contain spaces.
fn remainder(line: &str, skip: usize) -> String {
    line.split_whitespace().skip(skip).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn begin_write_read_commit_round_trip() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path()).unwrap();

        let begun = dispatch(&db, "begin").unwrap();
        let txn_text = begun.strip_prefix("txn ").unwrap();

        dispatch(&db, &format!("write {txn_text} doc {{\"a\":1}}")).unwrap();
        assert_eq!(dispatch(&db, &format!("read {txn_text} doc")).unwrap(), r#"{"a":1}"#);
        assert_eq!(dispatch(&db, &format!("commit {txn_text}")).unwrap(), "committed");
    }

    #[test]
    fn unknown_command_is_rejected() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path()).unwrap();
        assert!(dispatch(&db, "frobnicate").is_err());
    }

    #[test]
    fn read_with_bad_transaction_id_is_rejected() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path()).unwrap();
        assert!(dispatch(&db, "read not-a-uuid doc").is_err());
    }
}
