use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;

pub const DB_FILE: &str = "clerk.db";

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS expenses (
    id INTEGER PRIMARY KEY,
    txn_date TEXT,
    merchant_raw TEXT,
    merchant_normalized TEXT,
    amount_original REAL,
    currency_original TEXT,
    amount_base REAL,
    currency_base TEXT NOT NULL,
    fx_rate_used REAL,
    fx_source TEXT,
    category TEXT,
    confidence REAL,
    status TEXT NOT NULL DEFAULT 'extracted'
        CHECK (status IN ('extracted', 'needs_review', 'approved')),
    notes TEXT,
    created_at TEXT DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS attachments (
    id INTEGER PRIMARY KEY,
    expense_id INTEGER NOT NULL,
    file_name TEXT NOT NULL,
    path TEXT NOT NULL,
    checksum TEXT NOT NULL,
    created_at TEXT DEFAULT (datetime('now')),
    FOREIGN KEY (expense_id) REFERENCES expenses(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS fx_rates (
    id INTEGER PRIMARY KEY,
    rate_date TEXT NOT NULL,
    base TEXT NOT NULL,
    quote TEXT NOT NULL,
    rate REAL NOT NULL CHECK (rate > 0),
    source TEXT NOT NULL,
    UNIQUE (rate_date, base, quote, source)
);

CREATE INDEX IF NOT EXISTS idx_expenses_txn_date ON expenses(txn_date);
CREATE INDEX IF NOT EXISTS idx_fx_rates_pair ON fx_rates(base, quote, rate_date);
";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

#[cfg(test)]
pub(crate) fn test_db() -> (tempfile::TempDir, Connection) {
    let dir = tempfile::tempdir().unwrap();
    let conn = get_connection(&dir.path().join("test.db")).unwrap();
    init_db(&conn).unwrap();
    (dir, conn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_db_creates_tables() {
        let (_dir, conn) = test_db();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        for expected in &["expenses", "attachments", "fx_rates"] {
            assert!(tables.contains(&expected.to_string()), "missing table: {expected}");
        }
    }

    #[test]
    fn test_init_db_is_idempotent() {
        let (_dir, conn) = test_db();
        init_db(&conn).unwrap();
    }

    #[test]
    fn test_rejects_non_positive_rate() {
        let (_dir, conn) = test_db();
        let err = conn.execute(
            "INSERT INTO fx_rates (rate_date, base, quote, rate, source) VALUES ('2024-01-01', 'USD', 'SGD', 0, 'manual')",
            [],
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_rejects_unknown_status() {
        let (_dir, conn) = test_db();
        let err = conn.execute(
            "INSERT INTO expenses (currency_base, status) VALUES ('SGD', 'pending')",
            [],
        );
        assert!(err.is_err());
    }
}
