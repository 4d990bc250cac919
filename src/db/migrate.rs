//! Versioned schema migrations.
//!
//! Each migration is applied once and recorded in the `log` table with
//! `operation = 'migration_applied'` and its version as `target`.

use crate::errors::{AppError, AppResult};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;

struct Migration {
    version: &'static str,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "20250301_0001_create_members",
        description: "Created members table",
        sql: r#"
        CREATE TABLE IF NOT EXISTS members (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL CHECK(length(trim(name)) > 0),
            email       TEXT,
            is_admin    INTEGER NOT NULL DEFAULT 0 CHECK(is_admin IN (0,1)),
            created_at  TEXT NOT NULL
        );
        "#,
    },
    Migration {
        version: "20250301_0002_create_intervals",
        description: "Created intervals table with one-open-interval guard",
        sql: r#"
        CREATE TABLE IF NOT EXISTS intervals (
            id             INTEGER PRIMARY KEY AUTOINCREMENT,
            member_id      INTEGER NOT NULL,
            punch_in_ms    INTEGER NOT NULL,
            punch_out_ms   INTEGER CHECK(punch_out_ms IS NULL OR punch_out_ms >= punch_in_ms),
            created_at_ms  INTEGER NOT NULL,
            member_name    TEXT,
            member_email   TEXT
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_intervals_one_open
            ON intervals(member_id) WHERE punch_out_ms IS NULL;
        CREATE INDEX IF NOT EXISTS idx_intervals_punch_in ON intervals(punch_in_ms, id);
        "#,
    },
    Migration {
        version: "20250301_0003_create_changes",
        description: "Created changes table (interval change feed)",
        sql: r#"
        CREATE TABLE IF NOT EXISTS changes (
            seq          INTEGER PRIMARY KEY AUTOINCREMENT,
            kind         TEXT NOT NULL CHECK(kind IN ('insert','update','delete')),
            interval_id  INTEGER NOT NULL,
            payload      TEXT NOT NULL,
            emitted_at   TEXT NOT NULL
        );
        "#,
    },
];

/// Ensure that the `log` table exists: it also tracks applied migrations.
fn ensure_log_table(conn: &Connection) -> AppResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS log (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            date      TEXT NOT NULL,
            operation TEXT NOT NULL,
            target    TEXT DEFAULT '',
            message   TEXT NOT NULL
        );
        "#,
    )?;
    Ok(())
}

fn is_applied(conn: &Connection, version: &str) -> AppResult<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM log
             WHERE operation = 'migration_applied' AND target = ?1
             LIMIT 1",
            [version],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Public entry point: run all pending migrations. Returns how many ran.
pub fn run_pending_migrations(conn: &Connection) -> AppResult<usize> {
    ensure_log_table(conn)?;

    let mut applied = 0;
    for m in MIGRATIONS {
        if is_applied(conn, m.version)? {
            continue;
        }

        conn.execute_batch(m.sql)
            .map_err(|e| AppError::Migration(format!("{}: {}", m.version, e)))?;

        conn.execute(
            "INSERT INTO log (date, operation, target, message)
             VALUES (datetime('now'), 'migration_applied', ?1, ?2)",
            params![m.version, m.description],
        )?;

        info!(version = m.version, "migration applied");
        applied += 1;
    }

    Ok(applied)
}
