//! Embedded schema migrations.
//!
//! Versions are strictly increasing; the applied version is mirrored to
//! `PRAGMA user_version`.

use rusqlite::Connection;

use super::{StoreError, StoreResult};

struct Migration {
    version: u32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        sql: include_str!("migrations/0001_init.sql"),
    },
    Migration {
        version: 2,
        sql: include_str!("migrations/0002_task_priority_deadline.sql"),
    },
];

pub(crate) fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}

pub(crate) fn apply(conn: &mut Connection) -> StoreResult<()> {
    let current: u32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    let latest = latest_version();

    if current > latest {
        return Err(StoreError::UnsupportedSchema {
            found: current,
            supported: latest,
        });
    }
    if current == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        tx.execute_batch(migration.sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {}", migration.version))?;
        tracing::info!("Applied schema migration {}", migration.version);
    }
    tx.commit()?;
    Ok(())
}
