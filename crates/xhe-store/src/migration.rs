//! Database schema migrations for SQLite.
//!
//! Versioned migrations recorded in `schema_migrations`. Version 1 creates the
//! item tables and registers the base collections; every later version only
//! registers the collections it introduces, so no migration ever rewrites
//! existing items.

use rusqlite::{params, Connection};
use tracing::info;

use xhe_core::now_millis;

use crate::error::{Result, StoreError};
use crate::schema::{self, CURRENT_VERSION};

/// Initialize or migrate the database schema to [`CURRENT_VERSION`].
///
/// This function is idempotent - it can be called multiple times safely.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    migrate_to(conn, CURRENT_VERSION)
}

/// Migrate up to `target`. Never downgrades.
pub fn migrate_to(conn: &mut Connection, target: u32) -> Result<()> {
    if target > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "target version {} is newer than supported version {}",
            target, CURRENT_VERSION
        )));
    }

    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current = current_version(conn)?;
    if current >= target {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for version in (current + 1)..=target {
        apply_migration(&tx, version)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            params![version, now_millis()],
        )?;
    }
    tx.commit()?;

    info!(from = current, to = target, "store schema migrated");
    Ok(())
}

/// Highest applied version, 0 for a fresh database.
pub fn current_version(conn: &Connection) -> Result<u32> {
    let version: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => {
            apply_v1(conn)?;
            register_collections(conn, 1)
        }
        v if v <= CURRENT_VERSION => register_collections(conn, v),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: item storage.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Declared collections and their key fields
        CREATE TABLE collections (
            name TEXT PRIMARY KEY,
            key_path TEXT NOT NULL,
            since_version INTEGER NOT NULL
        );

        -- Every item of every collection, as JSON text
        CREATE TABLE items (
            collection TEXT NOT NULL REFERENCES collections(name),
            key TEXT NOT NULL,
            body TEXT NOT NULL,
            PRIMARY KEY (collection, key)
        );
        "#,
    )?;
    Ok(())
}

fn register_collections(conn: &Connection, version: u32) -> Result<()> {
    for def in schema::introduced_in(version) {
        conn.execute(
            "INSERT OR IGNORE INTO collections (name, key_path, since_version) VALUES (?1, ?2, ?3)",
            params![def.name, def.key_path, def.since],
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collection_names(conn: &Connection) -> Vec<String> {
        conn.prepare("SELECT name FROM collections ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_migration_creates_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"items".to_string()));
        assert!(tables.contains(&"collections".to_string()));
        assert!(tables.contains(&"schema_migrations".to_string()));
        assert_eq!(collection_names(&conn).len(), 8);
    }

    #[test]
    fn test_migration_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();
        assert_eq!(current_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_upgrade_keeps_items() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate_to(&mut conn, 1).unwrap();
        assert!(!collection_names(&conn).contains(&"registeredApps".to_string()));

        conn.execute(
            "INSERT INTO items (collection, key, body) VALUES ('forks', 'f1', '{\"id\":\"f1\"}')",
            [],
        )
        .unwrap();

        migrate(&mut conn).unwrap();
        assert!(collection_names(&conn).contains(&"registeredApps".to_string()));

        let body: String = conn
            .query_row(
                "SELECT body FROM items WHERE collection = 'forks' AND key = 'f1'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(body, "{\"id\":\"f1\"}");
    }

    #[test]
    fn test_rejects_future_version() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert!(matches!(
            migrate_to(&mut conn, CURRENT_VERSION + 1),
            Err(StoreError::Migration(_))
        ));
    }
}
