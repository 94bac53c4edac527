//! Versioned schema migrations for [`super::sqlite::SqliteStore`].
//!
//! A `MIGRATIONS` const array of `{version, description, up}`, applied in
//! order inside `execute_batch`, tracked in a `schema_version` table. The
//! schema is deliberately small — two tables, segments and a summary cache.

pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub up: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema: segments + summary cache",
        up: r#"
            CREATE TABLE IF NOT EXISTS segments (
                id              TEXT NOT NULL,
                collection      TEXT NOT NULL,
                doc_id          TEXT NOT NULL,
                idx             INTEGER NOT NULL,
                byte_start      INTEGER NOT NULL,
                byte_end        INTEGER NOT NULL,
                segment_type    TEXT NOT NULL,
                heading_level   INTEGER NOT NULL,
                section_title   TEXT,
                text            TEXT NOT NULL,
                content_hash    TEXT NOT NULL,
                embedding       BLOB,
                salience        REAL NOT NULL,
                PRIMARY KEY (collection, id)
            );

            CREATE INDEX IF NOT EXISTS idx_segments_doc
                ON segments (collection, doc_id, idx);

            CREATE INDEX IF NOT EXISTS idx_segments_hash
                ON segments (collection, content_hash);

            CREATE TABLE IF NOT EXISTS summary_cache (
                collection      TEXT NOT NULL,
                fingerprint     TEXT NOT NULL,
                summary_json    TEXT NOT NULL,
                created_at      TEXT NOT NULL,
                PRIMARY KEY (collection, fingerprint)
            );

            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER NOT NULL
            );
        "#,
    },
];

pub fn get_current_version(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )?;
    let version: Option<u32> = conn
        .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
        .unwrap_or(None);
    Ok(version.unwrap_or(0))
}

/// Apply all pending migrations in order, returning the resulting schema
/// version.
pub fn apply_migrations(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    let mut current = get_current_version(conn)?;
    for migration in MIGRATIONS {
        if migration.version <= current {
            continue;
        }
        tracing::info!(version = migration.version, description = migration.description, "applying migration");
        conn.execute_batch(migration.up)?;
        conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [migration.version])?;
        current = migration.version;
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_apply_cleanly_on_fresh_database() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let version = apply_migrations(&conn).unwrap();
        assert_eq!(version, MIGRATIONS.last().unwrap().version);
    }

    #[test]
    fn applying_migrations_twice_is_idempotent() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        apply_migrations(&conn).unwrap();
        let version_again = apply_migrations(&conn).unwrap();
        assert_eq!(version_again, MIGRATIONS.last().unwrap().version);
    }
}
