//! Database migrations
//!
//! Numbered schema migrations applied in order, following the
//! `Migration`/`apply_migrations` pattern in `storage/migrations.rs` of
//! the teacher crate.

use rusqlite::Connection;

/// A database migration.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub up: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema: memories, tags, memory_tags, memory_graph",
        up: MIGRATION_V1_UP,
    },
    Migration {
        version: 2,
        description: "Vector index fallback table for brute-force cosine search",
        up: MIGRATION_V2_UP,
    },
];

const MIGRATION_V1_UP: &str = r#"
CREATE TABLE IF NOT EXISTS memories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    content_hash TEXT NOT NULL UNIQUE,
    content TEXT NOT NULL,
    memory_type TEXT NOT NULL DEFAULT 'note',
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    metadata_json TEXT NOT NULL DEFAULT '{}',
    tags_json TEXT NOT NULL DEFAULT '[]'
);

CREATE INDEX IF NOT EXISTS idx_memories_created_at ON memories(created_at);
CREATE INDEX IF NOT EXISTS idx_memories_memory_type ON memories(memory_type);

CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS memory_tags (
    memory_id INTEGER NOT NULL REFERENCES memories(id) ON DELETE CASCADE,
    tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
    PRIMARY KEY (memory_id, tag_id)
);

CREATE INDEX IF NOT EXISTS idx_memory_tags_tag_id ON memory_tags(tag_id);

CREATE TABLE IF NOT EXISTS memory_graph (
    source_hash TEXT NOT NULL,
    target_hash TEXT NOT NULL,
    relationship_type TEXT NOT NULL,
    similarity REAL NOT NULL,
    connection_types TEXT NOT NULL DEFAULT '[]',
    metadata_json TEXT NOT NULL DEFAULT '{}',
    created_at INTEGER NOT NULL,
    PRIMARY KEY (source_hash, target_hash, relationship_type)
);

CREATE INDEX IF NOT EXISTS idx_memory_graph_source ON memory_graph(source_hash);
CREATE INDEX IF NOT EXISTS idx_memory_graph_target ON memory_graph(target_hash);
"#;

const MIGRATION_V2_UP: &str = r#"
CREATE TABLE IF NOT EXISTS memory_embeddings (
    memory_id INTEGER PRIMARY KEY REFERENCES memories(id) ON DELETE CASCADE,
    embedding BLOB NOT NULL
);
"#;

/// Apply any migrations not yet recorded in `PRAGMA user_version`.
pub fn apply_migrations(conn: &Connection) -> rusqlite::Result<()> {
    let current: u32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    for migration in MIGRATIONS {
        if migration.version > current {
            conn.execute_batch(migration.up)?;
            conn.pragma_update(None, "user_version", migration.version)?;
            tracing::debug!(
                version = migration.version,
                description = migration.description,
                "applied migration"
            );
        }
    }

    Ok(())
}
