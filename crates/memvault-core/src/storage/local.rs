//! LocalStore (C3) — the source of truth
//!
//! Single SQLite file plus an in-process vector index. Grounded in the
//! teacher's `storage/sqlite.rs`: connection pragmas applied on every
//! connection the store opens, `writer`/`reader` held behind separate
//! mutexes so the struct is `Send + Sync` via interior mutability and
//! callers hold `Arc<LocalStore>`, not `Arc<Mutex<LocalStore>>`.

use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use super::migrations::apply_migrations;
use super::vector_index::{VectorIndex, VectorIndexError};
use super::{DeleteFilter, DeleteOutcome, ScoredMemory, SearchFilters, StoreOutcome};
use crate::embeddings::{cosine_similarity, Embedder, EmbeddingError};
use crate::memory::{Memory, MetadataMap, RelationshipType};

const EMBEDDING_REBUILD_BATCH: usize = 200;
const QUERY_CACHE_CAPACITY: usize = 100;

/// LocalStore failure modes.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("vector index error: {0}")]
    VectorIndex(#[from] VectorIndexError),
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("could not resolve a data directory for the local store")]
    NoDataDir,
    #[error("batch update rolled back: {0}")]
    BatchFailed(String),
    #[error("at least one delete filter must be specified")]
    NoFilter,
}

/// Tag-search matching mode (§4.2 "Tag search tie-break").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagMatch {
    And,
    Or,
}

/// Inclusive `[start, end]` window, seconds since epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: i64,
    pub end: i64,
}

/// Pragma values read back for the health-check operation (§4.2).
#[derive(Debug, Clone, PartialEq)]
pub struct HealthPragmas {
    pub journal_mode: String,
    pub busy_timeout_ms: i64,
    pub cache_size_kb: i64,
    pub foreign_keys: bool,
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

pub struct LocalStore {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
    vector_index: Mutex<VectorIndex>,
    query_cache: Mutex<lru::LruCache<String, Vec<f32>>>,
}

impl LocalStore {
    /// Open (creating if absent) the database at `path`, or resolve the
    /// default per-platform data directory when `path` is `None`.
    pub fn open(
        path: Option<PathBuf>,
        busy_timeout_ms: u32,
        cache_size_kb: i32,
    ) -> Result<Self, StorageError> {
        let db_path = match path {
            Some(p) => p,
            None => default_db_path()?,
        };

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
            set_dir_permissions(parent)?;
        }

        let writer = Connection::open(&db_path)?;
        configure_connection(&writer, busy_timeout_ms, cache_size_kb)?;
        apply_migrations(&writer)?;
        set_file_permissions(&db_path)?;

        let reader = Connection::open(&db_path)?;
        configure_connection(&reader, busy_timeout_ms, cache_size_kb)?;

        let dim = crate::memory::EMBEDDING_DIM;
        let mut vector_index = VectorIndex::new(dim)?;
        load_embeddings_into_index(&writer, &mut vector_index)?;

        Ok(Self {
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
            vector_index: Mutex::new(vector_index),
            query_cache: Mutex::new(lru::LruCache::new(
                std::num::NonZeroUsize::new(QUERY_CACHE_CAPACITY).unwrap(),
            )),
        })
    }

    /// Pragma values as actually configured, for the health-check operation.
    pub fn health_pragmas(&self) -> Result<HealthPragmas, StorageError> {
        let conn = self.reader.lock().expect("reader mutex poisoned");
        let journal_mode: String =
            conn.query_row("PRAGMA journal_mode", [], |r| r.get(0))?;
        let busy_timeout_ms: i64 = conn.query_row("PRAGMA busy_timeout", [], |r| r.get(0))?;
        let cache_size_kb: i64 = conn.query_row("PRAGMA cache_size", [], |r| r.get(0))?;
        let foreign_keys: bool = conn.query_row("PRAGMA foreign_keys", [], |r: &rusqlite::Row| {
            Ok(r.get::<_, i64>(0)? != 0)
        })?;
        Ok(HealthPragmas {
            journal_mode,
            busy_timeout_ms,
            cache_size_kb,
            foreign_keys,
        })
    }

    pub fn store(&self, memory: Memory) -> Result<StoreOutcome, StorageError> {
        let conn = self.writer.lock().expect("writer mutex poisoned");
        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM memories WHERE content_hash = ?1",
                params![memory.content_hash],
                |r| r.get(0),
            )
            .optional()?;

        if let Some(_id) = existing {
            return Ok(StoreOutcome {
                content_hash: memory.content_hash,
                created: false,
            });
        }

        let tags_json = serde_json::to_string(&memory.tags)?;
        let metadata_json = serde_json::to_string(&memory.metadata)?;

        conn.execute(
            "INSERT INTO memories (content_hash, content, memory_type, created_at, updated_at, metadata_json, tags_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                memory.content_hash,
                memory.content,
                memory.memory_type,
                memory.created_at,
                memory.updated_at,
                metadata_json,
                tags_json,
            ],
        )?;
        let memory_id = conn.last_insert_rowid();

        upsert_tags(&conn, memory_id, &memory.tags)?;

        conn.execute(
            "INSERT OR REPLACE INTO memory_embeddings (memory_id, embedding) VALUES (?1, ?2)",
            params![memory_id, embedding_to_blob(&memory.embedding)],
        )?;

        self.vector_index
            .lock()
            .expect("vector index mutex poisoned")
            .add(&memory.content_hash, &memory.embedding)?;

        tracing::debug!(hash = %memory.short_id(), "stored memory");

        Ok(StoreOutcome {
            content_hash: memory.content_hash,
            created: true,
        })
    }

    pub fn get(&self, content_hash: &str) -> Result<Option<Memory>, StorageError> {
        let conn = self.reader.lock().expect("reader mutex poisoned");
        let row = conn
            .query_row(
                "SELECT content, content_hash, memory_type, created_at, updated_at, metadata_json, tags_json, id
                 FROM memories WHERE content_hash = ?1",
                params![content_hash],
                row_to_memory_with_id,
            )
            .optional()?;

        let Some((memory, id)) = row else {
            return Ok(None);
        };
        let embedding = self.load_embedding(&conn, id)?;
        Ok(Some(Memory { embedding, ..memory }))
    }

    pub fn delete(&self, content_hash: &str) -> Result<bool, StorageError> {
        let conn = self.writer.lock().expect("writer mutex poisoned");
        let deleted = conn.execute(
            "DELETE FROM memories WHERE content_hash = ?1",
            params![content_hash],
        )?;
        if deleted > 0 {
            conn.execute(
                "DELETE FROM memory_graph WHERE source_hash = ?1 OR target_hash = ?1",
                params![content_hash],
            )?;
            self.vector_index
                .lock()
                .expect("vector index mutex poisoned")
                .remove(content_hash);
        }
        Ok(deleted > 0)
    }

    pub fn update_metadata(
        &self,
        content_hash: &str,
        patch: MetadataMap,
    ) -> Result<bool, StorageError> {
        let conn = self.writer.lock().expect("writer mutex poisoned");
        apply_metadata_patch(&conn, content_hash, &patch)
    }

    /// Apply all patches in one transaction; rolled back entirely on any
    /// error (§4.2).
    pub fn update_memories_batch(
        &self,
        updates: &[(String, MetadataMap)],
    ) -> Result<usize, StorageError> {
        let mut conn = self.writer.lock().expect("writer mutex poisoned");
        let tx = conn.transaction()?;
        let mut count = 0;
        for (hash, patch) in updates {
            if apply_metadata_patch(&tx, hash, patch)? {
                count += 1;
            }
        }
        tx.commit()?;
        Ok(count)
    }

    pub fn search_by_tags(
        &self,
        tags: &[String],
        match_mode: TagMatch,
        time_range: Option<TimeRange>,
    ) -> Result<Vec<Memory>, StorageError> {
        if tags.is_empty() {
            return Ok(vec![]);
        }
        let conn = self.reader.lock().expect("reader mutex poisoned");

        let mut rows = self.load_all_rows(&conn)?;
        rows.retain(|(m, _id)| {
            let matched = match match_mode {
                TagMatch::And => tags.iter().all(|t| m.tags.contains(t)),
                TagMatch::Or => tags.iter().any(|t| m.tags.contains(t)),
            };
            matched
                && time_range
                    .map(|r| m.created_at >= r.start && m.created_at <= r.end)
                    .unwrap_or(true)
        });

        rows.sort_by(|(a, _), (b, _)| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.content_hash.cmp(&b.content_hash))
        });

        Ok(rows.into_iter().map(|(m, _)| m).collect())
    }

    /// Filter-composed bulk delete (§6.1): AND across whichever filters
    /// are set. Refuses to run when none are given, since an unfiltered
    /// call would otherwise wipe the whole store. `dry_run` reports the
    /// hashes that would be removed without removing them.
    pub fn delete_filtered(&self, filter: &DeleteFilter) -> Result<DeleteOutcome, StorageError> {
        if filter.is_empty() {
            return Err(StorageError::NoFilter);
        }

        let candidates: Vec<String> = {
            let conn = self.reader.lock().expect("reader mutex poisoned");
            self.load_all_rows(&conn)?
                .into_iter()
                .filter(|(m, _id)| matches_delete_filter(m, filter))
                .map(|(m, _id)| m.content_hash)
                .collect()
        };

        if filter.dry_run {
            return Ok(DeleteOutcome {
                deleted_count: candidates.len(),
                hashes: candidates,
            });
        }

        let mut deleted = Vec::with_capacity(candidates.len());
        for hash in candidates {
            if self.delete(&hash)? {
                deleted.push(hash);
            }
        }
        Ok(DeleteOutcome {
            deleted_count: deleted.len(),
            hashes: deleted,
        })
    }

    pub fn search_time_range(&self, range: TimeRange) -> Result<Vec<Memory>, StorageError> {
        let conn = self.reader.lock().expect("reader mutex poisoned");
        let mut rows = self.load_all_rows(&conn)?;
        rows.retain(|(m, _)| m.created_at >= range.start && m.created_at <= range.end);
        rows.sort_by(|(a, _), (b, _)| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.content_hash.cmp(&b.content_hash))
        });
        Ok(rows.into_iter().map(|(m, _)| m).collect())
    }

    /// Embed `query` (cached by text), search the vector index, and apply
    /// filters to the candidate set before truncating to `k` (§4.2).
    pub fn search_semantic(
        &self,
        embedder: &dyn Embedder,
        query: &str,
        k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<ScoredMemory>, StorageError> {
        let k = k.min(100).max(1);
        let query_embedding = self.cached_embed(embedder, query)?;

        let hits = {
            let index = self.vector_index.lock().expect("vector index mutex poisoned");
            // Over-fetch since filters are applied after the ANN search.
            index.search(&query_embedding, k.saturating_mul(4).max(k))?
        };

        let mut scored = Vec::with_capacity(hits.len());
        for (hash, score) in hits {
            let Some(memory) = self.get(&hash)? else {
                continue;
            };
            if memory_matches_filters(&memory, filters) {
                scored.push(ScoredMemory { memory, score });
            }
            if scored.len() >= k {
                break;
            }
        }
        Ok(scored)
    }

    /// Re-embed every memory with `embedder` and rebuild the vector index.
    /// Maintenance path for schema/embedding-model migrations (§4.2).
    pub fn rebuild_embeddings(&self, embedder: &dyn Embedder) -> Result<usize, StorageError> {
        let hashes: Vec<String> = {
            let conn = self.reader.lock().expect("reader mutex poisoned");
            let mut stmt = conn.prepare("SELECT content_hash FROM memories ORDER BY id")?;
            let rows = stmt.query_map([], |r| r.get::<_, String>(0))?;
            rows.collect::<rusqlite::Result<_>>()?
        };

        let mut rebuilt = 0;
        for chunk in hashes.chunks(EMBEDDING_REBUILD_BATCH) {
            let memories: Vec<Memory> = chunk
                .iter()
                .filter_map(|h| self.get(h).ok().flatten())
                .collect();
            let texts: Vec<String> = memories.iter().map(|m| m.content.clone()).collect();
            let embeddings = embedder.embed(&texts)?;

            let conn = self.writer.lock().expect("writer mutex poisoned");
            let mut index = self.vector_index.lock().expect("vector index mutex poisoned");
            for (memory, embedding) in memories.iter().zip(embeddings.into_iter()) {
                let memory_id: i64 = conn.query_row(
                    "SELECT id FROM memories WHERE content_hash = ?1",
                    params![memory.content_hash],
                    |r| r.get(0),
                )?;
                conn.execute(
                    "UPDATE memory_embeddings SET embedding = ?1 WHERE memory_id = ?2",
                    params![embedding_to_blob(&embedding), memory_id],
                )?;
                index.add(&memory.content_hash, &embedding)?;
                rebuilt += 1;
            }
        }

        tracing::info!(count = rebuilt, "rebuilt embeddings");
        Ok(rebuilt)
    }

    // -- Graph primitives backing the Graph store module (C8) --------------

    pub fn insert_edge(
        &self,
        source_hash: &str,
        target_hash: &str,
        relationship_type: RelationshipType,
        similarity: f32,
        connection_types: &[String],
        metadata: &MetadataMap,
    ) -> Result<(), StorageError> {
        let conn = self.writer.lock().expect("writer mutex poisoned");
        let created_at = now_secs();
        let connection_types_json = serde_json::to_string(connection_types)?;
        let metadata_json = serde_json::to_string(metadata)?;

        insert_edge_row(
            &conn,
            source_hash,
            target_hash,
            relationship_type,
            similarity,
            &connection_types_json,
            &metadata_json,
            created_at,
        )?;

        if relationship_type.is_symmetric() {
            insert_edge_row(
                &conn,
                target_hash,
                source_hash,
                relationship_type,
                similarity,
                &connection_types_json,
                &metadata_json,
                created_at,
            )?;
        }
        Ok(())
    }

    /// Edges touching `hash`, in either direction. Callers distinguish
    /// direction by comparing `source_hash`/`target_hash` to `hash`.
    pub fn edges_touching(&self, hash: &str) -> Result<Vec<GraphEdgeRow>, StorageError> {
        let conn = self.reader.lock().expect("reader mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT source_hash, target_hash, relationship_type, similarity
             FROM memory_graph WHERE source_hash = ?1 OR target_hash = ?1",
        )?;
        let rows = stmt.query_map(params![hash], |r| {
            Ok(GraphEdgeRow {
                source_hash: r.get(0)?,
                target_hash: r.get(1)?,
                relationship_type: r.get(2)?,
                similarity: r.get(3)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    // -- internals -----------------------------------------------------

    fn cached_embed(&self, embedder: &dyn Embedder, query: &str) -> Result<Vec<f32>, StorageError> {
        {
            let mut cache = self.query_cache.lock().expect("query cache mutex poisoned");
            if let Some(cached) = cache.get(query) {
                return Ok(cached.clone());
            }
        }
        let embedding = embedder.embed_one(query)?;
        self.query_cache
            .lock()
            .expect("query cache mutex poisoned")
            .put(query.to_string(), embedding.clone());
        Ok(embedding)
    }

    fn load_embedding(&self, conn: &Connection, memory_id: i64) -> Result<Vec<f32>, StorageError> {
        let blob: Vec<u8> = conn.query_row(
            "SELECT embedding FROM memory_embeddings WHERE memory_id = ?1",
            params![memory_id],
            |r| r.get(0),
        )?;
        Ok(blob_to_embedding(&blob))
    }

    fn load_all_rows(&self, conn: &Connection) -> Result<Vec<(Memory, i64)>, StorageError> {
        let mut stmt = conn.prepare(
            "SELECT content, content_hash, memory_type, created_at, updated_at, metadata_json, tags_json, id
             FROM memories",
        )?;
        let rows = stmt.query_map([], row_to_memory_with_id)?;
        let mut out = Vec::new();
        for row in rows {
            let (memory, id) = row?;
            let embedding = self.load_embedding(conn, id)?;
            out.push((Memory { embedding, ..memory }, id));
        }
        Ok(out)
    }
}

impl super::MemoryStore for LocalStore {
    type Error = StorageError;

    async fn store(&self, memory: Memory) -> Result<StoreOutcome, StorageError> {
        LocalStore::store(self, memory)
    }

    async fn get(&self, content_hash: &str) -> Result<Option<Memory>, StorageError> {
        LocalStore::get(self, content_hash)
    }

    async fn delete(&self, content_hash: &str) -> Result<bool, StorageError> {
        LocalStore::delete(self, content_hash)
    }

    async fn update_metadata(
        &self,
        content_hash: &str,
        patch: MetadataMap,
    ) -> Result<bool, StorageError> {
        LocalStore::update_metadata(self, content_hash, patch)
    }
}

/// Half-open edge view returned by `edges_touching`.
#[derive(Debug, Clone)]
pub struct GraphEdgeRow {
    pub source_hash: String,
    pub target_hash: String,
    pub relationship_type: String,
    pub similarity: f32,
}

fn matches_delete_filter(memory: &Memory, filter: &DeleteFilter) -> bool {
    if let Some(hash) = &filter.content_hash {
        if &memory.content_hash != hash {
            return false;
        }
    }
    if let Some(tags) = &filter.tags {
        let matched = match filter.tag_match.unwrap_or(TagMatch::And) {
            TagMatch::And => tags.iter().all(|t| memory.tags.contains(t)),
            TagMatch::Or => tags.iter().any(|t| memory.tags.contains(t)),
        };
        if !matched {
            return false;
        }
    }
    if let Some(before) = filter.before {
        if memory.created_at >= before {
            return false;
        }
    }
    if let Some(after) = filter.after {
        if memory.created_at <= after {
            return false;
        }
    }
    true
}

fn memory_matches_filters(memory: &Memory, filters: &SearchFilters) -> bool {
    if let Some(tags) = &filters.tags {
        let matched = match filters.tag_match.unwrap_or(TagMatch::And) {
            TagMatch::And => tags.iter().all(|t| memory.tags.contains(t)),
            TagMatch::Or => tags.iter().any(|t| memory.tags.contains(t)),
        };
        if !matched {
            return false;
        }
    }
    if let Some(range) = filters.time_range {
        if memory.created_at < range.start || memory.created_at > range.end {
            return false;
        }
    }
    if let Some(memory_type) = &filters.memory_type {
        if &memory.memory_type != memory_type {
            return false;
        }
    }
    true
}

fn apply_metadata_patch(
    conn: &Connection,
    content_hash: &str,
    patch: &MetadataMap,
) -> Result<bool, StorageError> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT metadata_json FROM memories WHERE content_hash = ?1",
            params![content_hash],
            |r| r.get(0),
        )
        .optional()?;

    let Some(existing_json) = existing else {
        return Ok(false);
    };

    let mut metadata: MetadataMap = serde_json::from_str(&existing_json)?;
    metadata.merge(patch.clone());
    let merged_json = serde_json::to_string(&metadata)?;

    conn.execute(
        "UPDATE memories SET metadata_json = ?1, updated_at = ?2 WHERE content_hash = ?3",
        params![merged_json, now_secs(), content_hash],
    )?;
    Ok(true)
}

#[allow(clippy::too_many_arguments)]
fn insert_edge_row(
    conn: &Connection,
    source_hash: &str,
    target_hash: &str,
    relationship_type: RelationshipType,
    similarity: f32,
    connection_types_json: &str,
    metadata_json: &str,
    created_at: i64,
) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO memory_graph (source_hash, target_hash, relationship_type, similarity, connection_types, metadata_json, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(source_hash, target_hash, relationship_type) DO UPDATE SET
            similarity = excluded.similarity,
            connection_types = excluded.connection_types,
            metadata_json = excluded.metadata_json",
        params![
            source_hash,
            target_hash,
            relationship_type.as_str(),
            similarity,
            connection_types_json,
            metadata_json,
            created_at,
        ],
    )?;
    Ok(())
}

fn upsert_tags(conn: &Connection, memory_id: i64, tags: &BTreeSet<String>) -> rusqlite::Result<()> {
    for tag in tags {
        conn.execute(
            "INSERT OR IGNORE INTO tags (name) VALUES (?1)",
            params![tag],
        )?;
        let tag_id: i64 = conn.query_row(
            "SELECT id FROM tags WHERE name = ?1",
            params![tag],
            |r| r.get(0),
        )?;
        conn.execute(
            "INSERT OR IGNORE INTO memory_tags (memory_id, tag_id) VALUES (?1, ?2)",
            params![memory_id, tag_id],
        )?;
    }
    Ok(())
}

fn row_to_memory_with_id(row: &rusqlite::Row) -> rusqlite::Result<(Memory, i64)> {
    let content: String = row.get(0)?;
    let content_hash: String = row.get(1)?;
    let memory_type: String = row.get(2)?;
    let created_at: i64 = row.get(3)?;
    let updated_at: i64 = row.get(4)?;
    let metadata_json: String = row.get(5)?;
    let tags_json: String = row.get(6)?;
    let id: i64 = row.get(7)?;

    let metadata: MetadataMap = serde_json::from_str(&metadata_json).unwrap_or_default();
    let tags: BTreeSet<String> = serde_json::from_str(&tags_json).unwrap_or_default();

    Ok((
        Memory {
            content,
            content_hash,
            tags,
            memory_type,
            metadata,
            embedding: vec![],
            created_at,
            updated_at,
        },
        id,
    ))
}

fn load_embeddings_into_index(
    conn: &Connection,
    index: &mut VectorIndex,
) -> Result<(), StorageError> {
    let mut stmt = conn.prepare(
        "SELECT m.content_hash, e.embedding
         FROM memory_embeddings e JOIN memories m ON m.id = e.memory_id",
    )?;
    let rows = stmt.query_map([], |r| {
        let hash: String = r.get(0)?;
        let blob: Vec<u8> = r.get(1)?;
        Ok((hash, blob))
    })?;

    let mut loaded = HashMap::new();
    for row in rows {
        let (hash, blob) = row?;
        loaded.insert(hash, blob_to_embedding(&blob));
    }
    for (hash, embedding) in loaded {
        index.add(&hash, &embedding)?;
    }
    Ok(())
}

/// WAL journaling, a generous busy timeout, and a workload-sized page
/// cache, applied on every connection the store opens (§4.2, grounded in
/// `storage/sqlite.rs::configure_connection`).
fn configure_connection(
    conn: &Connection,
    busy_timeout_ms: u32,
    cache_size_kb: i32,
) -> rusqlite::Result<()> {
    conn.execute_batch(&format!(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA cache_size = -{cache_size_kb};
         PRAGMA temp_store = MEMORY;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = {busy_timeout_ms};",
    ))
}

fn default_db_path() -> Result<PathBuf, StorageError> {
    directories::ProjectDirs::from("com", "memvault", "core")
        .map(|dirs| dirs.data_dir().join("memvault.db"))
        .ok_or(StorageError::NoDataDir)
}

#[cfg(unix)]
fn set_dir_permissions(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))
}
#[cfg(not(unix))]
fn set_dir_permissions(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::DeterministicEmbedder;

    fn store() -> LocalStore {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        std::mem::forget(dir);
        LocalStore::open(Some(path), 15_000, 64_000).unwrap()
    }

    fn memory(content: &str, tags: &[&str], embedder: &DeterministicEmbedder) -> Memory {
        let embedding = embedder.embed_one(content).unwrap();
        Memory::new(
            content,
            tags.iter().map(|t| t.to_string()),
            None,
            MetadataMap::new(),
            embedding,
            1_700_000_000,
        )
        .unwrap()
    }

    #[test]
    fn store_is_idempotent_on_content_hash() {
        let store = store();
        let embedder = DeterministicEmbedder::default();
        let m = memory("remember the milk", &["chores"], &embedder);
        let first = store.store(m.clone()).unwrap();
        let second = store.store(m).unwrap();
        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.content_hash, second.content_hash);
    }

    #[test]
    fn get_round_trips_embedding() {
        let store = store();
        let embedder = DeterministicEmbedder::default();
        let m = memory("round trip me", &[], &embedder);
        let hash = m.content_hash.clone();
        store.store(m.clone()).unwrap();
        let fetched = store.get(&hash).unwrap().unwrap();
        assert_eq!(fetched.embedding, m.embedding);
    }

    #[test]
    fn delete_removes_memory_and_edges() {
        let store = store();
        let embedder = DeterministicEmbedder::default();
        let a = memory("a", &[], &embedder);
        let b = memory("b", &[], &embedder);
        let (ha, hb) = (a.content_hash.clone(), b.content_hash.clone());
        store.store(a).unwrap();
        store.store(b).unwrap();
        store
            .insert_edge(&ha, &hb, RelationshipType::Related, 0.5, &[], &MetadataMap::new())
            .unwrap();

        assert!(store.delete(&ha).unwrap());
        assert!(store.get(&ha).unwrap().is_none());
        assert!(store.edges_touching(&hb).unwrap().is_empty());
    }

    #[test]
    fn update_metadata_merges_and_bumps_updated_at() {
        let store = store();
        let embedder = DeterministicEmbedder::default();
        let m = memory("note", &[], &embedder);
        let hash = m.content_hash.clone();
        store.store(m).unwrap();

        let mut patch = MetadataMap::new();
        patch.insert("priority", "high");
        assert!(store.update_metadata(&hash, patch).unwrap());

        let updated = store.get(&hash).unwrap().unwrap();
        assert_eq!(updated.metadata.get("priority").unwrap().as_str(), Some("high"));
    }

    #[test]
    fn batch_update_applies_all_in_one_transaction() {
        let store = store();
        let embedder = DeterministicEmbedder::default();
        let a = memory("batch a", &[], &embedder);
        let b = memory("batch b", &[], &embedder);
        let (ha, hb) = (a.content_hash.clone(), b.content_hash.clone());
        store.store(a).unwrap();
        store.store(b).unwrap();

        let mut patch = MetadataMap::new();
        patch.insert("batched", true);
        let updates = vec![(ha.clone(), patch.clone()), (hb.clone(), patch)];
        let applied = store.update_memories_batch(&updates).unwrap();
        assert_eq!(applied, 2);
    }

    #[test]
    fn tag_search_and_mode_requires_all_tags() {
        let store = store();
        let embedder = DeterministicEmbedder::default();
        store.store(memory("has both", &["rust", "async"], &embedder)).unwrap();
        store.store(memory("has one", &["rust"], &embedder)).unwrap();

        let results = store
            .search_by_tags(&["rust".to_string(), "async".to_string()], TagMatch::And, None)
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "has both");
    }

    #[test]
    fn tag_search_or_mode_matches_any() {
        let store = store();
        let embedder = DeterministicEmbedder::default();
        store.store(memory("a", &["x"], &embedder)).unwrap();
        store.store(memory("b", &["y"], &embedder)).unwrap();
        store.store(memory("c", &["z"], &embedder)).unwrap();

        let results = store
            .search_by_tags(&["x".to_string(), "y".to_string()], TagMatch::Or, None)
            .unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn semantic_search_returns_self_as_top_hit() {
        let store = store();
        let embedder = DeterministicEmbedder::default();
        store.store(memory("distinctive phrase alpha", &[], &embedder)).unwrap();
        store.store(memory("something else entirely", &[], &embedder)).unwrap();

        let results = store
            .search_semantic(&embedder, "distinctive phrase alpha", 1, &SearchFilters::default())
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].memory.content, "distinctive phrase alpha");
    }

    #[test]
    fn health_pragmas_report_configured_values() {
        let store = store();
        let pragmas = store.health_pragmas().unwrap();
        assert_eq!(pragmas.journal_mode.to_lowercase(), "wal");
        assert!(pragmas.busy_timeout_ms >= 15_000);
        assert!(pragmas.foreign_keys);
    }

    #[test]
    fn rebuild_embeddings_reindexes_all_memories() {
        let store = store();
        let embedder = DeterministicEmbedder::default();
        store.store(memory("one", &[], &embedder)).unwrap();
        store.store(memory("two", &[], &embedder)).unwrap();
        let rebuilt = store.rebuild_embeddings(&embedder).unwrap();
        assert_eq!(rebuilt, 2);
    }

    #[test]
    fn delete_filtered_refuses_with_no_filter() {
        let store = store();
        let err = store.delete_filtered(&DeleteFilter::default()).unwrap_err();
        assert!(matches!(err, StorageError::NoFilter));
    }

    #[test]
    fn delete_filtered_dry_run_reports_without_deleting() {
        let store = store();
        let embedder = DeterministicEmbedder::default();
        let m = memory("temp note", &["temporary"], &embedder);
        let hash = m.content_hash.clone();
        store.store(m).unwrap();

        let outcome = store
            .delete_filtered(&DeleteFilter {
                tags: Some(vec!["temporary".to_string()]),
                tag_match: Some(TagMatch::Or),
                dry_run: true,
                ..Default::default()
            })
            .unwrap();

        assert_eq!(outcome.deleted_count, 1);
        assert_eq!(outcome.hashes, vec![hash.clone()]);
        assert!(store.get(&hash).unwrap().is_some(), "dry run must not delete");
    }

    #[test]
    fn delete_filtered_by_tags_removes_matches_only() {
        let store = store();
        let embedder = DeterministicEmbedder::default();
        let temp = memory("temp note", &["temporary"], &embedder);
        let keep = memory("keep note", &["permanent"], &embedder);
        let (temp_hash, keep_hash) = (temp.content_hash.clone(), keep.content_hash.clone());
        store.store(temp).unwrap();
        store.store(keep).unwrap();

        let outcome = store
            .delete_filtered(&DeleteFilter {
                tags: Some(vec!["temporary".to_string()]),
                tag_match: Some(TagMatch::Or),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(outcome.deleted_count, 1);
        assert!(store.get(&temp_hash).unwrap().is_none());
        assert!(store.get(&keep_hash).unwrap().is_some());
    }

    #[test]
    fn delete_filtered_by_before_keeps_newer_rows() {
        let store = store();
        let embedder = DeterministicEmbedder::default();
        let old = memory("old note", &[], &embedder);
        let old_hash = old.content_hash.clone();
        store.store(old).unwrap();

        let new = Memory::new(
            "new note",
            vec![],
            None,
            MetadataMap::new(),
            embedder.embed_one("new note").unwrap(),
            1_900_000_000,
        )
        .unwrap();
        let new_hash = new.content_hash.clone();
        store.store(new).unwrap();

        let outcome = store
            .delete_filtered(&DeleteFilter {
                before: Some(1_800_000_000),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(outcome.hashes, vec![old_hash.clone()]);
        assert!(store.get(&old_hash).unwrap().is_none());
        assert!(store.get(&new_hash).unwrap().is_some());
    }

    #[test]
    fn symmetric_edge_is_queryable_from_either_endpoint() {
        let store = store();
        let embedder = DeterministicEmbedder::default();
        let a = memory("a", &[], &embedder);
        let b = memory("b", &[], &embedder);
        let (ha, hb) = (a.content_hash.clone(), b.content_hash.clone());
        store.store(a).unwrap();
        store.store(b).unwrap();
        store
            .insert_edge(&ha, &hb, RelationshipType::Related, 0.8, &[], &MetadataMap::new())
            .unwrap();

        assert_eq!(store.edges_touching(&ha).unwrap().len(), 1);
        assert_eq!(store.edges_touching(&hb).unwrap().len(), 1);
    }
}
