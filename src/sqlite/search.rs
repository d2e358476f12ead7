//! Semantic search and similarity operations.

use super::{embedding, Database, Error, Memory, Scope};

pub type Result<T> = std::result::Result<T, Error>;

const MAX_SEARCH_LIMIT: usize = 10_000;

/// Validate search limit is within acceptable bounds.
pub fn validate_limit(limit: usize) -> Result<()> {
    if limit == 0 {
        return Err(Error::InvalidLimit(
            "Limit must be greater than 0".to_string(),
        ));
    }
    if limit > i64::MAX as usize || limit > MAX_SEARCH_LIMIT {
        return Err(Error::InvalidLimit(format!(
            "Limit {} exceeds maximum allowed ({})",
            limit, MAX_SEARCH_LIMIT
        )));
    }
    Ok(())
}

impl Database {
    /// Search for similar memories using semantic (cosine) similarity.
    ///
    /// Retrieves all memories visible in `scope`, computes cosine similarity with the
    /// query embedding, sorts by similarity (highest first), and returns the top
    /// `limit` results.
    ///
    /// # Errors
    ///
    /// Returns error if the query embedding has invalid dimensions or if the database
    /// query fails.
    pub fn search(
        &self,
        scope: &Scope<'_>,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<Memory>> {
        validate_limit(limit)?;
        if query_embedding.len() != self.dims {
            return Err(Error::MismatchedDimensions {
                expected: self.dims,
                actual: query_embedding.len(),
            });
        }

        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, user_id, session_id, content, metadata, created_at, updated_at, embedding
            FROM memories
            WHERE user_id = ?1 AND (?2 IS NULL OR session_id = ?2)
            "#,
        )?;

        let mut memories: Vec<Memory> = Vec::new();

        let rows = stmt.query_map(rusqlite::params![scope.user_id, scope.session_id], |row| {
            Ok((
                Memory {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    session_id: row.get(2)?,
                    content: row.get(3)?,
                    metadata: row.get(4)?,
                    similarity: None,
                    created_at: row.get(5)?,
                    updated_at: row.get(6)?,
                },
                row.get::<_, Vec<u8>>(7)?,
            ))
        })?;

        for row_result in rows {
            let (mut memory, blob) = row_result?;
            let stored_embedding = embedding::blob_to_vec(&blob, self.dims)?;
            memory.similarity = Some(embedding::cosine_similarity(
                query_embedding,
                &stored_embedding,
            )?);
            memories.push(memory);
        }

        memories.sort_by(|a, b| {
            b.similarity
                .unwrap_or(0.0)
                .partial_cmp(&a.similarity.unwrap_or(0.0))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        memories.truncate(limit);
        Ok(memories)
    }
}
