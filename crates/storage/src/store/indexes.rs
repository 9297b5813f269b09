#![forbid(unsafe_code)]

//! Reference and full-text rows derived from block content.
//!
//! Both indexes are rebuilt wholesale per block inside the caller's
//! transaction, so they can never drift from the committed content.

use super::{RefRow, SearchHit, SearchOptions, SqliteStore, StoreError};
use bdoc_core::content::{extract_refs, extract_text};
use rusqlite::{Connection, Transaction, params};
use serde_json::Value;

impl SqliteStore {
    /// Prefix search over live blocks of live objects, best match first.
    pub fn search(&self, query: &str, options: SearchOptions) -> Result<Vec<SearchHit>, StoreError> {
        let Some(fts_query) = build_match_query(query) else {
            return Ok(Vec::new());
        };
        let limit = super::to_sqlite_i64(self.config.clamp_search_limit(options.limit))?;

        let mut stmt = self.conn.prepare(
            "SELECT block_search.block_id, block_search.object_id \
             FROM block_search \
             JOIN blocks b ON b.id = block_search.block_id \
             JOIN objects o ON o.id = block_search.object_id \
             WHERE block_search MATCH ?1 \
               AND b.deleted_at_ms IS NULL \
               AND o.deleted_at_ms IS NULL \
               AND (?2 IS NULL OR block_search.object_id = ?2) \
             ORDER BY block_search.rank \
             LIMIT ?3",
        )?;
        let rows = stmt.query_map(params![fts_query, options.object_id, limit], |row| {
            Ok(SearchHit {
                block_id: row.get(0)?,
                object_id: row.get(1)?,
            })
        })?;
        let hits = rows.collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(query, hits = hits.len(), "search");
        Ok(hits)
    }

    /// Outgoing references of one block, in content order.
    pub fn list_refs(&self, block_id: &str) -> Result<Vec<RefRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT source_block_id, source_object_id, target_object_id, target_block_id \
             FROM block_refs WHERE source_block_id=?1 ORDER BY ordinal ASC",
        )?;
        let rows = stmt.query_map(params![block_id], ref_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// References pointing at `target_object_id` from live blocks of live
    /// objects.
    pub fn list_backlinks(&self, target_object_id: &str) -> Result<Vec<RefRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT r.source_block_id, r.source_object_id, r.target_object_id, r.target_block_id \
             FROM block_refs r \
             JOIN blocks b ON b.id = r.source_block_id \
             JOIN objects o ON o.id = r.source_object_id \
             WHERE r.target_object_id=?1 \
               AND b.deleted_at_ms IS NULL \
               AND o.deleted_at_ms IS NULL \
             ORDER BY r.source_object_id ASC, r.source_block_id ASC, r.ordinal ASC",
        )?;
        let rows = stmt.query_map(params![target_object_id], ref_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn ref_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RefRow> {
    Ok(RefRow {
        source_block_id: row.get(0)?,
        source_object_id: row.get(1)?,
        target_object_id: row.get(2)?,
        target_block_id: row.get(3)?,
    })
}

/// Replaces every ref row of `block_id` with the refs found in `content`.
pub(crate) fn reindex_refs(
    tx: &Transaction<'_>,
    block_id: &str,
    object_id: &str,
    content: &Value,
) -> Result<usize, StoreError> {
    tx.execute(
        "DELETE FROM block_refs WHERE source_block_id=?1",
        params![block_id],
    )?;

    let refs = extract_refs(content);
    let mut stmt = tx.prepare_cached(
        "INSERT INTO block_refs(source_block_id, ordinal, source_object_id, target_object_id, target_block_id) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for (ordinal, target) in refs.iter().enumerate() {
        stmt.execute(params![
            block_id,
            super::to_sqlite_i64(ordinal)?,
            object_id,
            target.object_id,
            target.block_id,
        ])?;
    }
    Ok(refs.len())
}

/// Upserts the search row of `block_id`, or removes it when the content
/// carries no text.
pub(crate) fn reindex_search(
    tx: &Transaction<'_>,
    block_id: &str,
    object_id: &str,
    content: &Value,
) -> Result<(), StoreError> {
    tx.execute(
        "DELETE FROM block_search WHERE block_id=?1",
        params![block_id],
    )?;
    let text = extract_text(content);
    if !text.is_empty() {
        tx.execute(
            "INSERT INTO block_search(block_id, object_id, text) VALUES (?1, ?2, ?3)",
            params![block_id, object_id, text],
        )?;
    }
    Ok(())
}

pub(crate) fn reindex_block(
    tx: &Transaction<'_>,
    block_id: &str,
    object_id: &str,
    content: &Value,
) -> Result<(), StoreError> {
    reindex_refs(tx, block_id, object_id, content)?;
    reindex_search(tx, block_id, object_id, content)
}

pub(crate) fn remove_indexes(conn: &Connection, block_ids: &[String]) -> Result<(), StoreError> {
    let mut refs = conn.prepare_cached("DELETE FROM block_refs WHERE source_block_id=?1")?;
    let mut search = conn.prepare_cached("DELETE FROM block_search WHERE block_id=?1")?;
    for block_id in block_ids {
        refs.execute(params![block_id])?;
        search.execute(params![block_id])?;
    }
    Ok(())
}

/// `foo ba` becomes `"foo"* AND "ba"*`; embedded quotes are doubled.
/// Tokens without a letter or digit are dropped; FTS5 rejects them as prefix
/// terms.
fn build_match_query(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split_whitespace()
        .filter(|token| token.chars().any(char::is_alphanumeric))
        .map(|token| format!("\"{}\"*", token.replace('"', "\"\"")))
        .collect();
    if terms.is_empty() {
        return None;
    }
    Some(terms.join(" AND "))
}

#[cfg(test)]
mod tests {
    use super::build_match_query;

    #[test]
    fn tokens_become_quoted_prefix_terms() {
        assert_eq!(build_match_query("  "), None);
        assert_eq!(build_match_query("foo"), Some("\"foo\"*".to_string()));
        assert_eq!(
            build_match_query("foo  ba"),
            Some("\"foo\"* AND \"ba\"*".to_string())
        );
        assert_eq!(
            build_match_query("say\"hi"),
            Some("\"say\"\"hi\"*".to_string())
        );
    }

    #[test]
    fn punctuation_only_tokens_are_dropped() {
        assert_eq!(build_match_query("hello -"), Some("\"hello\"*".to_string()));
        assert_eq!(
            build_match_query("- plan !! notes"),
            Some("\"plan\"* AND \"notes\"*".to_string())
        );
        assert_eq!(build_match_query("- !"), None);
    }
}
