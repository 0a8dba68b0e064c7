//! Pruning: TTL deletes first, then orphan collection.
//!
//! TTL deletes must run before orphan deletes so that parents newly
//! orphaned by an expiring join row are collected in the same pass.

use rusqlite::params;
use tracing::debug;

use adosync_types::Millis;

use super::CacheTx;
use crate::error::StorageResult;

/// Prefix identifying synthesized my-work-items queries in the `query`
/// table; their join rows use a much tighter TTL than saved queries.
pub const MY_WORK_ITEMS_PREFIX: &str = "my-work-items:";

impl CacheTx<'_> {
    /// Delete build rows older than the cutoff.
    pub fn delete_builds_before(&self, cutoff: Millis) -> StorageResult<usize> {
        let n = self.conn.execute(
            "DELETE FROM build WHERE time_updated < ?",
            params![cutoff],
        )?;
        Ok(n)
    }

    /// Delete saved-query join rows older than the cutoff.
    pub fn delete_query_work_items_before(&self, cutoff: Millis) -> StorageResult<usize> {
        let n = self.conn.execute(
            "DELETE FROM query_work_item
             WHERE time_updated < ?
               AND query_id IN (SELECT id FROM query WHERE external_id NOT LIKE ? || '%')",
            params![cutoff, MY_WORK_ITEMS_PREFIX],
        )?;
        Ok(n)
    }

    /// Delete my-work-items join rows older than the cutoff.
    pub fn delete_my_work_item_joins_before(&self, cutoff: Millis) -> StorageResult<usize> {
        let n = self.conn.execute(
            "DELETE FROM query_work_item
             WHERE time_updated < ?
               AND query_id IN (SELECT id FROM query WHERE external_id LIKE ? || '%')",
            params![cutoff, MY_WORK_ITEMS_PREFIX],
        )?;
        Ok(n)
    }

    /// Delete leaf entities no join row (or build row) references anymore.
    pub fn delete_orphans(&self) -> StorageResult<usize> {
        let mut total = 0;
        total += self.conn.execute(
            "DELETE FROM work_item
             WHERE id NOT IN (SELECT work_item_id FROM query_work_item)",
            [],
        )?;
        total += self.conn.execute(
            "DELETE FROM pull_request
             WHERE id NOT IN (SELECT pull_request_id FROM pull_request_search_pull_request)",
            [],
        )?;
        total += self.conn.execute(
            "DELETE FROM definition
             WHERE id NOT IN (SELECT definition_id FROM build)",
            [],
        )?;
        if total > 0 {
            debug!("[CACHE] pruned {total} orphaned rows");
        }
        Ok(total)
    }
}
