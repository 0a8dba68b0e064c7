//! Query, work-item, work-item-type, and join rows.
//!
//! A `query` row is either a saved remote query (external GUID) or the
//! synthesized my-work-items query (`my-work-items:{org}|{project}`). Both
//! are scoped per user via the `(external_id, username)` natural key, so two
//! accounts watching the same query keep separate result sets.

use rusqlite::{params, OptionalExtension, Row};

use adosync_types::{now_millis, Millis};

use super::CacheTx;
use crate::error::StorageResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRow {
    pub id: i64,
    pub external_id: String,
    pub display_name: String,
    pub username: String,
    pub project_id: i64,
    pub time_updated: Millis,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItemTypeRow {
    pub id: i64,
    pub name: String,
    pub icon: String,
    pub color: String,
    pub description: String,
    pub project_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItemRow {
    pub id: i64,
    pub external_id: i64,
    pub title: String,
    pub html_url: String,
    pub state: String,
    pub reason: String,
    pub assigned_to_id: Option<i64>,
    pub created_date: Millis,
    pub created_by_id: Option<i64>,
    pub changed_date: Millis,
    pub changed_by_id: Option<i64>,
    pub work_item_type_id: i64,
}

/// A work item joined with its type and assignee, as rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItemSummary {
    pub external_id: i64,
    pub title: String,
    pub html_url: String,
    pub state: String,
    pub changed_date: Millis,
    pub type_name: String,
    pub type_icon: String,
    pub type_color: String,
    pub assigned_to: Option<String>,
}

fn query_from_row(row: &Row<'_>) -> rusqlite::Result<QueryRow> {
    Ok(QueryRow {
        id: row.get(0)?,
        external_id: row.get(1)?,
        display_name: row.get(2)?,
        username: row.get(3)?,
        project_id: row.get(4)?,
        time_updated: row.get(5)?,
    })
}

impl CacheTx<'_> {
    // ── Query ──

    pub fn upsert_query(
        &self,
        external_id: &str,
        display_name: &str,
        username: &str,
        project_id: i64,
    ) -> StorageResult<QueryRow> {
        let now = now_millis();
        self.conn.execute(
            "INSERT INTO query (external_id, display_name, username, project_id, time_updated)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(external_id, username) DO UPDATE SET
                 display_name = excluded.display_name,
                 project_id = excluded.project_id,
                 time_updated = excluded.time_updated",
            params![external_id, display_name, username, project_id, now],
        )?;
        self.query_by_key(external_id, username)?
            .ok_or_else(|| crate::StorageError::NotFound(format!("query {external_id}")))
    }

    pub fn query_by_key(
        &self,
        external_id: &str,
        username: &str,
    ) -> StorageResult<Option<QueryRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, external_id, display_name, username, project_id, time_updated
                 FROM query WHERE external_id = ? AND username = ?",
                params![external_id, username],
                query_from_row,
            )
            .optional()?;
        Ok(row)
    }

    // ── Work item type ──

    pub fn upsert_work_item_type(
        &self,
        name: &str,
        icon: &str,
        color: &str,
        description: &str,
        project_id: i64,
    ) -> StorageResult<WorkItemTypeRow> {
        self.conn.execute(
            "INSERT INTO work_item_type (name, icon, color, description, project_id)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(name, project_id) DO UPDATE SET
                 icon = excluded.icon,
                 color = excluded.color,
                 description = excluded.description",
            params![name, icon, color, description, project_id],
        )?;
        self.work_item_type_by_name(name, project_id)?
            .ok_or_else(|| crate::StorageError::NotFound(format!("work item type {name}")))
    }

    pub fn work_item_type_by_name(
        &self,
        name: &str,
        project_id: i64,
    ) -> StorageResult<Option<WorkItemTypeRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, icon, color, description, project_id
                 FROM work_item_type WHERE name = ? AND project_id = ?",
                params![name, project_id],
                |row| {
                    Ok(WorkItemTypeRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        icon: row.get(2)?,
                        color: row.get(3)?,
                        description: row.get(4)?,
                        project_id: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    // ── Work item ──

    #[allow(clippy::too_many_arguments)]
    pub fn upsert_work_item(
        &self,
        external_id: i64,
        title: &str,
        html_url: &str,
        state: &str,
        reason: &str,
        assigned_to_id: Option<i64>,
        created_date: Millis,
        created_by_id: Option<i64>,
        changed_date: Millis,
        changed_by_id: Option<i64>,
        work_item_type_id: i64,
    ) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO work_item (external_id, title, html_url, state, reason, assigned_to_id,
                                    created_date, created_by_id, changed_date, changed_by_id,
                                    work_item_type_id)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(external_id) DO UPDATE SET
                 title = excluded.title,
                 html_url = excluded.html_url,
                 state = excluded.state,
                 reason = excluded.reason,
                 assigned_to_id = excluded.assigned_to_id,
                 created_date = excluded.created_date,
                 created_by_id = excluded.created_by_id,
                 changed_date = excluded.changed_date,
                 changed_by_id = excluded.changed_by_id,
                 work_item_type_id = excluded.work_item_type_id",
            params![
                external_id,
                title,
                html_url,
                state,
                reason,
                assigned_to_id,
                created_date,
                created_by_id,
                changed_date,
                changed_by_id,
                work_item_type_id
            ],
        )?;
        let id = self.conn.query_row(
            "SELECT id FROM work_item WHERE external_id = ?",
            [external_id],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    // ── Join table ──

    pub fn upsert_query_work_item(
        &self,
        query_id: i64,
        work_item_id: i64,
        time_updated: Millis,
    ) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO query_work_item (query_id, work_item_id, time_updated)
             VALUES (?, ?, ?)
             ON CONFLICT(query_id, work_item_id) DO UPDATE SET
                 time_updated = excluded.time_updated",
            params![query_id, work_item_id, time_updated],
        )?;
        Ok(())
    }

    /// Remove join rows for a query that were not touched by the sync that
    /// started at `sync_start`; these are items that fell out of the remote result.
    pub fn delete_stale_query_work_items(
        &self,
        query_id: i64,
        sync_start: Millis,
    ) -> StorageResult<usize> {
        let n = self.conn.execute(
            "DELETE FROM query_work_item WHERE query_id = ? AND time_updated < ?",
            params![query_id, sync_start],
        )?;
        Ok(n)
    }

    /// Work items for a query, joined with type and assignee. Ordering is
    /// applied by the caller (type priority, then changed date).
    pub fn work_items_for_query(&self, query_id: i64) -> StorageResult<Vec<WorkItemSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT wi.external_id, wi.title, wi.html_url, wi.state, wi.changed_date,
                    wit.name, wit.icon, wit.color, asgn.name
             FROM query_work_item qwi
             JOIN work_item wi ON wi.id = qwi.work_item_id
             JOIN work_item_type wit ON wit.id = wi.work_item_type_id
             LEFT JOIN identity asgn ON asgn.id = wi.assigned_to_id
             WHERE qwi.query_id = ?
             ORDER BY qwi.time_updated DESC, wi.changed_date DESC",
        )?;

        let items = stmt
            .query_map([query_id], |row| {
                Ok(WorkItemSummary {
                    external_id: row.get(0)?,
                    title: row.get(1)?,
                    html_url: row.get(2)?,
                    state: row.get(3)?,
                    changed_date: row.get(4)?,
                    type_name: row.get(5)?,
                    type_icon: row.get(6)?,
                    type_color: row.get(7)?,
                    assigned_to: row.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(items)
    }

    pub fn query_work_item_count(&self, query_id: i64) -> StorageResult<i64> {
        let n = self.conn.query_row(
            "SELECT COUNT(*) FROM query_work_item WHERE query_id = ?",
            [query_id],
            |row| row.get(0),
        )?;
        Ok(n)
    }
}
