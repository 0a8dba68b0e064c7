//! Build-definition and build rows.
//!
//! Definitions change rarely; the updater throttles overwrites of existing
//! rows. Builds have no join table; they reference their definition
//! directly and age out via the retention TTL.

use rusqlite::{params, OptionalExtension, Row};

use adosync_types::{now_millis, Millis};

use super::CacheTx;
use crate::error::StorageResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionRow {
    pub id: i64,
    pub external_id: i64,
    pub name: String,
    pub project_id: i64,
    pub creation_date: Millis,
    pub html_url: String,
    pub time_updated: Millis,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRow {
    pub id: i64,
    pub external_id: i64,
    pub build_number: String,
    pub status: String,
    pub result: String,
    pub queue_time: Millis,
    pub start_time: Millis,
    pub finish_time: Millis,
    pub url: String,
    pub definition_id: i64,
    pub source_branch: String,
    pub trigger_message: String,
    pub requester_id: Option<i64>,
    pub time_updated: Millis,
}

/// A build joined with its requester, as rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSummary {
    pub external_id: i64,
    pub build_number: String,
    pub status: String,
    pub result: String,
    pub queue_time: Millis,
    pub start_time: Millis,
    pub finish_time: Millis,
    pub url: String,
    pub source_branch: String,
    pub trigger_message: String,
    pub requester: Option<String>,
}

fn definition_from_row(row: &Row<'_>) -> rusqlite::Result<DefinitionRow> {
    Ok(DefinitionRow {
        id: row.get(0)?,
        external_id: row.get(1)?,
        name: row.get(2)?,
        project_id: row.get(3)?,
        creation_date: row.get(4)?,
        html_url: row.get(5)?,
        time_updated: row.get(6)?,
    })
}

impl CacheTx<'_> {
    // ── Definitions ──

    pub fn upsert_definition(
        &self,
        external_id: i64,
        name: &str,
        project_id: i64,
        creation_date: Millis,
        html_url: &str,
    ) -> StorageResult<DefinitionRow> {
        let now = now_millis();
        self.conn.execute(
            "INSERT INTO definition (external_id, name, project_id, creation_date, html_url, time_updated)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(external_id, project_id) DO UPDATE SET
                 name = excluded.name,
                 creation_date = excluded.creation_date,
                 html_url = excluded.html_url,
                 time_updated = excluded.time_updated",
            params![external_id, name, project_id, creation_date, html_url, now],
        )?;
        self.definition_by_key(external_id, project_id)?
            .ok_or_else(|| crate::StorageError::NotFound(format!("definition {external_id}")))
    }

    pub fn definition_by_key(
        &self,
        external_id: i64,
        project_id: i64,
    ) -> StorageResult<Option<DefinitionRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, external_id, name, project_id, creation_date, html_url, time_updated
                 FROM definition WHERE external_id = ? AND project_id = ?",
                params![external_id, project_id],
                definition_from_row,
            )
            .optional()?;
        Ok(row)
    }

    // ── Builds ──

    #[allow(clippy::too_many_arguments)]
    pub fn upsert_build(
        &self,
        external_id: i64,
        build_number: &str,
        status: &str,
        result: &str,
        queue_time: Millis,
        start_time: Millis,
        finish_time: Millis,
        url: &str,
        definition_id: i64,
        source_branch: &str,
        trigger_message: &str,
        requester_id: Option<i64>,
    ) -> StorageResult<i64> {
        let now = now_millis();
        self.conn.execute(
            "INSERT INTO build (external_id, build_number, status, result, queue_time, start_time,
                                finish_time, url, definition_id, source_branch, trigger_message,
                                requester_id, time_updated)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(external_id) DO UPDATE SET
                 build_number = excluded.build_number,
                 status = excluded.status,
                 result = excluded.result,
                 queue_time = excluded.queue_time,
                 start_time = excluded.start_time,
                 finish_time = excluded.finish_time,
                 url = excluded.url,
                 definition_id = excluded.definition_id,
                 source_branch = excluded.source_branch,
                 trigger_message = excluded.trigger_message,
                 requester_id = excluded.requester_id,
                 time_updated = excluded.time_updated",
            params![
                external_id,
                build_number,
                status,
                result,
                queue_time,
                start_time,
                finish_time,
                url,
                definition_id,
                source_branch,
                trigger_message,
                requester_id,
                now
            ],
        )?;
        let id = self.conn.query_row(
            "SELECT id FROM build WHERE external_id = ?",
            [external_id],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// Builds for a definition, most recently queued first.
    pub fn builds_for_definition(&self, definition_id: i64) -> StorageResult<Vec<BuildSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT b.external_id, b.build_number, b.status, b.result, b.queue_time, b.start_time,
                    b.finish_time, b.url, b.source_branch, b.trigger_message, req.name
             FROM build b
             LEFT JOIN identity req ON req.id = b.requester_id
             WHERE b.definition_id = ?
             ORDER BY b.queue_time DESC",
        )?;

        let builds = stmt
            .query_map([definition_id], |row| {
                Ok(BuildSummary {
                    external_id: row.get(0)?,
                    build_number: row.get(1)?,
                    status: row.get(2)?,
                    result: row.get(3)?,
                    queue_time: row.get(4)?,
                    start_time: row.get(5)?,
                    finish_time: row.get(6)?,
                    url: row.get(7)?,
                    source_branch: row.get(8)?,
                    trigger_message: row.get(9)?,
                    requester: row.get(10)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(builds)
    }
}
