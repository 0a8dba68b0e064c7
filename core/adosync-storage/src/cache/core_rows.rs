//! Shared parent entities: organizations, projects, identities, repositories.
//!
//! These rows are referenced by every search kind. Upserts key on the
//! remote service's external identifier and preserve the local `id`, so
//! join rows written in earlier syncs stay valid.

use rusqlite::{params, OptionalExtension, Row};

use adosync_types::{now_millis, Millis};

use super::CacheTx;
use crate::error::StorageResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizationRow {
    pub id: i64,
    pub name: String,
    /// Canonical connection URL; unique.
    pub connection: String,
    pub time_updated: Millis,
    pub time_last_sync: Millis,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRow {
    pub id: i64,
    pub name: String,
    /// Remote GUID; unique.
    pub external_id: String,
    pub description: String,
    pub organization_id: i64,
    pub time_updated: Millis,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRow {
    pub id: i64,
    pub name: String,
    pub external_id: String,
    pub avatar: Option<Vec<u8>>,
    pub login_id: Option<String>,
    pub time_updated: Millis,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRow {
    pub id: i64,
    pub name: String,
    pub external_id: String,
    pub project_id: i64,
    pub clone_url: String,
    pub is_private: bool,
    pub time_updated: Millis,
}

fn organization_from_row(row: &Row<'_>) -> rusqlite::Result<OrganizationRow> {
    Ok(OrganizationRow {
        id: row.get(0)?,
        name: row.get(1)?,
        connection: row.get(2)?,
        time_updated: row.get(3)?,
        time_last_sync: row.get(4)?,
    })
}

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<ProjectRow> {
    Ok(ProjectRow {
        id: row.get(0)?,
        name: row.get(1)?,
        external_id: row.get(2)?,
        description: row.get(3)?,
        organization_id: row.get(4)?,
        time_updated: row.get(5)?,
    })
}

fn identity_from_row(row: &Row<'_>) -> rusqlite::Result<IdentityRow> {
    Ok(IdentityRow {
        id: row.get(0)?,
        name: row.get(1)?,
        external_id: row.get(2)?,
        avatar: row.get(3)?,
        login_id: row.get(4)?,
        time_updated: row.get(5)?,
    })
}

fn repository_from_row(row: &Row<'_>) -> rusqlite::Result<RepositoryRow> {
    Ok(RepositoryRow {
        id: row.get(0)?,
        name: row.get(1)?,
        external_id: row.get(2)?,
        project_id: row.get(3)?,
        clone_url: row.get(4)?,
        is_private: row.get(5)?,
        time_updated: row.get(6)?,
    })
}

impl CacheTx<'_> {
    // ── Organization ──

    /// Upsert by connection URL; name refreshes on every sync.
    pub fn upsert_organization(&self, name: &str, connection: &str) -> StorageResult<OrganizationRow> {
        let now = now_millis();
        self.conn.execute(
            "INSERT INTO organization (name, connection, time_updated)
             VALUES (?, ?, ?)
             ON CONFLICT(connection) DO UPDATE SET
                 name = excluded.name,
                 time_updated = excluded.time_updated",
            params![name, connection, now],
        )?;
        self.organization_by_connection(connection)?
            .ok_or_else(|| crate::StorageError::NotFound(format!("organization {connection}")))
    }

    pub fn organization_by_connection(
        &self,
        connection: &str,
    ) -> StorageResult<Option<OrganizationRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, connection, time_updated, time_last_sync
                 FROM organization WHERE connection = ?",
                [connection],
                organization_from_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Record a completed sync cycle against the organization.
    pub fn mark_organization_synced(&self, organization_id: i64) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE organization SET time_last_sync = ? WHERE id = ?",
            params![now_millis(), organization_id],
        )?;
        Ok(())
    }

    // ── Project ──

    /// Upsert by remote GUID. The name is overwritten on every fetch so
    /// project renames converge.
    pub fn upsert_project(
        &self,
        name: &str,
        external_id: &str,
        description: &str,
        organization_id: i64,
    ) -> StorageResult<ProjectRow> {
        let now = now_millis();
        self.conn.execute(
            "INSERT INTO project (name, external_id, description, organization_id, time_updated)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(external_id) DO UPDATE SET
                 name = excluded.name,
                 description = excluded.description,
                 organization_id = excluded.organization_id,
                 time_updated = excluded.time_updated",
            params![name, external_id, description, organization_id, now],
        )?;
        self.project_by_external_id(external_id)?
            .ok_or_else(|| crate::StorageError::NotFound(format!("project {external_id}")))
    }

    pub fn project_by_external_id(&self, external_id: &str) -> StorageResult<Option<ProjectRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, external_id, description, organization_id, time_updated
                 FROM project WHERE external_id = ?",
                [external_id],
                project_from_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn project_by_name(
        &self,
        organization_id: i64,
        name: &str,
    ) -> StorageResult<Option<ProjectRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, external_id, description, organization_id, time_updated
                 FROM project WHERE organization_id = ? AND name = ? COLLATE NOCASE",
                params![organization_id, name],
                project_from_row,
            )
            .optional()?;
        Ok(row)
    }

    // ── Identity ──

    /// Upsert by remote GUID. The avatar is only replaced when a new blob is
    /// supplied; callers skip the avatar fetch for fresh identities.
    pub fn upsert_identity(
        &self,
        name: &str,
        external_id: &str,
        login_id: Option<&str>,
        avatar: Option<&[u8]>,
    ) -> StorageResult<IdentityRow> {
        let now = now_millis();
        self.conn.execute(
            "INSERT INTO identity (name, external_id, avatar, login_id, time_updated)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(external_id) DO UPDATE SET
                 name = excluded.name,
                 login_id = COALESCE(excluded.login_id, identity.login_id),
                 avatar = COALESCE(excluded.avatar, identity.avatar),
                 time_updated = excluded.time_updated",
            params![name, external_id, avatar, login_id, now],
        )?;
        self.identity_by_external_id(external_id)?
            .ok_or_else(|| crate::StorageError::NotFound(format!("identity {external_id}")))
    }

    pub fn identity_by_external_id(&self, external_id: &str) -> StorageResult<Option<IdentityRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, external_id, avatar, login_id, time_updated
                 FROM identity WHERE external_id = ?",
                [external_id],
                identity_from_row,
            )
            .optional()?;
        Ok(row)
    }

    // ── Repository ──

    pub fn upsert_repository(
        &self,
        name: &str,
        external_id: &str,
        project_id: i64,
        clone_url: &str,
        is_private: bool,
    ) -> StorageResult<RepositoryRow> {
        let now = now_millis();
        self.conn.execute(
            "INSERT INTO repository (name, external_id, project_id, clone_url, is_private, time_updated)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(external_id) DO UPDATE SET
                 name = excluded.name,
                 project_id = excluded.project_id,
                 clone_url = excluded.clone_url,
                 is_private = excluded.is_private,
                 time_updated = excluded.time_updated",
            params![name, external_id, project_id, clone_url, is_private, now],
        )?;
        self.repository_by_external_id(external_id)?
            .ok_or_else(|| crate::StorageError::NotFound(format!("repository {external_id}")))
    }

    pub fn repository_by_external_id(
        &self,
        external_id: &str,
    ) -> StorageResult<Option<RepositoryRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, external_id, project_id, clone_url, is_private, time_updated
                 FROM repository WHERE external_id = ?",
                [external_id],
                repository_from_row,
            )
            .optional()?;
        Ok(row)
    }

    pub fn repository_by_name(
        &self,
        project_id: i64,
        name: &str,
    ) -> StorageResult<Option<RepositoryRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, name, external_id, project_id, clone_url, is_private, time_updated
                 FROM repository WHERE project_id = ? AND name = ? COLLATE NOCASE",
                params![project_id, name],
                repository_from_row,
            )
            .optional()?;
        Ok(row)
    }
}
