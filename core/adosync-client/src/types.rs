//! Normalized wire types.
//!
//! The REST layer flattens the service's JSON into these structs; updaters
//! never see raw payloads. Dates are already converted to epoch
//! milliseconds here so the storage layer stays serde-free.

use adosync_types::{Millis, PolicyStatus, PullRequestView, QueryKind};
use uuid::Uuid;

/// A reference to a user identity as embedded in remote payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteIdentityRef {
    /// Remote GUID, as a string.
    pub id: String,
    pub display_name: String,
    /// Login id (UPN); absent for service identities.
    pub unique_name: Option<String>,
}

/// A saved query's definition as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteQuery {
    pub id: Uuid,
    pub name: String,
    /// `None` for query flavors this core does not evaluate.
    pub kind: Option<QueryKind>,
}

/// The id list a query evaluates to. Tree and one-hop results are already
/// flattened to target ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteQueryResult {
    pub kind: QueryKind,
    pub ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteWorkItem {
    pub id: i64,
    pub title: String,
    pub html_url: String,
    pub state: String,
    pub reason: String,
    pub work_item_type: String,
    pub assigned_to: Option<RemoteIdentityRef>,
    pub created_date: Millis,
    pub created_by: Option<RemoteIdentityRef>,
    pub changed_date: Millis,
    pub changed_by: Option<RemoteIdentityRef>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteWorkItemType {
    pub name: String,
    pub icon_url: String,
    pub color: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteProject {
    pub id: String,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRepository {
    pub id: String,
    pub name: String,
    /// GUID of the owning project.
    pub project_id: String,
    pub clone_url: String,
    pub is_private: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePullRequest {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub html_url: String,
    pub status: String,
    pub target_branch: String,
    pub created_by: Option<RemoteIdentityRef>,
    pub creation_date: Millis,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePolicyEvaluation {
    pub status: PolicyStatus,
    /// Display name of the policy type, for the status reason.
    pub policy_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDefinition {
    pub id: i64,
    pub name: String,
    pub creation_date: Millis,
    pub html_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteBuild {
    pub id: i64,
    pub build_number: String,
    pub status: String,
    pub result: String,
    pub queue_time: Millis,
    pub start_time: Millis,
    pub finish_time: Millis,
    pub url: String,
    pub source_branch: String,
    pub trigger_message: String,
    pub requested_for: Option<RemoteIdentityRef>,
}

/// Server-side filter for a pull-request listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullRequestFilter {
    /// Only pull requests created by this identity.
    pub creator_id: Option<String>,
    /// Only pull requests where this identity is a reviewer.
    pub reviewer_id: Option<String>,
}

impl PullRequestFilter {
    /// Derive the filter a view implies for the signed-in identity.
    pub fn for_view(view: PullRequestView, self_id: &str) -> Self {
        match view {
            PullRequestView::Mine => Self {
                creator_id: Some(self_id.to_string()),
                reviewer_id: None,
            },
            PullRequestView::Assigned => Self {
                creator_id: None,
                reviewer_id: Some(self_id.to_string()),
            },
            PullRequestView::All => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_for_view() {
        let mine = PullRequestFilter::for_view(PullRequestView::Mine, "abc");
        assert_eq!(mine.creator_id.as_deref(), Some("abc"));
        assert_eq!(mine.reviewer_id, None);

        let assigned = PullRequestFilter::for_view(PullRequestView::Assigned, "abc");
        assert_eq!(assigned.creator_id, None);
        assert_eq!(assigned.reviewer_id.as_deref(), Some("abc"));

        assert_eq!(
            PullRequestFilter::for_view(PullRequestView::All, "abc"),
            PullRequestFilter::default()
        );
    }
}
