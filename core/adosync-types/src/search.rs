//! Search descriptors and update parameters.
//!
//! A `Search` is the closed union over the four kinds of result sets the
//! cache materializes. Updaters are keyed by `UpdateKind`; a refresh request
//! carries an `UpdateParams` naming the kind and, for targeted refreshes,
//! the specific search.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::uri::RemoteUri;

/// Which updater a dispatch is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdateKind {
    /// Every updater, in no particular order (periodic refresh).
    All,
    Query,
    PullRequests,
    Pipeline,
    MyWorkItems,
}

impl fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UpdateKind::All => "All",
            UpdateKind::Query => "Query",
            UpdateKind::PullRequests => "PullRequests",
            UpdateKind::Pipeline => "Pipeline",
            UpdateKind::MyWorkItems => "MyWorkItems",
        };
        f.write_str(s)
    }
}

/// Remote query flavor reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryKind {
    Flat,
    Tree,
    OneHop,
}

/// Which pull requests a search covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PullRequestView {
    /// Created by the signed-in user.
    Mine,
    /// The signed-in user is a reviewer.
    Assigned,
    /// Everything active in the repository.
    All,
}

impl PullRequestView {
    pub fn as_str(self) -> &'static str {
        match self {
            PullRequestView::Mine => "Mine",
            PullRequestView::Assigned => "Assigned",
            PullRequestView::All => "All",
        }
    }

    pub fn parse(s: &str) -> Option<PullRequestView> {
        match s {
            "Mine" => Some(PullRequestView::Mine),
            "Assigned" => Some(PullRequestView::Assigned),
            "All" => Some(PullRequestView::All),
            _ => None,
        }
    }

    /// Stable integer id stored in the cache's search rows.
    pub fn view_id(self) -> i64 {
        match self {
            PullRequestView::Mine => 1,
            PullRequestView::Assigned => 2,
            PullRequestView::All => 3,
        }
    }
}

/// A saved work-item query search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySearch {
    pub uri: RemoteUri,
    /// External GUID of the saved query.
    pub query_id: Uuid,
    /// Login id of the user the results are scoped to.
    pub username: String,
}

/// A pull-request search over one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestsSearch {
    pub uri: RemoteUri,
    pub repository: String,
    pub view: PullRequestView,
    pub username: String,
}

/// A pipeline (build definition) search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSearch {
    pub uri: RemoteUri,
    /// External integer id of the build definition.
    pub definition_id: i64,
}

/// The implicit per-project "my work items" search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MyWorkItemsSearch {
    pub uri: RemoteUri,
    pub username: String,
}

impl MyWorkItemsSearch {
    /// Synthesized query identity, shared with the cache's `query` rows.
    pub fn query_key(&self) -> String {
        format!("my-work-items:{}", self.uri.scope_key())
    }
}

/// The closed union of search kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Search {
    Query(QuerySearch),
    PullRequests(PullRequestsSearch),
    Pipeline(PipelineSearch),
    MyWorkItems(MyWorkItemsSearch),
}

impl Search {
    pub fn kind(&self) -> UpdateKind {
        match self {
            Search::Query(_) => UpdateKind::Query,
            Search::PullRequests(_) => UpdateKind::PullRequests,
            Search::Pipeline(_) => UpdateKind::Pipeline,
            Search::MyWorkItems(_) => UpdateKind::MyWorkItems,
        }
    }

    pub fn uri(&self) -> &RemoteUri {
        match self {
            Search::Query(s) => &s.uri,
            Search::PullRequests(s) => &s.uri,
            Search::Pipeline(s) => &s.uri,
            Search::MyWorkItems(s) => &s.uri,
        }
    }
}

impl fmt::Display for Search {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.kind(), self.uri())
    }
}

/// Parameters for one dispatch through the update service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateParams {
    pub kind: UpdateKind,
    /// Present for targeted refreshes; `None` means "all searches of this
    /// kind" (and is the only shape the `All` kind uses).
    pub search: Option<Search>,
}

impl UpdateParams {
    pub fn all() -> Self {
        Self {
            kind: UpdateKind::All,
            search: None,
        }
    }

    pub fn for_search(search: Search) -> Self {
        Self {
            kind: search.kind(),
            search: Some(search),
        }
    }
}
