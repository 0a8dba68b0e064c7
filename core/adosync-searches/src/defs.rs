//! Definition types: what the user asked the core to watch.
//!
//! Each definition carries the URL the user pasted; the natural key is
//! derived from it at save time. `id` is `None` until the definition has
//! been persisted.

use adosync_types::{
    MyWorkItemsSearch, PipelineSearch, PullRequestView, PullRequestsSearch, QuerySearch,
    RemoteUri, UriError, UriResource,
};

/// A saved work-item query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDef {
    pub id: Option<i64>,
    pub name: String,
    pub url: String,
    pub is_top_level: bool,
}

impl QueryDef {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            url: url.into(),
            is_top_level: false,
        }
    }

    /// Parse the URL and require a query resource.
    pub fn parsed(&self) -> Result<(RemoteUri, uuid::Uuid), UriError> {
        let uri: RemoteUri = self.url.parse()?;
        match uri.resource {
            Some(UriResource::Query(id)) => Ok((uri, id)),
            _ => Err(UriError::MissingSegment("query id")),
        }
    }

    /// The search this definition produces for a given user.
    pub fn search(&self, username: &str) -> Result<QuerySearch, UriError> {
        let (uri, query_id) = self.parsed()?;
        Ok(QuerySearch {
            uri,
            query_id,
            username: username.to_string(),
        })
    }
}

/// A saved pull-request search over one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestSearchDef {
    pub id: Option<i64>,
    pub name: String,
    pub url: String,
    pub view: PullRequestView,
    pub is_top_level: bool,
}

impl PullRequestSearchDef {
    pub fn new(name: impl Into<String>, url: impl Into<String>, view: PullRequestView) -> Self {
        Self {
            id: None,
            name: name.into(),
            url: url.into(),
            view,
            is_top_level: false,
        }
    }

    pub fn parsed(&self) -> Result<(RemoteUri, String), UriError> {
        let uri: RemoteUri = self.url.parse()?;
        let repository = match &uri.resource {
            Some(UriResource::Repository(name)) => name.clone(),
            _ => return Err(UriError::MissingSegment("repository name")),
        };
        Ok((uri, repository))
    }

    pub fn search(&self, username: &str) -> Result<PullRequestsSearch, UriError> {
        let (uri, repository) = self.parsed()?;
        Ok(PullRequestsSearch {
            uri,
            repository,
            view: self.view,
            username: username.to_string(),
        })
    }
}

/// A saved pipeline (build definition) search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionSearchDef {
    pub id: Option<i64>,
    pub name: String,
    /// External integer id of the build definition.
    pub external_id: i64,
    pub url: String,
    pub is_top_level: bool,
}

impl DefinitionSearchDef {
    pub fn new(name: impl Into<String>, external_id: i64, url: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            external_id,
            url: url.into(),
            is_top_level: false,
        }
    }

    pub fn parsed(&self) -> Result<RemoteUri, UriError> {
        self.url.parse()
    }

    pub fn search(&self) -> Result<PipelineSearch, UriError> {
        Ok(PipelineSearch {
            uri: self.parsed()?,
            definition_id: self.external_id,
        })
    }
}

/// Per-project settings; each row implies a my-work-items search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectSettings {
    pub id: Option<i64>,
    pub organization_url: String,
    pub project_name: String,
}

impl ProjectSettings {
    pub fn new(organization_url: impl Into<String>, project_name: impl Into<String>) -> Self {
        Self {
            id: None,
            organization_url: organization_url.into(),
            project_name: project_name.into(),
        }
    }

    pub fn parsed(&self) -> Result<RemoteUri, UriError> {
        format!(
            "{}/{}",
            self.organization_url.trim_end_matches('/'),
            self.project_name
        )
        .parse()
    }

    pub fn search(&self, username: &str) -> Result<MyWorkItemsSearch, UriError> {
        Ok(MyWorkItemsSearch {
            uri: self.parsed()?,
            username: username.to_string(),
        })
    }
}
