//! Parsing of Azure DevOps resource URLs.
//!
//! Every saved search definition carries a URL that must resolve to
//! `(host kind, organization, project, optional resource)`. Two host shapes
//! are recognized:
//!
//! - `https://dev.azure.com/{organization}/{project}/...`
//! - `https://{organization}.visualstudio.com/{project}/...` (legacy)
//!
//! Resources are the sub-paths the four search kinds point at: a saved query
//! (`_queries/query/{guid}`), a git repository (`_git/{name}`), or a build
//! definition (`_build?definitionId={id}`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;
use uuid::Uuid;

/// Which host shape the URL used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostKind {
    /// `dev.azure.com/{organization}`.
    Modern,
    /// `{organization}.visualstudio.com`.
    Legacy,
}

/// The sub-resource a search URL points at, when it points at one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UriResource {
    /// A saved work-item query.
    Query(Uuid),
    /// A git repository, by name.
    Repository(String),
    /// A build definition, by its integer id.
    Definition(i64),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UriError {
    #[error("not a valid URL: {0}")]
    Malformed(String),

    #[error("unrecognized host: {0}")]
    UnknownHost(String),

    #[error("URL is missing the {0} segment")]
    MissingSegment(&'static str),

    #[error("invalid {what} identifier: {value}")]
    BadIdentifier { what: &'static str, value: String },
}

/// A parsed Azure DevOps URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteUri {
    pub host_kind: HostKind,
    pub organization: String,
    pub project: String,
    pub resource: Option<UriResource>,
}

impl RemoteUri {
    /// The canonical connection URL for the owning organization.
    pub fn organization_url(&self) -> String {
        match self.host_kind {
            HostKind::Modern => format!("https://dev.azure.com/{}", self.organization),
            HostKind::Legacy => format!("https://{}.visualstudio.com", self.organization),
        }
    }

    /// Case-insensitive `{org}|{project}` scope key, shared with the
    /// synthesized my-work-items query identity.
    pub fn scope_key(&self) -> String {
        format!(
            "{}|{}",
            self.organization.to_lowercase(),
            self.project.to_lowercase()
        )
    }
}

impl fmt::Display for RemoteUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.organization_url(), self.project)
    }
}

impl FromStr for RemoteUri {
    type Err = UriError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let url = Url::parse(s).map_err(|e| UriError::Malformed(e.to_string()))?;
        let host = url
            .host_str()
            .ok_or_else(|| UriError::Malformed(s.to_string()))?
            .to_lowercase();

        let mut segments: Vec<String> = url
            .path_segments()
            .map(|ps| {
                ps.filter(|seg| !seg.is_empty())
                    .map(|seg| {
                        percent_decode(seg)
                    })
                    .collect()
            })
            .unwrap_or_default();

        let (host_kind, organization) = if host == "dev.azure.com" {
            if segments.is_empty() {
                return Err(UriError::MissingSegment("organization"));
            }
            (HostKind::Modern, segments.remove(0))
        } else if let Some(org) = host.strip_suffix(".visualstudio.com") {
            if org.is_empty() {
                return Err(UriError::UnknownHost(host));
            }
            (HostKind::Legacy, org.to_string())
        } else {
            return Err(UriError::UnknownHost(host));
        };

        if segments.is_empty() {
            return Err(UriError::MissingSegment("project"));
        }
        let project = segments.remove(0);

        let resource = parse_resource(&segments, &url)?;

        Ok(Self {
            host_kind,
            organization,
            project,
            resource,
        })
    }
}

fn parse_resource(segments: &[String], url: &Url) -> Result<Option<UriResource>, UriError> {
    let mut iter = segments.iter();
    while let Some(seg) = iter.next() {
        match seg.as_str() {
            "_queries" => {
                // `_queries/query/{guid}` or `_queries/query-edit/{guid}`
                let _mode = iter
                    .next()
                    .ok_or(UriError::MissingSegment("query id"))?;
                let raw = iter.next().ok_or(UriError::MissingSegment("query id"))?;
                let id = Uuid::parse_str(raw).map_err(|_| UriError::BadIdentifier {
                    what: "query",
                    value: raw.clone(),
                })?;
                return Ok(Some(UriResource::Query(id)));
            }
            "_git" => {
                let name = iter
                    .next()
                    .ok_or(UriError::MissingSegment("repository name"))?;
                return Ok(Some(UriResource::Repository(name.clone())));
            }
            "_build" => {
                let raw = url
                    .query_pairs()
                    .find(|(k, _)| k == "definitionId")
                    .map(|(_, v)| v.into_owned())
                    .ok_or(UriError::MissingSegment("definitionId"))?;
                let id: i64 = raw.parse().map_err(|_| UriError::BadIdentifier {
                    what: "definition",
                    value: raw,
                })?;
                return Ok(Some(UriResource::Definition(id)));
            }
            _ => continue,
        }
    }
    Ok(None)
}

fn percent_decode(seg: &str) -> String {
    // Project and repository names commonly carry %20; full percent-decoding
    // beyond spaces is not needed for scope keys.
    seg.replace("%20", " ")
}
