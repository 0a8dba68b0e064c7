//! REST implementation of [`LiveClient`].
//!
//! Wraps the service's JSON API with bearer authentication. Payloads are
//! walked as `serde_json::Value` and flattened into the normalized types;
//! optional fields degrade to empty strings rather than failing the fetch.

use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use serde_json::{json, Value};
use tracing::debug;
use url::Url;
use uuid::Uuid;

use adosync_types::{Millis, PolicyStatus, QueryKind};

use crate::error::{ClientError, ClientResult};
use crate::live::LiveClient;
use crate::types::*;

const API_VERSION: &str = "7.1";
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// One bearer-authenticated connection to one organization.
pub struct RestLiveClient {
    http: reqwest::Client,
    base: String,
    token: String,
}

impl RestLiveClient {
    pub fn new(organization_url: &str, token: String) -> ClientResult<Self> {
        let base = Url::parse(organization_url)
            .map_err(|e| ClientError::Malformed(format!("organization url: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base: base.as_str().trim_end_matches('/').to_string(),
            token,
        })
    }

    fn api_url(&self, project: Option<&str>, path: &str) -> String {
        match project {
            Some(p) => format!(
                "{}/{}/_apis/{}",
                self.base,
                encode_segment(p),
                path
            ),
            None => format!("{}/_apis/{}", self.base, path),
        }
    }

    async fn get_json(&self, url: &str) -> ClientResult<Value> {
        debug!("[CLIENT] GET {url}");
        let resp = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        Ok(resp.json().await?)
    }

    async fn post_json(&self, url: &str, body: &Value) -> ClientResult<Value> {
        debug!("[CLIENT] POST {url}");
        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl LiveClient for RestLiveClient {
    async fn connection_user(&self) -> ClientResult<RemoteIdentityRef> {
        let url = format!("{}/_apis/connectionData?api-version={API_VERSION}", self.base);
        let data = self.get_json(&url).await?;
        let user = data
            .get("authenticatedUser")
            .ok_or_else(|| ClientError::Malformed("connectionData without authenticatedUser".into()))?;
        Ok(RemoteIdentityRef {
            id: text(user, "id"),
            display_name: text(user, "providerDisplayName"),
            unique_name: user
                .pointer("/properties/Account/$value")
                .and_then(Value::as_str)
                .map(String::from),
        })
    }

    async fn get_query(&self, project: &str, query_id: Uuid) -> ClientResult<RemoteQuery> {
        let url = format!(
            "{}?api-version={API_VERSION}",
            self.api_url(Some(project), &format!("wit/queries/{query_id}"))
        );
        let data = self.get_json(&url).await?;
        let kind = match data.get("queryType").and_then(Value::as_str) {
            Some("flat") => Some(QueryKind::Flat),
            Some("tree") => Some(QueryKind::Tree),
            Some("oneHop") => Some(QueryKind::OneHop),
            _ => None,
        };
        Ok(RemoteQuery {
            id: query_id,
            name: text(&data, "name"),
            kind,
        })
    }

    async fn run_query(&self, project: &str, query_id: Uuid) -> ClientResult<RemoteQueryResult> {
        let url = format!(
            "{}?api-version={API_VERSION}",
            self.api_url(Some(project), &format!("wit/wiql/{query_id}"))
        );
        let data = self.get_json(&url).await?;

        let kind = match data.get("queryType").and_then(Value::as_str) {
            Some("tree") => QueryKind::Tree,
            Some("oneHop") => QueryKind::OneHop,
            _ => QueryKind::Flat,
        };
        let ids = result_ids(&data);
        Ok(RemoteQueryResult { kind, ids })
    }

    async fn run_wiql(&self, project: &str, wiql: &str) -> ClientResult<Vec<i64>> {
        let url = format!(
            "{}?api-version={API_VERSION}",
            self.api_url(Some(project), "wit/wiql")
        );
        let data = self.post_json(&url, &json!({ "query": wiql })).await?;
        Ok(result_ids(&data))
    }

    async fn get_work_items(&self, project: &str, ids: &[i64]) -> ClientResult<Vec<RemoteWorkItem>> {
        let url = format!(
            "{}?api-version={API_VERSION}",
            self.api_url(Some(project), "wit/workitemsbatch")
        );
        // `errorPolicy: omit` drops unfetchable ids instead of failing the
        // whole batch.
        let body = json!({
            "ids": ids,
            "$expand": "links",
            "errorPolicy": "omit",
        });
        let data = self.post_json(&url, &body).await?;
        let items = data
            .get("value")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(work_item_from_value).collect())
            .unwrap_or_default();
        Ok(items)
    }

    async fn get_work_item_type(
        &self,
        project: &str,
        name: &str,
    ) -> ClientResult<RemoteWorkItemType> {
        let url = format!(
            "{}?api-version={API_VERSION}",
            self.api_url(Some(project), &format!("wit/workitemtypes/{}", encode_segment(name)))
        );
        let data = self.get_json(&url).await?;
        Ok(RemoteWorkItemType {
            name: text(&data, "name"),
            icon_url: data
                .pointer("/icon/url")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            color: text(&data, "color"),
            description: text(&data, "description"),
        })
    }

    async fn get_project(&self, project: &str) -> ClientResult<RemoteProject> {
        let url = format!(
            "{}/_apis/projects/{}?api-version={API_VERSION}",
            self.base,
            encode_segment(project)
        );
        let data = self.get_json(&url).await?;
        Ok(RemoteProject {
            id: text(&data, "id"),
            name: text(&data, "name"),
            description: text(&data, "description"),
        })
    }

    async fn get_repository(&self, project: &str, name: &str) -> ClientResult<RemoteRepository> {
        let url = format!(
            "{}?api-version={API_VERSION}",
            self.api_url(Some(project), &format!("git/repositories/{}", encode_segment(name)))
        );
        let data = self.get_json(&url).await?;
        let visibility = data
            .pointer("/project/visibility")
            .and_then(Value::as_str)
            .unwrap_or("private");
        Ok(RemoteRepository {
            id: text(&data, "id"),
            name: text(&data, "name"),
            project_id: data
                .pointer("/project/id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            clone_url: text(&data, "remoteUrl"),
            is_private: visibility != "public",
        })
    }

    async fn get_pull_requests(
        &self,
        project: &str,
        repository_id: &str,
        filter: &PullRequestFilter,
    ) -> ClientResult<Vec<RemotePullRequest>> {
        let mut url = format!(
            "{}?searchCriteria.status=active&api-version={API_VERSION}",
            self.api_url(
                Some(project),
                &format!("git/repositories/{}/pullrequests", encode_segment(repository_id))
            )
        );
        if let Some(creator) = &filter.creator_id {
            url.push_str(&format!("&searchCriteria.creatorId={creator}"));
        }
        if let Some(reviewer) = &filter.reviewer_id {
            url.push_str(&format!("&searchCriteria.reviewerId={reviewer}"));
        }

        let data = self.get_json(&url).await?;
        let prs = data
            .get("value")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(pull_request_from_value).collect())
            .unwrap_or_default();
        Ok(prs)
    }

    async fn get_policy_evaluations(
        &self,
        project_id: &str,
        pull_request_id: i64,
    ) -> ClientResult<Vec<RemotePolicyEvaluation>> {
        let artifact = format!("vstfs:///CodeReview/CodeReviewId/{project_id}/{pull_request_id}");
        let url = format!(
            "{}?artifactId={}&api-version={API_VERSION}-preview.1",
            self.api_url(Some(project_id), "policy/evaluations"),
            artifact
        );
        let data = self.get_json(&url).await?;
        let evaluations = data
            .get("value")
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| {
                        let status = policy_status_from_str(v.get("status")?.as_str()?)?;
                        let policy_name = v
                            .pointer("/configuration/type/displayName")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string();
                        Some(RemotePolicyEvaluation {
                            status,
                            policy_name,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(evaluations)
    }

    async fn get_definition(
        &self,
        project: &str,
        definition_id: i64,
    ) -> ClientResult<RemoteDefinition> {
        let url = format!(
            "{}?api-version={API_VERSION}",
            self.api_url(Some(project), &format!("build/definitions/{definition_id}"))
        );
        let data = self.get_json(&url).await?;
        Ok(RemoteDefinition {
            id: data.get("id").and_then(Value::as_i64).unwrap_or(definition_id),
            name: text(&data, "name"),
            creation_date: date_millis(&data, "createdDate"),
            html_url: link_href(&data, "web"),
        })
    }

    async fn get_builds(
        &self,
        project: &str,
        definition_id: i64,
    ) -> ClientResult<Vec<RemoteBuild>> {
        let url = format!(
            "{}?definitions={definition_id}&queryOrder=queueTimeDescending&api-version={API_VERSION}",
            self.api_url(Some(project), "build/builds")
        );
        let data = self.get_json(&url).await?;
        let builds = data
            .get("value")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(build_from_value).collect())
            .unwrap_or_default();
        Ok(builds)
    }

    async fn get_avatar(&self, identity_id: &str) -> ClientResult<Option<Vec<u8>>> {
        let url = format!("{}/_api/_common/identityImage?id={identity_id}", self.base);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let resp = check_status(resp).await?;
        let bytes = resp.bytes().await?;
        Ok(Some(bytes.to_vec()))
    }
}

/// Map a non-success response to `ClientError::Remote` with its status.
async fn check_status(resp: reqwest::Response) -> ClientResult<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let detail = resp.text().await.unwrap_or_default();
    let detail: String = detail.chars().take(512).collect();
    Err(ClientError::remote(Some(status.as_u16()), detail))
}

fn encode_segment(segment: &str) -> String {
    segment.replace(' ', "%20")
}

fn text(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn date_millis(value: &Value, key: &str) -> Millis {
    value
        .get(key)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.timestamp_millis())
        .unwrap_or(0)
}

fn link_href(value: &Value, link: &str) -> String {
    value
        .pointer(&format!("/_links/{link}/href"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn identity_ref(value: &Value) -> Option<RemoteIdentityRef> {
    let id = value.get("id")?.as_str()?.to_string();
    Some(RemoteIdentityRef {
        id,
        display_name: text(value, "displayName"),
        unique_name: value
            .get("uniqueName")
            .and_then(Value::as_str)
            .map(String::from),
    })
}

/// Flat results carry `workItems`; tree and one-hop carry
/// `workItemRelations` whose targets are flattened in order, deduplicated.
fn result_ids(data: &Value) -> Vec<i64> {
    if let Some(items) = data.get("workItems").and_then(Value::as_array) {
        if !items.is_empty() || data.get("workItemRelations").is_none() {
            return items
                .iter()
                .filter_map(|wi| wi.get("id").and_then(Value::as_i64))
                .collect();
        }
    }
    let mut seen = std::collections::HashSet::new();
    data.get("workItemRelations")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|rel| rel.pointer("/target/id").and_then(Value::as_i64))
                .filter(|id| seen.insert(*id))
                .collect()
        })
        .unwrap_or_default()
}

fn work_item_from_value(value: &Value) -> Option<RemoteWorkItem> {
    let id = value.get("id")?.as_i64()?;
    let fields = value.get("fields")?;
    Some(RemoteWorkItem {
        id,
        title: text(fields, "System.Title"),
        html_url: link_href(value, "html"),
        state: text(fields, "System.State"),
        reason: text(fields, "System.Reason"),
        work_item_type: text(fields, "System.WorkItemType"),
        assigned_to: fields.get("System.AssignedTo").and_then(identity_ref),
        created_date: date_millis(fields, "System.CreatedDate"),
        created_by: fields.get("System.CreatedBy").and_then(identity_ref),
        changed_date: date_millis(fields, "System.ChangedDate"),
        changed_by: fields.get("System.ChangedBy").and_then(identity_ref),
    })
}

fn pull_request_from_value(value: &Value) -> Option<RemotePullRequest> {
    let id = value.get("pullRequestId")?.as_i64()?;
    let web_url = value
        .pointer("/repository/webUrl")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let html_url = if web_url.is_empty() {
        String::new()
    } else {
        format!("{web_url}/pullrequest/{id}")
    };
    Some(RemotePullRequest {
        id,
        title: text(value, "title"),
        url: text(value, "url"),
        html_url,
        status: text(value, "status"),
        target_branch: text(value, "targetRefName"),
        created_by: value.get("createdBy").and_then(identity_ref),
        creation_date: date_millis(value, "creationDate"),
    })
}

fn build_from_value(value: &Value) -> Option<RemoteBuild> {
    let id = value.get("id")?.as_i64()?;
    let trigger_message = value
        .pointer("/triggerInfo/ci.message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Some(RemoteBuild {
        id,
        build_number: text(value, "buildNumber"),
        status: text(value, "status"),
        result: text(value, "result"),
        queue_time: date_millis(value, "queueTime"),
        start_time: date_millis(value, "startTime"),
        finish_time: date_millis(value, "finishTime"),
        url: text(value, "url"),
        source_branch: text(value, "sourceBranch"),
        trigger_message,
        requested_for: value.get("requestedFor").and_then(identity_ref),
    })
}

fn policy_status_from_str(s: &str) -> Option<PolicyStatus> {
    match s {
        "approved" => Some(PolicyStatus::Approved),
        "running" => Some(PolicyStatus::Running),
        "queued" => Some(PolicyStatus::Queued),
        "rejected" => Some(PolicyStatus::Rejected),
        "broken" => Some(PolicyStatus::Broken),
        "notApplicable" => Some(PolicyStatus::NotApplicable),
        _ => None,
    }
}
