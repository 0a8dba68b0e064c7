//! Shared fixtures: a programmable mock of the remote service, plus
//! context builders over in-memory stores.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use adosync_client::{
    AccountProvider, ClientError, ClientResult, ConnectionProvider, LiveClient,
    PullRequestFilter, RemoteBuild, RemoteDefinition, RemoteIdentityRef,
    RemotePolicyEvaluation, RemoteProject, RemotePullRequest, RemoteQuery, RemoteQueryResult,
    RemoteRepository, RemoteWorkItem, RemoteWorkItemType, StaticAccountProvider,
};
use adosync_searches::{OfflineValidator, PersistentStore, SearchRepositories};
use adosync_storage::CacheStore;
use adosync_sync::UpdaterContext;
use adosync_types::{
    DevAccount, MyWorkItemsSearch, PipelineSearch, PolicyStatus, PullRequestView,
    PullRequestsSearch, QueryKind, QuerySearch, SyncConfig,
};

pub const ORG_URL: &str = "https://dev.azure.com/contoso";
pub const PROJECT: &str = "Fabrikam";
pub const PROJECT_GUID: &str = "aaaaaaaa-bbbb-cccc-dddd-000000000001";
pub const REPO: &str = "widgets";
pub const REPO_GUID: &str = "aaaaaaaa-bbbb-cccc-dddd-000000000002";
pub const USER: &str = "ada@contoso.com";
pub const USER_GUID: &str = "aaaaaaaa-bbbb-cccc-dddd-000000000003";
pub const QUERY_GUID: &str = "11111111-2222-3333-4444-555555555555";

pub fn identity(id: &str, name: &str) -> RemoteIdentityRef {
    RemoteIdentityRef {
        id: id.to_string(),
        display_name: name.to_string(),
        unique_name: Some(format!("{}@contoso.com", name.to_lowercase())),
    }
}

pub fn work_item(id: i64, type_name: &str, changed_date: i64) -> RemoteWorkItem {
    RemoteWorkItem {
        id,
        title: format!("Work item {id}"),
        html_url: format!("{ORG_URL}/{PROJECT}/_workitems/edit/{id}"),
        state: "Active".into(),
        reason: "New".into(),
        work_item_type: type_name.into(),
        assigned_to: Some(identity(USER_GUID, "Ada")),
        created_date: 1_000,
        created_by: Some(identity(USER_GUID, "Ada")),
        changed_date,
        changed_by: None,
    }
}

pub fn pull_request(id: i64, creation_date: i64) -> RemotePullRequest {
    RemotePullRequest {
        id,
        title: format!("PR {id}"),
        url: format!("{ORG_URL}/_apis/pr/{id}"),
        html_url: format!("{ORG_URL}/{PROJECT}/_git/{REPO}/pullrequest/{id}"),
        status: "active".into(),
        target_branch: "refs/heads/main".into(),
        created_by: Some(identity(USER_GUID, "Ada")),
        creation_date,
    }
}

pub fn build(id: i64, queue_time: i64) -> RemoteBuild {
    RemoteBuild {
        id,
        build_number: format!("2024.{id}"),
        status: "completed".into(),
        result: "succeeded".into(),
        queue_time,
        start_time: queue_time + 10,
        finish_time: queue_time + 500,
        url: format!("{ORG_URL}/_apis/build/{id}"),
        source_branch: "refs/heads/main".into(),
        trigger_message: "Merge PR".into(),
        requested_for: Some(identity(USER_GUID, "Ada")),
    }
}

/// A programmable in-memory stand-in for the remote service.
///
/// All response tables are plain mutexed maps; call counters let tests
/// assert how many round trips a sync performed.
pub struct MockLiveClient {
    pub queries: Mutex<HashMap<Uuid, RemoteQuery>>,
    pub query_ids: Mutex<HashMap<Uuid, Vec<i64>>>,
    pub wiql_ids: Mutex<Vec<i64>>,
    pub work_items: Mutex<HashMap<i64, RemoteWorkItem>>,
    pub types: Mutex<HashMap<String, RemoteWorkItemType>>,
    pub pull_requests: Mutex<Vec<RemotePullRequest>>,
    pub policies: Mutex<HashMap<i64, Vec<RemotePolicyEvaluation>>>,
    pub definitions: Mutex<HashMap<i64, RemoteDefinition>>,
    pub builds: Mutex<HashMap<i64, Vec<RemoteBuild>>>,

    /// Sizes of each work-item batch request, in arrival order.
    pub batch_sizes: Mutex<Vec<usize>>,
    /// Method-name log.
    pub calls: Mutex<Vec<String>>,
    /// Last pull-request filter received.
    pub last_pr_filter: Mutex<Option<PullRequestFilter>>,
    /// Artificial latency per call; lets tests hold a sync in flight.
    pub delay: Mutex<Option<Duration>>,
    /// When set, every call fails with this HTTP status.
    pub fail_status: Mutex<Option<u16>>,
    /// Number of wiql evaluations, per-scope syncs etc.
    pub wiql_calls: AtomicUsize,
}

impl MockLiveClient {
    pub fn new() -> Self {
        let client = Self {
            queries: Mutex::new(HashMap::new()),
            query_ids: Mutex::new(HashMap::new()),
            wiql_ids: Mutex::new(Vec::new()),
            work_items: Mutex::new(HashMap::new()),
            types: Mutex::new(HashMap::new()),
            pull_requests: Mutex::new(Vec::new()),
            policies: Mutex::new(HashMap::new()),
            definitions: Mutex::new(HashMap::new()),
            builds: Mutex::new(HashMap::new()),
            batch_sizes: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            last_pr_filter: Mutex::new(None),
            delay: Mutex::new(None),
            fail_status: Mutex::new(None),
            wiql_calls: AtomicUsize::new(0),
        };
        client.add_type("Bug");
        client.add_type("Task");
        client
    }

    pub fn add_type(&self, name: &str) {
        self.types.lock().unwrap().insert(
            name.to_string(),
            RemoteWorkItemType {
                name: name.to_string(),
                icon_url: format!("https://icons/{name}.svg"),
                color: "cc293d".into(),
                description: String::new(),
            },
        );
    }

    /// Seed a flat saved query and its work items.
    pub fn seed_query(&self, query_id: Uuid, name: &str, items: Vec<RemoteWorkItem>) {
        self.queries.lock().unwrap().insert(
            query_id,
            RemoteQuery {
                id: query_id,
                name: name.to_string(),
                kind: Some(QueryKind::Flat),
            },
        );
        let ids = items.iter().map(|w| w.id).collect();
        self.query_ids.lock().unwrap().insert(query_id, ids);
        let mut map = self.work_items.lock().unwrap();
        for item in items {
            map.insert(item.id, item);
        }
    }

    pub fn seed_definition(&self, definition_id: i64, name: &str, builds: Vec<RemoteBuild>) {
        self.definitions.lock().unwrap().insert(
            definition_id,
            RemoteDefinition {
                id: definition_id,
                name: name.to_string(),
                creation_date: 500,
                html_url: format!("{ORG_URL}/{PROJECT}/_build?definitionId={definition_id}"),
            },
        );
        self.builds.lock().unwrap().insert(definition_id, builds);
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|m| *m == method)
            .count()
    }

    async fn enter(&self, method: &str) -> ClientResult<()> {
        self.calls.lock().unwrap().push(method.to_string());
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(status) = *self.fail_status.lock().unwrap() {
            return Err(ClientError::Remote {
                status: Some(status),
                detail: format!("mock failure on {method}"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl LiveClient for MockLiveClient {
    async fn connection_user(&self) -> ClientResult<RemoteIdentityRef> {
        self.enter("connection_user").await?;
        Ok(identity(USER_GUID, "Ada"))
    }

    async fn get_query(&self, _project: &str, query_id: Uuid) -> ClientResult<RemoteQuery> {
        self.enter("get_query").await?;
        self.queries
            .lock()
            .unwrap()
            .get(&query_id)
            .cloned()
            .ok_or_else(|| ClientError::Remote {
                status: Some(404),
                detail: format!("query {query_id} not found"),
            })
    }

    async fn run_query(&self, _project: &str, query_id: Uuid) -> ClientResult<RemoteQueryResult> {
        self.enter("run_query").await?;
        let ids = self
            .query_ids
            .lock()
            .unwrap()
            .get(&query_id)
            .cloned()
            .unwrap_or_default();
        Ok(RemoteQueryResult {
            kind: QueryKind::Flat,
            ids,
        })
    }

    async fn run_wiql(&self, _project: &str, _wiql: &str) -> ClientResult<Vec<i64>> {
        self.enter("run_wiql").await?;
        self.wiql_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.wiql_ids.lock().unwrap().clone())
    }

    async fn get_work_items(
        &self,
        _project: &str,
        ids: &[i64],
    ) -> ClientResult<Vec<RemoteWorkItem>> {
        self.enter("get_work_items").await?;
        self.batch_sizes.lock().unwrap().push(ids.len());
        let map = self.work_items.lock().unwrap();
        Ok(ids.iter().filter_map(|id| map.get(id).cloned()).collect())
    }

    async fn get_work_item_type(
        &self,
        _project: &str,
        name: &str,
    ) -> ClientResult<RemoteWorkItemType> {
        self.enter("get_work_item_type").await?;
        self.types
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| ClientError::Remote {
                status: Some(404),
                detail: format!("type {name} not found"),
            })
    }

    async fn get_project(&self, project: &str) -> ClientResult<RemoteProject> {
        self.enter("get_project").await?;
        Ok(RemoteProject {
            id: PROJECT_GUID.into(),
            name: project.to_string(),
            description: "test project".into(),
        })
    }

    async fn get_repository(&self, _project: &str, name: &str) -> ClientResult<RemoteRepository> {
        self.enter("get_repository").await?;
        Ok(RemoteRepository {
            id: REPO_GUID.into(),
            name: name.to_string(),
            project_id: PROJECT_GUID.into(),
            clone_url: format!("{ORG_URL}/{PROJECT}/_git/{name}"),
            is_private: true,
        })
    }

    async fn get_pull_requests(
        &self,
        _project: &str,
        _repository_id: &str,
        filter: &PullRequestFilter,
    ) -> ClientResult<Vec<RemotePullRequest>> {
        self.enter("get_pull_requests").await?;
        *self.last_pr_filter.lock().unwrap() = Some(filter.clone());
        Ok(self.pull_requests.lock().unwrap().clone())
    }

    async fn get_policy_evaluations(
        &self,
        _project_id: &str,
        pull_request_id: i64,
    ) -> ClientResult<Vec<RemotePolicyEvaluation>> {
        self.enter("get_policy_evaluations").await?;
        Ok(self
            .policies
            .lock()
            .unwrap()
            .get(&pull_request_id)
            .cloned()
            .unwrap_or_else(|| {
                vec![RemotePolicyEvaluation {
                    status: PolicyStatus::Approved,
                    policy_name: "Build".into(),
                }]
            }))
    }

    async fn get_definition(
        &self,
        _project: &str,
        definition_id: i64,
    ) -> ClientResult<RemoteDefinition> {
        self.enter("get_definition").await?;
        self.definitions
            .lock()
            .unwrap()
            .get(&definition_id)
            .cloned()
            .ok_or_else(|| ClientError::Remote {
                status: Some(404),
                detail: format!("definition {definition_id} not found"),
            })
    }

    async fn get_builds(
        &self,
        _project: &str,
        definition_id: i64,
    ) -> ClientResult<Vec<RemoteBuild>> {
        self.enter("get_builds").await?;
        Ok(self
            .builds
            .lock()
            .unwrap()
            .get(&definition_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_avatar(&self, _identity_id: &str) -> ClientResult<Option<Vec<u8>>> {
        self.enter("get_avatar").await?;
        Ok(Some(vec![0xff, 0xd8]))
    }
}

/// Connection provider that always yields the one mock client.
pub struct MockConnections {
    pub client: Arc<MockLiveClient>,
}

#[async_trait]
impl ConnectionProvider for MockConnections {
    async fn get_connection(
        &self,
        _organization_url: &str,
        _account: &DevAccount,
    ) -> ClientResult<Arc<dyn LiveClient>> {
        Ok(self.client.clone() as Arc<dyn LiveClient>)
    }
}

/// Config with production batch size but short intervals, so tests never
/// sit in real cooldowns unless they mean to.
pub fn test_config() -> SyncConfig {
    SyncConfig {
        periodic_interval: Duration::from_secs(3600),
        refresh_cooldown: Duration::from_millis(0),
        ..SyncConfig::default()
    }
}

pub fn signed_in_accounts() -> Arc<StaticAccountProvider> {
    Arc::new(StaticAccountProvider::new(DevAccount::new(USER), "token"))
}

pub fn test_context_with(
    client: Arc<MockLiveClient>,
    accounts: Arc<StaticAccountProvider>,
    config: SyncConfig,
) -> UpdaterContext {
    UpdaterContext {
        store: CacheStore::open_in_memory().unwrap(),
        repos: SearchRepositories::new(
            PersistentStore::open_in_memory().unwrap(),
            Arc::new(OfflineValidator),
        ),
        accounts,
        connections: Arc::new(MockConnections { client }),
        config,
    }
}

pub fn test_context(client: Arc<MockLiveClient>) -> UpdaterContext {
    test_context_with(client, signed_in_accounts(), test_config())
}

// ── Search fixtures ──────────────────────────────────────────────

pub fn query_search() -> QuerySearch {
    QuerySearch {
        uri: format!("{ORG_URL}/{PROJECT}/_queries/query/{QUERY_GUID}/")
            .parse()
            .unwrap(),
        query_id: QUERY_GUID.parse().unwrap(),
        username: USER.into(),
    }
}

pub fn pr_search(view: PullRequestView) -> PullRequestsSearch {
    PullRequestsSearch {
        uri: format!("{ORG_URL}/{PROJECT}/_git/{REPO}").parse().unwrap(),
        repository: REPO.into(),
        view,
        username: USER.into(),
    }
}

pub fn pipeline_search(definition_id: i64) -> PipelineSearch {
    PipelineSearch {
        uri: format!("{ORG_URL}/{PROJECT}/_build?definitionId={definition_id}")
            .parse()
            .unwrap(),
        definition_id,
    }
}

pub fn mwi_search() -> MyWorkItemsSearch {
    MyWorkItemsSearch {
        uri: format!("{ORG_URL}/{PROJECT}").parse().unwrap(),
        username: USER.into(),
    }
}

pub fn seeded_query_client(item_count: i64) -> Arc<MockLiveClient> {
    let client = Arc::new(MockLiveClient::new());
    let items = (1..=item_count)
        .map(|id| work_item(id, "Bug", 1_000 + id))
        .collect();
    client.seed_query(QUERY_GUID.parse().unwrap(), "Active bugs", items);
    client
}
