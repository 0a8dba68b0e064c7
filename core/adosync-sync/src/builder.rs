//! Composition root: wires stores, repositories, service, manager, and
//! provider together for hosts that want the whole core in one call.

use std::path::Path;
use std::sync::Arc;

use adosync_client::{AccountProvider, ConnectionProvider, RestConnectionPool};
use adosync_searches::{PersistentStore, SearchRepositories, Validator};
use adosync_storage::CacheStore;
use adosync_types::SyncConfig;

use crate::error::SyncResult;
use crate::manager::{CacheManager, CacheManagerHandle};
use crate::provider::LiveDataProvider;
use crate::service::DataUpdateService;
use crate::updater::UpdaterContext;

const CACHE_DB_FILE: &str = "AzureData.db";
const PERSISTENT_DB_FILE: &str = "PersistentAzureData.db";

/// The assembled core. Dropping it does not stop the manager; call
/// [`CacheManagerHandle::stop`] for an orderly shutdown.
pub struct SyncCore {
    pub repos: SearchRepositories,
    pub service: Arc<DataUpdateService>,
    pub manager: CacheManagerHandle,
    pub provider: LiveDataProvider,
}

impl SyncCore {
    /// Open both databases under `data_dir`, build the update service with a
    /// pooled REST connection provider, and start the cache manager.
    pub fn start(
        data_dir: &Path,
        accounts: Arc<dyn AccountProvider>,
        validator: Arc<dyn Validator>,
        config: SyncConfig,
    ) -> SyncResult<Self> {
        let connections: Arc<dyn ConnectionProvider> =
            Arc::new(RestConnectionPool::new(accounts.clone()));
        Self::start_with_connections(data_dir, accounts, connections, validator, config)
    }

    /// Like [`SyncCore::start`] but with a caller-supplied connection
    /// provider (tests inject mock clients here).
    pub fn start_with_connections(
        data_dir: &Path,
        accounts: Arc<dyn AccountProvider>,
        connections: Arc<dyn ConnectionProvider>,
        validator: Arc<dyn Validator>,
        config: SyncConfig,
    ) -> SyncResult<Self> {
        let store = CacheStore::open(&data_dir.join(CACHE_DB_FILE))?;
        let persistent = PersistentStore::open(&data_dir.join(PERSISTENT_DB_FILE))?;
        let repos = SearchRepositories::new(persistent, validator);

        let ctx = UpdaterContext {
            store,
            repos: repos.clone(),
            accounts: accounts.clone(),
            connections,
            config: config.clone(),
        };
        let service = Arc::new(DataUpdateService::new(ctx));
        let manager = CacheManager::new(service.clone(), config)
            .with_auth_events(accounts.subscribe())
            .start();
        let provider = LiveDataProvider::new(service.clone(), manager.clone());

        Ok(Self {
            repos,
            service,
            manager,
            provider,
        })
    }
}
