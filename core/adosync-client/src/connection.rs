//! Connection pooling keyed by `(organization url, account)`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use adosync_types::DevAccount;

use crate::accounts::AccountProvider;
use crate::error::ClientResult;
use crate::live::LiveClient;
use crate::rest::RestLiveClient;

/// Yields a pooled connection to an organization for an account.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    async fn get_connection(
        &self,
        organization_url: &str,
        account: &DevAccount,
    ) -> ClientResult<Arc<dyn LiveClient>>;
}

/// Pool of [`RestLiveClient`]s, one per `(organization url, account)`,
/// reused across updaters.
pub struct RestConnectionPool {
    accounts: Arc<dyn AccountProvider>,
    pool: RwLock<HashMap<(String, String), Arc<RestLiveClient>>>,
}

impl RestConnectionPool {
    pub fn new(accounts: Arc<dyn AccountProvider>) -> Self {
        Self {
            accounts,
            pool: RwLock::new(HashMap::new()),
        }
    }

    /// Drop all pooled connections (tokens become stale on sign-out).
    pub async fn clear(&self) {
        self.pool.write().await.clear();
    }
}

#[async_trait]
impl ConnectionProvider for RestConnectionPool {
    async fn get_connection(
        &self,
        organization_url: &str,
        account: &DevAccount,
    ) -> ClientResult<Arc<dyn LiveClient>> {
        let key = (
            organization_url.to_lowercase(),
            account.login_id.to_lowercase(),
        );

        if let Some(client) = self.pool.read().await.get(&key) {
            return Ok(client.clone());
        }

        let token = self
            .accounts
            .acquire_token(organization_url, account)
            .await?;
        let client = Arc::new(RestLiveClient::new(organization_url, token)?);

        debug!("[CLIENT] pooled new connection for {organization_url}");
        self.pool.write().await.insert(key, client.clone());
        Ok(client)
    }
}
