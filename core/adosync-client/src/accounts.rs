//! Account broker seam and auth event fan-out.

use async_trait::async_trait;
use tokio::sync::broadcast;

use adosync_types::DevAccount;

use crate::error::{ClientError, ClientResult};

/// Sign-in state changes, fanned out to whoever cares. The cache manager
/// subscribes so sign-out can trigger a clear-cache.
#[derive(Debug, Clone)]
pub enum AuthEvent {
    SignedIn(DevAccount),
    SignedOut,
}

/// Typed broadcast bus for [`AuthEvent`]s. Dropping a receiver is the
/// unsubscribe.
#[derive(Clone)]
pub struct AuthBus {
    tx: broadcast::Sender<AuthEvent>,
}

impl AuthBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: AuthEvent) {
        // No receivers is fine; nobody is watching yet.
        let _ = self.tx.send(event);
    }
}

impl Default for AuthBus {
    fn default() -> Self {
        Self::new()
    }
}

/// The host's account broker, reduced to what the sync core needs.
///
/// The actual credential acquisition protocol lives outside the core; this
/// trait yields a bearer connection token per organization.
#[async_trait]
pub trait AccountProvider: Send + Sync {
    fn is_signed_in(&self) -> bool;

    fn default_account(&self) -> Option<DevAccount>;

    /// A bearer token valid for the given organization.
    async fn acquire_token(
        &self,
        organization_url: &str,
        account: &DevAccount,
    ) -> ClientResult<String>;

    /// Watch sign-in/sign-out transitions.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

/// An account provider with a fixed account and token. Used in tests and in
/// hosts that manage credentials themselves.
pub struct StaticAccountProvider {
    account: std::sync::Mutex<Option<DevAccount>>,
    token: String,
    bus: AuthBus,
}

impl StaticAccountProvider {
    pub fn new(account: DevAccount, token: impl Into<String>) -> Self {
        Self {
            account: std::sync::Mutex::new(Some(account)),
            token: token.into(),
            bus: AuthBus::new(),
        }
    }

    /// A provider with nobody signed in.
    pub fn signed_out() -> Self {
        Self {
            account: std::sync::Mutex::new(None),
            token: String::new(),
            bus: AuthBus::new(),
        }
    }

    /// Simulate a sign-out, publishing the event.
    pub fn sign_out(&self) {
        *self.account.lock().unwrap() = None;
        self.bus.publish(AuthEvent::SignedOut);
    }

    /// Simulate a sign-in, publishing the event.
    pub fn sign_in(&self, account: DevAccount) {
        *self.account.lock().unwrap() = Some(account.clone());
        self.bus.publish(AuthEvent::SignedIn(account));
    }
}

#[async_trait]
impl AccountProvider for StaticAccountProvider {
    fn is_signed_in(&self) -> bool {
        self.account.lock().unwrap().is_some()
    }

    fn default_account(&self) -> Option<DevAccount> {
        self.account.lock().unwrap().clone()
    }

    async fn acquire_token(
        &self,
        _organization_url: &str,
        _account: &DevAccount,
    ) -> ClientResult<String> {
        if !self.is_signed_in() {
            return Err(ClientError::AuthRequired);
        }
        Ok(self.token.clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.bus.subscribe()
    }
}
