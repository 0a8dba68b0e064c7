//! Remote service client for the adosync core.
//!
//! Provides the narrow interface the updaters pull from:
//! - `LiveClient`: queries, work items, types, pull requests, policy
//!   evaluations, build definitions, builds, projects, avatars
//! - `AccountProvider`: sign-in state plus a bearer token per organization
//! - `ConnectionProvider`: pooled per-`(organization, account)` clients
//!
//! The REST implementation wraps the service's JSON API; everything above it
//! sees only the trait.

mod accounts;
mod connection;
mod error;
mod live;
mod rest;
mod types;

pub use accounts::{AccountProvider, AuthBus, AuthEvent, StaticAccountProvider};
pub use connection::{ConnectionProvider, RestConnectionPool};
pub use error::{ClientError, ClientResult};
pub use live::LiveClient;
pub use rest::RestLiveClient;
pub use types::{
    PullRequestFilter, RemoteBuild, RemoteDefinition, RemoteIdentityRef,
    RemotePolicyEvaluation, RemoteProject, RemotePullRequest, RemoteQuery, RemoteQueryResult,
    RemoteRepository, RemoteWorkItem, RemoteWorkItemType,
};
