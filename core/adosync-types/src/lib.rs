//! Shared vocabulary for the adosync core.
//!
//! Everything here is plain data: search descriptors, update parameters,
//! remote-URL parsing, policy outcomes, timestamps, and tuning knobs. The
//! storage, client, and sync crates all speak these types; none of them
//! depend on each other directly.

mod account;
mod config;
mod policy;
mod search;
mod time;
mod uri;

pub use account::DevAccount;
pub use config::SyncConfig;
pub use policy::PolicyStatus;
pub use search::{
    MyWorkItemsSearch, PipelineSearch, PullRequestView, PullRequestsSearch, QueryKind,
    QuerySearch, Search, UpdateKind, UpdateParams,
};
pub use time::{from_millis, now_millis, to_millis, Millis};
pub use uri::{HostKind, RemoteUri, UriError, UriResource};
