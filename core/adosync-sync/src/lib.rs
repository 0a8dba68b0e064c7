//! The sync engine: updaters, update service, cache manager, and the
//! read-side facade.
//!
//! Control flows `LiveDataProvider -> CacheManager -> DataUpdateService ->
//! Updater -> (LiveClient + CacheStore)`; terminal events flow back up the
//! same path and fan out on the [`UpdateBus`]. There is exactly one
//! in-flight update at a time, enforced by the manager's state machine.

mod builder;
mod error;
mod events;
mod machine;
mod manager;
mod provider;
mod service;
mod updater;

pub use builder::SyncCore;
pub use error::{SyncError, SyncResult};
pub use events::{CacheUpdate, UpdateBus, UpdateOutcome, UpdateSource};
pub use machine::ManagerState;
pub use manager::{CacheManager, CacheManagerHandle};
pub use provider::LiveDataProvider;
pub use service::{DataUpdateService, TerminalOutcome};
pub use updater::{
    CachedSearch, MyWorkItemsUpdater, PipelineUpdater, PullRequestUpdater, QueryUpdater,
    SearchItems, Updater, UpdaterContext, MY_WORK_ITEMS_WIQL,
};
