//! Developer account identity.

use serde::{Deserialize, Serialize};

/// A signed-in developer account, as surfaced by the host's account broker.
///
/// The credential acquisition protocol lives outside this core; all the sync
/// path needs is a stable login id to scope per-user cache rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevAccount {
    /// Login id (typically a UPN like `dev@contoso.com`).
    pub login_id: String,
    /// Display name, if the broker provided one.
    pub display_name: Option<String>,
}

impl DevAccount {
    pub fn new(login_id: impl Into<String>) -> Self {
        Self {
            login_id: login_id.into(),
            display_name: None,
        }
    }
}
