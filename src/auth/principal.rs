//! Authenticated caller identity.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// The identity a request runs as. Built per request by the
/// [`Authenticator`](super::Authenticator) and never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: u64,
    pub username: String,
    pub roles: Vec<String>,
    pub permissions: BTreeSet<String>,
}

impl Principal {
    pub fn new(
        user_id: u64,
        username: impl Into<String>,
        roles: Vec<String>,
        permissions: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            user_id,
            username: username.into(),
            roles,
            permissions: permissions.into_iter().collect(),
        }
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }
}
