//! Authorization for channel visibility changes.
//!
//! A user may change a channel's visibility when they hold the channel
//! manager role on that channel or are a workspace admin. Anyone else is
//! refused before any mutation happens.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Why an invocation was allowed or refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationReason {
    ChannelManager,
    WorkspaceAdmin,
    NotPermitted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationResult {
    pub allowed: bool,
    pub reason: AuthorizationReason,
}

impl AuthorizationResult {
    fn allow(reason: AuthorizationReason) -> Self {
        Self {
            allowed: true,
            reason,
        }
    }

    fn deny() -> Self {
        Self {
            allowed: false,
            reason: AuthorizationReason::NotPermitted,
        }
    }
}

/// Permission checker for one channel
pub struct PermissionChecker {
    managers: HashSet<String>,
}

impl PermissionChecker {
    /// Create a checker from the channel's manager user IDs
    pub fn new<I, S>(managers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            managers: managers.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_manager(&self, user_id: &str) -> bool {
        self.managers.contains(user_id)
    }

    /// Check whether `user_id` may change the channel's visibility
    pub fn check(&self, user_id: &str, is_admin: bool) -> AuthorizationResult {
        if self.is_manager(user_id) {
            AuthorizationResult::allow(AuthorizationReason::ChannelManager)
        } else if is_admin {
            AuthorizationResult::allow(AuthorizationReason::WorkspaceAdmin)
        } else {
            AuthorizationResult::deny()
        }
    }
}
