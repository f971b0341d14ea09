//! Channel visibility types and per-channel serialization.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Whether a channel is listed for the whole workspace or invite-only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn from_is_private(is_private: bool) -> Self {
        if is_private {
            Visibility::Private
        } else {
            Visibility::Public
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Visibility::Public => Visibility::Private,
            Visibility::Private => Visibility::Public,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visibility of one channel as observed right now. Never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelVisibilityState {
    pub channel_id: String,
    pub is_private: bool,
}

impl ChannelVisibilityState {
    pub fn visibility(&self) -> Visibility {
        Visibility::from_is_private(self.is_private)
    }
}

/// What the legacy endpoint reported for a conversion request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionOutcome {
    /// The channel changed visibility
    Converted,
    /// The endpoint refused because the channel already had the target visibility
    AlreadyInState { error: String },
}

/// One async lock per channel so two toggles on the same channel cannot
/// interleave their lookup and conversion.
#[derive(Default)]
pub struct ChannelLocks {
    locks: std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ChannelLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to a channel
    pub async fn acquire(&self, channel_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            // Drop entries nobody is holding or waiting on
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(channel_id.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    /// Number of channels with a live lock entry
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_toggled() {
        assert_eq!(Visibility::Public.toggled(), Visibility::Private);
        assert_eq!(Visibility::Private.toggled(), Visibility::Public);
    }

    #[test]
    fn test_state_visibility() {
        let state = ChannelVisibilityState {
            channel_id: "C1".to_string(),
            is_private: true,
        };
        assert_eq!(state.visibility(), Visibility::Private);
        assert_eq!(state.visibility().to_string(), "private");
    }

    #[tokio::test]
    async fn test_same_channel_is_serialized() {
        let locks = Arc::new(ChannelLocks::new());
        let guard = locks.acquire("C1").await;

        let waiter = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.acquire("C1").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should get the lock")
            .unwrap();
    }

    #[tokio::test]
    async fn test_different_channels_do_not_block() {
        let locks = ChannelLocks::new();
        let _a = locks.acquire("C1").await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.acquire("C2")).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_released_entries_are_pruned() {
        let locks = ChannelLocks::new();
        drop(locks.acquire("C1").await);
        drop(locks.acquire("C2").await);
        assert_eq!(locks.len(), 1);
    }
}
