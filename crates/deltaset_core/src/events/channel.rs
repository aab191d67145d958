//! Lifecycle event channel declarations.

use std::fmt::{Display, Formatter};

/// Named channel listeners can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventChannel {
    /// Fired after a delta is merged into its baseline.
    Commit,
    /// Fired after a delta is discarded.
    Rollback,
    /// Reserved. Accepts listeners but has no producer.
    Timeout,
}

/// Channel name for commit notifications.
pub const EVENT_COMMIT: &str = "commit";
/// Channel name for rollback notifications.
pub const EVENT_ROLLBACK: &str = "rollback";
/// Channel name reserved for pending-delta expiry.
pub const EVENT_TIMEOUT: &str = "timeout";

impl EventChannel {
    pub const ALL: [EventChannel; 3] = [Self::Commit, Self::Rollback, Self::Timeout];

    /// Stable channel name used by string-addressed subscriptions.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Commit => EVENT_COMMIT,
            Self::Rollback => EVENT_ROLLBACK,
            Self::Timeout => EVENT_TIMEOUT,
        }
    }

    /// Resolves a channel by exact name; unknown names yield `None`.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            EVENT_COMMIT => Some(Self::Commit),
            EVENT_ROLLBACK => Some(Self::Rollback),
            EVENT_TIMEOUT => Some(Self::Timeout),
            _ => None,
        }
    }
}

impl Display for EventChannel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
