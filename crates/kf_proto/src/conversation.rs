//! Canonicalized two-party conversation identity.

use serde::{Deserialize, Serialize};

/// Unordered actor pair, canonicalized by sorting, so either side's lookup
/// converges on the same conversation record regardless of who created it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationKey {
    first: String,
    second: String,
}

impl ConversationKey {
    pub fn new(a: impl Into<String>, b: impl Into<String>) -> Self {
        let (a, b) = (a.into(), b.into());
        if a <= b {
            Self { first: a, second: b }
        } else {
            Self { first: b, second: a }
        }
    }

    /// Canonically ordered members.
    pub fn members(&self) -> (&str, &str) {
        (&self.first, &self.second)
    }

    /// The member that is not `actor_id`, if `actor_id` belongs to the pair.
    pub fn peer_of(&self, actor_id: &str) -> Option<&str> {
        if self.first == actor_id {
            Some(&self.second)
        } else if self.second == actor_id {
            Some(&self.first)
        } else {
            None
        }
    }
}
