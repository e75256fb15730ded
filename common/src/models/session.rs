// common/src/models/session.rs
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::messages::ProviderUser;

/// Authenticated user record and its validity metadata
///
/// A session is persisted exactly while the user is considered logged in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Stable numeric identifier from the identity provider
    pub user_id: u64,
    pub display_name: String,
    pub email: String,
    /// Timestamp of the last successful validation
    pub established_at: DateTime<Utc>,
}

impl Session {
    /// Build a session from the first user of a successful handshake
    ///
    /// Returns `None` unless the provider supplied both a name and an email.
    /// When the provider omits the id, a millisecond timestamp is used instead.
    /// That fallback is not collision-free across rapid logins.
    pub fn from_provider(user: &ProviderUser, now: DateTime<Utc>) -> Option<Self> {
        let display_name = user.name.as_deref().filter(|n| !n.trim().is_empty())?;
        let email = user.email.as_deref().filter(|e| !e.trim().is_empty())?;

        let user_id = match user.numeric_id() {
            Some(id) => id,
            None => {
                let synthesized = now.timestamp_millis().max(0) as u64;
                tracing::warn!(
                    "Identity provider omitted user id, synthesized {} from timestamp",
                    synthesized
                );
                synthesized
            }
        };

        Some(Self {
            user_id,
            display_name: display_name.to_string(),
            email: email.to_string(),
            established_at: now,
        })
    }

    /// Whether more than `window` has elapsed since the last validation
    pub fn is_stale(&self, window: Duration, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.established_at) > window
    }

    /// Mark the session as freshly validated
    pub fn refresh(&mut self, now: DateTime<Utc>) {
        self.established_at = now;
    }
}
