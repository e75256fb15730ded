// common/src/models/otp.rs
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Single current passcode challenge for one phone number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpChallenge {
    pub phone: String,
    /// Kept as a string so leading zeros survive
    pub code: String,
    pub issued_at: DateTime<Utc>,
}

impl OtpChallenge {
    pub fn new(phone: impl Into<String>, code: impl Into<String>, issued_at: DateTime<Utc>) -> Self {
        Self {
            phone: phone.into(),
            code: code.into(),
            issued_at,
        }
    }

    pub fn is_expired(&self, ttl: Option<Duration>, now: DateTime<Utc>) -> bool {
        match ttl {
            Some(ttl) => now.signed_duration_since(self.issued_at) > ttl,
            None => false,
        }
    }
}
