// common/src/models/reward.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Points for the product review action
pub const PRODUCT_REVIEW_POINTS: u32 = 15;
/// Points for each social follow
pub const SOCIAL_POINTS: u32 = 25;

/// Reward-bearing actions, keyed the same way the remote feed names them
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Facebook,
    Instagram,
    Tiktok,
    Youtube,
    ProductReview,
}

impl Platform {
    pub const ALL: [Platform; 5] = [
        Platform::Facebook,
        Platform::Instagram,
        Platform::Tiktok,
        Platform::Youtube,
        Platform::ProductReview,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Facebook => "facebook",
            Self::Instagram => "instagram",
            Self::Tiktok => "tiktok",
            Self::Youtube => "youtube",
            Self::ProductReview => "product_review",
        }
    }

    /// Fixed reward for the platform's class
    pub fn points(&self) -> u32 {
        match self {
            Self::ProductReview => PRODUCT_REVIEW_POINTS,
            _ => SOCIAL_POINTS,
        }
    }

    /// Social platforms can be verified from a screenshot; reviews only arrive via the status feed
    pub fn is_social(&self) -> bool {
        !matches!(self, Self::ProductReview)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPlatform(pub String);

impl fmt::Display for UnknownPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown platform: {}", self.0)
    }
}

impl std::error::Error for UnknownPlatform {}

impl FromStr for Platform {
    type Err = UnknownPlatform;

    /// Case-insensitive match against the known keys
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str() == key)
            .ok_or_else(|| UnknownPlatform(s.to_string()))
    }
}

/// Per-platform claimed flags; every known platform is always present
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RewardStatus(BTreeMap<Platform, bool>);

impl Default for RewardStatus {
    fn default() -> Self {
        Self(Platform::ALL.into_iter().map(|p| (p, false)).collect())
    }
}

impl RewardStatus {
    pub fn is_claimed(&self, platform: Platform) -> bool {
        self.0.get(&platform).copied().unwrap_or(false)
    }

    pub fn set(&mut self, platform: Platform, claimed: bool) {
        self.0.insert(platform, claimed);
    }

    pub fn claimed(&self) -> impl Iterator<Item = Platform> + '_ {
        self.0.iter().filter(|(_, claimed)| **claimed).map(|(p, _)| *p)
    }
}

/// One earned reward; immutable once appended to the history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardHistoryRecord {
    pub id: Uuid,
    pub platform: Platform,
    pub points: u32,
    pub value: u32,
    pub earned_at: DateTime<Utc>,
}

impl RewardHistoryRecord {
    pub fn new(platform: Platform, earned_at: DateTime<Utc>) -> Self {
        let points = platform.points();
        Self {
            id: Uuid::new_v4(),
            platform,
            points,
            value: points,
            earned_at,
        }
    }
}

/// Total is always derived from the history, never stored
pub fn total_points(history: &[RewardHistoryRecord]) -> u64 {
    history.iter().map(|r| u64::from(r.points)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_parse_is_case_insensitive() {
        assert_eq!("Facebook".parse::<Platform>(), Ok(Platform::Facebook));
        assert_eq!(" TIKTOK ".parse::<Platform>(), Ok(Platform::Tiktok));
        assert_eq!("product_review".parse::<Platform>(), Ok(Platform::ProductReview));
        assert!("myspace".parse::<Platform>().is_err());
    }

    #[test]
    fn test_platform_points() {
        assert_eq!(Platform::ProductReview.points(), 15);
        for platform in Platform::ALL.into_iter().filter(Platform::is_social) {
            assert_eq!(platform.points(), 25);
        }
    }

    #[test]
    fn test_status_serializes_as_flat_map() {
        let mut status = RewardStatus::default();
        status.set(Platform::Youtube, true);
        let json = serde_json::to_value(&status).expect("serialize");
        assert_eq!(json["youtube"], true);
        assert_eq!(json["product_review"], false);

        let back: RewardStatus = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, status);
        assert_eq!(back.claimed().collect::<Vec<_>>(), vec![Platform::Youtube]);
    }

    #[test]
    fn test_history_ids_unique_within_same_instant() {
        let now = Utc::now();
        let a = RewardHistoryRecord::new(Platform::Facebook, now);
        let b = RewardHistoryRecord::new(Platform::Instagram, now);
        assert_ne!(a.id, b.id);
        assert_eq!(total_points(&[a, b]), 50);
    }
}
