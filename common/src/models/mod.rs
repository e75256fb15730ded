// common/src/models/mod.rs
pub mod otp;
pub mod reward;
pub mod session;

pub use otp::OtpChallenge;
pub use reward::{total_points, Platform, RewardHistoryRecord, RewardStatus, UnknownPlatform};
pub use session::Session;
