// rewards-core/src/lib.rs
pub mod auth;
pub mod error;
pub mod ledger;
pub mod otp;
pub mod reconcile;
pub mod remote;
pub mod sms;
pub mod store;
pub mod verification;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use self::auth::{AuthChannel, SessionManager};
pub use self::error::*;
pub use self::ledger::{ClaimOutcome, LedgerSnapshot, RewardLedger};
pub use self::otp::{OtpChallengeManager, OtpState, PhoneVerificationFlow};
pub use self::reconcile::{reconcile, ReconcileOutcome};
pub use self::remote::{HttpRewardsApi, RewardsApi};
pub use self::sms::{HttpSmsGateway, SmsGateway};
pub use self::store::{FileStore, MemoryStore, Store};
pub use self::verification::{VerificationOrchestrator, VerifyOutcome};
