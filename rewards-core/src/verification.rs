// rewards-core/src/verification.rs
//! Ties remote verification answers to ledger claims for the logged-in user.

use common::models::{Platform, RewardHistoryRecord, Session};
use std::sync::Arc;

use crate::auth::SessionManager;
use crate::error::VerifyError;
use crate::ledger::{ClaimOutcome, LedgerSnapshot};
use crate::otp::{OtpChallengeManager, PhoneVerificationFlow};
use crate::reconcile::reconcile;
use crate::remote::{PhoneLookup, VerificationOutcome};

#[derive(Debug, Clone, PartialEq)]
pub enum VerifyOutcome {
    Claimed(RewardHistoryRecord),
    Restored,
    AlreadyClaimed,
    NotVerified,
    /// Remote answered in a shape we do not understand; treated as not verified
    Unrecognized,
}

impl From<ClaimOutcome> for VerifyOutcome {
    fn from(outcome: ClaimOutcome) -> Self {
        match outcome {
            ClaimOutcome::Claimed(record) => Self::Claimed(record),
            ClaimOutcome::Restored => Self::Restored,
            ClaimOutcome::AlreadyClaimed => Self::AlreadyClaimed,
        }
    }
}

pub struct VerificationOrchestrator {
    sessions: Arc<SessionManager>,
    otp: Arc<OtpChallengeManager>,
}

impl VerificationOrchestrator {
    pub fn new(sessions: Arc<SessionManager>, otp: Arc<OtpChallengeManager>) -> Self {
        Self { sessions, otp }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    fn user(&self) -> Result<Session, VerifyError> {
        self.sessions.current().ok_or(VerifyError::NotLoggedIn)
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.sessions.ledger().snapshot()
    }

    /// Ask the remote service to verify a screenshot and claim the reward on success
    pub async fn verify_and_claim(
        &self,
        platform: Platform,
        image_url: &str,
    ) -> Result<VerifyOutcome, VerifyError> {
        let user = self.user()?;
        if !platform.is_social() {
            return Err(VerifyError::NotVerifiable(platform));
        }

        let ledger = self.sessions.ledger();
        if ledger.is_claimed(platform) {
            return Ok(VerifyOutcome::AlreadyClaimed);
        }

        let outcome = self
            .sessions
            .api()
            .verify(platform, user.user_id, image_url)
            .await?;
        tracing::info!("Verification of {} for user {}: {:?}", platform, user.user_id, outcome);

        match outcome {
            VerificationOutcome::Verified => Ok(ledger.claim(platform)?.into()),
            VerificationOutcome::NotVerified => Ok(VerifyOutcome::NotVerified),
            VerificationOutcome::Unrecognized => Ok(VerifyOutcome::Unrecognized),
        }
    }

    /// Reconcile with the remote feed, or reload local cache when logged out
    pub async fn refresh(&self) -> Result<LedgerSnapshot, VerifyError> {
        let ledger = self.sessions.ledger();
        match self.sessions.current() {
            Some(user) => {
                reconcile(self.sessions.api().as_ref(), ledger, user.user_id).await?;
                Ok(ledger.snapshot())
            }
            None => Ok(ledger.load()),
        }
    }

    /// Whether the user still has to register a phone number
    pub async fn phone_required(&self) -> Result<bool, VerifyError> {
        let user = self.user()?;
        let lookup = self.sessions.api().lookup_phone(user.user_id).await?;
        Ok(lookup == PhoneLookup::NotFound)
    }

    pub fn phone_flow(&self) -> Result<PhoneVerificationFlow, VerifyError> {
        let user = self.user()?;
        Ok(PhoneVerificationFlow::new(
            user.user_id,
            self.otp.clone(),
            self.sessions.api().clone(),
        ))
    }
}
