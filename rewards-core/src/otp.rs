// rewards-core/src/otp.rs
//! One-time passcode challenges and the phone verification flow built on them.
//!
//! Only one challenge is retained at a time, in the session-scoped store;
//! issuing a new one replaces the previous code.

use chrono::Utc;
use common::config::OtpConfig;
use common::fingerprint;
use common::models::OtpChallenge;
use rand::{thread_rng, Rng};
use std::sync::Arc;

use crate::error::{OtpError, StoreError};
use crate::remote::RewardsApi;
use crate::sms::SmsGateway;
use crate::store::{load_json, save_json, Store, OTP_CHALLENGE_KEY};

pub const CODE_LEN: usize = 6;

/// Uniform over 100000..=999999
pub fn generate_code() -> String {
    thread_rng().gen_range(100_000..=999_999u32).to_string()
}

fn is_code_shaped(entered: &str) -> bool {
    entered.len() == CODE_LEN && entered.bytes().all(|b| b.is_ascii_digit())
}

pub struct OtpChallengeManager {
    store: Arc<dyn Store>,
    gateway: Arc<dyn SmsGateway>,
    config: OtpConfig,
}

impl OtpChallengeManager {
    pub fn new(store: Arc<dyn Store>, gateway: Arc<dyn SmsGateway>, config: OtpConfig) -> Self {
        Self {
            store,
            gateway,
            config,
        }
    }

    fn normalize_phone(&self, phone: &str) -> Result<String, OtpError> {
        let phone = phone.trim();
        if phone.chars().count() < self.config.min_phone_len {
            return Err(OtpError::InvalidPhone {
                min_len: self.config.min_phone_len,
            });
        }
        Ok(phone.to_string())
    }

    /// Generate a code, deliver it, and make it the current challenge
    ///
    /// The challenge is stored only once the gateway accepted the code, so a
    /// failed delivery leaves the previous state untouched and can be retried.
    pub async fn issue(&self, phone: &str) -> Result<OtpChallenge, OtpError> {
        let phone = self.normalize_phone(phone)?;
        let challenge = OtpChallenge::new(phone, generate_code(), Utc::now());

        if let Err(e) = self.gateway.send_otp(&challenge.phone, &challenge.code).await {
            tracing::warn!("OTP delivery to {} failed: {}", fingerprint(&challenge.phone), e);
            return Err(e.into());
        }

        save_json(self.store.as_ref(), OTP_CHALLENGE_KEY, &challenge)?;
        tracing::info!("Issued OTP challenge for phone {}", fingerprint(&challenge.phone));
        Ok(challenge)
    }

    pub fn current(&self) -> Option<OtpChallenge> {
        load_json(self.store.as_ref(), OTP_CHALLENGE_KEY)
    }

    /// Detailed check of an entered code; does not consume the challenge
    pub fn check(&self, entered: &str) -> Result<OtpChallenge, OtpError> {
        let challenge = self.current().ok_or(OtpError::NoChallenge)?;
        if challenge.is_expired(self.config.ttl(), Utc::now()) {
            return Err(OtpError::Expired);
        }
        // String compare keeps leading zeros significant
        if challenge.code != entered {
            return Err(OtpError::CodeMismatch);
        }
        Ok(challenge)
    }

    pub fn validate(&self, entered: &str) -> bool {
        self.check(entered).is_ok()
    }

    /// Discard the current challenge
    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.remove(OTP_CHALLENGE_KEY)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OtpState {
    AwaitingPhone,
    AwaitingCode { phone: String },
    Verified { phone: String },
}

impl OtpState {
    fn name(&self) -> &'static str {
        match self {
            Self::AwaitingPhone => "awaiting phone",
            Self::AwaitingCode { .. } => "awaiting code",
            Self::Verified { .. } => "verified",
        }
    }
}

/// Phone verification for one user: phone → code → associated with the account
///
/// Dropping the flow mid-way discards the outstanding challenge.
pub struct PhoneVerificationFlow {
    user_id: u64,
    otp: Arc<OtpChallengeManager>,
    api: Arc<dyn RewardsApi>,
    state: OtpState,
}

impl PhoneVerificationFlow {
    pub fn new(user_id: u64, otp: Arc<OtpChallengeManager>, api: Arc<dyn RewardsApi>) -> Self {
        Self {
            user_id,
            otp,
            api,
            state: OtpState::AwaitingPhone,
        }
    }

    pub fn user_id(&self) -> u64 {
        self.user_id
    }

    pub fn state(&self) -> &OtpState {
        &self.state
    }

    /// Send (or resend) a code to `phone`
    pub async fn submit_phone(&mut self, phone: &str) -> Result<(), OtpError> {
        if let OtpState::Verified { .. } = self.state {
            return Err(OtpError::WrongState(self.state.name()));
        }
        let challenge = self.otp.issue(phone).await?;
        self.state = OtpState::AwaitingCode {
            phone: challenge.phone,
        };
        Ok(())
    }

    /// Check the entered code, then associate the phone with the user
    pub async fn submit_code(&mut self, code: &str) -> Result<(), OtpError> {
        if !matches!(self.state, OtpState::AwaitingCode { .. }) {
            return Err(OtpError::WrongState(self.state.name()));
        }
        let code = code.trim();
        if !is_code_shaped(code) {
            return Err(OtpError::InvalidCodeFormat);
        }

        let challenge = match self.otp.check(code) {
            Ok(challenge) => challenge,
            Err(OtpError::Expired) => {
                self.otp.clear()?;
                self.state = OtpState::AwaitingPhone;
                return Err(OtpError::Expired);
            }
            Err(e) => return Err(e),
        };

        // Association failure keeps the challenge so the user can retry
        self.api.associate_phone(self.user_id, &challenge.phone).await?;
        self.otp.clear()?;

        tracing::info!(
            "Phone {} verified for user {}",
            fingerprint(&challenge.phone),
            self.user_id
        );
        self.state = OtpState::Verified {
            phone: challenge.phone,
        };
        Ok(())
    }

    /// Return to phone entry, discarding the outstanding code
    pub fn back(&mut self) {
        self.discard();
        self.state = OtpState::AwaitingPhone;
    }

    pub fn cancel(&mut self) {
        self.discard();
        self.state = OtpState::AwaitingPhone;
    }

    fn discard(&self) {
        if let Err(e) = self.otp.clear() {
            tracing::error!("Failed to discard OTP challenge: {}", e);
        }
    }
}

impl Drop for PhoneVerificationFlow {
    fn drop(&mut self) {
        if let OtpState::AwaitingCode { .. } = self.state {
            self.discard();
        }
    }
}
