// rewards-core/src/auth/channel.rs
//! Login handshake and silent revalidation against the external identity provider.

use async_trait::async_trait;
use chrono::Utc;
use common::config::IdentityConfig;
use common::generate_correlation_token;
use common::messages::{AuthStatus, HandshakeMessage, PostedMessage, ProviderUser};
use common::models::Session;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{interval_at, sleep, Instant};
use url::Url;

use super::browser::{Browser, WindowSpec};
use crate::error::StoreError;
use crate::store::{save_json, Store, SESSION_KEY};

/// How a login handshake ended; exactly one per attempt
#[derive(Debug, Clone)]
pub enum HandshakeResult {
    Success(ProviderUser),
    Error(String),
    /// User closed the window before the provider answered
    Closed,
    TimedOut,
    /// The window could not be opened
    Blocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SilentCheck {
    LoggedOut,
    StillValid,
}

/// Anything that can authenticate a user against the external authority
#[async_trait]
pub trait ExternalAuthenticator: Send + Sync {
    async fn begin_handshake(&self, correlation_token: &str) -> HandshakeResult;

    /// Fails open: only a positive logged-out signal yields `LoggedOut`
    async fn silent_check(&self, correlation_token: &str) -> SilentCheck;
}

/// Popup-and-message implementation of [`ExternalAuthenticator`]
///
/// The listener, the closed-window poll and the deadline all live inside a
/// single `select!`, so whichever branch finishes first drops the other two.
pub struct PopupAuthenticator<B> {
    browser: B,
    login_url: Url,
    logged_out_url: String,
    login_timeout: Duration,
    revalidate_timeout: Duration,
    poll_interval: Duration,
}

impl<B: Browser> PopupAuthenticator<B> {
    pub fn new(browser: B, identity: &IdentityConfig) -> Result<Self, url::ParseError> {
        Ok(Self {
            browser,
            login_url: Url::parse(&identity.login_url)?,
            logged_out_url: identity.logged_out_url.clone(),
            login_timeout: identity.login_timeout(),
            revalidate_timeout: identity.revalidate_timeout(),
            poll_interval: identity.poll_interval(),
        })
    }

    pub fn browser(&self) -> &B {
        &self.browser
    }

    fn provider_url(&self, token: &str, with_callback: bool) -> Url {
        let origin = self.browser.origin().trim_end_matches('/');
        let mut url = self.login_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("token", token)
                .append_pair("callback_domain", origin);
            if with_callback {
                query.append_pair("callback_url", &format!("{}/auth-callback", origin));
            }
        }
        url
    }

    /// `None` means keep listening
    fn accept(&self, message: PostedMessage, correlation_token: &str) -> Option<HandshakeResult> {
        if message.origin != self.browser.origin() {
            tracing::warn!("Ignoring auth message from foreign origin {}", message.origin);
            return None;
        }
        if message.correlation_token.as_deref() != Some(correlation_token) {
            tracing::warn!("Ignoring auth message for another login attempt");
            return None;
        }

        let message: HandshakeMessage = match serde_json::from_value(message.data) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("Ignoring malformed auth message: {}", e);
                return None;
            }
        };

        match message.status {
            AuthStatus::Success => match message.user_data.and_then(|users| users.into_iter().next()) {
                Some(user) if user.is_complete() => Some(HandshakeResult::Success(user)),
                _ => {
                    tracing::warn!("Ignoring success message without a usable user");
                    None
                }
            },
            AuthStatus::Error => Some(HandshakeResult::Error(
                message.message.unwrap_or_else(|| "login failed".to_string()),
            )),
        }
    }
}

#[async_trait]
impl<B: Browser> ExternalAuthenticator for PopupAuthenticator<B> {
    async fn begin_handshake(&self, correlation_token: &str) -> HandshakeResult {
        let url = self.provider_url(correlation_token, true);

        // Subscribe before opening so an instant reply is not missed
        let mut listener = self.browser.messages().subscribe();
        let popup = match self.browser.open(&url, WindowSpec::LOGIN) {
            Some(popup) => popup,
            None => {
                tracing::warn!("Login window was blocked");
                return HandshakeResult::Blocked;
            }
        };
        tracing::debug!("Opened login window at {}", url);

        let deadline = sleep(self.login_timeout);
        tokio::pin!(deadline);
        let mut poll = interval_at(Instant::now() + self.poll_interval, self.poll_interval);

        loop {
            tokio::select! {
                received = listener.recv() => match received {
                    Ok(message) => {
                        if let Some(result) = self.accept(message, correlation_token) {
                            return result;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Auth listener lagged, {} messages skipped", skipped);
                    }
                    Err(RecvError::Closed) => {
                        return HandshakeResult::Error("message channel closed".to_string());
                    }
                },
                _ = poll.tick() => {
                    if popup.is_closed() {
                        tracing::info!("Login window closed by the user");
                        return HandshakeResult::Closed;
                    }
                }
                _ = &mut deadline => {
                    if !popup.is_closed() {
                        popup.close();
                    }
                    tracing::warn!("Login timed out after {:?}", self.login_timeout);
                    return HandshakeResult::TimedOut;
                }
            }
        }
    }

    async fn silent_check(&self, correlation_token: &str) -> SilentCheck {
        let url = self.provider_url(correlation_token, false);
        let popup = match self.browser.open(&url, WindowSpec::SILENT) {
            Some(popup) => popup,
            None => {
                tracing::debug!("Revalidation window blocked, keeping session");
                return SilentCheck::StillValid;
            }
        };

        let deadline = sleep(self.revalidate_timeout);
        tokio::pin!(deadline);
        let mut poll = interval_at(Instant::now() + self.poll_interval, self.poll_interval);

        loop {
            tokio::select! {
                _ = poll.tick() => {
                    if popup.is_closed() {
                        return SilentCheck::StillValid;
                    }
                    match popup.location() {
                        Ok(location) if location.as_str().starts_with(&self.logged_out_url) => {
                            popup.close();
                            return SilentCheck::LoggedOut;
                        }
                        Ok(_) => {}
                        Err(e) => {
                            tracing::debug!("Revalidation location unreadable ({}), keeping session", e);
                            popup.close();
                            return SilentCheck::StillValid;
                        }
                    }
                }
                _ = &mut deadline => {
                    popup.close();
                    return SilentCheck::StillValid;
                }
            }
        }
    }
}

/// Turns handshake results into persisted sessions
pub struct AuthChannel {
    authenticator: Arc<dyn ExternalAuthenticator>,
    store: Arc<dyn Store>,
    staleness: chrono::Duration,
}

impl AuthChannel {
    pub fn new(
        authenticator: Arc<dyn ExternalAuthenticator>,
        store: Arc<dyn Store>,
        staleness: chrono::Duration,
    ) -> Self {
        Self {
            authenticator,
            store,
            staleness,
        }
    }

    pub async fn initiate_login(&self) -> Result<Option<Session>, StoreError> {
        let token = generate_correlation_token();
        let user = match self.authenticator.begin_handshake(&token).await {
            HandshakeResult::Success(user) => user,
            HandshakeResult::Error(message) => {
                tracing::warn!("Identity provider reported an error: {}", message);
                return Ok(None);
            }
            other => {
                tracing::info!("Login did not complete: {:?}", other);
                return Ok(None);
            }
        };

        let session = match Session::from_provider(&user, Utc::now()) {
            Some(session) => session,
            None => {
                tracing::warn!("Provider user is missing a name or email");
                return Ok(None);
            }
        };

        save_json(self.store.as_ref(), SESSION_KEY, &session)?;
        tracing::info!("Session established for user {}", session.user_id);
        Ok(Some(session))
    }

    /// Returns the session (refreshed when a check ran) or `None` once it is destroyed
    pub async fn revalidate(&self, mut session: Session) -> Result<Option<Session>, StoreError> {
        let now = Utc::now();
        if !session.is_stale(self.staleness, now) {
            return Ok(Some(session));
        }

        tracing::debug!("Session for user {} is stale, revalidating", session.user_id);
        let token = generate_correlation_token();
        match self.authenticator.silent_check(&token).await {
            SilentCheck::LoggedOut => {
                tracing::info!("Session for user {} is no longer valid", session.user_id);
                self.store.remove(SESSION_KEY)?;
                Ok(None)
            }
            SilentCheck::StillValid => {
                session.refresh(Utc::now());
                save_json(self.store.as_ref(), SESSION_KEY, &session)?;
                Ok(Some(session))
            }
        }
    }
}
