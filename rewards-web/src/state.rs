// rewards-web/src/state.rs
use common::Config;
use rewards_core::auth::{AuthChannel, MessageBus, PopupAuthenticator, SessionManager};
use rewards_core::{
    FileStore, HttpRewardsApi, HttpSmsGateway, MemoryStore, OtpChallengeManager, PhoneVerificationFlow,
    RewardLedger, Store, VerificationOrchestrator,
};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::browser::{LoginTabs, SystemBrowser};
use crate::error::StartupError;

/// Shared by every request handler
pub struct AppState {
    /// Configured public origin; relayed callbacks are tagged with it
    pub origin: String,
    pub bus: MessageBus,
    pub orchestrator: VerificationOrchestrator,
    /// At most one phone verification dialog is open at a time
    pub phone_flow: Mutex<Option<PhoneVerificationFlow>>,
    pub login_tabs: LoginTabs,
}

impl AppState {
    pub fn new(origin: &str, bus: MessageBus, orchestrator: VerificationOrchestrator) -> Self {
        Self {
            origin: origin.trim_end_matches('/').to_string(),
            bus,
            orchestrator,
            phone_flow: Mutex::new(None),
            login_tabs: LoginTabs::default(),
        }
    }

    pub fn with_login_tabs(mut self, tabs: LoginTabs) -> Self {
        self.login_tabs = tabs;
        self
    }

    /// Wire the production collaborators from configuration
    pub fn build(config: &Config) -> Result<Self, StartupError> {
        let durable: Arc<dyn Store> = Arc::new(FileStore::open(&config.storage.path)?);
        let session_scoped: Arc<dyn Store> = Arc::new(MemoryStore::new());

        let bus = MessageBus::default();
        let tabs = LoginTabs::default();
        let browser = SystemBrowser::new(&config.public_origin, &config.browser.opener, bus.clone(), tabs.clone());
        let authenticator = PopupAuthenticator::new(browser, &config.identity)?;
        let channel = AuthChannel::new(
            Arc::new(authenticator),
            durable.clone(),
            config.identity.staleness_window(),
        );

        let api = Arc::new(HttpRewardsApi::new(config.remote.clone())?);
        let ledger = Arc::new(RewardLedger::new(durable.clone()));
        let sessions = Arc::new(SessionManager::new(channel, durable, ledger, api));

        let gateway = Arc::new(HttpSmsGateway::new(config.sms.clone()));
        let otp = Arc::new(OtpChallengeManager::new(session_scoped, gateway, config.otp.clone()));

        tracing::info!("Rewards state ready, store at {}", config.storage.path);
        Ok(Self::new(
            &config.public_origin,
            bus,
            VerificationOrchestrator::new(sessions, otp),
        )
        .with_login_tabs(tabs))
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        self.orchestrator.sessions()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use actix_web::web;
    use chrono::Utc;
    use common::config::{IdentityConfig, OtpConfig};
    use common::models::Session;
    use rewards_core::auth::Browser;
    use rewards_core::store::{save_json, SESSION_KEY};
    use rewards_core::testing::{FakeApi, FakeBrowser, FakeGateway, ORIGIN};

    pub struct TestApp {
        pub state: web::Data<AppState>,
        pub browser: Arc<FakeBrowser>,
        pub api: Arc<FakeApi>,
        pub gateway: Arc<FakeGateway>,
        pub otp: Arc<OtpChallengeManager>,
    }

    /// App state over in-memory fakes; `logged_in` seeds a fresh session for user 5
    pub async fn test_app(logged_in: bool) -> TestApp {
        let durable = Arc::new(MemoryStore::new());
        if logged_in {
            let session = Session {
                user_id: 5,
                display_name: "Ada".into(),
                email: "ada@example.com".into(),
                established_at: Utc::now(),
            };
            save_json(durable.as_ref(), SESSION_KEY, &session).expect("seed session");
        }

        let browser = Arc::new(FakeBrowser::default());
        let api = Arc::new(FakeApi::default());
        let gateway = Arc::new(FakeGateway::default());

        let authenticator = PopupAuthenticator::new(browser.clone(), &IdentityConfig::default()).expect("url");
        let channel = AuthChannel::new(Arc::new(authenticator), durable.clone(), chrono::Duration::hours(24));
        let ledger = Arc::new(RewardLedger::new(durable.clone()));
        let sessions = Arc::new(SessionManager::new(channel, durable, ledger, api.clone()));
        sessions.initialize().await.expect("initialize");

        let otp = Arc::new(OtpChallengeManager::new(
            Arc::new(MemoryStore::new()),
            gateway.clone(),
            OtpConfig::default(),
        ));
        let bus = browser.messages().clone();
        let state = web::Data::new(AppState::new(
            ORIGIN,
            bus,
            VerificationOrchestrator::new(sessions, otp.clone()),
        ));

        TestApp {
            state,
            browser,
            api,
            gateway,
            otp,
        }
    }

    /// Logged-out app state whose login launches `true` as the system browser
    pub fn system_browser_app() -> web::Data<AppState> {
        let durable = Arc::new(MemoryStore::new());
        let bus = MessageBus::default();
        let tabs = LoginTabs::default();
        let browser = SystemBrowser::new(ORIGIN, "true", bus.clone(), tabs.clone());

        let authenticator = PopupAuthenticator::new(browser, &IdentityConfig::default()).expect("url");
        let channel = AuthChannel::new(Arc::new(authenticator), durable.clone(), chrono::Duration::hours(24));
        let ledger = Arc::new(RewardLedger::new(durable.clone()));
        let sessions = Arc::new(SessionManager::new(channel, durable, ledger, Arc::new(FakeApi::default())));
        let otp = Arc::new(OtpChallengeManager::new(
            Arc::new(MemoryStore::new()),
            Arc::new(FakeGateway::default()),
            OtpConfig::default(),
        ));

        web::Data::new(
            AppState::new(ORIGIN, bus, VerificationOrchestrator::new(sessions, otp)).with_login_tabs(tabs),
        )
    }
}
