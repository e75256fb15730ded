// rewards-core/tests/session_flow.rs
use async_trait::async_trait;
use common::config::{IdentityConfig, OtpConfig};
use common::messages::PostedMessage;
use common::models::{Platform, Session};
use rewards_core::auth::{Browser, MessageBus, Popup, PopupAuthenticator, PopupError, WindowSpec};
use rewards_core::error::{RemoteError, SmsError};
use rewards_core::otp::OtpState;
use rewards_core::remote::{PhoneLookup, StatusFeed, VerificationOutcome};
use rewards_core::{
    AuthChannel, FileStore, MemoryStore, OtpChallengeManager, RewardLedger, RewardsApi, SessionManager,
    SmsGateway, Store, VerificationOrchestrator, VerifyOutcome,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

const ORIGIN: &str = "http://127.0.0.1:8081";

/// Identity provider that answers every login window with the same user
struct AutoLoginBrowser {
    bus: MessageBus,
    logins: Mutex<usize>,
}

struct InertPopup;

impl Popup for InertPopup {
    fn is_closed(&self) -> bool {
        false
    }

    fn close(&self) {}

    fn location(&self) -> Result<Url, PopupError> {
        Err(PopupError::CrossOrigin)
    }
}

impl Browser for AutoLoginBrowser {
    fn origin(&self) -> &str {
        ORIGIN
    }

    fn open(&self, url: &Url, spec: WindowSpec) -> Option<Box<dyn Popup>> {
        if spec == WindowSpec::LOGIN {
            *self.logins.lock().unwrap() += 1;
            let bus = self.bus.clone();
            let token = url
                .query_pairs()
                .find(|(key, _)| key == "token")
                .map(|(_, value)| value.into_owned())
                .unwrap_or_default();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                bus.post(PostedMessage::new(
                    ORIGIN,
                    json!({"status": "success", "userData": [{"id": 314, "name": "Grace", "email": "grace@example.com"}]}),
                )
                .with_token(token));
            });
        }
        Some(Box::new(InertPopup))
    }

    fn messages(&self) -> &MessageBus {
        &self.bus
    }
}

struct StubApi {
    feed: Vec<String>,
    phones: Mutex<Vec<(u64, String)>>,
}

#[async_trait]
impl RewardsApi for StubApi {
    async fn fetch_status(&self, _user_id: u64) -> Result<StatusFeed, RemoteError> {
        Ok(StatusFeed::Actions(self.feed.clone()))
    }

    async fn verify(&self, _: Platform, _: u64, _: &str) -> Result<VerificationOutcome, RemoteError> {
        Ok(VerificationOutcome::Verified)
    }

    async fn lookup_phone(&self, user_id: u64) -> Result<PhoneLookup, RemoteError> {
        let known = self.phones.lock().unwrap().iter().any(|(id, _)| *id == user_id);
        Ok(if known { PhoneLookup::Found } else { PhoneLookup::NotFound })
    }

    async fn associate_phone(&self, user_id: u64, phone: &str) -> Result<(), RemoteError> {
        self.phones.lock().unwrap().push((user_id, phone.to_string()));
        Ok(())
    }
}

#[derive(Default)]
struct Outbox(Mutex<Vec<String>>);

#[async_trait]
impl SmsGateway for Outbox {
    async fn send_otp(&self, _phone: &str, code: &str) -> Result<(), SmsError> {
        self.0.lock().unwrap().push(code.to_string());
        Ok(())
    }
}

struct App {
    browser: Arc<AutoLoginBrowser>,
    api: Arc<StubApi>,
    outbox: Arc<Outbox>,
    orchestrator: VerificationOrchestrator,
}

fn app(path: &Path, api: Arc<StubApi>) -> Result<App, Box<dyn std::error::Error>> {
    let durable: Arc<dyn Store> = Arc::new(FileStore::open(path)?);
    let browser = Arc::new(AutoLoginBrowser {
        bus: MessageBus::default(),
        logins: Mutex::new(0),
    });
    let identity = IdentityConfig::default();
    let auth = PopupAuthenticator::new(browser.clone(), &identity)?;
    let channel = AuthChannel::new(Arc::new(auth), durable.clone(), identity.staleness_window());
    let ledger = Arc::new(RewardLedger::new(durable.clone()));
    let sessions = Arc::new(SessionManager::new(channel, durable, ledger, api.clone()));

    let outbox = Arc::new(Outbox::default());
    let otp = Arc::new(OtpChallengeManager::new(
        Arc::new(MemoryStore::new()),
        outbox.clone(),
        OtpConfig::default(),
    ));

    Ok(App {
        browser,
        api,
        outbox,
        orchestrator: VerificationOrchestrator::new(sessions, otp),
    })
}

fn scratch_path() -> PathBuf {
    std::env::temp_dir()
        .join(format!("rewards-flow-{}", uuid::Uuid::new_v4()))
        .join("store.json")
}

#[tokio::test]
async fn test_login_earn_verify_phone_and_logout() -> Result<(), Box<dyn std::error::Error>> {
    let path = scratch_path();
    let api = Arc::new(StubApi {
        feed: vec!["facebook".into(), "product_review".into()],
        phones: Mutex::new(vec![]),
    });

    // 1. Fresh start: nobody logged in, nothing cached
    let first = app(&path, api.clone())?;
    let sessions = first.orchestrator.sessions().clone();
    assert_eq!(sessions.initialize().await?, None);
    assert_eq!(first.orchestrator.snapshot().total_points, 0);

    // 2. Login pulls the remote feed into the ledger
    let session: Session = sessions.login().await?;
    assert_eq!(session.user_id, 314);
    assert_eq!(*first.browser.logins.lock().unwrap(), 1);
    assert_eq!(first.browser.messages().listener_count(), 0);
    assert_eq!(first.orchestrator.snapshot().total_points, 40);

    // 3. Screenshot verification pays once
    let outcome = first.orchestrator.verify_and_claim(Platform::Instagram, "https://img/a.png").await?;
    assert!(matches!(outcome, VerifyOutcome::Claimed(_)));
    let again = first.orchestrator.verify_and_claim(Platform::Instagram, "https://img/b.png").await?;
    assert_eq!(again, VerifyOutcome::AlreadyClaimed);
    assert_eq!(first.orchestrator.snapshot().total_points, 65);

    // 4. Phone verification
    assert!(first.orchestrator.phone_required().await?);
    let mut flow = first.orchestrator.phone_flow()?;
    flow.submit_phone("+94712345678").await?;
    let code = first.outbox.0.lock().unwrap().last().cloned().expect("code sent");
    flow.submit_code(&code).await?;
    assert_eq!(flow.state(), &OtpState::Verified { phone: "+94712345678".into() });
    assert!(!first.orchestrator.phone_required().await?);
    assert_eq!(first.api.phones.lock().unwrap().len(), 1);

    // 5. Restart: session and ledger come back from disk without a new login window
    drop(first);
    let second = app(&path, api.clone())?;
    let sessions = second.orchestrator.sessions().clone();
    let restored = sessions.initialize().await?.expect("session persisted");
    assert_eq!(restored.user_id, 314);
    assert_eq!(*second.browser.logins.lock().unwrap(), 0);
    assert_eq!(second.orchestrator.snapshot().total_points, 65);

    // 6. Logout wipes everything
    sessions.logout()?;
    assert_eq!(second.orchestrator.snapshot().total_points, 0);
    let third = app(&path, api)?;
    assert_eq!(third.orchestrator.sessions().initialize().await?, None);
    assert_eq!(third.orchestrator.snapshot().total_points, 0);

    let _ = std::fs::remove_dir_all(path.parent().expect("parent"));
    Ok(())
}
