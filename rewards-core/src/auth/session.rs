// rewards-core/src/auth/session.rs
use common::models::Session;
use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};

use super::channel::AuthChannel;
use crate::error::SessionError;
use crate::ledger::RewardLedger;
use crate::reconcile::reconcile;
use crate::remote::RewardsApi;
use crate::store::{load_json, Store, SESSION_KEY};

/// Owns the current session and keeps the ledger in step with it
pub struct SessionManager {
    channel: AuthChannel,
    store: Arc<dyn Store>,
    ledger: Arc<RewardLedger>,
    api: Arc<dyn RewardsApi>,
    current: RwLock<Option<Session>>,
    login_gate: Mutex<()>,
}

impl SessionManager {
    pub fn new(
        channel: AuthChannel,
        store: Arc<dyn Store>,
        ledger: Arc<RewardLedger>,
        api: Arc<dyn RewardsApi>,
    ) -> Self {
        Self {
            channel,
            store,
            ledger,
            api,
            current: RwLock::new(None),
            login_gate: Mutex::new(()),
        }
    }

    pub fn current(&self) -> Option<Session> {
        self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set_current(&self, session: Option<Session>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = session;
    }

    pub fn ledger(&self) -> &Arc<RewardLedger> {
        &self.ledger
    }

    pub fn api(&self) -> &Arc<dyn RewardsApi> {
        &self.api
    }

    async fn reconcile_for(&self, session: &Session) {
        match reconcile(self.api.as_ref(), &self.ledger, session.user_id).await {
            Ok(outcome) => tracing::debug!("Reconciled user {}: {:?}", session.user_id, outcome),
            Err(e) => tracing::error!("Failed to persist reconciled ledger: {}", e),
        }
    }

    /// Restore the persisted session, revalidate it and bring the ledger up to date
    pub async fn initialize(&self) -> Result<Option<Session>, SessionError> {
        let session = match load_json::<Session>(self.store.as_ref(), SESSION_KEY) {
            Some(persisted) => self.channel.revalidate(persisted).await?,
            None => None,
        };
        self.set_current(session.clone());

        match &session {
            Some(session) => {
                tracing::info!("Restored session for user {}", session.user_id);
                self.reconcile_for(session).await;
            }
            None => {
                self.ledger.load();
            }
        }
        Ok(session)
    }

    pub async fn login(&self) -> Result<Session, SessionError> {
        let _gate = self.login_gate.try_lock().map_err(|_| SessionError::LoginInProgress)?;

        let session = self
            .channel
            .initiate_login()
            .await?
            .ok_or(SessionError::LoginFailed)?;
        self.set_current(Some(session.clone()));
        self.reconcile_for(&session).await;
        Ok(session)
    }

    /// Forget the session and wipe local reward state
    pub fn logout(&self) -> Result<(), SessionError> {
        let previous = self.current();
        self.set_current(None);
        self.store.remove(SESSION_KEY)?;
        self.ledger.reset()?;
        if let Some(session) = previous {
            tracing::info!("User {} logged out", session.user_id);
        }
        Ok(())
    }

    /// Revalidate the held session if it has gone stale
    pub async fn revalidate_now(&self) -> Result<Option<Session>, SessionError> {
        let Some(session) = self.current() else {
            return Ok(None);
        };
        let revalidated = self.channel.revalidate(session).await?;
        self.set_current(revalidated.clone());
        Ok(revalidated)
    }

    /// Revalidate every `every` until the handle is dropped
    pub fn spawn_revalidation(self: &Arc<Self>, every: Duration) -> RevalidationHandle {
        let manager: Weak<Self> = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + every, every);
            loop {
                ticker.tick().await;
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                if let Err(e) = manager.revalidate_now().await {
                    tracing::error!("Periodic revalidation failed: {}", e);
                }
            }
        });
        RevalidationHandle(task)
    }
}

/// Aborts the periodic revalidation task when dropped
pub struct RevalidationHandle(JoinHandle<()>);

impl RevalidationHandle {
    pub fn is_running(&self) -> bool {
        !self.0.is_finished()
    }
}

impl Drop for RevalidationHandle {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::browser::Browser;
    use crate::auth::channel::PopupAuthenticator;
    use crate::remote::StatusFeed;
    use crate::store::{save_json, MemoryStore, REWARD_HISTORY_KEY};
    use crate::testing::{FakeApi, FakeBrowser};
    use chrono::Utc;
    use common::config::IdentityConfig;
    use common::models::Platform;
    use serde_json::json;
    use tokio::time::sleep;

    struct Harness {
        browser: Arc<FakeBrowser>,
        store: Arc<MemoryStore>,
        api: Arc<FakeApi>,
        manager: Arc<SessionManager>,
    }

    fn harness() -> Harness {
        harness_with_staleness(chrono::Duration::hours(24))
    }

    fn harness_with_staleness(staleness: chrono::Duration) -> Harness {
        let browser = Arc::new(FakeBrowser::default());
        let store = Arc::new(MemoryStore::new());
        let api = Arc::new(FakeApi::default());
        let auth = PopupAuthenticator::new(browser.clone(), &IdentityConfig::default()).expect("config url");
        let channel = AuthChannel::new(Arc::new(auth), store.clone(), staleness);
        let ledger = Arc::new(RewardLedger::new(store.clone()));
        let manager = Arc::new(SessionManager::new(channel, store.clone(), ledger, api.clone()));
        Harness {
            browser,
            store,
            api,
            manager,
        }
    }

    fn post_success_after(browser: &Arc<FakeBrowser>, delay: Duration) {
        let browser = browser.clone();
        tokio::spawn(async move {
            sleep(delay).await;
            browser.reply(json!({"status": "success", "userData": [{"id": "17", "name": "Ada", "email": "ada@example.com"}]}));
        });
    }

    fn persisted_session(hours_old: i64) -> Session {
        Session {
            user_id: 17,
            display_name: "Ada".into(),
            email: "ada@example.com".into(),
            established_at: Utc::now() - chrono::Duration::hours(hours_old),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_reconciles_new_user() {
        let h = harness();
        h.api.set_status(Ok(StatusFeed::Actions(vec!["instagram".into()])));
        post_success_after(&h.browser, Duration::from_secs(1));

        let session = h.manager.login().await.expect("login");
        assert_eq!(session.user_id, 17);
        assert_eq!(h.manager.current(), Some(session));
        assert!(h.manager.ledger().is_claimed(Platform::Instagram));
        assert_eq!(h.manager.ledger().total_points(), 25);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_login_reports_failure() {
        let h = harness();
        h.browser.block_popups();

        assert!(matches!(h.manager.login().await, Err(SessionError::LoginFailed)));
        assert_eq!(h.manager.current(), None);
        assert_eq!(h.api.status_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_login_while_pending_is_refused() {
        let h = harness();
        post_success_after(&h.browser, Duration::from_secs(10));

        let first = {
            let manager = h.manager.clone();
            tokio::spawn(async move { manager.login().await })
        };
        sleep(Duration::from_secs(1)).await;

        assert!(matches!(h.manager.login().await, Err(SessionError::LoginInProgress)));
        assert!(first.await.expect("join").is_ok());
        assert_eq!(h.browser.open_count(), 1);
        assert_eq!(h.browser.messages().listener_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_wipes_session_and_ledger() {
        let h = harness();
        post_success_after(&h.browser, Duration::from_secs(1));
        h.api.set_status(Ok(StatusFeed::Actions(vec!["facebook".into()])));
        h.manager.login().await.expect("login");

        h.manager.logout().expect("logout");
        assert_eq!(h.manager.current(), None);
        assert!(h.store.is_empty());
        assert_eq!(h.manager.ledger().total_points(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_without_session_loads_cache() {
        let h = harness();
        let cached = vec![common::models::RewardHistoryRecord::new(Platform::Youtube, Utc::now())];
        save_json(h.store.as_ref(), REWARD_HISTORY_KEY, &cached).expect("save");

        assert_eq!(h.manager.initialize().await.expect("init"), None);
        assert_eq!(h.manager.ledger().total_points(), 25);
        assert_eq!(h.api.status_calls(), 0);
        assert_eq!(h.browser.open_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_with_fresh_session_reconciles_without_popup() {
        let h = harness();
        save_json(h.store.as_ref(), SESSION_KEY, &persisted_session(1)).expect("save");

        let session = h.manager.initialize().await.expect("init");
        assert_eq!(session.map(|s| s.user_id), Some(17));
        assert_eq!(h.browser.open_count(), 0);
        assert_eq!(h.api.status_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_with_stale_session_revalidates() {
        let h = harness();
        let stale = persisted_session(25);
        save_json(h.store.as_ref(), SESSION_KEY, &stale).expect("save");

        let session = h.manager.initialize().await.expect("init").expect("fail open");
        assert_eq!(h.browser.open_count(), 1);
        assert!(session.established_at > stale.established_at);
    }

    #[tokio::test(start_paused = true)]
    async fn test_revalidation_task_runs_until_dropped() {
        let h = harness_with_staleness(chrono::Duration::zero());
        save_json(h.store.as_ref(), SESSION_KEY, &persisted_session(1)).expect("save");
        h.manager.initialize().await.expect("init");
        assert_eq!(h.browser.open_count(), 1);

        let handle = h.manager.spawn_revalidation(Duration::from_secs(60));
        assert!(handle.is_running());
        sleep(Duration::from_secs(61)).await;
        assert_eq!(h.browser.open_count(), 2);
        assert!(h.manager.current().is_some());

        drop(handle);
        sleep(Duration::from_secs(300)).await;
        assert_eq!(h.browser.open_count(), 2);
    }
}
