// rewards-core/src/testing.rs
//! In-process fakes for unit tests.

use async_trait::async_trait;
use common::messages::PostedMessage;
use common::models::Platform;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use url::Url;

use crate::auth::browser::{Browser, MessageBus, Popup, PopupError, WindowSpec};
use crate::error::{RemoteError, SmsError};
use crate::remote::{PhoneLookup, RewardsApi, StatusFeed, VerificationOutcome};
use crate::sms::SmsGateway;

pub const ORIGIN: &str = "http://127.0.0.1:8081";

pub fn transport_error(operation: &'static str) -> RemoteError {
    RemoteError::Transport {
        operation,
        detail: "connection refused".into(),
    }
}

pub struct FakeApi {
    status: Mutex<Result<StatusFeed, RemoteError>>,
    verification: Mutex<Result<VerificationOutcome, RemoteError>>,
    phone: Mutex<Result<PhoneLookup, RemoteError>>,
    association_fails: AtomicBool,
    associated: Mutex<Vec<(u64, String)>>,
    status_calls: AtomicUsize,
    verify_calls: AtomicUsize,
}

impl Default for FakeApi {
    fn default() -> Self {
        Self {
            status: Mutex::new(Ok(StatusFeed::Actions(vec![]))),
            verification: Mutex::new(Ok(VerificationOutcome::Verified)),
            phone: Mutex::new(Ok(PhoneLookup::NotFound)),
            association_fails: AtomicBool::new(false),
            associated: Mutex::new(vec![]),
            status_calls: AtomicUsize::new(0),
            verify_calls: AtomicUsize::new(0),
        }
    }
}

impl FakeApi {
    pub fn set_status(&self, feed: Result<StatusFeed, RemoteError>) {
        *self.status.lock().unwrap() = feed;
    }

    pub fn set_verification(&self, outcome: Result<VerificationOutcome, RemoteError>) {
        *self.verification.lock().unwrap() = outcome;
    }

    pub fn set_phone(&self, lookup: Result<PhoneLookup, RemoteError>) {
        *self.phone.lock().unwrap() = lookup;
    }

    pub fn fail_association(&self, fail: bool) {
        self.association_fails.store(fail, Ordering::SeqCst);
    }

    pub fn associated(&self) -> Vec<(u64, String)> {
        self.associated.lock().unwrap().clone()
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn verify_calls(&self) -> usize {
        self.verify_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RewardsApi for FakeApi {
    async fn fetch_status(&self, _user_id: u64) -> Result<StatusFeed, RemoteError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.status.lock().unwrap().clone()
    }

    async fn verify(
        &self,
        _platform: Platform,
        _user_id: u64,
        _image_url: &str,
    ) -> Result<VerificationOutcome, RemoteError> {
        self.verify_calls.fetch_add(1, Ordering::SeqCst);
        self.verification.lock().unwrap().clone()
    }

    async fn lookup_phone(&self, _user_id: u64) -> Result<PhoneLookup, RemoteError> {
        self.phone.lock().unwrap().clone()
    }

    async fn associate_phone(&self, user_id: u64, phone: &str) -> Result<(), RemoteError> {
        if self.association_fails.load(Ordering::SeqCst) {
            return Err(transport_error("phone association"));
        }
        self.associated.lock().unwrap().push((user_id, phone.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeGateway {
    sent: Mutex<Vec<(String, String)>>,
    failing: AtomicBool,
}

impl FakeGateway {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last_code(&self) -> Option<String> {
        self.sent.lock().unwrap().last().map(|(_, code)| code.clone())
    }
}

#[async_trait]
impl SmsGateway for FakeGateway {
    async fn send_otp(&self, phone: &str, code: &str) -> Result<(), SmsError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SmsError::Transport("gateway down".into()));
        }
        self.sent.lock().unwrap().push((phone.to_string(), code.to_string()));
        Ok(())
    }
}

/// Shared state of every popup a [`FakeBrowser`] opens
pub struct PopupState {
    closed: AtomicBool,
    close_calls: AtomicUsize,
    location: Mutex<Result<Url, PopupError>>,
}

impl PopupState {
    pub fn set_closed(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn set_location(&self, location: Result<Url, PopupError>) {
        *self.location.lock().unwrap() = location;
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

struct FakePopup(Arc<PopupState>);

impl Popup for FakePopup {
    fn is_closed(&self) -> bool {
        self.0.closed.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.0.close_calls.fetch_add(1, Ordering::SeqCst);
        self.0.closed.store(true, Ordering::SeqCst);
    }

    fn location(&self) -> Result<Url, PopupError> {
        self.0.location.lock().unwrap().clone()
    }
}

pub struct FakeBrowser {
    bus: MessageBus,
    blocked: AtomicBool,
    opened: Mutex<Vec<(Url, WindowSpec)>>,
    popup: Arc<PopupState>,
}

impl Default for FakeBrowser {
    fn default() -> Self {
        Self {
            bus: MessageBus::default(),
            blocked: AtomicBool::new(false),
            opened: Mutex::new(vec![]),
            popup: Arc::new(PopupState {
                closed: AtomicBool::new(false),
                close_calls: AtomicUsize::new(0),
                // Provider pages are cross-origin until they redirect back
                location: Mutex::new(Err(PopupError::CrossOrigin)),
            }),
        }
    }
}

impl FakeBrowser {
    pub fn block_popups(&self) {
        self.blocked.store(true, Ordering::SeqCst);
    }

    pub fn popup(&self) -> &PopupState {
        &self.popup
    }

    pub fn opened(&self) -> Vec<(Url, WindowSpec)> {
        self.opened.lock().unwrap().clone()
    }

    pub fn open_count(&self) -> usize {
        self.opened.lock().unwrap().len()
    }

    /// Token carried by the most recently opened window
    pub fn last_token(&self) -> Option<String> {
        let opened = self.opened.lock().unwrap();
        let (url, _) = opened.last()?;
        url.query_pairs()
            .find(|(key, _)| key == "token")
            .map(|(_, value)| value.into_owned())
    }

    /// Answer the pending login as the provider would, from our own origin
    pub fn reply(&self, data: Value) -> usize {
        let mut message = PostedMessage::new(ORIGIN, data);
        message.correlation_token = self.last_token();
        self.bus.post(message)
    }
}

impl Browser for FakeBrowser {
    fn origin(&self) -> &str {
        ORIGIN
    }

    fn open(&self, url: &Url, spec: WindowSpec) -> Option<Box<dyn Popup>> {
        self.opened.lock().unwrap().push((url.clone(), spec));
        if self.blocked.load(Ordering::SeqCst) {
            return None;
        }
        Some(Box::new(FakePopup(self.popup.clone())))
    }

    fn messages(&self) -> &MessageBus {
        &self.bus
    }
}
