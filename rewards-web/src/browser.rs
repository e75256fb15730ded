// rewards-web/src/browser.rs
use rewards_core::auth::{Browser, MessageBus, Popup, PopupError, WindowSpec};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::process::Command;
use url::Url;

/// The login tab currently awaiting the provider, if any
///
/// A launched system-browser tab cannot be watched, so the dashboard reports
/// an abandoned login here and the handshake sees the tab as closed.
#[derive(Debug, Clone, Default)]
pub struct LoginTabs {
    pending: Arc<Mutex<Option<Arc<AtomicBool>>>>,
}

impl LoginTabs {
    fn track(&self) -> Arc<AtomicBool> {
        let closed = Arc::new(AtomicBool::new(false));
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = pending.replace(closed.clone()) {
            previous.store(true, Ordering::SeqCst);
        }
        closed
    }

    /// Marks the pending login tab closed; false when nothing was pending
    pub fn abandon(&self) -> bool {
        let pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner).take();
        match pending {
            Some(closed) => !closed.swap(true, Ordering::SeqCst),
            None => false,
        }
    }
}

/// Opens the identity provider in the user's default browser
///
/// Replies come back through `/auth-callback`, which posts them on the bus.
pub struct SystemBrowser {
    origin: String,
    opener: String,
    bus: MessageBus,
    tabs: LoginTabs,
}

impl SystemBrowser {
    pub fn new(origin: impl Into<String>, opener: impl Into<String>, bus: MessageBus, tabs: LoginTabs) -> Self {
        Self {
            origin: origin.into().trim_end_matches('/').to_string(),
            opener: opener.into(),
            bus,
            tabs,
        }
    }
}

/// A browser tab we launched but cannot observe
struct DetachedTab {
    closed: Arc<AtomicBool>,
}

impl Popup for DetachedTab {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn close(&self) {
        tracing::debug!("Browser tab left open, it cannot be closed from here");
        self.closed.store(true, Ordering::SeqCst);
    }

    fn location(&self) -> Result<Url, PopupError> {
        Err(PopupError::CrossOrigin)
    }
}

impl Browser for SystemBrowser {
    fn origin(&self) -> &str {
        &self.origin
    }

    fn open(&self, url: &Url, spec: WindowSpec) -> Option<Box<dyn Popup>> {
        // No invisible windows here; a declined silent check keeps the session
        if spec == WindowSpec::SILENT {
            return None;
        }

        match Command::new(&self.opener).arg(url.as_str()).spawn() {
            Ok(_) => {
                tracing::info!("Opened {} in the system browser", spec.name);
                Some(Box::new(DetachedTab {
                    closed: self.tabs.track(),
                }))
            }
            Err(e) => {
                tracing::error!("Failed to launch '{}': {}", self.opener, e);
                None
            }
        }
    }

    fn messages(&self) -> &MessageBus {
        &self.bus
    }
}
