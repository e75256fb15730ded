// rewards-core/src/auth/browser.rs
use common::messages::PostedMessage;
use tokio::sync::broadcast;
use url::Url;

/// Geometry and name of a browsing context opened for the identity provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSpec {
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
}

impl WindowSpec {
    pub const LOGIN: WindowSpec = WindowSpec {
        name: "authPopup",
        width: 600,
        height: 600,
    };

    /// Near-invisible window used for silent revalidation
    pub const SILENT: WindowSpec = WindowSpec {
        name: "authCheckPopup",
        width: 1,
        height: 1,
    };
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PopupError {
    #[error("popup location is not readable from this origin")]
    CrossOrigin,
    #[error("popup has been closed")]
    Closed,
}

/// Handle to an opened browsing context
pub trait Popup: Send + Sync {
    fn is_closed(&self) -> bool;
    fn close(&self);
    fn location(&self) -> Result<Url, PopupError>;
}

/// Where popups are opened and messages arrive
pub trait Browser: Send + Sync {
    /// Origin this side of the handshake runs on, e.g. `http://127.0.0.1:8081`
    fn origin(&self) -> &str;

    /// `None` when the context could not be opened (blocked)
    fn open(&self, url: &Url, spec: WindowSpec) -> Option<Box<dyn Popup>>;

    fn messages(&self) -> &MessageBus;
}

impl<B: Browser + ?Sized> Browser for std::sync::Arc<B> {
    fn origin(&self) -> &str {
        (**self).origin()
    }

    fn open(&self, url: &Url, spec: WindowSpec) -> Option<Box<dyn Popup>> {
        (**self).open(url, spec)
    }

    fn messages(&self) -> &MessageBus {
        (**self).messages()
    }
}

/// Cross-context message channel
///
/// Every subscriber is one listener; dropping the receiver deregisters it.
#[derive(Debug, Clone)]
pub struct MessageBus {
    tx: broadcast::Sender<PostedMessage>,
}

impl MessageBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Deliver to every current listener; returns how many received it
    pub fn post(&self, message: PostedMessage) -> usize {
        match self.tx.send(message) {
            Ok(listeners) => listeners,
            Err(_) => {
                tracing::debug!("Posted message dropped, nobody is listening");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PostedMessage> {
        self.tx.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new(16)
    }
}
