// rewards-core/src/auth/mod.rs
pub mod browser;
pub mod channel;
pub mod session;

pub use self::browser::{Browser, MessageBus, Popup, PopupError, WindowSpec};
pub use self::channel::{AuthChannel, ExternalAuthenticator, HandshakeResult, PopupAuthenticator, SilentCheck};
pub use self::session::{RevalidationHandle, SessionManager};
