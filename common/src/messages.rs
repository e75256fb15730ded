// common/src/messages.rs
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A message delivered over the cross-context channel, tagged with the origin that sent it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostedMessage {
    pub origin: String,
    pub data: Value,
    /// Token echoed back by the provider; a handshake only accepts its own
    #[serde(default)]
    pub correlation_token: Option<String>,
}

impl PostedMessage {
    pub fn new(origin: impl Into<String>, data: Value) -> Self {
        Self {
            origin: origin.into(),
            data,
            correlation_token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.correlation_token = Some(token.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthStatus {
    Success,
    Error,
}

/// Payload the identity provider relays after a login attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandshakeMessage {
    pub status: AuthStatus,
    #[serde(rename = "userData", default)]
    pub user_data: Option<Vec<ProviderUser>>,
    #[serde(default)]
    pub message: Option<String>,
}

impl HandshakeMessage {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: AuthStatus::Error,
            user_data: None,
            message: Some(message.into()),
        }
    }
}

/// User as reported by the identity provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderUser {
    /// Numeric, or a numeric string; anything else counts as missing
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl ProviderUser {
    pub fn numeric_id(&self) -> Option<u64> {
        match self.id.as_ref()? {
            Value::Number(n) => n.as_u64().filter(|id| *id != 0),
            Value::String(s) => s.trim().parse::<u64>().ok().filter(|id| *id != 0),
            _ => None,
        }
    }

    /// Both display fields present and non-blank
    pub fn is_complete(&self) -> bool {
        let present = |field: &Option<String>| field.as_deref().map_or(false, |v| !v.trim().is_empty());
        present(&self.name) && present(&self.email)
    }
}

/// `POST <status-endpoint>` and `POST <phone-endpoint>` lookup body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRequest {
    pub user_id: u64,
}

/// One entry of the remote status feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusFeedEntry {
    #[serde(default)]
    pub user_id: Option<Value>,
    #[serde(default)]
    pub action_type: Option<Value>,
}

/// `POST <verify-endpoint>/<platform>` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub user_id: u64,
    pub image_url: String,
}

/// `POST <phone-endpoint>` association body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhoneAssociation {
    pub user_id: u64,
    pub phone: String,
}

/// Request understood by the HTTP SMS gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsSendRequest {
    pub api_token: String,
    pub recipient: String,
    pub sender_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}
