// rewards-core/src/sms.rs
use async_trait::async_trait;
use common::config::SmsConfig;
use common::fingerprint;
use common::messages::SmsSendRequest;
use serde::Deserialize;

use crate::error::SmsError;

/// Delivers a passcode to a phone
#[async_trait]
pub trait SmsGateway: Send + Sync {
    async fn send_otp(&self, phone: &str, code: &str) -> Result<(), SmsError>;
}

#[derive(Debug, Deserialize)]
struct GatewayReply {
    status: Option<String>,
    message: Option<String>,
}

/// HTTP SMS gateway taking `{api_token, recipient, sender_id, type, message}`
pub struct HttpSmsGateway {
    http: reqwest::Client,
    config: SmsConfig,
}

impl HttpSmsGateway {
    pub fn new(config: SmsConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn render_message(&self, code: &str) -> String {
        self.config.message_template.replace("{code}", code)
    }
}

#[async_trait]
impl SmsGateway for HttpSmsGateway {
    async fn send_otp(&self, phone: &str, code: &str) -> Result<(), SmsError> {
        let request = SmsSendRequest {
            api_token: self.config.api_token.clone(),
            recipient: phone.to_string(),
            sender_id: self.config.sender_id.clone(),
            kind: "otp".to_string(),
            message: self.render_message(code),
        };

        let response = self
            .http
            .post(&self.config.api_url)
            .header("Accept", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| SmsError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SmsError::Rejected(format!("HTTP {}", response.status().as_u16())));
        }

        let reply: GatewayReply = response
            .json()
            .await
            .map_err(|e| SmsError::Rejected(format!("unreadable reply: {}", e)))?;

        match reply.status.as_deref() {
            Some("success") => {
                tracing::info!("OTP dispatched to phone {}", fingerprint(phone));
                Ok(())
            }
            _ => Err(SmsError::Rejected(
                reply.message.unwrap_or_else(|| "gateway did not report success".to_string()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_message_substitutes_code() {
        let gateway = HttpSmsGateway::new(SmsConfig {
            message_template: "Code {code}, valid once".into(),
            ..SmsConfig::default()
        });
        assert_eq!(gateway.render_message("012345"), "Code 012345, valid once");
    }
}
