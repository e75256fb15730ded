// rewards-web/src/callback.rs
use actix_web::{get, web, HttpResponse, Responder};
use common::messages::{HandshakeMessage, PostedMessage};
use serde::Deserialize;
use serde_json::Value;

use crate::state::AppState;

const CLOSE_PAGE: &str = "<!doctype html><html><head><title>Signed in</title></head>\
<body><p>You can close this window and return to the Rewards Center.</p></body></html>";

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    data: Option<String>,
    /// Correlation token the provider echoes back from the login URL
    token: Option<String>,
}

fn error_payload(message: &str) -> Value {
    serde_json::to_value(HandshakeMessage::error(message)).unwrap_or(Value::Null)
}

/// Landing page for the identity provider's redirect
///
/// Whatever arrives in `data` is relayed under the configured public origin
/// together with the echoed token. Request headers never pick the origin; the
/// pending handshake drops anything whose token is not its own.
#[get("/auth-callback")]
pub async fn auth_callback(query: web::Query<CallbackQuery>, state: web::Data<AppState>) -> impl Responder {
    let query = query.into_inner();

    let data = match query.data.as_deref() {
        Some(raw) => serde_json::from_str::<Value>(raw).unwrap_or_else(|e| {
            tracing::warn!("Auth callback carried unparseable data: {}", e);
            error_payload("Invalid callback data")
        }),
        None => {
            tracing::warn!("Auth callback without data");
            error_payload("Missing callback data")
        }
    };

    let mut message = PostedMessage::new(state.origin.clone(), data);
    match query.token {
        Some(token) => message = message.with_token(token),
        None => tracing::warn!("Auth callback without a correlation token"),
    }

    let listeners = state.bus.post(message);
    tracing::info!("Relayed auth callback to {} listener(s)", listeners);

    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(CLOSE_PAGE)
}
