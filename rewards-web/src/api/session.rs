// rewards-web/src/api/session.rs
use actix_web::{get, post, web, HttpResponse};
use serde_json::json;

use crate::error::ApiError;
use crate::state::AppState;

#[get("/session")]
pub async fn get_session(state: web::Data<AppState>) -> HttpResponse {
    let session = state.sessions().current();
    HttpResponse::Ok().json(json!({
        "logged_in": session.is_some(),
        "session": session,
    }))
}

// Blocks until the identity provider answers or the login window times out
#[post("/login")]
pub async fn login(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let session = state.sessions().login().await?;
    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "session": session,
        "rewards": state.orchestrator.snapshot(),
    })))
}

/// The dashboard's "cancel" for a login whose browser tab was closed
#[post("/login/cancel")]
pub async fn cancel_login(state: web::Data<AppState>) -> HttpResponse {
    let pending = state.login_tabs.abandon();
    if pending {
        tracing::info!("Pending login abandoned by the user");
    }
    HttpResponse::Ok().json(json!({
        "status": "cancelled",
        "pending": pending,
    }))
}

#[post("/logout")]
pub async fn logout(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    // An open phone dialog belongs to the departing user
    if let Some(mut flow) = state.phone_flow.lock().await.take() {
        flow.cancel();
    }
    state.sessions().logout()?;
    Ok(HttpResponse::Ok().json(json!({
        "status": "success",
        "message": "Logged out"
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::{system_browser_app, test_app};
    use actix_web::{http::StatusCode, test, App};
    use serde_json::Value;
    use std::time::Duration;

    #[actix_web::test]
    async fn test_session_reports_login_state() {
        let app = test_app(true).await;
        let service = test::init_service(
            App::new().app_data(app.state.clone()).configure(crate::api::configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/session").to_request();
        let body: Value = test::call_and_read_body_json(&service, req).await;
        assert_eq!(body["logged_in"], true);
        assert_eq!(body["session"]["user_id"], 5);

        let req = test::TestRequest::post().uri("/api/logout").to_request();
        let resp = test::call_service(&service, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::get().uri("/api/session").to_request();
        let body: Value = test::call_and_read_body_json(&service, req).await;
        assert_eq!(body["logged_in"], false);
        assert_eq!(body["session"], Value::Null);
    }

    #[actix_web::test]
    async fn test_login_through_callback_message() {
        let app = test_app(false).await;
        let service = test::init_service(
            App::new().app_data(app.state.clone()).configure(crate::api::configure),
        )
        .await;

        let browser = app.browser.clone();
        actix_web::rt::spawn(async move {
            actix_web::rt::time::sleep(Duration::from_millis(50)).await;
            browser.reply(serde_json::json!({"status": "success", "userData": [{"id": 8, "name": "Lin", "email": "lin@example.com"}]}));
        });

        let req = test::TestRequest::post().uri("/api/login").to_request();
        let body: Value = test::call_and_read_body_json(&service, req).await;
        assert_eq!(body["session"]["user_id"], 8);
        assert_eq!(body["rewards"]["total_points"], 0);
    }

    #[actix_web::test]
    async fn test_blocked_login_is_unauthorized() {
        let app = test_app(false).await;
        app.browser.block_popups();
        let service = test::init_service(
            App::new().app_data(app.state.clone()).configure(crate::api::configure),
        )
        .await;

        let req = test::TestRequest::post().uri("/api/login").to_request();
        let resp = test::call_service(&service, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_cancel_releases_pending_login() {
        let state = system_browser_app();
        let service = test::init_service(App::new().app_data(state.clone()).configure(crate::api::configure)).await;

        let sessions = state.sessions().clone();
        let pending = actix_web::rt::spawn(async move { sessions.login().await });
        actix_web::rt::time::sleep(Duration::from_millis(50)).await;

        let req = test::TestRequest::post().uri("/api/login").to_request();
        assert_eq!(test::call_service(&service, req).await.status(), StatusCode::CONFLICT);

        let req = test::TestRequest::post().uri("/api/login/cancel").to_request();
        let body: Value = test::call_and_read_body_json(&service, req).await;
        assert_eq!(body["pending"], true);

        let result = actix_web::rt::time::timeout(Duration::from_secs(5), pending)
            .await
            .expect("login released by the poll")
            .expect("join");
        assert!(result.is_err());
        assert_eq!(state.sessions().current(), None);
    }

    #[actix_web::test]
    async fn test_cancel_without_pending_login() {
        let app = test_app(false).await;
        let service = test::init_service(
            App::new().app_data(app.state.clone()).configure(crate::api::configure),
        )
        .await;

        let req = test::TestRequest::post().uri("/api/login/cancel").to_request();
        let body: Value = test::call_and_read_body_json(&service, req).await;
        assert_eq!(body["status"], "cancelled");
        assert_eq!(body["pending"], false);
    }
}
