// rewards-web/src/api/phone.rs
use actix_web::{get, post, web, HttpResponse};
use rewards_core::OtpState;
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PhoneRequest {
    pub phone: String,
}

#[derive(Debug, Deserialize)]
pub struct CodeRequest {
    pub code: String,
}

#[get("/phone/status")]
pub async fn phone_status(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let required = state.orchestrator.phone_required().await?;
    Ok(HttpResponse::Ok().json(json!({ "phone_required": required })))
}

#[post("/phone/otp")]
pub async fn request_otp(
    body: web::Json<PhoneRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let mut slot = state.phone_flow.lock().await;

    // Start over when there is no dialog yet or it belongs to someone else
    let fresh = state.orchestrator.phone_flow()?;
    if !matches!(slot.as_ref(), Some(flow) if flow.user_id() == fresh.user_id()) {
        *slot = Some(fresh);
    }

    let flow = slot.as_mut().ok_or(ApiError::NoPhoneFlow)?;
    flow.submit_phone(&body.phone).await?;
    Ok(HttpResponse::Ok().json(json!({
        "status": "code_sent",
        "message": "A verification code has been sent"
    })))
}

#[post("/phone/verify")]
pub async fn verify_otp(
    body: web::Json<CodeRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let mut slot = state.phone_flow.lock().await;
    let flow = slot.as_mut().ok_or(ApiError::NoPhoneFlow)?;
    flow.submit_code(&body.code).await?;

    let phone = match flow.state() {
        OtpState::Verified { phone } => phone.clone(),
        _ => return Err(ApiError::NoPhoneFlow),
    };
    *slot = None;

    Ok(HttpResponse::Ok().json(json!({
        "status": "verified",
        "phone": phone
    })))
}

#[post("/phone/cancel")]
pub async fn cancel(state: web::Data<AppState>) -> HttpResponse {
    if let Some(mut flow) = state.phone_flow.lock().await.take() {
        flow.cancel();
    }
    HttpResponse::Ok().json(json!({ "status": "cancelled" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::test_app;
    use actix_web::{http::StatusCode, test, App};
    use rewards_core::remote::PhoneLookup;
    use serde_json::Value;

    #[actix_web::test]
    async fn test_otp_round_trip_associates_phone() {
        let app = test_app(true).await;
        let service = test::init_service(
            App::new().app_data(app.state.clone()).configure(crate::api::configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/phone/status").to_request();
        let body: Value = test::call_and_read_body_json(&service, req).await;
        assert_eq!(body["phone_required"], true);

        let req = test::TestRequest::post()
            .uri("/api/phone/otp")
            .set_json(json!({"phone": "+94711111111"}))
            .to_request();
        assert_eq!(test::call_service(&service, req).await.status(), StatusCode::OK);

        let code = app.gateway.last_code().expect("code sent");
        let req = test::TestRequest::post()
            .uri("/api/phone/verify")
            .set_json(json!({"code": code}))
            .to_request();
        let body: Value = test::call_and_read_body_json(&service, req).await;
        assert_eq!(body["status"], "verified");
        assert_eq!(app.api.associated(), vec![(5, "+94711111111".to_string())]);
        assert!(app.state.phone_flow.lock().await.is_none());

        app.api.set_phone(Ok(PhoneLookup::Found));
        let req = test::TestRequest::get().uri("/api/phone/status").to_request();
        let body: Value = test::call_and_read_body_json(&service, req).await;
        assert_eq!(body["phone_required"], false);
    }

    #[actix_web::test]
    async fn test_bad_inputs_are_rejected() {
        let app = test_app(true).await;
        let service = test::init_service(
            App::new().app_data(app.state.clone()).configure(crate::api::configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/phone/verify")
            .set_json(json!({"code": "123456"}))
            .to_request();
        assert_eq!(test::call_service(&service, req).await.status(), StatusCode::CONFLICT);

        let req = test::TestRequest::post()
            .uri("/api/phone/otp")
            .set_json(json!({"phone": "+9471"}))
            .to_request();
        assert_eq!(test::call_service(&service, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri("/api/phone/otp")
            .set_json(json!({"phone": "+94711111111"}))
            .to_request();
        assert_eq!(test::call_service(&service, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::post()
            .uri("/api/phone/verify")
            .set_json(json!({"code": "12ab56"}))
            .to_request();
        assert_eq!(test::call_service(&service, req).await.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_delivery_failure_is_bad_gateway_and_cancel_discards() {
        let app = test_app(true).await;
        app.gateway.set_failing(true);
        let service = test::init_service(
            App::new().app_data(app.state.clone()).configure(crate::api::configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/phone/otp")
            .set_json(json!({"phone": "+94711111111"}))
            .to_request();
        assert_eq!(test::call_service(&service, req).await.status(), StatusCode::BAD_GATEWAY);

        app.gateway.set_failing(false);
        let req = test::TestRequest::post()
            .uri("/api/phone/otp")
            .set_json(json!({"phone": "+94711111111"}))
            .to_request();
        assert_eq!(test::call_service(&service, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::post().uri("/api/phone/cancel").to_request();
        assert_eq!(test::call_service(&service, req).await.status(), StatusCode::OK);
        assert!(app.otp.current().is_none());
    }

    #[actix_web::test]
    async fn test_phone_endpoints_require_login() {
        let app = test_app(false).await;
        let service = test::init_service(
            App::new().app_data(app.state.clone()).configure(crate::api::configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/phone/otp")
            .set_json(json!({"phone": "+94711111111"}))
            .to_request();
        assert_eq!(test::call_service(&service, req).await.status(), StatusCode::UNAUTHORIZED);
    }
}
