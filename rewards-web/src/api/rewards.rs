// rewards-web/src/api/rewards.rs
use actix_web::{get, post, web, HttpResponse};
use common::models::{Platform, RewardHistoryRecord};
use rewards_core::VerifyOutcome;
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    /// Where the uploaded screenshot lives
    pub image_url: String,
}

#[get("/rewards")]
pub async fn get_rewards(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.orchestrator.snapshot())
}

#[post("/rewards/refresh")]
pub async fn refresh_rewards(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let snapshot = state.orchestrator.refresh().await?;
    Ok(HttpResponse::Ok().json(snapshot))
}

fn describe(outcome: VerifyOutcome) -> (&'static str, bool, Option<RewardHistoryRecord>) {
    match outcome {
        VerifyOutcome::Claimed(record) => ("claimed", true, Some(record)),
        VerifyOutcome::Restored => ("restored", true, None),
        VerifyOutcome::AlreadyClaimed => ("already_claimed", true, None),
        VerifyOutcome::NotVerified => ("not_verified", false, None),
        VerifyOutcome::Unrecognized => ("unrecognized", false, None),
    }
}

#[post("/rewards/{platform}/verify")]
pub async fn verify_platform(
    path: web::Path<String>,
    body: web::Json<VerifyRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let name = path.into_inner();
    let platform: Platform = name.parse().map_err(|_| ApiError::UnknownPlatform(name.clone()))?;

    let outcome = state
        .orchestrator
        .verify_and_claim(platform, &body.image_url)
        .await?;
    let (label, verified, record) = describe(outcome);

    Ok(HttpResponse::Ok().json(json!({
        "platform": platform,
        "outcome": label,
        "verified": verified,
        "record": record,
        "rewards": state.orchestrator.snapshot(),
    })))
}
