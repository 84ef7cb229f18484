// handler/admin.rs
use std::sync::Arc;

use axum::{
    extract::Query,
    response::IntoResponse,
    routing::get,
    Extension, Json, Router,
};
use validator::Validate;

use crate::{
    db::{query_timeout::QueryTimeout, rewarddb::LedgerError},
    dtos::referraldtos::{ReferralApiResponse, RewardListQueryDto, RewardListResponseDto, RewardStatsQueryDto},
    error::HttpError,
    models::policymodel::RewardPolicy,
    service::error::ServiceError,
    utils::email::normalize_email,
    AppState,
};

const DEFAULT_PAGE_SIZE: usize = 10;

pub fn admin_handler() -> Router {
    Router::new()
        .route("/rewards", get(get_rewards))
        .route("/stats", get(get_reward_stats))
        .route("/policy", get(get_policy).put(update_policy))
}

pub async fn get_rewards(
    Query(query_params): Query<RewardListQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    query_params.validate()
        .map_err(|e| HttpError::bad_request(e.to_string()))?;

    let page = query_params.page.unwrap_or(1);
    let limit = query_params.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    let filter = query_params.filter();

    let rewards = QueryTimeout::run(
        app_state.env.ledger_timeout,
        app_state.ledger.list_rewards(&filter, page, limit),
    )
    .await
    .map_err(ledger_error)?;

    Ok(Json(RewardListResponseDto {
        status: "success".to_string(),
        results: rewards.len(),
        rewards,
        page,
        limit,
    }))
}

pub async fn get_reward_stats(
    Query(query_params): Query<RewardStatsQueryDto>,
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let referrer_email = query_params
        .referrer_email
        .as_deref()
        .map(normalize_email)
        .filter(|email| !email.is_empty());

    let stats = QueryTimeout::run(
        app_state.env.ledger_timeout,
        app_state.ledger.reward_stats(referrer_email.as_deref()),
    )
    .await
    .map_err(ledger_error)?;

    Ok(Json(ReferralApiResponse::success("Reward statistics", stats)))
}

pub async fn get_policy(
    Extension(app_state): Extension<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpError> {
    let policy = app_state.policy_store.snapshot();

    Ok(Json(ReferralApiResponse::success("Current reward policy", (*policy).clone())))
}

/// Replaces the policy for events that start after this call.
pub async fn update_policy(
    Extension(app_state): Extension<Arc<AppState>>,
    Json(body): Json<RewardPolicy>,
) -> Result<impl IntoResponse, HttpError> {
    body.check().map_err(HttpError::bad_request)?;

    app_state.policy_store.replace(body.clone());
    tracing::info!(
        "Reward policy updated: custom mode {}, tiered {}, threshold {}",
        body.custom_mode_enabled,
        body.enable_tiered_referrals,
        body.tier_threshold
    );

    Ok(Json(ReferralApiResponse::success("Reward policy updated", body)))
}

fn ledger_error(e: LedgerError) -> HttpError {
    tracing::error!("Reward ledger query failed: {}", e);
    ServiceError::from(e).into()
}
