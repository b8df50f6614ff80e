//! Reputation API Endpoints
//!
//! Public score lookup plus an admin-only manual adjustment. The adjustment
//! and the badges it earns commit in one transaction, as completion does.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::{error_response, ApiState};
use crate::reputation::{level_for, Badge, Reputation, POINTS_PER_LEVEL};

#[derive(Debug, Serialize)]
pub struct ReputationResponse {
    pub user_id: String,
    pub score: i64,
    pub level: i64,
    /// Points still needed to reach the next level
    pub next_level_in: i64,
    pub badges: Vec<Badge>,
}

impl From<Reputation> for ReputationResponse {
    fn from(reputation: Reputation) -> Self {
        let level = level_for(reputation.score);
        let next_level_at = (level + 1).saturating_mul(POINTS_PER_LEVEL);
        Self {
            next_level_in: next_level_at.saturating_sub(reputation.score).max(0),
            user_id: reputation.user_id,
            score: reputation.score,
            level: reputation.level,
            badges: reputation.badges,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateReputationRequest {
    pub user_id: String,
    pub points: i64,
    pub admin_api_key: String,
}

#[derive(Debug, Serialize)]
pub struct UpdateReputationResponse {
    pub reputation: ReputationResponse,
    pub new_badges: Vec<Badge>,
}

/// GET /reputation/{user_id}
pub async fn get_reputation(
    State(state): State<ApiState>,
    Path(user_id): Path<String>,
) -> Result<Json<ReputationResponse>, (StatusCode, String)> {
    let reputation = state
        .lifecycle
        .ledger()
        .get_reputation(&user_id)
        .await
        .map_err(error_response)?;
    Ok(Json(reputation.into()))
}

/// POST /reputation/update - Admin adjustment
pub async fn update_reputation(
    State(state): State<ApiState>,
    Json(request): Json<UpdateReputationRequest>,
) -> Result<Json<UpdateReputationResponse>, (StatusCode, String)> {
    match &state.admin_api_key {
        Some(key) if *key == request.admin_api_key => {}
        Some(_) => {
            warn!(user_id = %request.user_id, "Invalid admin API key for reputation update");
            return Err((StatusCode::FORBIDDEN, "Invalid admin API key".to_string()));
        }
        None => {
            return Err((
                StatusCode::FORBIDDEN,
                "Admin endpoints are disabled".to_string(),
            ));
        }
    }

    let award = state
        .lifecycle
        .adjust_score(&request.user_id, request.points)
        .await
        .map_err(error_response)?;

    info!(
        user_id = %award.user_id,
        points = request.points,
        score = award.reputation.score,
        "Reputation adjusted by admin"
    );
    Ok(Json(UpdateReputationResponse {
        reputation: award.reputation.into(),
        new_badges: award.new_badges,
    }))
}

/// Create the reputation router
pub fn create_reputation_router(state: ApiState) -> Router {
    Router::new()
        .route("/reputation/update", post(update_reputation))
        .route("/reputation/{user_id}", get(get_reputation))
        .with_state(state)
}
