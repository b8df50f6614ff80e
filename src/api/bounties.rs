//! Bounty API Endpoints
//!
//! Reads are public. Every mutation requires a wallet-authenticated caller,
//! who becomes the actor of the lifecycle action.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::{error_response, ApiState, AuthenticatedUser};
use crate::bounty::{
    Bounty, BountyComment, BountyFilter, BountyStatus, BountySubmission, Completion, CreateBounty,
};

type ApiResult<T> = Result<T, (StatusCode, String)>;

#[derive(Debug, Default, Deserialize)]
pub struct ListBountiesQuery {
    pub creator: Option<String>,
    pub hunter: Option<String>,
    pub status: Option<String>,
}

impl ListBountiesQuery {
    fn into_filter(self) -> crate::error::Result<BountyFilter> {
        Ok(BountyFilter {
            creator_id: self.creator,
            hunter_id: self.hunter,
            status: self
                .status
                .as_deref()
                .map(str::parse::<BountyStatus>)
                .transpose()?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct SubmitWorkRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct DisputeRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct ResolveDisputeRequest {
    pub winner: String,
    pub resolution: String,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub content: String,
}

// Reads

/// GET /bounties - List bounties, newest first
pub async fn list_bounties(
    State(state): State<ApiState>,
    Query(query): Query<ListBountiesQuery>,
) -> ApiResult<Json<Vec<Bounty>>> {
    let filter = query.into_filter().map_err(error_response)?;
    let bounties = state
        .lifecycle
        .list_bounties(filter)
        .await
        .map_err(error_response)?;
    Ok(Json(bounties))
}

/// GET /bounties/{id}
pub async fn get_bounty(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Bounty>> {
    let bounty = state.lifecycle.get_bounty(id).await.map_err(error_response)?;
    Ok(Json(bounty))
}

/// GET /bounties/{id}/submissions
pub async fn list_submissions(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<BountySubmission>>> {
    let submissions = state
        .lifecycle
        .list_submissions(id)
        .await
        .map_err(error_response)?;
    Ok(Json(submissions))
}

/// GET /bounties/{id}/comments
pub async fn list_comments(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Vec<BountyComment>>> {
    let comments = state
        .lifecycle
        .list_comments(id)
        .await
        .map_err(error_response)?;
    Ok(Json(comments))
}

// Lifecycle actions

/// POST /bounties
pub async fn create_bounty(
    State(state): State<ApiState>,
    user: AuthenticatedUser,
    Json(request): Json<CreateBounty>,
) -> ApiResult<(StatusCode, Json<Bounty>)> {
    let bounty = state
        .lifecycle
        .create_bounty(user.address(), request)
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(bounty)))
}

/// POST /bounties/{id}/claim
pub async fn claim_bounty(
    State(state): State<ApiState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Bounty>> {
    let bounty = state
        .lifecycle
        .claim(user.address(), id)
        .await
        .map_err(error_response)?;
    Ok(Json(bounty))
}

/// POST /bounties/{id}/submit
pub async fn submit_work(
    State(state): State<ApiState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(request): Json<SubmitWorkRequest>,
) -> ApiResult<(StatusCode, Json<BountySubmission>)> {
    let submission = state
        .lifecycle
        .submit(user.address(), id, &request.content)
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(submission)))
}

/// POST /bounties/{id}/complete
pub async fn complete_bounty(
    State(state): State<ApiState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<Completion>> {
    let completion = state
        .lifecycle
        .complete(user.address(), id)
        .await
        .map_err(error_response)?;
    Ok(Json(completion))
}

/// POST /bounties/{id}/dispute
pub async fn dispute_bounty(
    State(state): State<ApiState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(request): Json<DisputeRequest>,
) -> ApiResult<Json<Bounty>> {
    let bounty = state
        .lifecycle
        .dispute(user.address(), id, &request.reason)
        .await
        .map_err(error_response)?;
    Ok(Json(bounty))
}

/// POST /bounties/{id}/resolve - Arbiter only
pub async fn resolve_dispute(
    State(state): State<ApiState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(request): Json<ResolveDisputeRequest>,
) -> ApiResult<Json<Completion>> {
    let completion = state
        .disputes
        .resolve(user.address(), id, &request.winner, &request.resolution)
        .await
        .map_err(error_response)?;
    Ok(Json(completion))
}

/// POST /bounties/{id}/comments
pub async fn add_comment(
    State(state): State<ApiState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(request): Json<CommentRequest>,
) -> ApiResult<(StatusCode, Json<BountyComment>)> {
    let comment = state
        .lifecycle
        .add_comment(user.address(), id, &request.content)
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// Create the bounty router
pub fn create_bounty_router(state: ApiState) -> Router {
    Router::new()
        .route("/bounties", get(list_bounties).post(create_bounty))
        .route("/bounties/{id}", get(get_bounty))
        .route("/bounties/{id}/claim", post(claim_bounty))
        .route("/bounties/{id}/submit", post(submit_work))
        .route("/bounties/{id}/complete", post(complete_bounty))
        .route("/bounties/{id}/dispute", post(dispute_bounty))
        .route("/bounties/{id}/resolve", post(resolve_dispute))
        .route("/bounties/{id}/submissions", get(list_submissions))
        .route(
            "/bounties/{id}/comments",
            get(list_comments).post(add_comment),
        )
        .with_state(state)
}
