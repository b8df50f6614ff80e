//! HTTP API
//!
//! Provides REST endpoints under `/api/v1` for:
//! - Bounties (lifecycle actions, submissions, comments)
//! - Reputation (scores, badges, admin adjustments)
//! - Users (profiles)
//!
//! Handlers are thin: they extract the caller and arguments, call the domain
//! component and map [`BountyError`] onto an HTTP status.

pub mod bounties;
pub mod middleware;
pub mod reputation;
pub mod users;

use axum::{http::StatusCode, middleware as axum_middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::bounty::{DisputeResolver, LifecycleManager};
use crate::content::ContentStore;
use crate::database::Store;
use crate::error::{BountyError, Result};
use crate::identity::IdentityResolver;

pub use middleware::{
    body_size_middleware, logging_middleware, rate_limit_middleware, security_headers_middleware,
    wallet_auth_middleware, AuthenticatedUser, RateLimiter, SecurityMiddlewareConfig,
    SecurityState,
};

/// Shared state for every API router
#[derive(Clone)]
pub struct ApiState {
    pub lifecycle: Arc<LifecycleManager>,
    pub disputes: Arc<DisputeResolver>,
    pub identity: IdentityResolver,
    /// `None` disables administrative endpoints
    pub admin_api_key: Option<String>,
}

impl ApiState {
    pub fn new(
        store: Arc<dyn Store>,
        content: Arc<dyn ContentStore>,
        completion_points: i64,
        arbiter: &str,
    ) -> Result<Self> {
        let lifecycle = Arc::new(
            LifecycleManager::new(store.clone(), content).with_completion_points(completion_points),
        );
        let disputes = Arc::new(DisputeResolver::new(lifecycle.clone(), arbiter)?);
        Ok(Self {
            lifecycle,
            disputes,
            identity: IdentityResolver::new(store),
            admin_api_key: None,
        })
    }

    pub fn with_admin_api_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.admin_api_key = (!key.is_empty()).then_some(key);
        self
    }
}

/// Map a domain error onto the response the API returns for it
pub fn error_response(err: BountyError) -> (StatusCode, String) {
    let status = match &err {
        BountyError::Validation(_) => StatusCode::BAD_REQUEST,
        BountyError::Unauthorized(_) => StatusCode::FORBIDDEN,
        BountyError::NotFound { .. } => StatusCode::NOT_FOUND,
        BountyError::InvalidTransition { .. }
        | BountyError::AlreadyClaimed(_)
        | BountyError::AlreadyCompleted(_)
        | BountyError::Conflict { .. } => StatusCode::CONFLICT,
        BountyError::Content(_) => StatusCode::BAD_GATEWAY,
        BountyError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    };

    if status.is_server_error() {
        error!(status = status.as_u16(), error = %err, "Request failed");
    }
    (status, err.to_string())
}

/// Assemble the full application: versioned API, health check and the
/// middleware stack (order matters, outermost last).
pub fn create_app(state: ApiState, security: SecurityState, enable_cors: bool) -> Router {
    let api = Router::new()
        .merge(bounties::create_bounty_router(state.clone()))
        .merge(reputation::create_reputation_router(state.clone()))
        .merge(users::create_user_router(state.clone()))
        .layer(axum_middleware::from_fn_with_state(
            state.identity.clone(),
            wallet_auth_middleware,
        ));

    let app = Router::new()
        .nest("/api/v1", api)
        .route("/health", get(|| async { "OK" }))
        .layer(axum_middleware::from_fn_with_state(
            security.clone(),
            body_size_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            security.clone(),
            rate_limit_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            security,
            logging_middleware,
        ))
        .layer(axum_middleware::from_fn(security_headers_middleware))
        .layer(TraceLayer::new_for_http());

    if enable_cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}
