//! Integration tests for the bounty ledger
//!
//! These tests drive the lifecycle end to end against the in-memory store:
//! concurrent claims, completion crediting, dispute resolution, rollback on
//! partial failure, and the HTTP surface.

use chrono::{Duration, Utc};
use std::sync::Arc;

use bounty_ledger::{
    BountyError, BountyStatus, CreateBounty, DisputeResolver, FailPoint, LifecycleManager,
    MemoryContentStore, MemoryStore, SubmissionStatus, TokenAmount,
};
use bounty_ledger::reputation::level_for;

// ============================================================================
// Test Helpers
// ============================================================================

const CREATOR: &str = "0x1111111111111111111111111111111111111111";
const HUNTER: &str = "0x2222222222222222222222222222222222222222";
const ARBITER: &str = "0x3333333333333333333333333333333333333333";

struct Harness {
    store: MemoryStore,
    lifecycle: Arc<LifecycleManager>,
    disputes: DisputeResolver,
}

fn harness_with_points(points: i64) -> Harness {
    let store = MemoryStore::new();
    let lifecycle = Arc::new(
        LifecycleManager::new(
            Arc::new(store.clone()),
            Arc::new(MemoryContentStore::new()),
        )
        .with_completion_points(points),
    );
    let disputes = DisputeResolver::new(lifecycle.clone(), ARBITER).unwrap();
    Harness {
        store,
        lifecycle,
        disputes,
    }
}

fn harness() -> Harness {
    harness_with_points(50)
}

fn hunter(n: usize) -> String {
    format!("0x{:040x}", 0xa000 + n)
}

fn bounty_request(title: &str) -> CreateBounty {
    CreateBounty {
        external_id: None,
        title: title.to_string(),
        description: "Fix the flaky payment retry".to_string(),
        reward: TokenAmount::from_tokens(250).unwrap(),
        deadline: Utc::now() + Duration::days(7),
    }
}

/// Create a bounty and have `HUNTER` claim it and submit work
async fn claimed_with_submission(h: &Harness) -> i64 {
    let bounty = h
        .lifecycle
        .create_bounty(CREATOR, bounty_request("Retry bug"))
        .await
        .unwrap();
    h.lifecycle.claim(HUNTER, bounty.id).await.unwrap();
    h.lifecycle
        .submit(HUNTER, bounty.id, "https://git.example/pr/42")
        .await
        .unwrap();
    bounty.id
}

// ============================================================================
// Concurrency
// ============================================================================

mod concurrency {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_claims_have_one_winner() {
        let h = harness();
        let bounty = h
            .lifecycle
            .create_bounty(CREATOR, bounty_request("Race me"))
            .await
            .unwrap();

        let tasks: Vec<_> = (0..8)
            .map(|n| {
                let lifecycle = h.lifecycle.clone();
                let id = bounty.id;
                tokio::spawn(async move {
                    let address = hunter(n);
                    let result = lifecycle.claim(&address, id).await;
                    (address, result)
                })
            })
            .collect();
        let results = futures::future::join_all(tasks).await;

        let mut winners = Vec::new();
        for result in results {
            match result.unwrap() {
                (address, Ok(claimed)) => {
                    assert_eq!(claimed.hunter_id.as_deref(), Some(address.as_str()));
                    winners.push(address);
                }
                (_, Err(BountyError::AlreadyClaimed(id))) => assert_eq!(id, bounty.id),
                (_, Err(other)) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(winners.len(), 1);

        let stored = h.lifecycle.get_bounty(bounty.id).await.unwrap();
        assert_eq!(stored.status, BountyStatus::Claimed);
        assert_eq!(stored.hunter_id.as_deref(), Some(winners[0].as_str()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_score_updates_are_not_lost() {
        let h = harness();

        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let lifecycle = h.lifecycle.clone();
                tokio::spawn(async move { lifecycle.ledger().update_score(HUNTER, 50).await })
            })
            .collect();
        for result in futures::future::join_all(tasks).await {
            result.unwrap().unwrap();
        }

        let reputation = h.lifecycle.ledger().get_reputation(HUNTER).await.unwrap();
        assert_eq!(reputation.score, 500);
        assert_eq!(reputation.level, 5);
        assert_eq!(reputation.level, level_for(reputation.score));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_badge_checks_award_once() {
        let h = harness();
        let reputation = h.lifecycle.ledger().update_score(HUNTER, 120).await.unwrap();

        let tasks: Vec<_> = (0..6)
            .map(|_| {
                let lifecycle = h.lifecycle.clone();
                let reputation = reputation.clone();
                tokio::spawn(async move {
                    lifecycle
                        .badges()
                        .check_and_award(HUNTER, &reputation)
                        .await
                })
            })
            .collect();

        let mut awarded = 0;
        for result in futures::future::join_all(tasks).await {
            awarded += result.unwrap().unwrap().len();
        }
        assert_eq!(awarded, 1);
        assert_eq!(h.store.badge_count(HUNTER, "Novice Hunter").await, 1);
    }
}

// ============================================================================
// Completion
// ============================================================================

mod completion {
    use super::*;

    #[tokio::test]
    async fn test_completion_credits_hunter() {
        let h = harness();
        let id = claimed_with_submission(&h).await;

        let completion = h.lifecycle.complete(CREATOR, id).await.unwrap();
        assert_eq!(completion.bounty.status, BountyStatus::Completed);

        let award = completion.award.unwrap();
        assert_eq!(award.user_id, HUNTER);
        assert_eq!(award.points, 50);
        assert_eq!(award.reputation.score, 50);
        assert_eq!(award.reputation.level, 1);
        assert!(award.new_badges.is_empty());

        let submissions = h.lifecycle.list_submissions(id).await.unwrap();
        assert_eq!(submissions.len(), 1);
        assert_eq!(submissions[0].status, SubmissionStatus::Accepted);
    }

    #[tokio::test]
    async fn test_second_completion_awards_novice_badge() {
        let h = harness();
        for _ in 0..2 {
            let id = claimed_with_submission(&h).await;
            h.lifecycle.complete(CREATOR, id).await.unwrap();
        }

        let reputation = h.lifecycle.ledger().get_reputation(HUNTER).await.unwrap();
        assert_eq!(reputation.score, 100);
        assert_eq!(reputation.level, 1);
        assert_eq!(reputation.badges.len(), 1);
        assert!(reputation.has_badge("Novice Hunter"));
        assert!(!reputation.has_badge("Skilled Hunter"));
    }

    #[tokio::test]
    async fn test_double_completion_credits_once() {
        let h = harness();
        let id = claimed_with_submission(&h).await;

        h.lifecycle.complete(CREATOR, id).await.unwrap();
        let err = h.lifecycle.complete(CREATOR, id).await.unwrap_err();
        assert!(matches!(err, BountyError::AlreadyCompleted(bounty) if bounty == id));

        let reputation = h.lifecycle.ledger().get_reputation(HUNTER).await.unwrap();
        assert_eq!(reputation.score, 50);
    }

    #[tokio::test]
    async fn test_only_creator_can_complete() {
        let h = harness();
        let id = claimed_with_submission(&h).await;

        let err = h.lifecycle.complete(HUNTER, id).await.unwrap_err();
        assert!(matches!(err, BountyError::Unauthorized(_)));

        let stored = h.lifecycle.get_bounty(id).await.unwrap();
        assert_eq!(stored.status, BountyStatus::Claimed);
    }
}

// ============================================================================
// Disputes
// ============================================================================

mod disputes {
    use super::*;

    #[tokio::test]
    async fn test_hunter_wins_dispute() {
        let h = harness();
        let id = claimed_with_submission(&h).await;
        h.lifecycle
            .dispute(CREATOR, id, "Work does not match the brief")
            .await
            .unwrap();

        let completion = h
            .disputes
            .resolve(ARBITER, id, HUNTER, "Brief was satisfied")
            .await
            .unwrap();
        assert_eq!(completion.bounty.status, BountyStatus::Completed);
        assert_eq!(completion.bounty.dispute_winner.as_deref(), Some(HUNTER));
        assert_eq!(completion.award.unwrap().reputation.score, 50);

        let submissions = h.lifecycle.list_submissions(id).await.unwrap();
        assert_eq!(submissions[0].status, SubmissionStatus::Accepted);
    }

    #[tokio::test]
    async fn test_creator_wins_dispute_without_award() {
        let h = harness();
        let id = claimed_with_submission(&h).await;
        h.lifecycle.dispute(CREATOR, id, "Plagiarised").await.unwrap();

        let completion = h
            .disputes
            .resolve(ARBITER, id, CREATOR, "Copied from another project")
            .await
            .unwrap();
        assert!(completion.award.is_none());

        let reputation = h.lifecycle.ledger().get_reputation(HUNTER).await.unwrap();
        assert_eq!(reputation.score, 0);
        let submissions = h.lifecycle.list_submissions(id).await.unwrap();
        assert_eq!(submissions[0].status, SubmissionStatus::Rejected);
    }

    #[tokio::test]
    async fn test_non_arbiter_cannot_resolve() {
        let h = harness();
        let id = claimed_with_submission(&h).await;
        h.lifecycle.dispute(CREATOR, id, "Late").await.unwrap();

        let err = h
            .disputes
            .resolve(CREATOR, id, CREATOR, "I decide")
            .await
            .unwrap_err();
        assert!(matches!(err, BountyError::Unauthorized(_)));

        let stored = h.lifecycle.get_bounty(id).await.unwrap();
        assert_eq!(stored.status, BountyStatus::Disputed);
    }

    #[tokio::test]
    async fn test_resolve_requires_dispute() {
        let h = harness();
        let id = claimed_with_submission(&h).await;

        let err = h
            .disputes
            .resolve(ARBITER, id, HUNTER, "Nothing to resolve")
            .await
            .unwrap_err();
        assert!(matches!(err, BountyError::InvalidTransition { .. }));
    }
}

// ============================================================================
// Rollback
// ============================================================================

mod rollback {
    use super::*;

    async fn assert_untouched(h: &Harness, id: i64) {
        let stored = h.lifecycle.get_bounty(id).await.unwrap();
        assert_eq!(stored.status, BountyStatus::Claimed);
        let reputation = h.lifecycle.ledger().get_reputation(HUNTER).await.unwrap();
        assert_eq!(reputation.score, 0);
        let submissions = h.lifecycle.list_submissions(id).await.unwrap();
        assert_eq!(submissions[0].status, SubmissionStatus::Pending);
    }

    #[tokio::test]
    async fn test_failed_score_write_leaves_bounty_claimed() {
        let h = harness();
        let id = claimed_with_submission(&h).await;

        h.store.fail_on(FailPoint::SaveReputation);
        let err = h.lifecycle.complete(CREATOR, id).await.unwrap_err();
        assert!(matches!(err, BountyError::StoreUnavailable(_)));
        h.store.clear_failures();

        assert_untouched(&h, id).await;
        // retry succeeds once the store recovers
        let completion = h.lifecycle.complete(CREATOR, id).await.unwrap();
        assert_eq!(completion.award.unwrap().reputation.score, 50);
    }

    #[tokio::test]
    async fn test_failed_commit_writes_nothing() {
        let h = harness_with_points(100);
        let id = claimed_with_submission(&h).await;

        h.store.fail_on(FailPoint::Commit);
        assert!(h.lifecycle.complete(CREATOR, id).await.is_err());
        h.store.clear_failures();

        assert_untouched(&h, id).await;
        assert_eq!(h.store.badge_count(HUNTER, "Novice Hunter").await, 0);
    }
}

// ============================================================================
// HTTP API
// ============================================================================

mod http_api {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
        Router,
    };
    use bounty_ledger::api::{create_app, ApiState, SecurityMiddlewareConfig, SecurityState};
    use bounty_ledger::Store;
    use tower::ServiceExt;

    const ADMIN_KEY: &str = "0123456789abcdef0123456789abcdef";

    fn app_with(store: MemoryStore, admin_key: Option<&str>) -> Router {
        let mut state = ApiState::new(
            Arc::new(store),
            Arc::new(MemoryContentStore::new()),
            50,
            ARBITER,
        )
        .unwrap();
        if let Some(key) = admin_key {
            state = state.with_admin_api_key(key);
        }
        create_app(
            state,
            SecurityState::new(SecurityMiddlewareConfig::default()),
            false,
        )
    }

    fn app() -> Router {
        app_with(MemoryStore::new(), None)
    }

    fn request(method: Method, uri: &str, user: Option<&str>, body: serde_json::Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(user) = user {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {user}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn create(app: &Router) -> i64 {
        let body = serde_json::json!({
            "title": "Write docs",
            "description": "Document the claim endpoint",
            "reward": "12.5",
            "deadline": (Utc::now() + Duration::days(3)).to_rfc3339(),
        });
        let response = app
            .clone()
            .oneshot(request(Method::POST, "/api/v1/bounties", Some(CREATOR), body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let bounty: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(bounty["status"], "open");
        assert_eq!(bounty["reward"], "12.5");
        bounty["id"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["X-Frame-Options"], "DENY");
    }

    #[tokio::test]
    async fn test_mutation_requires_wallet() {
        let response = app()
            .oneshot(request(
                Method::POST,
                "/api/v1/bounties",
                None,
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_malformed_wallet_rejected() {
        let response = app()
            .oneshot(request(
                Method::POST,
                "/api/v1/bounties/1/claim",
                Some("not-a-wallet"),
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_double_claim_conflicts() {
        let app = app();
        let id = create(&app).await;
        let uri = format!("/api/v1/bounties/{id}/claim");

        let first = app
            .clone()
            .oneshot(request(Method::POST, &uri, Some(HUNTER), serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app
            .clone()
            .oneshot(request(Method::POST, &uri, Some(&hunter(1)), serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_resolve_by_non_arbiter_forbidden() {
        let app = app();
        let id = create(&app).await;

        for (path, user, body) in [
            ("claim", HUNTER, serde_json::json!({})),
            ("dispute", CREATOR, serde_json::json!({ "reason": "Incomplete" })),
        ] {
            let response = app
                .clone()
                .oneshot(request(
                    Method::POST,
                    &format!("/api/v1/bounties/{id}/{path}"),
                    Some(user),
                    body,
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app
            .clone()
            .oneshot(request(
                Method::POST,
                &format!("/api/v1/bounties/{id}/resolve"),
                Some(HUNTER),
                serde_json::json!({ "winner": HUNTER, "resolution": "Mine" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_unknown_bounty_is_not_found() {
        let response = app()
            .oneshot(Request::get("/api/v1/bounties/999").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_reputation_lookup_provisions_record() {
        let response = app()
            .oneshot(
                Request::get(format!("/api/v1/reputation/{HUNTER}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let reputation: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(reputation["score"], 0);
        assert_eq!(reputation["next_level_in"], 200);
    }

    #[tokio::test]
    async fn test_admin_update_disabled_without_key() {
        let response = app()
            .oneshot(request(
                Method::POST,
                "/api/v1/reputation/update",
                None,
                serde_json::json!({ "user_id": HUNTER, "points": 10, "admin_api_key": "x" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_admin_update_is_atomic_with_badges() {
        let store = MemoryStore::new();
        let app = app_with(store.clone(), Some(ADMIN_KEY));
        let body = serde_json::json!({
            "user_id": HUNTER,
            "points": 150,
            "admin_api_key": ADMIN_KEY,
        });

        store.fail_on(FailPoint::InsertBadge);
        let response = app
            .clone()
            .oneshot(request(Method::POST, "/api/v1/reputation/update", None, body.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        store.clear_failures();

        let reputation = store.get_reputation(HUNTER).await.unwrap();
        assert!(reputation.map_or(true, |r| r.score == 0));

        let response = app
            .clone()
            .oneshot(request(Method::POST, "/api/v1/reputation/update", None, body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let update: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(update["reputation"]["score"], 150);
        assert_eq!(update["new_badges"][0]["name"], "Novice Hunter");

        let reputation = store.get_reputation(HUNTER).await.unwrap().unwrap();
        assert_eq!(reputation.score, 150);
    }
}
