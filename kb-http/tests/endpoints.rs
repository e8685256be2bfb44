use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use http_body_util::BodyExt;
use kb_auth::{store_api_key, ApiKeyRecord, AuthService, Tier};
use kb_cache::{MemoryDurableTier, MemoryFastTier, TwoTierCache};
use kb_core::config::RateLimitsSection;
use kb_core::SystemClock;
use kb_http::app;
use kb_http::state::AppState;
use kb_queue::backend::memory::MemoryBackend;
use kb_repository::{JobRepository, KvJobRepository};
use kb_vector::InMemoryVectorStore;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn build_state() -> (AppState, Arc<TwoTierCache>) {
    let cache = Arc::new(TwoTierCache::new(Arc::new(MemoryFastTier::new()), Arc::new(MemoryDurableTier::new())));
    let auth = Arc::new(AuthService::new(cache.clone(), Arc::new(SystemClock), RateLimitsSection::default()));
    let repository: Arc<dyn JobRepository> = Arc::new(KvJobRepository::new(cache.clone()));
    let backend = Arc::new(MemoryBackend::new());
    let vector_store = Arc::new(InMemoryVectorStore::new());

    let state = AppState::new(auth, repository, backend, cache.clone(), vector_store, "acme");
    (state, cache)
}

async fn seed_key(cache: &Arc<TwoTierCache>, client_id: &str, tier: Tier) -> String {
    let key = format!("kb_test_{client_id}");
    let record = ApiKeyRecord {
        client_id: client_id.to_string(),
        tier,
        created_at: Utc::now(),
        expires_at: Utc::now() + Duration::days(365),
        rate_limit_override: None,
        permissions: tier.permissions().into_iter().map(str::to_string).collect(),
    };
    store_api_key(cache, &key, &record).await.unwrap();
    key
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_is_always_ok_without_auth() {
    let (state, _cache) = build_state().await;
    let router = app(state);

    let response = router.oneshot(Request::builder().uri("/api/v1/health").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn analyze_without_api_key_is_unauthorized() {
    let (state, _cache) = build_state().await;
    let router = app(state);

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/analyze")
                .header("content-type", "application/json")
                .body(Body::from(json!({"subject": "hi"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn analyze_email_ingests_and_returns_pending() {
    let (state, cache) = build_state().await;
    let key = seed_key(&cache, "acme", Tier::Pro).await;
    let router = app(state);

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/analyze")
                .header("content-type", "application/json")
                .header("x-api-key", key)
                .body(Body::from(json!({"subject": "quarterly review", "body": "..."}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert!(response.headers().contains_key("x-ratelimit-limit"));
    let body = body_json(response).await;
    assert_eq!(body["status"], "pending");
    assert!(body["status_url"].as_str().unwrap().starts_with("/api/v1/status/"));
}

#[tokio::test]
async fn analyze_subjects_rejects_empty_list() {
    let (state, cache) = build_state().await;
    let key = seed_key(&cache, "acme", Tier::Pro).await;
    let router = app(state);

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/analyze/subjects")
                .header("content-type", "application/json")
                .header("x-api-key", key)
                .body(Body::from(json!({"subjects": []}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn status_for_another_tenants_job_is_not_found() {
    let (state, cache) = build_state().await;
    let owner_key = seed_key(&cache, "acme", Tier::Pro).await;
    let intruder_key = seed_key(&cache, "globex", Tier::Pro).await;

    let ingest_router = app(state.clone());
    let ingest_response = ingest_router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/analyze")
                .header("content-type", "application/json")
                .header("x-api-key", owner_key)
                .body(Body::from(json!({"subject": "hi"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let body = body_json(ingest_response).await;
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let status_router = app(state);
    let response = status_router
        .oneshot(
            Request::builder()
                .uri(format!("/api/v1/status/{job_id}"))
                .header("x-api-key", intruder_key)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_detailed_requires_manage_keys_permission() {
    let (state, cache) = build_state().await;
    let key = seed_key(&cache, "acme", Tier::Free).await;
    let router = app(state);

    let response = router
        .oneshot(Request::builder().uri("/api/v1/health/detailed").header("x-api-key", key).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn health_detailed_reports_collaborator_status_for_admin() {
    let (state, cache) = build_state().await;
    let key = seed_key(&cache, "acme", Tier::Admin).await;
    let router = app(state);

    let response = router
        .oneshot(Request::builder().uri("/api/v1/health/detailed").header("x-api-key", key).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["components"]["cache"], "ok");
}
