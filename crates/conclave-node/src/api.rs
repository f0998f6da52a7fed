//! # Request lifecycle API
//!
//! The HTTP surface glueing clients to the orchestrator:
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Liveness |
//! | GET | `/metrics` | Prometheus metrics |
//! | POST | `/api/v1/requests` | Submit a council request |
//! | GET | `/api/v1/requests/{id}` | Poll request status |
//! | GET | `/api/v1/requests/{id}/stream` | Subscribe to lifecycle events (SSE) |
//! | POST | `/api/v1/requests/stream` | Submit and subscribe in one call |
//! | GET | `/api/v1/requests/{id}/deliberation` | Inspect the deliberation thread |
//! | GET | `/api/v1/requests/{id}/responses` | Inspect round-0 responses |
//!
//! Submission consults the idempotency cache before any work is
//! enqueued; duplicate submissions under one `(user, Idempotency-Key)`
//! share a request id and a decision, with `fromCache: true` on the
//! repeat response.

use crate::auth::{auth_middleware, ApiKeyEntry, ApiKeyStore, AuthUser};
use crate::config::{Environment, FeatureFlags, NodeConfig};
use crate::error::ApiError;
use crate::health::health_routes;
use crate::observability::middleware::{
    metrics_handler, metrics_middleware, request_id_middleware,
};
use crate::observability::metrics::METRICS;
use crate::rate_limit::{rate_limit_middleware, IpRateLimiter};
use crate::stream_api::{stream_request, submit_and_stream};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{middleware, Extension, Json, Router};
use chrono::{DateTime, Utc};
use conclave_config::{ConfigBundle, ConfigStore, PresetResolver};
use conclave_engine::{EngineOptions, InMemorySessionStore, Orchestrator, RecordingMetricsSink};
use conclave_provider::ProviderPool;
use conclave_store::{scoped_key, IdempotencyCache, IdempotencyState, RequestRegistry, StoreError};
use conclave_stream::StreamHub;
use conclave_synthesis::ModelRankings;
use conclave_types::{ErrorCode, StoredRequest, UserRequest, ValidationError};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// How long a losing submission waits for the winner's result.
const IDEMPOTENCY_WAIT: Duration = Duration::from_secs(30);

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Request lifecycle records.
    pub registry: Arc<RequestRegistry>,
    /// At-most-once submission dedup.
    pub idempotency: Arc<IdempotencyCache>,
    /// SSE broadcast hub.
    pub hub: Arc<StreamHub>,
    /// The orchestration engine.
    pub orchestrator: Arc<Orchestrator>,
    /// API key credentials.
    pub api_keys: Arc<ApiKeyStore>,
    /// Per-IP limiter for `/api/*`.
    pub rate_limiter: Arc<IpRateLimiter>,
    /// Effective JWT secret.
    pub jwt_secret: String,
    /// ApiKey granting the dashboard identity.
    pub admin_api_token: Option<String>,
    /// Deployment environment.
    pub environment: Environment,
    /// Boot-time feature flags.
    pub flags: FeatureFlags,
}

impl AppState {
    /// Assembles the full application state from boot config, a provider
    /// pool, and the seed config bundle.
    pub fn build(
        config: &NodeConfig,
        pool: Arc<dyn ProviderPool>,
        bundle: ConfigBundle,
    ) -> Result<Self, conclave_config::ConfigError> {
        let registry = Arc::new(RequestRegistry::new());
        let idempotency = Arc::new(IdempotencyCache::new());
        let hub = Arc::new(StreamHub::new());
        let config_store = Arc::new(ConfigStore::seeded(bundle)?);
        let presets = Arc::new(PresetResolver::with_builtins());
        let api_keys = Arc::new(ApiKeyStore::new());

        if config.environment.is_test() {
            api_keys.insert(
                "test-key",
                ApiKeyEntry {
                    user_id: "test-user".to_string(),
                    active: true,
                    expires_at: None,
                },
            );
        }

        let metrics: Arc<dyn conclave_engine::MetricsSink> = if config.flags.metrics_tracking {
            Arc::new(METRICS.clone())
        } else {
            Arc::new(RecordingMetricsSink::new())
        };

        let orchestrator = Arc::new(Orchestrator::new(
            pool,
            config_store,
            presets,
            registry.clone(),
            idempotency.clone(),
            hub.clone(),
            Arc::new(InMemorySessionStore::new()),
            metrics,
            Arc::new(ModelRankings::new()),
            EngineOptions {
                devils_advocate_enabled: config.flags.devils_advocate,
                budget_caps_enabled: config.flags.budget_caps,
                ..Default::default()
            },
        ));

        Ok(Self {
            registry,
            idempotency,
            hub,
            orchestrator,
            api_keys,
            rate_limiter: Arc::new(IpRateLimiter::new()),
            jwt_secret: config.effective_jwt_secret().to_string(),
            admin_api_token: config.admin_api_token.clone(),
            environment: config.environment,
            flags: config.flags,
        })
    }
}

/// Creates the API router.
pub fn create_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/v1/requests", post(submit_request))
        .route("/api/v1/requests/stream", post(submit_and_stream))
        .route("/api/v1/requests/{id}", get(get_request))
        .route("/api/v1/requests/{id}/stream", get(stream_request))
        .route("/api/v1/requests/{id}/deliberation", get(get_deliberation))
        .route("/api/v1/requests/{id}/responses", get(get_responses))
        // Auth is outermost on the protected set: 401 precedes any other
        // validation or limiting.
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(health_routes())
        .route("/metrics", get(metrics_handler))
        .merge(protected)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Validated submit parameters.
pub(crate) struct SubmitParams {
    pub query: String,
    pub session_id: Option<Uuid>,
    pub streaming: bool,
    pub preset: Option<String>,
}

/// Parses and validates a submit body, mapping each failure to its
/// closed-set code.
pub(crate) fn parse_submit_body(bytes: &[u8]) -> Result<SubmitParams, ApiError> {
    let body: serde_json::Value = serde_json::from_slice(bytes)
        .map_err(|_| ApiError::new(ErrorCode::InvalidRequest, "Body must be a JSON object"))?;
    let object = body
        .as_object()
        .ok_or_else(|| ApiError::new(ErrorCode::InvalidRequest, "Body must be a JSON object"))?;

    let query = match object.get("query") {
        Some(serde_json::Value::String(q)) => q.clone(),
        Some(_) => {
            return Err(ApiError::new(
                ErrorCode::InvalidRequest,
                "Field 'query' must be a string",
            ))
        }
        None => {
            return Err(ApiError::new(
                ErrorCode::InvalidRequest,
                "Field 'query' is required",
            ))
        }
    };

    let session_id = match object.get("sessionId") {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(Uuid::parse_str(s).map_err(|_| {
            ApiError::new(ErrorCode::InvalidSessionId, "Field 'sessionId' must be a UUID")
        })?),
        Some(_) => {
            return Err(ApiError::new(
                ErrorCode::InvalidSessionId,
                "Field 'sessionId' must be a UUID string",
            ))
        }
    };

    let streaming = match object.get("streaming") {
        None | Some(serde_json::Value::Null) => false,
        Some(serde_json::Value::Bool(b)) => *b,
        Some(_) => {
            return Err(ApiError::new(
                ErrorCode::InvalidStreamingFlag,
                "Field 'streaming' must be a boolean",
            ))
        }
    };

    let preset = match object.get("preset") {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(p)) => Some(p.clone()),
        Some(_) => {
            return Err(ApiError::new(
                ErrorCode::InvalidRequest,
                "Field 'preset' must be a string",
            ))
        }
    };

    Ok(SubmitParams {
        query,
        session_id,
        streaming,
        preset,
    })
}

/// Builds the validated [`UserRequest`] from submit parameters.
pub(crate) fn build_request(user: &AuthUser, params: SubmitParams) -> Result<UserRequest, ApiError> {
    let mut request = UserRequest::new(&user.user_id, &params.query).map_err(|err| match err {
        ValidationError::EmptyQuery => {
            ApiError::new(ErrorCode::EmptyQuery, "Query is empty after sanitization")
        }
        ValidationError::QueryTooLong(len) => ApiError::new(
            ErrorCode::QueryTooLong,
            format!("Query of {} characters exceeds the maximum", len),
        )
        .with_details(serde_json::json!({"max": conclave_types::MAX_QUERY_LENGTH})),
        other => ApiError::new(ErrorCode::InvalidRequest, other.to_string()),
    })?;

    if let Some(session_id) = params.session_id {
        request = request.with_session(session_id);
    }
    if let Some(preset) = params.preset {
        request = request.with_preset(preset);
    }
    request = request.with_streaming(params.streaming);
    Ok(request)
}

/// Submit acknowledgement body.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    /// Assigned request id.
    #[serde(rename = "requestId")]
    pub request_id: Uuid,
    /// Initial status.
    pub status: &'static str,
    /// Submission time.
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

async fn submit_request(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Result<Response, ApiError> {
    let params = parse_submit_body(&body)?;
    let request = build_request(&user, params)?;

    // Idempotency: claim the scoped key before any work is enqueued.
    let idem_key = headers
        .get("idempotency-key")
        .and_then(|v| v.to_str().ok())
        .filter(|_| state.flags.idempotency)
        .map(|client_key| scoped_key(&user.user_id, client_key));

    if let Some(key) = &idem_key {
        if !state
            .idempotency
            .mark_in_progress(key, request.id, conclave_store::REQUEST_TTL)
        {
            return duplicate_submission(&state, key).await;
        }
    }

    state
        .registry
        .save(StoredRequest::processing(request.id, request.created_at))
        .map_err(|err| internal(&state, err.to_string()))?;

    METRICS.requests_submitted_total.inc();
    tracing::info!(
        request_id = %request.id,
        user_id = %user.user_id,
        preset = request.preset.as_deref().unwrap_or("-"),
        streaming = request.streaming,
        "Request submitted"
    );

    let response = SubmitResponse {
        request_id: request.id,
        status: "processing",
        created_at: request.created_at,
    };
    state.orchestrator.spawn(request, idem_key);

    Ok((StatusCode::ACCEPTED, Json(response)).into_response())
}

/// Resolves a submission that lost the idempotency race.
async fn duplicate_submission(state: &AppState, key: &str) -> Result<Response, ApiError> {
    let record = state.idempotency.check(key).ok_or_else(|| {
        ApiError::new(
            ErrorCode::IdempotencyStateInvalid,
            "Idempotency entry vanished during race resolution",
        )
    })?;

    let record = if record.state == IdempotencyState::InProgress {
        match state.idempotency.wait_for_completion(key, IDEMPOTENCY_WAIT).await {
            Ok(record) => record,
            Err(StoreError::WaitTimeout(_)) => {
                return Err(ApiError::new(
                    ErrorCode::IdempotencyStateInvalid,
                    "Timed out waiting for the original submission",
                ))
            }
            Err(err) => return Err(internal(state, err.to_string())),
        }
    } else {
        record
    };

    let Some(result) = record.result else {
        return Err(ApiError::new(
            ErrorCode::IdempotencyStateInvalid,
            "Cached entry is terminal but carries no result",
        ));
    };
    let serde_json::Value::Object(mut cached) = result else {
        return Err(ApiError::new(
            ErrorCode::IdempotencyResultInvalid,
            "Cached result has an unexpected shape",
        ));
    };
    cached.insert("fromCache".to_string(), serde_json::Value::Bool(true));

    tracing::info!(request_id = %record.request_id, "Idempotent submission served from cache");
    Ok((StatusCode::OK, Json(serde_json::Value::Object(cached))).into_response())
}

/// Poll response body.
#[derive(Debug, Serialize)]
struct PollResponse {
    #[serde(rename = "requestId")]
    request_id: Uuid,
    status: String,
    #[serde(rename = "consensusDecision", skip_serializing_if = "Option::is_none")]
    consensus_decision: Option<conclave_types::ConsensusDecision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(rename = "createdAt")]
    created_at: DateTime<Utc>,
    #[serde(rename = "completedAt", skip_serializing_if = "Option::is_none")]
    completed_at: Option<DateTime<Utc>>,
}

/// Parses a path id, 400 on syntactically invalid values.
pub(crate) fn parse_request_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw)
        .map_err(|_| ApiError::new(ErrorCode::InvalidRequest, "Request id must be a UUID"))
}

async fn get_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_request_id(&id)?;
    let record = state
        .registry
        .fetch(id)
        .ok_or_else(|| ApiError::request_not_found(id))?;

    Ok(Json(PollResponse {
        request_id: record.id,
        status: record.status.to_string(),
        consensus_decision: record.decision,
        error: record.error,
        created_at: record.created_at,
        completed_at: record.completed_at,
    })
    .into_response())
}

async fn get_deliberation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_request_id(&id)?;
    if state.registry.fetch(id).is_none() {
        return Err(ApiError::request_not_found(id));
    }
    let thread = state.registry.fetch_thread(id).ok_or_else(|| {
        ApiError::new(ErrorCode::DeliberationNotFound, "Deliberation thread not retained")
            .with_request_id(id)
    })?;
    Ok(Json(thread).into_response())
}

async fn get_responses(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_request_id(&id)?;
    if !state.flags.per_request_transparency {
        return Err(ApiError::request_not_found(id));
    }
    if state.registry.fetch(id).is_none() {
        return Err(ApiError::request_not_found(id));
    }
    let responses = state
        .registry
        .fetch_responses(id)
        .ok_or_else(|| ApiError::request_not_found(id))?;
    Ok(Json(responses).into_response())
}

/// 500 helper honoring the environment's exposure rule.
pub(crate) fn internal(state: &AppState, detail: String) -> ApiError {
    ApiError::internal(detail, state.environment.exposes_internal_errors())
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use conclave_provider::{MockProviderPool, ProviderReply};
    use tower::ServiceExt;

    fn reply(content: &str) -> ProviderReply {
        ProviderReply {
            content: content.to_string(),
            prompt_tokens: 10,
            completion_tokens: 5,
            cost_usd: 0.001,
        }
    }

    fn script_all(pool: &MockProviderPool, content: &str) {
        for m in ["m1", "m2", "m3"] {
            pool.script_ok(m, reply(content));
        }
    }

    fn submit_req(body: &str) -> Request<Body> {
        Request::post("/api/v1/requests")
            .header("authorization", "ApiKey test-key")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_submit_returns_accepted_with_uuid() {
        let pool = Arc::new(MockProviderPool::new());
        script_all(&pool, "hello answer");
        let state = test_state_with_pool(pool);
        let app = create_router(state);

        let response = app.oneshot(submit_req(r#"{"query":"hello"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let json = body_json(response).await;
        assert_eq!(json["status"], "processing");
        let id = json["requestId"].as_str().unwrap();
        assert_eq!(Uuid::parse_str(id).unwrap().get_version_num(), 4);
        assert!(json["createdAt"].is_string());
    }

    #[tokio::test]
    async fn test_submit_then_poll_round_trip() {
        let pool = Arc::new(MockProviderPool::new());
        script_all(&pool, "the final answer");
        let state = test_state_with_pool(pool);
        let app = create_router(state.clone());

        let response = app
            .clone()
            .oneshot(submit_req(r#"{"query":"q"}"#))
            .await
            .unwrap();
        let id = body_json(response).await["requestId"]
            .as_str()
            .unwrap()
            .to_string();

        // Wait for the spawned orchestration to settle.
        let mut status = String::new();
        for _ in 0..100 {
            let poll = app
                .clone()
                .oneshot(
                    Request::get(format!("/api/v1/requests/{}", id))
                        .header("authorization", "ApiKey test-key")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
            let json = body_json(poll).await;
            status = json["status"].as_str().unwrap().to_string();
            if status == "completed" {
                assert_eq!(json["consensusDecision"]["content"], "the final answer");
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(status, "completed");
    }

    #[tokio::test]
    async fn test_submit_unique_ids() {
        let (app, _state) = test_router();
        let mut seen = std::collections::HashSet::new();
        for _ in 0..5 {
            let response = app
                .clone()
                .oneshot(submit_req(r#"{"query":"q"}"#))
                .await
                .unwrap();
            let json = body_json(response).await;
            assert!(seen.insert(json["requestId"].as_str().unwrap().to_string()));
        }
    }

    #[tokio::test]
    async fn test_missing_auth_is_401_before_validation() {
        let (app, _state) = test_router();
        // Invalid body AND missing auth: auth wins.
        let response = app
            .oneshot(
                Request::post("/api/v1/requests")
                    .body(Body::from("not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "AUTHENTICATION_REQUIRED");
    }

    #[tokio::test]
    async fn test_unrecognized_scheme_is_invalid_auth_format() {
        let (app, _state) = test_router();
        let response = app
            .oneshot(
                Request::post("/api/v1/requests")
                    .header("authorization", "Basic xyz")
                    .body(Body::from(r#"{"query":"q"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "INVALID_AUTH_FORMAT");
    }

    #[tokio::test]
    async fn test_query_too_long_is_400() {
        let (app, _state) = test_router();
        let long = "a".repeat(100_001);
        let response = app
            .oneshot(submit_req(&format!(r#"{{"query":"{}"}}"#, long)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "QUERY_TOO_LONG");
        assert_eq!(json["error"]["retryable"], false);
    }

    #[tokio::test]
    async fn test_validation_error_codes() {
        let (app, _state) = test_router();

        for (body, code) in [
            (r#"{}"#, "INVALID_REQUEST"),
            (r#"{"query": 42}"#, "INVALID_REQUEST"),
            (r#"{"query":"q","sessionId":"nope"}"#, "INVALID_SESSION_ID"),
            (
                r#"{"query":"q","streaming":"yes"}"#,
                "INVALID_STREAMING_FLAG",
            ),
            (r#"{"query":"\u0001\u0000"}"#, "EMPTY_QUERY"),
        ] {
            let response = app.clone().oneshot(submit_req(body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", body);
            let json = body_json(response).await;
            assert_eq!(json["error"]["code"], code, "{}", body);
        }
    }

    #[tokio::test]
    async fn test_unknown_id_is_404() {
        let (app, _state) = test_router();
        let response = app
            .oneshot(
                Request::get(format!("/api/v1/requests/{}", Uuid::new_v4()))
                    .header("authorization", "ApiKey test-key")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "REQUEST_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_sanitization_equivalence() {
        // Queries differing only in stripped controls store identically.
        let pool = Arc::new(MockProviderPool::new());
        script_all(&pool, "a1");
        script_all(&pool, "a2");
        let state = test_state_with_pool(pool.clone());
        let app = create_router(state);

        app.clone()
            .oneshot(submit_req(r#"{"query":"hel\u0000lo"}"#))
            .await
            .unwrap();
        app.clone()
            .oneshot(submit_req(r#"{"query":"hello"}"#))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        let prompts = pool.requests_for("m1");
        assert_eq!(prompts.len(), 2);
        assert_eq!(
            prompts[0].messages.last().unwrap().content,
            prompts[1].messages.last().unwrap().content
        );
    }

    #[tokio::test]
    async fn test_idempotent_submissions_share_request() {
        let pool = Arc::new(MockProviderPool::new());
        script_all(&pool, "cached answer");
        let state = test_state_with_pool(pool);
        let app = create_router(state);

        let with_key = |body: &str| {
            Request::post("/api/v1/requests")
                .header("authorization", "ApiKey test-key")
                .header("idempotency-key", "k1")
                .body(Body::from(body.to_string()))
                .unwrap()
        };

        let first = app
            .clone()
            .oneshot(with_key(r#"{"query":"q"}"#))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::ACCEPTED);
        let first_id = body_json(first).await["requestId"]
            .as_str()
            .unwrap()
            .to_string();

        // The duplicate waits for the winner, then serves from cache.
        let second = app
            .clone()
            .oneshot(with_key(r#"{"query":"q"}"#))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::OK);
        let json = body_json(second).await;
        assert_eq!(json["fromCache"], true);
        assert_eq!(json["requestId"].as_str().unwrap(), first_id);
    }

    #[tokio::test]
    async fn test_idempotency_keys_scoped_by_user() {
        let pool = Arc::new(MockProviderPool::new());
        script_all(&pool, "a1");
        script_all(&pool, "a2");
        let state = test_state_with_pool(pool);
        state.api_keys.insert(
            "other-key",
            ApiKeyEntry {
                user_id: "other-user".to_string(),
                active: true,
                expires_at: None,
            },
        );
        let app = create_router(state);

        let submit_as = |api_key: &str| {
            Request::post("/api/v1/requests")
                .header("authorization", format!("ApiKey {}", api_key))
                .header("idempotency-key", "shared")
                .body(Body::from(r#"{"query":"q"}"#))
                .unwrap()
        };

        let a = app.clone().oneshot(submit_as("test-key")).await.unwrap();
        let b = app.clone().oneshot(submit_as("other-key")).await.unwrap();
        // Different users never collide: both are fresh submissions.
        assert_eq!(a.status(), StatusCode::ACCEPTED);
        assert_eq!(b.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn test_deliberation_not_retained_is_404() {
        let pool = Arc::new(MockProviderPool::new());
        script_all(&pool, "answer");
        let state = test_state_with_pool(pool);
        let app = create_router(state.clone());

        let response = app
            .clone()
            .oneshot(submit_req(r#"{"query":"q"}"#))
            .await
            .unwrap();
        let id = body_json(response).await["requestId"]
            .as_str()
            .unwrap()
            .to_string();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Zero rounds ran, so no thread was retained.
        let response = app
            .oneshot(
                Request::get(format!("/api/v1/requests/{}/deliberation", id))
                    .header("authorization", "ApiKey test-key")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "DELIBERATION_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_responses_endpoint_serves_round_zero() {
        let pool = Arc::new(MockProviderPool::new());
        script_all(&pool, "answer");
        let state = test_state_with_pool(pool);
        let app = create_router(state.clone());

        let response = app
            .clone()
            .oneshot(submit_req(r#"{"query":"q"}"#))
            .await
            .unwrap();
        let id = body_json(response).await["requestId"]
            .as_str()
            .unwrap()
            .to_string();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let response = app
            .oneshot(
                Request::get(format!("/api/v1/requests/{}/responses", id))
                    .header("authorization", "ApiKey test-key")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json.as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_health_is_unauthenticated() {
        let (app, _state) = test_router();
        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
