//! Server-sent-event endpoints.
//!
//! Two ways into a stream:
//!
//! - `GET /api/v1/requests/{id}/stream` subscribes to an existing
//!   request. A request that already reached a terminal state gets its
//!   terminal events replayed from the registry, so a late subscriber
//!   still sees `message` + `done` (or `error`) before the connection
//!   closes.
//! - `POST /api/v1/requests/stream` submits and subscribes in one call;
//!   the first event is `init` with the assigned request id.
//!
//! Client disconnects cancel only the sink, never the orchestration.

use crate::api::{build_request, internal, parse_request_id, parse_submit_body, AppState};
use crate::error::ApiError;
use axum::extract::{Path, State};
use axum::response::sse::{Event, Sse};
use axum::Extension;
use conclave_stream::{StreamEvent, StreamReceiver};
use conclave_types::{RequestStatus, StoredRequest};
use futures::stream::{self, Stream, StreamExt};
use std::convert::Infallible;

use crate::auth::AuthUser;

type SseStream = std::pin::Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>;

fn to_sse(event: &StreamEvent) -> Event {
    Event::default()
        .event(event.name())
        .data(event.data().to_string())
}

/// Stream of live hub events until the terminal one.
fn live_stream(receiver: StreamReceiver) -> impl Stream<Item = Result<Event, Infallible>> + Send {
    stream::unfold(receiver, |mut rx| async move {
        rx.recv().await.map(|event| (Ok(to_sse(&event)), rx))
    })
}

/// Terminal replay for a request that already settled.
fn replay_stream(record: &StoredRequest) -> SseStream {
    let events = match record.status {
        RequestStatus::Completed => {
            let content = record
                .decision
                .as_ref()
                .map(|d| d.content.clone())
                .unwrap_or_default();
            vec![StreamEvent::Message(content), StreamEvent::Done]
        }
        RequestStatus::Failed => {
            let reason = record
                .error
                .clone()
                .unwrap_or_else(|| "Request failed".to_string());
            vec![StreamEvent::Error(reason)]
        }
        RequestStatus::Processing => vec![StreamEvent::Status("processing".to_string())],
    };
    stream::iter(events.iter().map(|e| Ok(to_sse(e))).collect::<Vec<_>>()).boxed()
}

/// `GET /api/v1/requests/{id}/stream` — subscribe to lifecycle events.
pub async fn stream_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Sse<SseStream>, ApiError> {
    let id = parse_request_id(&id)?;
    let record = state
        .registry
        .fetch(id)
        .ok_or_else(|| ApiError::request_not_found(id))?;

    let stream: SseStream = if record.status.is_terminal() {
        replay_stream(&record)
    } else {
        // Attach before re-reading so a completion between the two reads
        // is observed either live or via replay, never missed.
        let receiver = state.hub.attach(id);
        match state.registry.fetch(id) {
            Some(settled) if settled.status.is_terminal() => replay_stream(&settled),
            _ => stream::iter(vec![Ok(to_sse(&StreamEvent::Status(
                "processing".to_string(),
            )))])
            .chain(live_stream(receiver))
            .boxed(),
        }
    };

    tracing::debug!(request_id = %id, "Stream subscription opened");
    Ok(Sse::new(stream))
}

/// `POST /api/v1/requests/stream` — submit and subscribe in one call.
///
/// The first event on the wire is `init` with the fresh request id.
pub async fn submit_and_stream(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    body: axum::body::Bytes,
) -> Result<Sse<SseStream>, ApiError> {
    let params = parse_submit_body(&body)?;
    let request = build_request(&user, params)?;
    let request_id = request.id;

    state
        .registry
        .save(StoredRequest::processing(request.id, request.created_at))
        .map_err(|err| internal(&state, err.to_string()))?;

    // Attach before spawning so no lifecycle event is missed.
    let receiver = state.hub.attach(request_id);
    state.orchestrator.spawn(request, None);

    tracing::info!(
        request_id = %request_id,
        user_id = %user.user_id,
        "Streaming request submitted"
    );

    let init = StreamEvent::Init { request_id };
    let stream: SseStream = stream::iter(vec![Ok(to_sse(&init))])
        .chain(live_stream(receiver))
        .boxed();
    Ok(Sse::new(stream))
}
