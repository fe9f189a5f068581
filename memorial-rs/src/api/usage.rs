//! Storage usage endpoints
//!
//! `GET /api/usage` returns the current snapshot. `GET /api/usage/stream`
//! keeps a Server-Sent Events connection open and pushes a `usage` event
//! for every committed ledger change, starting with the current value.

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::api::auth::Claims;
use crate::api::handlers::{ApiResult, AppState};
use crate::error::MemorialError;
use crate::quota::UsageSnapshot;

/// GET /api/usage
pub async fn get_usage(State(state): State<Arc<AppState>>, _claims: Claims) -> ApiResult<UsageSnapshot> {
    Ok(Json(state.ledger.snapshot(&state.profile_id).await?))
}

/// GET /api/usage/stream
pub async fn stream_usage(
    State(state): State<Arc<AppState>>,
    claims: Claims,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, MemorialError> {
    let subscription = state.ledger.subscribe(&state.profile_id).await?;
    debug!("{} subscribed to usage of {}", claims.sub, state.profile_id);

    let events = subscription
        .into_stream()
        .map(|snapshot| Event::default().event("usage").json_data(snapshot));

    Ok(Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    ))
}
