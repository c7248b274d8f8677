//! Signed webhook endpoint.
//!
//! Per request: extract headers, verify the signature over the raw body,
//! then dispatch by event type. Authentication failures short-circuit with a
//! generic response; dispatch failures never change the already-decided 200.

use crate::dispatch::DispatchOutcome;
use crate::extract::extract;
use crate::server::AppState;
use axum::Json;
use axum::body::Bytes;
use axum::extract::{ConnectInfo, FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use hook_core::signatures::{VerificationOutcome, verify_signature};
use serde::Serialize;
use serde_json::{Value, json};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, warn};
use uuid::Uuid;

/// Peer address when the server was started with connect info.
#[derive(Debug, Clone, Copy)]
pub struct RemoteAddr(pub Option<SocketAddr>);

impl<S: Send + Sync> FromRequestParts<S> for RemoteAddr {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| *addr),
        ))
    }
}

#[derive(Debug, Default)]
pub struct WebhookStats {
    received: AtomicU64,
    signature_checks: AtomicU64,
    rejected: AtomicU64,
    handled: AtomicU64,
    ignored: AtomicU64,
    dispatch_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WebhookStatsSnapshot {
    pub received: u64,
    pub signature_checks: u64,
    pub rejected: u64,
    pub handled: u64,
    pub ignored: u64,
    pub dispatch_failures: u64,
}

impl WebhookStats {
    pub fn snapshot(&self) -> WebhookStatsSnapshot {
        WebhookStatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            signature_checks: self.signature_checks.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            handled: self.handled.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            dispatch_failures: self.dispatch_failures.load(Ordering::Relaxed),
        }
    }

    fn record_dispatch(&self, outcome: &DispatchOutcome) {
        let counter = match outcome {
            DispatchOutcome::Handled { .. } => &self.handled,
            DispatchOutcome::Ignored { .. } => &self.ignored,
            DispatchOutcome::Failed { .. } => &self.dispatch_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

pub async fn webhook_handler(
    State(state): State<Arc<AppState>>,
    RemoteAddr(remote_addr): RemoteAddr,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    handle(&state, remote_addr, &headers, &body).await
}

pub async fn handle(
    state: &AppState,
    remote_addr: Option<SocketAddr>,
    headers: &HeaderMap,
    body: &[u8],
) -> (StatusCode, Json<Value>) {
    let stats = &state.stats;
    stats.received.fetch_add(1, Ordering::Relaxed);
    let remote = remote_addr
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let extracted = extract(headers, &state.config.headers);

    let outcome = match extracted.signature.as_deref() {
        None => VerificationOutcome::RejectedMissingHeader,
        Some(signature) => {
            stats.signature_checks.fetch_add(1, Ordering::Relaxed);
            verify_signature(
                state.config.webhook_secret.as_bytes(),
                body,
                signature,
                &state.config.signature_algorithms,
            )
        }
    };

    if !outcome.is_accepted() {
        stats.rejected.fetch_add(1, Ordering::Relaxed);
        warn!(remote = %remote, reason = outcome.as_str(), "webhook authentication failed");
        return rejection(outcome);
    }

    let delivery_id = Uuid::new_v4().to_string();

    let Some(event_type) = extracted.event_type else {
        stats.ignored.fetch_add(1, Ordering::Relaxed);
        info!(
            delivery_id = %delivery_id,
            remote = %remote,
            "verified webhook without event type; nothing to dispatch"
        );
        return accepted(&delivery_id, None);
    };

    let dispatch = state.dispatcher.dispatch(&event_type, body).await;
    stats.record_dispatch(&dispatch);
    info!(
        delivery_id = %delivery_id,
        remote = %remote,
        event = %event_type,
        dispatch = dispatch.as_str(),
        "webhook delivery processed"
    );

    accepted(&delivery_id, Some(&event_type))
}

fn accepted(delivery_id: &str, event_type: Option<&str>) -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({"status": "ok", "id": delivery_id, "event": event_type})),
    )
}

// Bodies stay generic: the caller never learns which check failed.
fn rejection(outcome: VerificationOutcome) -> (StatusCode, Json<Value>) {
    match outcome {
        VerificationOutcome::RejectedMissingHeader | VerificationOutcome::RejectedMalformedHeader => {
            (StatusCode::BAD_REQUEST, Json(json!({"error": "bad request"})))
        }
        _ => (StatusCode::FORBIDDEN, Json(json!({"error": "forbidden"}))),
    }
}
