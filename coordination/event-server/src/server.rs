use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use interleave_api_common::{
    bodies::{DependencyQuery, EventReceipt},
    paths,
};
use tracing::debug;

use crate::ledger::EventLedger;

const fn satisfied(met: bool) -> StatusCode {
    if met {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn check_dependencies(
    State(ledger): State<Arc<EventLedger>>,
    Path(name): Path<String>,
    Query(query): Query<DependencyQuery>,
) -> StatusCode {
    let met = ledger.dependencies_met(&name, query.include_event);
    debug!(event = %name, include_event = query.include_event, met, "dependency check");
    satisfied(met)
}

async fn check_block_dependencies(
    State(ledger): State<Arc<EventLedger>>,
    Path(name): Path<String>,
) -> StatusCode {
    satisfied(ledger.blocking_dependencies_met(&name))
}

async fn check_receipt(
    State(ledger): State<Arc<EventLedger>>,
    Path(name): Path<String>,
) -> StatusCode {
    satisfied(ledger.has_received(&name))
}

async fn receive_event(
    State(ledger): State<Arc<EventLedger>>,
    Json(EventReceipt { name }): Json<EventReceipt>,
) -> StatusCode {
    ledger.receive(&name);
    StatusCode::OK
}

/// Routes of the coordination endpoint. Every handler answers immediately;
/// waiting is left to the callers.
pub fn coordination_app(ledger: Arc<EventLedger>) -> Router {
    Router::new()
        .route(paths::DEPENDENCIES, get(check_dependencies))
        .route(paths::BLOCK_DEPENDENCIES, get(check_block_dependencies))
        .route(paths::EVENT, get(check_receipt))
        .route(paths::EVENTS, post(receive_event))
        .with_state(ledger)
}
