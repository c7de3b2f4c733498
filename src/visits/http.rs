//! HTTP surface for the visits service. Requires the `http` feature.
//!
//! ## Routes
//!
//! - `POST /owners/:owner_id/pets/:pet_id/visits`: record a visit, `201` with the stored visit.
//! - `GET /owners/:owner_id/pets/:pet_id/visits`: visits for one pet.
//! - `GET /pets/visits?petId=1,2`: visits for several pets as `{ "items": [...] }`.
//!   `petId` may also be repeated.
//! - `GET /health`: `{ "ok": true }`.

use std::sync::Arc;

use axum::extract::{Path, RawQuery, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use super::error::VisitError;
use super::service::VisitService;
use super::store::VisitStore;
use super::visit::Visit;
use crate::bus::Publisher;

/// Build an axum `Router` over the given service.
pub fn router<S, P>(service: Arc<VisitService<S, P>>) -> Router
where
    S: VisitStore + 'static,
    P: Publisher + 'static,
{
    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/owners/:owner_id/pets/:pet_id/visits",
            get(pet_visits_handler::<S, P>).post(record_visit_handler::<S, P>),
        )
        .route("/pets/visits", get(visits_for_pets_handler::<S, P>))
        .with_state(service)
}

/// Serve the visits API at the given address (e.g. `"0.0.0.0:8082"`).
pub async fn serve<S, P>(service: Arc<VisitService<S, P>>, addr: &str) -> Result<(), std::io::Error>
where
    S: VisitStore + 'static,
    P: Publisher + 'static,
{
    let app = router(service);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

async fn record_visit_handler<S, P>(
    State(service): State<Arc<VisitService<S, P>>>,
    Path((_owner_id, pet_id)): Path<(String, u32)>,
    Json(visit): Json<Visit>,
) -> Response
where
    S: VisitStore + 'static,
    P: Publisher + 'static,
{
    // Publishing blocks for up to the publish timeout.
    let result = tokio::task::spawn_blocking(move || service.record_visit(pet_id, visit)).await;
    match result {
        Ok(Ok(saved)) => (StatusCode::CREATED, Json(saved)).into_response(),
        Ok(Err(err)) => error_response(&err),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
    }
}

async fn pet_visits_handler<S, P>(
    State(service): State<Arc<VisitService<S, P>>>,
    Path((_owner_id, pet_id)): Path<(String, u32)>,
) -> Response
where
    S: VisitStore + 'static,
    P: Publisher + 'static,
{
    match service.visits(pet_id) {
        Ok(visits) => (StatusCode::OK, Json(visits)).into_response(),
        Err(err) => error_response(&err),
    }
}

async fn visits_for_pets_handler<S, P>(
    State(service): State<Arc<VisitService<S, P>>>,
    RawQuery(query): RawQuery,
) -> Response
where
    S: VisitStore + 'static,
    P: Publisher + 'static,
{
    let pet_ids = match parse_pet_ids(query.as_deref().unwrap_or("")) {
        Ok(ids) => ids,
        Err(bad) => {
            let body = json!({ "error": format!("invalid petId '{}'", bad) });
            return (StatusCode::BAD_REQUEST, Json(body)).into_response();
        }
    };
    match service.visits_for(&pet_ids) {
        Ok(visits) => (StatusCode::OK, Json(json!({ "items": visits }))).into_response(),
        Err(err) => error_response(&err),
    }
}

/// Collect `petId` values from a query string; accepts `petId=1,2` and `petId=1&petId=2`.
fn parse_pet_ids(query: &str) -> Result<Vec<u32>, String> {
    let mut ids = Vec::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        if key != "petId" {
            continue;
        }
        for raw in value.split("%2C").flat_map(|part| part.split(',')) {
            let raw = raw.trim();
            if raw.is_empty() {
                continue;
            }
            ids.push(raw.parse::<u32>().map_err(|_| raw.to_string())?);
        }
    }
    Ok(ids)
}

fn error_response(err: &VisitError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}
