use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

use crate::error::AppError;
use crate::event::{ProxyEvent, ProxyResponse};
use crate::handler;
use crate::AppState;

/// Serverless-style entry point: the gateway has already authenticated the
/// caller and forwards the whole proxy event. The function's response is
/// returned as the payload.
pub async fn invoke(
    State(state): State<AppState>,
    event: Result<Json<ProxyEvent>, JsonRejection>,
) -> Result<Json<ProxyResponse>, AppError> {
    let Json(event) = event.map_err(|e| AppError::BadRequest(e.body_text()))?;
    Ok(Json(handler::handle_event(&state.aggregator, &event).await))
}
