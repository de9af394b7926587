use axum::extract::State;

use crate::auth::Claims;
use crate::event::{ProxyEvent, ProxyResponse};
use crate::handler;
use crate::AppState;

pub async fn entitlement(
    claims: Claims,
    State(state): State<AppState>,
    body: String,
) -> ProxyResponse {
    let event = ProxyEvent::from_http(body, claims);
    handler::handle_event(&state.aggregator, &event).await
}
