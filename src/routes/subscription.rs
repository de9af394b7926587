use axum::extract::{Query, State};
use serde::Deserialize;

use crate::auth::Claims;
use crate::error::AppError;
use crate::event::{ProxyEvent, ProxyResponse};
use crate::handler;
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct OverviewParams {
    /// `all` adds every subscription regardless of status to the overview.
    pub status: Option<String>,
}

pub async fn overview(
    claims: Claims,
    State(state): State<AppState>,
    Query(params): Query<OverviewParams>,
    body: String,
) -> ProxyResponse {
    let include_all = match params.status.as_deref() {
        None => false,
        Some("all") => true,
        Some(other) => {
            tracing::debug!(status = other, "rejected subscription status filter");
            return AppError::BadRequest("Unsupported status filter".into()).to_proxy_response();
        }
    };

    let event = ProxyEvent::from_http(body, claims);
    handler::handle_overview(&state.aggregator, &event, include_all).await
}
