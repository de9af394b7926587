use axum::http::StatusCode;
use serde::Serialize;
use serde_json::Value;

use crate::billing::{BillingAggregator, SubscriptionDetails, SubscriptionSummary};
use crate::error::{AppError, EMAIL_NOT_PROVIDED};
use crate::event::{ProxyEvent, ProxyResponse};

/// Picks the email to look up: a non-empty `email` string in the body wins,
/// then the authorizer's email claim. Either value is used exactly as given.
///
/// A missing, empty or `null` body counts as `{}`. A body that is not valid
/// JSON is rejected.
pub fn resolve_email(event: &ProxyEvent) -> Result<String, AppError> {
    let body = match event.body.as_deref().map(str::trim) {
        None | Some("") => Value::Null,
        Some(raw) => serde_json::from_str(raw)
            .map_err(|_| AppError::BadRequest("Invalid JSON body".into()))?,
    };

    let from_body = body
        .get("email")
        .and_then(Value::as_str)
        .filter(|e| !e.is_empty());
    let from_claims = event
        .claims()
        .and_then(|c| c.email.as_deref())
        .filter(|e| !e.is_empty());

    from_body
        .or(from_claims)
        .map(str::to_string)
        .ok_or_else(|| AppError::BadRequest(EMAIL_NOT_PROVIDED.into()))
}

/// Entitlement lookup: 200 with the bare character total, or an error body.
pub async fn handle_event(aggregator: &BillingAggregator, event: &ProxyEvent) -> ProxyResponse {
    match entitlement(aggregator, event).await {
        Ok(total) => ProxyResponse::json(StatusCode::OK, &total),
        Err(e) => e.to_proxy_response(),
    }
}

async fn entitlement(aggregator: &BillingAggregator, event: &ProxyEvent) -> Result<u64, AppError> {
    let email = resolve_email(event)?;
    let sub = event.claims().and_then(|c| c.sub.as_deref());
    tracing::debug!(sub = ?sub, "looking up entitlement");
    Ok(aggregator.total_chars_for_active_subscriptions(&email).await?)
}

#[derive(Debug, Serialize)]
pub struct SubscriptionOverview {
    pub active: bool,
    pub subscriptions: Vec<SubscriptionDetails>,
    /// Every subscription of any status; only filled in when asked for.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all: Option<Vec<SubscriptionSummary>>,
}

/// Whether the email has an active subscription, plus the details of each.
/// With `include_all`, also lists every subscription whatever its status.
pub async fn handle_overview(
    aggregator: &BillingAggregator,
    event: &ProxyEvent,
    include_all: bool,
) -> ProxyResponse {
    match overview(aggregator, event, include_all).await {
        Ok(overview) => ProxyResponse::json(StatusCode::OK, &overview),
        Err(e) => e.to_proxy_response(),
    }
}

async fn overview(
    aggregator: &BillingAggregator,
    event: &ProxyEvent,
    include_all: bool,
) -> Result<SubscriptionOverview, AppError> {
    let email = resolve_email(event)?;
    let subscriptions = aggregator.active_subscription_details(&email).await?;
    let all = if include_all {
        let subs = aggregator.subscriptions_for_email(&email).await?;
        Some(subs.iter().map(SubscriptionSummary::from).collect())
    } else {
        None
    };
    Ok(SubscriptionOverview {
        active: !subscriptions.is_empty(),
        subscriptions,
        all,
    })
}
