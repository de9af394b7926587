mod entitlement;
mod health;
mod invoke;
mod subscription;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use http_body_util::BodyExt;

use crate::auth::auth_middleware;
use crate::AppState;

async fn log_errors(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().path().to_string();
    let response = next.run(req).await;
    let status = response.status();

    if status.is_client_error() || status.is_server_error() {
        let (parts, body) = response.into_parts();
        let bytes = body
            .collect()
            .await
            .map(http_body_util::Collected::to_bytes)
            .unwrap_or_default();
        let body_str = String::from_utf8_lossy(&bytes);
        tracing::error!("{} {} -> {} {}", method, uri, status, body_str);
        Response::from_parts(parts, axum::body::Body::from(bytes))
    } else {
        response
    }
}

pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/health", get(health::health))
        .route("/invoke", post(invoke::invoke));

    let authenticated = Router::new()
        .route("/entitlement", post(entitlement::entitlement))
        .route("/subscriptions", post(subscription::overview))
        .layer(middleware::from_fn_with_state(state, auth_middleware));

    public
        .merge(authenticated)
        .layer(middleware::from_fn(log_errors))
}
