mod jwt;

pub use jwt::{validate_access_token, Claims};

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::Response;

use crate::error::AppError;
use crate::AppState;

/// Token from an `Authorization: Bearer <token>` header, if present and non-empty.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Verifies the bearer token against the configured secret and issuer.
///
/// The verified claims are stored as a request extension; the entitlement
/// and subscription handlers read them as the authorizer claims of the event.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers()).ok_or(AppError::Unauthorized)?;
    let claims = validate_access_token(
        token,
        &state.config.jwt_secret,
        state.config.jwt_issuer.as_deref(),
    )?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

/// Claims left behind by [`auth_middleware`]. Missing claims mean the route
/// was mounted without the middleware, which is rejected as unauthorized.
impl<S> FromRequestParts<S> for Claims
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}
