use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::billing::BillingError;
use crate::event::ProxyResponse;

pub const EMAIL_NOT_PROVIDED: &str = "Email not provided";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Billing(#[from] BillingError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Billing(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Error body in the same shape and with the same headers as a success.
    pub fn to_proxy_response(&self) -> ProxyResponse {
        let message = match self {
            AppError::Unauthorized => "unauthorized".to_string(),
            AppError::BadRequest(msg) => msg.clone(),
            AppError::Billing(e) => {
                tracing::error!("billing provider error: {e}");
                "billing provider request failed".to_string()
            }
        };

        ProxyResponse::json(self.status(), &json!({ "error": message }))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.to_proxy_response().into_response()
    }
}
