use std::collections::BTreeMap;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::auth::Claims;

/// API Gateway style proxy event. Only the fields this service reads are modelled.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyEvent {
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub request_context: RequestContext,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RequestContext {
    #[serde(default)]
    pub authorizer: Option<Authorizer>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Authorizer {
    #[serde(default)]
    pub claims: AuthorizerClaims,
}

/// Identity attached by the upstream authorizer.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AuthorizerClaims {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub sub: Option<String>,
}

impl From<Claims> for AuthorizerClaims {
    fn from(claims: Claims) -> Self {
        Self {
            email: claims.email,
            sub: Some(claims.sub),
        }
    }
}

impl ProxyEvent {
    /// Event for a request that arrived directly over HTTP with a verified token.
    pub fn from_http(body: String, claims: Claims) -> Self {
        Self {
            body: Some(body),
            request_context: RequestContext {
                authorizer: Some(Authorizer {
                    claims: claims.into(),
                }),
            },
        }
    }

    pub fn claims(&self) -> Option<&AuthorizerClaims> {
        self.request_context.authorizer.as_ref().map(|a| &a.claims)
    }
}

/// Proxy response: status, headers and a pre-serialized JSON body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl ProxyResponse {
    pub fn json<T: Serialize>(status: StatusCode, value: &T) -> Self {
        // Plain data types only; serialization cannot fail for them.
        let body = serde_json::to_string(value).unwrap_or_else(|_| "null".to_string());
        let headers = BTreeMap::from([
            ("Content-Type".to_string(), "application/json".to_string()),
            ("Access-Control-Allow-Origin".to_string(), "*".to_string()),
        ]);
        Self {
            status_code: status.as_u16(),
            headers,
            body,
        }
    }
}

impl IntoResponse for ProxyResponse {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, self.body).into_response();
        let headers = response.headers_mut();
        for (name, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.insert(name, value);
            }
        }
        response
    }
}
