//! HTTP entry point for the identity & authorizer component (C3).
//!
//! Extracts the bearer token from the `Authorization` header, runs it
//! through [`Authorizer::authorize`], and inserts the resulting
//! [`Principal`] into the request's extensions for downstream handlers and
//! the rate limiter to read. Applied identically to plain HTTP requests and
//! WebSocket upgrades, since both pass through this middleware before
//! reaching a handler (spec §4.3: "invoked for every HTTP request and
//! every WebSocket upgrade").

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use crate::auth::{Authorizer, DenyReason};
use crate::error::ErrorBody;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthzError(pub DenyReason);

impl IntoResponse for AuthzError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: "UNAUTHENTICATED".to_string(),
            message: self.0.as_str().to_string(),
            details: None,
        };
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}

pub async fn authz_layer(
    State(authorizer): State<Arc<Authorizer>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthzError> {
    let token = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(AuthzError(DenyReason::InvalidToken))?;

    let principal = authorizer.authorize(token).await.map_err(AuthzError)?;
    request.extensions_mut().insert(principal);

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deny_reason_maps_to_401() {
        let response = AuthzError(DenyReason::Expired).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
