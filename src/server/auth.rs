//! HTTP Basic auth middleware with constant-time credential comparison.

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::Engine;
use serde_json::json;
use subtle::ConstantTimeEq;

use super::AppState;

fn constant_time_eq(a: &str, b: &str) -> bool {
    // Compare fixed-size digests rather than the raw strings so differing
    // lengths don't leak through an early return.
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, axum::Json(json!({"status": "Unauthorized"}))).into_response()
}

pub async fn require_basic_auth(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let Some(header_value) = header_value else {
        return unauthorized();
    };
    let Some(encoded) = header_value.strip_prefix("Basic ") else {
        return unauthorized();
    };
    let Ok(decoded) = base64::engine::general_purpose::STANDARD.decode(encoded) else {
        return unauthorized();
    };
    let Ok(decoded) = String::from_utf8(decoded) else {
        return unauthorized();
    };
    let Some((user, pass)) = decoded.split_once(':') else {
        return unauthorized();
    };

    let user_ok = constant_time_eq(user, &state.config.http_authorization_username);
    let pass_ok = constant_time_eq(pass, &state.config.http_authorization_password);
    if !(user_ok && pass_ok) {
        return unauthorized();
    }

    next.run(request).await
}
