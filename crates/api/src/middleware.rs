use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::State,
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::{debug, info};

use spacedock_auth::{AuthError, Authenticator};

use crate::app::errors::json_error;
use crate::context::PrincipalContext;

#[derive(Clone)]
pub struct AuthState {
    pub authenticator: Arc<dyn Authenticator>,
    pub timeout: Duration,
}

pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_bearer(req.headers()).map_err(unauthorized)?;

    let principal = match tokio::time::timeout(
        state.timeout,
        state.authenticator.authenticate(token, Utc::now()),
    )
    .await
    {
        Ok(Ok(principal)) => principal,
        Ok(Err(AuthError::Unavailable(msg))) => {
            return Err(json_error(StatusCode::SERVICE_UNAVAILABLE, "dependency_failure", msg));
        }
        Ok(Err(e)) => {
            debug!(error = %e, "credential rejected");
            return Err(unauthorized(e.to_string()));
        }
        Err(_) => {
            return Err(json_error(
                StatusCode::SERVICE_UNAVAILABLE,
                "dependency_failure",
                format!("authentication timed out after {}ms", state.timeout.as_millis()),
            ));
        }
    };

    req.extensions_mut().insert(PrincipalContext::new(principal));
    Ok(next.run(req).await)
}

fn unauthorized(message: impl Into<String>) -> Response {
    json_error(StatusCode::UNAUTHORIZED, "unauthorized", message)
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, &'static str> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or("missing bearer token")?;

    let header = header.to_str().map_err(|_| "malformed authorization header")?;

    let header = header
        .strip_prefix("Bearer ")
        .ok_or("authorization header is not a bearer token")?;

    let token = header.trim();
    if token.is_empty() {
        return Err("missing bearer token");
    }

    Ok(token)
}

/// One log line per request.
pub async fn access_log(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(req).await;

    info!(
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        latency_ms = started.elapsed().as_millis() as u64,
        "request"
    );
    response
}
