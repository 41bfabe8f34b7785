//! API middleware: operator authentication and mutation rate limiting.
//!
//! The algorithm routes require an operator whose email is on the
//! control-panel-owner list AND a configured dev-password header. Every
//! failure records a `security_events` row with the reason and client IP
//! before returning 401/403. Authenticated mutations pass through a
//! per-IP token bucket; exhaustion returns 429 `{"error":"rate_limited"}`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::http::{Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tokio::sync::Mutex;

use super::handlers::ApiState;

/// Header carrying the operator email.
pub const OPERATOR_EMAIL_HEADER: &str = "x-operator-email";
/// Header carrying the dev password.
pub const DEV_PASSWORD_HEADER: &str = "x-cutbrain-dev-password";

/// Per-IP token bucket over a fixed window.
pub struct RateLimiter {
    window: Duration,
    max: u32,
    buckets: Mutex<HashMap<String, (u32, Instant)>>,
}

impl RateLimiter {
    pub fn new(window_ms: u64, max: u32) -> Self {
        Self {
            window: Duration::from_millis(window_ms.max(1)),
            max: max.max(1),
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Take one token for `ip`. Returns false when the bucket is empty.
    pub async fn allow(&self, ip: &str) -> bool {
        let mut buckets = self.buckets.lock().await;
        let now = Instant::now();
        let entry = buckets.entry(ip.to_string()).or_insert((0, now));
        if now.duration_since(entry.1) >= self.window {
            *entry = (0, now);
        }
        if entry.0 >= self.max {
            return false;
        }
        entry.0 += 1;
        true
    }
}

/// Best-effort client IP: proxy header first, then the socket address the
/// router recorded, then a fixed marker.
fn client_ip(request: &Request) -> String {
    request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "local".to_string())
}

/// Operator authentication layer for all algorithm routes.
pub async fn require_operator(
    State(state): State<ApiState>,
    request: Request,
    next: Next,
) -> Response {
    let ip = client_ip(&request);

    let email = request
        .headers()
        .get(OPERATOR_EMAIL_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_lowercase());
    let password = request
        .headers()
        .get(DEV_PASSWORD_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let (email, password) = match (email, password) {
        (Some(e), Some(p)) if !e.is_empty() => (e, p),
        _ => {
            state
                .security
                .record(
                    "auth_missing_credentials",
                    json!({"reason": "missing operator email or dev password", "ip": ip}),
                )
                .await;
            return (
                StatusCode::UNAUTHORIZED,
                axum::Json(json!({"error": "missing_credentials"})),
            )
                .into_response();
        }
    };

    if !state.auth.owner_emails.iter().any(|owner| owner == &email) {
        state
            .security
            .record(
                "auth_unknown_operator",
                json!({"reason": "email not on owner list", "ip": ip, "email": email}),
            )
            .await;
        return (
            StatusCode::FORBIDDEN,
            axum::Json(json!({"error": "not_an_owner"})),
        )
            .into_response();
    }

    if password != state.auth.dev_password {
        state
            .security
            .record(
                "auth_bad_password",
                json!({"reason": "dev password mismatch", "ip": ip, "email": email}),
            )
            .await;
        return (
            StatusCode::FORBIDDEN,
            axum::Json(json!({"error": "bad_dev_password"})),
        )
            .into_response();
    }

    next.run(request).await
}

/// Token-bucket rate limit on authenticated mutations (non-GET methods).
pub async fn limit_mutations(
    State(state): State<ApiState>,
    request: Request,
    next: Next,
) -> Response {
    if request.method() != Method::GET {
        let ip = client_ip(&request);
        if !state.limiter.allow(&ip).await {
            state
                .security
                .record("rate_limited", json!({"reason": "mutation budget exhausted", "ip": ip}))
                .await;
            return (
                StatusCode::TOO_MANY_REQUESTS,
                axum::Json(json!({"error": "rate_limited"})),
            )
                .into_response();
        }
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bucket_exhausts_and_resets() {
        let limiter = RateLimiter::new(50, 2);
        assert!(limiter.allow("1.2.3.4").await);
        assert!(limiter.allow("1.2.3.4").await);
        assert!(!limiter.allow("1.2.3.4").await);
        // Separate IPs get their own buckets.
        assert!(limiter.allow("5.6.7.8").await);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(limiter.allow("1.2.3.4").await);
    }
}
