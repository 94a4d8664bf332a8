//! Per-client fixed-window rate limiting for the `/ai` routes.
//!
//! Clients are keyed by peer address. The first `x-forwarded-for` hop is
//! used instead only when the limiter is told to trust it, since any caller
//! can set that header. Each client gets `limit` requests per window; the
//! window restarts on the first request after it expires.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::ApiError;

pub const WINDOW: Duration = Duration::from_secs(60);
const UNKNOWN_CLIENT: &str = "unknown";
/// Expired windows are swept once the table grows past this many clients.
const SWEEP_THRESHOLD: usize = 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

#[derive(Clone, Copy, Debug)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Clone, Debug)]
pub struct FixedWindowLimiter {
    limit: u32,
    window: Duration,
    trust_forwarded_for: bool,
    clients: Arc<Mutex<HashMap<String, Window>>>,
}

impl FixedWindowLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            trust_forwarded_for: false,
            clients: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, WINDOW)
    }

    pub fn trusting_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }

    pub fn client_key(&self, headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
        let forwarded = if self.trust_forwarded_for { first_forwarded_hop(headers) } else { None };
        forwarded
            .or_else(|| peer.map(|addr| addr.ip().to_string()))
            .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
    }

    pub async fn check(&self, client: &str, now: Instant) -> RateDecision {
        let mut clients = self.clients.lock().await;
        if clients.len() > SWEEP_THRESHOLD {
            let window = self.window;
            clients.retain(|_, entry| now.duration_since(entry.started) < window);
        }

        let entry =
            clients.entry(client.to_string()).or_insert(Window { started: now, count: 0 });
        if now.duration_since(entry.started) >= self.window {
            *entry = Window { started: now, count: 0 };
        }

        if entry.count >= self.limit {
            let elapsed = now.duration_since(entry.started);
            return RateDecision::Limited { retry_after: self.window.saturating_sub(elapsed) };
        }

        entry.count += 1;
        RateDecision::Allowed { remaining: self.limit - entry.count }
    }
}

fn first_forwarded_hop(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .map(str::to_string)
}

pub async fn enforce(
    State(limiter): State<FixedWindowLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request.extensions().get::<ConnectInfo<SocketAddr>>().map(|info| info.0);
    let client = limiter.client_key(request.headers(), peer);

    match limiter.check(&client, Instant::now()).await {
        RateDecision::Allowed { remaining } => {
            debug!(event_name = "http.rate_limit.allowed", client = %client, remaining);
            next.run(request).await
        }
        RateDecision::Limited { retry_after } => {
            // Round up so clients never retry inside the closed window.
            let retry_after_secs =
                retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
            warn!(
                event_name = "http.rate_limit.rejected",
                correlation_id = "rate_limit",
                client = %client,
                retry_after_secs,
                "rate limit exceeded"
            );
            ApiError::RateLimited { retry_after_secs }.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::time::{Duration, Instant};

    use axum::http::{HeaderMap, HeaderValue};

    use super::{FixedWindowLimiter, RateDecision};

    #[tokio::test]
    async fn window_admits_limit_then_rejects() {
        let limiter = FixedWindowLimiter::new(2, Duration::from_secs(60));
        let start = Instant::now();

        assert_eq!(limiter.check("a", start).await, RateDecision::Allowed { remaining: 1 });
        assert_eq!(limiter.check("a", start).await, RateDecision::Allowed { remaining: 0 });
        assert_eq!(
            limiter.check("a", start + Duration::from_secs(15)).await,
            RateDecision::Limited { retry_after: Duration::from_secs(45) }
        );
    }

    #[tokio::test]
    async fn clients_are_counted_separately_and_windows_reset() {
        let limiter = FixedWindowLimiter::new(1, Duration::from_secs(60));
        let start = Instant::now();

        assert!(matches!(limiter.check("a", start).await, RateDecision::Allowed { .. }));
        assert!(matches!(limiter.check("b", start).await, RateDecision::Allowed { .. }));
        assert!(matches!(limiter.check("a", start).await, RateDecision::Limited { .. }));
        assert!(matches!(
            limiter.check("a", start + Duration::from_secs(60)).await,
            RateDecision::Allowed { .. }
        ));
    }

    #[test]
    fn client_key_ignores_forwarded_for_unless_trusted() {
        let peer: SocketAddr = "10.0.0.9:5555".parse().expect("addr");
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(" 203.0.113.7 , 10.0.0.1"));

        let direct = FixedWindowLimiter::per_minute(10);
        assert_eq!(direct.client_key(&headers, Some(peer)), "10.0.0.9");
        assert_eq!(direct.client_key(&headers, None), "unknown");

        let proxied = FixedWindowLimiter::per_minute(10).trusting_forwarded_for(true);
        assert_eq!(proxied.client_key(&headers, Some(peer)), "203.0.113.7");
        assert_eq!(proxied.client_key(&HeaderMap::new(), Some(peer)), "10.0.0.9");
    }
}
