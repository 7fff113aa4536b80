//! Per-client ceiling on upload requests.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};

use crate::error::AppError;
use crate::state::AppState;

pub type UploadRateLimiter = DefaultKeyedRateLimiter<IpAddr>;

/// Allows `max_requests` per client address, replenished evenly over `window`.
pub fn build_upload_limiter(max_requests: u32, window: Duration) -> Arc<UploadRateLimiter> {
    let burst = NonZeroU32::new(max_requests).unwrap_or(NonZeroU32::MIN);
    let quota = Quota::with_period(window / burst.get())
        .map(|quota| quota.allow_burst(burst))
        .unwrap_or_else(|| Quota::per_second(burst));
    Arc::new(RateLimiter::keyed(quota))
}

pub async fn limit_uploads(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let client = client_address(&request);
    if state.upload_limiter.check_key(&client).is_err() {
        tracing::warn!(%client, "upload rate limit exceeded");
        return Err(AppError::too_many_requests());
    }
    Ok(next.run(request).await)
}

/// First `X-Forwarded-For` hop, else the socket peer.
fn client_address(request: &Request) -> IpAddr {
    let forwarded = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .and_then(|value| value.trim().parse::<IpAddr>().ok());

    forwarded
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        })
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}
