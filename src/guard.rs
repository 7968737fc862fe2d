//! Access control for the admin surface: the per-client rate limit runs first,
//! then Basic authentication. Every admin response, admitted or not, carries
//! the standard `RateLimit-*` headers.

use std::{net::IpAddr, sync::Arc};

use axum::{
    http::{HeaderMap, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::{
    auth::{verify_basic, AdminIdentity},
    error::DeskError,
    rate_limit::{RateLimitHeaders, RateLimiter},
};

#[derive(Debug, Clone)]
pub struct AdminGuard {
    limiter: Arc<RateLimiter>,
    identity: AdminIdentity,
}

/// Proof that a request passed both checks.
#[derive(Debug)]
#[must_use]
pub struct AdminAccess {
    rate: RateLimitHeaders,
}

#[derive(Debug)]
pub struct AdminRejection {
    pub error: DeskError,
    rate: RateLimitHeaders,
}

impl AdminGuard {
    pub fn new(limiter: Arc<RateLimiter>, identity: AdminIdentity) -> Self {
        Self { limiter, identity }
    }

    pub async fn admit(
        &self,
        client: IpAddr,
        headers: &HeaderMap,
    ) -> Result<AdminAccess, AdminRejection> {
        let client_key = client.to_string();
        let decision = self.limiter.check(&client_key).await;
        if !decision.allowed {
            warn!(client = %client_key, "Admin rate limit exceeded");
            return Err(AdminRejection {
                error: DeskError::RateLimited {
                    retry_after_seconds: decision.headers.reset_seconds,
                },
                rate: decision.headers,
            });
        }

        if let Err(reason) = verify_basic(headers, &self.identity) {
            warn!(client = %client_key, reason, "Admin authentication failed");
            return Err(AdminRejection {
                error: DeskError::Unauthorized,
                rate: decision.headers,
            });
        }

        Ok(AdminAccess {
            rate: decision.headers,
        })
    }
}

impl AdminAccess {
    pub fn respond(self, response: impl IntoResponse) -> Response {
        let mut response = response.into_response();
        attach_rate_headers(&mut response, &self.rate);
        response
    }
}

impl IntoResponse for AdminRejection {
    fn into_response(self) -> Response {
        let mut response = self.error.into_response();
        attach_rate_headers(&mut response, &self.rate);
        response
    }
}

fn attach_rate_headers(response: &mut Response, rate: &RateLimitHeaders) {
    let headers = response.headers_mut();
    let entries = [
        ("ratelimit-limit", rate.limit.to_string()),
        ("ratelimit-remaining", rate.remaining.to_string()),
        ("ratelimit-reset", rate.reset_seconds.to_string()),
        (
            "ratelimit-policy",
            format!("{};w={}", rate.limit, rate.window_seconds),
        ),
    ];
    for (name, value) in entries {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("0")),
        );
    }
}

#[cfg(test)]
mod tests {
    use std::{net::Ipv4Addr, time::Duration};

    use axum::http::{header::AUTHORIZATION, StatusCode};
    use base64::{engine::general_purpose::STANDARD, Engine as _};

    use super::*;

    fn guard(max: u32) -> AdminGuard {
        AdminGuard::new(
            Arc::new(RateLimiter::new(Duration::from_secs(15 * 60), max)),
            AdminIdentity::new("admin", "s3cret"),
        )
    }

    fn auth_headers(user: &str, pass: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let encoded = STANDARD.encode(format!("{user}:{pass}"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {encoded}")).unwrap(),
        );
        headers
    }

    const CLIENT: IpAddr = IpAddr::V4(Ipv4Addr::new(203, 0, 113, 9));

    #[tokio::test]
    async fn admits_valid_credentials_under_limit() {
        let guard = guard(100);
        let access = guard.admit(CLIENT, &auth_headers("admin", "s3cret")).await;
        let response = access.unwrap().respond(StatusCode::OK);
        assert_eq!(response.headers().get("ratelimit-limit").unwrap(), "100");
        assert_eq!(response.headers().get("ratelimit-remaining").unwrap(), "99");
        assert_eq!(response.headers().get("ratelimit-policy").unwrap(), "100;w=900");
        assert!(response.headers().get("x-ratelimit-limit").is_none());
    }

    #[tokio::test]
    async fn wrong_credentials_get_challenge_and_rate_headers() {
        let guard = guard(100);
        let rejection = guard
            .admit(CLIENT, &auth_headers("admin", "nope"))
            .await
            .unwrap_err();
        assert!(matches!(rejection.error, DeskError::Unauthorized));

        let response = rejection.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key("www-authenticate"));
        assert!(response.headers().contains_key("ratelimit-remaining"));
    }

    #[tokio::test]
    async fn limit_applies_before_authentication() {
        let guard = guard(100);
        for i in 0..100 {
            let headers = if i % 2 == 0 {
                auth_headers("admin", "s3cret")
            } else {
                auth_headers("guess", "guess")
            };
            let _ = guard.admit(CLIENT, &headers).await;
        }

        let rejection = guard
            .admit(CLIENT, &auth_headers("admin", "s3cret"))
            .await
            .unwrap_err();
        assert!(matches!(rejection.error, DeskError::RateLimited { .. }));
        let response = rejection.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("ratelimit-remaining").unwrap(), "0");
        assert!(response.headers().contains_key("retry-after"));
    }
}
