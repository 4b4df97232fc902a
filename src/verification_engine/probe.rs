//! Snapshot probing: HTTP fetch, response evaluation, bounded retry.
//!
//! The prober only fetches; deciding online/offline from the response is
//! a pure function per protocol, and the retry loop is an explicit
//! state machine: a successful attempt stops, a protocol violation
//! (reachable camera, wrong payload) stops without retrying, and only
//! transport failures are retried with exponential backoff.

use crate::error::Result;
use crate::protocol_adapter::{ProbeTarget, Protocol};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;

/// The response headers a probe decision needs; the body is never read
#[derive(Debug, Clone)]
pub struct ProbeResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
}

/// Boundary for fetching one snapshot response
#[async_trait]
pub trait SnapshotProber: Send + Sync {
    async fn fetch(&self, target: &ProbeTarget) -> Result<ProbeResponse>;
}

/// Prober backed by a shared, pooled reqwest client
pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    /// `timeout` is the hard per-attempt limit; `pool_size` bounds idle
    /// connections kept per camera host
    pub fn new(timeout: Duration, pool_size: usize) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(pool_size)
            .build()
            .expect("Failed to create HTTP client");
        Self { client }
    }
}

#[async_trait]
impl SnapshotProber for HttpProber {
    async fn fetch(&self, target: &ProbeTarget) -> Result<ProbeResponse> {
        let resp = self
            .client
            .get(&target.url)
            .basic_auth(&target.username, Some(&target.password))
            .send()
            .await?;

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        Ok(ProbeResponse {
            status: resp.status().as_u16(),
            content_length: resp.content_length(),
            content_type,
        })
    }
}

/// Outcome of evaluating a received response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeEval {
    Online,
    /// Camera reachable but the payload fails the protocol's checks;
    /// retrying will not change this
    Violation(String),
}

/// Decide online/offline from response headers.
///
/// Both protocols require HTTP 200 and an image content-type; Intelbras
/// additionally requires a minimum content length to filter placeholder
/// "no signal" frames.
pub fn evaluate(protocol: Protocol, resp: &ProbeResponse, min_image_size: u64) -> ProbeEval {
    if resp.status != 200 {
        return ProbeEval::Violation(format!("HTTP {}", resp.status));
    }
    let is_image = resp
        .content_type
        .as_deref()
        .map(|t| t.starts_with("image"))
        .unwrap_or(false);
    if !is_image {
        return ProbeEval::Violation(format!(
            "unexpected content-type {:?}",
            resp.content_type
        ));
    }
    if protocol == Protocol::Intelbras {
        let len = resp.content_length.unwrap_or(0);
        if len < min_image_size {
            return ProbeEval::Violation(format!("image too small ({} bytes)", len));
        }
    }
    ProbeEval::Online
}

/// Retry policy for transient probe failures
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Extra attempts after the first one
    pub retries: u32,
    /// Backoff before retry n is `backoff_base * 2^n`
    pub backoff_base: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retries: 2,
            backoff_base: Duration::from_secs(1),
        }
    }
}

/// Probe a camera with bounded retries. Returns whether it is online.
///
/// Transport errors (connect failure, timeout) are transient and
/// retried; a protocol violation ends the loop immediately.
pub async fn probe_with_retry(
    prober: &dyn SnapshotProber,
    target: &ProbeTarget,
    camera_name: &str,
    retry: &RetryConfig,
    min_image_size: u64,
) -> bool {
    let attempts = retry.retries + 1;
    let mut last_error = None;

    for attempt in 0..attempts {
        match prober.fetch(target).await {
            Ok(resp) => match evaluate(target.protocol, &resp, min_image_size) {
                ProbeEval::Online => return true,
                ProbeEval::Violation(reason) => {
                    tracing::warn!(
                        camera = %camera_name,
                        protocol = %target.protocol.as_str(),
                        reason = %reason,
                        "Probe rejected, not retrying"
                    );
                    return false;
                }
            },
            Err(e) => {
                last_error = Some(e);
                if attempt + 1 < attempts {
                    // Clamped so extreme retry counts cannot overflow
                    let factor = 2u32.saturating_pow(attempt.min(16));
                    tokio::time::sleep(retry.backoff_base.saturating_mul(factor)).await;
                }
            }
        }
    }

    if let Some(e) = last_error {
        tracing::error!(
            camera = %camera_name,
            protocol = %target.protocol.as_str(),
            error = %e,
            "Probe failed after all attempts"
        );
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn image_response(len: u64) -> ProbeResponse {
        ProbeResponse {
            status: 200,
            content_type: Some("image/jpeg".to_string()),
            content_length: Some(len),
        }
    }

    fn target(protocol: Protocol) -> ProbeTarget {
        ProbeTarget {
            protocol,
            ip: "10.0.0.20".to_string(),
            port: 80,
            channel: protocol.default_channel().to_string(),
            username: "admin".to_string(),
            password: "pw".to_string(),
            url: "http://10.0.0.20:80/test".to_string(),
        }
    }

    #[test]
    fn hikvision_needs_200_and_image_type() {
        assert_eq!(
            evaluate(Protocol::Hikvision, &image_response(10), 1024),
            ProbeEval::Online
        );

        let mut resp = image_response(10);
        resp.status = 401;
        assert!(matches!(
            evaluate(Protocol::Hikvision, &resp, 1024),
            ProbeEval::Violation(_)
        ));

        let mut resp = image_response(10);
        resp.content_type = Some("text/html".to_string());
        assert!(matches!(
            evaluate(Protocol::Hikvision, &resp, 1024),
            ProbeEval::Violation(_)
        ));
    }

    #[test]
    fn intelbras_also_checks_size() {
        assert_eq!(
            evaluate(Protocol::Intelbras, &image_response(2048), 1024),
            ProbeEval::Online
        );
        assert!(matches!(
            evaluate(Protocol::Intelbras, &image_response(512), 1024),
            ProbeEval::Violation(_)
        ));
        // Missing content-length counts as zero
        let mut resp = image_response(0);
        resp.content_length = None;
        assert!(matches!(
            evaluate(Protocol::Intelbras, &resp, 1024),
            ProbeEval::Violation(_)
        ));
    }

    /// Prober that fails transport `failures` times, then succeeds
    struct FlakyProber {
        calls: AtomicU32,
        failures: u32,
    }

    #[async_trait]
    impl SnapshotProber for FlakyProber {
        async fn fetch(&self, _target: &ProbeTarget) -> Result<ProbeResponse> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(Error::Internal("connection refused".to_string()))
            } else {
                Ok(image_response(2048))
            }
        }
    }

    /// Prober that always returns a too-small Intelbras frame
    struct NoSignalProber {
        calls: AtomicU32,
    }

    #[async_trait]
    impl SnapshotProber for NoSignalProber {
        async fn fetch(&self, _target: &ProbeTarget) -> Result<ProbeResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(image_response(100))
        }
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            retries: 2,
            backoff_base: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_success() {
        let prober = FlakyProber {
            calls: AtomicU32::new(0),
            failures: 2,
        };
        let online = probe_with_retry(
            &prober,
            &target(Protocol::Hikvision),
            "cam",
            &fast_retry(),
            1024,
        )
        .await;
        assert!(online);
        assert_eq!(prober.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_retries_mean_offline() {
        let prober = FlakyProber {
            calls: AtomicU32::new(0),
            failures: 10,
        };
        let online = probe_with_retry(
            &prober,
            &target(Protocol::Hikvision),
            "cam",
            &fast_retry(),
            1024,
        )
        .await;
        assert!(!online);
        // retries + 1 attempts
        assert_eq!(prober.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn violation_stops_after_one_attempt() {
        let prober = NoSignalProber {
            calls: AtomicU32::new(0),
        };
        let online = probe_with_retry(
            &prober,
            &target(Protocol::Intelbras),
            "cam",
            &fast_retry(),
            1024,
        )
        .await;
        assert!(!online);
        assert_eq!(prober.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn extreme_retry_counts_do_not_overflow_backoff() {
        let prober = FlakyProber {
            calls: AtomicU32::new(0),
            failures: u32::MAX,
        };
        let retry = RetryConfig {
            retries: 40,
            backoff_base: Duration::from_nanos(1),
        };
        let online = probe_with_retry(
            &prober,
            &target(Protocol::Hikvision),
            "cam",
            &retry,
            1024,
        )
        .await;
        assert!(!online);
        assert_eq!(prober.calls.load(Ordering::SeqCst), 41);
    }
}
