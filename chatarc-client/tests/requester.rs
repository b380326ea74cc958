//! Retry, pacing, and cancellation behavior of the rate-limited requester.
//! Time is paused so backoff and pacing delays auto-advance instantly.

mod support;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use chatarc_client::error::ClientError;
use chatarc_client::{BearerToken, Method, PacingConfig, RateLimitedRequester};

use support::{QueueSupplier, ScriptedTransport, Step};

fn requester(
    transport: Arc<ScriptedTransport>,
    cancel: CancellationToken,
) -> RateLimitedRequester {
    RateLimitedRequester::new(
        transport,
        Arc::new(BearerToken::new("token-1")),
        PacingConfig::default(),
        cancel,
    )
}

#[tokio::test(start_paused = true)]
async fn rate_limits_are_retried_without_consuming_attempts() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        Step::RateLimited { retry_after: Some(7) },
        Step::RateLimited { retry_after: None },
        Step::Body(b"payload".to_vec()),
    ]));
    let mut requester = requester(transport.clone(), CancellationToken::new());

    let response = requester
        .execute(Method::Get, "https://api.test/conversations", None)
        .await
        .unwrap();

    assert_eq!(response.body, b"payload");
    // one delay/retry cycle per 429 observed
    assert_eq!(transport.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn retries_exhausted_surface_network_error() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        Step::Status(500),
        Step::TransportError("connection reset".to_owned()),
        Step::Status(502),
    ]));
    let mut requester = requester(transport.clone(), CancellationToken::new());

    let err = requester
        .execute(Method::Get, "https://api.test/conversations", None)
        .await
        .unwrap_err();

    match err {
        ClientError::Network { attempts, message, .. } => {
            assert_eq!(attempts, 3);
            assert_eq!(message, "HTTP 502");
        }
        other => panic!("expected Network, got {other:?}"),
    }
    assert_eq!(transport.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn token_refreshed_once_on_401() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        Step::Status(401),
        Step::Body(b"ok".to_vec()),
    ]));
    let mut requester = RateLimitedRequester::new(
        transport.clone(),
        Arc::new(QueueSupplier::new(&["stale", "fresh"])),
        PacingConfig::default(),
        CancellationToken::new(),
    );

    requester
        .execute(Method::Get, "https://api.test/conversations", None)
        .await
        .unwrap();

    let sent = transport.sent.lock().unwrap();
    assert_eq!(sent[0].1.as_deref(), Some("stale"));
    assert_eq!(sent[1].1.as_deref(), Some("fresh"));
}

#[tokio::test(start_paused = true)]
async fn supplier_failure_surfaces_auth_expired_immediately() {
    let transport = Arc::new(ScriptedTransport::new(vec![Step::Status(401)]));
    // single token: the refresh attempt finds the queue empty
    let mut requester = RateLimitedRequester::new(
        transport.clone(),
        Arc::new(QueueSupplier::new(&["only"])),
        PacingConfig::default(),
        CancellationToken::new(),
    );

    let err = requester
        .execute(Method::Get, "https://api.test/conversations", None)
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::AuthExpired));
    // no further retries after the supplier fails
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancellation_observed_before_any_request() {
    let transport = Arc::new(ScriptedTransport::new(vec![Step::Body(Vec::new())]));
    let cancel = CancellationToken::new();
    cancel.cancel();
    let mut requester = requester(transport.clone(), cancel);

    let err = requester
        .execute(Method::Get, "https://api.test/conversations", None)
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Cancelled));
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn first_request_unthrottled_second_request_paced() {
    let transport = Arc::new(ScriptedTransport::new(vec![
        Step::Body(Vec::new()),
        Step::Body(Vec::new()),
    ]));
    let mut requester = requester(transport, CancellationToken::new());

    let start = tokio::time::Instant::now();
    requester
        .execute(Method::Get, "https://api.test/a", None)
        .await
        .unwrap();
    assert_eq!(start.elapsed(), Duration::ZERO);

    requester
        .execute(Method::Get, "https://api.test/b", None)
        .await
        .unwrap();
    let paced = start.elapsed();
    assert!(paced >= Duration::from_millis(100), "paced {paced:?}");
    assert!(paced <= Duration::from_millis(3300), "paced {paced:?}");
}
