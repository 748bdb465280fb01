//! Edge case tests for vitrine-net
//!
//! Responses, the in-memory fetcher and single-flight behaviour under load.

use std::sync::Arc;
use std::time::Duration;

use vitrine_net::*;

// ============================================================================
// RESPONSE TESTS
// ============================================================================

#[test]
fn test_content_length_missing() {
    let resp = Response::new(200, "OK", b"abc".to_vec());
    assert_eq!(resp.content_length(), None);
}

#[test]
fn test_content_length_garbage() {
    let resp = Response::new(200, "OK", vec![]).with_header("Content-Length", "lots");
    assert_eq!(resp.content_length(), None);
}

#[test]
fn test_service_unavailable() {
    let resp = Response::service_unavailable("Resource not available offline");
    assert_eq!(resp.status, 503);
    assert!(!resp.ok());
    assert_eq!(resp.bytes(), b"Resource not available offline");
}

// ============================================================================
// SINGLE-FLIGHT OVER A FETCHER
// ============================================================================

#[test]
fn test_single_flight_fetch_hits_network_once() {
    let fetcher = Arc::new(StaticFetcher::new().with_latency(Duration::from_millis(30)));
    fetcher.route_bytes("https://site.test/a.jpg", vec![9; 16], "image/jpeg");

    let flights: SingleFlight<String, Result<Response, NetError>> = SingleFlight::new();
    let url = "https://site.test/a.jpg".to_string();

    let call = || {
        let fetcher = Arc::clone(&fetcher);
        let url = url.clone();
        flights.run(url.clone(), move || async move { fetcher.get(&url).await })
    };

    let results = smol::block_on(futures::future::join_all((0..5).map(|_| call())));

    assert_eq!(fetcher.request_count("https://site.test/a.jpg"), 1);
    assert!(results.iter().all(|f| matches!(f.value, Ok(ref r) if r.body.len() == 16)));
    assert_eq!(results.iter().filter(|f| f.was_deduplicated).count(), 4);
    assert!((flights.stats().dedup_rate() - 0.8).abs() < 1e-9);
}

#[test]
fn test_single_flight_shares_failures() {
    let fetcher = Arc::new(StaticFetcher::new());
    fetcher.set_offline(true);

    let flights: SingleFlight<String, Result<Response, NetError>> = SingleFlight::new();
    let f = Arc::clone(&fetcher);
    let flight = smol::block_on(flights.run("k".into(), move || async move {
        f.get("https://site.test/b.jpg").await
    }));

    assert!(matches!(flight.value, Err(NetError::Offline { .. })));
    assert!(!flights.is_pending(&"k".to_string()));
}
