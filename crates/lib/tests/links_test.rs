//! # Link Validator Tests
//!
//! Every probe goes to a local `wiremock` server, except the unreachable-host
//! case, which targets a closed local port.

mod common;

use common::setup_tracing;
use seogen::links::{LinkValidator, DEFAULT_LINK_TIMEOUT};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_only_reachable_links_are_kept_in_order() {
    setup_tracing();
    // --- 1. Arrange ---
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/valid"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/dead"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/also-valid"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let valid = format!("{}/valid", server.uri());
    let dead = format!("{}/dead", server.uri());
    let also_valid = format!("{}/also-valid", server.uri());
    let validator = LinkValidator::new(DEFAULT_LINK_TIMEOUT).unwrap();

    // --- 2. Act ---
    let kept = validator
        .retain_valid(&[also_valid.clone(), dead, valid.clone()])
        .await;

    // --- 3. Assert ---
    assert_eq!(kept, vec![also_valid, valid]);
}

#[tokio::test]
async fn test_redirects_are_not_followed() {
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/moved"))
        .respond_with(
            ResponseTemplate::new(301).insert_header("Location", format!("{}/target", server.uri())),
        )
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/target"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let validator = LinkValidator::new(DEFAULT_LINK_TIMEOUT).unwrap();

    assert!(!validator.is_valid(&format!("{}/moved", server.uri())).await);
}

#[tokio::test]
async fn test_unreachable_host_is_invalid() {
    setup_tracing();
    let validator = LinkValidator::new(Duration::from_secs(2)).unwrap();

    assert!(!validator.is_valid("http://127.0.0.1:1/").await);
    assert!(!validator.is_valid("not a url").await);
}

#[tokio::test]
async fn test_slow_links_time_out() {
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let validator = LinkValidator::new(Duration::from_millis(200)).unwrap();

    assert!(!validator.is_valid(&server.uri()).await);
}

#[tokio::test]
async fn test_memoized_validator_probes_each_url_once() {
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/page", server.uri());
    let validator = LinkValidator::new(DEFAULT_LINK_TIMEOUT)
        .unwrap()
        .with_memoization();

    assert!(validator.is_valid(&url).await);
    assert!(validator.is_valid(&url).await);
    assert_eq!(validator.retain_valid(&[url.clone()]).await, vec![url]);
    // `expect(1)` is verified when the server is dropped.
}
