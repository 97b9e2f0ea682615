//! # Rate Limiter Tests
//!
//! These run on a paused tokio clock, so the suspended waits complete instantly
//! while `Instant::now()` still advances by the slept durations.

use seogen::rate_limit::{RateLimiter, ONE_MINUTE};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Counts the calls inside every window that starts at one of the calls.
fn max_calls_in_any_window(calls: &[Instant], window: Duration) -> usize {
    calls
        .iter()
        .map(|start| {
            calls
                .iter()
                .filter(|t| **t >= *start && t.duration_since(*start) < window)
                .count()
        })
        .max()
        .unwrap_or(0)
}

#[tokio::test(start_paused = true)]
async fn test_calls_below_the_budget_are_not_delayed() {
    let limiter = RateLimiter::per_minute(3);
    let start = Instant::now();

    for _ in 0..3 {
        limiter.acquire().await;
    }

    assert_eq!(start.elapsed(), Duration::ZERO);
    assert_eq!(limiter.recent_calls().await, 3);
}

#[tokio::test(start_paused = true)]
async fn test_any_window_holds_at_most_k_calls() {
    // --- 1. Arrange ---
    let limiter = RateLimiter::per_minute(3);
    let mut calls = Vec::new();

    // --- 2. Act ---
    for _ in 0..10 {
        limiter.acquire().await;
        calls.push(Instant::now());
    }

    // --- 3. Assert ---
    assert_eq!(max_calls_in_any_window(&calls, ONE_MINUTE), 3);
    assert!(calls.windows(2).all(|pair| pair[0] <= pair[1]));
    // The fourth call has to wait for the first to leave the window.
    assert!(calls[3].duration_since(calls[0]) >= ONE_MINUTE);
}

#[tokio::test(start_paused = true)]
async fn test_calls_are_spaced_once_the_window_is_full() {
    let limiter = RateLimiter::new(2, Duration::from_secs(10));

    limiter.acquire().await;
    tokio::time::advance(Duration::from_secs(8)).await;
    limiter.acquire().await;
    let second = Instant::now();

    // The first call expires at t=10, but the even spacing (5s) since the
    // second call at t=8 pushes the third to t=13.
    limiter.acquire().await;
    assert_eq!(Instant::now().duration_since(second), Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn test_old_calls_leave_the_window() {
    let limiter = RateLimiter::per_minute(2);
    limiter.acquire().await;
    limiter.acquire().await;
    assert_eq!(limiter.recent_calls().await, 2);

    tokio::time::advance(ONE_MINUTE).await;

    assert_eq!(limiter.recent_calls().await, 0);
    let start = Instant::now();
    limiter.acquire().await;
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_tasks_sharing_a_limiter_respect_the_budget() {
    let limiter = Arc::new(RateLimiter::per_minute(2));

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let limiter = Arc::clone(&limiter);
            tokio::spawn(async move {
                limiter.acquire().await;
                Instant::now()
            })
        })
        .collect();

    let mut calls = Vec::new();
    for handle in handles {
        calls.push(handle.await.unwrap());
    }
    calls.sort();

    assert_eq!(max_calls_in_any_window(&calls, ONE_MINUTE), 2);
}

#[test]
fn test_zero_budget_is_treated_as_one() {
    let limiter = RateLimiter::new(0, ONE_MINUTE);
    assert_eq!(limiter.max_calls(), 1);
    assert_eq!(limiter.window(), ONE_MINUTE);
}
