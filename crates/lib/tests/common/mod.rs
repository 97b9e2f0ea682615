#![allow(dead_code)]
//! # Common Test Utilities
//!
//! Shared setup for the integration tests: tracing, and builders for pipelines
//! wired to mock providers.

use dotenvy::dotenv;
use seogen::links::LinkValidator;
use seogen::pipeline::ItemPipeline;
use seogen::prompts::PromptTemplates;
use seogen::rate_limit::RateLimiter;
use seogen_test_utils::MockAiProvider;
use std::collections::HashMap;
use std::sync::{Arc, Once};
use std::time::Duration;

static INIT: Once = Once::new();

/// Initializes the tracing subscriber and loads .env for tests.
pub fn setup_tracing() {
    INIT.call_once(|| {
        dotenv().ok();
        tracing_subscriber::fmt::init();
    });
}

/// The content template used across the pipeline tests.
pub const CONTENT_TEMPLATE: &str = "Tell me about {option} in {city}, {country}";

pub fn templates() -> Arc<PromptTemplates> {
    Arc::new(PromptTemplates::from_map(HashMap::from([
        ("content".to_string(), CONTENT_TEMPLATE.to_string()),
        (
            "options".to_string(),
            "List cheap places to eat in {city}, {country} as {{\"1\": name}}".to_string(),
        ),
        ("images".to_string(), "A photo of {option} in {city}".to_string()),
        (
            "city".to_string(),
            "Describe {city}, {country}. Nearby: {city_list}".to_string(),
        ),
    ])))
}

/// A pipeline backed by `provider` with a generous limiter and a short link timeout.
pub fn pipeline(provider: &MockAiProvider) -> ItemPipeline {
    ItemPipeline::new(
        Arc::new(provider.clone()),
        Arc::new(RateLimiter::per_minute(1000)),
        Arc::new(LinkValidator::new(Duration::from_secs(2)).unwrap()),
        templates(),
    )
}
