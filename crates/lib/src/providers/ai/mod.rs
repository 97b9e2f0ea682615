pub mod gemini;
pub mod images;
pub mod openai;

use crate::errors::ProviderError;
use async_trait::async_trait;
use std::fmt::Debug;

/// A trait for interacting with a text-generation provider.
///
/// Implementations send one completion request per call. Rate limiting is the
/// caller's concern; see [`crate::rate_limit::RateLimiter`].
#[async_trait]
pub trait AiProvider: Send + Sync + Debug {
    /// Generates a completion from a system prompt and a user prompt.
    ///
    /// An empty completion is reported as [`ProviderError::EmptyResponse`].
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, ProviderError>;
}

/// A trait for interacting with an image-generation provider.
#[async_trait]
pub trait ImageProvider: Send + Sync + Debug {
    /// Requests `count` images of the given `size` (e.g. `"512x512"`) and
    /// returns their download URLs.
    async fn generate_images(
        &self,
        prompt: &str,
        count: u8,
        size: &str,
    ) -> Result<Vec<String>, ProviderError>;
}
