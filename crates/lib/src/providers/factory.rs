//! # Provider Factory
//!
//! Builds provider instances from configuration. A batch with several
//! credentials calls these once per credential, so every worker owns its own
//! client.

use crate::{
    errors::ProviderError,
    providers::ai::{
        gemini::GeminiProvider, images::OpenAiImageProvider, openai::OpenAiProvider, AiProvider,
        ImageProvider,
    },
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub const DEFAULT_OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_OPENAI_IMAGES_URL: &str = "https://api.openai.com/v1/images/generations";

/// The text-generation backends this crate can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenAi,
    Gemini,
}

/// Settings shared by every text-generation worker.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSettings {
    #[serde(default)]
    pub kind: ProviderKind,
    /// The API URL. Derived from `model` for Gemini when not set.
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_request_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            kind: ProviderKind::default(),
            api_url: None,
            model: default_model(),
            timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ProviderSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The endpoint requests are sent to.
    pub fn resolved_url(&self) -> String {
        match (&self.api_url, self.kind) {
            (Some(url), _) => url.clone(),
            (None, ProviderKind::OpenAi) => DEFAULT_OPENAI_CHAT_URL.to_string(),
            (None, ProviderKind::Gemini) => format!(
                "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
                self.model
            ),
        }
    }
}

/// Creates a text-generation provider bound to one credential.
pub fn create_ai_provider(
    settings: &ProviderSettings,
    api_key: &str,
) -> Result<Arc<dyn AiProvider>, ProviderError> {
    let api_url = settings.resolved_url();
    info!(kind = ?settings.kind, %api_url, model = %settings.model, "Configuring AI provider");

    let provider: Arc<dyn AiProvider> = match settings.kind {
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(
            api_url,
            api_key.to_string(),
            settings.model.clone(),
            settings.timeout(),
        )?),
        ProviderKind::Gemini => Arc::new(GeminiProvider::new(
            api_url,
            api_key.to_string(),
            settings.timeout(),
        )?),
    };
    Ok(provider)
}

/// Creates an image-generation provider bound to one credential.
pub fn create_image_provider(
    api_url: Option<&str>,
    api_key: &str,
    model: Option<String>,
    timeout: Duration,
) -> Result<Arc<dyn ImageProvider>, ProviderError> {
    let api_url = api_url.unwrap_or(DEFAULT_OPENAI_IMAGES_URL).to_string();
    info!(%api_url, "Configuring image provider");
    Ok(Arc::new(OpenAiImageProvider::new(
        api_url,
        api_key.to_string(),
        model,
        timeout,
    )?))
}
