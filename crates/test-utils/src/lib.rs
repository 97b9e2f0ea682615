use anyhow::Result;
use async_trait::async_trait;
use seogen::errors::ProviderError;
use seogen::providers::ai::{AiProvider, ImageProvider};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

// --- Mock AI Provider ---

/// A scripted answer of the mock provider.
#[derive(Clone, Debug)]
pub enum MockReply {
    Text(String),
    /// The upstream answered with a non-success status.
    Status(u16, String),
    Empty,
}

/// One recorded call: system prompt, user prompt and when it was made.
#[derive(Clone, Debug)]
pub struct RecordedCall {
    pub system_prompt: String,
    pub user_prompt: String,
    pub at: Instant,
}

#[derive(Clone, Debug, Default)]
pub struct MockAiProvider {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl MockAiProvider {
    /// A provider answering with `responses` in order, then with `EmptyResponse`.
    pub fn new<S: Into<String>>(responses: impl IntoIterator<Item = S>) -> Self {
        let provider = Self::default();
        for response in responses {
            provider.push(MockReply::Text(response.into()));
        }
        provider
    }

    pub fn push(&self, reply: MockReply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    /// Retrieves the recorded calls for assertion.
    pub fn get_calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl AiProvider for MockAiProvider {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, ProviderError> {
        self.calls.lock().unwrap().push(RecordedCall {
            system_prompt: system_prompt.to_string(),
            user_prompt: user_prompt.to_string(),
            at: Instant::now(),
        });

        match self.replies.lock().unwrap().pop_front() {
            Some(MockReply::Text(text)) => Ok(text),
            Some(MockReply::Status(status, body)) => Err(ProviderError::AiApi { status, body }),
            Some(MockReply::Empty) | None => Err(ProviderError::EmptyResponse),
        }
    }
}

// --- Mock Image Provider ---

/// Answers every request with the same list of image URLs.
#[derive(Clone, Debug, Default)]
pub struct MockImageProvider {
    urls: Vec<String>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockImageProvider {
    pub fn new(urls: Vec<String>) -> Self {
        Self {
            urls,
            prompts: Arc::default(),
        }
    }

    pub fn get_prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageProvider for MockImageProvider {
    async fn generate_images(
        &self,
        prompt: &str,
        _count: u8,
        _size: &str,
    ) -> Result<Vec<String>, ProviderError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.urls.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(self.urls.clone())
    }
}

// --- On-disk fixtures ---

/// Writes a `city,country,id_city` catalog and returns its path.
pub fn write_cities_csv(dir: &Path, rows: &[(&str, &str)]) -> Result<PathBuf> {
    let path = dir.join("cities.csv");
    let mut content = String::from("city,country,id_city\n");
    for (i, (city, country)) in rows.iter().enumerate() {
        content.push_str(&format!("{city},{country},{}\n", i + 1));
    }
    std::fs::write(&path, content)?;
    Ok(path)
}

/// Writes a template file of `(name, template)` pairs and returns its path.
pub fn write_prompts(dir: &Path, templates: &[(&str, &str)]) -> Result<PathBuf> {
    let path = dir.join("prompts.json");
    let map: serde_json::Map<String, serde_json::Value> = templates
        .iter()
        .map(|(name, template)| (name.to_string(), serde_json::Value::from(*template)))
        .collect();
    std::fs::write(&path, serde_json::to_string_pretty(&map)?)?;
    Ok(path)
}

/// Writes `<dir>/<city_key>.json` with the given option list.
pub fn write_options(dir: &Path, city_key: &str, options: serde_json::Value) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{city_key}.json"));
    std::fs::write(&path, serde_json::to_string_pretty(&options)?)?;
    Ok(path)
}

/// A well-formed content answer for `option`, listing `links`.
pub fn content_response(option: &str, links: &[&str]) -> String {
    serde_json::json!({
        "meta": format!("Meta for {option}"),
        "keywords": format!("{option}, travel, guide"),
        "title": format!("Visiting {option}"),
        "text": format!("A long text about {option}."),
        "links": links,
    })
    .to_string()
}
