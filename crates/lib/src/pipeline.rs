//! # Per-Item Generation Pipeline
//!
//! Drives one item through
//! `Pending → PromptComposed → ResponseReceived → Normalized → Validated`,
//! after which the batch driver persists the record. Any failure ends the item
//! in the `Discarded` state, tagged with the stage it had reached and the
//! reason. There is no retry: a discarded item is left for a later repair pass.

use crate::data::storage_key;
use crate::errors::ItemError;
use crate::links::LinkValidator;
use crate::normalize::{parse, repair, NormalizedPayload};
use crate::prompts::{PromptTemplates, CONTENT_TEMPLATE, DEFAULT_SYSTEM_PROMPT, IMAGE_TEMPLATE};
use crate::providers::ai::{AiProvider, ImageProvider};
use crate::rate_limit::RateLimiter;
use crate::storage::ImageStore;
use crate::types::{ContentRecord, Item};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// The payload keys every content response must carry.
pub const REQUIRED_FIELDS: [&str; 5] = ["meta", "keywords", "title", "text", "links"];

/// The last state an item reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ItemStage {
    Pending,
    PromptComposed,
    ResponseReceived,
    Normalized,
    Validated,
    Persisted,
}

impl fmt::Display for ItemStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ItemStage::Pending => "pending",
            ItemStage::PromptComposed => "prompt-composed",
            ItemStage::ResponseReceived => "response-received",
            ItemStage::Normalized => "normalized",
            ItemStage::Validated => "validated",
            ItemStage::Persisted => "persisted",
        };
        f.write_str(name)
    }
}

/// The terminal failure state of an item.
#[derive(Debug, Error)]
#[error("item '{key}' discarded after stage '{stage}': {error}")]
pub struct Discarded {
    pub key: String,
    pub stage: ItemStage,
    #[source]
    pub error: ItemError,
}

/// Optional illustration step run once an item's text has been validated.
#[derive(Debug, Clone)]
pub struct ImageStage {
    provider: Arc<dyn ImageProvider>,
    limiter: Arc<RateLimiter>,
    store: ImageStore,
    public_base_url: String,
    template: String,
    count: u8,
    size: String,
}

impl ImageStage {
    /// `public_base_url` is the URL the image directory is served from; stored
    /// records point at `<public_base_url>/<city_key>/<file>`.
    pub fn new(
        provider: Arc<dyn ImageProvider>,
        limiter: Arc<RateLimiter>,
        store: ImageStore,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            limiter,
            store,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            template: IMAGE_TEMPLATE.to_string(),
            count: 1,
            size: "512x512".to_string(),
        }
    }

    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = size.into();
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    async fn illustrate(
        &self,
        templates: &PromptTemplates,
        item: &Item,
        text: &str,
    ) -> Result<Vec<String>, ItemError> {
        let mut values = item.template_values();
        values.insert("text", text.to_string());
        let prompt = templates.render(&self.template, &values)?;

        self.limiter.acquire().await;
        let urls = self
            .provider
            .generate_images(&prompt, self.count, &self.size)
            .await
            .map_err(|e| ItemError::Image(format!("image generation failed: {e}")))?;
        let url = urls
            .first()
            .ok_or_else(|| ItemError::Image("image provider returned no URL".to_string()))?;

        let city_key = storage_key(&item.city);
        let file = self.store.download(url, &city_key, &item.key, &item.option).await?;
        Ok(vec![format!("{}/{city_key}/{file}", self.public_base_url)])
    }
}

/// The governed path from an item to a validated [`ContentRecord`].
#[derive(Debug, Clone)]
pub struct ItemPipeline {
    provider: Arc<dyn AiProvider>,
    limiter: Arc<RateLimiter>,
    links: Arc<LinkValidator>,
    templates: Arc<PromptTemplates>,
    system_prompt: String,
    content_template: String,
    images: Option<ImageStage>,
}

impl ItemPipeline {
    pub fn new(
        provider: Arc<dyn AiProvider>,
        limiter: Arc<RateLimiter>,
        links: Arc<LinkValidator>,
        templates: Arc<PromptTemplates>,
    ) -> Self {
        Self {
            provider,
            limiter,
            links,
            templates,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            content_template: CONTENT_TEMPLATE.to_string(),
            images: None,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn with_content_template(mut self, name: impl Into<String>) -> Self {
        self.content_template = name.into();
        self
    }

    pub fn with_images(mut self, images: ImageStage) -> Self {
        self.images = Some(images);
        self
    }

    pub fn templates(&self) -> &PromptTemplates {
        &self.templates
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// `Pending → PromptComposed`.
    pub fn compose(&self, item: &Item) -> Result<String, ItemError> {
        Ok(self
            .templates
            .render(&self.content_template, &item.template_values())?)
    }

    /// `PromptComposed → ResponseReceived`: waits for the rate limiter, then calls
    /// the provider once.
    pub async fn call(&self, prompt: &str) -> Result<String, ItemError> {
        self.limiter.acquire().await;
        debug!(prompt = %prompt, "--> Sending prompt to AI provider");
        let raw = self.provider.generate(&self.system_prompt, prompt).await?;
        debug!("<-- Response from AI provider: {}", raw);
        Ok(raw)
    }

    /// A governed call whose answer is repaired and parsed as a JSON object.
    pub async fn ask(&self, prompt: &str) -> Result<NormalizedPayload, ItemError> {
        let raw = self.call(prompt).await?;
        parse_response(&raw)
    }

    /// Runs one item through every stage.
    pub async fn process(&self, item: &Item) -> Result<ContentRecord, Discarded> {
        info!(key = %item.key, option = %item.option, "Processing item");
        let mut stage = ItemStage::Pending;

        let result = async {
            let prompt = self.compose(item)?;
            stage = ItemStage::PromptComposed;

            let raw = self.call(&prompt).await?;
            stage = ItemStage::ResponseReceived;

            let payload = parse_response(&raw)?;
            stage = ItemStage::Normalized;

            self.validate(item, &payload).await
        }
        .await;

        match result {
            Ok(record) => {
                info!(key = %item.key, option = %item.option, links = record.links.len(), "Item validated");
                Ok(record)
            }
            Err(error) => {
                error!(key = %item.key, option = %item.option, %stage, %error, "Item discarded");
                Err(Discarded {
                    key: item.key.clone(),
                    stage,
                    error,
                })
            }
        }
    }

    /// `Normalized → Validated`: extracts the required fields, filters links and
    /// runs the image stage when configured.
    async fn validate(
        &self,
        item: &Item,
        payload: &NormalizedPayload,
    ) -> Result<ContentRecord, ItemError> {
        if let Some(missing) = REQUIRED_FIELDS.iter().find(|f| !payload.contains_key(**f)) {
            return Err(ItemError::MissingField(missing.to_string()));
        }

        let meta = string_field(payload, "meta")?;
        let keywords = keywords_field(payload)?;
        let title = string_field(payload, "title")?;
        let text = string_field(payload, "text")?;
        let candidates = links_field(payload)?;

        let links = self.links.retain_valid(&candidates).await;
        if links.len() < candidates.len() {
            warn!(
                key = %item.key,
                dropped = candidates.len() - links.len(),
                "Skipped links that failed validation"
            );
        }

        let images = match &self.images {
            Some(stage) => stage.illustrate(&self.templates, item, &text).await?,
            None => Vec::new(),
        };

        Ok(ContentRecord {
            name: item.option.clone(),
            location: item.location(),
            meta,
            keywords,
            title,
            text,
            links,
            images,
        })
    }
}

/// `ResponseReceived → Normalized`.
fn parse_response(raw: &str) -> Result<NormalizedPayload, ItemError> {
    let repaired = repair(raw);
    if !repaired.applied.is_empty() {
        debug!(rules = ?repaired.applied, "Repaired response before parsing");
    }
    parse(&repaired.text).inspect_err(|e| {
        if let ItemError::MalformedResponse { line, column, found, .. } = e {
            error!(
                line,
                column,
                found = ?found,
                rules = ?repaired.applied,
                "Response is not valid JSON after repair"
            );
        }
    })
}

fn string_field(payload: &NormalizedPayload, field: &str) -> Result<String, ItemError> {
    match payload.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(ItemError::InvalidField {
            field: field.to_string(),
            expected: "a string",
        }),
        None => Err(ItemError::MissingField(field.to_string())),
    }
}

/// Keywords arrive either as `"a, b, c"` or as `["a", "b", "c"]`.
fn keywords_field(payload: &NormalizedPayload) -> Result<Vec<String>, ItemError> {
    let invalid = || ItemError::InvalidField {
        field: "keywords".to_string(),
        expected: "a comma-separated string or an array of strings",
    };
    match payload.get("keywords") {
        Some(Value::String(s)) => Ok(s
            .split(", ")
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| v.as_str().map(str::to_string).ok_or_else(invalid))
            .collect(),
        Some(_) => Err(invalid()),
        None => Err(ItemError::MissingField("keywords".to_string())),
    }
}

fn links_field(payload: &NormalizedPayload) -> Result<Vec<String>, ItemError> {
    match payload.get("links") {
        Some(Value::Array(items)) => Ok(items
            .iter()
            .filter_map(|v| v.as_str())
            .map(str::to_string)
            .collect()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(Vec::new()),
        Some(Value::String(s)) => Ok(vec![s.clone()]),
        Some(_) => Err(ItemError::InvalidField {
            field: "links".to_string(),
            expected: "an array of URLs",
        }),
        None => Err(ItemError::MissingField("links".to_string())),
    }
}
