use crate::{errors::ProviderError, providers::ai::ImageProvider};
use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::time::Duration;

#[derive(Serialize)]
struct ImageRequest<'a> {
    prompt: &'a str,
    n: u8,
    size: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

#[derive(Deserialize, Debug)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Deserialize, Debug)]
struct ImageData {
    #[serde(default)]
    url: Option<String>,
}

/// A provider for the OpenAI image generation endpoint (`/v1/images/generations`).
#[derive(Clone)]
pub struct OpenAiImageProvider {
    client: ReqwestClient,
    api_url: String,
    api_key: String,
    model: Option<String>,
}

impl Debug for OpenAiImageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiImageProvider")
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OpenAiImageProvider {
    pub fn new(
        api_url: String,
        api_key: String,
        model: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        if api_key.trim().is_empty() {
            return Err(ProviderError::MissingApiKey);
        }
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .build()
            .map_err(ProviderError::ReqwestClientBuild)?;
        Ok(Self {
            client,
            api_url,
            api_key,
            model,
        })
    }
}

#[async_trait]
impl ImageProvider for OpenAiImageProvider {
    async fn generate_images(
        &self,
        prompt: &str,
        count: u8,
        size: &str,
    ) -> Result<Vec<String>, ProviderError> {
        let request_body = ImageRequest {
            prompt,
            n: count.max(1),
            size,
            model: self.model.as_deref(),
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await
            .map_err(ProviderError::from_request)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::AiApi {
                status: status.as_u16(),
                body,
            });
        }

        let image_response: ImageResponse = response
            .json()
            .await
            .map_err(ProviderError::AiDeserialization)?;

        let urls: Vec<String> = image_response
            .data
            .into_iter()
            .filter_map(|d| d.url)
            .collect();

        if urls.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(urls)
    }
}
