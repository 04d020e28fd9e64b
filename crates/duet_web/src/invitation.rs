//! Invitation image generation.

use crate::config::ImageApiConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

const IMAGE_SIZE: &str = "512x512";

#[derive(Debug)]
pub enum ExternalServiceError {
    /// No API key configured.
    NotConfigured,
    Transport(String),
    Status(u16),
    /// Response body was not the expected JSON shape or held no image.
    Decode(String),
}

impl Display for ExternalServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotConfigured => write!(f, "image generation is not configured"),
            Self::Transport(details) => write!(f, "image service unreachable: {details}"),
            Self::Status(status) => write!(f, "image service returned status {status}"),
            Self::Decode(details) => write!(f, "image service response unreadable: {details}"),
        }
    }
}

impl Error for ExternalServiceError {}

/// Turns a text prompt into the URL of a generated image.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ExternalServiceError>;
}

/// Client for an OpenAI-compatible `images/generations` endpoint.
pub struct OpenAiImageClient {
    http_client: reqwest::Client,
    config: ImageApiConfig,
}

#[derive(Serialize)]
struct GenerationRequest<'a> {
    prompt: &'a str,
    n: u8,
    size: &'a str,
}

#[derive(Deserialize)]
struct GenerationResponse {
    data: Vec<GeneratedImage>,
}

#[derive(Deserialize)]
struct GeneratedImage {
    url: Option<String>,
}

impl OpenAiImageClient {
    pub fn new(config: ImageApiConfig) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            http_client,
            config,
        })
    }
}

#[async_trait]
impl ImageGenerator for OpenAiImageClient {
    async fn generate(&self, prompt: &str) -> Result<String, ExternalServiceError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(ExternalServiceError::NotConfigured)?;

        let response = self
            .http_client
            .post(&self.config.api_url)
            .bearer_auth(api_key)
            .json(&GenerationRequest {
                prompt,
                n: 1,
                size: IMAGE_SIZE,
            })
            .send()
            .await
            .map_err(|err| ExternalServiceError::Transport(err.to_string()))?;

        if !response.status().is_success() {
            return Err(ExternalServiceError::Status(response.status().as_u16()));
        }

        let body: GenerationResponse = response
            .json()
            .await
            .map_err(|err| ExternalServiceError::Decode(err.to_string()))?;
        first_image_url(body)
    }
}

fn first_image_url(body: GenerationResponse) -> Result<String, ExternalServiceError> {
    body.data
        .into_iter()
        .next()
        .and_then(|image| image.url)
        .filter(|url| !url.is_empty())
        .ok_or_else(|| ExternalServiceError::Decode("no image url in response".to_string()))
}

#[cfg(test)]
mod tests {
    use super::{
        first_image_url, ExternalServiceError, GenerationRequest, GenerationResponse,
        ImageGenerator, OpenAiImageClient,
    };
    use crate::config::ImageApiConfig;
    use std::time::Duration;

    #[test]
    fn request_body_asks_for_one_small_image() {
        let body = serde_json::to_value(GenerationRequest {
            prompt: "two cats",
            n: 1,
            size: super::IMAGE_SIZE,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"prompt": "two cats", "n": 1, "size": "512x512"})
        );
    }

    #[test]
    fn first_url_is_taken_from_data() {
        let body: GenerationResponse = serde_json::from_str(
            r#"{"created": 1, "data": [{"url": "https://img.example/1.png"}, {"url": "https://img.example/2.png"}]}"#,
        )
        .unwrap();
        assert_eq!(first_image_url(body).unwrap(), "https://img.example/1.png");

        let empty: GenerationResponse = serde_json::from_str(r#"{"data": []}"#).unwrap();
        assert!(matches!(
            first_image_url(empty),
            Err(ExternalServiceError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn missing_key_fails_without_a_network_call() {
        let client = OpenAiImageClient::new(ImageApiConfig {
            api_url: "http://127.0.0.1:9/unused".to_string(),
            api_key: None,
            timeout: Duration::from_secs(1),
        })
        .unwrap();

        assert!(matches!(
            client.generate("hello").await,
            Err(ExternalServiceError::NotConfigured)
        ));
    }
}
