//! Minimal OpenAI chat-completions client with image input.

mod client;
pub mod error;
pub(crate) mod types;

pub use error::AiError;

use async_trait::async_trait;
use std::time::Duration;

use client::OpenAiClient;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(90);
use types::{ChatRequest, WireMessage};

/// Image attached to a model request
#[derive(Debug, Clone, PartialEq)]
pub enum ImageInput {
    Url(String),
    Inline { media_type: String, data: String },
}

impl ImageInput {
    fn as_url(&self) -> String {
        match self {
            ImageInput::Url(url) => url.clone(),
            ImageInput::Inline { media_type, data } => format!("data:{media_type};base64,{data}"),
        }
    }
}

/// One valuation request: fixed instructions, item text, optional image
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub system: String,
    pub text: String,
    pub image: Option<ImageInput>,
    pub max_tokens: u32,
    pub json_response: bool,
}

impl ModelRequest {
    pub fn is_multimodal(&self) -> bool {
        self.image.is_some()
    }
}

/// Seam for the generative model; returns the raw reply text.
#[async_trait]
pub trait VisionModel: Send + Sync {
    async fn complete(&self, request: &ModelRequest) -> Result<String, AiError>;
}

#[derive(Clone)]
pub struct OpenAi {
    api_key: String,
    model: String,
    base_url: Option<String>,
    http: reqwest::Client,
}

impl OpenAi {
    /// The request timeout is the only bound on a stalled model call.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, AiError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AiError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
            http,
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Get the model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn client(&self) -> OpenAiClient {
        let client = OpenAiClient::new(&self.api_key, self.http.clone());
        match self.base_url {
            Some(ref url) => client.with_base_url(url),
            None => client,
        }
    }

    fn build_request(&self, request: &ModelRequest) -> ChatRequest {
        let user = match &request.image {
            Some(image) => WireMessage::user_with_image(request.text.clone(), image.as_url()),
            None => WireMessage::user(request.text.clone()),
        };

        let chat = ChatRequest::new(&self.model)
            .message(WireMessage::system(request.system.clone()))
            .message(user)
            .token_limit(request.max_tokens);

        if request.json_response {
            chat.json_object()
        } else {
            chat
        }
    }
}

#[async_trait]
impl VisionModel for OpenAi {
    async fn complete(&self, request: &ModelRequest) -> Result<String, AiError> {
        let chat = self.build_request(request);
        let response = self.client().chat(&chat).await?;
        response.text().ok_or(AiError::EmptyResponse)
    }
}
