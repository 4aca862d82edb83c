use async_trait::async_trait;
use base64::Engine as _;
use std::path::Path;

use crate::api_connection::connection::ApiConnectionError;
use crate::api_connection::endpoints::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ContentPart, ImageUrl,
    MessageContent, Provider, TEXT_MODEL, VISION_MODEL,
};

pub const API_KEY_ENV_VAR: &str = "OPENROUTER_API_KEY";

/// Vision prompt used for photo analysis.
pub const IMAGE_PROMPT: &str =
    "Identify the main food in this image. Answer with the food name only.";

// The extraction prompt embeds at most this many known food names.
const KNOWN_NAMES_PROMPT_CAP: usize = 500;

/// The three model calls the assistant depends on, behind a trait so the
/// session layer can be tested with a stub.
#[async_trait]
pub trait ModelAdvisor: Send + Sync {
    /// Extracts all food names mentioned in free text, as a cleaned list.
    async fn extract_foods(
        &self,
        text: &str,
        known_names: &[String],
    ) -> Result<Vec<String>, ApiConnectionError>;

    /// Names the single main food visible in a photo.
    async fn identify_food(
        &self,
        image: &EncodedImage,
        prompt: &str,
    ) -> Result<String, ApiConnectionError>;

    /// Turns retrieved context blocks into the formatted nutrition summary
    /// and next-meal recommendation.
    async fn summarize(
        &self,
        context: &str,
        display_names: &[String],
    ) -> Result<String, ApiConnectionError>;
}

#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl EncodedImage {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Guesses the mime type from the file extension; unknown extensions
    /// are sent as JPEG.
    pub fn from_path_bytes(path: &Path, bytes: Vec<u8>) -> Self {
        let mime_type = match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .as_deref()
        {
            Some("png") => "image/png",
            Some("gif") => "image/gif",
            Some("webp") => "image/webp",
            _ => "image/jpeg",
        };
        Self::new(mime_type, bytes)
    }

    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }
}

/// Strips a wrapping markdown code fence from a model response, if any.
pub fn strip_markdown_fences(content: &str) -> &str {
    let trimmed = content.trim();
    if trimmed.starts_with("```json") && trimmed.ends_with("```") {
        trimmed
            .trim_start_matches("```json")
            .trim_end_matches("```")
            .trim()
    } else if trimmed.starts_with("```") && trimmed.ends_with("```") {
        trimmed
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim()
    } else {
        trimmed
    }
}

/// Splits a comma-separated model answer into trimmed, non-empty names.
pub fn parse_food_list(response: &str) -> Vec<String> {
    response
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn first_choice_text(response: ChatCompletionResponse) -> Result<String, ApiConnectionError> {
    if let Some(choice) = response.choices.first() {
        Ok(strip_markdown_fences(&choice.message.content).to_string())
    } else {
        Err(ApiConnectionError::ApiError {
            status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            error_body: "No response choices received from API".to_string(),
        })
    }
}

/// OpenRouter-backed implementation of the three model calls.
pub struct OpenRouterAdvisor {
    provider: Provider,
}

impl OpenRouterAdvisor {
    pub fn new(api_key_env_var: &str) -> Self {
        Self {
            provider: Provider::openrouter(api_key_env_var),
        }
    }
}

#[async_trait]
impl ModelAdvisor for OpenRouterAdvisor {
    async fn extract_foods(
        &self,
        text: &str,
        known_names: &[String],
    ) -> Result<Vec<String>, ApiConnectionError> {
        let capped: Vec<&str> = known_names
            .iter()
            .take(KNOWN_NAMES_PROMPT_CAP)
            .map(String::as_str)
            .collect();
        let food_context = capped.join(", ");

        let prompt = format!(
            "/no_thinking
From the following \"User sentence\", extract ALL food names mentioned.
The result MUST be a comma-separated list.
Example:
User sentence: \"this morning I had opor, sop for lunch, nasi goreng for dinner\"
Your answer: opor, sop, nasi goreng
---
User sentence: \"{}\"
Known food names (partial): \"{}\"
---
Your answer (only food names separated by commas):",
            text, food_context
        );

        let request = ChatCompletionRequest {
            model: TEXT_MODEL.to_string(),
            messages: vec![ChatMessage::text("user", prompt)],
            temperature: Some(0.0),
            max_tokens: Some(256),
        };

        let response = self.provider.call_chat_completion(request).await?;
        Ok(parse_food_list(&first_choice_text(response)?))
    }

    async fn identify_food(
        &self,
        image: &EncodedImage,
        prompt: &str,
    ) -> Result<String, ApiConnectionError> {
        let request = ChatCompletionRequest {
            model: VISION_MODEL.to_string(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: MessageContent::Parts(vec![
                    ContentPart::Text {
                        text: prompt.to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: image.to_data_url(),
                        },
                    },
                ]),
            }],
            temperature: Some(0.0),
            max_tokens: Some(64),
        };

        let response = self.provider.call_chat_completion(request).await?;
        first_choice_text(response)
    }

    async fn summarize(
        &self,
        context: &str,
        display_names: &[String],
    ) -> Result<String, ApiConnectionError> {
        let prompt = format!(
            "/no_thinking
You are a nutritionist and meal planner. Based on the specific nutrition data I provide, write your answer following this MANDATORY FORMAT:

**Food Names:**
{}

**Combined Nutrition Details:**
[Analyse and summarise the total/average nutrition of all entries listed under \"Nutrition data found\". Present it as concise bullet points.]

**Analysis & Next-Meal Recommendation:**
[Give a short analysis based on the summary above.]
[Then recommend a specific menu for the **next meal** (for example dinner) to balance the day's intake. Suggest 1-2 complete menu examples.]
---
Nutrition data found:
{}
---
IMPORTANT: For \"Food Names\", use the list I gave you above, not the specific names appearing in \"Nutrition data found\".",
            display_names.join(", "),
            context
        );

        let request = ChatCompletionRequest {
            model: TEXT_MODEL.to_string(),
            messages: vec![ChatMessage::text("user", prompt)],
            temperature: Some(0.3),
            max_tokens: Some(1024),
        };

        let response = self.provider.call_chat_completion(request).await?;
        first_choice_text(response)
    }
}
