use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const TEXT_MODEL: &str = "gemini-2.5-flash";
const IMAGE_MODEL: &str = "imagen-3.0-generate-002";

#[cfg(target_arch = "wasm32")]
pub trait BackendBounds {}
#[cfg(target_arch = "wasm32")]
impl<T> BackendBounds for T {}

#[cfg(not(target_arch = "wasm32"))]
pub trait BackendBounds: Send + Sync {}
#[cfg(not(target_arch = "wasm32"))]
impl<T: Send + Sync> BackendBounds for T {}

/// Low-level seam to the hosted generation models. Errors are raw provider
/// failures; classification into user-facing kinds happens in the gateway.
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
pub trait GenAiBackend: BackendBounds + Debug {
    /// Plain text generation, with an optional system instruction.
    async fn generate_text(&self, system: Option<&str>, prompt: &str) -> Result<String>;

    /// Text generation constrained to a JSON document matching `schema`.
    /// Returns the raw response text; the caller parses it.
    async fn generate_json(&self, prompt: &str, schema: serde_json::Value) -> Result<String>;

    /// One image at a fixed 4:3 aspect ratio. Returns the base64 JPEG payload.
    async fn generate_image(&self, prompt: &str) -> Result<String>;
}

// --- Gemini / Imagen over REST ---

#[derive(Debug)]
pub struct GeminiBackend {
    api_key: String,
    text_model: String,
    image_model: String,
    client: reqwest::Client,
}

impl GeminiBackend {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            text_model: TEXT_MODEL.to_string(),
            image_model: IMAGE_MODEL.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Serialize)]
struct GeminiGenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
    #[serde(rename = "responseSchema")]
    response_schema: serde_json::Value,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    error: Option<GeminiError>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContentResponse>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Deserialize)]
struct GeminiPartResponse {
    text: String,
}

#[derive(Deserialize, Debug)]
struct GeminiError {
    message: String,
}

#[derive(Serialize)]
struct ImagenRequest {
    instances: Vec<ImagenInstance>,
    parameters: ImagenParameters,
}

#[derive(Serialize)]
struct ImagenInstance {
    prompt: String,
}

#[derive(Serialize)]
struct ImagenParameters {
    #[serde(rename = "sampleCount")]
    sample_count: u32,
    #[serde(rename = "aspectRatio")]
    aspect_ratio: String,
    #[serde(rename = "outputOptions")]
    output_options: ImagenOutputOptions,
}

#[derive(Serialize)]
struct ImagenOutputOptions {
    #[serde(rename = "mimeType")]
    mime_type: String,
}

#[derive(Deserialize)]
struct ImagenResponse {
    #[serde(default)]
    predictions: Vec<ImagenPrediction>,
    error: Option<GeminiError>,
}

#[derive(Deserialize)]
struct ImagenPrediction {
    #[serde(rename = "bytesBase64Encoded")]
    bytes_base64_encoded: Option<String>,
}

impl GeminiBackend {
    async fn generate_content(&self, request_body: GeminiRequest) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            API_BASE, self.text_model, self.api_key
        );

        let resp = self.client.post(&url).json(&request_body).send().await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let error_text = resp.text().await?;
            return Err(anyhow!("Gemini API error (status {}): {}", status, error_text));
        }

        // Keep the raw body around to report JSON shape problems.
        let response_text = resp.text().await?;
        let result: GeminiResponse = match serde_json::from_str(&response_text) {
            Ok(r) => r,
            Err(e) => {
                return Err(anyhow!(
                    "Failed to parse Gemini response: {}. Body: {}",
                    e,
                    response_text
                ))
            }
        };

        if let Some(err) = result.error {
            return Err(anyhow!("Gemini API returned error: {}", err.message));
        }

        if let Some(candidates) = result.candidates {
            if let Some(first) = candidates.first() {
                if let Some(content) = &first.content {
                    if let Some(part) = content.parts.first() {
                        return Ok(part.text.clone());
                    }
                }

                // Content or parts missing, commonly a safety stop.
                let reason = first.finish_reason.as_deref().unwrap_or("UNKNOWN");
                return Err(anyhow!("Gemini response empty. Finish reason: {}", reason));
            }
        }

        Err(anyhow!(
            "Gemini response format unexpected or empty. Body: {}",
            response_text
        ))
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl GenAiBackend for GeminiBackend {
    async fn generate_text(&self, system: Option<&str>, prompt: &str) -> Result<String> {
        let request_body = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart { text: prompt.to_string() }],
            }],
            system_instruction: system.map(|s| GeminiSystemInstruction {
                parts: vec![GeminiPart { text: s.to_string() }],
            }),
            generation_config: None,
        };

        self.generate_content(request_body).await
    }

    async fn generate_json(&self, prompt: &str, schema: serde_json::Value) -> Result<String> {
        let request_body = GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: vec![GeminiPart { text: prompt.to_string() }],
            }],
            system_instruction: None,
            generation_config: Some(GeminiGenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: schema,
            }),
        };

        self.generate_content(request_body).await
    }

    async fn generate_image(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "{}/models/{}:predict?key={}",
            API_BASE, self.image_model, self.api_key
        );

        let request_body = ImagenRequest {
            instances: vec![ImagenInstance { prompt: prompt.to_string() }],
            parameters: ImagenParameters {
                sample_count: 1,
                aspect_ratio: "4:3".to_string(),
                output_options: ImagenOutputOptions {
                    mime_type: "image/jpeg".to_string(),
                },
            },
        };

        let resp = self.client.post(&url).json(&request_body).send().await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let error_text = resp.text().await?;
            return Err(anyhow!("Imagen API error (status {}): {}", status, error_text));
        }

        let result: ImagenResponse = resp.json().await?;

        if let Some(err) = result.error {
            return Err(anyhow!("Imagen API returned error: {}", err.message));
        }

        match result.predictions.into_iter().find_map(|p| p.bytes_base64_encoded) {
            Some(bytes) => Ok(bytes),
            None => Err(anyhow!(
                "No image was generated. The response may have been blocked due to safety policies."
            )),
        }
    }
}
