//! Image transform client for the Gemini image-generation API.
//!
//! One call type: photo bytes + style prompt in, PNG bytes out. The response
//! may carry the generated image in several shapes (inline base64, inline raw
//! bytes, a file reference, or nothing but text); each part is classified
//! into an explicit payload variant and scanned in priority order. The first
//! part that yields decodable image bytes wins, and the result is always
//! re-encoded as RGB PNG regardless of the model's native output format.
//!
//! No retries here: the orchestrator isolates per-photo failures and skips.

use std::io::Cursor;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};

use petstory_core::Config;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Matches the original service's image-to-image setting.
const GENERATION_TEMPERATURE: f64 = 0.4;

#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    /// The call succeeded but no response part yielded decodable image data.
    #[error("no image produced by the generative model")]
    NoImageProduced,

    /// Transport or protocol failure, including undecodable input photos.
    #[error("image transform failed: {0}")]
    TransformFailed(String),
}

/// Seam between the pipeline and the generative service.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Transform `photo` according to `prompt`. Returns RGB PNG bytes.
    async fn generate(&self, photo: &[u8], prompt: &str) -> Result<Vec<u8>, TransformError>;
}

// generateContent wire types (REST, camelCase)

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<RequestContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent {
    parts: Vec<RequestPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged, rename_all = "camelCase")]
enum RequestPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(skip_serializing_if = "Option::is_none")]
    mime_type: Option<String>,
    data: Option<String>,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    text: Option<String>,
    inline_data: Option<InlineData>,
    file_data: Option<FileData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileData {
    #[allow(dead_code)]
    mime_type: Option<String>,
    file_uri: Option<String>,
}

/// Classified response part. Replaces attribute probing with one explicit
/// priority order: inline binary data, then external references, then text.
#[derive(Debug, PartialEq)]
enum PartPayload {
    InlineBinary(Vec<u8>),
    ExternalRef(String),
    Text(String),
    Unknown,
}

fn classify(part: ResponsePart) -> PartPayload {
    if let Some(data) = part.inline_data.and_then(|d| d.data) {
        return PartPayload::InlineBinary(decode_payload(&data));
    }
    if let Some(uri) = part.file_data.and_then(|f| f.file_uri) {
        return PartPayload::ExternalRef(uri);
    }
    if let Some(text) = part.text {
        return PartPayload::Text(text);
    }
    PartPayload::Unknown
}

/// Image payloads may arrive base64-encoded or raw; try base64 first and
/// fall back to the raw bytes.
fn decode_payload(data: &str) -> Vec<u8> {
    base64::engine::general_purpose::STANDARD
        .decode(data.trim())
        .unwrap_or_else(|_| data.as_bytes().to_vec())
}

/// Decode candidate bytes and re-encode as RGB PNG. `None` when the bytes
/// are not a decodable image.
fn reencode_png_rgb(bytes: &[u8]) -> Option<Vec<u8>> {
    let img = image::load_from_memory(bytes).ok()?;
    let rgb = image::DynamicImage::ImageRgb8(img.to_rgb8());
    let mut out = Cursor::new(Vec::new());
    rgb.write_to(&mut out, image::ImageFormat::Png).ok()?;
    Some(out.into_inner())
}

/// Gemini-backed implementation of [`ImageGenerator`].
pub struct GeminiGenerator {
    http_client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiGenerator {
    pub fn new(config: &Config) -> Result<Self, TransformError> {
        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TransformError::TransformFailed(format!("http client: {e}")))?;

        Ok(Self {
            http_client,
            api_key: config.gemini_api_key.clone(),
            model: config.gemini_image_model.clone(),
        })
    }

    fn build_request(photo_png: Vec<u8>, prompt: &str) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![RequestContent {
                parts: vec![
                    RequestPart::Text {
                        text: prompt.to_string(),
                    },
                    RequestPart::InlineData {
                        inline_data: InlineData {
                            mime_type: Some("image/png".to_string()),
                            data: Some(
                                base64::engine::general_purpose::STANDARD.encode(photo_png),
                            ),
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: GENERATION_TEMPERATURE,
            },
        }
    }

    async fn call_model(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, TransformError> {
        let url = format!("{API_BASE}/models/{}:generateContent", self.model);

        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| TransformError::TransformFailed(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(TransformError::TransformFailed(format!(
                "generative API returned {status}: {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| TransformError::TransformFailed(format!("response decode: {e}")))
    }

    async fn fetch_external(&self, uri: &str) -> Option<Vec<u8>> {
        let result = self
            .http_client
            .get(uri)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
            .and_then(|r| r.error_for_status());

        match result {
            Ok(response) => response.bytes().await.ok().map(|b| b.to_vec()),
            Err(e) => {
                tracing::warn!(uri, error = %e, "failed to fetch externally referenced image data");
                None
            }
        }
    }

    /// Scan all parts of all candidates and return the first decodable image,
    /// re-encoded as RGB PNG.
    async fn extract_image(
        &self,
        response: GenerateContentResponse,
    ) -> Result<Vec<u8>, TransformError> {
        let parts = response
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts);

        for part in parts {
            match classify(part) {
                PartPayload::InlineBinary(bytes) => {
                    if let Some(png) = reencode_png_rgb(&bytes) {
                        return Ok(png);
                    }
                    tracing::warn!(len = bytes.len(), "inline part did not decode as an image");
                }
                PartPayload::ExternalRef(uri) => {
                    if let Some(bytes) = self.fetch_external(&uri).await {
                        if let Some(png) = reencode_png_rgb(&bytes) {
                            return Ok(png);
                        }
                    }
                }
                PartPayload::Text(text) => {
                    tracing::debug!(text = %text.chars().take(100).collect::<String>(),
                        "response part contains text");
                }
                PartPayload::Unknown => {}
            }
        }

        Err(TransformError::NoImageProduced)
    }
}

#[async_trait]
impl ImageGenerator for GeminiGenerator {
    async fn generate(&self, photo: &[u8], prompt: &str) -> Result<Vec<u8>, TransformError> {
        // Flatten the input to RGB PNG before sending; alpha channels and
        // exotic source formats are not the model's problem.
        let input = image::load_from_memory(photo)
            .context("input photo does not decode as an image")
            .map_err(|e| TransformError::TransformFailed(format!("{e:#}")))?;
        let input_png = reencode_png_rgb_dynamic(input)?;

        let request = Self::build_request(input_png, prompt);
        let response = self.call_model(&request).await?;

        if response.candidates.is_empty() {
            return Err(TransformError::NoImageProduced);
        }

        let png = self.extract_image(response).await?;
        tracing::info!(bytes = png.len(), model = %self.model, "generated image");
        Ok(png)
    }
}

fn reencode_png_rgb_dynamic(img: image::DynamicImage) -> Result<Vec<u8>, TransformError> {
    let rgb = image::DynamicImage::ImageRgb8(img.to_rgb8());
    let mut out = Cursor::new(Vec::new());
    rgb.write_to(&mut out, image::ImageFormat::Png)
        .map_err(|e| TransformError::TransformFailed(format!("png encode: {e}")))?;
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_png_base64() -> String {
        let img = image::RgbImage::from_pixel(4, 4, image::Rgb([200, 100, 50]));
        let mut buf = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        base64::engine::general_purpose::STANDARD.encode(buf.into_inner())
    }

    fn generator() -> GeminiGenerator {
        GeminiGenerator {
            http_client: reqwest::Client::new(),
            api_key: "test-key".to_string(),
            model: "test-model".to_string(),
        }
    }

    #[test]
    fn classify_prefers_inline_data_over_file_and_text() {
        let part: ResponsePart = serde_json::from_value(json!({
            "text": "here is your image",
            "inlineData": { "mimeType": "image/png", "data": "aGVsbG8=" },
            "fileData": { "mimeType": "image/png", "fileUri": "https://files/abc" },
        }))
        .unwrap();
        assert_eq!(classify(part), PartPayload::InlineBinary(b"hello".to_vec()));
    }

    #[test]
    fn classify_file_data_then_text_then_unknown() {
        let part: ResponsePart = serde_json::from_value(json!({
            "fileData": { "fileUri": "https://files/abc" },
        }))
        .unwrap();
        assert_eq!(
            classify(part),
            PartPayload::ExternalRef("https://files/abc".to_string())
        );

        let part: ResponsePart = serde_json::from_value(json!({ "text": "hi" })).unwrap();
        assert_eq!(classify(part), PartPayload::Text("hi".to_string()));

        let part: ResponsePart = serde_json::from_value(json!({})).unwrap();
        assert_eq!(classify(part), PartPayload::Unknown);
    }

    #[test]
    fn decode_payload_falls_back_to_raw_bytes() {
        assert_eq!(decode_payload("aGVsbG8="), b"hello".to_vec());
        // Not valid base64: treated as raw bytes.
        assert_eq!(decode_payload("not base64!!"), b"not base64!!".to_vec());
    }

    #[tokio::test]
    async fn extract_image_from_inline_base64() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [
                { "text": "some commentary" },
                { "inlineData": { "mimeType": "image/png", "data": test_png_base64() } },
            ]}}]
        }))
        .unwrap();

        let png = generator().extract_image(response).await.unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.color(), image::ColorType::Rgb8);
    }

    #[tokio::test]
    async fn extract_image_skips_undecodable_parts() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [
                { "inlineData": { "data": "bm90IGFuIGltYWdl" } },
                { "inlineData": { "data": test_png_base64() } },
            ]}}]
        }))
        .unwrap();

        assert!(generator().extract_image(response).await.is_ok());
    }

    #[tokio::test]
    async fn extract_image_without_image_parts_is_no_image_produced() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [ { "text": "no image for you" } ]}}]
        }))
        .unwrap();

        let err = generator().extract_image(response).await.unwrap_err();
        assert!(matches!(err, TransformError::NoImageProduced));
    }

    #[test]
    fn request_serializes_with_camel_case_fields() {
        let request = GeminiGenerator::build_request(vec![1, 2, 3], "line art");
        let value = serde_json::to_value(&request).unwrap();
        assert!(value["generationConfig"]["temperature"].as_f64().is_some());
        let parts = &value["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "line art");
        assert!(parts[1]["inlineData"]["data"].is_string());
    }
}
