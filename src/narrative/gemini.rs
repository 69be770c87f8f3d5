use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, RgbImage};
use log::{debug, info, warn};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::config::LensConfig;

use super::{NarrativeError, NarrativeService};

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    Image { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
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
struct ResponsePart {
    text: Option<String>,
}

/// Client for the Gemini `generateContent` endpoint.
///
/// The API key is looked up when a request is made, not at construction,
/// so a missing key only fails the narrative step.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    base_url: String,
    model: String,
    api_key_env: String,
    api_key: Option<String>,
}

impl GeminiClient {
    pub fn from_config(config: &LensConfig) -> Result<GeminiClient, NarrativeError> {
        GeminiClient::new(
            &config.api_base_url,
            &config.gemini_model,
            &config.api_key_env,
            config.request_timeout(),
        )
    }

    pub fn new(base_url: &str, model: &str, api_key_env: &str, timeout: Duration) -> Result<GeminiClient, NarrativeError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(GeminiClient {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            model: model.to_owned(),
            api_key_env: api_key_env.to_owned(),
            api_key: None,
        })
    }

    /// Uses `key` instead of reading the environment.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn api_key(&self) -> Result<String, NarrativeError> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(&self.api_key_env).ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| NarrativeError::MissingApiKey(self.api_key_env.clone()))
    }
}

impl NarrativeService for GeminiClient {
    fn generate(&self, prompt: &str, image: &RgbImage) -> Result<String, NarrativeError> {
        let key = self.api_key()?;
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text { text: prompt },
                    Part::Image { inline_data: InlineData { mime_type: "image/png", data: encode_png_base64(image)? } },
                ],
            }],
        };

        info!("Requesting narrative from {}", self.model);
        let response = self.http
            .post(self.endpoint())
            .header("x-goog-api-key", key)
            .json(&body)
            .send()?;

        let status = response.status();
        debug!("Narrative response status: {}", status);
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            warn!("Narrative request failed with HTTP {}", status.as_u16());
            return Err(NarrativeError::Status { code: status.as_u16(), body });
        }

        let parsed: GenerateResponse = response.json()?;
        extract_text(parsed)
    }
}

/// Concatenates the text parts of the first candidate that has any.
fn extract_text(response: GenerateResponse) -> Result<String, NarrativeError> {
    response
        .candidates
        .into_iter()
        .filter_map(|c| c.content)
        .map(|content| {
            content.parts.into_iter().filter_map(|p| p.text).collect::<Vec<_>>().join("")
        })
        .find(|text| !text.trim().is_empty())
        .ok_or(NarrativeError::EmptyResponse)
}

fn encode_png_base64(image: &RgbImage) -> Result<String, NarrativeError> {
    let mut png = Vec::new();
    PngEncoder::new(&mut png).write_image(image.as_raw(), image.width(), image.height(), ColorType::Rgb8)?;
    Ok(STANDARD.encode(png))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<String, NarrativeError> {
        extract_text(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn test_extracts_joined_text_parts() {
        let text = parse(r#"{
            "candidates": [{
                "content": {"parts": [{"text": "The highlighted "}, {"text": "region is frontal."}], "role": "model"},
                "finishReason": "STOP"
            }]
        }"#).unwrap();
        assert_eq!(text, "The highlighted region is frontal.");
    }

    #[test]
    fn test_empty_or_blocked_response() {
        assert!(matches!(parse(r#"{"candidates": []}"#), Err(NarrativeError::EmptyResponse)));
        assert!(matches!(
            parse(r#"{"promptFeedback": {"blockReason": "SAFETY"}}"#),
            Err(NarrativeError::EmptyResponse)
        ));
        assert!(matches!(
            parse(r#"{"candidates": [{"finishReason": "SAFETY"}]}"#),
            Err(NarrativeError::EmptyResponse)
        ));
    }

    #[test]
    fn test_missing_key_fails_before_any_request() {
        let client = GeminiClient::new(
            "http://127.0.0.1:9",
            "gemini-1.5-flash",
            "MRI_LENS_TEST_KEY_THAT_IS_NEVER_SET",
            Duration::from_secs(1),
        ).unwrap();
        let err = client.generate("hi", &RgbImage::new(2, 2)).unwrap_err();
        assert!(matches!(err, NarrativeError::MissingApiKey(ref v) if v == "MRI_LENS_TEST_KEY_THAT_IS_NEVER_SET"));
    }

    #[test]
    fn test_request_body_shape() {
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text { text: "describe" },
                    Part::Image { inline_data: InlineData { mime_type: "image/png", data: encode_png_base64(&RgbImage::new(1, 1)).unwrap() } },
                ],
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        let parts = &json["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "describe");
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/png");
        let png = STANDARD.decode(parts[1]["inline_data"]["data"].as_str().unwrap()).unwrap();
        assert_eq!(&png[1..4], b"PNG");
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let client = GeminiClient::new("https://example.test/v1beta/", "m", "K", Duration::from_secs(5)).unwrap();
        assert_eq!(client.endpoint(), "https://example.test/v1beta/models/m:generateContent");
    }
}
