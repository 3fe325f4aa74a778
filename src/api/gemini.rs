// Gemini generateContent client: chat, vision and image generation

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::error::{AyumiError, Result};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const TEXT_MODEL: &str = "gemini-2.5-flash";
pub const IMAGE_MODEL: &str = "gemini-2.0-flash-preview-image-generation";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Model,
}

impl Role {
    fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, text: text.into() }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self { role: Role::Model, text: text.into() }
    }
}

#[derive(Debug, Clone)]
pub struct InlineImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub image: InlineImage,
    pub caption: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

impl GenerateResponse {
    fn parts(&self) -> impl Iterator<Item = &Part> {
        self.candidates
            .iter()
            .take(1)
            .filter_map(|c| c.content.as_ref())
            .flat_map(|c| c.parts.iter())
    }

    fn text(&self) -> Option<String> {
        let text: Vec<&str> = self.parts().filter_map(|p| p.text.as_deref()).collect();
        let joined = text.join("").trim().to_string();
        (!joined.is_empty()).then_some(joined)
    }
}

/// Request body for a text conversation, optionally with one image on the last turn
pub fn build_request(system: Option<&str>, turns: &[Turn], image: Option<&InlineImage>) -> Value {
    let mut contents: Vec<Value> = turns
        .iter()
        .map(|t| json!({ "role": t.role.as_str(), "parts": [{ "text": t.text }] }))
        .collect();

    if let Some(image) = image {
        let part = json!({
            "inline_data": { "mime_type": image.mime_type, "data": STANDARD.encode(&image.bytes) }
        });
        match contents.last_mut().and_then(|c| c["parts"].as_array_mut()) {
            Some(parts) => parts.push(part),
            None => contents.push(json!({ "role": "user", "parts": [part] })),
        }
    }

    let mut body = json!({ "contents": contents });
    if let Some(system) = system.filter(|s| !s.trim().is_empty()) {
        body["system_instruction"] = json!({ "parts": [{ "text": system }] });
    }
    body
}

pub struct Gemini {
    http: Client,
    api_key: String,
}

impl Gemini {
    pub fn new(http: Client, api_key: impl Into<String>) -> Self {
        Self { http, api_key: api_key.into() }
    }

    async fn call(&self, model: &str, body: &Value) -> Result<GenerateResponse> {
        let response = self
            .http
            .post(format!("{API_BASE}/{model}:generateContent"))
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            warn!("Gemini {} returned {}: {}", model, status, detail);
            return Err(AyumiError::api("Gemini", status.to_string()));
        }
        Ok(response.json().await?)
    }

    pub async fn chat(&self, system: Option<&str>, turns: &[Turn]) -> Result<String> {
        let response = self.call(TEXT_MODEL, &build_request(system, turns, None)).await?;
        response
            .text()
            .ok_or_else(|| AyumiError::api("Gemini", "empty response"))
    }

    pub async fn describe_image(&self, system: Option<&str>, prompt: &str, image: &InlineImage) -> Result<String> {
        let body = build_request(system, &[Turn::user(prompt)], Some(image));
        let response = self.call(TEXT_MODEL, &body).await?;
        response
            .text()
            .ok_or_else(|| AyumiError::api("Gemini", "empty vision response"))
    }

    pub async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage> {
        let mut body = build_request(None, &[Turn::user(prompt)], None);
        body["generationConfig"] = json!({ "responseModalities": ["TEXT", "IMAGE"] });

        let response = self.call(IMAGE_MODEL, &body).await?;
        let inline = response
            .parts()
            .filter_map(|p| p.inline_data.as_ref())
            .find(|d| d.mime_type.starts_with("image/"))
            .ok_or_else(|| AyumiError::api("Gemini", "no image in response"))?;

        let bytes = STANDARD
            .decode(&inline.data)
            .map_err(|e| AyumiError::api("Gemini", format!("bad image data: {e}")))?;

        Ok(GeneratedImage {
            image: InlineImage { mime_type: inline.mime_type.clone(), bytes },
            caption: response.text(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_request_roles_and_system() {
        let body = build_request(
            Some("You are Ayumi."),
            &[Turn::user("halo"), Turn::model("Halo juga"), Turn::user("apa kabar?")],
            None,
        );
        assert_eq!(body["system_instruction"]["parts"][0]["text"], "You are Ayumi.");
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["contents"][2]["parts"][0]["text"], "apa kabar?");
    }

    #[test]
    fn test_image_attaches_to_last_turn() {
        let image = InlineImage { mime_type: "image/png".into(), bytes: vec![1, 2, 3] };
        let body = build_request(None, &[Turn::user("what is this?")], Some(&image));
        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[1]["inline_data"]["data"], "AQID");
        assert!(body.get("system_instruction").is_none());
    }

    #[test]
    fn test_response_text_and_image_parts() {
        let response: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [
                { "text": "Here you go" },
                { "inlineData": { "mimeType": "image/png", "data": "AQID" } }
            ]}}]
        }))
        .unwrap();
        assert_eq!(response.text().as_deref(), Some("Here you go"));
        assert_eq!(response.parts().filter(|p| p.inline_data.is_some()).count(), 1);

        let empty: GenerateResponse = serde_json::from_value(json!({})).unwrap();
        assert!(empty.text().is_none());
    }
}
