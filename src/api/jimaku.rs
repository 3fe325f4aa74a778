// Jimaku subtitle search and download

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use tracing::warn;

use crate::error::{AyumiError, Result};

const API_BASE: &str = "https://jimaku.cc/api";

/// Discord's attachment ceiling for bots without boosts
pub const MAX_ATTACHMENT_BYTES: u64 = 8 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct Entry {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    pub english_name: Option<String>,
    pub japanese_name: Option<String>,
    pub anilist_id: Option<i64>,
}

impl Entry {
    /// English title when known, otherwise the romanized entry name
    pub fn display_name(&self) -> &str {
        self.english_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubtitleFile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub url: String,
}

impl SubtitleFile {
    pub fn fits_attachment(&self) -> bool {
        self.size > 0 && self.size < MAX_ATTACHMENT_BYTES
    }
}

pub struct Jimaku<'a> {
    http: &'a Client,
    api_key: &'a str,
}

impl<'a> Jimaku<'a> {
    pub fn new(http: &'a Client, api_key: &'a str) -> Self {
        Self { http, api_key }
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.http
            .get(format!("{API_BASE}{path}"))
            .header("Authorization", self.api_key)
    }

    async fn send<T: serde::de::DeserializeOwned>(request: RequestBuilder) -> Result<Option<T>> {
        let response = request.send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.json().await?)),
            status => {
                warn!("Jimaku returned {}", status);
                Err(AyumiError::api("Jimaku", status.to_string()))
            }
        }
    }

    pub async fn search(&self, query: &str) -> Result<Vec<Entry>> {
        let request = self
            .get("/entries/search")
            .query(&[("query", query), ("anime", "true")]);
        Ok(Self::send(request).await?.unwrap_or_default())
    }

    pub async fn entry(&self, id: i64) -> Result<Option<Entry>> {
        Self::send(self.get(&format!("/entries/{id}"))).await
    }

    pub async fn files(&self, entry_id: i64, episode: Option<u32>) -> Result<Vec<SubtitleFile>> {
        let mut request = self.get(&format!("/entries/{entry_id}/files"));
        if let Some(ep) = episode {
            request = request.query(&[("episode", ep)]);
        }
        Ok(Self::send(request).await?.unwrap_or_default())
    }

    pub async fn download(&self, file: &SubtitleFile) -> Result<Vec<u8>> {
        let response = self.http.get(&file.url).send().await?;
        if !response.status().is_success() {
            return Err(AyumiError::api("Jimaku", format!("download {}", response.status())));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_display_name() {
        let entry: Entry = serde_json::from_value(serde_json::json!({
            "id": 5, "name": "Sousou no Frieren", "english_name": "Frieren", "anilist_id": 154587
        }))
        .unwrap();
        assert_eq!(entry.display_name(), "Frieren");

        let entry: Entry =
            serde_json::from_value(serde_json::json!({ "id": 6, "name": "Yuru Camp", "english_name": "" }))
                .unwrap();
        assert_eq!(entry.display_name(), "Yuru Camp");
    }

    #[test]
    fn test_attachment_limit() {
        let small = SubtitleFile { name: "a.srt".into(), size: 40_000, url: String::new() };
        let huge = SubtitleFile { name: "b.zip".into(), size: MAX_ATTACHMENT_BYTES, url: String::new() };
        assert!(small.fits_attachment());
        assert!(!huge.fits_attachment());
    }
}
