// VNDB (kana API) lookups for visual novels

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::error::{AyumiError, Result};
use crate::models::immersion_log::VndbInfo;

const ENDPOINT: &str = "https://api.vndb.org/kana/vn";
const SEARCH_FIELDS: &str = "id, title, image.url, released, length, developers.name";
const DETAIL_FIELDS: &str = "id, title, image.url, released, length, developers.name, description";

#[derive(Debug, Clone, PartialEq)]
pub struct VisualNovel {
    pub id: String,
    pub title: String,
    pub image: Option<String>,
    pub developer: Option<String>,
    pub released: Option<String>,
    pub length: Option<u8>,
    pub description: Option<String>,
}

impl VisualNovel {
    pub fn url(&self) -> String {
        format!("https://vndb.org/{}", self.id)
    }

    pub fn info(&self) -> VndbInfo {
        VndbInfo {
            developer: self.developer.clone(),
            released: self.released.clone(),
            length: self.length,
            description: self.description.clone(),
        }
    }
}

pub fn length_label(length: u8) -> &'static str {
    match length {
        1 => "Very short (< 2 hours)",
        2 => "Short (2-10 hours)",
        3 => "Medium (10-30 hours)",
        4 => "Long (30-50 hours)",
        5 => "Very long (> 50 hours)",
        _ => "Unknown",
    }
}

#[derive(Debug, Deserialize)]
struct Response {
    results: Vec<RawVn>,
}

#[derive(Debug, Deserialize)]
struct RawVn {
    id: String,
    title: String,
    image: Option<RawImage>,
    released: Option<String>,
    length: Option<u8>,
    #[serde(default)]
    developers: Vec<RawDeveloper>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawImage {
    url: String,
}

#[derive(Debug, Deserialize)]
struct RawDeveloper {
    name: String,
}

impl From<RawVn> for VisualNovel {
    fn from(raw: RawVn) -> Self {
        Self {
            id: raw.id,
            title: raw.title,
            image: raw.image.map(|i| i.url),
            developer: raw.developers.into_iter().next().map(|d| d.name),
            released: raw.released,
            length: raw.length,
            description: raw.description,
        }
    }
}

async fn query(http: &Client, filters: serde_json::Value, fields: &str, results: usize) -> Result<Vec<VisualNovel>> {
    let response = http
        .post(ENDPOINT)
        .json(&json!({ "filters": filters, "fields": fields, "results": results }))
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        warn!("VNDB returned {}", status);
        return Err(AyumiError::api("VNDB", status.to_string()));
    }

    let body: Response = response.json().await?;
    Ok(body.results.into_iter().map(VisualNovel::from).collect())
}

pub async fn search_vns(http: &Client, search: &str, limit: usize) -> Result<Vec<VisualNovel>> {
    query(http, json!(["search", "=", search]), SEARCH_FIELDS, limit.clamp(1, 25)).await
}

/// `id` may be given with or without the `v` prefix
pub async fn get_vn(http: &Client, id: &str) -> Result<Option<VisualNovel>> {
    let id = if id.starts_with('v') { id.to_string() } else { format!("v{id}") };
    Ok(query(http, json!(["id", "=", id]), DETAIL_FIELDS, 1)
        .await?
        .into_iter()
        .next())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_and_convert() {
        let body: Response = serde_json::from_value(json!({
            "results": [{
                "id": "v17",
                "title": "Ever17",
                "image": { "url": "https://t.vndb.org/cv/1.jpg" },
                "released": "2002-08-29",
                "length": 4,
                "developers": [{ "name": "KID" }, { "name": "Other" }]
            }]
        }))
        .unwrap();

        let vn = VisualNovel::from(body.results.into_iter().next().unwrap());
        assert_eq!(vn.url(), "https://vndb.org/v17");
        assert_eq!(vn.developer.as_deref(), Some("KID"));
        assert_eq!(vn.info().length, Some(4));
        assert_eq!(length_label(4), "Long (30-50 hours)");
        assert_eq!(length_label(9), "Unknown");
    }
}
