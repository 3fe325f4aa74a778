// AniList GraphQL lookups for anime and manga titles

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::error::{AyumiError, Result};

const ENDPOINT: &str = "https://graphql.anilist.co";

const MEDIA_FIELDS: &str = "id title { romaji english native } coverImage { large } siteUrl";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AniListKind {
    Anime,
    Manga,
}

impl AniListKind {
    fn as_graphql(self) -> &'static str {
        match self {
            AniListKind::Anime => "ANIME",
            AniListKind::Manga => "MANGA",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AniListMedia {
    pub id: i64,
    pub title: String,
    pub cover: Option<String>,
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct PageData {
    #[serde(rename = "Page")]
    page: Page,
}

#[derive(Debug, Deserialize)]
struct Page {
    media: Vec<RawMedia>,
}

#[derive(Debug, Deserialize)]
struct SingleData {
    #[serde(rename = "Media")]
    media: Option<RawMedia>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMedia {
    id: i64,
    title: RawTitle,
    cover_image: Option<RawCover>,
    site_url: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawTitle {
    romaji: Option<String>,
    english: Option<String>,
    native: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCover {
    large: Option<String>,
}

impl From<RawMedia> for AniListMedia {
    fn from(raw: RawMedia) -> Self {
        let RawTitle { romaji, english, native } = raw.title;
        Self {
            id: raw.id,
            title: english
                .or(romaji)
                .or(native)
                .unwrap_or_else(|| "Unknown".to_string()),
            cover: raw.cover_image.and_then(|c| c.large),
            url: raw.site_url,
        }
    }
}

async fn post<T: serde::de::DeserializeOwned>(
    http: &Client,
    query: String,
    variables: serde_json::Value,
) -> Result<Option<T>> {
    let response = http
        .post(ENDPOINT)
        .json(&json!({ "query": query, "variables": variables }))
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        warn!("AniList returned {}: {}", status, body);
        return Err(AyumiError::api("AniList", status.to_string()));
    }

    let envelope: Envelope<T> = response.json().await?;
    Ok(envelope.data)
}

pub async fn search_media(
    http: &Client,
    search: &str,
    kind: AniListKind,
    limit: usize,
) -> Result<Vec<AniListMedia>> {
    let query = format!(
        "query ($search: String, $type: MediaType, $perPage: Int) {{ \
           Page(perPage: $perPage) {{ media(search: $search, type: $type) {{ {MEDIA_FIELDS} }} }} }}"
    );
    let data: Option<PageData> = post(
        http,
        query,
        json!({ "search": search, "type": kind.as_graphql(), "perPage": limit.clamp(1, 25) }),
    )
    .await?;

    Ok(data
        .map(|d| d.page.media.into_iter().map(AniListMedia::from).collect())
        .unwrap_or_default())
}

pub async fn get_media(http: &Client, id: i64, kind: AniListKind) -> Result<Option<AniListMedia>> {
    let query = format!(
        "query ($id: Int, $type: MediaType) {{ Media(id: $id, type: $type) {{ {MEDIA_FIELDS} }} }}"
    );
    let data: Option<SingleData> = post(http, query, json!({ "id": id, "type": kind.as_graphql() })).await?;
    Ok(data.and_then(|d| d.media).map(AniListMedia::from))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_preference() {
        let raw: RawMedia = serde_json::from_value(json!({
            "id": 1,
            "title": { "romaji": "Shingeki no Kyojin", "english": null, "native": "進撃の巨人" },
            "coverImage": { "large": "https://img/1.jpg" },
            "siteUrl": "https://anilist.co/anime/1"
        }))
        .unwrap();
        let media = AniListMedia::from(raw);
        assert_eq!(media.title, "Shingeki no Kyojin");
        assert_eq!(media.cover.as_deref(), Some("https://img/1.jpg"));
    }

    #[test]
    fn test_page_decoding() {
        let envelope: Envelope<PageData> = serde_json::from_value(json!({
            "data": { "Page": { "media": [
                { "id": 2, "title": { "english": "Frieren" }, "coverImage": null, "siteUrl": "u" }
            ]}}
        }))
        .unwrap();
        let media: Vec<AniListMedia> = envelope
            .data
            .unwrap()
            .page
            .media
            .into_iter()
            .map(AniListMedia::from)
            .collect();
        assert_eq!(media[0].title, "Frieren");
        assert!(media[0].cover.is_none());
    }
}
