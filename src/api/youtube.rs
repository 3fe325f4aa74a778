// YouTube Data API v3: video metadata for listening logs

use std::collections::HashMap;

use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::warn;

use crate::error::{AyumiError, Result};

const VIDEOS_ENDPOINT: &str = "https://www.googleapis.com/youtube/v3/videos";

#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub id: String,
    pub title: String,
    pub channel: String,
    pub thumbnail: Option<String>,
    pub duration_secs: u64,
}

impl VideoInfo {
    /// Whole minutes, rounded up so short clips still count
    pub fn duration_minutes(&self) -> u64 {
        self.duration_secs.div_ceil(60)
    }
}

fn is_video_id(s: &str) -> bool {
    s.len() == 11 && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Accepts a bare id or any of the common YouTube URL shapes
pub fn extract_video_id(input: &str) -> Option<String> {
    let input = input.trim();
    if is_video_id(input) {
        return Some(input.to_string());
    }

    let url = Url::parse(input).ok()?;
    let host = url.host_str()?.trim_start_matches("www.").trim_start_matches("m.");
    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());

    let candidate = match host {
        "youtu.be" => segments.next().map(str::to_string),
        "youtube.com" | "music.youtube.com" => match segments.next() {
            Some("watch") => url
                .query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| v.into_owned()),
            Some("shorts" | "embed" | "live" | "v") => segments.next().map(str::to_string),
            _ => None,
        },
        _ => None,
    }?;

    is_video_id(&candidate).then_some(candidate)
}

pub fn normalize_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}

/// `PT1H2M3S` style durations; days are accepted for long streams
pub fn parse_iso8601_duration(raw: &str) -> u64 {
    let mut total = 0u64;
    let mut number = 0u64;
    for ch in raw.chars() {
        match ch {
            '0'..='9' => number = number * 10 + u64::from(ch as u8 - b'0'),
            'D' => {
                total += number * 86_400;
                number = 0;
            }
            'H' => {
                total += number * 3_600;
                number = 0;
            }
            'M' => {
                total += number * 60;
                number = 0;
            }
            'S' => {
                total += number;
                number = 0;
            }
            _ => number = 0,
        }
    }
    total
}

#[derive(Debug, Deserialize)]
struct VideoList {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    id: String,
    snippet: Snippet,
    content_details: ContentDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: String,
    channel_title: String,
    #[serde(default)]
    thumbnails: HashMap<String, Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    duration: String,
}

impl From<VideoItem> for VideoInfo {
    fn from(item: VideoItem) -> Self {
        let thumbnail = ["maxres", "high", "medium", "default"]
            .iter()
            .find_map(|size| item.snippet.thumbnails.get(*size))
            .map(|t| t.url.clone());
        Self {
            id: item.id,
            title: item.snippet.title,
            channel: item.snippet.channel_title,
            thumbnail,
            duration_secs: parse_iso8601_duration(&item.content_details.duration),
        }
    }
}

pub async fn video_info(http: &Client, api_key: &str, video_id: &str) -> Result<Option<VideoInfo>> {
    let response = http
        .get(VIDEOS_ENDPOINT)
        .query(&[("part", "snippet,contentDetails"), ("id", video_id), ("key", api_key)])
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        warn!("YouTube returned {} for {}", status, video_id);
        return Err(AyumiError::api("YouTube", status.to_string()));
    }

    let list: VideoList = response.json().await?;
    Ok(list.items.into_iter().next().map(VideoInfo::from))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_video_id_forms() {
        let id = Some("dQw4w9WgXcQ".to_string());
        assert_eq!(extract_video_id("dQw4w9WgXcQ"), id);
        assert_eq!(extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42"), id);
        assert_eq!(extract_video_id("https://m.youtube.com/watch?feature=share&v=dQw4w9WgXcQ"), id);
        assert_eq!(extract_video_id("https://youtu.be/dQw4w9WgXcQ?si=abc"), id);
        assert_eq!(extract_video_id("https://youtube.com/shorts/dQw4w9WgXcQ"), id);
        assert_eq!(extract_video_id("https://www.youtube.com/live/dQw4w9WgXcQ"), id);
    }

    #[test]
    fn test_extract_video_id_rejects_others() {
        assert_eq!(extract_video_id("https://vimeo.com/123456"), None);
        assert_eq!(extract_video_id("https://www.youtube.com/@channel"), None);
        assert_eq!(extract_video_id("not a url"), None);
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_iso8601_duration("PT1H30M45S"), 5445);
        assert_eq!(parse_iso8601_duration("PT10M"), 600);
        assert_eq!(parse_iso8601_duration("P1DT1S"), 86_401);
        assert_eq!(parse_iso8601_duration("P0D"), 0);
    }

    #[test]
    fn test_duration_minutes_rounds_up() {
        let info = VideoInfo {
            id: "x".into(),
            title: "t".into(),
            channel: "c".into(),
            thumbnail: None,
            duration_secs: 61,
        };
        assert_eq!(info.duration_minutes(), 2);
    }
}
