// Runtime settings and shared constants

use std::env;
use std::path::PathBuf;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, Timelike, Utc};

use crate::error::{AyumiError, Result};

/// Day offset - day ends at 2:00 AM instead of midnight
/// Activity at 1:30 AM on Jan 16 will count as Jan 15
pub const DAY_END_HOUR: u32 = 2;

/// Logs are dated in JST
pub const JST_OFFSET_HOURS: i32 = 9;

/// Logs written before `timestamps.date` existed were dated in WIB
pub const LEGACY_OFFSET_HOURS: i32 = 7;

pub const DEFAULT_NEWS_FEED: &str = "https://myanimelist.net/rss/news.xml";

/// Discord embed colors
pub mod colors {
    pub const PRIMARY: u32 = 0x00bfff;
    pub const SUCCESS: u32 = 0x2ecc71;
    pub const ERROR: u32 = 0xff0000;
    pub const WARNING: u32 = 0xffa500;
    pub const INFO: u32 = 0x3498db;
    pub const IMMERSION: u32 = 0x00d4aa;
    pub const MUTED: u32 = 0x95a5a6;
    pub const BLURPLE: u32 = 0x5865f2;
    pub const GOLD: u32 = 0xffd700;
    pub const MAL: u32 = 0x2e51a2;
}

/// Where the Firestore service account comes from
#[derive(Debug, Clone)]
pub enum FirebaseCredentials {
    Base64(String),
    File(PathBuf),
}

/// Everything read from the environment at startup
#[derive(Debug, Clone)]
pub struct Settings {
    pub discord_token: String,
    pub firebase: FirebaseCredentials,
    pub gemini_api_key: Option<String>,
    pub youtube_api_key: Option<String>,
    pub jimaku_api_key: Option<String>,
    pub news_channel_id: Option<u64>,
    pub news_feed_url: String,
    pub news_poll_secs: u64,
    pub ayumi_channel_ids: Vec<u64>,
    pub novel_list_path: PathBuf,
    pub custom_prompt_dir: PathBuf,
    pub heatmap_font_path: PathBuf,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds settings from any key lookup, so tests need not touch the process env
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let discord_token = get("DISCORD_TOKEN")
            .ok_or_else(|| AyumiError::Config("DISCORD_TOKEN must be set".into()))?;

        let firebase = match get("FIREBASE_SERVICE_ACCOUNT_BASE64") {
            Some(encoded) => FirebaseCredentials::Base64(encoded),
            None => FirebaseCredentials::File(PathBuf::from(
                get("FIREBASE_KEY_PATH").unwrap_or_else(|| "firebase-key.json".into()),
            )),
        };

        let news_channel_id = match get("NEWS_CHANNEL_ID") {
            Some(raw) => Some(parse_id("NEWS_CHANNEL_ID", &raw)?),
            None => None,
        };

        let news_poll_secs = match get("NEWS_POLL_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs >= 60)
                .ok_or_else(|| {
                    AyumiError::Config(format!("NEWS_POLL_SECS must be >= 60, got {raw}"))
                })?,
            None => 600,
        };

        let ayumi_channel_ids = get("AYUMI_CHANNEL_IDS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| parse_id("AYUMI_CHANNEL_IDS", s))
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            discord_token,
            firebase,
            gemini_api_key: get("GEMINI_API_KEY"),
            youtube_api_key: get("YOUTUBE_API_KEY"),
            jimaku_api_key: get("JIMAKU_API_KEY"),
            news_channel_id,
            news_feed_url: get("NEWS_FEED_URL").unwrap_or_else(|| DEFAULT_NEWS_FEED.into()),
            news_poll_secs,
            ayumi_channel_ids,
            novel_list_path: get("NOVEL_LIST_PATH")
                .unwrap_or_else(|| "data/novelList.json".into())
                .into(),
            custom_prompt_dir: get("CUSTOM_PROMPT_DIR")
                .unwrap_or_else(|| "data/custom_prompts".into())
                .into(),
            heatmap_font_path: get("HEATMAP_FONT_PATH")
                .unwrap_or_else(|| "assets/NotoSansJP-Bold.ttf".into())
                .into(),
        })
    }
}

fn parse_id(key: &str, raw: &str) -> Result<u64> {
    raw.parse::<u64>()
        .map_err(|_| AyumiError::Config(format!("{key} contains an invalid id: {raw}")))
}

pub fn jst() -> FixedOffset {
    // 9h is always a valid offset
    FixedOffset::east_opt(JST_OFFSET_HOURS * 3600).unwrap_or_else(|| Utc.fix())
}

fn legacy_offset() -> FixedOffset {
    FixedOffset::east_opt(LEGACY_OFFSET_HOURS * 3600).unwrap_or_else(|| Utc.fix())
}

/// Date a moment counts toward: JST, rolling over at DAY_END_HOUR
pub fn effective_date_at(now: DateTime<Utc>) -> NaiveDate {
    let local = now.with_timezone(&jst());
    if local.hour() < DAY_END_HOUR {
        local.date_naive() - Duration::days(1)
    } else {
        local.date_naive()
    }
}

pub fn effective_date() -> NaiveDate {
    effective_date_at(Utc::now())
}

/// Calendar date for logs that were stored without `timestamps.date`
pub fn legacy_log_date(created: DateTime<Utc>) -> NaiveDate {
    created.with_timezone(&legacy_offset()).date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashMap;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_effective_date_rolls_over_at_two_am_jst() {
        // 01:30 JST on Jan 16 still belongs to Jan 15
        assert_eq!(
            effective_date_at(utc(2025, 1, 15, 16, 30)),
            NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
        );
        // 02:00 JST on Jan 16 is Jan 16
        assert_eq!(
            effective_date_at(utc(2025, 1, 15, 17, 0)),
            NaiveDate::from_ymd_opt(2025, 1, 16).unwrap()
        );
    }

    #[test]
    fn test_legacy_date_uses_wib() {
        // 20:00 UTC is 03:00 next day in UTC+7
        assert_eq!(
            legacy_log_date(utc(2024, 3, 1, 20, 0)),
            NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()
        );
    }

    #[test]
    fn test_settings_defaults() {
        let vars = HashMap::from([("DISCORD_TOKEN", "abc")]);
        let settings = Settings::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(settings.discord_token, "abc");
        assert_eq!(settings.news_poll_secs, 600);
        assert_eq!(settings.news_feed_url, DEFAULT_NEWS_FEED);
        assert!(settings.news_channel_id.is_none());
        assert!(matches!(settings.firebase, FirebaseCredentials::File(ref p) if p.ends_with("firebase-key.json")));
    }

    #[test]
    fn test_settings_parse_channel_lists() {
        let vars = HashMap::from([
            ("DISCORD_TOKEN", "abc"),
            ("AYUMI_CHANNEL_IDS", "1, 2 ,3"),
            ("NEWS_CHANNEL_ID", "42"),
            ("FIREBASE_SERVICE_ACCOUNT_BASE64", "e30="),
        ]);
        let settings = Settings::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(settings.ayumi_channel_ids, vec![1, 2, 3]);
        assert_eq!(settings.news_channel_id, Some(42));
        assert!(matches!(settings.firebase, FirebaseCredentials::Base64(_)));
    }

    #[test]
    fn test_settings_reject_bad_values() {
        let missing = Settings::from_lookup(|_| None);
        assert!(matches!(missing, Err(AyumiError::Config(_))));

        let vars = HashMap::from([("DISCORD_TOKEN", "abc"), ("NEWS_CHANNEL_ID", "general")]);
        assert!(Settings::from_lookup(|k| vars.get(k).map(|v| v.to_string())).is_err());

        let vars = HashMap::from([("DISCORD_TOKEN", "abc"), ("NEWS_POLL_SECS", "5")]);
        assert!(Settings::from_lookup(|k| vars.get(k).map(|v| v.to_string())).is_err());
    }
}
