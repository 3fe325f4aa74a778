// `users/{id}/immersion_logs/{log}` documents

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::media::MediaType;
use crate::utils::config::legacy_log_date;
use crate::utils::points::calculate_points;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogUser {
    pub id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Activity {
    #[serde(rename = "type")]
    pub media_type: String,
    pub type_label: String,
    pub amount: f64,
    pub unit: String,
    pub title: String,
    pub comment: Option<String>,
    pub url: Option<String>,
    pub anilist_url: Option<String>,
    pub vndb_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VndbInfo {
    pub developer: Option<String>,
    pub released: Option<String>,
    pub length: Option<u8>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LogMetadata {
    pub thumbnail: Option<String>,
    pub duration: Option<f64>,
    pub source: String,
    pub vndb_info: Option<VndbInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogTimestamps {
    pub created: Option<DateTime<Utc>>,
    /// Effective date, YYYY-MM-DD. Missing on very old logs.
    pub date: Option<String>,
    pub month: Option<String>,
    pub year: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImmersionLog {
    pub user: LogUser,
    pub activity: Activity,
    pub metadata: LogMetadata,
    pub timestamps: LogTimestamps,
}

impl ImmersionLog {
    /// Day this log counts toward for streaks and heatmaps
    pub fn log_date(&self) -> Option<NaiveDate> {
        if let Some(date) = self
            .timestamps
            .date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        {
            return Some(date);
        }
        self.timestamps.created.map(legacy_log_date)
    }

    pub fn media(&self) -> Option<MediaType> {
        MediaType::from_key(&self.activity.media_type)
    }

    pub fn points(&self) -> i64 {
        calculate_points(self.activity.amount, &self.activity.media_type)
    }

    pub fn has_title(&self) -> bool {
        let title = self.activity.title.trim();
        !title.is_empty() && title != "-"
    }
}

/// Input for a log about to be written
#[derive(Debug, Clone)]
pub struct NewLog {
    pub user: LogUser,
    pub media: MediaType,
    pub amount: f64,
    pub title: String,
    pub comment: Option<String>,
    pub url: Option<String>,
    pub anilist_url: Option<String>,
    pub vndb_url: Option<String>,
    pub thumbnail: Option<String>,
    pub vndb_info: Option<VndbInfo>,
}

impl NewLog {
    pub fn new(user: LogUser, media: MediaType, amount: f64, title: impl Into<String>) -> Self {
        Self {
            user,
            media,
            amount,
            title: title.into(),
            comment: None,
            url: None,
            anilist_url: None,
            vndb_url: None,
            thumbnail: None,
            vndb_info: None,
        }
    }

    /// False for the "-" placeholder used when no title was given
    pub fn has_custom_title(&self) -> bool {
        let title = self.title.trim();
        !title.is_empty() && title != "-"
    }

    fn source(&self) -> &'static str {
        if self.media == MediaType::Listening && self.url.is_some() {
            "youtube"
        } else if self.vndb_url.is_some() {
            "vndb"
        } else if self.anilist_url.is_some() {
            "anilist"
        } else {
            "manual"
        }
    }

    pub fn into_log(self, created: DateTime<Utc>, date: NaiveDate) -> ImmersionLog {
        let source = self.source().to_string();
        let is_listening = self.media == MediaType::Listening;
        ImmersionLog {
            user: self.user,
            activity: Activity {
                media_type: self.media.key().to_string(),
                type_label: self.media.label().to_string(),
                amount: self.amount,
                unit: self.media.unit().to_string(),
                title: self.title,
                comment: self.comment.filter(|c| !c.trim().is_empty() && c != "-"),
                url: self.url,
                anilist_url: self.anilist_url,
                vndb_url: self.vndb_url,
            },
            metadata: LogMetadata {
                thumbnail: self.thumbnail,
                duration: is_listening.then_some(self.amount),
                source,
                vndb_info: self.vndb_info,
            },
            timestamps: LogTimestamps {
                created: Some(created),
                date: Some(date.format("%Y-%m-%d").to_string()),
                month: Some(date.format("%Y-%m").to_string()),
                year: Some(date.year()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn user() -> LogUser {
        LogUser {
            id: "1".into(),
            username: "yomu".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_into_log_fills_type_data_and_dates() {
        let created = Utc.with_ymd_and_hms(2025, 5, 1, 16, 30, 0).unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();
        let mut new_log = NewLog::new(user(), MediaType::Listening, 25.0, "Podcast");
        new_log.url = Some("https://www.youtube.com/watch?v=abc".into());
        new_log.comment = Some("-".into());

        let log = new_log.into_log(created, date);
        assert_eq!(log.activity.media_type, "listening");
        assert_eq!(log.activity.unit, "minutes");
        assert_eq!(log.activity.comment, None);
        assert_eq!(log.metadata.source, "youtube");
        assert_eq!(log.metadata.duration, Some(25.0));
        assert_eq!(log.timestamps.month.as_deref(), Some("2025-05"));
        assert_eq!(log.log_date(), Some(date));
        assert_eq!(log.points(), 17);
    }

    #[test]
    fn test_legacy_log_date_falls_back_to_created() {
        let log: ImmersionLog = serde_json::from_value(serde_json::json!({
            "activity": { "type": "anime", "amount": 1 },
            "timestamps": { "created": "2023-06-30T18:00:00Z" }
        }))
        .unwrap();
        assert_eq!(log.log_date(), NaiveDate::from_ymd_opt(2023, 7, 1));
        assert!(!log.has_title());
    }

    #[test]
    fn test_serializes_camel_case() {
        let created = Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap();
        let mut new_log = NewLog::new(user(), MediaType::VisualNovel, 5000.0, "Sakura");
        new_log.vndb_url = Some("https://vndb.org/v1".into());
        let value = serde_json::to_value(new_log.into_log(created, created.date_naive())).unwrap();

        assert_eq!(value["activity"]["type"], "visual_novel");
        assert_eq!(value["activity"]["typeLabel"], "Visual Novel");
        assert_eq!(value["activity"]["vndbUrl"], "https://vndb.org/v1");
        assert_eq!(value["metadata"]["source"], "vndb");
    }
}
