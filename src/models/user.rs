// `users/{id}` document and the stat transitions applied to it

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::immersion_log::ImmersionLog;
use super::media::{label_for_key, unit_for_key};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Profile {
    pub id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar: Option<String>,
    pub last_seen: Option<DateTime<Utc>>,
}

/// Running totals for one media type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MediaStats {
    pub total: f64,
    pub sessions: u32,
    pub last_activity: Option<DateTime<Utc>>,
    pub current_streak: u32,
    pub best_streak: u32,
    pub unit: String,
    pub label: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Summary {
    pub total_sessions: u32,
    pub last_activity: Option<DateTime<Utc>>,
    pub join_date: Option<DateTime<Utc>>,
    pub active_types: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserTimestamps {
    pub updated: Option<DateTime<Utc>>,
    pub last_log: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Streaks {
    pub current: u32,
    pub longest: u32,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UserDoc {
    pub profile: Profile,
    pub stats: BTreeMap<String, MediaStats>,
    pub summary: Summary,
    pub timestamps: UserTimestamps,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streaks: Option<Streaks>,
}

impl UserDoc {
    pub fn display_name(&self) -> &str {
        self.profile
            .display_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(&self.profile.username)
    }

    pub fn total_sessions(&self) -> u32 {
        self.stats.values().map(|s| s.sessions).sum()
    }

    /// Account for a freshly written log. Returns the new total for its type.
    pub fn apply_log(&mut self, log: &ImmersionLog, now: DateTime<Utc>) -> f64 {
        let key = log.activity.media_type.clone();
        let entry = self.stats.entry(key.clone()).or_insert_with(|| MediaStats {
            unit: unit_for_key(&key).to_string(),
            label: label_for_key(&key),
            ..Default::default()
        });
        entry.total += log.activity.amount;
        entry.sessions += 1;
        entry.last_activity = Some(now);
        entry.unit = log.activity.unit.clone();
        entry.label = log.activity.type_label.clone();
        let new_total = entry.total;

        self.profile.id = log.user.id.clone();
        self.profile.username = log.user.username.clone();
        self.profile.display_name = log.user.display_name.clone();
        self.profile.avatar = log.user.avatar.clone();
        self.profile.last_seen = Some(now);

        self.refresh_summary();
        self.summary.last_activity = Some(now);
        self.summary.join_date.get_or_insert(now);
        self.timestamps = UserTimestamps {
            updated: Some(now),
            last_log: Some(now),
        };
        new_total
    }

    /// Undo a deleted log; totals and sessions never go below zero
    pub fn revert_log(&mut self, type_key: &str, amount: f64, now: DateTime<Utc>) {
        if let Some(stats) = self.stats.get_mut(type_key) {
            stats.total = (stats.total - amount).max(0.0);
            stats.sessions = stats.sessions.saturating_sub(1);
        }
        self.refresh_summary();
        self.timestamps.updated = Some(now);
    }

    fn refresh_summary(&mut self) {
        self.summary.total_sessions = self.total_sessions();
        self.summary.active_types = self.stats.keys().cloned().collect();
    }
}
