// Persistence for immersion logs and the per-user stats derived from them

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::api::firestore::{new_document_id, Direction, Document, Firestore, Op, StructuredQuery, Write};
use crate::error::{AyumiError, Result};
use crate::models::immersion_log::{ImmersionLog, NewLog};
use crate::models::media::MediaType;
use crate::models::stats::{rank_entries, LeaderboardEntry, Tally};
use crate::models::user::{Streaks, UserDoc};
use crate::utils::config::effective_date_at;
use crate::utils::periods::{LeaderboardPeriod, TimeRange};
use crate::utils::streak::{calculate_streak, StreakResult};

const USERS: &str = "users";
const LOGS: &str = "immersion_logs";
const LEADERBOARD_CONCURRENCY: usize = 8;

fn user_path(uid: &str) -> String {
    format!("{USERS}/{uid}")
}

fn logs_path(uid: &str) -> String {
    format!("{USERS}/{uid}/{LOGS}")
}

/// A log together with its document id
#[derive(Debug, Clone)]
pub struct StoredLog {
    pub id: String,
    pub log: ImmersionLog,
}

impl StoredLog {
    fn from_document(doc: &Document) -> Option<Self> {
        match doc.parse::<ImmersionLog>() {
            Ok(log) => Some(Self { id: doc.id.clone(), log }),
            Err(e) => {
                warn!("Skipping malformed log {}: {}", doc.id, e);
                None
            }
        }
    }

    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.log.timestamps.created
    }
}

#[derive(Debug, Clone)]
pub struct RecordOutcome {
    pub log_id: String,
    pub log: ImmersionLog,
    /// Lifetime total for the logged media type, including this log
    pub type_total: f64,
    pub streak: StreakResult,
    pub media_streak: StreakResult,
}

fn streak_over<'a>(dates: impl Iterator<Item = &'a NaiveDate>, today: NaiveDate) -> StreakResult {
    let strings: Vec<String> = dates.map(|d| d.format("%Y-%m-%d").to_string()).collect();
    calculate_streak(&strings, today)
}

pub async fn get_user(db: &Firestore, uid: &str) -> Result<Option<UserDoc>> {
    match db.get_document(&user_path(uid)).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Applies a new log and the refreshed streaks to the user document.
/// Returns the lifetime total for the log's media type.
fn fold_log(
    user: &mut UserDoc,
    log: &ImmersionLog,
    media: MediaType,
    streak: StreakResult,
    media_streak: StreakResult,
    now: DateTime<Utc>,
) -> f64 {
    let type_total = user.apply_log(log, now);
    if let Some(stats) = user.stats.get_mut(media.key()) {
        stats.current_streak = media_streak.current;
        stats.best_streak = stats.best_streak.max(media_streak.longest);
    }
    let longest = user.streaks.as_ref().map_or(0, |s| s.longest);
    user.streaks = Some(Streaks {
        current: streak.current,
        longest: longest.max(streak.longest),
        last_updated: Some(now),
    });
    type_total
}

/// The log document and the user update, committed as one batch
fn record_writes(log_path: &str, log: &ImmersionLog, user_path: &str, user: &UserDoc) -> Result<Vec<Write>> {
    Ok(vec![
        Write::Create { path: log_path.to_string(), fields: serde_json::to_value(log)? },
        Write::Update { path: user_path.to_string(), fields: serde_json::to_value(user)? },
    ])
}

/// Stores the log and folds it into the user's stats and streaks atomically
pub async fn record_log(db: &Firestore, new_log: NewLog, date: NaiveDate) -> Result<RecordOutcome> {
    let now = Utc::now();
    let uid = new_log.user.id.clone();
    let media = new_log.media;
    let log = new_log.into_log(now, date);
    let log_id = new_document_id();

    let mut all_dates: BTreeSet<NaiveDate> = BTreeSet::new();
    let mut media_dates: BTreeSet<NaiveDate> = BTreeSet::new();
    for stored in query_logs(db, &uid, None, None).await? {
        if let Some(day) = stored.log.log_date() {
            all_dates.insert(day);
            if stored.log.activity.media_type == media.key() {
                media_dates.insert(day);
            }
        }
    }
    all_dates.insert(date);
    media_dates.insert(date);

    let today = effective_date_at(now);
    let streak = streak_over(all_dates.iter(), today);
    let media_streak = streak_over(media_dates.iter(), today);

    let path = user_path(&uid);
    let log_path = format!("{}/{log_id}", logs_path(&uid));
    let (path, log_path, log_ref) = (path.as_str(), log_path.as_str(), &log);
    let type_total = db
        .run_transaction(move |tx| async move {
            let mut user: UserDoc = match db.get_in_transaction(path, &tx).await? {
                Some(value) => serde_json::from_value(value)?,
                None => UserDoc::default(),
            };
            let type_total = fold_log(&mut user, log_ref, media, streak, media_streak, now);
            Ok::<_, AyumiError>((record_writes(log_path, log_ref, path, &user)?, type_total))
        })
        .await?;
    debug!("Stored log {} for user {}", log_id, uid);

    info!(
        "Logged {} {} for {} (streak {})",
        log.activity.amount, media.key(), uid, streak.current
    );
    Ok(RecordOutcome { log_id, log, type_total, streak, media_streak })
}

async fn query_logs(
    db: &Firestore,
    uid: &str,
    range: Option<TimeRange>,
    media: Option<MediaType>,
) -> Result<Vec<StoredLog>> {
    let mut query = StructuredQuery::collection(LOGS);
    if let Some(range) = range {
        query = query
            .filter("timestamps.created", Op::GreaterThanOrEqual, range.start.to_rfc3339())
            .filter("timestamps.created", Op::LessThan, range.end.to_rfc3339());
    }
    if let Some(media) = media {
        query = query.filter("activity.type", Op::Equal, media.key());
    }
    if range.is_some() {
        query = query.order_by("timestamps.created", Direction::Descending);
    }

    let docs = db.run_query(&user_path(uid), &query).await?;
    Ok(docs.iter().filter_map(StoredLog::from_document).collect())
}

/// Logs created at or after `since`, newest first
pub async fn recent_logs(
    db: &Firestore,
    uid: &str,
    since: DateTime<Utc>,
    media: Option<MediaType>,
) -> Result<Vec<StoredLog>> {
    let range = TimeRange { start: since, end: Utc::now() + Duration::minutes(1) };
    query_logs(db, uid, Some(range), media).await
}

pub async fn logs_between(
    db: &Firestore,
    uid: &str,
    range: TimeRange,
    media: Option<MediaType>,
) -> Result<Vec<StoredLog>> {
    query_logs(db, uid, Some(range), media).await
}

/// Logs whose effective date falls in `year`
pub async fn logs_in_year(db: &Firestore, uid: &str, year: i32) -> Result<Vec<StoredLog>> {
    let period = LeaderboardPeriod::Yearly { year };
    let range = period
        .range(Utc::now())
        .ok_or_else(|| AyumiError::Validation(format!("{year} is not a valid year")))?;
    // Effective dates can sit up to a day away from the UTC creation instant
    let padded = TimeRange {
        start: range.start - Duration::days(1),
        end: range.end + Duration::days(1),
    };
    let logs = query_logs(db, uid, Some(padded), None).await?;
    Ok(logs
        .into_iter()
        .filter(|s| s.log.log_date().is_some_and(|d| d.year() == year))
        .collect())
}

pub async fn all_logs(db: &Firestore, uid: &str, media: Option<MediaType>) -> Result<Vec<StoredLog>> {
    query_logs(db, uid, None, media).await
}

/// Distinct effective dates with at least one log
pub async fn all_log_dates(db: &Firestore, uid: &str, media: Option<MediaType>) -> Result<Vec<NaiveDate>> {
    let dates: BTreeSet<NaiveDate> = query_logs(db, uid, None, media)
        .await?
        .iter()
        .filter_map(|s| s.log.log_date())
        .collect();
    Ok(dates.into_iter().collect())
}

/// Deletes a log and reverts its contribution in one transaction
pub async fn delete_log(db: &Firestore, uid: &str, log_id: &str) -> Result<ImmersionLog> {
    let log_path = format!("{}/{log_id}", logs_path(uid));
    let path = user_path(uid);
    let (log_path, path) = (log_path.as_str(), path.as_str());

    let log = db
        .run_transaction(move |tx| async move {
            let log: ImmersionLog = db
                .get_in_transaction(log_path, &tx)
                .await?
                .map(serde_json::from_value)
                .transpose()?
                .ok_or_else(|| AyumiError::NotFound("That log no longer exists.".into()))?;

            let mut writes = vec![Write::Delete { path: log_path.to_string() }];
            if let Some(value) = db.get_in_transaction(path, &tx).await? {
                let mut user: UserDoc = serde_json::from_value(value)?;
                user.revert_log(&log.activity.media_type, log.activity.amount, Utc::now());
                writes.push(Write::Update {
                    path: path.to_string(),
                    fields: json!({
                        "stats": serde_json::to_value(&user.stats)?,
                        "summary": serde_json::to_value(&user.summary)?,
                        "timestamps": serde_json::to_value(&user.timestamps)?,
                    }),
                });
            }
            Ok::<_, AyumiError>((writes, log))
        })
        .await?;
    info!("Deleted log {} for {}", log_id, uid);
    Ok(log)
}

fn tally_stats(user: &UserDoc, media: Option<MediaType>) -> Tally {
    let mut tally = Tally::default();
    for (key, stats) in &user.stats {
        if media.map_or(true, |m| m.key() == key) {
            tally.add(key, stats.total);
        }
    }
    tally
}

fn tally_logs(logs: &[StoredLog]) -> Tally {
    let mut tally = Tally::default();
    for stored in logs {
        tally.add(&stored.log.activity.media_type, stored.log.activity.amount);
    }
    tally
}

fn entry(uid: &str, user: &UserDoc, tally: Tally) -> LeaderboardEntry {
    let name = user.display_name();
    LeaderboardEntry {
        user_id: uid.to_string(),
        display_name: if name.is_empty() { format!("User {uid}") } else { name.to_string() },
        points: tally.points,
        amount: tally.amount,
    }
}

/// Ranked entries for every user with activity in the period
pub async fn leaderboard(
    db: &Firestore,
    period: LeaderboardPeriod,
    media: Option<MediaType>,
) -> Result<Vec<LeaderboardEntry>> {
    let users: Vec<(String, UserDoc)> = db
        .list_documents(USERS)
        .await?
        .iter()
        .filter_map(|doc| doc.parse::<UserDoc>().ok().map(|u| (doc.id.clone(), u)))
        .collect();

    let entries = match period.range(Utc::now()) {
        None => users
            .iter()
            .map(|(uid, user)| entry(uid, user, tally_stats(user, media)))
            .collect(),
        Some(range) => {
            let names: HashMap<&str, &UserDoc> = users.iter().map(|(id, u)| (id.as_str(), u)).collect();
            let uids: Vec<String> = users.iter().map(|(uid, _)| uid.clone()).collect();
            let results: Vec<(String, Result<Vec<StoredLog>>)> = stream::iter(uids)
                .map(|uid| async move {
                    let logs = logs_between(db, &uid, range, media).await;
                    (uid, logs)
                })
                .buffer_unordered(LEADERBOARD_CONCURRENCY)
                .collect()
                .await;

            let mut entries = Vec::with_capacity(results.len());
            for (uid, logs) in results {
                match logs {
                    Ok(logs) => {
                        if let Some(user) = names.get(uid.as_str()) {
                            entries.push(entry(&uid, user, tally_logs(&logs)));
                        }
                    }
                    Err(e) => warn!("Leaderboard skipped {}: {}", uid, e),
                }
            }
            entries
        }
    };

    Ok(rank_entries(entries, media))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::immersion_log::LogUser;
    use crate::models::user::MediaStats;
    use chrono::TimeZone;

    fn stored(media: MediaType, amount: f64) -> StoredLog {
        let created = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let log = NewLog::new(LogUser::default(), media, amount, "x").into_log(created, created.date_naive());
        StoredLog { id: "l".into(), log }
    }

    #[test]
    fn test_streak_over_dates() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let days = [
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 3, 2).unwrap(),
            today,
        ];
        assert_eq!(streak_over(days.iter(), today), StreakResult { current: 3, longest: 3 });
    }

    #[test]
    fn test_log_and_stats_commit_together() {
        let log = stored(MediaType::Anime, 2.0).log;
        let mut user = UserDoc::default();
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let streak = StreakResult { current: 3, longest: 3 };
        let total = fold_log(&mut user, &log, MediaType::Anime, streak, StreakResult { current: 1, longest: 2 }, now);
        assert_eq!(total, 2.0);

        let writes = record_writes("users/7/immersion_logs/abc", &log, "users/7", &user).unwrap();
        assert_eq!(writes.len(), 2);
        match &writes[0] {
            Write::Create { path, fields } => {
                assert_eq!(path, "users/7/immersion_logs/abc");
                assert_eq!(fields["activity"]["amount"], 2.0);
            }
            other => panic!("log must be created in the same commit, got {other:?}"),
        }
        match &writes[1] {
            Write::Update { path, fields } => {
                assert_eq!(path, "users/7");
                assert_eq!(fields["stats"]["anime"]["total"], 2.0);
                assert_eq!(fields["stats"]["anime"]["bestStreak"], 2);
                assert_eq!(fields["streaks"]["current"], 3);
            }
            other => panic!("expected the user update, got {other:?}"),
        }
    }

    #[test]
    fn test_fold_keeps_best_streaks() {
        let mut user = UserDoc::default();
        user.streaks = Some(Streaks { current: 0, longest: 10, last_updated: None });
        let log = stored(MediaType::Manga, 4.0).log;
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let one = StreakResult { current: 1, longest: 1 };
        fold_log(&mut user, &log, MediaType::Manga, one, one, now);

        let streaks = user.streaks.unwrap();
        assert_eq!((streaks.current, streaks.longest), (1, 10));
    }

    #[test]
    fn test_tally_stats_respects_filter() {
        let mut user = UserDoc::default();
        user.stats.insert("anime".into(), MediaStats { total: 2.0, ..Default::default() });
        user.stats.insert("book".into(), MediaStats { total: 10.0, ..Default::default() });

        let all = tally_stats(&user, None);
        assert!((all.points - 36.0).abs() < 1e-9);

        let books = tally_stats(&user, Some(MediaType::Book));
        assert_eq!(books.amount, 10.0);
    }

    #[test]
    fn test_tally_logs_and_entry_name() {
        let tally = tally_logs(&[stored(MediaType::Anime, 1.0), stored(MediaType::Manga, 4.0)]);
        assert!((tally.points - 14.0).abs() < 1e-9);

        let nameless = entry("99", &UserDoc::default(), tally);
        assert_eq!(nameless.display_name, "User 99");
    }
}
