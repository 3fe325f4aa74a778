// /stat - immersion statistics as text, a bar chart or a yearly heatmap

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, Duration, NaiveDate, Utc};
use poise::serenity_prelude as serenity;
use tracing::debug;

use crate::error::AyumiError;
use crate::features::immersion_store::{self, StoredLog};
use crate::models::media::{label_for_key, MediaType};
use crate::models::user::UserDoc;
use crate::utils::config::{colors, effective_date};
use crate::utils::formatters::{format_amount, format_number, plural_days};
use crate::utils::points::{calculate_points, total_points};
use crate::utils::streak::calculate_streak_now;
use crate::utils::visualizations::{render_bar_chart, render_heatmap, BarSeries};
use crate::{Context, Error};

#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum VisualType {
    #[name = "Bar Chart"]
    Barchart,
    #[name = "Heatmap"]
    Heatmap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum ChartDays {
    #[name = "7 days"]
    Seven,
    #[name = "30 days"]
    Thirty,
}

impl ChartDays {
    pub fn count(self) -> i64 {
        match self {
            ChartDays::Seven => 7,
            ChartDays::Thirty => 30,
        }
    }
}

/// The last `count` effective dates, oldest first
pub fn recent_dates(today: NaiveDate, count: i64) -> Vec<NaiveDate> {
    (0..count).rev().map(|back| today - Duration::days(back)).collect()
}

/// Daily points per media type over `dates`; types with no points are left out
pub fn daily_series(logs: &[StoredLog], dates: &[NaiveDate]) -> Vec<BarSeries> {
    let index: BTreeMap<NaiveDate, usize> = dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();
    let mut per_type: HashMap<MediaType, Vec<f32>> = HashMap::new();

    for stored in logs {
        let (Some(media), Some(day)) = (stored.log.media(), stored.log.log_date()) else {
            continue;
        };
        let Some(&slot) = index.get(&day) else {
            continue;
        };
        let values = per_type.entry(media).or_insert_with(|| vec![0.0; dates.len()]);
        values[slot] += stored.log.points() as f32;
    }

    MediaType::ALL
        .into_iter()
        .filter_map(|media| {
            let values = per_type.remove(&media)?;
            values.iter().any(|v| *v > 0.0).then(|| BarSeries {
                name: media.label().to_string(),
                values,
                color: Some(media.color()),
            })
        })
        .collect()
}

/// All-time points per media type as one series
pub fn alltime_series(user: &UserDoc) -> (Vec<String>, Vec<BarSeries>) {
    let mut labels = Vec::new();
    let mut values = Vec::new();
    for (key, stats) in &user.stats {
        let points = calculate_points(stats.total, key);
        if points > 0 {
            labels.push(label_for_key(key));
            values.push(points as f32);
        }
    }
    if values.is_empty() {
        return (labels, Vec::new());
    }
    (labels, vec![BarSeries { name: "Points".into(), values, color: None }])
}

/// Sum of rounded log points per effective date
pub fn daily_points(logs: &[StoredLog]) -> BTreeMap<NaiveDate, i64> {
    let mut days = BTreeMap::new();
    for stored in logs {
        if let Some(day) = stored.log.log_date() {
            *days.entry(day).or_insert(0) += stored.log.points();
        }
    }
    days
}

/// `(label, value)` fields for the text view, highest points first
pub fn stat_fields(user: &UserDoc) -> Vec<(String, String)> {
    let mut rows: Vec<(i64, String, String)> = user
        .stats
        .iter()
        .filter(|(_, s)| s.total > 0.0)
        .map(|(key, s)| {
            let points = calculate_points(s.total, key);
            let media = MediaType::from_key(key);
            let name = match media {
                Some(m) => format!("{} {}", m.emoji(), m.label()),
                None => label_for_key(key),
            };
            let unit = media.map_or(s.unit.as_str(), |m| m.unit());
            let value = format!(
                "**Total:** {}\n**Sessions:** {}\n**Points:** {}",
                format_amount(s.total, unit),
                s.sessions,
                format_number(points as f64)
            );
            (points, name, value)
        })
        .collect();
    rows.sort_by(|a, b| b.0.cmp(&a.0));
    rows.into_iter().map(|(_, name, value)| (name, value)).collect()
}

async fn render_blocking<F>(job: F) -> Result<Vec<u8>, AyumiError>
where
    F: FnOnce() -> Result<Vec<u8>, AyumiError> + Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| AyumiError::Render(format!("render task failed: {e}")))?
}

/// View your immersion statistics
#[poise::command(slash_command, prefix_command)]
pub async fn stat(
    ctx: Context<'_>,
    #[description = "Visualization type"] visual_type: Option<VisualType>,
    #[description = "Days shown in the bar chart"] days: Option<ChartDays>,
    #[description = "Year for the heatmap (default: this year)"]
    #[min = 2020]
    #[max = 2100]
    year: Option<i32>,
) -> Result<(), Error> {
    ctx.defer().await?;
    let data = ctx.data();
    let author = ctx.author();
    let uid = author.id.to_string();

    match visual_type {
        Some(VisualType::Heatmap) => {
            let today = effective_date();
            let year = year.unwrap_or(today.year());
            let logs = immersion_store::logs_in_year(&data.firestore, &uid, year).await?;
            let points = daily_points(&logs);
            debug!("Heatmap for {} in {}: {} active days", uid, year, points.len());

            let font = data.heatmap_font.clone();
            let png = render_blocking(move || render_heatmap(&points, year, today, font.as_ref())).await?;
            let embed = serenity::CreateEmbed::new()
                .title(format!("📅 {}'s Immersion Heatmap - {}", author.name, year))
                .color(colors::IMMERSION)
                .attachment("heatmap.png");
            ctx.send(
                poise::CreateReply::default()
                    .embed(embed)
                    .attachment(serenity::CreateAttachment::bytes(png, "heatmap.png")),
            )
            .await?;
        }
        Some(VisualType::Barchart) => {
            let (title, labels, series) = match days {
                Some(days) => {
                    let dates = recent_dates(effective_date(), days.count());
                    let since = Utc::now() - Duration::days(days.count() + 1);
                    let logs = immersion_store::recent_logs(&data.firestore, &uid, since, None).await?;
                    let labels: Vec<String> = dates.iter().map(|d| d.format("%m/%d").to_string()).collect();
                    (
                        format!("Daily points - last {} days", days.count()),
                        labels,
                        daily_series(&logs, &dates),
                    )
                }
                None => {
                    let user = immersion_store::get_user(&data.firestore, &uid).await?.unwrap_or_default();
                    let (labels, series) = alltime_series(&user);
                    ("All-time points by media".to_string(), labels, series)
                }
            };
            if series.is_empty() {
                ctx.say("No immersion data to chart yet. Start logging with `/immersion`!").await?;
                return Ok(());
            }

            let png = render_blocking(move || render_bar_chart(&title, labels, series)).await?;
            let embed = serenity::CreateEmbed::new()
                .title(format!("📊 {}'s Immersion Chart", author.name))
                .color(colors::IMMERSION)
                .attachment("chart.png");
            ctx.send(
                poise::CreateReply::default()
                    .embed(embed)
                    .attachment(serenity::CreateAttachment::bytes(png, "chart.png")),
            )
            .await?;
        }
        None => {
            let user = immersion_store::get_user(&data.firestore, &uid).await?.unwrap_or_default();
            let dates: Vec<String> = immersion_store::all_log_dates(&data.firestore, &uid, None)
                .await?
                .into_iter()
                .map(|d| d.format("%Y-%m-%d").to_string())
                .collect();
            let streak = calculate_streak_now(&dates);

            let mut embed = serenity::CreateEmbed::new()
                .title(format!("Immersion Stats - {}", author.name))
                .description(format!(
                    "**Total Points: {}** | **Total Sessions: {}**\n\
                     🔥 Current streak: **{}** • Longest: **{}**\n\n\
                     *Tip: use `/stat visual_type:Bar Chart` or `/stat visual_type:Heatmap` for visuals.*",
                    format_number(total_points(&user.stats) as f64),
                    user.total_sessions(),
                    plural_days(streak.current),
                    plural_days(streak.longest)
                ))
                .color(colors::SUCCESS)
                .thumbnail(author.face());

            let fields = stat_fields(&user);
            if fields.is_empty() {
                embed = embed.field("No data", "Start logging with `/immersion`!", false);
            }
            for (name, value) in fields {
                embed = embed.field(name, value, true);
            }
            if let Some(last) = user.summary.last_activity {
                embed = embed.footer(serenity::CreateEmbedFooter::new(format!(
                    "Last activity: {}",
                    last.format("%Y-%m-%d %H:%M UTC")
                )));
            }
            ctx.send(poise::CreateReply::default().embed(embed)).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::immersion_log::{LogUser, NewLog};
    use crate::models::user::MediaStats;
    use chrono::TimeZone;

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap()
    }

    fn stored(media: MediaType, amount: f64, date: NaiveDate) -> StoredLog {
        let created = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let log = NewLog::new(LogUser::default(), media, amount, "-").into_log(created, date);
        StoredLog { id: "x".into(), log }
    }

    #[test]
    fn test_recent_dates_oldest_first() {
        let dates = recent_dates(day(3, 2), 3);
        assert_eq!(dates, vec![day(2, 28), day(3, 1), day(3, 2)]);
    }

    #[test]
    fn test_daily_series_groups_by_type() {
        let dates = recent_dates(day(3, 3), 3);
        let logs = vec![
            stored(MediaType::Anime, 2.0, day(3, 1)),
            stored(MediaType::Anime, 1.0, day(3, 3)),
            stored(MediaType::Book, 10.0, day(3, 3)),
            stored(MediaType::Book, 50.0, day(2, 1)),
        ];
        let series = daily_series(&logs, &dates);
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].name, "Anime");
        assert_eq!(series[0].values, vec![26.0, 0.0, 13.0]);
        assert_eq!(series[1].name, "Book");
        assert_eq!(series[1].values, vec![0.0, 0.0, 10.0]);
    }

    #[test]
    fn test_daily_points_sums_per_day() {
        let logs = vec![
            stored(MediaType::Anime, 1.0, day(5, 1)),
            stored(MediaType::Book, 7.0, day(5, 1)),
            stored(MediaType::Manga, 8.0, day(5, 2)),
        ];
        let points = daily_points(&logs);
        assert_eq!(points[&day(5, 1)], 20);
        assert_eq!(points[&day(5, 2)], 2);
    }

    #[test]
    fn test_stat_fields_sorted_by_points() {
        let mut user = UserDoc::default();
        user.stats.insert("book".into(), MediaStats { total: 30.0, sessions: 2, ..Default::default() });
        user.stats.insert("anime".into(), MediaStats { total: 4.0, sessions: 4, ..Default::default() });
        user.stats.insert("manga".into(), MediaStats::default());

        let fields = stat_fields(&user);
        assert_eq!(fields.len(), 2);
        assert!(fields[0].0.contains("Anime"));
        assert!(fields[0].1.contains("**Points:** 52"));
        assert!(fields[1].1.contains("30 pages"));

        let (labels, series) = alltime_series(&user);
        assert_eq!(labels, vec!["Anime", "Book"]);
        assert_eq!(series[0].values, vec![52.0, 30.0]);
    }
}
