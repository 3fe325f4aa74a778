// /leaderboard - community rankings by period and media type

use chrono::{Datelike, Utc};
use poise::serenity_prelude as serenity;

use crate::features::immersion_store;
use crate::models::media::MediaType;
use crate::models::stats::{rank_prefix, LeaderboardEntry};
use crate::utils::config::{colors, jst};
use crate::utils::formatters::format_amount;
use crate::utils::periods::LeaderboardPeriod;
use crate::{Context, Error};

const TOP_N: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum TimePeriod {
    #[name = "Weekly"]
    Weekly,
    #[name = "Monthly"]
    Monthly,
    #[name = "Yearly"]
    Yearly,
    #[name = "All-time"]
    AllTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, poise::ChoiceParameter)]
pub enum MonthChoice {
    January,
    February,
    March,
    April,
    May,
    June,
    July,
    August,
    September,
    October,
    November,
    December,
}

impl MonthChoice {
    const ALL: [MonthChoice; 12] = [
        MonthChoice::January,
        MonthChoice::February,
        MonthChoice::March,
        MonthChoice::April,
        MonthChoice::May,
        MonthChoice::June,
        MonthChoice::July,
        MonthChoice::August,
        MonthChoice::September,
        MonthChoice::October,
        MonthChoice::November,
        MonthChoice::December,
    ];

    /// 1-based month number
    pub fn number(self) -> u32 {
        Self::ALL.iter().position(|m| *m == self).map_or(1, |i| i as u32 + 1)
    }
}

/// Turns the command options into a concrete period, defaulting to the current JST month/year
pub fn resolve_period(
    period: TimePeriod,
    month: Option<MonthChoice>,
    year: Option<i32>,
    now: chrono::DateTime<Utc>,
) -> LeaderboardPeriod {
    let local = now.with_timezone(&jst());
    let year = year.unwrap_or(local.year());
    match period {
        TimePeriod::Weekly => LeaderboardPeriod::Weekly,
        TimePeriod::Monthly => LeaderboardPeriod::Monthly {
            month: month.map_or(local.month(), MonthChoice::number),
            year,
        },
        TimePeriod::Yearly => LeaderboardPeriod::Yearly { year },
        TimePeriod::AllTime => LeaderboardPeriod::AllTime,
    }
}

pub fn entry_value(entry: &LeaderboardEntry, media: Option<MediaType>) -> String {
    match media {
        Some(m) => format_amount(entry.amount, m.unit()),
        None => format!("{:.2} pts", entry.points),
    }
}

pub fn render_rows(entries: &[LeaderboardEntry], media: Option<MediaType>) -> String {
    entries
        .iter()
        .take(TOP_N)
        .enumerate()
        .map(|(i, e)| format!("{} **{}**: {}", rank_prefix(i + 1), e.display_name, entry_value(e, media)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Footer line for a caller ranked below the visible top
pub fn caller_footer(entries: &[LeaderboardEntry], user_id: &str, media: Option<MediaType>) -> Option<String> {
    let position = entries.iter().position(|e| e.user_id == user_id)?;
    (position >= TOP_N).then(|| {
        format!(
            "Your rank: #{} of {} • {}",
            position + 1,
            entries.len(),
            entry_value(&entries[position], media)
        )
    })
}

/// View the immersion leaderboard
#[poise::command(slash_command, prefix_command)]
pub async fn leaderboard(
    ctx: Context<'_>,
    #[description = "Time period (default: weekly)"] timestamp: Option<TimePeriod>,
    #[description = "Only rank one media type"] media_type: Option<MediaType>,
    #[description = "Month (for the monthly leaderboard)"] month: Option<MonthChoice>,
    #[description = "Year (for monthly and yearly leaderboards)"]
    #[min = 2020]
    #[max = 2100]
    year: Option<i32>,
) -> Result<(), Error> {
    ctx.defer().await?;
    let period = resolve_period(timestamp.unwrap_or(TimePeriod::Weekly), month, year, Utc::now());
    let entries = immersion_store::leaderboard(&ctx.data().firestore, period, media_type).await?;

    let title = format!(
        "🏆 Immersion Leaderboard - {} ({})",
        period.label(),
        media_type.map_or("All Media", MediaType::label)
    );

    if entries.is_empty() {
        let embed = serenity::CreateEmbed::new()
            .title(title)
            .description("No data for this period")
            .color(colors::MUTED);
        ctx.send(poise::CreateReply::default().embed(embed)).await?;
        return Ok(());
    }

    let mut embed = serenity::CreateEmbed::new()
        .title(title)
        .description(render_rows(&entries, media_type))
        .color(colors::GOLD)
        .timestamp(serenity::Timestamp::now());
    if let Some(footer) = caller_footer(&entries, &ctx.author().id.to_string(), media_type) {
        embed = embed.footer(serenity::CreateEmbedFooter::new(footer));
    }

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(id: usize, points: f64) -> LeaderboardEntry {
        LeaderboardEntry {
            user_id: id.to_string(),
            display_name: format!("user{id}"),
            points,
            amount: points * 2.0,
        }
    }

    #[test]
    fn test_resolve_period_defaults_to_jst_month() {
        // 2025-01-31 16:00 UTC is already February 1st in JST
        let now = Utc.with_ymd_and_hms(2025, 1, 31, 16, 0, 0).unwrap();
        assert_eq!(
            resolve_period(TimePeriod::Monthly, None, None, now),
            LeaderboardPeriod::Monthly { month: 2, year: 2025 }
        );
        assert_eq!(
            resolve_period(TimePeriod::Monthly, Some(MonthChoice::December), Some(2024), now),
            LeaderboardPeriod::Monthly { month: 12, year: 2024 }
        );
        assert_eq!(resolve_period(TimePeriod::AllTime, None, Some(2020), now), LeaderboardPeriod::AllTime);
    }

    #[test]
    fn test_rows_use_medals_then_numbers() {
        let entries: Vec<_> = (1..=12).map(|i| entry(i, 100.0 - i as f64)).collect();
        let rows = render_rows(&entries, None);
        let lines: Vec<&str> = rows.lines().collect();
        assert_eq!(lines.len(), 10);
        assert_eq!(lines[0], "🥇 **user1**: 99.00 pts");
        assert!(lines[3].starts_with("`4.` **user4**"));

        let typed = render_rows(&entries[..1], Some(MediaType::Anime));
        assert_eq!(typed, "🥇 **user1**: 198 episodes");
    }

    #[test]
    fn test_caller_footer_only_outside_top() {
        let entries: Vec<_> = (1..=12).map(|i| entry(i, 100.0 - i as f64)).collect();
        assert_eq!(caller_footer(&entries, "3", None), None);
        assert_eq!(
            caller_footer(&entries, "11", None).as_deref(),
            Some("Your rank: #11 of 12 • 89.00 pts")
        );
        assert_eq!(caller_footer(&entries, "99", None), None);
    }
}
