// /immersion - log an immersion activity

use chrono::{Duration, NaiveDate};
use poise::serenity_prelude as serenity;
use tracing::{debug, warn};

use crate::api::anilist::{self, AniListKind};
use crate::api::{vndb, youtube};
use crate::error::AyumiError;
use crate::features::immersion_store;
use crate::models::immersion_log::{LogUser, NewLog};
use crate::models::media::MediaType;
use crate::utils::config::{colors, effective_date};
use crate::utils::formatters::{format_amount, plural_days};
use crate::{Context, Data, Error};

const AUTOCOMPLETE_LIMIT: usize = 10;
const CHOICE_MAX_CHARS: usize = 100;

/// Parses the optional `date` option against the current effective date
pub fn parse_log_date(raw: Option<&str>, today: NaiveDate) -> Result<NaiveDate, AyumiError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(today);
    };
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        AyumiError::Validation("Invalid date format. Please use YYYY-MM-DD (e.g. 2025-01-21)".into())
    })?;
    if date > today {
        return Err(AyumiError::Validation("The date cannot be in the future.".into()));
    }
    if date < today - Duration::days(365) {
        return Err(AyumiError::Validation("The date cannot be more than a year ago.".into()));
    }
    Ok(date)
}

/// Splits an autocomplete pick `Title|ID` into its parts
pub fn split_choice(raw: &str) -> (&str, Option<&str>) {
    match raw.rsplit_once('|') {
        Some((title, id)) if !id.trim().is_empty() => (title.trim(), Some(id.trim())),
        _ => (raw.trim(), None),
    }
}

/// `Title|ID` cut to Discord's 100 character choice limit
fn choice(title: &str, id: &str) -> String {
    let budget = CHOICE_MAX_CHARS.saturating_sub(id.chars().count() + 1);
    let title: String = title.chars().take(budget).collect();
    format!("{title}|{id}")
}

/// Media type picked so far in the command being autocompleted
fn selected_media(ctx: Context<'_>) -> Option<MediaType> {
    let poise::Context::Application(app) = ctx else {
        return None;
    };
    let option = app.interaction.data.options.iter().find(|o| o.name == "media_type")?;
    match &option.value {
        serenity::CommandDataOptionValue::Integer(i) => usize::try_from(*i)
            .ok()
            .and_then(|i| MediaType::ALL.get(i).copied()),
        serenity::CommandDataOptionValue::String(s) => {
            MediaType::from_key(s).or_else(|| MediaType::ALL.into_iter().find(|m| m.label() == s))
        }
        _ => None,
    }
}

async fn autocomplete_title(ctx: Context<'_>, partial: &str) -> impl Iterator<Item = String> {
    let http = &ctx.data().http;
    let mut results = Vec::new();

    if partial.chars().count() >= 2 {
        match selected_media(ctx) {
            Some(MediaType::VisualNovel) => match vndb::search_vns(http, partial, AUTOCOMPLETE_LIMIT).await {
                Ok(vns) => results.extend(vns.iter().map(|vn| choice(&vn.title, &vn.id))),
                Err(e) => debug!("VNDB autocomplete failed: {}", e),
            },
            Some(media @ (MediaType::Anime | MediaType::Manga)) => {
                let kind = if media == MediaType::Anime { AniListKind::Anime } else { AniListKind::Manga };
                match anilist::search_media(http, partial, kind, AUTOCOMPLETE_LIMIT).await {
                    Ok(found) => results.extend(found.iter().map(|m| choice(&m.title, &m.id.to_string()))),
                    Err(e) => debug!("AniList autocomplete failed: {}", e),
                }
            }
            _ => {}
        }
    }

    if results.is_empty() && !partial.is_empty() {
        results.push(partial.chars().take(CHOICE_MAX_CHARS).collect());
    }
    results.into_iter()
}

/// Fills title, links, thumbnail and VN info from the matching API. Failures only cost the extras.
/// A found YouTube video also sets the listening amount to its length in minutes.
async fn enrich(data: &Data, log: &mut NewLog, url: Option<&str>) {
    let http = &data.http;
    match log.media {
        MediaType::Listening => {
            let Some(video_id) = url.and_then(youtube::extract_video_id) else {
                return;
            };
            log.url = Some(youtube::normalize_url(&video_id));
            let Some(key) = data.settings.youtube_api_key.as_deref() else {
                return;
            };
            match youtube::video_info(http, key, &video_id).await {
                Ok(Some(info)) => {
                    if !log.has_custom_title() {
                        log.title = info.title.clone();
                    }
                    log.thumbnail = info.thumbnail.clone();
                    if info.duration_minutes() > 0 {
                        log.amount = info.duration_minutes() as f64;
                    }
                }
                Ok(None) => debug!("YouTube video {} not found", video_id),
                Err(e) => warn!("YouTube lookup failed: {}", e),
            }
        }
        MediaType::VisualNovel if log.has_custom_title() => {
            let (title, id) = split_choice(&log.title);
            let (title, id) = (title.to_string(), id.map(str::to_string));
            let found = match id {
                Some(id) => vndb::get_vn(http, &id).await,
                None => vndb::search_vns(http, &title, 1).await.map(|v| v.into_iter().next()),
            };
            match found {
                Ok(Some(vn)) => {
                    log.title = vn.title.clone();
                    log.thumbnail = vn.image.clone();
                    log.vndb_url = Some(vn.url());
                    log.vndb_info = Some(vn.info());
                }
                Ok(None) => log.title = title,
                Err(e) => {
                    warn!("VNDB lookup failed: {}", e);
                    log.title = title;
                }
            }
        }
        MediaType::Anime | MediaType::Manga if log.has_custom_title() => {
            let kind = if log.media == MediaType::Anime { AniListKind::Anime } else { AniListKind::Manga };
            let (title, id) = split_choice(&log.title);
            let (title, id) = (title.to_string(), id.and_then(|id| id.parse::<i64>().ok()));
            let found = match id {
                Some(id) => anilist::get_media(http, id, kind).await,
                None => anilist::search_media(http, &title, kind, 1).await.map(|m| m.into_iter().next()),
            };
            match found {
                Ok(Some(media)) => {
                    log.title = media.title.clone();
                    log.thumbnail = media.cover.clone();
                    log.anilist_url = Some(media.url.clone());
                }
                Ok(None) => log.title = title,
                Err(e) => {
                    warn!("AniList lookup failed: {}", e);
                    log.title = title;
                }
            }
        }
        _ => {}
    }
}

/// Only the configured immersion channel accepts logs in a guild that set one
fn wrong_channel(ctx: Context<'_>) -> Option<String> {
    let guild_id = ctx.guild_id()?;
    let config = ctx.data().guild_configs.get(&guild_id.get())?;
    let allowed = config.immersion_channel_id.as_deref()?;
    (allowed != ctx.channel_id().to_string()).then(|| allowed.to_string())
}

/// Log your Japanese immersion activity
#[poise::command(slash_command, prefix_command)]
pub async fn immersion(
    ctx: Context<'_>,
    #[description = "Type of media"] media_type: MediaType,
    #[description = "Amount (episodes, pages, minutes, characters)"] amount: f64,
    #[description = "Title of the media"]
    #[autocomplete = "autocomplete_title"]
    title: Option<String>,
    #[description = "Optional comment"] comment: Option<String>,
    #[description = "YouTube URL (for listening; uses the video length as the amount)"] url: Option<String>,
    #[description = "Custom date (YYYY-MM-DD)"] date: Option<String>,
) -> Result<(), Error> {
    if let Some(channel) = wrong_channel(ctx) {
        ctx.send(
            poise::CreateReply::default()
                .content(format!("This command can only be used in <#{channel}>."))
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    }

    if !amount.is_finite() || amount <= 0.0 {
        return Err(AyumiError::Validation("Amount must be greater than 0".into()).into());
    }
    let log_date = parse_log_date(date.as_deref(), effective_date())?;

    ctx.defer().await?;
    let data = ctx.data();
    let author = ctx.author();

    let user = LogUser {
        id: author.id.to_string(),
        username: author.name.clone(),
        display_name: author.global_name.clone(),
        avatar: author.avatar_url(),
    };
    let mut new_log = NewLog::new(user, media_type, amount, title.unwrap_or_else(|| "-".into()));
    new_log.comment = comment;
    enrich(data, &mut new_log, url.as_deref()).await;

    let outcome = immersion_store::record_log(&data.firestore, new_log, log_date).await?;
    let log = &outcome.log;
    let unit = media_type.unit();

    let description = if !log.has_title() {
        String::new()
    } else if let Some(link) = log
        .activity
        .anilist_url
        .as_ref()
        .or(log.activity.vndb_url.as_ref())
        .or(log.activity.url.as_ref())
    {
        format!("**[{}]({})**", log.activity.title, link)
    } else {
        format!("**{}**", log.activity.title)
    };

    let mut embed = serenity::CreateEmbed::new()
        .title(format!("{} Logged", media_type.label()))
        .description(description)
        .color(colors::IMMERSION)
        .field("Progress", format!("+{}", format_amount(log.activity.amount, unit)), true)
        .field("Total", format_amount(outcome.type_total, unit), true)
        .field("Streak", plural_days(outcome.streak.current), true)
        .footer(serenity::CreateEmbedFooter::new(format!(
            "{} • {}",
            author.name,
            log_date.format("%Y-%m-%d")
        )))
        .thumbnail(log.metadata.thumbnail.clone().unwrap_or_else(|| author.face()));

    if let Some(length) = log.metadata.vndb_info.as_ref().and_then(|info| info.length) {
        embed = embed.field("Length", vndb::length_label(length), true);
    }
    if let Some(ref comment) = log.activity.comment {
        embed = embed.field("Comment", comment, false);
    }

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_log_date() {
        let today = day(2025, 6, 15);
        assert_eq!(parse_log_date(None, today).unwrap(), today);
        assert_eq!(parse_log_date(Some("  "), today).unwrap(), today);
        assert_eq!(parse_log_date(Some("2025-06-01"), today).unwrap(), day(2025, 6, 1));
        assert!(parse_log_date(Some("2025-06-16"), today).is_err());
        assert!(parse_log_date(Some("2024-06-14"), today).is_err());
        assert!(parse_log_date(Some("15/06/2025"), today).is_err());
    }

    #[test]
    fn test_split_choice() {
        assert_eq!(split_choice("Steins;Gate|v2002"), ("Steins;Gate", Some("v2002")));
        assert_eq!(split_choice("Plain title"), ("Plain title", None));
        assert_eq!(split_choice("Trailing|"), ("Trailing|", None));
    }

    #[test]
    fn test_choice_respects_limit() {
        let long = "a".repeat(150);
        let picked = choice(&long, "12345");
        assert_eq!(picked.chars().count(), CHOICE_MAX_CHARS);
        assert!(picked.ends_with("|12345"));
    }
}
