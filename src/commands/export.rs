// /export - download immersion logs as a text file

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use poise::serenity_prelude as serenity;

use crate::features::immersion_store::{self, StoredLog};
use crate::models::media::{label_for_key, unit_for_key, MediaType};
use crate::utils::formatters::{format_export_time, format_number};
use crate::utils::periods::ExportTimeframe;
use crate::{Context, Error};

pub fn export_filename(username: &str, timeframe: ExportTimeframe, media: Option<MediaType>) -> String {
    let safe: String = username
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    format!(
        "immersion_logs_{}_{}_{}.txt",
        safe,
        timeframe.slug(),
        media.map_or("all", MediaType::key)
    )
}

pub fn export_text(
    username: &str,
    timeframe: ExportTimeframe,
    media: Option<MediaType>,
    logs: &[StoredLog],
    now: DateTime<Utc>,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Immersion Logs Export");
    let _ = writeln!(out, "=====================");
    let _ = writeln!(out);
    let _ = writeln!(out, "User: {username}");
    let _ = writeln!(out, "Timeframe: {}", timeframe.label());
    let _ = writeln!(out, "Media Type: {}", media.map_or("All Types", MediaType::label));
    let _ = writeln!(out, "Total Logs: {}", logs.len());
    let _ = writeln!(out, "Export Date: {}", format_export_time(now));
    let _ = writeln!(out);

    if logs.is_empty() {
        let _ = writeln!(out, "No immersion logs found for the selected timeframe and media type.");
        return out;
    }

    let mut summary: BTreeMap<&str, (u32, f64)> = BTreeMap::new();
    for stored in logs {
        let entry = summary.entry(stored.log.activity.media_type.as_str()).or_default();
        entry.0 += 1;
        entry.1 += stored.log.activity.amount;
    }

    let _ = writeln!(out, "Summary Statistics");
    let _ = writeln!(out, "------------------");
    for (key, (sessions, total)) in &summary {
        let _ = writeln!(
            out,
            "{}: {} session{}, {} {}",
            label_for_key(key),
            sessions,
            if *sessions == 1 { "" } else { "s" },
            format_number(*total),
            unit_for_key(key)
        );
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "Detailed Logs");
    let _ = writeln!(out, "-------------");
    for (i, stored) in logs.iter().enumerate() {
        let activity = &stored.log.activity;
        let _ = writeln!(
            out,
            "{}. {} {} of {}",
            i + 1,
            format_number(activity.amount),
            activity.unit,
            activity.type_label
        );
        if stored.log.has_title() {
            let _ = writeln!(out, "   Title: {}", activity.title);
        }
        if let Some(created) = stored.created() {
            let _ = writeln!(out, "   Date: {}", format_export_time(created));
        }
        if let Some(note) = activity.comment.as_deref().filter(|c| !c.is_empty()) {
            let _ = writeln!(out, "   Note: {note}");
        }
        let _ = writeln!(out);
    }
    out
}

/// Export your immersion logs as a text file
#[poise::command(slash_command, prefix_command)]
pub async fn export(
    ctx: Context<'_>,
    #[description = "Timeframe to export"] timeframe: ExportTimeframe,
    #[description = "Only export one media type"] mediatype: Option<MediaType>,
) -> Result<(), Error> {
    ctx.defer().await?;
    let db = &ctx.data().firestore;
    let author = ctx.author();
    let uid = author.id.to_string();
    let now = Utc::now();

    let mut logs = match timeframe {
        ExportTimeframe::All => immersion_store::all_logs(db, &uid, mediatype).await?,
        _ => immersion_store::recent_logs(db, &uid, timeframe.since(now), mediatype).await?,
    };
    logs.sort_by(|a, b| b.created().cmp(&a.created()));

    let content = export_text(&author.name, timeframe, mediatype, &logs, now);
    let attachment = serenity::CreateAttachment::bytes(
        content.into_bytes(),
        export_filename(&author.name, timeframe, mediatype),
    );
    let media_text = mediatype.map(|m| format!(" ({})", m.label())).unwrap_or_default();

    ctx.send(
        poise::CreateReply::default()
            .content(format!(
                "**{}'s** immersion log export for {}{}:",
                author.name,
                timeframe.label(),
                media_text
            ))
            .attachment(attachment),
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::immersion_log::{LogUser, NewLog};
    use chrono::TimeZone;

    fn stored(media: MediaType, amount: f64, title: &str, comment: Option<&str>) -> StoredLog {
        let created = Utc.with_ymd_and_hms(2025, 2, 3, 12, 0, 0).unwrap();
        let mut new_log = NewLog::new(LogUser::default(), media, amount, title);
        new_log.comment = comment.map(str::to_string);
        StoredLog { id: "id".into(), log: new_log.into_log(created, created.date_naive()) }
    }

    #[test]
    fn test_filename() {
        assert_eq!(
            export_filename("kana.chan", ExportTimeframe::Week, Some(MediaType::Anime)),
            "immersion_logs_kana_chan_week_anime.txt"
        );
        assert_eq!(
            export_filename("kana", ExportTimeframe::All, None),
            "immersion_logs_kana_all_all.txt"
        );
    }

    #[test]
    fn test_empty_export_says_so() {
        let now = Utc.with_ymd_and_hms(2025, 2, 3, 12, 0, 0).unwrap();
        let text = export_text("kana", ExportTimeframe::Day, None, &[], now);
        assert!(text.contains("Total Logs: 0"));
        assert!(text.contains("No immersion logs found"));
        assert!(!text.contains("Summary Statistics"));
    }

    #[test]
    fn test_export_sections() {
        let now = Utc.with_ymd_and_hms(2025, 2, 3, 12, 0, 0).unwrap();
        let logs = vec![
            stored(MediaType::Anime, 3.0, "Frieren", Some("great ep")),
            stored(MediaType::Anime, 1.0, "-", None),
            stored(MediaType::Book, 1500.0, "Kino", None),
        ];
        let text = export_text("kana", ExportTimeframe::Week, None, &logs, now);

        assert!(text.contains("Media Type: All Types"));
        assert!(text.contains("Anime: 2 sessions, 4 episodes"));
        assert!(text.contains("Book: 1 session, 1,500 pages"));
        assert!(text.contains("1. 3 episodes of Anime\n   Title: Frieren\n"));
        assert!(text.contains("   Note: great ep"));
        assert!(text.contains("3. 1,500 pages of Book"));
        assert!(text.contains("Date: Monday, 3 Feb 2025 at 21:00"));
    }
}
