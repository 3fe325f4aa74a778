// /subs - fetch Japanese subtitles from Jimaku and deliver them by DM

use poise::serenity_prelude as serenity;
use tracing::{debug, error, info};

use crate::api::anilist::{self, AniListKind};
use crate::api::jimaku::{Entry, Jimaku, SubtitleFile};
use crate::utils::config::colors;
use crate::{Context, Error};

const MAX_DM_FILES: usize = 4;

/// What happened to one of the picked files
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Attached,
    TooLarge,
    Failed,
}

/// Input is treated as a Jimaku entry id when it is all digits
pub fn entry_id(input: &str) -> Option<i64> {
    let input = input.trim();
    if input.is_empty() || !input.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    input.parse().ok()
}

pub fn embed_title(entry: &Entry, episode: Option<u32>) -> String {
    match episode {
        Some(ep) => format!("{} ep {}", entry.display_name(), ep),
        None => entry.display_name().to_string(),
    }
}

/// File list for the DM embed
pub fn file_listing(files: &[(&SubtitleFile, Delivery)]) -> String {
    let mut out = String::new();
    for (file, delivery) in files {
        out.push_str(&format!("**{}**\nSize: {:.2} KB\n", file.name, file.size as f64 / 1024.0));
        match delivery {
            Delivery::Attached => {}
            Delivery::TooLarge => {
                out.push_str(&format!("*Too large for Discord* - [download]({})\n", file.url));
            }
            Delivery::Failed => out.push_str("*Download failed*\n"),
        }
        out.push('\n');
    }
    out
}

async fn autocomplete_entry<'a>(
    ctx: Context<'a>,
    partial: &'a str,
) -> impl Iterator<Item = serenity::AutocompleteChoice> + 'a {
    let mut choices = Vec::new();
    if let (Some(key), true) = (ctx.data().settings.jimaku_api_key.as_deref(), partial.chars().count() >= 2) {
        match Jimaku::new(&ctx.data().http, key).search(partial).await {
            Ok(entries) => {
                choices = entries
                    .into_iter()
                    .take(25)
                    .map(|entry| {
                        let label = match entry.english_name.as_deref() {
                            Some(en) if en != entry.name => format!("{} ({})", entry.name, en),
                            _ => entry.name.clone(),
                        };
                        let label: String = label.chars().take(100).collect();
                        serenity::AutocompleteChoice::new(label, entry.id.to_string())
                    })
                    .collect();
            }
            Err(e) => debug!("Jimaku autocomplete failed: {}", e),
        }
    }
    choices.into_iter()
}

/// Download anime subtitles from Jimaku
#[poise::command(slash_command, prefix_command)]
pub async fn subs(
    ctx: Context<'_>,
    #[description = "Anime name or Jimaku ID"]
    #[autocomplete = "autocomplete_entry"]
    name: String,
    #[description = "Episode number (optional)"]
    #[min = 1]
    episode: Option<u32>,
) -> Result<(), Error> {
    let data = ctx.data();
    let Some(api_key) = data.settings.jimaku_api_key.as_deref() else {
        ctx.send(
            poise::CreateReply::default()
                .content("Subtitle search is not configured on this bot.")
                .ephemeral(true),
        )
        .await?;
        return Ok(());
    };

    ctx.defer().await?;
    let jimaku = Jimaku::new(&data.http, api_key);

    let entry = match entry_id(&name) {
        Some(id) => jimaku.entry(id).await?,
        None => jimaku.search(&name).await?.into_iter().next(),
    };
    let Some(entry) = entry else {
        ctx.say(format!("No anime found for **{name}**.")).await?;
        return Ok(());
    };

    let files = jimaku.files(entry.id, episode).await?;
    if files.is_empty() {
        let episode_text = episode.map(|e| format!(" episode {e}")).unwrap_or_default();
        ctx.say(format!("No subtitle files found for **{}**{}.", entry.display_name(), episode_text))
            .await?;
        return Ok(());
    }

    let cover = match entry.anilist_id {
        Some(id) => match anilist::get_media(&data.http, id, AniListKind::Anime).await {
            Ok(media) => media.and_then(|m| m.cover),
            Err(e) => {
                debug!("AniList cover lookup failed: {}", e);
                None
            }
        },
        None => None,
    };

    let mut public = serenity::CreateEmbed::new()
        .title(embed_title(&entry, episode))
        .color(colors::SUCCESS)
        .footer(serenity::CreateEmbedFooter::new("Jimaku • files sent by DM"))
        .timestamp(serenity::Timestamp::now());
    if let Some(ref english) = entry.english_name {
        public = public.field("English Name", english, true);
    }
    if let Some(ref japanese) = entry.japanese_name {
        public = public.field("Japanese Name", japanese, true);
    }
    if let Some(ref cover) = cover {
        public = public.thumbnail(cover);
    }
    ctx.send(poise::CreateReply::default().embed(public)).await?;

    let mut picked = Vec::new();
    let mut attachments = Vec::new();
    for file in files.iter().take(MAX_DM_FILES) {
        if !file.fits_attachment() {
            picked.push((file, Delivery::TooLarge));
            continue;
        }
        match jimaku.download(file).await {
            Ok(bytes) => {
                attachments.push(serenity::CreateAttachment::bytes(bytes, file.name.clone()));
                picked.push((file, Delivery::Attached));
            }
            Err(e) => {
                error!("Failed to download subtitle {}: {}", file.name, e);
                picked.push((file, Delivery::Failed));
            }
        }
    }

    let mut dm_embed = serenity::CreateEmbed::new()
        .title(format!("Subtitles: {}", entry.display_name()))
        .description(file_listing(&picked))
        .color(colors::INFO)
        .field("Entry ID", format!("`{}`", entry.id), true)
        .timestamp(serenity::Timestamp::now());
    if let Some(ref cover) = cover {
        dm_embed = dm_embed.thumbnail(cover);
    }
    if files.len() > MAX_DM_FILES {
        dm_embed = dm_embed.field(
            "More files",
            format!(
                "Showing {MAX_DM_FILES} of {} files. Use the `episode` option to narrow it down.",
                files.len()
            ),
            false,
        );
    }

    let author = ctx.author();
    let message = serenity::CreateMessage::new().embed(dm_embed).add_files(attachments);
    if let Err(e) = author.direct_message(ctx, message).await {
        error!("Could not DM subtitles to {}: {}", author.name, e);
        ctx.say("I couldn't DM you the files. Please allow direct messages from server members and try again.")
            .await?;
        return Ok(());
    }
    info!("Sent {} subtitle file(s) for {} to {}", picked.len(), entry.id, author.name);

    let skipped = picked.iter().filter(|(_, d)| *d != Delivery::Attached).count();
    if skipped > 0 {
        ctx.send(
            poise::CreateReply::default()
                .content(format!(
                    "{skipped} file(s) could not be attached. Download links are in your DM."
                ))
                .ephemeral(true),
        )
        .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, size: u64) -> SubtitleFile {
        SubtitleFile { name: name.into(), size, url: format!("https://jimaku.cc/{name}") }
    }

    #[test]
    fn test_entry_id() {
        assert_eq!(entry_id(" 1234 "), Some(1234));
        assert_eq!(entry_id("Frieren"), None);
        assert_eq!(entry_id("86"), Some(86));
        assert_eq!(entry_id(""), None);
    }

    #[test]
    fn test_file_listing() {
        let small = file("ep01.srt", 2048);
        let large = file("batch.zip", 20 * 1024 * 1024);
        let listing = file_listing(&[(&small, Delivery::Attached), (&large, Delivery::TooLarge)]);
        assert!(listing.contains("**ep01.srt**\nSize: 2.00 KB\n"));
        assert!(listing.contains("[download](https://jimaku.cc/batch.zip)"));
        assert!(!listing.contains("Download failed"));
    }
}
