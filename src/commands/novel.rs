// /novel - search the light novel catalogue

use std::time::Duration;

use futures::StreamExt;
use poise::serenity_prelude as serenity;

use crate::features::novels::Novel;
use crate::utils::config::colors;
use crate::{Context, Error};

const PAGE_SIZE: usize = 10;
const COLLECT_TIMEOUT: Duration = Duration::from_secs(60);
const TITLE_MAX_CHARS: usize = 60;

fn page_count(total: usize) -> usize {
    total.div_ceil(PAGE_SIZE).max(1)
}

fn truncate_title(title: &str, max: usize) -> String {
    if title.chars().count() <= max {
        title.to_string()
    } else {
        format!("{}...", title.chars().take(max.saturating_sub(3)).collect::<String>())
    }
}

fn results_embed(query: &str, results: &[&Novel], page: usize) -> serenity::CreateEmbed {
    let start = (page * PAGE_SIZE).min(results.len());
    let end = (start + PAGE_SIZE).min(results.len());

    let description = results[start..end]
        .iter()
        .enumerate()
        .map(|(i, novel)| {
            format!(
                "**{}.** [{}]({})\nSize: {} • Format: {}",
                start + i + 1,
                truncate_title(&novel.title, TITLE_MAX_CHARS),
                novel.url,
                novel.size,
                novel.format
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    serenity::CreateEmbed::new()
        .title(format!("📚 Light novels matching \"{query}\""))
        .description(description)
        .color(colors::INFO)
        .footer(serenity::CreateEmbedFooter::new(format!(
            "Showing {}-{} of {} • Page {}/{}",
            start + 1,
            end,
            results.len(),
            page + 1,
            page_count(results.len())
        )))
}

fn nav_buttons(page: usize, pages: usize, disabled: bool) -> Vec<serenity::CreateActionRow> {
    vec![serenity::CreateActionRow::Buttons(vec![
        serenity::CreateButton::new("novel:prev")
            .label("◀")
            .style(serenity::ButtonStyle::Secondary)
            .disabled(disabled || page == 0),
        serenity::CreateButton::new("novel:next")
            .label("▶")
            .style(serenity::ButtonStyle::Primary)
            .disabled(disabled || page + 1 >= pages),
    ])]
}

/// Search the light novel catalogue
#[poise::command(slash_command, prefix_command)]
pub async fn novel(
    ctx: Context<'_>,
    #[description = "Light novel title (kanji, kana or romaji)"]
    #[rest]
    title: String,
) -> Result<(), Error> {
    let catalog = &ctx.data().novels;
    if catalog.is_empty() {
        ctx.say("The novel list is not available right now.").await?;
        return Ok(());
    }

    let results = catalog.search(&title);
    if results.is_empty() {
        ctx.say(format!("No light novels found for **{title}**.")).await?;
        return Ok(());
    }

    let pages = page_count(results.len());
    let mut page = 0;
    let mut reply = poise::CreateReply::default().embed(results_embed(&title, &results, page));
    if pages > 1 {
        reply = reply.components(nav_buttons(page, pages, false));
    }
    let handle = ctx.send(reply).await?;
    if pages == 1 {
        return Ok(());
    }

    let message = handle.message().await?;
    let mut collector = message
        .await_component_interactions(ctx.serenity_context())
        .author_id(ctx.author().id)
        .timeout(COLLECT_TIMEOUT)
        .stream();

    while let Some(interaction) = collector.next().await {
        page = match interaction.data.custom_id.as_str() {
            "novel:prev" => page.saturating_sub(1),
            "novel:next" => (page + 1).min(pages - 1),
            _ => continue,
        };
        interaction
            .create_response(
                ctx.http(),
                serenity::CreateInteractionResponse::UpdateMessage(
                    serenity::CreateInteractionResponseMessage::new()
                        .embed(results_embed(&title, &results, page))
                        .components(nav_buttons(page, pages, false)),
                ),
            )
            .await?;
    }

    handle
        .edit(
            ctx,
            poise::CreateReply::default()
                .embed(results_embed(&title, &results, page))
                .components(nav_buttons(page, pages, true)),
        )
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_count() {
        assert_eq!(page_count(0), 1);
        assert_eq!(page_count(10), 1);
        assert_eq!(page_count(11), 2);
    }

    #[test]
    fn test_truncate_title() {
        assert_eq!(truncate_title("短い", 10), "短い");
        let long = "あ".repeat(70);
        let cut = truncate_title(&long, TITLE_MAX_CHARS);
        assert_eq!(cut.chars().count(), TITLE_MAX_CHARS);
        assert!(cut.ends_with("..."));
    }
}
