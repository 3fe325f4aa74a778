// /prompt - manage a personal Ayumi persona imported from Rentry

use std::time::Instant;

use poise::serenity_prelude as serenity;
use tracing::{info, warn};

use crate::features::custom_prompt::{self, rentry_code};
use crate::utils::config::colors;
use crate::{Context, Error};

const PREVIEW_CHARS: usize = 1000;

/// First `max` characters, with an ellipsis when cut
pub fn preview(prompt: &str, max: usize) -> String {
    if prompt.chars().count() <= max {
        prompt.to_string()
    } else {
        format!("{}...", prompt.chars().take(max).collect::<String>())
    }
}

async fn reply_embed(ctx: Context<'_>, embed: serenity::CreateEmbed) -> Result<(), Error> {
    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true)).await?;
    Ok(())
}

/// Manage your custom Ayumi personality prompt
#[poise::command(slash_command, subcommands("set", "view", "delete"), subcommand_required)]
pub async fn prompt(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Use a Rentry page as your Ayumi prompt
#[poise::command(slash_command)]
pub async fn set(
    ctx: Context<'_>,
    #[description = "Rentry URL, e.g. https://rentry.co/xxxxx"] url: String,
) -> Result<(), Error> {
    if rentry_code(&url).is_none() {
        let embed = serenity::CreateEmbed::new()
            .title("Invalid URL")
            .description("Only rentry.co pages are supported, e.g. `https://rentry.co/xxxxx`.")
            .color(colors::ERROR);
        return reply_embed(ctx, embed).await;
    }

    let data = ctx.data();
    let user_id = ctx.author().id.get();
    if let Err(wait) = data.prompts.check_rate_limit(user_id, Instant::now()) {
        let embed = serenity::CreateEmbed::new()
            .title("Slow down")
            .description(format!("Please wait {wait} seconds before updating your prompt again."))
            .color(colors::WARNING);
        return reply_embed(ctx, embed).await;
    }

    ctx.defer_ephemeral().await?;
    let content = match custom_prompt::fetch_rentry_prompt(&data.http, &url).await {
        Ok(content) => content,
        Err(e) => {
            warn!("Rentry fetch for {} failed: {}", user_id, e);
            let embed = serenity::CreateEmbed::new()
                .title("Couldn't load that page")
                .description(e.user_message())
                .color(colors::ERROR);
            return reply_embed(ctx, embed).await;
        }
    };
    if let Err(e) = custom_prompt::validate_prompt(&content) {
        let embed = serenity::CreateEmbed::new()
            .title("Prompt rejected")
            .description(e.user_message())
            .color(colors::ERROR);
        return reply_embed(ctx, embed).await;
    }

    data.prompts.save(user_id, &content).await?;
    info!("Updated custom prompt for user {}", user_id);

    let embed = serenity::CreateEmbed::new()
        .title("Custom prompt updated")
        .description("Ayumi will use your prompt from now on.")
        .field("Source", url, false)
        .field("Length", format!("{} characters", content.chars().count()), true)
        .color(colors::SUCCESS);
    reply_embed(ctx, embed).await
}

/// Show your current Ayumi prompt
#[poise::command(slash_command)]
pub async fn view(ctx: Context<'_>) -> Result<(), Error> {
    let embed = match ctx.data().prompts.get(ctx.author().id.get()).await {
        Some(prompt) => serenity::CreateEmbed::new()
            .title("Your custom prompt")
            .description(format!("```\n{}\n```", preview(&prompt, PREVIEW_CHARS)))
            .field("Length", format!("{} characters", prompt.chars().count()), true)
            .color(colors::INFO),
        None => serenity::CreateEmbed::new()
            .title("No custom prompt")
            .description("Ayumi is using her default personality. Set one with `/prompt set`.")
            .color(colors::WARNING),
    };
    reply_embed(ctx, embed).await
}

/// Remove your Ayumi prompt
#[poise::command(slash_command)]
pub async fn delete(ctx: Context<'_>) -> Result<(), Error> {
    let user_id = ctx.author().id.get();
    let embed = if ctx.data().prompts.delete(user_id).await? {
        info!("Deleted custom prompt for user {}", user_id);
        serenity::CreateEmbed::new()
            .title("Custom prompt deleted")
            .description("Ayumi is back to her default personality.")
            .color(colors::SUCCESS)
    } else {
        serenity::CreateEmbed::new()
            .title("No custom prompt")
            .description("You don't have a custom prompt set.")
            .color(colors::WARNING)
    };
    reply_embed(ctx, embed).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview() {
        assert_eq!(preview("short", 10), "short");
        let cut = preview(&"x".repeat(1200), PREVIEW_CHARS);
        assert_eq!(cut.chars().count(), PREVIEW_CHARS + 3);
        assert!(cut.ends_with("..."));
    }
}
