// /afk - mark yourself away until your next message

use chrono::Utc;
use poise::serenity_prelude as serenity;

use crate::features::afk::AfkStatus;
use crate::utils::config::colors;
use crate::{Context, Error};

const DEFAULT_REASON: &str = "AFK";

/// Set your AFK status
#[poise::command(slash_command, prefix_command)]
pub async fn afk(
    ctx: Context<'_>,
    #[description = "Reason for being AFK (optional)"]
    #[rest]
    reason: Option<String>,
) -> Result<(), Error> {
    let reason = reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| DEFAULT_REASON.to_string());
    let user = ctx.author();
    let avatar_url = user.avatar_url().unwrap_or_else(|| user.default_avatar_url());

    ctx.data().afk.set(
        user.id.get(),
        AfkStatus {
            username: user.name.clone(),
            avatar_url: avatar_url.clone(),
            reason: reason.clone(),
            since: Utc::now(),
        },
    );

    let embed = serenity::CreateEmbed::new()
        .color(colors::INFO)
        .author(serenity::CreateEmbedAuthor::new(&user.name).icon_url(avatar_url))
        .title("💤 AFK")
        .description(format!("Others will be told you are away.\n**Reason:** {reason}"))
        .footer(serenity::CreateEmbedFooter::new("Send any message to clear your AFK status"))
        .timestamp(serenity::Timestamp::now());

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}
