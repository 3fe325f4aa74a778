// /react - add an animated emoji from the catalogue to a message

use std::time::Duration;

use futures::StreamExt;
use poise::serenity_prelude as serenity;
use tracing::{debug, error};

use crate::utils::config::colors;
use crate::utils::emojis::{self, Emoji};
use crate::{Context, Error};

const EMOJIS_PER_PAGE: usize = 20;
const BUTTONS_PER_ROW: usize = 5;
const COLLECT_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_MESSAGE_AGE_SECS: i64 = 14 * 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageLink {
    pub guild_id: u64,
    pub channel_id: u64,
    pub message_id: u64,
}

/// Parses `https://discord.com/channels/{guild}/{channel}/{message}` (ptb, canary and discordapp hosts too)
pub fn parse_message_link(input: &str) -> Option<MessageLink> {
    let url = reqwest::Url::parse(input.trim()).ok()?;
    let host = url.host_str()?;
    let known_host = ["discord.com", "discordapp.com"]
        .iter()
        .any(|base| host == *base || host.ends_with(&format!(".{base}")));
    if !known_host {
        return None;
    }

    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
    if segments.next()? != "channels" {
        return None;
    }
    let guild_id = segments.next()?.parse().ok()?;
    let channel_id = segments.next()?.parse().ok()?;
    let message_id = segments.next()?.parse().ok()?;
    if segments.next().is_some() {
        return None;
    }
    Some(MessageLink { guild_id, channel_id, message_id })
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Pick {
    Emoji(String),
    Page(usize),
}

fn parse_pick(custom_id: &str) -> Option<Pick> {
    let rest = custom_id.strip_prefix("react:")?;
    match rest.strip_prefix("page:") {
        Some(page) => page.parse().ok().map(Pick::Page),
        None => Some(Pick::Emoji(rest.to_string())),
    }
}

fn reaction(emoji: &Emoji) -> Option<serenity::ReactionType> {
    Some(serenity::ReactionType::Custom {
        animated: emoji.animated,
        id: serenity::EmojiId::new(emoji.snowflake()?),
        name: Some(emoji.name.clone()),
    })
}

fn emoji_rows(page: usize) -> Vec<serenity::CreateActionRow> {
    let mut rows: Vec<serenity::CreateActionRow> = emojis::page(page, EMOJIS_PER_PAGE)
        .chunks(BUTTONS_PER_ROW)
        .map(|chunk| {
            let buttons = chunk
                .iter()
                .filter_map(|emoji| {
                    let button = serenity::CreateButton::new(format!("react:{}", emoji.id))
                        .style(serenity::ButtonStyle::Secondary);
                    reaction(emoji).map(|r| button.emoji(r))
                })
                .collect();
            serenity::CreateActionRow::Buttons(buttons)
        })
        .collect();

    let pages = emojis::page_count(EMOJIS_PER_PAGE);
    if pages > 1 {
        rows.push(serenity::CreateActionRow::Buttons(vec![
            serenity::CreateButton::new(format!("react:page:{}", page.saturating_sub(1)))
                .label("◀")
                .style(serenity::ButtonStyle::Primary)
                .disabled(page == 0),
            serenity::CreateButton::new("react:page_indicator")
                .label(format!("{}/{}", page + 1, pages))
                .style(serenity::ButtonStyle::Secondary)
                .disabled(true),
            serenity::CreateButton::new(format!("react:page:{}", page + 1))
                .label("▶")
                .style(serenity::ButtonStyle::Primary)
                .disabled(page + 1 >= pages),
        ]));
    }
    rows
}

async fn say_ephemeral(ctx: Context<'_>, text: impl Into<String>) -> Result<(), Error> {
    ctx.send(poise::CreateReply::default().content(text).ephemeral(true)).await?;
    Ok(())
}

/// React to a message with an animated emoji
#[poise::command(slash_command, prefix_command, guild_only)]
pub async fn react(
    ctx: Context<'_>,
    #[description = "Link to the message to react to"] message_link: String,
) -> Result<(), Error> {
    let Some(link) = parse_message_link(&message_link) else {
        return say_ephemeral(
            ctx,
            "Invalid message link. Use *Copy Message Link* (https://discord.com/channels/...).",
        )
        .await;
    };
    if ctx.guild_id().map(|g| g.get()) != Some(link.guild_id) {
        return say_ephemeral(ctx, "That message is not in this server.").await;
    }

    let channel_id = serenity::ChannelId::new(link.channel_id);
    let message = match channel_id
        .message(ctx.http(), serenity::MessageId::new(link.message_id))
        .await
    {
        Ok(message) => message,
        Err(e) => {
            debug!("Could not fetch message {}: {}", link.message_id, e);
            return say_ephemeral(ctx, format!("Message not found in <#{}>.", link.channel_id)).await;
        }
    };

    let age = chrono::Utc::now().timestamp() - message.timestamp.unix_timestamp();
    if age > MAX_MESSAGE_AGE_SECS {
        return say_ephemeral(ctx, "That message is older than 14 days and can't be reacted to.").await;
    }

    let prompt = serenity::CreateEmbed::new()
        .title("Pick an emoji")
        .description(format!("Click an emoji below to react to [this message]({}).", message.link()))
        .color(colors::INFO);

    let mut page = 0;
    let reply = ctx
        .send(
            poise::CreateReply::default()
                .embed(prompt.clone())
                .components(emoji_rows(page))
                .ephemeral(true),
        )
        .await?;
    let sent = reply.message().await?;

    let mut collector = sent
        .await_component_interactions(ctx.serenity_context())
        .timeout(COLLECT_TIMEOUT)
        .author_id(ctx.author().id)
        .stream();

    while let Some(interaction) = collector.next().await {
        match parse_pick(&interaction.data.custom_id) {
            Some(Pick::Page(next)) => {
                page = next.min(emojis::page_count(EMOJIS_PER_PAGE) - 1);
                interaction
                    .create_response(
                        ctx.http(),
                        serenity::CreateInteractionResponse::UpdateMessage(
                            serenity::CreateInteractionResponseMessage::new()
                                .embed(prompt.clone())
                                .components(emoji_rows(page)),
                        ),
                    )
                    .await?;
            }
            Some(Pick::Emoji(id)) => {
                let Some((emoji, reaction)) = emojis::by_id(&id).and_then(|e| reaction(e).map(|r| (e, r))) else {
                    interaction.defer(ctx.http()).await?;
                    continue;
                };
                match message.react(ctx.http(), reaction).await {
                    Ok(_) => {
                        let done = serenity::CreateEmbed::new()
                            .title("Reaction added")
                            .description(format!("Reacted with {} **{}**", emoji.markup(), emoji.name))
                            .color(colors::SUCCESS)
                            .image(emoji.cdn_url())
                            .footer(serenity::CreateEmbedFooter::new(format!("Emoji ID: {}", emoji.id)));
                        interaction
                            .create_response(
                                ctx.http(),
                                serenity::CreateInteractionResponse::UpdateMessage(
                                    serenity::CreateInteractionResponseMessage::new()
                                        .embed(done)
                                        .components(vec![]),
                                ),
                            )
                            .await?;
                        return Ok(());
                    }
                    Err(e) => {
                        error!("Failed to react with {}: {}", emoji.name, e);
                        interaction
                            .create_response(
                                ctx.http(),
                                serenity::CreateInteractionResponse::Message(
                                    serenity::CreateInteractionResponseMessage::new()
                                        .content("Couldn't add the reaction. I may be missing permissions.")
                                        .ephemeral(true),
                                ),
                            )
                            .await?;
                    }
                }
            }
            None => {}
        }
    }

    let expired = serenity::CreateEmbed::new()
        .title("No emoji selected")
        .description("The selection timed out. Run `/react` again to pick an emoji.")
        .color(colors::MUTED);
    reply
        .edit(ctx, poise::CreateReply::default().embed(expired).components(vec![]))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_message_link() {
        assert_eq!(
            parse_message_link("https://discord.com/channels/1/22/333"),
            Some(MessageLink { guild_id: 1, channel_id: 22, message_id: 333 })
        );
        assert!(parse_message_link("https://canary.discord.com/channels/1/2/3").is_some());
        assert!(parse_message_link("https://discordapp.com/channels/1/2/3/").is_some());
        assert_eq!(parse_message_link("https://example.com/channels/1/2/3"), None);
        assert_eq!(parse_message_link("https://discord.com/channels/@me/2/3"), None);
        assert_eq!(parse_message_link("https://discord.com/channels/1/2"), None);
        assert_eq!(parse_message_link("1234567890"), None);
    }

    #[test]
    fn test_parse_pick() {
        assert_eq!(parse_pick("react:123"), Some(Pick::Emoji("123".into())));
        assert_eq!(parse_pick("react:page:1"), Some(Pick::Page(1)));
        assert_eq!(parse_pick("log:prev"), None);
    }

    #[test]
    fn test_first_page_layout() {
        let rows = emoji_rows(0);
        // 4 rows of emoji plus navigation
        assert_eq!(rows.len(), 5);
    }
}
