// /config - per-server channel assignments stored in `guild_configs`

use dashmap::DashMap;
use poise::serenity_prelude as serenity;
use poise::ChoiceParameter;
use tracing::{info, warn};

use crate::api::firestore::Firestore;
use crate::models::guild::{ChannelKind, GuildConfig};
use crate::utils::config::colors;
use crate::{Context, Error};

const COLLECTION: &str = "guild_configs";

/// Fills `cache` from Firestore; returns how many servers were loaded
pub async fn load_guild_configs(
    firestore: &Firestore,
    cache: &DashMap<u64, GuildConfig>,
) -> crate::error::Result<usize> {
    let documents = firestore.list_documents(COLLECTION).await?;
    let mut loaded = 0;
    for doc in documents {
        let Ok(guild_id) = doc.id.parse::<u64>() else {
            warn!("Ignoring guild config with non-numeric id {}", doc.id);
            continue;
        };
        match doc.parse::<GuildConfig>() {
            Ok(config) => {
                cache.insert(guild_id, config);
                loaded += 1;
            }
            Err(e) => warn!("Invalid guild config {}: {}", doc.id, e),
        }
    }
    Ok(loaded)
}

fn channel_value(config: &GuildConfig, kind: ChannelKind) -> String {
    config
        .channel(kind)
        .map_or_else(|| "Not set".to_string(), |id| format!("<#{id}>"))
}

/// Manage server configuration
#[poise::command(
    slash_command,
    guild_only,
    required_permissions = "MANAGE_GUILD",
    subcommands("set", "view"),
    subcommand_required
)]
pub async fn config(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Assign a channel to a bot feature
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn set(
    ctx: Context<'_>,
    #[description = "Feature to configure"] kind: ChannelKind,
    #[description = "Channel to use"]
    #[channel_types("Text", "News")]
    channel: serenity::GuildChannel,
) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    ctx.defer().await?;
    let data = ctx.data();

    let mut config = data
        .guild_configs
        .get(&guild_id.get())
        .map(|c| c.clone())
        .unwrap_or_default();
    config.set_channel(kind, channel.id.get());

    data.firestore
        .set_document(&format!("{COLLECTION}/{guild_id}"), &serde_json::to_value(&config)?)
        .await?;
    data.guild_configs.insert(guild_id.get(), config);
    info!("Guild {} set {} channel to {}", guild_id, kind.name(), channel.id);

    let embed = serenity::CreateEmbed::new()
        .title("Configuration updated")
        .description(format!("**{}** channel set to <#{}>", kind.name(), channel.id))
        .color(colors::SUCCESS);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Show this server's configuration
#[poise::command(slash_command, guild_only, required_permissions = "MANAGE_GUILD")]
pub async fn view(ctx: Context<'_>) -> Result<(), Error> {
    let Some(guild_id) = ctx.guild_id() else {
        return Ok(());
    };
    let config = ctx
        .data()
        .guild_configs
        .get(&guild_id.get())
        .map(|c| c.clone())
        .unwrap_or_default();

    let embed = serenity::CreateEmbed::new()
        .title("Server configuration")
        .field("Ayumi chat", channel_value(&config, ChannelKind::Ayumi), true)
        .field("Immersion logging", channel_value(&config, ChannelKind::Immersion), true)
        .field("Anime news", channel_value(&config, ChannelKind::News), true)
        .color(colors::INFO);
    ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_value() {
        let mut config = GuildConfig::default();
        assert_eq!(channel_value(&config, ChannelKind::News), "Not set");
        config.set_channel(ChannelKind::News, 42);
        assert_eq!(channel_value(&config, ChannelKind::News), "<#42>");
    }
}
