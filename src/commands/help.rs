// /help - command overview and point weights

use poise::serenity_prelude as serenity;

use crate::models::media::MediaType;
use crate::utils::config::colors;
use crate::utils::formatters::format_number;
use crate::{Context, Error};

const SECTIONS: &[(&str, &str)] = &[
    (
        "📝 Immersion",
        "`/immersion` - Log an activity\n\
         `/log time` - Browse and delete recent logs\n\
         `/export` - Download your logs as a text file",
    ),
    (
        "📊 Statistics",
        "`/stat` - Totals and streaks\n\
         `/stat visual_type:Bar Chart` - Points chart\n\
         `/stat visual_type:Heatmap` - Yearly activity heatmap\n\
         `/leaderboard` - Community rankings",
    ),
    (
        "🌸 Ayumi",
        "`a!ayumi <message>` - Chat with Ayumi\n\
         `/prompt set|view|delete` - Your own Ayumi personality",
    ),
    (
        "📖 Content",
        "`/novel` - Search light novels\n\
         `/subs` - Japanese subtitles from Jimaku",
    ),
    (
        "🧰 Utility",
        "`/afk` - Set your AFK status\n\
         `/react` - React with an animated emoji\n\
         `/config set|view` - Server channels (Manage Server)",
    ),
];

fn rate(media: MediaType) -> String {
    let multiplier = media.multiplier();
    if multiplier < 0.1 {
        format!("1 pt per {}", format_number((1.0 / multiplier).round()))
    } else {
        format!("{} pts each", format_number(multiplier))
    }
}

/// One line per media type: label, unit and point rate
pub fn media_lines() -> String {
    MediaType::ALL
        .iter()
        .map(|m| format!("{} **{}** ({}): {}", m.emoji(), m.label(), m.unit(), rate(*m)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Show the command list and how points are counted
#[poise::command(slash_command, prefix_command)]
pub async fn help(ctx: Context<'_>) -> Result<(), Error> {
    let mut embed = serenity::CreateEmbed::new()
        .title("📚 Ayumi - Help")
        .description("A Japanese immersion tracker with a chatty assistant.")
        .color(colors::PRIMARY);
    for (name, value) in SECTIONS {
        embed = embed.field(*name, *value, false);
    }
    embed = embed
        .field("🎯 Media types", media_lines(), false)
        .footer(serenity::CreateEmbedFooter::new("Days roll over at 2 AM JST"));

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_lines_cover_every_type() {
        let lines = media_lines();
        assert_eq!(lines.lines().count(), MediaType::ALL.len());
        assert!(lines.contains("**Anime** (episodes): 13 pts each"));
        assert!(lines.contains("**Manga** (pages): 0.25 pts each"));
        assert!(lines.contains("(characters): 1 pt per 350"));
    }
}
