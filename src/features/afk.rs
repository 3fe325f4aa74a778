// AFK status registry and the message hook that announces it

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use poise::serenity_prelude as serenity;
use tracing::{debug, warn};

use crate::utils::config::colors;
use crate::utils::formatters::format_elapsed;
use crate::Data;

const WELCOME_BACK_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
pub struct AfkStatus {
    pub username: String,
    pub avatar_url: String,
    pub reason: String,
    pub since: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct AfkRegistry {
    users: DashMap<u64, AfkStatus>,
}

impl AfkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, user_id: u64, status: AfkStatus) {
        self.users.insert(user_id, status);
    }

    pub fn clear(&self, user_id: u64) -> Option<AfkStatus> {
        self.users.remove(&user_id).map(|(_, status)| status)
    }

    pub fn get(&self, user_id: u64) -> Option<AfkStatus> {
        self.users.get(&user_id).map(|s| s.clone())
    }

    /// AFK users among the mentions and the replied-to author, each reported once
    pub fn notices<I>(&self, candidates: I, author_id: u64) -> Vec<(u64, AfkStatus)>
    where
        I: IntoIterator<Item = u64>,
    {
        let mut seen = Vec::new();
        let mut notices = Vec::new();
        for user_id in candidates {
            if user_id == author_id || seen.contains(&user_id) {
                continue;
            }
            seen.push(user_id);
            if let Some(status) = self.get(user_id) {
                notices.push((user_id, status));
            }
        }
        notices
    }
}

/// The prefix form of /afk must not clear the status it just set
fn is_afk_command(content: &str) -> bool {
    let content = content.trim_start().to_lowercase();
    content
        .strip_prefix(crate::PREFIX)
        .is_some_and(|rest| rest == "afk" || rest.starts_with("afk "))
}

fn avatar(user: &serenity::User) -> String {
    user.avatar_url().unwrap_or_else(|| user.default_avatar_url())
}

fn notice_embed(status: &AfkStatus) -> serenity::CreateEmbed {
    serenity::CreateEmbed::new()
        .color(colors::WARNING)
        .author(serenity::CreateEmbedAuthor::new(&status.username).icon_url(&status.avatar_url))
        .title(format!("{} is AFK", status.username))
        .description(format!(
            "**Reason:** {}\n**Since:** <t:{}:R>",
            status.reason,
            status.since.timestamp()
        ))
        .timestamp(serenity::Timestamp::now())
}

/// Sends every notice; a failed send is logged and the rest still go out.
/// Returns how many were delivered.
async fn deliver_notices<F, Fut, E>(notices: Vec<(u64, AfkStatus)>, mut send: F) -> usize
where
    F: FnMut(AfkStatus) -> Fut,
    Fut: Future<Output = Result<(), E>>,
    E: std::fmt::Display,
{
    let mut delivered = 0;
    for (user_id, status) in notices {
        let username = status.username.clone();
        match send(status).await {
            Ok(()) => delivered += 1,
            Err(e) => warn!("Could not send AFK notice for {} ({}): {}", username, user_id, e),
        }
    }
    delivered
}

/// Clears the author's AFK status and tells everyone about AFK users they pinged
pub async fn handle_message(
    ctx: &serenity::Context,
    msg: &serenity::Message,
    data: &Data,
) -> Result<(), anyhow::Error> {
    if msg.author.bot || is_afk_command(&msg.content) {
        return Ok(());
    }
    let author_id = msg.author.id.get();

    if let Some(status) = data.afk.clear(author_id) {
        debug!("{} is back from AFK", msg.author.name);
        let away = format_elapsed(Utc::now() - status.since);
        let embed = serenity::CreateEmbed::new()
            .color(colors::SUCCESS)
            .author(serenity::CreateEmbedAuthor::new(&msg.author.name).icon_url(avatar(&msg.author)))
            .title("Welcome back!")
            .description(format!("Your AFK status was removed. You were away for {away}."))
            .timestamp(serenity::Timestamp::now());

        let reply = msg
            .channel_id
            .send_message(&ctx.http, serenity::CreateMessage::new().embed(embed).reference_message(msg))
            .await?;

        let http = ctx.http.clone();
        let channel_id = msg.channel_id;
        tokio::spawn(async move {
            tokio::time::sleep(WELCOME_BACK_TTL).await;
            if let Err(e) = channel_id.delete_message(&http, reply.id).await {
                warn!("Could not delete welcome-back message: {}", e);
            }
        });
    }

    let replied_author = msg
        .referenced_message
        .as_ref()
        .map(|m| m.author.id.get());
    let candidates = msg.mentions.iter().map(|u| u.id.get()).chain(replied_author);

    let notices = data.afk.notices(candidates, author_id);
    deliver_notices(notices, |status| async move {
        let embed = notice_embed(&status);
        msg.channel_id
            .send_message(&ctx.http, serenity::CreateMessage::new().embed(embed).reference_message(msg))
            .await
            .map(|_| ())
    })
    .await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(reason: &str) -> AfkStatus {
        AfkStatus {
            username: "kana".into(),
            avatar_url: String::new(),
            reason: reason.into(),
            since: Utc::now(),
        }
    }

    #[test]
    fn test_set_and_clear() {
        let registry = AfkRegistry::new();
        registry.set(1, status("sleeping"));
        assert_eq!(registry.get(1).map(|s| s.reason), Some("sleeping".to_string()));
        assert!(registry.clear(1).is_some());
        assert!(registry.clear(1).is_none());
    }

    #[test]
    fn test_notices_dedupe_and_skip_author() {
        let registry = AfkRegistry::new();
        registry.set(2, status("work"));
        registry.set(3, status("school"));

        // 2 mentioned twice and also the replied-to author; 3 is the author
        let notices = registry.notices([2, 4, 2, 3, 2], 3);
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].0, 2);
    }

    #[tokio::test]
    async fn test_failed_notice_does_not_stop_the_rest() {
        let notices = vec![(1, status("first")), (2, status("second")), (3, status("third"))];
        let mut attempted = Vec::new();
        let delivered = deliver_notices(notices, |s| {
            attempted.push(s.reason.clone());
            let fail = s.reason == "first";
            async move {
                if fail {
                    Err("Missing Permissions")
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert_eq!(delivered, 2);
        assert_eq!(attempted, vec!["first", "second", "third"]);
    }
}
