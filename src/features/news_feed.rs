// Periodic MyAnimeList news posting

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use lru::LruCache;
use poise::serenity_prelude as serenity;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::api::mal_news::{clean_description, fetch_feed, NewsItem};
use crate::models::guild::GuildConfig;
use crate::utils::config::colors;

const WINDOW_SIZE: usize = 30;
const DESCRIPTION_CHARS: usize = 200;
const MAL_LOGO: &str = "https://upload.wikimedia.org/wikipedia/commons/7/7a/MyAnimeList_Logo.png";

/// Remembers recently posted links so each story goes out once
pub struct NewsWindow {
    seen: LruCache<String, ()>,
    seeded: bool,
}

impl Default for NewsWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl NewsWindow {
    pub fn new() -> Self {
        let capacity = NonZeroUsize::new(WINDOW_SIZE).unwrap_or(NonZeroUsize::MIN);
        Self {
            seen: LruCache::new(capacity),
            seeded: false,
        }
    }

    /// Unseen items oldest first. The first non-empty batch only fills the window.
    pub fn fresh(&mut self, mut items: Vec<NewsItem>) -> Vec<NewsItem> {
        items.truncate(WINDOW_SIZE);
        items.reverse();

        if !self.seeded {
            if items.is_empty() {
                return Vec::new();
            }
            self.seeded = true;
            for item in &items {
                self.seen.put(item.link.clone(), ());
            }
            return Vec::new();
        }

        let mut fresh = Vec::new();
        for item in items {
            if self.seen.put(item.link.clone(), ()).is_none() {
                fresh.push(item);
            }
        }
        fresh
    }
}

pub fn news_embed(item: &NewsItem) -> serenity::CreateEmbed {
    let mut embed = serenity::CreateEmbed::new()
        .title(&item.title)
        .url(&item.link)
        .description(clean_description(&item.description, DESCRIPTION_CHARS))
        .color(colors::MAL)
        .footer(serenity::CreateEmbedFooter::new("MyAnimeList News"))
        .thumbnail(MAL_LOGO);

    if let Some(ts) = item
        .published
        .and_then(|p| serenity::Timestamp::from_unix_timestamp(p.timestamp()).ok())
    {
        embed = embed.timestamp(ts);
    }
    if let Some(ref image) = item.thumbnail {
        embed = embed.image(image);
    }
    embed
}

/// Everything the poller needs, cloned out of the shared bot state
pub struct NewsFeed {
    pub discord: Arc<serenity::Http>,
    pub http: reqwest::Client,
    pub feed_url: String,
    pub interval: Duration,
    pub default_channel: Option<u64>,
    pub guild_configs: Arc<DashMap<u64, GuildConfig>>,
}

impl NewsFeed {
    fn targets(&self) -> Vec<serenity::ChannelId> {
        let mut ids: Vec<u64> = self.default_channel.into_iter().collect();
        for config in self.guild_configs.iter() {
            if let Some(id) = config.news_channel_id.as_deref().and_then(|s| s.parse().ok()) {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        ids.into_iter().map(serenity::ChannelId::new).collect()
    }

    pub async fn run(self) {
        let mut window = NewsWindow::new();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("News feed polling {} every {:?}", self.feed_url, self.interval);

        loop {
            ticker.tick().await;
            let items = match fetch_feed(&self.http, &self.feed_url).await {
                Ok(items) => items,
                Err(e) => {
                    warn!("News feed fetch failed: {}", e);
                    continue;
                }
            };

            let fresh = window.fresh(items);
            if fresh.is_empty() {
                continue;
            }
            let targets = self.targets();
            if targets.is_empty() {
                debug!("{} news items but no news channel configured", fresh.len());
                continue;
            }

            for item in &fresh {
                for channel in &targets {
                    let message = serenity::CreateMessage::new().embed(news_embed(item));
                    if let Err(e) = channel.send_message(&self.discord, message).await {
                        warn!("Failed to post news to {}: {}", channel, e);
                    }
                }
                info!("Posted news: {}", item.link);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn item(n: usize) -> NewsItem {
        NewsItem {
            title: format!("News {n}"),
            link: format!("https://myanimelist.net/news/{n}"),
            description: "<p>Body &amp; more</p>".into(),
            published: None,
            thumbnail: None,
        }
    }

    #[test]
    fn test_first_batch_only_seeds() {
        let mut window = NewsWindow::new();
        assert!(window.fresh(vec![item(2), item(1)]).is_empty());

        let fresh = window.fresh(vec![item(4), item(3), item(2), item(1)]);
        let links: Vec<&str> = fresh.iter().map(|i| i.link.as_str()).collect();
        assert_eq!(links, ["https://myanimelist.net/news/3", "https://myanimelist.net/news/4"]);

        assert!(window.fresh(vec![item(4), item(3)]).is_empty());
    }

    #[test]
    fn test_window_keeps_recent_links() {
        let mut window = NewsWindow::new();
        window.fresh(vec![item(100)]);
        let batch: Vec<NewsItem> = (0..40).rev().map(item).collect();
        // Only the newest 30 are considered
        assert_eq!(window.fresh(batch).len(), WINDOW_SIZE);
    }

    #[test]
    fn test_empty_first_poll_does_not_seed() {
        let mut window = NewsWindow::new();
        assert!(window.fresh(Vec::new()).is_empty());
        assert!(window.fresh(vec![item(2), item(1)]).is_empty());
        assert_eq!(window.fresh(vec![item(3), item(2)]).len(), 1);
    }

    #[test]
    fn test_news_embed_fields() {
        let mut news = item(1);
        news.published = Some(Utc.with_ymd_and_hms(2025, 10, 14, 16, 30, 0).unwrap());
        news.thumbnail = Some("https://cdn.myanimelist.net/1.jpg".into());

        let json = serde_json::to_value(news_embed(&news)).unwrap();
        assert_eq!(json["title"], "News 1");
        assert_eq!(json["description"], "Body & more...");
        assert_eq!(json["color"], colors::MAL);
        assert_eq!(json["image"]["url"], "https://cdn.myanimelist.net/1.jpg");
        assert_eq!(json["footer"]["text"], "MyAnimeList News");
    }
}
