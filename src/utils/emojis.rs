// Custom emoji catalogue used by /react, compiled in from data/emojis.json

use once_cell::sync::Lazy;
use serde::Deserialize;
use tracing::error;

#[derive(Debug, Clone, Deserialize)]
pub struct Emoji {
    pub id: String,
    pub name: String,
    #[serde(default = "default_animated")]
    pub animated: bool,
}

fn default_animated() -> bool {
    true
}

impl Emoji {
    pub fn snowflake(&self) -> Option<u64> {
        self.id.parse().ok()
    }

    /// `<a:name:id>` markup
    pub fn markup(&self) -> String {
        let prefix = if self.animated { "a" } else { "" };
        format!("<{prefix}:{}:{}>", self.name, self.id)
    }

    pub fn cdn_url(&self) -> String {
        let ext = if self.animated { "gif" } else { "png" };
        format!("https://cdn.discordapp.com/emojis/{}.{ext}", self.id)
    }
}

static CATALOGUE: Lazy<Vec<Emoji>> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../data/emojis.json")).unwrap_or_else(|e| {
        error!("Embedded emoji catalogue is invalid: {}", e);
        Vec::new()
    })
});

pub fn by_id(id: &str) -> Option<&'static Emoji> {
    CATALOGUE.iter().find(|e| e.id == id)
}

pub fn page_count(per_page: usize) -> usize {
    CATALOGUE.len().div_ceil(per_page.max(1)).max(1)
}

pub fn page(index: usize, per_page: usize) -> &'static [Emoji] {
    let start = (index * per_page).min(CATALOGUE.len());
    let end = (start + per_page).min(CATALOGUE.len());
    &CATALOGUE[start..end]
}
