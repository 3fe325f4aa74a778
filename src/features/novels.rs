// Light novel catalogue: loading, accent-insensitive search and random picks

use std::path::Path;

use rand::seq::IndexedRandom;
use serde::Deserialize;
use tracing::{info, warn};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::error::Result;

#[derive(Debug, Clone, Deserialize)]
pub struct Novel {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub format: String,
    pub url: String,
}

struct Indexed {
    novel: Novel,
    normalized: String,
}

#[derive(Default)]
pub struct NovelCatalog {
    entries: Vec<Indexed>,
}

/// Lowercase, accent-free, punctuation folded to single spaces
pub fn normalize(text: &str) -> String {
    let folded: String = text
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    folded
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Words that ask for a novel rather than name one
const REQUEST_WORDS: &[&str] = &[
    "ayumi", "a!ayumi", "cari", "carikan", "rekomendasi", "rekomendasikan", "saran", "novel", "light",
    "ln", "download", "unduh", "dong", "tolong", "untuk", "aku", "saya", "buat", "yang", "judul", "please",
    "recommend", "find", "search",
];

impl NovelCatalog {
    pub fn from_novels(novels: Vec<Novel>) -> Self {
        let entries = novels
            .into_iter()
            .map(|novel| Indexed {
                normalized: normalize(&novel.title),
                novel,
            })
            .collect();
        Self { entries }
    }

    /// A missing file yields an empty catalogue; a malformed one is an error
    pub fn load(path: &Path) -> Result<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Novel list {} not found; /novel will be empty", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        let novels: Vec<Novel> = serde_json::from_str(&raw)?;
        info!("Loaded {} novels from {}", novels.len(), path.display());
        Ok(Self::from_novels(novels))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Titles containing every query token
    pub fn search(&self, query: &str) -> Vec<&Novel> {
        let normalized = normalize(query);
        let tokens: Vec<&str> = normalized.split_whitespace().collect();
        if tokens.is_empty() {
            return Vec::new();
        }
        self.entries
            .iter()
            .filter(|e| tokens.iter().all(|t| e.normalized.contains(t)))
            .map(|e| &e.novel)
            .collect()
    }

    pub fn recommend(&self, count: usize) -> Vec<&Novel> {
        let mut rng = rand::rng();
        self.entries
            .choose_multiple(&mut rng, count)
            .map(|e| &e.novel)
            .collect()
    }

    /// Ayumi's answer to a chat message asking for novels
    pub fn chat_reply(&self, message: &str, name: &str) -> String {
        if self.is_empty() {
            return format!("{name}, daftar novelnya belum tersedia saat ini.");
        }

        let normalized = normalize(message);
        let query: Vec<&str> = normalized
            .split_whitespace()
            .filter(|w| !REQUEST_WORDS.contains(w))
            .collect();

        let found = if query.is_empty() { Vec::new() } else { self.search(&query.join(" ")) };
        let (heading, picks) = if found.is_empty() {
            (format!("{name}, berikut beberapa rekomendasi novel:"), self.recommend(5))
        } else {
            (format!("{name}, ini hasil pencarian novel yang cocok:"), found.into_iter().take(5).collect())
        };

        let mut reply = format!("**{heading}**\n\n");
        for (i, novel) in picks.iter().enumerate() {
            reply.push_str(&format!(
                "{}. [{}]({})\n   Format: {} | Size: {}\n",
                i + 1,
                novel.title,
                novel.url,
                novel.format,
                novel.size
            ));
        }
        reply
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn novel(id: &str, title: &str) -> Novel {
        Novel {
            id: id.into(),
            title: title.into(),
            size: "1 MB".into(),
            format: "epub".into(),
            url: format!("https://example.org/{id}"),
        }
    }

    fn catalog() -> NovelCatalog {
        NovelCatalog::from_novels(vec![
            novel("1", "Sword Art Online: Progressive"),
            novel("2", "Re:Zero kara Hajimeru Isekai Seikatsu"),
            novel("3", "Pokémon Adventures"),
        ])
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Re:Zero -- Kara!! "), "re zero kara");
        assert_eq!(normalize("Pokémon"), "pokemon");
        assert_eq!(normalize("とある魔術の禁書目録"), "とある魔術の禁書目録");
    }

    #[test]
    fn test_search_requires_all_tokens() {
        let catalog = catalog();
        assert_eq!(catalog.search("zero isekai")[0].id, "2");
        assert_eq!(catalog.search("POKEMON")[0].id, "3");
        assert!(catalog.search("zero online").is_empty());
        assert!(catalog.search("   ").is_empty());
    }

    #[test]
    fn test_recommend_is_bounded_and_distinct() {
        let catalog = catalog();
        let picks = catalog.recommend(10);
        assert_eq!(picks.len(), 3);
        let mut ids: Vec<&str> = picks.iter().map(|n| n.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn test_chat_reply_prefers_matches() {
        let catalog = catalog();
        let reply = catalog.chat_reply("cari novel sword art dong", "Kana");
        assert!(reply.contains("hasil pencarian"));
        assert!(reply.contains("Sword Art Online"));

        let reply = catalog.chat_reply("rekomendasi novel", "Kana");
        assert!(reply.contains("rekomendasi"));
        assert!(NovelCatalog::default().chat_reply("novel", "Kana").contains("belum tersedia"));
    }
}
