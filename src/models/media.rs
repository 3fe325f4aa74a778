// Media types that can be logged, with their display data and point weights

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, poise::ChoiceParameter)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    #[name = "Visual Novel (characters)"]
    VisualNovel,
    #[name = "Manga (pages)"]
    Manga,
    #[name = "Anime (episodes)"]
    Anime,
    #[name = "Book (pages)"]
    Book,
    #[name = "Reading Time (minutes)"]
    ReadingTime,
    #[name = "Listening (minutes)"]
    Listening,
    #[name = "Reading (characters)"]
    Reading,
}

/// Characters per point for character-counted media (350 chars = 1 pt)
const CHARACTER_WEIGHT: f64 = 0.0028571428571429;

impl MediaType {
    pub const ALL: [MediaType; 7] = [
        MediaType::VisualNovel,
        MediaType::Manga,
        MediaType::Anime,
        MediaType::Book,
        MediaType::ReadingTime,
        MediaType::Listening,
        MediaType::Reading,
    ];

    /// Key stored in Firestore (`activity.type`, `stats.<key>`)
    pub fn key(self) -> &'static str {
        match self {
            MediaType::VisualNovel => "visual_novel",
            MediaType::Manga => "manga",
            MediaType::Anime => "anime",
            MediaType::Book => "book",
            MediaType::ReadingTime => "reading_time",
            MediaType::Listening => "listening",
            MediaType::Reading => "reading",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.key() == key)
    }

    pub fn label(self) -> &'static str {
        match self {
            MediaType::VisualNovel => "Visual Novel",
            MediaType::Manga => "Manga",
            MediaType::Anime => "Anime",
            MediaType::Book => "Book",
            MediaType::ReadingTime => "Reading Time",
            MediaType::Listening => "Listening",
            MediaType::Reading => "Reading",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            MediaType::VisualNovel | MediaType::Reading => "characters",
            MediaType::Manga | MediaType::Book => "pages",
            MediaType::Anime => "episodes",
            MediaType::ReadingTime | MediaType::Listening => "minutes",
        }
    }

    pub fn multiplier(self) -> f64 {
        match self {
            MediaType::VisualNovel | MediaType::Reading => CHARACTER_WEIGHT,
            MediaType::Manga => 0.25,
            MediaType::Anime => 13.0,
            MediaType::Book => 1.0,
            MediaType::ReadingTime | MediaType::Listening => 0.67,
        }
    }

    pub fn emoji(self) -> &'static str {
        match self {
            MediaType::VisualNovel => "🎮",
            MediaType::Manga => "📚",
            MediaType::Anime => "📺",
            MediaType::Book => "📖",
            MediaType::ReadingTime => "⏱️",
            MediaType::Listening => "🎧",
            MediaType::Reading => "📰",
        }
    }

    /// Bar colour used in charts
    pub fn color(self) -> &'static str {
        match self {
            MediaType::VisualNovel => "#9b59b6",
            MediaType::Manga => "#e74c3c",
            MediaType::Anime => "#3498db",
            MediaType::Book => "#2ecc71",
            MediaType::ReadingTime => "#f39c12",
            MediaType::Listening => "#1abc9c",
            MediaType::Reading => "#e67e22",
        }
    }
}

/// Label for a stored type key; unknown keys are shown as-is
pub fn label_for_key(key: &str) -> String {
    MediaType::from_key(key)
        .map(|m| m.label().to_string())
        .unwrap_or_else(|| key.to_string())
}

pub fn unit_for_key(key: &str) -> &'static str {
    MediaType::from_key(key).map(MediaType::unit).unwrap_or("units")
}
