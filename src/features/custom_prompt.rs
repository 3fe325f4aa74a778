// Per-user Ayumi system prompts imported from Rentry pages

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use reqwest::{Client, Url};
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{AyumiError, Result};

const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);
const MAX_REQUESTS_PER_WINDOW: u32 = 3;
pub const MIN_PROMPT_CHARS: usize = 10;
pub const MAX_PROMPT_CHARS: usize = 10_000;
const USER_AGENT: &str = "Mozilla/5.0 (compatible; AyumiBot/1.0)";

const HARMFUL_PATTERNS: [&str; 5] = ["eval(", "Function(", "setTimeout(", "setInterval(", "require("];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredPrompt {
    pub user_id: String,
    pub prompt: String,
    pub updated_at: DateTime<Utc>,
}

struct RateWindow {
    count: u32,
    started: Instant,
}

pub struct PromptStore {
    dir: PathBuf,
    limits: DashMap<u64, RateWindow>,
}

impl PromptStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            limits: DashMap::new(),
        }
    }

    fn path(&self, user_id: u64) -> PathBuf {
        self.dir.join(format!("{user_id}.json"))
    }

    /// `Err(seconds)` when the user must wait before another update
    pub fn check_rate_limit(&self, user_id: u64, now: Instant) -> std::result::Result<(), u64> {
        self.limits
            .retain(|_, w| now.saturating_duration_since(w.started) <= RATE_LIMIT_WINDOW);

        let mut window = self.limits.entry(user_id).or_insert(RateWindow { count: 0, started: now });
        let elapsed = now.saturating_duration_since(window.started);

        if elapsed > RATE_LIMIT_WINDOW {
            window.count = 1;
            window.started = now;
            return Ok(());
        }
        if window.count >= MAX_REQUESTS_PER_WINDOW {
            return Err(RATE_LIMIT_WINDOW.saturating_sub(elapsed).as_secs().max(1));
        }
        window.count += 1;
        Ok(())
    }

    pub async fn get(&self, user_id: u64) -> Option<String> {
        let path = self.path(user_id);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Cannot read prompt for {}: {}", user_id, e);
                return None;
            }
        };
        match serde_json::from_str::<StoredPrompt>(&raw) {
            Ok(stored) => Some(stored.prompt),
            Err(e) => {
                warn!("Corrupt prompt file {}: {}", path.display(), e);
                None
            }
        }
    }

    pub async fn save(&self, user_id: u64, prompt: &str) -> Result<()> {
        ensure_dir(&self.dir).await?;
        let stored = StoredPrompt {
            user_id: user_id.to_string(),
            prompt: prompt.to_string(),
            updated_at: Utc::now(),
        };
        tokio::fs::write(self.path(user_id), serde_json::to_string_pretty(&stored)?).await?;
        debug!("Saved custom prompt for {}", user_id);
        Ok(())
    }

    /// `false` when there was nothing to delete
    pub async fn delete(&self, user_id: u64) -> Result<bool> {
        match tokio::fs::remove_file(self.path(user_id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

async fn ensure_dir(dir: &Path) -> Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    Ok(())
}

/// The page code of a rentry.co URL
pub fn rentry_code(url: &str) -> Option<String> {
    let url = Url::parse(url.trim()).ok()?;
    if !matches!(url.host_str()?, "rentry.co" | "www.rentry.co") {
        return None;
    }
    let code = url.path_segments()?.filter(|s| !s.is_empty()).last()?;
    let valid = code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    valid.then(|| code.to_string())
}

fn is_blocked_page(body: &str) -> bool {
    let lower = body.to_lowercase();
    lower.contains("access code") || lower.contains("redirecting to page")
}

/// Rendered article text of a Rentry page
pub fn extract_article_text(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(".entry-text article").ok()?;
    let article = document.select(&selector).next()?;
    let text = article
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    (!text.is_empty()).then_some(text)
}

pub async fn fetch_rentry_prompt(http: &Client, url: &str) -> Result<String> {
    let code = rentry_code(url)
        .ok_or_else(|| AyumiError::Validation("Please provide a rentry.co URL, e.g. https://rentry.co/xxxxx".into()))?;

    let page = http
        .get(format!("https://rentry.co/{code}"))
        .header("User-Agent", USER_AGENT)
        .send()
        .await?;
    if page.status().is_success() {
        let html = page.text().await?;
        if is_blocked_page(&html) {
            return Err(AyumiError::Validation("That Rentry page is protected by an access code.".into()));
        }
        if let Some(text) = extract_article_text(&html) {
            return Ok(text);
        }
    }

    let raw = http
        .get(format!("https://rentry.co/{code}/raw"))
        .header("User-Agent", USER_AGENT)
        .header("Accept", "text/plain")
        .send()
        .await?;
    if !raw.status().is_success() {
        return Err(AyumiError::api("Rentry", raw.status().to_string()));
    }
    let body = raw.text().await?;
    let lower = body.to_lowercase();
    if is_blocked_page(&body) || lower.contains("<!doctype") || lower.contains("<html") {
        return Err(AyumiError::Validation("That Rentry page could not be read.".into()));
    }
    Ok(body.trim().to_string())
}

pub fn validate_prompt(content: &str) -> Result<()> {
    let chars = content.chars().count();
    if chars < MIN_PROMPT_CHARS {
        return Err(AyumiError::Validation(format!(
            "Prompt is too short (minimum {MIN_PROMPT_CHARS} characters)."
        )));
    }
    if chars > MAX_PROMPT_CHARS {
        return Err(AyumiError::Validation(format!(
            "Prompt is too long (maximum {MAX_PROMPT_CHARS} characters)."
        )));
    }
    let has_import = content
        .lines()
        .any(|l| l.trim_start().starts_with("import ") && l.contains(" from "));
    if has_import || HARMFUL_PATTERNS.iter().any(|p| content.contains(p)) {
        return Err(AyumiError::Validation("Prompt contains script-like content.".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rentry_code() {
        assert_eq!(rentry_code("https://rentry.co/ayumi-v2"), Some("ayumi-v2".into()));
        assert_eq!(rentry_code("https://www.rentry.co/abc/"), Some("abc".into()));
        assert_eq!(rentry_code("https://rentry.org/abc"), None);
        assert_eq!(rentry_code("https://evil.com/rentry.co/abc"), None);
        assert_eq!(rentry_code("rentry.co/abc"), None);
    }

    #[test]
    fn test_extract_article_text() {
        let html = r#"<html><body><div class="entry-text"><article>
            <p>You are Ayumi.</p><p>Answer <strong>briefly</strong>.</p>
        </article></div></body></html>"#;
        let text = extract_article_text(html).unwrap();
        assert!(text.starts_with("You are Ayumi."));
        assert!(text.contains("briefly"));
        assert!(extract_article_text("<html><body>nothing</body></html>").is_none());
    }

    #[test]
    fn test_validate_prompt() {
        assert!(validate_prompt("short").is_err());
        assert!(validate_prompt(&"a".repeat(MAX_PROMPT_CHARS + 1)).is_err());
        assert!(validate_prompt("please eval(this) for me").is_err());
        assert!(validate_prompt("import fs from 'fs'\nbe nice").is_err());
        assert!(validate_prompt("Kamu adalah Ayumi, asisten yang ramah.").is_ok());
        assert!(is_blocked_page("Enter the ACCESS CODE to continue"));
    }

    #[test]
    fn test_rate_limit_window() {
        let store = PromptStore::new("unused");
        let start = Instant::now();
        for _ in 0..3 {
            assert!(store.check_rate_limit(1, start).is_ok());
        }
        let wait = store.check_rate_limit(1, start + Duration::from_secs(10)).unwrap_err();
        assert_eq!(wait, 50);
        assert!(store.check_rate_limit(2, start).is_ok());
        assert!(store.check_rate_limit(1, start + Duration::from_secs(61)).is_ok());
    }

    #[test]
    fn test_expired_windows_are_evicted() {
        let store = PromptStore::new("unused");
        let start = Instant::now();
        for user in 1..=50 {
            assert!(store.check_rate_limit(user, start).is_ok());
        }
        assert_eq!(store.limits.len(), 50);

        assert!(store.check_rate_limit(99, start + Duration::from_secs(61)).is_ok());
        assert_eq!(store.limits.len(), 1);
        assert!(store.limits.contains_key(&99));
    }

    #[tokio::test]
    async fn test_store_round_trip() {
        let dir = std::env::temp_dir().join(format!("ayumi-prompts-{}", std::process::id()));
        let store = PromptStore::new(&dir);

        assert!(store.get(7).await.is_none());
        store.save(7, "Kamu adalah Ayumi.").await.unwrap();
        assert_eq!(store.get(7).await.as_deref(), Some("Kamu adalah Ayumi."));
        assert!(store.delete(7).await.unwrap());
        assert!(!store.delete(7).await.unwrap());

        let _ = std::fs::remove_dir_all(dir);
    }
}
