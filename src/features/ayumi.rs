// Ayumi: Gemini-backed chat in Discord channels

use std::num::NonZeroUsize;

use chrono::{DateTime, Duration, TimeZone, Utc};
use lru::LruCache;
use poise::serenity_prelude as serenity;
use rand::seq::IndexedRandom;
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::api::gemini::{InlineImage, Turn};
use crate::error::Result;
use crate::utils::formatters::{chunk_message, truncate, MESSAGE_CHUNK_LIMIT};
use crate::Data;

pub const TRIGGER_PREFIX: &str = "a!ayumi";
const HISTORY_USERS: usize = 500;
const HISTORY_TURNS: usize = 20;
const CONTEXT_MESSAGES: u8 = 5;
const CONTEXT_CHARS: usize = 200;

pub const DEFAULT_PERSONA: &str = "\
Kamu adalah Ayumi, AI assistant di Discord yang profesional.
Gaya penulisanmu tidak memakai emoji.

CIRI AYUMI:
- Peduli dengan progress user dalam belajar bahasa Jepang
- Memakai bahasa yang profesional, tanpa kata-kata alay atau cringe seperti \"sugoi\" atau \"daijobu\"
- Membaca konteks percakapan sebelumnya dan riwayat chat
- Bisa melihat dan menganalisis gambar atau foto profil
- Bisa membuat gambar sesuai permintaan

FUNGSI AYUMI:
1. Immersion tracker (/immersion, /stat, /leaderboard)
2. Pencari light novel (/novel)
3. Belajar bahasa Jepang
4. Asisten umum

GAYA BICARA:
- Hindari sok imut atau berlebihan
- Fokus membantu dengan suasana santai
- Gunakan referensi percakapan sebelumnya bila relevan";

const IMAGE_GENERATION_KEYWORDS: &[&str] = &[
    "buatkan gambar", "buat gambar", "bikin gambar", "generate gambar", "generate image", "create image",
    "make an image", "gambarkan", "draw", "lukis", "sketch", "ilustrasi", "buatkan ilustrasi",
    "create illustration", "gambar anime", "anime art", "pixel art", "artwork",
];

const AVATAR_KEYWORDS: &[&str] = &[
    "foto profil", "avatar", "profile picture", "pp", "pfp", "foto pp", "gambar profil", "foto saya",
    "foto gue",
];

const NOVEL_KEYWORDS: &[&str] = &[
    "novel", "light novel", "cari novel", "rekomendasi novel", "download novel", "unduh novel", "jlpt",
    "n1", "n2", "n3", "n4", "n5",
];

/// Which capability answers a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    GenerateImage,
    DescribeAttachment,
    DescribeAvatar,
    NovelSearch,
    Chat,
}

/// Single words match whole words only, so "pp" does not fire on "happy"
fn has_keyword(text: &str, keywords: &[&str]) -> bool {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    keywords.iter().any(|kw| {
        if kw.contains(' ') {
            lower.contains(kw)
        } else {
            words.contains(kw)
        }
    })
}

pub fn route(prompt: &str, has_image: bool) -> Route {
    if has_keyword(prompt, IMAGE_GENERATION_KEYWORDS) {
        Route::GenerateImage
    } else if has_image {
        Route::DescribeAttachment
    } else if has_keyword(prompt, AVATAR_KEYWORDS) {
        Route::DescribeAvatar
    } else if has_keyword(prompt, NOVEL_KEYWORDS) {
        Route::NovelSearch
    } else {
        Route::Chat
    }
}

/// Text after the `a!ayumi` prefix, if the message starts with it
pub fn strip_trigger(content: &str) -> Option<&str> {
    let trimmed = content.trim_start();
    let head = trimmed.get(..TRIGGER_PREFIX.len())?;
    head.eq_ignore_ascii_case(TRIGGER_PREFIX)
        .then(|| trimmed[TRIGGER_PREFIX.len()..].trim())
}

pub fn greeting(name: &str) -> String {
    let options = [
        format!("{name} manggil Ayumi? Ada yang bisa Ayumi bantu?"),
        format!("{name}! Ayumi selalu siap membantu kamu."),
        format!("{name}! Ayumi disini! Ada yang perlu bantuan?"),
    ];
    options
        .choose(&mut rand::rng())
        .cloned()
        .unwrap_or_else(|| format!("{name}! Ayumi disini!"))
}

fn fallback(name: &str) -> String {
    format!("{name}, Ayumi lagi error nih! Maaf ya, coba tanya lagi nanti.")
}

/// Recent channel chatter rendered for the system prompt
pub struct ContextLine {
    pub author: String,
    pub content: String,
    pub at: DateTime<Utc>,
}

pub fn format_context(lines: &[ContextLine], now: DateTime<Utc>) -> Option<String> {
    let recent: Vec<String> = lines
        .iter()
        .filter(|l| now - l.at <= Duration::hours(1) && !l.content.trim().is_empty())
        .map(|l| format!("{}: \"{}\"", l.author, truncate(&l.content, CONTEXT_CHARS)))
        .collect();
    (!recent.is_empty()).then(|| format!("PERCAKAPAN TERAKHIR DI CHANNEL:\n{}", recent.join("\n")))
}

pub fn mime_for_url(url: &str) -> &'static str {
    let path = url.split('?').next().unwrap_or(url).to_lowercase();
    if path.ends_with(".jpg") || path.ends_with(".jpeg") {
        "image/jpeg"
    } else if path.ends_with(".gif") {
        "image/gif"
    } else if path.ends_with(".webp") {
        "image/webp"
    } else {
        "image/png"
    }
}

/// Per-user conversation turns, least recently active users dropped first
pub struct ChatHistory {
    cache: Mutex<LruCache<u64, Vec<Turn>>>,
}

impl Default for ChatHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatHistory {
    pub fn new() -> Self {
        let capacity = NonZeroUsize::new(HISTORY_USERS).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub async fn turns(&self, user_id: u64) -> Vec<Turn> {
        self.cache.lock().await.get(&user_id).cloned().unwrap_or_default()
    }

    pub async fn record(&self, user_id: u64, prompt: &str, reply: &str) {
        let mut cache = self.cache.lock().await;
        let turns = cache.get_or_insert_mut(user_id, Vec::new);
        turns.push(Turn::user(prompt));
        turns.push(Turn::model(reply));
        if turns.len() > HISTORY_TURNS {
            let excess = turns.len() - HISTORY_TURNS;
            turns.drain(..excess);
        }
    }
}

fn display_name(msg: &serenity::Message) -> String {
    msg.member
        .as_ref()
        .and_then(|m| m.nick.clone())
        .or_else(|| msg.author.global_name.clone())
        .unwrap_or_else(|| msg.author.name.clone())
}

/// The prompt Ayumi should answer, or `None` when the message is not for her
fn triggered_prompt(ctx: &serenity::Context, msg: &serenity::Message, data: &Data) -> Option<String> {
    if let Some(rest) = strip_trigger(&msg.content) {
        return Some(rest.to_string());
    }

    let channel = msg.channel_id.get();
    let configured = data.settings.ayumi_channel_ids.contains(&channel)
        || msg
            .guild_id
            .and_then(|g| data.guild_configs.get(&g.get()).map(|c| c.is_ayumi_channel(channel)))
            .unwrap_or(false);
    let replied_to_bot = msg
        .referenced_message
        .as_ref()
        .is_some_and(|m| m.author.id == ctx.cache.current_user().id);

    (configured || replied_to_bot).then(|| msg.content.trim().to_string())
}

async fn channel_context(ctx: &serenity::Context, msg: &serenity::Message) -> Option<String> {
    let bot_id = ctx.cache.current_user().id;
    let messages = msg
        .channel_id
        .messages(&ctx.http, serenity::GetMessages::new().before(msg.id).limit(CONTEXT_MESSAGES))
        .await
        .ok()?;

    let lines: Vec<ContextLine> = messages
        .into_iter()
        .rev()
        .filter_map(|m| {
            let at = Utc.timestamp_opt(m.timestamp.unix_timestamp(), 0).single()?;
            Some(ContextLine {
                author: if m.author.id == bot_id { "Ayumi".to_string() } else { display_name(&m) },
                content: m.content,
                at,
            })
        })
        .collect();
    format_context(&lines, Utc::now())
}

async fn system_prompt(ctx: &serenity::Context, msg: &serenity::Message, data: &Data, name: &str) -> String {
    let persona = data
        .prompts
        .get(msg.author.id.get())
        .await
        .unwrap_or_else(|| DEFAULT_PERSONA.to_string());
    let mut prompt = format!("{persona}\n\nUser ini bernama {name}.");
    if let Some(context) = channel_context(ctx, msg).await {
        prompt.push_str("\n\n");
        prompt.push_str(&context);
    }
    prompt
}

async fn download(http: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    Ok(http.get(url).send().await?.error_for_status()?.bytes().await?.to_vec())
}

async fn send_chunks(ctx: &serenity::Context, msg: &serenity::Message, text: &str) -> serenity::Result<()> {
    for (i, chunk) in chunk_message(text, MESSAGE_CHUNK_LIMIT).iter().enumerate() {
        if i == 0 {
            msg.reply(ctx, chunk).await?;
        } else {
            msg.channel_id.say(&ctx.http, chunk).await?;
        }
    }
    Ok(())
}

pub async fn handle_message(
    ctx: &serenity::Context,
    msg: &serenity::Message,
    data: &Data,
) -> std::result::Result<(), anyhow::Error> {
    if msg.author.bot {
        return Ok(());
    }
    let Some(gemini) = data.gemini.as_ref() else {
        return Ok(());
    };
    let Some(prompt) = triggered_prompt(ctx, msg, data) else {
        return Ok(());
    };

    let name = display_name(msg);
    let user_id = msg.author.id.get();
    let image = msg
        .attachments
        .iter()
        .find(|a| a.content_type.as_deref().is_some_and(|ct| ct.starts_with("image/")));

    if prompt.is_empty() && image.is_none() {
        msg.reply(ctx, greeting(&name)).await?;
        return Ok(());
    }

    let _typing = msg.channel_id.start_typing(&ctx.http);
    let route = route(&prompt, image.is_some());
    debug!("Ayumi route {:?} for {}", route, name);

    let reply = match route {
        Route::GenerateImage => {
            match gemini.generate_image(&prompt).await {
                Ok(generated) => {
                    let caption = generated
                        .caption
                        .unwrap_or_else(|| format!("{name}, ini gambar yang Ayumi buat."));
                    let attachment = serenity::CreateAttachment::bytes(generated.image.bytes, "ayumi.png");
                    msg.channel_id
                        .send_message(
                            &ctx.http,
                            serenity::CreateMessage::new()
                                .content(truncate(&caption, MESSAGE_CHUNK_LIMIT))
                                .add_file(attachment)
                                .reference_message(msg),
                        )
                        .await?;
                    data.ayumi_history.record(user_id, &prompt, &caption).await;
                    return Ok(());
                }
                Err(e) => {
                    error!("Image generation failed: {}", e);
                    format!("{name}, maaf, Ayumi belum bisa membuat gambar sekarang. Coba lagi nanti ya.")
                }
            }
        }
        Route::DescribeAttachment | Route::DescribeAvatar => {
            let (url, mime) = match (route, image) {
                (Route::DescribeAttachment, Some(att)) => (
                    att.url.clone(),
                    att.content_type.clone().unwrap_or_else(|| "image/png".to_string()),
                ),
                _ => {
                    let url = msg.author.face();
                    let mime = mime_for_url(&url).to_string();
                    (url, mime)
                }
            };
            let question = if prompt.is_empty() { "Deskripsikan gambar ini." } else { prompt.as_str() };
            let system = system_prompt(ctx, msg, data, &name).await;

            let described = match download(&data.http, &url).await {
                Ok(bytes) => {
                    let image = InlineImage { mime_type: mime, bytes };
                    gemini.describe_image(Some(&system), question, &image).await
                }
                Err(e) => Err(e),
            };
            described.unwrap_or_else(|e| {
                error!("Ayumi vision failed: {}", e);
                fallback(&name)
            })
        }
        Route::NovelSearch => data.novels.chat_reply(&prompt, &name),
        Route::Chat => {
            let system = system_prompt(ctx, msg, data, &name).await;
            let mut turns = data.ayumi_history.turns(user_id).await;
            turns.push(Turn::user(prompt.clone()));
            gemini.chat(Some(&system), &turns).await.unwrap_or_else(|e| {
                error!("Ayumi chat failed: {}", e);
                fallback(&name)
            })
        }
    };

    send_chunks(ctx, msg, &reply).await?;
    data.ayumi_history.record(user_id, &prompt, &reply).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_trigger() {
        assert_eq!(strip_trigger("a!ayumi halo"), Some("halo"));
        assert_eq!(strip_trigger("  A!AYUMI   "), Some(""));
        assert_eq!(strip_trigger("hey a!ayumi"), None);
        assert_eq!(strip_trigger("a!"), None);
    }

    #[test]
    fn test_routing_order() {
        assert_eq!(route("tolong buatkan gambar kucing", true), Route::GenerateImage);
        assert_eq!(route("ini gambar apa?", true), Route::DescribeAttachment);
        assert_eq!(route("lihat pp aku dong", false), Route::DescribeAvatar);
        assert_eq!(route("I'm so happy today", false), Route::Chat);
        assert_eq!(route("rekomendasi novel untuk N3", false), Route::NovelSearch);
        assert_eq!(route("apa arti 頑張る?", false), Route::Chat);
    }

    #[test]
    fn test_format_context_window() {
        let now = Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap();
        let lines = vec![
            ContextLine { author: "Old".into(), content: "stale".into(), at: now - Duration::hours(2) },
            ContextLine { author: "Kana".into(), content: "x".repeat(300), at: now - Duration::minutes(5) },
            ContextLine { author: "Ayumi".into(), content: "  ".into(), at: now },
        ];
        let context = format_context(&lines, now).unwrap();
        assert!(!context.contains("stale"));
        assert!(context.contains("Kana: \""));
        assert!(!context.contains("Ayumi:"));
        assert!(format_context(&lines[..1], now).is_none());
    }

    #[test]
    fn test_mime_for_url() {
        assert_eq!(mime_for_url("https://cdn.discordapp.com/avatars/1/a.webp?size=1024"), "image/webp");
        assert_eq!(mime_for_url("https://cdn.discordapp.com/avatars/1/a_b.gif"), "image/gif");
        assert_eq!(mime_for_url("https://cdn.discordapp.com/embed/avatars/0.png"), "image/png");
    }

    #[tokio::test]
    async fn test_history_keeps_last_turns() {
        let history = ChatHistory::new();
        for i in 0..15 {
            history.record(1, &format!("q{i}"), &format!("a{i}")).await;
        }
        let turns = history.turns(1).await;
        assert_eq!(turns.len(), HISTORY_TURNS);
        assert_eq!(turns[0], Turn::user("q5"));
        assert_eq!(turns.last(), Some(&Turn::model("a14")));
        assert!(history.turns(2).await.is_empty());
    }

    #[test]
    fn test_greeting_uses_name() {
        assert!(greeting("Kana").contains("Kana"));
    }
}
