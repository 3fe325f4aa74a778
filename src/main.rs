// Ayumi - Discord bot for Japanese immersion tracking

mod api;
mod commands;
mod error;
mod features;
mod models;
mod utils;

use std::env;
use std::sync::Arc;
use std::time::Duration;

use ab_glyph::FontArc;
use anyhow::Context as _;
use dashmap::DashMap;
use poise::serenity_prelude as serenity;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::firestore::{Firestore, ServiceAccount};
use crate::api::gemini::Gemini;
use crate::commands::log::LogSession;
use crate::error::AyumiError;
use crate::features::afk::AfkRegistry;
use crate::features::ayumi::ChatHistory;
use crate::features::custom_prompt::PromptStore;
use crate::features::log_sessions::SessionStore;
use crate::features::news_feed::NewsFeed;
use crate::features::novels::NovelCatalog;
use crate::models::guild::GuildConfig;
use crate::utils::config::Settings;

/// Prefix for text commands
pub const PREFIX: &str = "a!";

/// State shared by every command and event handler
pub struct Data {
    pub http: reqwest::Client,
    pub firestore: Firestore,
    pub settings: Settings,
    pub afk: AfkRegistry,
    pub guild_configs: Arc<DashMap<u64, GuildConfig>>,
    pub log_sessions: SessionStore<LogSession>,
    pub ayumi_history: ChatHistory,
    pub gemini: Option<Gemini>,
    pub novels: NovelCatalog,
    pub prompts: PromptStore,
    pub heatmap_font: Option<FontArc>,
}

type Error = Box<dyn std::error::Error + Send + Sync>;
type Context<'a> = poise::Context<'a, Data, Error>;

async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            let message = match error.downcast_ref::<AyumiError>() {
                Some(e) => {
                    if e.is_user_facing() {
                        warn!("/{} rejected: {}", ctx.command().qualified_name, e);
                    } else {
                        error!("/{} failed: {:?}", ctx.command().qualified_name, e);
                    }
                    e.user_message()
                }
                None => {
                    error!("/{} failed: {:?}", ctx.command().qualified_name, error);
                    "❌ Something went wrong, please try again later.".to_string()
                }
            };
            let reply = poise::CreateReply::default().content(message).ephemeral(true);
            if let Err(e) = ctx.send(reply).await {
                error!("Could not report command error: {}", e);
            }
        }
        other => {
            if let Err(e) = poise::builtins::on_error(other).await {
                error!("Error while handling framework error: {}", e);
            }
        }
    }
}

async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::Message { new_message } => {
            if let Err(e) = features::afk::handle_message(ctx, new_message, data).await {
                warn!("AFK handler failed: {:?}", e);
            }
            if let Err(e) = features::ayumi::handle_message(ctx, new_message, data).await {
                error!("Ayumi handler failed: {:?}", e);
            }
        }
        serenity::FullEvent::InteractionCreate {
            interaction: serenity::Interaction::Component(component),
        } if component.data.custom_id.starts_with(commands::log::CUSTOM_ID_PREFIX) => {
            if let Err(e) = commands::log::handle_component(ctx, component, data).await {
                error!("Log session interaction failed: {:?}", e);
            }
        }
        serenity::FullEvent::Ready { data_about_bot } => {
            info!("Logged in as {}", data_about_bot.user.name);
        }
        _ => {}
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            env::var("RUST_LOG").unwrap_or_else(|_| "ayumi=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::from_env().context("invalid configuration")?;
    info!("Starting Ayumi...");

    let http = reqwest::Client::builder()
        .user_agent("Ayumi-Bot/1.0")
        .timeout(Duration::from_secs(30))
        .build()
        .context("failed to build HTTP client")?;

    let account = ServiceAccount::load(&settings.firebase).context("failed to load Firebase credentials")?;
    info!("Firestore project {}", account.project_id);
    let firestore = Firestore::new(http.clone(), account);

    let novels = NovelCatalog::load(&settings.novel_list_path).unwrap_or_else(|e| {
        warn!("Novel list unusable: {}", e);
        NovelCatalog::default()
    });
    info!("Novel catalogue has {} titles", novels.len());
    let heatmap_font = utils::visualizations::load_font(&settings.heatmap_font_path);
    let gemini = settings.gemini_api_key.as_deref().map(|key| Gemini::new(http.clone(), key));
    if gemini.is_none() {
        warn!("GEMINI_API_KEY not set; Ayumi chat is disabled");
    }

    let token = settings.discord_token.clone();
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::all(),
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some(PREFIX.into()),
                ..Default::default()
            },
            on_error: |error| Box::pin(on_error(error)),
            event_handler: |ctx, event, framework, data| Box::pin(event_handler(ctx, event, framework, data)),
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                info!("Registered {} commands", framework.options().commands.len());

                let guild_configs = Arc::new(DashMap::new());
                match commands::config::load_guild_configs(&firestore, &guild_configs).await {
                    Ok(count) => info!("Loaded {} guild configs", count),
                    Err(e) => warn!("Could not load guild configs: {}", e),
                }

                let log_sessions = SessionStore::new(
                    Duration::from_secs(commands::log::SESSION_TIMEOUT_SECS),
                    commands::log::expiry_handler(ctx.http.clone()),
                );

                let feed = NewsFeed {
                    discord: ctx.http.clone(),
                    http: http.clone(),
                    feed_url: settings.news_feed_url.clone(),
                    interval: Duration::from_secs(settings.news_poll_secs),
                    default_channel: settings.news_channel_id,
                    guild_configs: Arc::clone(&guild_configs),
                };
                tokio::spawn(feed.run());

                Ok(Data {
                    prompts: PromptStore::new(settings.custom_prompt_dir.clone()),
                    http,
                    firestore,
                    settings,
                    afk: AfkRegistry::new(),
                    guild_configs,
                    log_sessions,
                    ayumi_history: ChatHistory::new(),
                    gemini,
                    novels,
                    heatmap_font,
                })
            })
        })
        .build();

    let intents = serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT
        | serenity::GatewayIntents::DIRECT_MESSAGES;

    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await
        .context("failed to create Discord client")?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Cannot listen for Ctrl+C: {}", e);
            return;
        }
        info!("Shutting down...");
        shard_manager.shutdown_all().await;
    });

    client.start().await.context("Discord client stopped")?;
    info!("Goodbye!");
    Ok(())
}
