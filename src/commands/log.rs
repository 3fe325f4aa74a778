// /log - browse and delete recent immersion logs
//
// The reply is driven by component interactions routed from the gateway event
// handler. State lives in `Data::log_sessions`, keyed by the reply's message id.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use poise::serenity_prelude as serenity;
use tracing::{debug, warn};

use crate::error::AyumiError;
use crate::features::immersion_store::{self, StoredLog};
use crate::features::log_sessions::ExpiryHandler;
use crate::models::media::MediaType;
use crate::utils::config::colors;
use crate::utils::formatters::{format_amount, format_log_time, truncate};
use crate::utils::periods::LogTimeframe;
use crate::{Context, Data, Error};

pub const SESSION_TIMEOUT_SECS: u64 = 45;
pub const CUSTOM_ID_PREFIX: &str = "log:";
const LOGS_PER_PAGE: usize = 10;
const BUTTONS_PER_ROW: usize = 5;
const TITLE_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Selection,
    List,
}

#[derive(Debug, Clone)]
pub struct LogSession {
    pub user_id: u64,
    pub timeframe: LogTimeframe,
    /// `None` shows every media type
    pub media_filter: Option<MediaType>,
    pub page: usize,
    pub view: View,
    pub logs: Vec<StoredLog>,
    /// Interaction token of the original /log reply, used to edit it on expiry
    pub interaction_token: String,
}

impl LogSession {
    pub fn visible(&self) -> Vec<&StoredLog> {
        self.logs
            .iter()
            .filter(|s| self.media_filter.map_or(true, |m| s.log.media() == Some(m)))
            .collect()
    }

    pub fn page_count(&self) -> usize {
        self.visible().len().div_ceil(LOGS_PER_PAGE).max(1)
    }

    fn clamp_page(&mut self) {
        self.page = self.page.min(self.page_count() - 1);
    }

    /// Media types present in the window, in catalogue order
    pub fn present_types(&self) -> Vec<MediaType> {
        MediaType::ALL
            .into_iter()
            .filter(|m| self.logs.iter().any(|s| s.log.media() == Some(*m)))
            .collect()
    }
}

/// What a `log:` custom id asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Select(Option<MediaType>),
    Prev,
    Next,
    Back,
    Delete(String),
}

pub fn parse_action(custom_id: &str) -> Option<Action> {
    let rest = custom_id.strip_prefix(CUSTOM_ID_PREFIX)?;
    match rest.split_once(':') {
        Some(("type", "all")) => Some(Action::Select(None)),
        Some(("type", key)) => MediaType::from_key(key).map(|m| Action::Select(Some(m))),
        Some(("del", id)) if !id.is_empty() => Some(Action::Delete(id.to_string())),
        None => match rest {
            "prev" => Some(Action::Prev),
            "next" => Some(Action::Next),
            "back" => Some(Action::Back),
            _ => None,
        },
        _ => None,
    }
}

fn button(id: String, label: impl Into<String>, style: serenity::ButtonStyle) -> serenity::CreateButton {
    serenity::CreateButton::new(id).label(label).style(style)
}

fn rows(buttons: Vec<serenity::CreateButton>) -> Vec<serenity::CreateActionRow> {
    buttons
        .chunks(BUTTONS_PER_ROW)
        .map(|chunk| serenity::CreateActionRow::Buttons(chunk.to_vec()))
        .collect()
}

pub fn log_line(index: usize, stored: &StoredLog, now: DateTime<Utc>) -> String {
    let activity = &stored.log.activity;
    let title = if stored.log.has_title() { activity.title.as_str() } else { "Untitled" };
    let when = stored
        .created()
        .map(|c| format_log_time(c, now))
        .unwrap_or_else(|| "unknown time".to_string());
    format!(
        "`{}.` **{}**\n{} • {} • {}",
        index,
        truncate(title, TITLE_CHARS),
        format_amount(activity.amount, &activity.unit),
        activity.type_label,
        when
    )
}

pub fn render_selection(session: &LogSession) -> (serenity::CreateEmbed, Vec<serenity::CreateActionRow>) {
    let embed = serenity::CreateEmbed::new()
        .title(format!("📜 Your logs - {}", session.timeframe.label()))
        .description(format!(
            "You have **{}** log(s) in the {}.\nPick a media type to browse them.",
            session.logs.len(),
            session.timeframe.label()
        ))
        .color(colors::INFO);

    let mut buttons = vec![button(
        format!("{CUSTOM_ID_PREFIX}type:all"),
        "All",
        serenity::ButtonStyle::Primary,
    )];
    for media in session.present_types() {
        buttons.push(
            button(
                format!("{CUSTOM_ID_PREFIX}type:{}", media.key()),
                media.label(),
                serenity::ButtonStyle::Secondary,
            )
            .emoji(serenity::ReactionType::Unicode(media.emoji().to_string())),
        );
    }
    (embed, rows(buttons))
}

pub fn render_list(session: &LogSession, now: DateTime<Utc>) -> (serenity::CreateEmbed, Vec<serenity::CreateActionRow>) {
    let visible = session.visible();
    let pages = session.page_count();
    let page = session.page.min(pages - 1);
    let filter_label = session.media_filter.map_or("All Media", MediaType::label);

    let start = page * LOGS_PER_PAGE;
    let on_page: Vec<&StoredLog> = visible.iter().skip(start).take(LOGS_PER_PAGE).copied().collect();

    let description = if on_page.is_empty() {
        "*No logs left for this filter.*".to_string()
    } else {
        on_page
            .iter()
            .enumerate()
            .map(|(i, s)| log_line(start + i + 1, s, now))
            .collect::<Vec<_>>()
            .join("\n\n")
    };

    let embed = serenity::CreateEmbed::new()
        .title(format!("📜 {} - {}", filter_label, session.timeframe.label()))
        .description(description)
        .color(colors::INFO)
        .footer(serenity::CreateEmbedFooter::new(format!(
            "{} log(s) • Page {}/{}",
            visible.len(),
            page + 1,
            pages
        )));

    let mut components = vec![serenity::CreateActionRow::Buttons(vec![
        button(format!("{CUSTOM_ID_PREFIX}prev"), "◀ Prev", serenity::ButtonStyle::Secondary).disabled(page == 0),
        button(
            format!("{CUSTOM_ID_PREFIX}page"),
            format!("{}/{}", page + 1, pages),
            serenity::ButtonStyle::Secondary,
        )
        .disabled(true),
        button(format!("{CUSTOM_ID_PREFIX}next"), "Next ▶", serenity::ButtonStyle::Secondary)
            .disabled(page + 1 >= pages),
        button(format!("{CUSTOM_ID_PREFIX}back"), "Back", serenity::ButtonStyle::Primary),
    ])];

    let deletes: Vec<serenity::CreateButton> = on_page
        .iter()
        .enumerate()
        .map(|(i, s)| {
            button(
                format!("{CUSTOM_ID_PREFIX}del:{}", s.id),
                format!("🗑 {}", start + i + 1),
                serenity::ButtonStyle::Danger,
            )
        })
        .collect();
    components.extend(rows(deletes));
    (embed, components)
}

fn render(session: &LogSession, now: DateTime<Utc>) -> (serenity::CreateEmbed, Vec<serenity::CreateActionRow>) {
    match session.view {
        View::Selection => render_selection(session),
        View::List => render_list(session, now),
    }
}

pub fn expired_embed() -> serenity::CreateEmbed {
    serenity::CreateEmbed::new()
        .title("⏰ Session Expired")
        .description("This log view timed out. Run `/log time` again to keep browsing.")
        .color(colors::BLURPLE)
}

/// Edits an expired session's reply into the expiry notice
pub fn expiry_handler(http: Arc<serenity::Http>) -> ExpiryHandler<LogSession> {
    Arc::new(move |session: LogSession| {
        let http = Arc::clone(&http);
        async move {
            let edit = serenity::EditInteractionResponse::new()
                .embed(expired_embed())
                .components(vec![]);
            if let Err(e) = http
                .edit_original_interaction_response(&session.interaction_token, &edit, vec![])
                .await
            {
                debug!("Could not mark log session as expired: {}", e);
            }
        }
        .boxed()
    })
}

/// Browse your recent immersion logs
#[poise::command(slash_command, subcommands("time"))]
pub async fn log(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// View and delete logs from a recent timeframe
#[poise::command(slash_command)]
pub async fn time(
    ctx: Context<'_>,
    #[description = "Timeframe to view"] timeframe: LogTimeframe,
) -> Result<(), Error> {
    let poise::Context::Application(app) = ctx else {
        return Ok(());
    };
    ctx.defer_ephemeral().await?;

    let data = ctx.data();
    let uid = ctx.author().id.to_string();
    let logs = immersion_store::recent_logs(&data.firestore, &uid, timeframe.since(Utc::now()), None).await?;

    if logs.is_empty() {
        let embed = serenity::CreateEmbed::new()
            .title(format!("📜 Your logs - {}", timeframe.label()))
            .description("*No logs found for this period.*")
            .color(colors::INFO);
        ctx.send(poise::CreateReply::default().embed(embed).ephemeral(true)).await?;
        return Ok(());
    }

    let session = LogSession {
        user_id: ctx.author().id.get(),
        timeframe,
        media_filter: None,
        page: 0,
        view: View::Selection,
        logs,
        interaction_token: app.interaction.token.clone(),
    };
    let (embed, components) = render_selection(&session);
    let reply = ctx
        .send(poise::CreateReply::default().embed(embed).components(components).ephemeral(true))
        .await?;
    let message = reply.message().await?;
    data.log_sessions.insert(message.id.get(), session);
    Ok(())
}

async fn respond_ephemeral(
    ctx: &serenity::Context,
    interaction: &serenity::ComponentInteraction,
    content: &str,
) -> serenity::Result<()> {
    interaction
        .create_response(
            &ctx.http,
            serenity::CreateInteractionResponse::Message(
                serenity::CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(true),
            ),
        )
        .await
}

/// Handles a button press on a /log reply
pub async fn handle_component(
    ctx: &serenity::Context,
    interaction: &serenity::ComponentInteraction,
    data: &Data,
) -> Result<(), anyhow::Error> {
    let Some(action) = parse_action(&interaction.data.custom_id) else {
        return Ok(());
    };
    let key = interaction.message.id.get();

    let Some(session) = data.log_sessions.get(key) else {
        respond_ephemeral(ctx, interaction, "⏰ This session has expired. Run `/log time` again.").await?;
        return Ok(());
    };
    if session.user_id != interaction.user.id.get() {
        respond_ephemeral(ctx, interaction, "❌ This log view belongs to someone else.").await?;
        return Ok(());
    }

    let now = Utc::now();
    let rendered = match action {
        Action::Delete(log_id) => return delete(ctx, interaction, data, key, &log_id).await,
        Action::Select(filter) => data.log_sessions.update(key, |s| {
            s.media_filter = filter;
            s.page = 0;
            s.view = View::List;
            render(s, now)
        }),
        Action::Prev => data.log_sessions.update(key, |s| {
            s.page = s.page.saturating_sub(1);
            render(s, now)
        }),
        Action::Next => data.log_sessions.update(key, |s| {
            s.page += 1;
            s.clamp_page();
            render(s, now)
        }),
        Action::Back => data.log_sessions.update(key, |s| {
            s.view = View::Selection;
            render(s, now)
        }),
    };

    let Some((embed, components)) = rendered else {
        respond_ephemeral(ctx, interaction, "⏰ This session has expired. Run `/log time` again.").await?;
        return Ok(());
    };
    interaction
        .create_response(
            &ctx.http,
            serenity::CreateInteractionResponse::UpdateMessage(
                serenity::CreateInteractionResponseMessage::new()
                    .embed(embed)
                    .components(components),
            ),
        )
        .await?;
    Ok(())
}

async fn delete(
    ctx: &serenity::Context,
    interaction: &serenity::ComponentInteraction,
    data: &Data,
    key: u64,
    log_id: &str,
) -> Result<(), anyhow::Error> {
    interaction.defer(&ctx.http).await?;
    let uid = interaction.user.id.to_string();

    let notice = match immersion_store::delete_log(&data.firestore, &uid, log_id).await {
        Ok(log) => {
            let title = if log.has_title() { log.activity.title.clone() } else { "Untitled".into() };
            format!(
                "🗑 Deleted **{}** ({} {})",
                truncate(&title, TITLE_CHARS),
                format_amount(log.activity.amount, &log.activity.unit),
                log.activity.type_label
            )
        }
        Err(AyumiError::NotFound(msg)) => format!("❌ {msg}"),
        Err(e) => {
            warn!("Failed to delete log {} for {}: {}", log_id, uid, e);
            e.user_message()
        }
    };

    let rendered = data.log_sessions.update(key, |s| {
        s.logs.retain(|l| l.id != log_id);
        s.clamp_page();
        render(s, Utc::now())
    });
    if let Some((embed, components)) = rendered {
        interaction
            .edit_response(
                &ctx.http,
                serenity::EditInteractionResponse::new().embed(embed).components(components),
            )
            .await?;
    }
    interaction
        .create_followup(
            &ctx.http,
            serenity::CreateInteractionResponseFollowup::new()
                .content(notice)
                .ephemeral(true),
        )
        .await?;
    Ok(())
}
