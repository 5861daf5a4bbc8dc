use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, MaybeInaccessibleMessage};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::export::CsvExporter;
use crate::keyboards;
use crate::lead::{Lead, LeadDraft, LeadStatus};
use crate::ocr::OcrService;
use crate::parser::LeadParser;
use crate::storage::LeadStore;

/// Where a submitted screenshot is in the save flow.
enum PendingLead {
    ChoosingManager(LeadDraft),
    AwaitingComment {
        draft: LeadDraft,
        manager_id: Option<String>,
    },
}

/// Shared application state
pub struct AppState {
    config: Config,
    parser: LeadParser,
    ocr: OcrService,
    store: LeadStore,
    exporter: Option<CsvExporter>,
    pending: Mutex<HashMap<u64, PendingLead>>,
}

impl AppState {
    pub fn new(config: Config, store: LeadStore) -> Result<Self> {
        let parser = LeadParser::new(&config.parser)?;
        let ocr = OcrService::new(&config.ocr);
        let exporter = config
            .export
            .as_ref()
            .map(|export| CsvExporter::new(export.master_csv.clone()));
        Ok(Self {
            config,
            parser,
            ocr,
            store,
            exporter,
            pending: Mutex::new(HashMap::new()),
        })
    }
}

/// Start the Telegram bot
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let bot = Bot::new(&state.config.telegram.bot_token);

    info!("Starting Telegram bot...");

    let admin_ids = state.config.telegram.admin_ids.clone();

    let handler = dptree::entry()
        .branch(
            Update::filter_message()
                .filter_map(move |msg: Message| {
                    let user = msg.from.as_ref()?;
                    if admin_ids.contains(&user.id.0) {
                        Some(msg)
                    } else {
                        None
                    }
                })
                .endpoint(handle_message),
        )
        .branch(Update::filter_callback_query().endpoint(handle_callback));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("bot"))
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let user_id = match msg.from.as_ref() {
        Some(user) => user.id.0,
        None => return Ok(()),
    };

    if msg.photo().is_some() {
        if let Err(e) = handle_photo(&bot, &msg, &state, user_id).await {
            error!("Error processing screenshot: {:#}", e);
            bot.send_message(msg.chat.id, format!("Ошибка обработки скриншота: {}", e))
                .await?;
        }
        return Ok(());
    }

    let text = match msg.text() {
        Some(t) => t.to_string(),
        None => return Ok(()),
    };

    info!("Message from user {}: {}", user_id, text);

    if text == "/start" {
        bot.send_message(
            msg.chat.id,
            "Бот приёма лидов. Отправьте скриншот анкеты.\n\n\
             Команды:\n\
             /managers - Список менеджеров\n\
             /addmanager <имя> - Добавить менеджера\n\
             /bindgroup <имя> - Привязать эту группу к менеджеру\n\
             /chatid - ID текущего чата",
        )
        .await?;
        return Ok(());
    }

    if text == "/chatid" {
        bot.send_message(msg.chat.id, format!("Chat ID: {}", msg.chat.id.0))
            .await?;
        return Ok(());
    }

    if text == "/managers" {
        match state.store.list_active_managers().await {
            Ok(managers) if managers.is_empty() => {
                bot.send_message(msg.chat.id, "Менеджеры не добавлены.")
                    .await?;
            }
            Ok(managers) => {
                let mut list = String::from("Менеджеры:\n");
                for manager in &managers {
                    let group = match manager.group_chat_id {
                        Some(id) => format!("группа {}", id),
                        None => "группа не привязана".to_string(),
                    };
                    list.push_str(&format!("  - {} ({})\n", manager.name, group));
                }
                bot.send_message(msg.chat.id, list).await?;
            }
            Err(e) => {
                error!("Failed to list managers: {:#}", e);
                bot.send_message(msg.chat.id, format!("Ошибка: {}", e))
                    .await?;
            }
        }
        return Ok(());
    }

    if let Some(name) = command_arg(&text, "/addmanager") {
        if name.is_empty() {
            bot.send_message(msg.chat.id, "Использование: /addmanager <имя>")
                .await?;
            return Ok(());
        }
        match state.store.add_manager(name).await {
            Ok(manager) => {
                bot.send_message(
                    msg.chat.id,
                    format!("Менеджер {} добавлен.", manager.name),
                )
                .await?;
            }
            Err(e) => {
                error!("Failed to add manager: {:#}", e);
                bot.send_message(msg.chat.id, format!("Ошибка: {}", e))
                    .await?;
            }
        }
        return Ok(());
    }

    if let Some(name) = command_arg(&text, "/bindgroup") {
        if name.is_empty() {
            bot.send_message(msg.chat.id, "Использование: /bindgroup <имя менеджера>")
                .await?;
            return Ok(());
        }
        match state.store.bind_manager_group(name, msg.chat.id.0).await {
            Ok(true) => {
                bot.send_message(
                    msg.chat.id,
                    format!("Группа привязана к менеджеру {}.", name),
                )
                .await?;
            }
            Ok(false) => {
                bot.send_message(msg.chat.id, format!("Менеджер {} не найден.", name))
                    .await?;
            }
            Err(e) => {
                error!("Failed to bind group: {:#}", e);
                bot.send_message(msg.chat.id, format!("Ошибка: {}", e))
                    .await?;
            }
        }
        return Ok(());
    }

    // Non-command text while a draft is waiting for its comment.
    let pending = state.pending.lock().await.remove(&user_id);
    match pending {
        Some(PendingLead::AwaitingComment { draft, manager_id }) => {
            let comment = (text.trim() != "-").then(|| text.trim().to_string());
            if let Err(e) =
                save_lead(&bot, &state, draft, manager_id, comment, user_id, msg.chat.id).await
            {
                error!("Error saving lead: {:#}", e);
                bot.send_message(msg.chat.id, format!("Ошибка сохранения: {}", e))
                    .await?;
            }
        }
        Some(other) => {
            // Put it back; the manager is still being chosen on the keyboard.
            state.pending.lock().await.insert(user_id, other);
            bot.send_message(msg.chat.id, "Сначала выберите менеджера на клавиатуре выше.")
                .await?;
        }
        None => {
            bot.send_message(msg.chat.id, "Отправьте скриншот анкеты.")
                .await?;
        }
    }

    Ok(())
}

async fn handle_photo(
    bot: &Bot,
    msg: &Message,
    state: &Arc<AppState>,
    user_id: u64,
) -> Result<()> {
    let photo = msg
        .photo()
        .and_then(|sizes| sizes.last())
        .context("Message has no photo")?;

    bot.send_chat_action(msg.chat.id, teloxide::types::ChatAction::Typing)
        .await
        .ok();

    let file = bot
        .get_file(photo.file.id.clone())
        .await
        .context("Failed to resolve photo file")?;
    let mut image = Vec::new();
    bot.download_file(&file.path, &mut image)
        .await
        .context("Failed to download photo")?;

    let text = state.ocr.extract_text(&image).await?;
    let Some(draft) = draft_from_scan(&state.parser, &text) else {
        bot.send_message(msg.chat.id, "Не удалось извлечь текст из изображения.")
            .await?;
        return Ok(());
    };

    info!(
        "Parsed lead draft {} (hot: {}) from user {}",
        draft.id,
        draft.is_hot(),
        user_id
    );

    let card = draft.card_text();

    if draft.is_hot() {
        let managers = state.store.list_active_managers().await?;
        if !managers.is_empty() {
            send_split_with_keyboard(
                bot,
                msg.chat.id,
                &format!("{}\n\nВыберите менеджера:", card),
                keyboards::managers_keyboard(&managers),
            )
            .await?;
            state
                .pending
                .lock()
                .await
                .insert(user_id, PendingLead::ChoosingManager(draft));
            return Ok(());
        }
    }

    // Cold lead, or no managers to route to: straight to the comment step.
    send_split(
        bot,
        msg.chat.id,
        &format!("{}\n\nВведите комментарий (или - чтобы пропустить):", card),
    )
    .await?;
    state.pending.lock().await.insert(
        user_id,
        PendingLead::AwaitingComment {
            draft,
            manager_id: None,
        },
    );

    Ok(())
}

/// The argument of a command, or None when the text is a different command
/// that merely shares the prefix ("/addmanagerX" is not "/addmanager").
fn command_arg<'a>(text: &'a str, command: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(command)?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}

/// An unreadable image yields no draft at all, not an all-empty one.
fn draft_from_scan(parser: &LeadParser, text: &str) -> Option<LeadDraft> {
    if text.trim().is_empty() {
        return None;
    }
    Some(LeadDraft::from_extraction(&parser.parse(text)))
}

async fn handle_callback(bot: Bot, q: CallbackQuery, state: Arc<AppState>) -> ResponseResult<()> {
    let data = match q.data.as_deref() {
        Some(d) => d.to_string(),
        None => return Ok(()),
    };

    if let Some(choice) = data.strip_prefix("manager:") {
        if let Err(e) = handle_manager_choice(&bot, &q, &state, choice).await {
            error!("Error handling manager choice: {:#}", e);
        }
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    }

    if let Some(rest) = data.strip_prefix("status:") {
        match handle_status_change(&bot, &q, &state, rest).await {
            Ok(label) => {
                bot.answer_callback_query(q.id.clone()).text(label).await?;
            }
            Err(e) => {
                error!("Error handling status change: {:#}", e);
                bot.answer_callback_query(q.id.clone())
                    .text("Ошибка обновления статуса")
                    .await?;
            }
        }
        return Ok(());
    }

    warn!("Unknown callback data: {}", data);
    bot.answer_callback_query(q.id.clone()).await?;
    Ok(())
}

async fn handle_manager_choice(
    bot: &Bot,
    q: &CallbackQuery,
    state: &Arc<AppState>,
    choice: &str,
) -> Result<()> {
    let user_id = q.from.id.0;
    if !state.config.telegram.admin_ids.contains(&user_id) {
        return Ok(());
    }

    let draft = match state.pending.lock().await.remove(&user_id) {
        Some(PendingLead::ChoosingManager(draft)) => draft,
        Some(other) => {
            state.pending.lock().await.insert(user_id, other);
            return Ok(());
        }
        None => return Ok(()),
    };

    let manager_id = if choice == "cancel" {
        None
    } else {
        Some(choice.to_string())
    };

    state.pending.lock().await.insert(
        user_id,
        PendingLead::AwaitingComment { draft, manager_id },
    );

    if let Some(message) = q.message.as_ref() {
        bot.send_message(
            message.chat().id,
            "Введите комментарий (или - чтобы пропустить):",
        )
        .await?;
    }

    Ok(())
}

async fn save_lead(
    bot: &Bot,
    state: &Arc<AppState>,
    draft: LeadDraft,
    manager_id: Option<String>,
    comment: Option<String>,
    user_id: u64,
    reply_chat: ChatId,
) -> Result<()> {
    let lead = Lead::from_draft(&draft, manager_id, comment, user_id as i64);
    state.store.insert_lead(&lead).await?;

    let manager = match &lead.manager_id {
        Some(id) => state.store.get_manager(id).await?,
        None => None,
    };

    // Post the card into the manager's group, if one is bound.
    let mut tg_link = None;
    if let Some(manager) = &manager {
        if let Some(group_id) = manager.group_chat_id {
            let sent = send_split_with_keyboard(
                bot,
                ChatId(group_id),
                &group_card_text(&lead),
                keyboards::lead_status_keyboard(&lead.id),
            )
            .await
            .context("Failed to post lead card to manager group")?;
            tg_link = group_message_link(group_id, sent.id.0);
        } else {
            warn!(
                "Manager {} has no bound group; lead {} not announced",
                manager.name, lead.id
            );
        }
    }

    if let Some(exporter) = &state.exporter {
        let manager_name = manager.as_ref().map(|m| m.name.as_str());
        if let Err(e) = exporter.append_lead(&lead, manager_name, tg_link.as_deref()) {
            warn!("CSV export failed for lead {}: {:#}", lead.id, e);
        }
    }

    bot.send_message(reply_chat, format!("Лид сохранён. ID: {}", lead.id))
        .await?;

    info!("Lead {} saved ({})", lead.id, lead.lead_type);
    Ok(())
}

async fn handle_status_change(
    bot: &Bot,
    q: &CallbackQuery,
    state: &Arc<AppState>,
    rest: &str,
) -> Result<&'static str> {
    let (lead_id, code) = rest
        .split_once(':')
        .context("Malformed status callback data")?;
    let status = LeadStatus::from_code(code)
        .with_context(|| format!("Unknown status code: {}", code))?;

    if !state.store.set_lead_status(lead_id, status).await? {
        anyhow::bail!("Lead {} not found", lead_id);
    }

    if let Some(exporter) = &state.exporter {
        if let Err(e) = exporter.update_status(lead_id, status) {
            warn!("CSV status update failed for lead {}: {:#}", lead_id, e);
        }
    }

    // Rewrite the status line of the card in place, keeping the keyboard.
    if let Some(MaybeInaccessibleMessage::Regular(message)) = q.message.as_ref() {
        if let Some(text) = message.text() {
            let base = match text.find("🔄 Статус:") {
                Some(pos) => text[..pos].trim_end(),
                None => text,
            };
            bot.edit_message_text(
                message.chat.id,
                message.id,
                format!("{}\n\n🔄 Статус: {}", base, status.label()),
            )
            .reply_markup(keyboards::lead_status_keyboard(lead_id))
            .await?;
        }
    }

    info!("Lead {} moved to status {}", lead_id, status.code());
    Ok(status.label())
}

async fn send_split(bot: &Bot, chat: ChatId, text: &str) -> Result<()> {
    for chunk in split_message(text, 4000) {
        bot.send_message(chat, chunk).await?;
    }
    Ok(())
}

/// Sends the text in chunks, attaching the keyboard to the last one, and
/// returns that last message.
async fn send_split_with_keyboard(
    bot: &Bot,
    chat: ChatId,
    text: &str,
    keyboard: InlineKeyboardMarkup,
) -> Result<Message> {
    let mut chunks = split_message(text, 4000);
    let last = chunks.pop().unwrap_or_default();
    for chunk in chunks {
        bot.send_message(chat, chunk).await?;
    }
    let sent = bot.send_message(chat, last).reply_markup(keyboard).await?;
    Ok(sent)
}

/// Split long messages for Telegram's 4096 char limit
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + max_len).min(text.len());
        // Walk back to a valid UTF-8 char boundary so slicing doesn't panic
        while end > start && !text.is_char_boundary(end) {
            end -= 1;
        }
        let actual_end = if end < text.len() {
            text[start..end]
                .rfind('\n')
                .or_else(|| text[start..end].rfind(' '))
                .map(|pos| start + pos + 1)
                .unwrap_or(end)
        } else {
            end
        };

        chunks.push(text[start..actual_end].to_string());
        start = actual_end;
    }

    chunks
}

fn group_card_text(lead: &Lead) -> String {
    let mut lines = vec!["🔥 Новый лид!".to_string(), String::new()];
    lines.push(format!("Имя: {}", lead.name));
    lines.extend(lead.contact_lines());
    if let Some(weight) = lead.weight_kg {
        lines.push(format!("Вес: {} кг", weight));
    }
    if let Some(height) = lead.height_cm {
        lines.push(format!("Рост: {} см", height));
    }
    if let Some(bmi) = lead.bmi {
        lines.push(format!("BMI: {}", bmi));
    }
    if let Some(comment) = &lead.comment {
        lines.push(format!("💬 Комментарий: {}", comment));
    }
    lines.push(String::new());
    lines.push(format!("🔄 Статус: {}", lead.status.label()));
    lines.join("\n")
}

/// Deep link to a message in a supergroup (chat ids are -100 prefixed).
fn group_message_link(chat_id: i64, message_id: i32) -> Option<String> {
    let internal = chat_id.checked_neg()?.checked_sub(1_000_000_000_000)?;
    if internal <= 0 {
        return None;
    }
    Some(format!("https://t.me/c/{}/{}", internal, message_id))
}
