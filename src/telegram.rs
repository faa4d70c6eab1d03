//! Telegram side of the bot: turns updates into dialog calls and sends the
//! resulting [`Reply`] back.

use std::collections::HashMap;

use teloxide::prelude::*;
use teloxide::types::{BotCommand, MessageId, User as TgUser};
use teloxide::{ApiError, RequestError};
use tokio::sync::Mutex;

use crate::db::Db;
use crate::error::Result;
use crate::handlers::{self, Reply};
use crate::models::User;
use crate::roles;
use crate::session::UserSession;

const FAILURE: &str = "Произошла ошибка. Попробуйте еще раз или отправьте /start";

/// State shared by every update handler.
pub struct BotState {
    pub db: Db,
    pub owner_ids: Vec<i64>,
    sessions: Mutex<HashMap<i64, UserSession>>,
}

impl BotState {
    pub fn new(db: Db, owner_ids: Vec<i64>) -> Self {
        BotState {
            db,
            owner_ids,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Removes the session for the duration of one update.
    pub async fn take_session(&self, user_id: i64) -> UserSession {
        self.sessions.lock().await.remove(&user_id).unwrap_or_default()
    }

    pub async fn put_session(&self, user_id: i64, session: UserSession) {
        self.sessions.lock().await.insert(user_id, session);
    }

    async fn resolve(&self, sender: &Sender) -> Result<User> {
        roles::resolve_user(
            &self.db,
            &self.owner_ids,
            sender.id,
            &sender.username,
            &sender.full_name,
        )
        .await
    }

    pub async fn process_text(&self, sender: &Sender, text: &str) -> Result<Reply> {
        let user = self.resolve(sender).await?;
        let mut session = self.take_session(user.user_id).await;
        let result = handlers::handle_text(&self.db, &user, &mut session, text).await;
        if result.is_err() {
            session.reset();
        }
        self.put_session(user.user_id, session).await;
        result
    }

    pub async fn process_callback(&self, sender: &Sender, data: &str) -> Result<Reply> {
        let user = self.resolve(sender).await?;
        let mut session = self.take_session(user.user_id).await;
        let result = handlers::handle_callback(&self.db, &user, &mut session, data).await;
        if result.is_err() {
            session.reset();
        }
        self.put_session(user.user_id, session).await;
        result
    }
}

/// Who sent an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub id: i64,
    pub username: String,
    pub full_name: String,
}

impl From<&TgUser> for Sender {
    fn from(user: &TgUser) -> Self {
        Sender {
            id: user.id.0 as i64,
            username: user.username.clone().unwrap_or_default(),
            full_name: user.full_name(),
        }
    }
}

pub fn command_list() -> Vec<BotCommand> {
    vec![
        BotCommand::new("start", "Главное меню"),
        BotCommand::new("book", "Записаться на услугу"),
        BotCommand::new("appointments", "Мои записи"),
        BotCommand::new("help", "Помощь"),
        BotCommand::new("admin", "Панель администратора"),
        BotCommand::new("finance", "Финансы и аналитика"),
        BotCommand::new("subscription", "Подписка"),
        BotCommand::new("owner", "Панель владельца"),
    ]
}

async fn send_reply(bot: &Bot, chat_id: ChatId, reply: &Reply) -> ResponseResult<()> {
    if reply.text.is_empty() {
        return Ok(());
    }
    let request = bot.send_message(chat_id, reply.text.clone());
    match &reply.markup {
        Some(markup) => request.reply_markup(markup.clone()).await?,
        None => request.await?,
    };
    Ok(())
}

/// Replaces the menu message in place; falls back to a new message when the
/// old one cannot be edited.
async fn edit_reply(bot: &Bot, chat_id: ChatId, message_id: MessageId, reply: &Reply) -> ResponseResult<()> {
    if reply.text.is_empty() {
        return Ok(());
    }
    let request = bot.edit_message_text(chat_id, message_id, reply.text.clone());
    let result = match &reply.markup {
        Some(markup) => request.reply_markup(markup.clone()).await,
        None => request.await,
    };
    match result {
        Ok(_) | Err(RequestError::Api(ApiError::MessageNotModified)) => Ok(()),
        Err(e) => {
            debug!("Editing message {} failed ({}), sending a new one", message_id.0, e);
            send_reply(bot, chat_id, reply).await
        }
    }
}

async fn deliver_notices(bot: &Bot, reply: &Reply) {
    for notice in &reply.notices {
        let request = bot.send_message(ChatId(notice.chat_id), notice.text.clone());
        let result = match &notice.markup {
            Some(markup) => request.reply_markup(markup.clone()).await,
            None => request.await,
        };
        if let Err(e) = result {
            warn!("Could not notify {}: {}", notice.chat_id, e);
        }
    }
}

pub async fn on_message(bot: Bot, msg: Message, state: &BotState) -> ResponseResult<()> {
    let (Some(text), Some(from)) = (msg.text(), msg.from.as_ref()) else {
        return Ok(());
    };
    let chat_id = msg.chat.id;

    let sender = Sender::from(from);
    match state.process_text(&sender, text).await {
        Ok(reply) => {
            send_reply(&bot, chat_id, &reply).await?;
            deliver_notices(&bot, &reply).await;
        }
        Err(e) => {
            error!("Failed to handle message from {}: {}", sender.id, e);
            bot.send_message(chat_id, FAILURE).await?;
        }
    }
    Ok(())
}

pub async fn on_callback_query(bot: Bot, q: CallbackQuery, state: &BotState) -> ResponseResult<()> {
    let Some(data) = q.data.as_deref() else {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };
    let message = q.message.as_ref().and_then(|m| m.regular_message());

    let sender = Sender::from(&q.from);
    match state.process_callback(&sender, data).await {
        Ok(reply) => {
            let answer = bot.answer_callback_query(q.id.clone());
            match &reply.alert {
                Some(alert) => answer.text(alert.clone()).await?,
                None => answer.await?,
            };
            match message {
                Some(m) => edit_reply(&bot, m.chat.id, m.id, &reply).await?,
                None => send_reply(&bot, ChatId(sender.id), &reply).await?,
            }
            deliver_notices(&bot, &reply).await;
        }
        Err(e) => {
            error!("Failed to handle callback {} from {}: {}", data, sender.id, e);
            bot.answer_callback_query(q.id.clone())
                .text(FAILURE)
                .show_alert(true)
                .await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::repo::users;
    use crate::session::UserStep;

    fn sender(id: i64) -> Sender {
        Sender {
            id,
            username: "ann".into(),
            full_name: "Ann Lee".into(),
        }
    }

    #[tokio::test]
    async fn test_sessions_survive_between_updates() {
        let state = BotState::new(Db::memory(), vec![10]);
        state.process_callback(&sender(10), "own:promote").await.unwrap();
        let session = state.take_session(10).await;
        assert_eq!(session.step, UserStep::PromoteAdmin);
    }

    #[tokio::test]
    async fn test_first_update_registers_the_user() {
        let state = BotState::new(Db::memory(), vec![10]);
        let reply = state.process_text(&sender(10), "/start").await.unwrap();
        assert!(reply.text.contains("Ann Lee"));
        let stored = users::get_user(&state.db, 10).await.unwrap().unwrap();
        assert_eq!(stored.role, Role::Owner);
        assert_eq!(stored.username, "ann");

        state.process_text(&sender(11), "/start").await.unwrap();
        let client = users::get_user(&state.db, 11).await.unwrap().unwrap();
        assert_eq!(client.role, Role::Client);
    }

    #[test]
    fn test_commands_are_lowercase() {
        for command in command_list() {
            assert_eq!(command.command, command.command.to_lowercase());
        }
    }
}
