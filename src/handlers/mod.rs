//! Dialog layer. Every handler takes the resolved user and their session and
//! returns a [`Reply`]; sending it is up to the transport in `telegram`.

use chrono::{Local, NaiveDate, NaiveDateTime};
use teloxide::types::InlineKeyboardMarkup;

use crate::db::Db;
use crate::error::Result;
use crate::models::User;
use crate::roles;
use crate::session::{UserSession, UserStep};
use crate::sheets::parse_number;

pub mod admin;
pub mod booking;
pub mod client;
pub mod finance;
pub mod owner;
pub mod subscription;

/// Message for another chat produced by a dialog step.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub chat_id: i64,
    pub text: String,
    pub markup: Option<InlineKeyboardMarkup>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reply {
    /// Empty when only the callback is answered
    pub text: String,
    pub markup: Option<InlineKeyboardMarkup>,
    /// Popup shown on the callback answer
    pub alert: Option<String>,
    pub notices: Vec<Notice>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Reply {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn menu(text: impl Into<String>, markup: InlineKeyboardMarkup) -> Self {
        Reply {
            text: text.into(),
            markup: Some(markup),
            ..Default::default()
        }
    }

    pub fn alert(alert: impl Into<String>) -> Self {
        Reply {
            alert: Some(alert.into()),
            ..Default::default()
        }
    }

    pub fn with_alert(mut self, alert: impl Into<String>) -> Self {
        self.alert = Some(alert.into());
        self
    }

    pub fn notify(mut self, chat_id: i64, text: impl Into<String>) -> Self {
        self.notices.push(Notice {
            chat_id,
            text: text.into(),
            markup: None,
        });
        self
    }
}

/// Who is acting and when.
pub struct Ctx<'a> {
    pub db: &'a Db,
    pub user: &'a User,
    pub now: NaiveDateTime,
}

impl Ctx<'_> {
    pub fn today(&self) -> NaiveDate {
        self.now.date()
    }
}

/// Non-negative amount of money; accepts "1 500,50".
pub(crate) fn parse_amount(text: &str) -> Option<f64> {
    parse_number(text).filter(|v| *v >= 0.0)
}

/// Positive whole number of minutes.
pub(crate) fn parse_minutes(text: &str) -> Option<u32> {
    text.trim().parse::<u32>().ok().filter(|m| *m > 0)
}

/// "-" and empty input leave an optional field blank.
pub(crate) fn optional_text(text: &str) -> String {
    match text.trim() {
        "-" => String::new(),
        other => other.to_string(),
    }
}

pub async fn handle_text(db: &Db, user: &User, session: &mut UserSession, text: &str) -> Result<Reply> {
    handle_text_at(db, user, session, text, Local::now().naive_local()).await
}

pub async fn handle_callback(
    db: &Db,
    user: &User,
    session: &mut UserSession,
    data: &str,
) -> Result<Reply> {
    handle_callback_at(db, user, session, data, Local::now().naive_local()).await
}

pub async fn handle_text_at(
    db: &Db,
    user: &User,
    session: &mut UserSession,
    text: &str,
    now: NaiveDateTime,
) -> Result<Reply> {
    let ctx = Ctx { db, user, now };
    let text = text.trim();

    if let Some(command) = text.strip_prefix('/') {
        session.reset();
        let command = command
            .split_whitespace()
            .next()
            .and_then(|c| c.split('@').next())
            .unwrap_or_default();
        if let Some(denied) = roles::check(db, user, roles::command_access(command), ctx.today()).await? {
            return Ok(Reply::text(denied));
        }
        debug!("User {} sent /{}", user.user_id, command);
        return match command {
            "start" => client::start(&ctx).await,
            "help" => Ok(client::help(user)),
            "book" => booking::start(&ctx, session).await,
            "appointments" => client::my_appointments(&ctx).await,
            "admin" => Ok(admin::menu()),
            "owner" => Ok(owner::menu()),
            "finance" => Ok(finance::menu()),
            "subscription" => subscription::menu(&ctx).await,
            _ => Ok(Reply::text("Неизвестная команда. Список команд: /help")),
        };
    }

    if session.is_idle() {
        return Ok(Reply::menu(
            "Выберите действие в меню или отправьте /start",
            crate::keyboards::to_main_menu(),
        ));
    }
    if let Some(denied) = roles::check(db, user, session.step.access(), ctx.today()).await? {
        session.reset();
        return Ok(Reply::text(denied));
    }

    match session.step {
        UserStep::Idle => Ok(Reply::text("Выберите действие в меню или отправьте /start")),
        UserStep::Booking(step) => booking::on_text(&ctx, session, step, text).await,
        UserStep::AddService(_)
        | UserStep::ServiceCategoryPick
        | UserStep::EditService(_)
        | UserStep::AddOffer(_)
        | UserStep::EditOffer(_)
        | UserStep::CategoryName
        | UserStep::EditCategoryName
        | UserStep::CategoryPrice
        | UserStep::AddMaster(_)
        | UserStep::EditMaster(_) => admin::on_text(&ctx, session, text).await,
        UserStep::PromoteAdmin | UserStep::DemoteAdmin => owner::on_text(&ctx, session, text).await,
        UserStep::FinanceSetup(_)
        | UserStep::EditCost(_)
        | UserStep::ClientNote
        | UserStep::PeriodStart
        | UserStep::PeriodEnd => finance::on_text(&ctx, session, text).await,
        UserStep::SelectPlan | UserStep::ConfirmPlan | UserStep::EnterReferral => {
            subscription::on_text(&ctx, session, text).await
        }
    }
}

pub async fn handle_callback_at(
    db: &Db,
    user: &User,
    session: &mut UserSession,
    data: &str,
    now: NaiveDateTime,
) -> Result<Reply> {
    let ctx = Ctx { db, user, now };
    let parts: Vec<&str> = data.split(':').collect();
    let prefix = parts.first().copied().unwrap_or_default();

    if let Some(denied) = roles::check(db, user, roles::callback_access(prefix), ctx.today()).await? {
        return Ok(Reply::alert(denied));
    }
    debug!("User {} pressed {}", user.user_id, data);

    match prefix {
        "menu" | "help" | "my" => client::on_callback(&ctx, session, &parts).await,
        "book" => booking::on_callback(&ctx, session, &parts).await,
        "admin" | "adm" | "svc" | "tpl" | "cat" | "off" | "mst" | "apt" => {
            admin::on_callback(&ctx, session, &parts).await
        }
        "owner" | "own" => owner::on_callback(&ctx, session, &parts).await,
        "fin" => finance::on_callback(&ctx, session, &parts).await,
        "sub" => subscription::on_callback(&ctx, session, &parts).await,
        _ => Ok(unknown_action(data)),
    }
}

pub(crate) fn unknown_action(data: &str) -> Reply {
    warn!("Unknown callback data {}", data);
    Reply::alert("Неизвестное действие")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::repo::users::add_user;

    fn noon() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2030, 5, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_amount_and_minutes_parsing() {
        assert_eq!(parse_amount("1 500,50"), Some(1500.5));
        assert_eq!(parse_amount("-3"), None);
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_minutes("45"), Some(45));
        assert_eq!(parse_minutes("0"), None);
        assert_eq!(optional_text(" - "), "");
    }

    #[tokio::test]
    async fn test_command_resets_session() {
        let db = Db::memory();
        let user = add_user(&db, 1, "ann", "Ann", Role::Admin).await.unwrap();
        let mut session = UserSession::new();
        session.begin(UserStep::CategoryName);

        let reply = handle_text_at(&db, &user, &mut session, "/start", noon()).await.unwrap();
        assert!(session.is_idle());
        assert!(reply.text.contains("Ann"));
    }

    #[tokio::test]
    async fn test_client_cannot_open_admin_area() {
        let db = Db::memory();
        let user = add_user(&db, 2, "bob", "Bob", Role::Client).await.unwrap();
        let mut session = UserSession::new();

        let reply = handle_callback_at(&db, &user, &mut session, "svc:add", noon()).await.unwrap();
        assert!(reply.alert.is_some());
        assert!(session.is_idle());

        let reply = handle_text_at(&db, &user, &mut session, "/admin", noon()).await.unwrap();
        assert!(reply.text.starts_with("⛔"));
    }

    #[tokio::test]
    async fn test_revoked_role_stops_dialog() {
        let db = Db::memory();
        let mut user = add_user(&db, 3, "eve", "Eve", Role::Admin).await.unwrap();
        let mut session = UserSession::new();
        handle_callback_at(&db, &user, &mut session, "cat:add", noon()).await.unwrap();
        assert_eq!(session.step, UserStep::CategoryName);

        user.role = Role::Client;
        let reply = handle_text_at(&db, &user, &mut session, "Nails", noon()).await.unwrap();
        assert!(reply.text.starts_with("⛔"));
        assert!(session.is_idle());
    }

    #[tokio::test]
    async fn test_unknown_callback_is_answered() {
        let db = Db::memory();
        let user = add_user(&db, 4, "x", "X", Role::Client).await.unwrap();
        let mut session = UserSession::new();
        let reply = handle_callback_at(&db, &user, &mut session, "bogus:1", noon()).await.unwrap();
        assert_eq!(reply.alert.as_deref(), Some("Неизвестное действие"));
        assert!(reply.text.is_empty());
    }
}
