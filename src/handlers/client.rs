use crate::error::Result;
use crate::handlers::{booking, unknown_action, Ctx, Reply};
use crate::keyboards;
use crate::models::{format_date, AppointmentStatus, Role, User};
use crate::repo::{appointments, masters, subscriptions};
use crate::session::UserSession;
use crate::sheets::format_amount;

pub async fn start(ctx: &Ctx<'_>) -> Result<Reply> {
    let name = if ctx.user.full_name.is_empty() {
        ctx.user.display_name()
    } else {
        ctx.user.full_name.clone()
    };
    let text = format!(
        "Здравствуйте, {}! 👋\n\nДобро пожаловать в систему записи. Выберите действие:",
        name
    );
    Ok(Reply::menu(text, main_menu(ctx).await?))
}

async fn main_menu(ctx: &Ctx<'_>) -> Result<teloxide::types::InlineKeyboardMarkup> {
    let subscribed = ctx.user.role == Role::Admin
        && subscriptions::is_subscribed(ctx.db, ctx.user.user_id, ctx.today()).await?;
    Ok(keyboards::main_menu(ctx.user.role, subscribed))
}

pub fn help(user: &User) -> Reply {
    let mut text = String::from(
        "Доступные команды:\n\
         /start - главное меню\n\
         /book - записаться на услугу\n\
         /appointments - мои записи\n\
         /help - эта справка",
    );
    if user.role.is_staff() {
        text.push_str("\n/admin - панель администратора\n/finance - финансы и аналитика");
    }
    if user.role == Role::Admin {
        text.push_str("\n/subscription - подписка");
    }
    if user.role == Role::Owner {
        text.push_str("\n/owner - панель владельца");
    }
    Reply::menu(text, keyboards::to_main_menu())
}

pub async fn my_appointments(ctx: &Ctx<'_>) -> Result<Reply> {
    let views = appointments::get_user_appointments(ctx.db, ctx.user.user_id).await?;
    if views.is_empty() {
        return Ok(Reply::menu("У вас нет записей.", keyboards::to_main_menu()));
    }

    let mut text = String::from("📋 Ваши записи:\n");
    for view in &views {
        let a = &view.appointment;
        text.push_str(&format!(
            "\n{} {} - {} ({} руб.)\nМастер: {}\nСтатус: {}\n",
            format_date(a.date),
            a.time,
            view.service_name,
            format_amount(view.service_price),
            view.master_name,
            a.status.label()
        ));
    }
    let own: Vec<_> = views.into_iter().map(|v| v.appointment).collect();
    Ok(Reply::menu(text, keyboards::my_appointments(&own)))
}

async fn cancel_own(ctx: &Ctx<'_>, appointment_id: &str) -> Result<Reply> {
    let Some(appointment) = appointments::get_appointment(ctx.db, appointment_id).await? else {
        return Ok(Reply::alert("Запись не найдена"));
    };
    if appointment.user_id != ctx.user.user_id {
        warn!(
            "User {} tried to cancel appointment {} of another user",
            ctx.user.user_id, appointment_id
        );
        return Ok(Reply::alert("Запись не найдена"));
    }
    if !appointment.status.is_open() {
        return Ok(Reply::alert("Эту запись уже нельзя отменить"));
    }

    appointments::update_appointment_status(ctx.db, &appointment.id, AppointmentStatus::Canceled)
        .await?;
    info!("User {} canceled appointment {}", ctx.user.user_id, appointment.id);

    let mut reply = my_appointments(ctx).await?.with_alert("Запись отменена");
    let master = masters::get_master(ctx.db, &appointment.master_id).await?;
    if let Some(chat_id) = master.and_then(|m| m.telegram_id) {
        reply = reply.notify(
            chat_id,
            format!(
                "❌ Клиент {} отменил запись на {} {}",
                ctx.user.display_name(),
                format_date(appointment.date),
                appointment.time
            ),
        );
    }
    Ok(reply)
}

pub async fn on_callback(ctx: &Ctx<'_>, session: &mut UserSession, parts: &[&str]) -> Result<Reply> {
    match parts {
        ["menu"] => {
            session.reset();
            Ok(Reply::menu("Главное меню:", main_menu(ctx).await?))
        }
        ["help"] => Ok(help(ctx.user)),
        ["my"] => {
            session.reset();
            my_appointments(ctx).await
        }
        ["my", "cancel", id] => cancel_own(ctx, id).await,
        ["book"] => booking::start(ctx, session).await,
        _ => Ok(unknown_action(&parts.join(":"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Db;
    use crate::handlers::handle_callback_at;
    use crate::repo::masters::{add_master, MasterPatch};
    use crate::repo::services::add_service;
    use crate::repo::users::add_user;
    use chrono::{NaiveDate, NaiveDateTime};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2030, 5, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn test_client_cancels_only_own_open_appointment() {
        let db = Db::memory();
        let ann = add_user(&db, 1, "ann", "Ann", Role::Client).await.unwrap();
        let bob = add_user(&db, 2, "bob", "Bob", Role::Client).await.unwrap();
        let service = add_service(&db, "Cut", "", 1000.0, 60, None).await.unwrap();
        let patch = MasterPatch {
            telegram_id: Some(77),
            ..Default::default()
        };
        let master = add_master(&db, "Olga", patch).await.unwrap();
        let date = NaiveDate::from_ymd_opt(2099, 1, 5).unwrap();
        let booked = appointments::add_appointment(&db, 1, &service.id, &master.id, date, "10:00")
            .await
            .unwrap();

        let mut session = UserSession::new();
        let data = format!("my:cancel:{}", booked.id);
        let foreign = handle_callback_at(&db, &bob, &mut session, &data, now()).await.unwrap();
        assert_eq!(foreign.alert.as_deref(), Some("Запись не найдена"));

        let own = handle_callback_at(&db, &ann, &mut session, &data, now()).await.unwrap();
        assert_eq!(own.alert.as_deref(), Some("Запись отменена"));
        assert_eq!(own.notices.len(), 1);
        assert_eq!(own.notices[0].chat_id, 77);

        let stored = appointments::get_appointment(&db, &booked.id).await.unwrap().unwrap();
        assert_eq!(stored.status, AppointmentStatus::Canceled);

        let again = handle_callback_at(&db, &ann, &mut session, &data, now()).await.unwrap();
        assert_eq!(again.alert.as_deref(), Some("Эту запись уже нельзя отменить"));
    }

    #[tokio::test]
    async fn test_empty_appointment_list() {
        let db = Db::memory();
        let ann = add_user(&db, 1, "ann", "Ann", Role::Client).await.unwrap();
        let mut session = UserSession::new();
        let reply = handle_callback_at(&db, &ann, &mut session, "my", now()).await.unwrap();
        assert_eq!(reply.text, "У вас нет записей.");
    }
}
