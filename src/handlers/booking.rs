//! Booking dialog: category, service, master, date, time, confirmation.

use chrono::NaiveDate;

use crate::error::Result;
use crate::handlers::{unknown_action, Ctx, Reply};
use crate::keyboards;
use crate::models::{format_date, parse_date, AppointmentStatus};
use crate::repo::{appointments, masters, services};
use crate::session::{BookingStep, UserSession, UserStep};
use crate::sheets::{format_amount, same_id};

const STALE: &str = "Данные записи устарели, начните заново";

pub async fn start(ctx: &Ctx<'_>, session: &mut UserSession) -> Result<Reply> {
    session.begin(UserStep::Booking(BookingStep::Category));

    let all = services::get_all_services(ctx.db).await?;
    if all.is_empty() {
        session.reset();
        return Ok(Reply::menu(
            "Пока нет доступных услуг. Попробуйте позже.",
            keyboards::to_main_menu(),
        ));
    }
    let categories: Vec<_> = services::get_all_categories(ctx.db)
        .await?
        .into_iter()
        .filter(|c| {
            all.iter()
                .any(|s| s.category_id.as_deref().is_some_and(|cid| same_id(cid, &c.id)))
        })
        .collect();
    let with_uncategorized = all.iter().any(|s| s.category_id.is_none());

    Ok(Reply::menu(
        "Выберите категорию услуг:",
        keyboards::booking_categories(&categories, with_uncategorized),
    ))
}

async fn show_services(ctx: &Ctx<'_>, session: &mut UserSession) -> Result<Reply> {
    let Some(category) = session.form.category_id.clone() else {
        return start(ctx, session).await;
    };
    let wanted = (category != "none").then_some(category.as_str());
    let in_category = services::get_services_in_category(ctx.db, wanted).await?;
    if in_category.is_empty() {
        return Ok(Reply::alert("В данной категории нет услуг."));
    }
    session.advance(UserStep::Booking(BookingStep::Service));
    Ok(Reply::menu("Выберите услугу:", keyboards::booking_services(&in_category)))
}

async fn show_masters(ctx: &Ctx<'_>, session: &mut UserSession) -> Result<Reply> {
    let Some(service_id) = session.form.service_id.clone() else {
        return Ok(Reply::alert(STALE));
    };
    let available = masters::masters_for_service(ctx.db, &service_id).await?;
    if available.is_empty() {
        return Ok(Reply::alert("Нет доступных мастеров для данной услуги."));
    }
    session.advance(UserStep::Booking(BookingStep::Master));
    Ok(Reply::menu("Выберите мастера:", keyboards::booking_masters(&available)))
}

fn ask_date(ctx: &Ctx<'_>, session: &mut UserSession) -> Reply {
    session.advance(UserStep::Booking(BookingStep::Date));
    Reply::menu(
        "Выберите дату или введите её в формате ГГГГ-ММ-ДД:",
        keyboards::booking_dates(ctx.today()),
    )
}

/// Free slots of the chosen master; today's past times are dropped.
async fn free_slots(ctx: &Ctx<'_>, master_id: &str, date: NaiveDate) -> Result<Vec<String>> {
    let mut slots = masters::get_master_availability(ctx.db, master_id, date).await?;
    if date == ctx.today() {
        let current = ctx.now.format("%H:%M").to_string();
        slots.retain(|slot| *slot > current);
    }
    Ok(slots)
}

async fn select_date(ctx: &Ctx<'_>, session: &mut UserSession, date: NaiveDate) -> Result<Reply> {
    if date < ctx.today() {
        return Ok(Reply::menu(
            "Нельзя записаться на прошедшую дату. Выберите другую дату:",
            keyboards::booking_dates(ctx.today()),
        ));
    }
    let Some(master_id) = session.form.master_id.clone() else {
        return Ok(Reply::alert(STALE));
    };
    let slots = free_slots(ctx, &master_id, date).await?;
    if slots.is_empty() {
        session.advance(UserStep::Booking(BookingStep::Date));
        return Ok(Reply::menu(
            "Нет доступного времени на выбранную дату. Пожалуйста, выберите другую дату.",
            keyboards::booking_dates(ctx.today()),
        ));
    }
    session.form.date = Some(date);
    session.advance(UserStep::Booking(BookingStep::Time));
    Ok(Reply::menu(
        format!("Свободное время на {}:", format_date(date)),
        keyboards::booking_times(&slots),
    ))
}

async fn select_time(ctx: &Ctx<'_>, session: &mut UserSession, time: String) -> Result<Reply> {
    let (Some(master_id), Some(date)) = (session.form.master_id.clone(), session.form.date) else {
        return Ok(Reply::alert(STALE));
    };
    if !free_slots(ctx, &master_id, date).await?.contains(&time) {
        return Ok(Reply::alert("Это время уже занято, выберите другое"));
    }
    session.form.time = Some(time);
    session.advance(UserStep::Booking(BookingStep::Confirm));
    summary(ctx, session).await
}

async fn summary(ctx: &Ctx<'_>, session: &UserSession) -> Result<Reply> {
    let form = &session.form;
    let (Some(service_id), Some(master_id), Some(date), Some(time)) =
        (&form.service_id, &form.master_id, form.date, &form.time)
    else {
        return Ok(Reply::alert(STALE));
    };
    let service = services::get_service(ctx.db, service_id).await?;
    let master = masters::get_master(ctx.db, master_id).await?;
    let (Some(service), Some(master)) = (service, master) else {
        return Ok(Reply::menu(
            "Ошибка: услуга или мастер не найдены. Пожалуйста, начните заново.",
            keyboards::to_main_menu(),
        ));
    };

    let mut text = format!(
        "Подтвердите запись:\n\nУслуга: {}\nЦена: {} руб.\nДлительность: {} мин.\nМастер: {}\nДата: {}\nВремя: {}",
        service.name,
        format_amount(service.price),
        service.duration,
        master.name,
        format_date(date),
        time
    );
    if !master.address.is_empty() {
        text.push_str(&format!("\nАдрес: {}", master.address));
    }
    Ok(Reply::menu(text, keyboards::booking_confirm()))
}

async fn confirm(ctx: &Ctx<'_>, session: &mut UserSession) -> Result<Reply> {
    let form = session.form.clone();
    let (Some(service_id), Some(master_id), Some(date), Some(time)) =
        (form.service_id, form.master_id, form.date, form.time)
    else {
        return Ok(Reply::alert(STALE));
    };
    if !free_slots(ctx, &master_id, date).await?.contains(&time) {
        session.form.time = None;
        return select_date(ctx, session, date)
            .await
            .map(|r| r.with_alert("Это время только что заняли, выберите другое"));
    }

    let appointment =
        appointments::add_appointment(ctx.db, ctx.user.user_id, &service_id, &master_id, date, &time)
            .await?;
    session.reset();

    let status_line = match appointment.status {
        AppointmentStatus::Confirmed => "Запись подтверждена. Ждём вас!",
        _ => "Запись ожидает подтверждения администратора.",
    };
    let mut reply = Reply::menu(
        format!(
            "✅ Запись успешно создана!\n\nДата: {}\nВремя: {}\n{}",
            format_date(date),
            time,
            status_line
        ),
        keyboards::to_main_menu(),
    );

    let service_name = services::get_service(ctx.db, &service_id)
        .await?
        .map(|s| s.name)
        .unwrap_or_default();
    let master = masters::get_master(ctx.db, &master_id).await?;
    if let Some(chat_id) = master.and_then(|m| m.telegram_id) {
        reply = reply.notify(
            chat_id,
            format!(
                "📅 Новая запись!\n\nКлиент: {}\nУслуга: {}\nДата: {}\nВремя: {}",
                ctx.user.display_name(),
                service_name,
                format_date(date),
                time
            ),
        );
    }
    Ok(reply)
}

pub async fn on_callback(ctx: &Ctx<'_>, session: &mut UserSession, parts: &[&str]) -> Result<Reply> {
    match parts {
        ["book"] => start(ctx, session).await,
        ["book", "cat", id] => {
            session.form.category_id = Some(id.to_string());
            session.form.service_id = None;
            show_services(ctx, session).await
        }
        ["book", "svc", id] => {
            if services::get_service(ctx.db, id).await?.is_none() {
                return Ok(Reply::alert("Услуга не найдена."));
            }
            session.form.service_id = Some(id.to_string());
            session.form.master_id = None;
            show_masters(ctx, session).await
        }
        ["book", "master", id] => {
            if session.form.service_id.is_none() {
                return Ok(Reply::alert(STALE));
            }
            session.form.master_id = Some(id.to_string());
            session.form.date = None;
            Ok(ask_date(ctx, session))
        }
        ["book", "date", raw] => match parse_date(raw) {
            Some(date) => select_date(ctx, session, date).await,
            None => Ok(Reply::alert("Неверная дата")),
        },
        // "HH:MM" arrives split on the colon
        ["book", "time", hours, minutes] => select_time(ctx, session, format!("{}:{}", hours, minutes)).await,
        ["book", "back", "cat"] => start(ctx, session).await,
        ["book", "back", "svc"] => show_services(ctx, session).await,
        ["book", "back", "master"] => show_masters(ctx, session).await,
        ["book", "back", "date"] => Ok(ask_date(ctx, session)),
        ["book", "back", "time"] => match session.form.date {
            Some(date) => select_date(ctx, session, date).await,
            None => Ok(ask_date(ctx, session)),
        },
        ["book", "confirm"] => confirm(ctx, session).await,
        ["book", "cancel"] => {
            session.reset();
            Ok(Reply::menu("Запись отменена.", keyboards::to_main_menu()))
        }
        _ => Ok(unknown_action(&parts.join(":"))),
    }
}

pub async fn on_text(
    ctx: &Ctx<'_>,
    session: &mut UserSession,
    step: BookingStep,
    text: &str,
) -> Result<Reply> {
    match step {
        BookingStep::Date => match parse_date(text) {
            Some(date) => select_date(ctx, session, date).await,
            None => Ok(Reply::text(
                "Неверный формат даты. Пожалуйста, введите дату в формате ГГГГ-ММ-ДД.",
            )),
        },
        _ => Ok(Reply::text("Пожалуйста, воспользуйтесь кнопками выше.")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Db;
    use crate::handlers::{handle_callback_at, handle_text_at};
    use crate::models::{uniform_working_hours, Role, User};
    use crate::repo::masters::{add_master, update_master_working_hours, MasterPatch};
    use crate::repo::services::{add_category, add_service};
    use crate::repo::users::add_user;
    use chrono::NaiveDateTime;

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2030, 1, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    async fn salon() -> (Db, User, String, String) {
        let db = Db::memory();
        let user = add_user(&db, 5, "ann", "Ann", Role::Client).await.unwrap();
        let category = add_category(&db, "Nails").await.unwrap();
        let service = add_service(&db, "Manicure", "", 1500.0, 60, Some(category.id.clone()))
            .await
            .unwrap();
        let master = add_master(&db, "Olga", MasterPatch::default()).await.unwrap();
        update_master_working_hours(&db, &master.id, uniform_working_hours("10:00", "12:00"))
            .await
            .unwrap();
        (db, user, service.id, master.id)
    }

    #[tokio::test]
    async fn test_today_hides_past_slots() {
        let (db, user, service_id, master_id) = salon().await;
        let mut session = UserSession::new();
        let now = at(7, 10, 45);
        for data in ["book:cat:1".to_string(), format!("book:svc:{}", service_id), format!("book:master:{}", master_id)] {
            handle_callback_at(&db, &user, &mut session, &data, now).await.unwrap();
        }
        let reply = handle_text_at(&db, &user, &mut session, "2030-01-07", now).await.unwrap();
        assert_eq!(session.step, UserStep::Booking(BookingStep::Time));
        let slots: Vec<String> = reply
            .markup
            .unwrap()
            .inline_keyboard
            .into_iter()
            .flatten()
            .map(|b| b.text)
            .collect();
        assert_eq!(slots, vec!["11:00", "11:30", "⬅️ Назад"]);
    }

    #[tokio::test]
    async fn test_past_and_malformed_dates_keep_step() {
        let (db, user, service_id, master_id) = salon().await;
        let mut session = UserSession::new();
        let now = at(7, 9, 0);
        handle_callback_at(&db, &user, &mut session, "book:cat:1", now).await.unwrap();
        handle_callback_at(&db, &user, &mut session, &format!("book:svc:{}", service_id), now)
            .await
            .unwrap();
        handle_callback_at(&db, &user, &mut session, &format!("book:master:{}", master_id), now)
            .await
            .unwrap();

        let reply = handle_text_at(&db, &user, &mut session, "07.01.2030", now).await.unwrap();
        assert!(reply.text.starts_with("Неверный формат даты"));
        let reply = handle_text_at(&db, &user, &mut session, "2030-01-06", now).await.unwrap();
        assert!(reply.text.starts_with("Нельзя записаться"));
        assert_eq!(session.step, UserStep::Booking(BookingStep::Date));
    }

    #[tokio::test]
    async fn test_taken_slot_is_rejected() {
        let (db, user, service_id, master_id) = salon().await;
        let date = NaiveDate::from_ymd_opt(2030, 1, 8).unwrap();
        appointments::add_appointment(&db, 9, &service_id, &master_id, date, "10:00")
            .await
            .unwrap();

        let mut session = UserSession::new();
        session.begin(UserStep::Booking(BookingStep::Time));
        session.form.service_id = Some(service_id);
        session.form.master_id = Some(master_id);
        session.form.date = Some(date);

        let reply = handle_callback_at(&db, &user, &mut session, "book:time:10:00", at(7, 9, 0))
            .await
            .unwrap();
        assert_eq!(reply.alert.as_deref(), Some("Это время уже занято, выберите другое"));
        assert_eq!(session.step, UserStep::Booking(BookingStep::Time));
    }
}
