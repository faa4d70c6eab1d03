use crate::error::Result;
use crate::handlers::{unknown_action, Ctx, Reply};
use crate::keyboards;
use crate::models::Role;
use crate::repo::{appointments, finance, users};
use crate::session::{UserSession, UserStep};
use crate::sheets::format_amount;

pub fn menu() -> Reply {
    Reply::menu("👑 Панель владельца\n\nВыберите действие:", keyboards::owner_menu())
}

async fn admin_list(ctx: &Ctx<'_>) -> Result<Reply> {
    let admins = users::get_users_by_role(ctx.db, Role::Admin).await?;
    if admins.is_empty() {
        return Ok(Reply::menu("Администраторов пока нет.", keyboards::back("owner")));
    }
    let mut text = String::from("👥 Администраторы:\n");
    for admin in admins {
        text.push_str(&format!("\n• {} ({}) - ID {}", admin.full_name, admin.display_name(), admin.user_id));
    }
    Ok(Reply::menu(text, keyboards::back("owner")))
}

async fn statistics(ctx: &Ctx<'_>) -> Result<Reply> {
    let stats = appointments::get_appointments_statistics(ctx.db, None, None, None).await?;
    let all_users = users::get_all_users(ctx.db).await?;
    let admins = all_users.iter().filter(|u| u.role == Role::Admin).count();
    let clients = all_users.iter().filter(|u| u.role == Role::Client).count();

    let mut text = format!(
        "📊 Общая статистика\n\nПользователей: {} (клиентов: {}, администраторов: {})\n\nВсего записей: {}\nОжидают подтверждения: {}\nПодтверждено: {}\nВыполнено: {}\nОплачено: {}\nОтменено: {}\n\nВыручка: {} руб.",
        all_users.len(),
        clients,
        admins,
        stats.total,
        stats.pending,
        stats.confirmed,
        stats.completed,
        stats.paid,
        stats.canceled,
        format_amount(stats.revenue)
    );

    let top: Vec<_> = finance::get_service_popularity(ctx.db)
        .await?
        .into_iter()
        .filter(|p| p.appointment_count > 0)
        .take(3)
        .collect();
    if !top.is_empty() {
        text.push_str("\n\n🏆 Популярные услуги:");
        for (place, service) in top.iter().enumerate() {
            text.push_str(&format!(
                "\n{}. {} - {} записей",
                place + 1,
                service.name,
                service.appointment_count
            ));
        }
    }
    Ok(Reply::menu(text, keyboards::back("owner")))
}

pub async fn on_callback(ctx: &Ctx<'_>, session: &mut UserSession, parts: &[&str]) -> Result<Reply> {
    match parts {
        ["owner"] => {
            session.reset();
            Ok(menu())
        }
        ["own", "promote"] => {
            session.begin(UserStep::PromoteAdmin);
            Ok(Reply::text(
                "Введите Telegram ID пользователя, которого нужно назначить администратором:",
            ))
        }
        ["own", "demote"] => {
            session.begin(UserStep::DemoteAdmin);
            Ok(Reply::text("Введите Telegram ID администратора, которого нужно снять:"))
        }
        ["own", "admins"] => admin_list(ctx).await,
        ["own", "stats"] => statistics(ctx).await,
        _ => Ok(unknown_action(&parts.join(":"))),
    }
}

pub async fn on_text(ctx: &Ctx<'_>, session: &mut UserSession, text: &str) -> Result<Reply> {
    let Ok(user_id) = text.trim().parse::<i64>() else {
        return Ok(Reply::text("ID должен быть числом. Попробуйте еще раз:"));
    };
    let Some(target) = users::get_user(ctx.db, user_id).await? else {
        return Ok(Reply::text(
            "Пользователь не найден. Он должен сначала запустить бота командой /start. Введите другой ID:",
        ));
    };

    let promote = session.step == UserStep::PromoteAdmin;
    session.reset();
    match (promote, target.role) {
        (_, Role::Owner) => Ok(Reply::menu(
            "Нельзя изменить роль владельца.",
            keyboards::owner_menu(),
        )),
        (true, Role::Admin) => Ok(Reply::menu(
            format!("{} уже администратор.", target.display_name()),
            keyboards::owner_menu(),
        )),
        (false, Role::Client) => Ok(Reply::menu(
            format!("{} не является администратором.", target.display_name()),
            keyboards::owner_menu(),
        )),
        (true, Role::Client) => {
            users::update_user_role(ctx.db, user_id, Role::Admin).await?;
            info!("Owner {} promoted {} to admin", ctx.user.user_id, user_id);
            Ok(Reply::menu(
                format!("✅ {} назначен администратором.", target.display_name()),
                keyboards::owner_menu(),
            )
            .notify(
                user_id,
                "🎉 Вам назначена роль администратора. Отправьте /start, чтобы открыть новое меню.",
            ))
        }
        (false, Role::Admin) => {
            users::update_user_role(ctx.db, user_id, Role::Client).await?;
            info!("Owner {} demoted admin {}", ctx.user.user_id, user_id);
            Ok(Reply::menu(
                format!("✅ {} больше не администратор.", target.display_name()),
                keyboards::owner_menu(),
            )
            .notify(user_id, "Ваша роль администратора снята."))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Db;
    use crate::handlers::{handle_callback_at, handle_text_at};
    use crate::repo::users::add_user;
    use chrono::{NaiveDate, NaiveDateTime};

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2030, 6, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn test_promote_and_demote() {
        let db = Db::memory();
        let owner = add_user(&db, 1, "own", "Owner", Role::Owner).await.unwrap();
        add_user(&db, 2, "ann", "Ann", Role::Client).await.unwrap();
        let mut session = UserSession::new();

        handle_callback_at(&db, &owner, &mut session, "own:promote", now()).await.unwrap();
        let reply = handle_text_at(&db, &owner, &mut session, "abc", now()).await.unwrap();
        assert!(reply.text.starts_with("ID должен быть числом"));
        assert_eq!(session.step, UserStep::PromoteAdmin);

        let reply = handle_text_at(&db, &owner, &mut session, "2", now()).await.unwrap();
        assert_eq!(reply.notices[0].chat_id, 2);
        assert_eq!(users::get_user(&db, 2).await.unwrap().unwrap().role, Role::Admin);

        handle_callback_at(&db, &owner, &mut session, "own:demote", now()).await.unwrap();
        handle_text_at(&db, &owner, &mut session, "2", now()).await.unwrap();
        assert_eq!(users::get_user(&db, 2).await.unwrap().unwrap().role, Role::Client);
        assert!(session.is_idle());
    }

    #[tokio::test]
    async fn test_owner_role_cannot_be_changed() {
        let db = Db::memory();
        let owner = add_user(&db, 1, "own", "Owner", Role::Owner).await.unwrap();
        let mut session = UserSession::new();
        handle_callback_at(&db, &owner, &mut session, "own:demote", now()).await.unwrap();
        let reply = handle_text_at(&db, &owner, &mut session, "1", now()).await.unwrap();
        assert_eq!(reply.text, "Нельзя изменить роль владельца.");
        assert_eq!(users::get_user(&db, 1).await.unwrap().unwrap().role, Role::Owner);
    }

    #[tokio::test]
    async fn test_admins_cannot_open_owner_panel() {
        let db = Db::memory();
        let admin = add_user(&db, 3, "adm", "Adm", Role::Admin).await.unwrap();
        let mut session = UserSession::new();
        let reply = handle_callback_at(&db, &admin, &mut session, "own:stats", now()).await.unwrap();
        assert!(reply.alert.is_some());
    }
}
