use chrono::{NaiveDate, NaiveDateTime};

use salonbot::db::Db;
use salonbot::handlers::{handle_callback_at, handle_text_at, Reply};
use salonbot::models::{AppointmentStatus, Role, User};
use salonbot::repo::masters::{add_master, MasterPatch};
use salonbot::repo::{appointments, finance, services, users};
use salonbot::session::UserSession;

fn at(day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2099, 1, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

struct Chat<'a> {
    db: &'a Db,
    user: User,
    session: UserSession,
    now: NaiveDateTime,
}

impl<'a> Chat<'a> {
    fn new(db: &'a Db, user: User, now: NaiveDateTime) -> Self {
        Chat {
            db,
            user,
            session: UserSession::new(),
            now,
        }
    }

    async fn say(&mut self, text: &str) -> Reply {
        handle_text_at(self.db, &self.user, &mut self.session, text, self.now)
            .await
            .unwrap()
    }

    async fn press(&mut self, data: &str) -> Reply {
        handle_callback_at(self.db, &self.user, &mut self.session, data, self.now)
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn test_service_booking_payment_and_report() {
    let db = Db::memory();
    let owner = users::add_user(&db, 1, "boss", "Boss", Role::Owner).await.unwrap();
    let client = users::add_user(&db, 2, "ann", "Ann", Role::Client).await.unwrap();
    let mut owner = Chat::new(&db, owner, at(1, 9));
    let mut client = Chat::new(&db, client, at(1, 9));

    owner.press("svc:add").await;
    for answer in ["Стрижка", "-", "1500", "60"] {
        owner.say(answer).await;
    }
    let reply = owner.press("svc:newcat:none").await;
    assert_eq!(reply.alert.as_deref(), Some("✅ Услуга добавлена"));
    let service = services::get_all_services(&db).await.unwrap().remove(0);
    assert_eq!(service.price, 1500.0);

    let patch = MasterPatch {
        telegram_id: Some(77),
        ..Default::default()
    };
    let master = add_master(&db, "Olga", patch).await.unwrap();

    client.press("book").await;
    client.press("book:cat:none").await;
    client.press(&format!("book:svc:{}", service.id)).await;
    client.press(&format!("book:master:{}", master.id)).await;
    let times = client.say("2099-01-05").await;
    assert!(times.text.starts_with("Свободное время на 2099-01-05"));
    let summary = client.press("book:time:10:00").await;
    assert!(summary.text.contains("Мастер: Olga"));
    let done = client.press("book:confirm").await;
    assert!(done.text.starts_with("✅ Запись успешно создана!"));
    assert_eq!(done.notices[0].chat_id, 77);
    assert!(client.session.is_idle());

    // the slot is gone for a second booking
    client.press("book").await;
    client.press("book:cat:none").await;
    client.press(&format!("book:svc:{}", service.id)).await;
    client.press(&format!("book:master:{}", master.id)).await;
    client.press("book:date:2099-01-05").await;
    let taken = client.press("book:time:10:00").await;
    assert_eq!(taken.alert.as_deref(), Some("Это время уже занято, выберите другое"));

    let booked = appointments::get_user_appointments(&db, 2).await.unwrap();
    assert_eq!(booked.len(), 1);
    let id = booked[0].appointment.id.clone();
    assert_eq!(booked[0].appointment.status, AppointmentStatus::Pending);

    owner.now = at(5, 20);
    let confirmed = owner.press(&format!("apt:confirm:{}", id)).await;
    assert_eq!(confirmed.notices[0].chat_id, 2);
    assert!(appointments::is_user_verified(&db, 2).await.unwrap());

    let paid = owner.press(&format!("apt:paid:{}", id)).await;
    assert!(paid.text.contains("1500 руб."));
    let again = owner.press(&format!("apt:paid:{}", id)).await;
    assert_eq!(again.alert.as_deref(), Some("Запись уже оплачена"));

    let report = owner.press("fin:period:today").await;
    assert!(report.text.contains("Общий доход: 1500 руб."));
    assert!(report.text.contains("Количество записей: 1"));

    let stats = finance::get_client_stats(&db, 2).await.unwrap();
    assert_eq!(stats.total_visits, 1);
    assert_eq!(stats.total_spent, 1500.0);
}

#[tokio::test]
async fn test_admin_needs_subscription_for_finance() {
    let db = Db::memory();
    let admin = users::add_user(&db, 3, "adm", "Adm", Role::Admin).await.unwrap();
    let mut admin = Chat::new(&db, admin, at(1, 12));

    let denied = admin.press("fin").await;
    assert!(denied.alert.as_deref().unwrap_or_default().starts_with("💳"));

    admin.press("sub:trial").await;
    let menu = admin.press("fin").await;
    assert!(menu.text.starts_with("📊 Финансы и аналитика"));
}

#[tokio::test]
async fn test_category_dialog_and_client_denial() {
    let db = Db::memory();
    let admin = users::add_user(&db, 3, "adm", "Adm", Role::Admin).await.unwrap();
    let client = users::add_user(&db, 4, "cli", "Cli", Role::Client).await.unwrap();
    let mut admin = Chat::new(&db, admin, at(1, 12));
    let mut client = Chat::new(&db, client, at(1, 12));

    admin.press("cat:add").await;
    let saved = admin.say("Ногти").await;
    assert_eq!(saved.text, "✅ Категория «Ногти» сохранена");
    let categories = services::get_all_categories(&db).await.unwrap();
    assert!(categories.iter().any(|c| c.name == "Ногти"));

    let denied = client.press("cat:add").await;
    assert!(denied.alert.is_some());
    assert!(client.session.is_idle());
}
