//! Inline keyboards for every menu of the bot.

use chrono::{Duration, NaiveDate};
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::models::{
    format_date, Appointment, AppointmentStatus, Category, Master, Offer, Role, Service,
};
use crate::repo::finance::VipClient;
use crate::repo::subscriptions::{plan_discount, plan_price, PLAN_MONTHS};
use crate::sheets::{format_amount, same_id};

const MAX_LABEL: usize = 30;

/// Shortens a label to fit a button.
pub fn truncate(label: &str) -> String {
    if label.chars().count() <= MAX_LABEL {
        return label.to_string();
    }
    let mut short: String = label.chars().take(MAX_LABEL - 3).collect();
    short.push_str("...");
    short
}

pub fn btn(label: &str, data: impl Into<String>) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(truncate(label), data.into())
}

fn row(label: &str, data: impl Into<String>) -> Vec<InlineKeyboardButton> {
    vec![btn(label, data)]
}

fn chunked(buttons: Vec<InlineKeyboardButton>, per_row: usize) -> Vec<Vec<InlineKeyboardButton>> {
    buttons
        .chunks(per_row.max(1))
        .map(|chunk| chunk.to_vec())
        .collect()
}

pub fn back(data: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![row("⬅️ Назад", data)])
}

pub fn to_main_menu() -> InlineKeyboardMarkup {
    back("menu")
}

// Главное меню
pub fn main_menu(role: Role, subscribed: bool) -> InlineKeyboardMarkup {
    let mut rows = vec![row("📝 Записаться", "book"), row("📋 Мои записи", "my")];
    match role {
        Role::Admin => {
            if subscribed {
                rows.push(row("📊 Финансы и аналитика", "fin"));
            }
            rows.push(row("📱 Подписка", "sub"));
            rows.push(row("⚙️ Панель администратора", "admin"));
        }
        Role::Owner => {
            rows.push(row("📊 Финансы и аналитика", "fin"));
            rows.push(row("⚙️ Панель администратора", "admin"));
            rows.push(row("👑 Панель владельца", "owner"));
        }
        Role::Client => {}
    }
    rows.push(row("❓ Помощь", "help"));
    InlineKeyboardMarkup::new(rows)
}

pub fn my_appointments(appointments: &[Appointment]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = appointments
        .iter()
        .filter(|a| a.status.is_open())
        .map(|a| {
            row(
                &format!("❌ Отменить {} {}", format_date(a.date), a.time),
                format!("my:cancel:{}", a.id),
            )
        })
        .collect();
    rows.push(row("⬅️ Назад", "menu"));
    InlineKeyboardMarkup::new(rows)
}

// Запись
pub fn booking_categories(categories: &[Category], with_uncategorized: bool) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = categories
        .iter()
        .map(|c| row(&c.name, format!("book:cat:{}", c.id)))
        .collect();
    if with_uncategorized {
        rows.push(row(crate::repo::services::UNCATEGORIZED, "book:cat:none"));
    }
    rows.push(row("⬅️ Назад", "menu"));
    InlineKeyboardMarkup::new(rows)
}

pub fn booking_services(services: &[Service]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = services
        .iter()
        .map(|s| {
            row(
                &format!("{} - {} руб.", s.name, format_amount(s.price)),
                format!("book:svc:{}", s.id),
            )
        })
        .collect();
    rows.push(row("⬅️ Назад", "book:back:cat"));
    InlineKeyboardMarkup::new(rows)
}

pub fn booking_masters(masters: &[Master]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = masters
        .iter()
        .map(|m| row(&m.name, format!("book:master:{}", m.id)))
        .collect();
    rows.push(row("⬅️ Назад", "book:back:svc"));
    InlineKeyboardMarkup::new(rows)
}

/// The next week as quick picks; other dates are typed.
pub fn booking_dates(today: NaiveDate) -> InlineKeyboardMarkup {
    let dates: Vec<InlineKeyboardButton> = (0..7)
        .map(|offset| {
            let date = today + Duration::days(offset);
            btn(&date.format("%d.%m").to_string(), format!("book:date:{}", format_date(date)))
        })
        .collect();
    let mut rows = chunked(dates, 4);
    rows.push(row("⬅️ Назад", "book:back:master"));
    InlineKeyboardMarkup::new(rows)
}

pub fn booking_times(slots: &[String]) -> InlineKeyboardMarkup {
    let times = slots
        .iter()
        .map(|slot| btn(slot, format!("book:time:{}", slot)))
        .collect();
    let mut rows = chunked(times, 4);
    rows.push(row("⬅️ Назад", "book:back:date"));
    InlineKeyboardMarkup::new(rows)
}

pub fn booking_confirm() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        row("✅ Подтвердить", "book:confirm"),
        row("⬅️ Назад", "book:back:time"),
        row("❌ Отменить", "book:cancel"),
    ])
}

// Панель администратора
pub fn admin_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        row("🛠️ Управление услугами", "adm:services"),
        row("📁 Управление категориями", "adm:categories"),
        row("🎁 Управление спец. предложениями", "adm:offers"),
        row("👨‍💼 Управление мастерами", "adm:masters"),
        row("📅 Управление записями", "adm:appts"),
        row("⬅️ Главное меню", "menu"),
    ])
}

pub fn services_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        row("➕ Добавить услугу", "svc:add"),
        row("📋 Просмотреть услуги", "svc:list"),
        row("📦 Шаблоны услуг", "tpl:list"),
        row("🔙 Назад", "admin"),
    ])
}

/// Category buckets of the service list.
pub fn service_groups(categories: &[Category], with_uncategorized: bool) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = categories
        .iter()
        .map(|c| row(&c.name, format!("svc:cat:{}", c.id)))
        .collect();
    if with_uncategorized {
        rows.push(row(crate::repo::services::UNCATEGORIZED, "svc:cat:none"));
    }
    rows.push(row("🔙 Назад", "adm:services"));
    InlineKeyboardMarkup::new(rows)
}

pub fn service_list(services: &[Service]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = services
        .iter()
        .map(|s| row(&s.name, format!("svc:view:{}", s.id)))
        .collect();
    rows.push(row("🔙 Назад к списку услуг", "svc:list"));
    InlineKeyboardMarkup::new(rows)
}

pub fn service_card(service_id: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        row("✏️ Редактировать", format!("svc:edit:{}", service_id)),
        row("❌ Удалить", format!("svc:del:{}", service_id)),
        row("🔙 Назад к списку услуг", "svc:list"),
    ])
}

pub fn service_fields(service_id: &str) -> InlineKeyboardMarkup {
    let fields = [
        ("✏️ Название", "name"),
        ("✏️ Описание", "description"),
        ("✏️ Цена", "price"),
        ("✏️ Длительность", "duration"),
        ("✏️ Категория", "category"),
    ];
    let mut rows: Vec<Vec<InlineKeyboardButton>> = fields
        .iter()
        .map(|(label, field)| row(label, format!("svc:edit:{}:{}", service_id, field)))
        .collect();
    rows.push(row("🔙 Назад", format!("svc:view:{}", service_id)));
    InlineKeyboardMarkup::new(rows)
}

/// Category choice at the end of the add-service wizard.
pub fn new_service_category(categories: &[Category]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = categories
        .iter()
        .map(|c| row(&c.name, format!("svc:newcat:{}", c.id)))
        .collect();
    rows.push(row(crate::repo::services::UNCATEGORIZED, "svc:newcat:none"));
    InlineKeyboardMarkup::new(rows)
}

pub fn service_category_choice(service_id: &str, categories: &[Category]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = categories
        .iter()
        .map(|c| row(&c.name, format!("svc:setcat:{}:{}", service_id, c.id)))
        .collect();
    rows.push(row(
        crate::repo::services::UNCATEGORIZED,
        format!("svc:setcat:{}:none", service_id),
    ));
    rows.push(row("🔙 Назад", format!("svc:edit:{}", service_id)));
    InlineKeyboardMarkup::new(rows)
}

/// Yes/no pair; "yes" appends `:yes` to `action`.
pub fn confirm_delete(action: &str, cancel: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        row("✅ Да, удалить", format!("{}:yes", action)),
        row("❌ Нет, отмена", cancel),
    ])
}

pub fn templates(categories: &[String]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = categories
        .iter()
        .enumerate()
        .map(|(i, name)| row(&format!("➕ {}", name), format!("tpl:add:{}", i)))
        .collect();
    rows.push(row("🔙 Назад", "adm:services"));
    InlineKeyboardMarkup::new(rows)
}

pub fn template_added(category_id: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        row("💰 Установить цену для всех", format!("tpl:price:{}", category_id)),
        row("🔙 Назад", "adm:services"),
    ])
}

pub fn categories_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        row("➕ Добавить категорию", "cat:add"),
        row("📋 Просмотреть категории", "cat:list"),
        row("🔙 Назад", "admin"),
    ])
}

pub fn category_list(categories: &[Category]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = categories
        .iter()
        .map(|c| row(&c.name, format!("cat:view:{}", c.id)))
        .collect();
    rows.push(row("🔙 Назад", "adm:categories"));
    InlineKeyboardMarkup::new(rows)
}

pub fn category_card(category_id: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        row("✏️ Название", format!("cat:rename:{}", category_id)),
        row("💰 Цена для всех услуг", format!("tpl:price:{}", category_id)),
        row("❌ Удалить", format!("cat:del:{}", category_id)),
        row("🔙 Назад к списку категорий", "cat:list"),
    ])
}

pub fn offers_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        row("➕ Добавить спец. предложение", "off:add"),
        row("📋 Просмотреть спец. предложения", "off:list"),
        row("🔙 Назад", "admin"),
    ])
}

pub fn offer_list(offers: &[Offer]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = offers
        .iter()
        .map(|o| row(&o.name, format!("off:view:{}", o.id)))
        .collect();
    rows.push(row("🔙 Назад", "adm:offers"));
    InlineKeyboardMarkup::new(rows)
}

pub fn offer_card(offer_id: &str) -> InlineKeyboardMarkup {
    let fields = [
        ("✏️ Название", "name"),
        ("✏️ Описание", "description"),
        ("✏️ Цена", "price"),
        ("✏️ Длительность", "duration"),
    ];
    let mut rows: Vec<Vec<InlineKeyboardButton>> = fields
        .iter()
        .map(|(label, field)| row(label, format!("off:edit:{}:{}", offer_id, field)))
        .collect();
    rows.push(row("❌ Удалить", format!("off:del:{}", offer_id)));
    rows.push(row("🔙 Назад к списку предложений", "off:list"));
    InlineKeyboardMarkup::new(rows)
}

pub fn masters_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        row("➕ Добавить мастера", "mst:add"),
        row("📋 Просмотреть мастеров", "mst:list"),
        row("🔙 Назад", "admin"),
    ])
}

pub fn master_list(masters: &[Master]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = masters
        .iter()
        .map(|m| row(&m.name, format!("mst:view:{}", m.id)))
        .collect();
    rows.push(row("🔙 Назад", "adm:masters"));
    InlineKeyboardMarkup::new(rows)
}

pub fn master_card(master_id: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        row("✏️ Редактировать", format!("mst:edit:{}", master_id)),
        row("⏰ Установить рабочее время", format!("mst:hours:{}", master_id)),
        row("🛠️ Услуги мастера", format!("mst:svcs:{}", master_id)),
        row("❌ Удалить", format!("mst:del:{}", master_id)),
        row("🔙 Назад к списку мастеров", "mst:list"),
    ])
}

pub fn master_fields(master_id: &str) -> InlineKeyboardMarkup {
    let fields = [
        ("✏️ Имя", "name"),
        ("✏️ Telegram", "telegram"),
        ("✏️ Телефон", "phone"),
        ("✏️ Адрес", "address"),
        ("📍 Геолокация", "location"),
        ("✏️ Описание", "description"),
    ];
    let buttons = fields
        .iter()
        .map(|(label, field)| btn(label, format!("mst:edit:{}:{}", master_id, field)))
        .collect();
    let mut rows = chunked(buttons, 2);
    rows.push(row("🔙 Назад", format!("mst:view:{}", master_id)));
    InlineKeyboardMarkup::new(rows)
}

/// Toggle per service, checked when assigned.
pub fn master_services(master_id: &str, services: &[Service], assigned: &[String]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = services
        .iter()
        .map(|s| {
            let mark = if assigned.iter().any(|a| same_id(a, &s.id)) { "✅" } else { "⬜" };
            row(&format!("{} {}", mark, s.name), format!("mst:svc:{}:{}", master_id, s.id))
        })
        .collect();
    rows.push(row("🔙 Назад", format!("mst:view:{}", master_id)));
    InlineKeyboardMarkup::new(rows)
}

pub fn skip_step() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![row("⏭ Пропустить", "mst:skip")])
}

pub fn appointment_dates(dates: &[(NaiveDate, usize)]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = dates
        .iter()
        .map(|(date, count)| {
            row(
                &format!("{} ({} записей)", format_date(*date), count),
                format!("apt:date:{}", format_date(*date)),
            )
        })
        .collect();
    rows.push(row("🔙 Назад", "admin"));
    InlineKeyboardMarkup::new(rows)
}

pub fn appointment_list(appointments: &[(String, String)]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = appointments
        .iter()
        .map(|(id, label)| row(label, format!("apt:view:{}", id)))
        .collect();
    rows.push(row("🔙 Назад к списку дат", "apt:days"));
    InlineKeyboardMarkup::new(rows)
}

/// Actions that make sense for the appointment's current status.
pub fn appointment_card(appointment: &Appointment) -> InlineKeyboardMarkup {
    let id = &appointment.id;
    let mut rows = Vec::new();
    if appointment.status == AppointmentStatus::Pending {
        rows.push(row("✅ Подтвердить запись", format!("apt:confirm:{}", id)));
    }
    if appointment.status.is_open() {
        rows.push(row("✓ Отметить как выполненную", format!("apt:done:{}", id)));
    }
    if appointment.status != AppointmentStatus::Paid
        && appointment.status != AppointmentStatus::Canceled
    {
        rows.push(row("💰 Отметить как оплаченную", format!("apt:paid:{}", id)));
    }
    if appointment.status.is_open() {
        rows.push(row("❌ Отменить запись", format!("apt:cancel:{}", id)));
    }
    rows.push(row(
        "🔙 Назад к списку записей",
        format!("apt:date:{}", format_date(appointment.date)),
    ));
    InlineKeyboardMarkup::new(rows)
}

pub fn payment_methods(appointment_id: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        row("💵 Оплата наличными", format!("apt:pay:{}:cash", appointment_id)),
        row("💳 Оплата картой", format!("apt:pay:{}:card", appointment_id)),
        row("📱 Оплата переводом", format!("apt:pay:{}:transfer", appointment_id)),
    ])
}

pub fn confirm_cancel_appointment(appointment_id: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        row("✅ Да, отменить запись", format!("apt:cancel:{}:yes", appointment_id)),
        row("❌ Нет, оставить как есть", format!("apt:view:{}", appointment_id)),
    ])
}

/// Evening reminder buttons.
pub fn reminder_actions(appointment_id: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        row("💰 Выполнена и оплачена", format!("apt:paid:{}", appointment_id)),
        row("✓ Выполнена, не оплачена", format!("apt:done:{}", appointment_id)),
        row("❌ Отменена", format!("apt:cancel:{}:yes", appointment_id)),
        row("⏰ Напомнить позже", format!("apt:later:{}", appointment_id)),
    ])
}

// Панель владельца
pub fn owner_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        row("➕ Назначить администратора", "own:promote"),
        row("➖ Снять администратора", "own:demote"),
        row("👥 Список администраторов", "own:admins"),
        row("📊 Статистика", "own:stats"),
        row("⬅️ Главное меню", "menu"),
    ])
}

// Финансы
pub fn finance_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        row("📊 Доход и прибыль", "fin:income"),
        row("💰 Расходы на услуги", "fin:services"),
        row("👥 Статистика клиентов", "fin:clients"),
        row("🔮 Прогноз доходов", "fin:forecast"),
        row("📈 Советы по бизнесу", "fin:tips"),
        row("⚙️ Настройка финансов", "fin:setup"),
        row("⬅️ Главное меню", "menu"),
    ])
}

pub fn back_to_finance() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![row("⬅️ Назад в финансовый раздел", "fin")])
}

pub fn finance_periods() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![btn("📅 Сегодня", "fin:period:today"), btn("📅 Вчера", "fin:period:yesterday")],
        vec![
            btn("📅 Текущая неделя", "fin:period:week"),
            btn("📅 Текущий месяц", "fin:period:month"),
        ],
        row("📅 Последние 30 дней", "fin:period:30days"),
        row("🗓 Выбрать другой период", "fin:period:custom"),
        row("⬅️ Назад", "fin"),
    ])
}

pub fn finance_services(services: &[Service]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = services
        .iter()
        .map(|s| row(&s.name, format!("fin:svc:{}", s.id)))
        .collect();
    rows.push(row("⬅️ Назад", "fin"));
    InlineKeyboardMarkup::new(rows)
}

pub fn service_costs(service_id: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        row("✏️ Стоимость материалов", format!("fin:cost:{}:materials", service_id)),
        row("✏️ Стоимость времени", format!("fin:cost:{}:time", service_id)),
        row("✏️ Другие расходы", format!("fin:cost:{}:other", service_id)),
        row("⬅️ Назад к услугам", "fin:services"),
    ])
}

pub fn clients_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        row("👑 VIP клиенты", "fin:vip"),
        row("🔍 Найти клиента", "fin:clientlist"),
        row("📊 Активность клиентов", "fin:activity"),
        row("⬅️ Назад", "fin"),
    ])
}

pub fn vip_clients(clients: &[VipClient]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = clients
        .iter()
        .map(|c| row(&format!("👑 {}", c.name), format!("fin:client:{}", c.client_id)))
        .collect();
    rows.push(row("⬅️ Назад", "fin:clients"));
    InlineKeyboardMarkup::new(rows)
}

pub fn client_list(clients: &[(i64, String)]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = clients
        .iter()
        .map(|(id, name)| row(name, format!("fin:client:{}", id)))
        .collect();
    rows.push(row("⬅️ Назад", "fin:clients"));
    InlineKeyboardMarkup::new(rows)
}

pub fn client_card(client_id: i64) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        row("📝 Добавить заметку", format!("fin:note:{}", client_id)),
        row("🔔 Отправить напоминание", format!("fin:remind:{}", client_id)),
        row("⬅️ Назад к VIP клиентам", "fin:vip"),
    ])
}

pub fn client_reminder(client_id: i64) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        row("✅ Позвонил(а)", format!("fin:reminded:{}:called", client_id)),
        row("📱 Написал(а) в WhatsApp", format!("fin:reminded:{}:messaged", client_id)),
        row("❌ Отмена", format!("fin:reminded:{}:cancel", client_id)),
    ])
}

pub fn forecast_periods() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            btn("📅 7 дней", "fin:forecast:7"),
            btn("📅 30 дней", "fin:forecast:30"),
            btn("📅 90 дней", "fin:forecast:90"),
        ],
        row("📨 Сводка с рекомендациями", "fin:forecast:msg"),
        row("⬅️ Назад", "fin"),
    ])
}

pub fn tips_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        row("🚀 Как увеличить прибыль", "fin:tip:1"),
        row("💼 Как оптимизировать расходы", "fin:tip:2"),
        row("👥 Как удержать клиентов", "fin:tip:3"),
        row("🔄 Как получать больше отзывов", "fin:tip:4"),
        row("⬅️ Назад", "fin"),
    ])
}

pub fn back_to_tips() -> InlineKeyboardMarkup {
    back("fin:tips")
}

// Подписка
pub fn subscription_menu(active: bool) -> InlineKeyboardMarkup {
    let mut rows = vec![row("📅 Статус подписки", "sub:status")];
    if !active {
        rows.push(row("💳 Приобрести подписку", "sub:buy"));
        rows.push(row("🆓 Пробный период", "sub:trial"));
    }
    rows.push(row("🎁 Реферальная программа", "sub:referral"));
    rows.push(row("📝 Ввести реферальный код", "sub:enter"));
    rows.push(row("⬅️ Назад", "menu"));
    InlineKeyboardMarkup::new(rows)
}

pub fn back_to_subscription() -> InlineKeyboardMarkup {
    back("sub")
}

pub fn plan_label(months: u32) -> String {
    let unit = match months {
        1 => "месяц",
        2..=4 => "месяца",
        _ => "месяцев",
    };
    let discount = plan_discount(months);
    if discount > 0 {
        format!("{} {} - {} руб (-{}%)", months, unit, plan_price(months), discount)
    } else {
        format!("{} {} - {} руб", months, unit, plan_price(months))
    }
}

pub fn subscription_plans() -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = PLAN_MONTHS
        .iter()
        .map(|m| row(&plan_label(*m), format!("sub:plan:{}", m)))
        .collect();
    rows.push(row("⬅️ Назад", "sub"));
    InlineKeyboardMarkup::new(rows)
}

pub fn subscription_confirm() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        row("✅ Подтвердить", "sub:confirm"),
        row("❌ Отменить", "sub"),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn callbacks(markup: &InlineKeyboardMarkup) -> Vec<String> {
        use teloxide::types::InlineKeyboardButtonKind;
        markup
            .inline_keyboard
            .iter()
            .flatten()
            .filter_map(|b| match &b.kind {
                InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_labels_are_truncated() {
        assert_eq!(truncate("Стрижка"), "Стрижка");
        let long = "Очень длинное название услуги для салона красоты";
        let short = truncate(long);
        assert_eq!(short.chars().count(), 30);
        assert!(short.ends_with("..."));
    }

    #[test]
    fn test_main_menu_depends_on_role() {
        let client = callbacks(&main_menu(Role::Client, false));
        assert_eq!(client, vec!["book", "my", "help"]);

        let admin = callbacks(&main_menu(Role::Admin, false));
        assert!(admin.contains(&"sub".to_string()));
        assert!(!admin.contains(&"fin".to_string()));
        assert!(callbacks(&main_menu(Role::Admin, true)).contains(&"fin".to_string()));

        let owner = callbacks(&main_menu(Role::Owner, false));
        assert!(owner.contains(&"owner".to_string()));
        assert!(!owner.contains(&"sub".to_string()));
    }

    #[test]
    fn test_time_slots_are_chunked() {
        let slots: Vec<String> = ["10:00", "10:30", "11:00", "11:30", "12:00"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let markup = booking_times(&slots);
        assert_eq!(markup.inline_keyboard.len(), 3);
        assert_eq!(markup.inline_keyboard[0].len(), 4);
        assert_eq!(callbacks(&markup)[0], "book:time:10:00");
    }

    #[test]
    fn test_plan_labels() {
        assert_eq!(plan_label(1), "1 месяц - 1999 руб");
        assert_eq!(plan_label(3), "3 месяца - 5697 руб (-5%)");
        assert_eq!(plan_label(12), "12 месяцев - 19190 руб (-20%)");
    }

    #[test]
    fn test_appointment_card_follows_status() {
        let mut appointment = Appointment {
            id: "4".into(),
            user_id: 1,
            service_id: "1".into(),
            master_id: "1".into(),
            date: NaiveDate::from_ymd_opt(2030, 1, 7).unwrap(),
            time: "10:00".into(),
            status: AppointmentStatus::Pending,
            payment_method: String::new(),
        };
        let pending = callbacks(&appointment_card(&appointment));
        assert!(pending.contains(&"apt:confirm:4".to_string()));

        appointment.status = AppointmentStatus::Paid;
        let paid = callbacks(&appointment_card(&appointment));
        assert_eq!(paid, vec!["apt:date:2030-01-07"]);
    }
}
