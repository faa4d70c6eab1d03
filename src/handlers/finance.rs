//! Finance and analytics area.

use chrono::{Datelike, Duration, NaiveDate};

use crate::error::Result;
use crate::handlers::{parse_amount, unknown_action, Ctx, Reply};
use crate::keyboards;
use crate::models::{format_date, parse_date, AppointmentStatus, FinanceSettings, Role};
use crate::repo::finance::{self as repo, MarginBand, MONTHS, WEEKDAYS};
use crate::repo::{appointments, services, users};
use crate::session::{CostField, SetupStep, UserSession, UserStep};
use crate::sheets::format_amount;

const SHOWN_DAYS: usize = 5;

pub fn menu() -> Reply {
    Reply::menu(
        "📊 Финансы и аналитика\n\nВыберите раздел:",
        keyboards::finance_menu(),
    )
}

/// Named period ending today; `None` for an unknown name.
pub fn period_range(period: &str, today: NaiveDate) -> Option<(NaiveDate, NaiveDate, &'static str)> {
    let range = match period {
        "today" => (today, today, "сегодня"),
        "yesterday" => {
            let yesterday = today - Duration::days(1);
            (yesterday, yesterday, "вчера")
        }
        "week" => (
            today - Duration::days(today.weekday().num_days_from_monday() as i64),
            today,
            "текущую неделю",
        ),
        "month" => (today.with_day(1)?, today, "текущий месяц"),
        "30days" => (today - Duration::days(30), today, "последние 30 дней"),
        _ => return None,
    };
    Some(range)
}

async fn income_report(ctx: &Ctx<'_>, start: NaiveDate, end: NaiveDate, title: &str) -> Result<Reply> {
    let period = repo::get_analytics_period(ctx.db, ctx.user.user_id, start, end).await?;
    if period.days.is_empty() {
        return Ok(Reply::menu(
            format!(
                "📊 Доход и прибыль за {}\n\nЗа выбранный период нет данных. Выберите другой период или отметьте оплаченные записи.",
                title
            ),
            keyboards::finance_periods(),
        ));
    }

    let mut text = format!(
        "📊 Доход и прибыль за {}\n\n🔸 Общий доход: {} руб.\n🔸 Общие расходы: {} руб.\n🔸 Чистая прибыль: {} руб.\n🔸 Количество записей: {}\n",
        title,
        format_amount(period.total_income),
        format_amount(period.total_expenses),
        format_amount(period.total_profit),
        period.total_appointments
    );
    if period.days.len() > 1 {
        text.push_str("\nСтатистика по дням:\n");
        for day in period.days.iter().take(SHOWN_DAYS) {
            text.push_str(&format!(
                "\n{}:\n- Доход: {} руб.\n- Прибыль: {} руб.\n",
                day.date.format("%d.%m.%Y"),
                format_amount(day.total_income),
                format_amount(day.profit)
            ));
        }
        if period.days.len() > SHOWN_DAYS {
            text.push_str(&format!("\n... и еще {} дней.", period.days.len() - SHOWN_DAYS));
        }
    }
    Ok(Reply::menu(text, keyboards::finance_periods()))
}

async fn service_costs_card(ctx: &Ctx<'_>, service_id: &str) -> Result<Reply> {
    let Some(profit) = repo::calculate_service_profit(ctx.db, service_id).await? else {
        return Ok(Reply::alert("Услуга не найдена."));
    };
    let text = format!(
        "💰 {}\n\nЦена: {} руб.\n\nРасходы:\n- Материалы: {} руб.\n- Время мастера: {} руб.\n- Прочее: {} руб.\nИтого расходов: {} руб.\n\n💵 Прибыль: {} руб.\n📊 Маржа: {}%",
        profit.service_name,
        format_amount(profit.price),
        format_amount(profit.costs.materials_cost),
        format_amount(profit.costs.time_cost),
        format_amount(profit.costs.other_costs),
        format_amount(profit.total_cost),
        format_amount(profit.profit),
        profit.margin_percent
    );
    Ok(Reply::menu(text, keyboards::service_costs(&profit.service_id)))
}

async fn client_card(ctx: &Ctx<'_>, client_id: i64) -> Result<Reply> {
    let stats = repo::get_client_stats(ctx.db, client_id).await?;
    let name = users::get_user(ctx.db, client_id)
        .await?
        .map(|u| format!("{} ({})", u.full_name, u.display_name()))
        .unwrap_or_else(|| client_id.to_string());

    let mut text = format!(
        "👤 {}\n\nВизитов: {}\nПотрачено: {} руб.\nПоследний визит: {}\nЛюбимая услуга: {}\n",
        name,
        stats.total_visits,
        format_amount(stats.total_spent),
        stats.last_visit.map(format_date).unwrap_or_else(|| "-".to_string()),
        if stats.favorite_service.is_empty() { "-" } else { stats.favorite_service.as_str() },
    );
    if stats.vip_status {
        text.push_str("👑 VIP клиент\n");
    }
    if !stats.notes.is_empty() {
        text.push_str(&format!("\n📝 Заметки: {}\n", stats.notes));
    }

    let visits: Vec<_> = appointments::get_user_appointments(ctx.db, client_id)
        .await?
        .into_iter()
        .filter(|v| {
            matches!(
                v.appointment.status,
                AppointmentStatus::Completed | AppointmentStatus::Paid
            )
        })
        .collect();
    if !visits.is_empty() {
        text.push_str("\nПоследние визиты:");
        for visit in visits.iter().rev().take(3) {
            text.push_str(&format!(
                "\n• {} - {} ({} руб.)",
                format_date(visit.appointment.date),
                visit.service_name,
                format_amount(visit.service_price)
            ));
        }
    }
    Ok(Reply::menu(text, keyboards::client_card(client_id)))
}

async fn client_reminder_done(ctx: &Ctx<'_>, client_id: i64, kind: &str) -> Result<Reply> {
    let mark = match kind {
        "called" => "позвонили",
        "messaged" => "написали",
        _ => return client_card(ctx, client_id).await,
    };
    let stats = repo::get_client_stats(ctx.db, client_id).await?;
    let line = format!("{}: {}", format_date(ctx.today()), mark);
    let notes = if stats.notes.is_empty() {
        line
    } else {
        format!("{}; {}", stats.notes, line)
    };
    repo::update_client_note(ctx.db, client_id, &notes).await?;
    client_card(ctx, client_id)
        .await
        .map(|r| r.with_alert("Отметка о контакте сохранена"))
}

async fn activity(ctx: &Ctx<'_>) -> Result<Reply> {
    let activity = repo::weekday_activity(ctx.db).await?;
    if activity.total() == 0 {
        return Ok(Reply::menu(
            "📊 Активность клиентов\n\nНедостаточно данных для анализа.",
            keyboards::back("fin:clients"),
        ));
    }
    let mut text = String::from("📊 Активность клиентов по дням недели:\n");
    for (day, count) in WEEKDAYS.iter().zip(activity.weekdays.iter()) {
        text.push_str(&format!("\n{}: {}", day, count));
    }
    text.push_str(&format!(
        "\n\n🔝 Самый загруженный день: {}\n📉 Самый свободный будний день: {}\n📅 Самый активный месяц: {}",
        WEEKDAYS[activity.busiest_weekday()],
        WEEKDAYS[activity.quietest_workday()],
        MONTHS[activity.busiest_month()]
    ));
    Ok(Reply::menu(text, keyboards::back("fin:clients")))
}

async fn forecast(ctx: &Ctx<'_>, days: i64) -> Result<Reply> {
    let forecast = repo::calculate_profit_forecast(ctx.db, ctx.user.user_id, days, ctx.today()).await?;
    let text = format!(
        "🔮 Прогноз на {} дней\n\nОжидаемый доход: {} руб.\nОжидаемые расходы: {} руб.\nОжидаемая прибыль: {} руб.\n\nТочность прогноза: {}",
        days,
        format_amount(forecast.income),
        format_amount(forecast.expenses),
        format_amount(forecast.profit),
        forecast.confidence.label()
    );
    Ok(Reply::menu(text, keyboards::forecast_periods()))
}

fn tip(number: &str) -> Option<&'static str> {
    let text = match number {
        "1" => "🚀 Как увеличить прибыль\n\n\
            1️⃣ Оптимизируйте ценообразование\n\
            • Изучите цены конкурентов\n\
            • Сделайте утренние часы дешевле, а вечерние дороже\n\
            • Соберите комплексы услуг с более высокой маржой\n\n\
            2️⃣ Увеличьте средний чек\n\
            • Предлагайте дополнительные услуги во время визита\n\
            • Заведите карты лояльности с кешбэком на следующее посещение\n\n\
            3️⃣ Увеличьте частоту визитов\n\
            • Введите абонементы на несколько посещений\n\
            • Проводите акции «Приведи друга»",
        "2" => "💼 Как оптимизировать расходы\n\n\
            1️⃣ Материалы\n\
            • Закупайте базовые позиции оптом\n\
            • Считайте расход материала на одну процедуру\n\n\
            2️⃣ Аренда\n\
            • Заполняйте рабочие дни равномерно\n\
            • Подстройте режим работы под поток клиентов\n\n\
            3️⃣ Расходники\n\
            • Проведите аудит расходников\n\
            • Следите за сроками годности продуктов",
        "3" => "👥 Как удержать клиентов\n\n\
            1️⃣ Качество обслуживания\n\
            • Держите единый стандарт качества для всех услуг\n\
            • Собирайте и анализируйте обратную связь\n\n\
            2️⃣ Система лояльности\n\
            • Накопительные скидки для постоянных клиентов\n\
            • VIP-программа для самых ценных клиентов\n\n\
            3️⃣ Работа с базой\n\
            • Записывайте предпочтения клиентов в заметки\n\
            • Делайте специальные предложения тем, кто давно не был",
        "4" => "🔄 Как получать больше отзывов\n\n\
            1️⃣ Момент запроса\n\
            • Просите отзыв в конце удачной процедуры\n\
            • Напоминайте об отзыве через день после визита\n\n\
            2️⃣ Мотивация\n\
            • Небольшая скидка за развернутый отзыв\n\
            • Благодарите лично за каждый отзыв\n\n\
            3️⃣ Работа с отзывами\n\
            • Отвечайте на каждый отзыв, особенно негативный\n\
            • Размещайте лучшие отзывы в социальных сетях",
        _ => return None,
    };
    Some(text)
}

fn setup_prompt(step: SetupStep) -> &'static str {
    match step {
        SetupStep::Materials => {
            "⚙️ Настройка финансов\n\nСколько в среднем стоят материалы на одну услугу? (в рублях)"
        }
        SetupStep::Rent => {
            "✅ Отлично! Сколько вы платите за аренду помещения в месяц?\n(введите 0, если аренды нет)"
        }
        SetupStep::Salary => {
            "✅ Понял! Какой процент от стоимости услуги вы отдаете мастеру?\n(число от 0 до 100)"
        }
        SetupStep::Other => {
            "✅ Хорошо! Какие еще ежемесячные расходы у вас есть?\n(коммунальные услуги, интернет, реклама и т.д.)"
        }
    }
}

async fn setup_step(ctx: &Ctx<'_>, session: &mut UserSession, step: SetupStep, text: &str) -> Result<Reply> {
    let Some(value) = parse_amount(text) else {
        return Ok(Reply::text("Пожалуйста, введите числовое значение. Например: 200 или 350.50"));
    };
    match step {
        SetupStep::Materials => {
            session.form.materials_cost = Some(value);
            session.advance(UserStep::FinanceSetup(SetupStep::Rent));
            Ok(Reply::text(setup_prompt(SetupStep::Rent)))
        }
        SetupStep::Rent => {
            session.form.rent_cost = Some(value);
            session.advance(UserStep::FinanceSetup(SetupStep::Salary));
            Ok(Reply::text(setup_prompt(SetupStep::Salary)))
        }
        SetupStep::Salary => {
            if value > 100.0 {
                return Ok(Reply::text("Пожалуйста, введите значение от 0 до 100"));
            }
            session.form.salary_percent = Some(value);
            session.advance(UserStep::FinanceSetup(SetupStep::Other));
            Ok(Reply::text(setup_prompt(SetupStep::Other)))
        }
        SetupStep::Other => {
            let form = session.form.clone();
            session.reset();
            let settings = FinanceSettings {
                admin_id: ctx.user.user_id,
                materials_cost: form.materials_cost.unwrap_or_default(),
                rent_cost: form.rent_cost.unwrap_or_default(),
                salary_percent: form.salary_percent.unwrap_or_default(),
                other_costs: value,
                updated: format_date(ctx.today()),
            };
            let report = repo::compute_setup_report(
                settings.materials_cost,
                settings.rent_cost,
                settings.salary_percent,
                settings.other_costs,
            );
            repo::save_finance_settings(ctx.db, settings).await?;
            info!("User {} saved finance settings", ctx.user.user_id);

            let advice = match report.band {
                MarginBand::Low => {
                    "❗ Маржинальность слишком низкая. Рекомендуется:\n- Пересмотреть прайс-лист и повысить цены\n- Искать более доступные материалы без потери качества"
                }
                MarginBand::Normal => {
                    "⚠️ Маржинальность в пределах нормы, но её можно улучшить:\n- Добавьте услуги с более высокой маржинальностью\n- Оптимизируйте время выполнения услуг"
                }
                MarginBand::Good => {
                    "✅ Маржинальность на хорошем уровне! Рекомендации:\n- Привлекайте больше клиентов\n- Инвестируйте в обучение и новое оборудование"
                }
            };
            let text = format!(
                "📊 Анализ финансовых показателей\n\n🔸 Средняя стоимость услуги: {} руб.\n🔸 Расходы на материалы: {} руб.\n🔸 Зарплата мастера: {} руб. ({}%)\n🔸 Доля аренды на услугу: {} руб.\n🔸 Прочие расходы на услугу: {} руб.\n\n💰 Прибыль с одной услуги: {} руб.\n📈 Маржинальность: {}%\n\n💡 {}",
                format_amount(report.average_price),
                format_amount(report.materials_cost),
                format_amount(report.salary_cost),
                format_amount(report.salary_percent),
                format_amount(report.rent_per_service),
                format_amount(report.other_per_service),
                format_amount(report.profit),
                report.margin_percent,
                advice
            );
            Ok(Reply::menu(text, keyboards::back_to_finance()))
        }
    }
}

async fn edit_cost(ctx: &Ctx<'_>, session: &mut UserSession, field: CostField, text: &str) -> Result<Reply> {
    let Some(value) = parse_amount(text) else {
        return Ok(Reply::text("Пожалуйста, введите сумму в рублях, например 250"));
    };
    let service_id = session.form.target_id.clone().unwrap_or_default();
    session.reset();
    if services::get_service(ctx.db, &service_id).await?.is_none() {
        return Ok(Reply::text("Услуга не найдена."));
    }
    let mut costs = repo::get_service_costs(ctx.db, &service_id).await?;
    match field {
        CostField::Materials => costs.materials_cost = value,
        CostField::Time => costs.time_cost = value,
        CostField::Other => costs.other_costs = value,
    }
    costs.last_updated = format_date(ctx.today());
    repo::add_service_costs(ctx.db, costs).await?;
    service_costs_card(ctx, &service_id).await
}

pub async fn on_callback(ctx: &Ctx<'_>, session: &mut UserSession, parts: &[&str]) -> Result<Reply> {
    match parts {
        ["fin"] => {
            session.reset();
            Ok(menu())
        }
        ["fin", "income"] => Ok(Reply::menu(
            "📊 Доход и прибыль\n\nВыберите период:",
            keyboards::finance_periods(),
        )),
        ["fin", "period", "custom"] => {
            session.begin(UserStep::PeriodStart);
            Ok(Reply::text(
                "Введите начальную дату периода в формате ГГГГ-ММ-ДД (например, 2024-01-01):",
            ))
        }
        ["fin", "period", name] => match period_range(name, ctx.today()) {
            Some((start, end, title)) => income_report(ctx, start, end, title).await,
            None => Ok(unknown_action(&parts.join(":"))),
        },
        ["fin", "services"] => {
            let all = services::get_all_services(ctx.db).await?;
            if all.is_empty() {
                return Ok(Reply::menu("Услуг пока нет.", keyboards::back_to_finance()));
            }
            Ok(Reply::menu(
                "💰 Расходы на услуги\n\nВыберите услугу:",
                keyboards::finance_services(&all),
            ))
        }
        ["fin", "svc", id] => service_costs_card(ctx, id).await,
        ["fin", "cost", id, field] => {
            let field = match *field {
                "materials" => CostField::Materials,
                "time" => CostField::Time,
                "other" => CostField::Other,
                _ => return Ok(unknown_action(&parts.join(":"))),
            };
            session.begin(UserStep::EditCost(field));
            session.form.target_id = Some(id.to_string());
            Ok(Reply::text("Введите сумму в рублях:"))
        }
        ["fin", "clients"] => Ok(Reply::menu(
            "👥 Статистика клиентов",
            keyboards::clients_menu(),
        )),
        ["fin", "vip"] => {
            let vip = repo::get_vip_clients(ctx.db).await?;
            if vip.is_empty() {
                return Ok(Reply::menu(
                    format!(
                        "👑 VIP клиенты\n\nПока нет VIP клиентов. Клиент становится VIP после {} визитов или {} руб. покупок.",
                        repo::VIP_VISITS,
                        format_amount(repo::VIP_SPENT)
                    ),
                    keyboards::back("fin:clients"),
                ));
            }
            let mut text = String::from("👑 VIP клиенты:\n");
            for client in &vip {
                text.push_str(&format!(
                    "\n• {}: {} визитов, {} руб.",
                    client.name,
                    client.total_visits,
                    format_amount(client.total_spent)
                ));
            }
            Ok(Reply::menu(text, keyboards::vip_clients(&vip)))
        }
        ["fin", "clientlist"] => {
            let clients: Vec<(i64, String)> = users::get_users_by_role(ctx.db, Role::Client)
                .await?
                .into_iter()
                .map(|u| (u.user_id, u.display_name()))
                .collect();
            if clients.is_empty() {
                return Ok(Reply::menu("Клиентов пока нет.", keyboards::back("fin:clients")));
            }
            Ok(Reply::menu("🔍 Выберите клиента:", keyboards::client_list(&clients)))
        }
        ["fin", "client", id] => match id.parse::<i64>() {
            Ok(client_id) => client_card(ctx, client_id).await,
            Err(_) => Ok(unknown_action(&parts.join(":"))),
        },
        ["fin", "note", id] => match id.parse::<i64>() {
            Ok(_) => {
                session.begin(UserStep::ClientNote);
                session.form.target_id = Some(id.to_string());
                Ok(Reply::text("Введите заметку о клиенте:"))
            }
            Err(_) => Ok(unknown_action(&parts.join(":"))),
        },
        ["fin", "remind", id] => {
            let Ok(client_id) = id.parse::<i64>() else {
                return Ok(unknown_action(&parts.join(":")));
            };
            let contact = users::get_user(ctx.db, client_id)
                .await?
                .map(|u| u.display_name())
                .unwrap_or_else(|| client_id.to_string());
            Ok(Reply::menu(
                format!(
                    "🔔 Свяжитесь с клиентом {} и предложите записаться снова.\n\nОтметьте, как вы связались:",
                    contact
                ),
                keyboards::client_reminder(client_id),
            ))
        }
        ["fin", "reminded", id, kind] => match id.parse::<i64>() {
            Ok(client_id) => client_reminder_done(ctx, client_id, kind).await,
            Err(_) => Ok(unknown_action(&parts.join(":"))),
        },
        ["fin", "activity"] => activity(ctx).await,
        ["fin", "forecast"] => Ok(Reply::menu(
            "🔮 Прогноз доходов\n\nВыберите период прогноза:",
            keyboards::forecast_periods(),
        )),
        ["fin", "forecast", "msg"] => {
            let text = repo::forecast_message(ctx.db, ctx.user.user_id, ctx.today()).await?;
            Ok(Reply::menu(text, keyboards::forecast_periods()))
        }
        ["fin", "forecast", days] => match days.parse::<i64>() {
            Ok(days @ (7 | 30 | 90)) => forecast(ctx, days).await,
            _ => Ok(unknown_action(&parts.join(":"))),
        },
        ["fin", "tips"] => Ok(Reply::menu(
            "💡 Советы по бизнесу\n\nВыберите категорию советов:",
            keyboards::tips_menu(),
        )),
        ["fin", "tip", number] => match tip(number) {
            Some(text) => Ok(Reply::menu(text, keyboards::back_to_tips())),
            None => Ok(Reply::alert("Совет не найден")),
        },
        ["fin", "setup"] => {
            let current = repo::get_finance_settings(ctx.db, ctx.user.user_id).await?;
            session.begin(UserStep::FinanceSetup(SetupStep::Materials));
            let mut text = String::new();
            if let Some(settings) = current {
                text.push_str(&format!(
                    "Текущие настройки (от {}): материалы {} руб., аренда {} руб., мастеру {}%, прочее {} руб.\n\n",
                    settings.updated,
                    format_amount(settings.materials_cost),
                    format_amount(settings.rent_cost),
                    format_amount(settings.salary_percent),
                    format_amount(settings.other_costs)
                ));
            }
            text.push_str(setup_prompt(SetupStep::Materials));
            Ok(Reply::text(text))
        }
        _ => Ok(unknown_action(&parts.join(":"))),
    }
}

pub async fn on_text(ctx: &Ctx<'_>, session: &mut UserSession, text: &str) -> Result<Reply> {
    match session.step {
        UserStep::FinanceSetup(step) => setup_step(ctx, session, step, text).await,
        UserStep::EditCost(field) => edit_cost(ctx, session, field, text).await,
        UserStep::ClientNote => {
            let Some(client_id) = session.form.target_id.as_deref().and_then(|id| id.parse().ok()) else {
                session.reset();
                return Ok(menu());
            };
            session.reset();
            repo::update_client_note(ctx.db, client_id, text).await?;
            client_card(ctx, client_id)
                .await
                .map(|r| r.with_alert("Заметка сохранена"))
        }
        UserStep::PeriodStart => match parse_date(text) {
            Some(start) => {
                session.form.period_start = Some(start);
                session.advance(UserStep::PeriodEnd);
                Ok(Reply::text("Введите конечную дату периода в формате ГГГГ-ММ-ДД:"))
            }
            None => Ok(Reply::text(
                "Неверный формат даты. Пожалуйста, используйте формат ГГГГ-ММ-ДД (например, 2024-01-01):",
            )),
        },
        UserStep::PeriodEnd => {
            let Some(end) = parse_date(text) else {
                return Ok(Reply::text(
                    "Неверный формат даты. Пожалуйста, используйте формат ГГГГ-ММ-ДД:",
                ));
            };
            let Some(start) = session.form.period_start else {
                session.reset();
                return Ok(menu());
            };
            if end < start {
                return Ok(Reply::text(
                    "Конечная дата не может быть раньше начальной. Введите конечную дату:",
                ));
            }
            session.reset();
            let title = format!("период {} - {}", format_date(start), format_date(end));
            income_report(ctx, start, end, &title).await
        }
        _ => {
            session.reset();
            Ok(menu())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Db;
    use crate::handlers::{handle_callback_at, handle_text_at};
    use crate::models::User;
    use crate::repo::users::add_user;
    use chrono::NaiveDateTime;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, m, d).unwrap()
    }

    fn at(m: u32, d: u32) -> NaiveDateTime {
        date(m, d).and_hms_opt(12, 0, 0).unwrap()
    }

    async fn owner(db: &Db) -> User {
        add_user(db, 1, "own", "Owner", Role::Owner).await.unwrap()
    }

    #[test]
    fn test_period_ranges() {
        // 2030-05-15 is a Wednesday
        let today = date(5, 15);
        assert_eq!(period_range("week", today).map(|r| r.0), Some(date(5, 13)));
        assert_eq!(period_range("month", today).map(|r| r.0), Some(date(5, 1)));
        assert_eq!(period_range("30days", today).map(|r| r.0), Some(date(4, 15)));
        assert_eq!(period_range("yesterday", today).map(|r| r.1), Some(date(5, 14)));
        assert!(period_range("decade", today).is_none());
    }

    #[tokio::test]
    async fn test_report_lists_five_days() {
        let db = Db::memory();
        let user = owner(&db).await;
        for d in 1..=7 {
            repo::record_paid_visit(&db, 1, date(5, d), 1000.0, 200.0).await.unwrap();
        }
        let mut session = UserSession::new();
        let reply = handle_callback_at(&db, &user, &mut session, "fin:period:month", at(5, 10))
            .await
            .unwrap();
        assert!(reply.text.contains("Общий доход: 7000 руб."));
        assert!(reply.text.contains("01.05.2030"));
        assert!(!reply.text.contains("06.05.2030"));
        assert!(reply.text.ends_with("... и еще 2 дней."));
    }

    #[tokio::test]
    async fn test_custom_period_dialog() {
        let db = Db::memory();
        let user = owner(&db).await;
        repo::record_paid_visit(&db, 1, date(3, 3), 500.0, 100.0).await.unwrap();
        let mut session = UserSession::new();
        handle_callback_at(&db, &user, &mut session, "fin:period:custom", at(5, 10)).await.unwrap();
        handle_text_at(&db, &user, &mut session, "2030-03-01", at(5, 10)).await.unwrap();
        let reply = handle_text_at(&db, &user, &mut session, "2030-02-01", at(5, 10)).await.unwrap();
        assert!(reply.text.starts_with("Конечная дата"));
        let reply = handle_text_at(&db, &user, &mut session, "2030-03-31", at(5, 10)).await.unwrap();
        assert!(reply.text.contains("Чистая прибыль: 400 руб."));
        assert!(session.is_idle());
    }

    #[tokio::test]
    async fn test_setup_wizard_saves_settings() {
        let db = Db::memory();
        let user = owner(&db).await;
        let mut session = UserSession::new();
        handle_callback_at(&db, &user, &mut session, "fin:setup", at(5, 10)).await.unwrap();
        for answer in ["200", "35200", "150"] {
            handle_text_at(&db, &user, &mut session, answer, at(5, 10)).await.unwrap();
        }
        assert_eq!(session.step, UserStep::FinanceSetup(SetupStep::Salary));
        handle_text_at(&db, &user, &mut session, "40", at(5, 10)).await.unwrap();
        let reply = handle_text_at(&db, &user, &mut session, "0", at(5, 10)).await.unwrap();
        // 1500 - 200 - 200 (rent) - 600 (salary) = 500
        assert!(reply.text.contains("Прибыль с одной услуги: 500 руб."));

        let saved = repo::get_finance_settings(&db, 1).await.unwrap().unwrap();
        assert_eq!(saved.salary_percent, 40.0);
        assert_eq!(saved.updated, "2030-05-10");
    }

    #[tokio::test]
    async fn test_cost_edit_and_client_note() {
        let db = Db::memory();
        let user = owner(&db).await;
        let service = services::add_service(&db, "Cut", "", 1000.0, 60, None).await.unwrap();
        let mut session = UserSession::new();

        let data = format!("fin:cost:{}:time", service.id);
        handle_callback_at(&db, &user, &mut session, &data, at(5, 10)).await.unwrap();
        let reply = handle_text_at(&db, &user, &mut session, "300", at(5, 10)).await.unwrap();
        assert!(reply.text.contains("Маржа: 70%"));

        handle_callback_at(&db, &user, &mut session, "fin:note:42", at(5, 10)).await.unwrap();
        handle_text_at(&db, &user, &mut session, "любит кофе", at(5, 10)).await.unwrap();
        handle_callback_at(&db, &user, &mut session, "fin:reminded:42:called", at(5, 10))
            .await
            .unwrap();
        let stats = repo::get_client_stats(&db, 42).await.unwrap();
        assert_eq!(stats.notes, "любит кофе; 2030-05-10: позвонили");
    }
}
