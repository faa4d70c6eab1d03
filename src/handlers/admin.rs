//! Admin panel: services, templates, categories, offers, masters and appointments.

use crate::error::Result;
use crate::handlers::{optional_text, parse_amount, parse_minutes, unknown_action, Ctx, Reply};
use crate::keyboards;
use crate::models::{format_date, parse_date, uniform_working_hours, AppointmentStatus};
use crate::repo::masters::{parse_clock, MasterPatch};
use crate::repo::services::{OfferPatch, ServicePatch, TemplateImport, UNCATEGORIZED};
use crate::repo::{appointments, finance, masters, services, users};
use crate::session::{MasterField, ServiceField, UserSession, UserStep};
use crate::sheets::{format_amount, same_id};

pub fn menu() -> Reply {
    Reply::menu("⚙️ Панель администратора\n\nВыберите раздел:", keyboards::admin_menu())
}

fn field_prompt(field: ServiceField) -> &'static str {
    match field {
        ServiceField::Name => "Введите название:",
        ServiceField::Description => "Введите описание (или «-», чтобы оставить пустым):",
        ServiceField::Price => "Введите цену в рублях:",
        ServiceField::Duration => "Введите длительность в минутах:",
    }
}

fn parse_service_field(name: &str) -> Option<ServiceField> {
    match name {
        "name" => Some(ServiceField::Name),
        "description" => Some(ServiceField::Description),
        "price" => Some(ServiceField::Price),
        "duration" => Some(ServiceField::Duration),
        _ => None,
    }
}

fn master_prompt(field: MasterField) -> &'static str {
    match field {
        MasterField::Name => "Введите имя мастера:",
        MasterField::Telegram => "Введите Telegram мастера (@username или числовой ID):",
        MasterField::Phone => "Введите телефон мастера:",
        MasterField::Address => "Введите адрес, где принимает мастер:",
        MasterField::Location => "Введите геолокацию или ориентир (например, ссылку на карту):",
        MasterField::Description => "Введите описание мастера:",
        MasterField::WorkStart => "Введите время начала работы (ЧЧ:ММ):",
        MasterField::WorkEnd => "Введите время окончания работы (ЧЧ:ММ):",
    }
}

fn parse_master_field(name: &str) -> Option<MasterField> {
    match name {
        "name" => Some(MasterField::Name),
        "telegram" => Some(MasterField::Telegram),
        "phone" => Some(MasterField::Phone),
        "address" => Some(MasterField::Address),
        "location" => Some(MasterField::Location),
        "description" => Some(MasterField::Description),
        _ => None,
    }
}

// Услуги

async fn service_groups(ctx: &Ctx<'_>) -> Result<Reply> {
    let all = services::get_all_services(ctx.db).await?;
    if all.is_empty() {
        return Ok(Reply::menu("Список услуг пуст.", keyboards::services_menu()));
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
        format!("📋 Услуги ({}). Выберите категорию:", all.len()),
        keyboards::service_groups(&categories, with_uncategorized),
    ))
}

async fn services_of_category(ctx: &Ctx<'_>, category_id: &str) -> Result<Reply> {
    let (wanted, title) = if category_id == "none" {
        (None, UNCATEGORIZED.to_string())
    } else {
        let name = services::get_category(ctx.db, category_id)
            .await?
            .map(|c| c.name)
            .unwrap_or_else(|| UNCATEGORIZED.to_string());
        (Some(category_id), name)
    };
    let list = services::get_services_in_category(ctx.db, wanted).await?;
    let mut text = format!("📁 {}\n", title);
    for service in &list {
        text.push_str(&format!(
            "\n• {} - {} руб., {} мин.",
            service.name,
            format_amount(service.price),
            service.duration
        ));
    }
    if list.is_empty() {
        text.push_str("\nВ данной категории нет услуг.");
    }
    Ok(Reply::menu(text, keyboards::service_list(&list)))
}

async fn service_card(ctx: &Ctx<'_>, service_id: &str) -> Result<Reply> {
    let Some(service) = services::get_service(ctx.db, service_id).await? else {
        return Ok(Reply::alert("Услуга не найдена."));
    };
    let category = match &service.category_id {
        Some(cid) => services::get_category(ctx.db, cid)
            .await?
            .map(|c| c.name)
            .unwrap_or_else(|| UNCATEGORIZED.to_string()),
        None => UNCATEGORIZED.to_string(),
    };
    let description = if service.description.is_empty() {
        "-"
    } else {
        &service.description
    };
    Ok(Reply::menu(
        format!(
            "🛠️ {}\n\nОписание: {}\nЦена: {} руб.\nДлительность: {} мин.\nКатегория: {}",
            service.name,
            description,
            format_amount(service.price),
            service.duration,
            category
        ),
        keyboards::service_card(&service.id),
    ))
}

async fn add_service_step(
    ctx: &Ctx<'_>,
    session: &mut UserSession,
    field: ServiceField,
    text: &str,
) -> Result<Reply> {
    match field {
        ServiceField::Name => {
            if text.is_empty() {
                return Ok(Reply::text(field_prompt(ServiceField::Name)));
            }
            session.form.name = Some(text.to_string());
            session.advance(UserStep::AddService(ServiceField::Description));
            Ok(Reply::text(field_prompt(ServiceField::Description)))
        }
        ServiceField::Description => {
            session.form.description = Some(optional_text(text));
            session.advance(UserStep::AddService(ServiceField::Price));
            Ok(Reply::text(field_prompt(ServiceField::Price)))
        }
        ServiceField::Price => match parse_amount(text) {
            Some(price) => {
                session.form.price = Some(price);
                session.advance(UserStep::AddService(ServiceField::Duration));
                Ok(Reply::text(field_prompt(ServiceField::Duration)))
            }
            None => Ok(Reply::text("Цена должна быть неотрицательным числом. Введите цену:")),
        },
        ServiceField::Duration => match parse_minutes(text) {
            Some(duration) => {
                session.form.duration = Some(duration);
                session.advance(UserStep::ServiceCategoryPick);
                let categories = services::get_all_categories(ctx.db).await?;
                Ok(Reply::menu(
                    "Выберите категорию для услуги:",
                    keyboards::new_service_category(&categories),
                ))
            }
            None => Ok(Reply::text(
                "Длительность должна быть целым числом минут больше нуля. Введите длительность:",
            )),
        },
    }
}

async fn finish_new_service(ctx: &Ctx<'_>, session: &mut UserSession, category: &str) -> Result<Reply> {
    if session.step != UserStep::ServiceCategoryPick {
        return Ok(Reply::alert("Начните добавление услуги заново"));
    }
    let form = session.form.clone();
    let (Some(name), Some(price), Some(duration)) = (form.name, form.price, form.duration) else {
        session.reset();
        return Ok(Reply::alert("Начните добавление услуги заново"));
    };
    let category_id = (category != "none").then(|| category.to_string());
    let service = services::add_service(
        ctx.db,
        &name,
        &form.description.unwrap_or_default(),
        price,
        duration,
        category_id,
    )
    .await?;
    session.reset();
    info!("Admin {} added service {}", ctx.user.user_id, service.id);
    service_card(ctx, &service.id)
        .await
        .map(|r| r.with_alert("✅ Услуга добавлена"))
}

async fn edit_service_step(
    ctx: &Ctx<'_>,
    session: &mut UserSession,
    field: ServiceField,
    text: &str,
) -> Result<Reply> {
    let Some(service_id) = session.form.target_id.clone() else {
        session.reset();
        return Ok(Reply::text("Услуга не найдена."));
    };
    let mut patch = ServicePatch::default();
    match field {
        ServiceField::Name if !text.is_empty() => patch.name = Some(text.to_string()),
        ServiceField::Name => return Ok(Reply::text(field_prompt(field))),
        ServiceField::Description => patch.description = Some(optional_text(text)),
        ServiceField::Price => match parse_amount(text) {
            Some(price) => patch.price = Some(price),
            None => return Ok(Reply::text("Цена должна быть неотрицательным числом. Введите цену:")),
        },
        ServiceField::Duration => match parse_minutes(text) {
            Some(duration) => patch.duration = Some(duration),
            None => {
                return Ok(Reply::text(
                    "Длительность должна быть целым числом минут больше нуля. Введите длительность:",
                ))
            }
        },
    }
    session.reset();
    if !services::update_service(ctx.db, &service_id, patch).await? {
        return Ok(Reply::text("Услуга не найдена."));
    }
    let card = service_card(ctx, &service_id).await?;
    Ok(Reply {
        text: format!("✅ Услуга обновлена\n\n{}", card.text),
        ..card
    })
}

async fn on_services(ctx: &Ctx<'_>, session: &mut UserSession, parts: &[&str]) -> Result<Reply> {
    match parts {
        ["svc", "add"] => {
            session.begin(UserStep::AddService(ServiceField::Name));
            Ok(Reply::text("➕ Новая услуга\n\nВведите название услуги:"))
        }
        ["svc", "list"] => service_groups(ctx).await,
        ["svc", "cat", id] => services_of_category(ctx, id).await,
        ["svc", "view", id] => service_card(ctx, id).await,
        ["svc", "edit", id] => Ok(Reply::menu(
            "Что вы хотите изменить?",
            keyboards::service_fields(id),
        )),
        ["svc", "edit", id, "category"] => {
            let categories = services::get_all_categories(ctx.db).await?;
            Ok(Reply::menu(
                "Выберите новую категорию:",
                keyboards::service_category_choice(id, &categories),
            ))
        }
        ["svc", "edit", id, field] => match parse_service_field(field) {
            Some(field) => {
                session.begin(UserStep::EditService(field));
                session.form.target_id = Some(id.to_string());
                Ok(Reply::text(field_prompt(field)))
            }
            None => Ok(unknown_action(&parts.join(":"))),
        },
        ["svc", "setcat", id, category] => {
            let category_id = (*category != "none").then(|| category.to_string());
            let patch = ServicePatch {
                category_id: Some(category_id),
                ..Default::default()
            };
            if !services::update_service(ctx.db, id, patch).await? {
                return Ok(Reply::alert("Услуга не найдена."));
            }
            service_card(ctx, id).await.map(|r| r.with_alert("Категория изменена"))
        }
        ["svc", "del", id] => Ok(Reply::menu(
            "Вы уверены, что хотите удалить эту услугу?",
            keyboards::confirm_delete(&format!("svc:del:{}", id), &format!("svc:view:{}", id)),
        )),
        ["svc", "del", id, "yes"] => {
            if services::delete_service(ctx.db, id).await? {
                info!("Admin {} deleted service {}", ctx.user.user_id, id);
                Ok(Reply::menu("🗑 Услуга удалена.", keyboards::services_menu()))
            } else {
                Ok(Reply::alert("Услуга не найдена."))
            }
        }
        ["svc", "newcat", category] => finish_new_service(ctx, session, category).await,
        _ => Ok(unknown_action(&parts.join(":"))),
    }
}

// Шаблоны

async fn on_templates(ctx: &Ctx<'_>, session: &mut UserSession, parts: &[&str]) -> Result<Reply> {
    match parts {
        ["tpl", "list"] => {
            let names = services::get_template_categories(ctx.db).await?;
            if names.is_empty() {
                return Ok(Reply::menu("Шаблоны услуг не найдены.", keyboards::services_menu()));
            }
            Ok(Reply::menu(
                "📦 Выберите набор услуг для быстрого добавления:",
                keyboards::templates(&names),
            ))
        }
        ["tpl", "add", index] => {
            let names = services::get_template_categories(ctx.db).await?;
            let Some(name) = index.parse::<usize>().ok().and_then(|i| names.get(i)) else {
                return Ok(Reply::alert("Шаблон не найден"));
            };
            match services::add_template_services_to_category(ctx.db, name).await? {
                TemplateImport::Added { category, added } => Ok(Reply::menu(
                    format!(
                        "✅ Категория «{}»: добавлено услуг: {}.\n\nЦены новых услуг равны 0. Установите цену для всех услуг категории сразу или отредактируйте каждую.",
                        category.name, added
                    ),
                    keyboards::template_added(&category.id),
                )),
                TemplateImport::NoTemplates => Ok(Reply::alert("Шаблон не найден")),
            }
        }
        ["tpl", "price", category_id] => {
            let Some(category) = services::get_category(ctx.db, category_id).await? else {
                return Ok(Reply::alert("Категория не найдена"));
            };
            session.begin(UserStep::CategoryPrice);
            session.form.target_id = Some(category.id);
            Ok(Reply::text(format!(
                "Введите цену для всех услуг категории «{}»:",
                category.name
            )))
        }
        _ => Ok(unknown_action(&parts.join(":"))),
    }
}

// Категории

async fn category_card(ctx: &Ctx<'_>, category_id: &str) -> Result<Reply> {
    let Some(category) = services::get_category(ctx.db, category_id).await? else {
        return Ok(Reply::alert("Категория не найдена"));
    };
    let count = services::get_services_in_category(ctx.db, Some(&category.id))
        .await?
        .len();
    Ok(Reply::menu(
        format!("📁 {}\n\nУслуг в категории: {}", category.name, count),
        keyboards::category_card(&category.id),
    ))
}

async fn on_categories(ctx: &Ctx<'_>, session: &mut UserSession, parts: &[&str]) -> Result<Reply> {
    match parts {
        ["cat", "add"] => {
            session.begin(UserStep::CategoryName);
            Ok(Reply::text("Введите название новой категории:"))
        }
        ["cat", "list"] => {
            let categories = services::get_all_categories(ctx.db).await?;
            if categories.is_empty() {
                return Ok(Reply::menu("Категорий пока нет.", keyboards::categories_menu()));
            }
            Ok(Reply::menu("📁 Категории:", keyboards::category_list(&categories)))
        }
        ["cat", "view", id] => category_card(ctx, id).await,
        ["cat", "rename", id] => {
            session.begin(UserStep::EditCategoryName);
            session.form.target_id = Some(id.to_string());
            Ok(Reply::text("Введите новое название категории:"))
        }
        ["cat", "del", id] => Ok(Reply::menu(
            "Удалить категорию? Услуги останутся без категории.",
            keyboards::confirm_delete(&format!("cat:del:{}", id), &format!("cat:view:{}", id)),
        )),
        ["cat", "del", id, "yes"] => {
            if services::delete_category(ctx.db, id).await? {
                Ok(Reply::menu("🗑 Категория удалена.", keyboards::categories_menu()))
            } else {
                Ok(Reply::alert("Категория не найдена"))
            }
        }
        _ => Ok(unknown_action(&parts.join(":"))),
    }
}

// Спецпредложения

async fn offer_card(ctx: &Ctx<'_>, offer_id: &str) -> Result<Reply> {
    let Some(offer) = services::get_offer(ctx.db, offer_id).await? else {
        return Ok(Reply::alert("Предложение не найдено"));
    };
    Ok(Reply::menu(
        format!(
            "🎁 {}\n\n{}\nЦена: {} руб.\nДлительность: {} мин.",
            offer.name,
            offer.description,
            format_amount(offer.price),
            offer.duration
        ),
        keyboards::offer_card(&offer.id),
    ))
}

async fn add_offer_step(
    ctx: &Ctx<'_>,
    session: &mut UserSession,
    field: ServiceField,
    text: &str,
) -> Result<Reply> {
    match field {
        ServiceField::Name => {
            if text.is_empty() {
                return Ok(Reply::text(field_prompt(field)));
            }
            session.form.name = Some(text.to_string());
            session.advance(UserStep::AddOffer(ServiceField::Description));
            Ok(Reply::text(field_prompt(ServiceField::Description)))
        }
        ServiceField::Description => {
            session.form.description = Some(optional_text(text));
            session.advance(UserStep::AddOffer(ServiceField::Price));
            Ok(Reply::text(field_prompt(ServiceField::Price)))
        }
        ServiceField::Price => match parse_amount(text) {
            Some(price) => {
                session.form.price = Some(price);
                session.advance(UserStep::AddOffer(ServiceField::Duration));
                Ok(Reply::text(field_prompt(ServiceField::Duration)))
            }
            None => Ok(Reply::text("Цена должна быть неотрицательным числом. Введите цену:")),
        },
        ServiceField::Duration => {
            let Some(duration) = parse_minutes(text) else {
                return Ok(Reply::text(
                    "Длительность должна быть целым числом минут больше нуля. Введите длительность:",
                ));
            };
            let form = session.form.clone();
            session.reset();
            let offer = services::add_offer(
                ctx.db,
                &form.name.unwrap_or_default(),
                &form.description.unwrap_or_default(),
                form.price.unwrap_or_default(),
                duration,
            )
            .await?;
            let card = offer_card(ctx, &offer.id).await?;
            Ok(Reply {
                text: format!("✅ Спецпредложение добавлено\n\n{}", card.text),
                ..card
            })
        }
    }
}

async fn edit_offer_step(
    ctx: &Ctx<'_>,
    session: &mut UserSession,
    field: ServiceField,
    text: &str,
) -> Result<Reply> {
    let Some(offer_id) = session.form.target_id.clone() else {
        session.reset();
        return Ok(Reply::text("Предложение не найдено"));
    };
    let mut patch = OfferPatch::default();
    match field {
        ServiceField::Name if !text.is_empty() => patch.name = Some(text.to_string()),
        ServiceField::Name => return Ok(Reply::text(field_prompt(field))),
        ServiceField::Description => patch.description = Some(optional_text(text)),
        ServiceField::Price => match parse_amount(text) {
            Some(price) => patch.price = Some(price),
            None => return Ok(Reply::text("Цена должна быть неотрицательным числом. Введите цену:")),
        },
        ServiceField::Duration => match parse_minutes(text) {
            Some(duration) => patch.duration = Some(duration),
            None => {
                return Ok(Reply::text(
                    "Длительность должна быть целым числом минут больше нуля. Введите длительность:",
                ))
            }
        },
    }
    session.reset();
    if !services::update_offer(ctx.db, &offer_id, patch).await? {
        return Ok(Reply::text("Предложение не найдено"));
    }
    offer_card(ctx, &offer_id).await
}

async fn on_offers(ctx: &Ctx<'_>, session: &mut UserSession, parts: &[&str]) -> Result<Reply> {
    match parts {
        ["off", "add"] => {
            session.begin(UserStep::AddOffer(ServiceField::Name));
            Ok(Reply::text("🎁 Новое спецпредложение\n\nВведите название:"))
        }
        ["off", "list"] => {
            let offers = services::get_all_offers(ctx.db).await?;
            if offers.is_empty() {
                return Ok(Reply::menu("Спецпредложений пока нет.", keyboards::offers_menu()));
            }
            Ok(Reply::menu("🎁 Спецпредложения:", keyboards::offer_list(&offers)))
        }
        ["off", "view", id] => offer_card(ctx, id).await,
        ["off", "edit", id, field] => match parse_service_field(field) {
            Some(field) => {
                session.begin(UserStep::EditOffer(field));
                session.form.target_id = Some(id.to_string());
                Ok(Reply::text(field_prompt(field)))
            }
            None => Ok(unknown_action(&parts.join(":"))),
        },
        ["off", "del", id] => Ok(Reply::menu(
            "Удалить спецпредложение?",
            keyboards::confirm_delete(&format!("off:del:{}", id), &format!("off:view:{}", id)),
        )),
        ["off", "del", id, "yes"] => {
            if services::delete_offer(ctx.db, id).await? {
                Ok(Reply::menu("🗑 Спецпредложение удалено.", keyboards::offers_menu()))
            } else {
                Ok(Reply::alert("Предложение не найдено"))
            }
        }
        _ => Ok(unknown_action(&parts.join(":"))),
    }
}

// Мастера

async fn master_card(ctx: &Ctx<'_>, master_id: &str) -> Result<Reply> {
    let Some(master) = masters::get_master(ctx.db, master_id).await? else {
        return Ok(Reply::alert("Мастер не найден"));
    };
    let or_dash = |value: &str| if value.is_empty() { "-".to_string() } else { value.to_string() };
    let telegram = match (master.telegram.is_empty(), master.telegram_id) {
        (false, _) => format!("@{}", master.telegram),
        (true, Some(id)) => id.to_string(),
        (true, None) => "-".to_string(),
    };
    let hours = match master.working_hours.get("1") {
        Some(day) => format!("{} - {}", day.start, day.end),
        None => "-".to_string(),
    };
    let all_services = services::get_all_services(ctx.db).await?;
    let offered = if master.services.is_empty() {
        "все услуги".to_string()
    } else {
        all_services
            .iter()
            .filter(|s| master.services.iter().any(|id| same_id(id, &s.id)))
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };
    Ok(Reply::menu(
        format!(
            "👨‍💼 {}\n\nTelegram: {}\nТелефон: {}\nАдрес: {}\nГеолокация: {}\nОписание: {}\nРабочее время: {}\nУслуги: {}",
            master.name,
            telegram,
            or_dash(&master.phone),
            or_dash(&master.address),
            or_dash(&master.location),
            or_dash(&master.description),
            hours,
            offered
        ),
        keyboards::master_card(&master.id),
    ))
}

/// Reads "@name" or a numeric id; a username of a registered user also yields the chat id.
async fn telegram_patch(ctx: &Ctx<'_>, raw: &str, patch: &mut MasterPatch) -> Result<()> {
    let raw = raw.trim();
    if let Ok(id) = raw.parse::<i64>() {
        patch.telegram_id = Some(id);
        if let Some(user) = users::get_user(ctx.db, id).await? {
            patch.telegram = Some(user.username);
        }
        return Ok(());
    }
    let username = raw.trim_start_matches('@').to_string();
    let known = users::get_all_users(ctx.db)
        .await?
        .into_iter()
        .find(|u| !u.username.is_empty() && u.username.eq_ignore_ascii_case(&username));
    patch.telegram_id = known.map(|u| u.user_id);
    patch.telegram = Some(username);
    Ok(())
}

/// Add-master wizard; `None` skips the optional field.
async fn add_master_step(
    ctx: &Ctx<'_>,
    session: &mut UserSession,
    field: MasterField,
    input: Option<&str>,
) -> Result<Reply> {
    let value = input.map(optional_text).unwrap_or_default();
    match field {
        MasterField::Name => {
            if value.is_empty() {
                return Ok(Reply::text(master_prompt(MasterField::Name)));
            }
            session.form.name = Some(value);
            session.advance(UserStep::AddMaster(MasterField::Telegram));
            Ok(Reply::menu(master_prompt(MasterField::Telegram), keyboards::skip_step()))
        }
        MasterField::Telegram => {
            session.form.telegram = Some(value);
            session.advance(UserStep::AddMaster(MasterField::Address));
            Ok(Reply::menu(master_prompt(MasterField::Address), keyboards::skip_step()))
        }
        MasterField::Address => {
            session.form.address = Some(value);
            session.advance(UserStep::AddMaster(MasterField::Location));
            Ok(Reply::menu(master_prompt(MasterField::Location), keyboards::skip_step()))
        }
        _ => {
            let form = session.form.clone();
            session.reset();
            let mut patch = MasterPatch {
                address: form.address,
                location: Some(value),
                ..Default::default()
            };
            if let Some(telegram) = form.telegram.filter(|t| !t.is_empty()) {
                telegram_patch(ctx, &telegram, &mut patch).await?;
            }
            let master = masters::add_master(ctx.db, &form.name.unwrap_or_default(), patch).await?;
            let card = master_card(ctx, &master.id).await?;
            Ok(Reply {
                text: format!("✅ Мастер добавлен\n\n{}", card.text),
                ..card
            })
        }
    }
}

async fn edit_master_step(
    ctx: &Ctx<'_>,
    session: &mut UserSession,
    field: MasterField,
    text: &str,
) -> Result<Reply> {
    let Some(master_id) = session.form.target_id.clone() else {
        session.reset();
        return Ok(Reply::text("Мастер не найден"));
    };
    match field {
        MasterField::WorkStart => {
            if parse_clock(text).is_none() {
                return Ok(Reply::text("Неверный формат времени. Введите время в формате ЧЧ:ММ:"));
            }
            session.form.work_start = Some(text.to_string());
            session.advance(UserStep::EditMaster(MasterField::WorkEnd));
            Ok(Reply::text(master_prompt(MasterField::WorkEnd)))
        }
        MasterField::WorkEnd => {
            let start = session.form.work_start.clone().unwrap_or_default();
            let (Some(from), Some(to)) = (parse_clock(&start), parse_clock(text)) else {
                return Ok(Reply::text("Неверный формат времени. Введите время в формате ЧЧ:ММ:"));
            };
            if to <= from {
                return Ok(Reply::text(
                    "Время окончания должно быть позже времени начала. Введите время окончания:",
                ));
            }
            session.reset();
            let hours = uniform_working_hours(start.trim(), text.trim());
            if !masters::update_master_working_hours(ctx.db, &master_id, hours).await? {
                return Ok(Reply::text("Мастер не найден"));
            }
            master_card(ctx, &master_id).await
        }
        field => {
            let mut patch = MasterPatch::default();
            let value = optional_text(text);
            match field {
                MasterField::Name if value.is_empty() => {
                    return Ok(Reply::text(master_prompt(MasterField::Name)))
                }
                MasterField::Name => patch.name = Some(value),
                MasterField::Telegram => telegram_patch(ctx, &value, &mut patch).await?,
                MasterField::Phone => patch.phone = Some(value),
                MasterField::Address => patch.address = Some(value),
                MasterField::Location => patch.location = Some(value),
                _ => patch.description = Some(value),
            }
            session.reset();
            if !masters::update_master(ctx.db, &master_id, patch).await? {
                return Ok(Reply::text("Мастер не найден"));
            }
            master_card(ctx, &master_id).await
        }
    }
}

async fn on_masters(ctx: &Ctx<'_>, session: &mut UserSession, parts: &[&str]) -> Result<Reply> {
    match parts {
        ["mst", "add"] => {
            session.begin(UserStep::AddMaster(MasterField::Name));
            Ok(Reply::text("👨‍💼 Новый мастер\n\nВведите имя мастера:"))
        }
        ["mst", "list"] => {
            let all = masters::get_all_masters(ctx.db).await?;
            if all.is_empty() {
                return Ok(Reply::menu("Мастеров пока нет.", keyboards::masters_menu()));
            }
            Ok(Reply::menu("👨‍💼 Мастера:", keyboards::master_list(&all)))
        }
        ["mst", "view", id] => master_card(ctx, id).await,
        ["mst", "edit", id] => Ok(Reply::menu(
            "Что вы хотите изменить?",
            keyboards::master_fields(id),
        )),
        ["mst", "edit", id, field] => match parse_master_field(field) {
            Some(field) => {
                session.begin(UserStep::EditMaster(field));
                session.form.target_id = Some(id.to_string());
                Ok(Reply::text(master_prompt(field)))
            }
            None => Ok(unknown_action(&parts.join(":"))),
        },
        ["mst", "hours", id] => {
            session.begin(UserStep::EditMaster(MasterField::WorkStart));
            session.form.target_id = Some(id.to_string());
            Ok(Reply::text(master_prompt(MasterField::WorkStart)))
        }
        ["mst", "svcs", id] => {
            let assigned = masters::get_master_services(ctx.db, id).await?;
            let all = services::get_all_services(ctx.db).await?;
            Ok(Reply::menu(
                "Отметьте услуги мастера (без отметок мастер выполняет все услуги):",
                keyboards::master_services(id, &all, &assigned),
            ))
        }
        ["mst", "svc", id, service_id] => {
            let Some(now_assigned) = masters::toggle_master_service(ctx.db, id, service_id).await?
            else {
                return Ok(Reply::alert("Мастер не найден"));
            };
            let assigned = masters::get_master_services(ctx.db, id).await?;
            let all = services::get_all_services(ctx.db).await?;
            Ok(Reply::menu(
                "Отметьте услуги мастера (без отметок мастер выполняет все услуги):",
                keyboards::master_services(id, &all, &assigned),
            )
            .with_alert(if now_assigned { "Услуга добавлена" } else { "Услуга убрана" }))
        }
        ["mst", "del", id] => Ok(Reply::menu(
            "Удалить мастера?",
            keyboards::confirm_delete(&format!("mst:del:{}", id), &format!("mst:view:{}", id)),
        )),
        ["mst", "del", id, "yes"] => {
            if masters::delete_master(ctx.db, id).await? {
                Ok(Reply::menu("🗑 Мастер удален.", keyboards::masters_menu()))
            } else {
                Ok(Reply::alert("Мастер не найден"))
            }
        }
        ["mst", "skip"] => match session.step {
            UserStep::AddMaster(field) if field != MasterField::Name => {
                add_master_step(ctx, session, field, None).await
            }
            _ => Ok(Reply::alert("Этот шаг нельзя пропустить")),
        },
        _ => Ok(unknown_action(&parts.join(":"))),
    }
}

// Записи

async fn appointment_days(ctx: &Ctx<'_>) -> Result<Reply> {
    let dates = appointments::upcoming_dates(ctx.db, ctx.today()).await?;
    if dates.is_empty() {
        return Ok(Reply::menu("Предстоящих записей нет.", keyboards::back("admin")));
    }
    Ok(Reply::menu(
        "📅 Выберите дату:",
        keyboards::appointment_dates(&dates),
    ))
}

async fn appointments_on(ctx: &Ctx<'_>, raw: &str) -> Result<Reply> {
    let Some(date) = parse_date(raw) else {
        return Ok(Reply::alert("Неверная дата"));
    };
    let day = appointments::get_appointments_by_date(ctx.db, date).await?;
    let views = appointments::enrich(ctx.db, day).await?;
    let mut text = format!("📅 Записи на {}:\n", format_date(date));
    let mut buttons = Vec::new();
    for view in &views {
        let a = &view.appointment;
        text.push_str(&format!(
            "\n{} - {} ({}) {}",
            a.time,
            view.service_name,
            view.master_name,
            a.status.label()
        ));
        buttons.push((a.id.clone(), format!("{} {}", a.time, view.service_name)));
    }
    if views.is_empty() {
        text.push_str("\nЗаписей нет.");
    }
    Ok(Reply::menu(text, keyboards::appointment_list(&buttons)))
}

async fn appointment_card(ctx: &Ctx<'_>, appointment_id: &str) -> Result<Reply> {
    let Some(appointment) = appointments::get_appointment(ctx.db, appointment_id).await? else {
        return Ok(Reply::alert("Запись не найдена"));
    };
    let client = users::get_user(ctx.db, appointment.user_id)
        .await?
        .map(|u| u.display_name())
        .unwrap_or_else(|| appointment.user_id.to_string());
    let views = appointments::enrich(ctx.db, vec![appointment.clone()]).await?;
    let (service_name, price, master_name) = views
        .first()
        .map(|v| (v.service_name.clone(), v.service_price, v.master_name.clone()))
        .unwrap_or_default();
    let mut text = format!(
        "📋 Запись #{}\n\nКлиент: {}\nУслуга: {} ({} руб.)\nМастер: {}\nДата: {}\nВремя: {}\nСтатус: {}",
        appointment.id,
        client,
        service_name,
        format_amount(price),
        master_name,
        format_date(appointment.date),
        appointment.time,
        appointment.status.label()
    );
    if !appointment.payment_method.is_empty() {
        text.push_str(&format!("\nОплата: {}", payment_label(&appointment.payment_method)));
    }
    Ok(Reply::menu(text, keyboards::appointment_card(&appointment)))
}

fn payment_label(method: &str) -> &str {
    match method {
        "cash" => "наличные",
        "card" => "карта",
        "transfer" => "перевод",
        other => other,
    }
}

async fn confirm_appointment(ctx: &Ctx<'_>, appointment_id: &str) -> Result<Reply> {
    let Some(appointment) = appointments::get_appointment(ctx.db, appointment_id).await? else {
        return Ok(Reply::alert("Запись не найдена"));
    };
    if appointment.status != AppointmentStatus::Pending {
        return Ok(Reply::alert("Запись уже обработана"));
    }
    appointments::update_appointment_status(ctx.db, &appointment.id, AppointmentStatus::Confirmed)
        .await?;
    appointments::verify_user(ctx.db, appointment.user_id).await?;
    info!("Admin {} confirmed appointment {}", ctx.user.user_id, appointment.id);
    Ok(appointment_card(ctx, &appointment.id)
        .await?
        .with_alert("✅ Запись подтверждена")
        .notify(
            appointment.user_id,
            format!(
                "✅ Ваша запись на {} в {} подтверждена!",
                format_date(appointment.date),
                appointment.time
            ),
        ))
}

async fn complete(ctx: &Ctx<'_>, appointment_id: &str) -> Result<Reply> {
    let Some(appointment) = appointments::get_appointment(ctx.db, appointment_id).await? else {
        return Ok(Reply::alert("Запись не найдена"));
    };
    if !appointment.status.is_open() {
        return Ok(Reply::alert("Запись уже обработана"));
    }
    appointments::complete_appointment(ctx.db, &appointment.id).await?;
    finance::update_client_stats(ctx.db, appointment.user_id, ctx.today()).await?;
    appointment_card(ctx, &appointment.id)
        .await
        .map(|r| r.with_alert("✓ Запись отмечена как выполненная"))
}

/// Paid visit: analytics of the acting admin, client stats and history.
async fn mark_paid(ctx: &Ctx<'_>, appointment_id: &str) -> Result<Reply> {
    let Some(appointment) = appointments::get_appointment(ctx.db, appointment_id).await? else {
        return Ok(Reply::alert("Запись не найдена"));
    };
    match appointment.status {
        AppointmentStatus::Paid => return Ok(Reply::alert("Запись уже оплачена")),
        AppointmentStatus::Canceled => return Ok(Reply::alert("Запись отменена")),
        _ => {}
    }

    let income = services::get_service(ctx.db, &appointment.service_id)
        .await?
        .map(|s| s.price)
        .unwrap_or(0.0);
    let expenses = finance::get_service_costs(ctx.db, &appointment.service_id)
        .await?
        .total();

    // Stats count paid visits, so the status goes first and is restored when a
    // later write fails. Income is written last so a retry never counts it twice.
    appointments::update_appointment_status(ctx.db, &appointment.id, AppointmentStatus::Paid).await?;
    let recorded = async {
        finance::update_client_stats(ctx.db, appointment.user_id, ctx.today()).await?;
        appointments::record_history(ctx.db, &appointment, income, ctx.now).await?;
        finance::record_paid_visit(ctx.db, ctx.user.user_id, ctx.today(), income, expenses).await
    }
    .await;
    if let Err(e) = recorded {
        warn!("Could not record payment of appointment {}: {}", appointment.id, e);
        appointments::update_appointment_status(ctx.db, &appointment.id, appointment.status).await?;
        return Err(e);
    }
    info!(
        "Appointment {} paid: {} income, {} expenses",
        appointment.id,
        format_amount(income),
        format_amount(expenses)
    );

    Ok(Reply::menu(
        format!(
            "💰 Запись #{} отмечена как оплаченная ({} руб.).\n\nВыберите способ оплаты:",
            appointment.id,
            format_amount(income)
        ),
        keyboards::payment_methods(&appointment.id),
    ))
}

async fn cancel(ctx: &Ctx<'_>, appointment_id: &str) -> Result<Reply> {
    let Some(appointment) = appointments::get_appointment(ctx.db, appointment_id).await? else {
        return Ok(Reply::alert("Запись не найдена"));
    };
    if matches!(
        appointment.status,
        AppointmentStatus::Canceled | AppointmentStatus::Paid
    ) {
        return Ok(Reply::alert("Запись уже обработана"));
    }
    appointments::cancel_appointment(ctx.db, &appointment.id).await?;
    info!("Admin {} canceled appointment {}", ctx.user.user_id, appointment.id);
    Ok(appointment_card(ctx, &appointment.id)
        .await?
        .with_alert("❌ Запись отменена")
        .notify(
            appointment.user_id,
            format!(
                "❌ Ваша запись на {} в {} отменена администратором.",
                format_date(appointment.date),
                appointment.time
            ),
        ))
}

async fn on_appointments(ctx: &Ctx<'_>, parts: &[&str]) -> Result<Reply> {
    match parts {
        ["apt", "days"] => appointment_days(ctx).await,
        ["apt", "date", raw] => appointments_on(ctx, raw).await,
        ["apt", "view", id] => appointment_card(ctx, id).await,
        ["apt", "confirm", id] => confirm_appointment(ctx, id).await,
        ["apt", "done", id] => complete(ctx, id).await,
        ["apt", "paid", id] => mark_paid(ctx, id).await,
        ["apt", "pay", id, method] => {
            if !matches!(*method, "cash" | "card" | "transfer") {
                return Ok(unknown_action(&parts.join(":")));
            }
            if !appointments::update_appointment_payment(ctx.db, id, method).await? {
                return Ok(Reply::alert("Запись не найдена"));
            }
            appointment_card(ctx, id)
                .await
                .map(|r| r.with_alert("Способ оплаты сохранен"))
        }
        ["apt", "cancel", id] => Ok(Reply::menu(
            "Вы уверены, что хотите отменить запись?",
            keyboards::confirm_cancel_appointment(id),
        )),
        ["apt", "cancel", id, "yes"] => cancel(ctx, id).await,
        ["apt", "later", _] => Ok(Reply::alert("⏰ Напомню через час")),
        _ => Ok(unknown_action(&parts.join(":"))),
    }
}

pub async fn on_callback(ctx: &Ctx<'_>, session: &mut UserSession, parts: &[&str]) -> Result<Reply> {
    match parts.first().copied().unwrap_or_default() {
        "admin" => {
            session.reset();
            Ok(menu())
        }
        "adm" => {
            session.reset();
            match parts {
                ["adm", "services"] => Ok(Reply::menu("🛠️ Управление услугами", keyboards::services_menu())),
                ["adm", "categories"] => Ok(Reply::menu("📁 Управление категориями", keyboards::categories_menu())),
                ["adm", "offers"] => Ok(Reply::menu("🎁 Управление спецпредложениями", keyboards::offers_menu())),
                ["adm", "masters"] => Ok(Reply::menu("👨‍💼 Управление мастерами", keyboards::masters_menu())),
                ["adm", "appts"] => appointment_days(ctx).await,
                _ => Ok(unknown_action(&parts.join(":"))),
            }
        }
        "svc" => on_services(ctx, session, parts).await,
        "tpl" => on_templates(ctx, session, parts).await,
        "cat" => on_categories(ctx, session, parts).await,
        "off" => on_offers(ctx, session, parts).await,
        "mst" => on_masters(ctx, session, parts).await,
        "apt" => on_appointments(ctx, parts).await,
        _ => Ok(unknown_action(&parts.join(":"))),
    }
}

pub async fn on_text(ctx: &Ctx<'_>, session: &mut UserSession, text: &str) -> Result<Reply> {
    match session.step {
        UserStep::AddService(field) => add_service_step(ctx, session, field, text).await,
        UserStep::ServiceCategoryPick => {
            let categories = services::get_all_categories(ctx.db).await?;
            Ok(Reply::menu(
                "Выберите категорию кнопкой ниже:",
                keyboards::new_service_category(&categories),
            ))
        }
        UserStep::EditService(field) => edit_service_step(ctx, session, field, text).await,
        UserStep::AddOffer(field) => add_offer_step(ctx, session, field, text).await,
        UserStep::EditOffer(field) => edit_offer_step(ctx, session, field, text).await,
        UserStep::CategoryName => {
            if text.is_empty() {
                return Ok(Reply::text("Введите название новой категории:"));
            }
            session.reset();
            let category = services::add_category(ctx.db, text).await?;
            Ok(Reply::menu(
                format!("✅ Категория «{}» сохранена", category.name),
                keyboards::categories_menu(),
            ))
        }
        UserStep::EditCategoryName => {
            if text.is_empty() {
                return Ok(Reply::text("Введите новое название категории:"));
            }
            let category_id = session.form.target_id.clone().unwrap_or_default();
            session.reset();
            if !services::update_category(ctx.db, &category_id, text).await? {
                return Ok(Reply::text("Категория не найдена"));
            }
            category_card(ctx, &category_id).await
        }
        UserStep::CategoryPrice => {
            let Some(price) = parse_amount(text) else {
                return Ok(Reply::text("Цена должна быть неотрицательным числом. Введите цену:"));
            };
            let category_id = session.form.target_id.clone().unwrap_or_default();
            session.reset();
            let updated = services::set_category_price(ctx.db, &category_id, price).await?;
            Ok(Reply::menu(
                format!(
                    "✅ Цена {} руб. установлена для услуг: {}",
                    format_amount(price),
                    updated
                ),
                keyboards::services_menu(),
            ))
        }
        UserStep::AddMaster(field) => add_master_step(ctx, session, field, Some(text)).await,
        UserStep::EditMaster(field) => edit_master_step(ctx, session, field, text).await,
        _ => {
            session.reset();
            Ok(menu())
        }
    }
}
