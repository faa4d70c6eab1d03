use std::collections::BTreeMap;

use crate::db::Db;
use crate::error::Result;
use crate::models::{Category, Offer, Service, ServiceTemplate};
use crate::sheets::same_id;

pub const UNCATEGORIZED: &str = "Без категории";

/// Fields to overwrite; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct ServicePatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub duration: Option<u32>,
    /// `Some(None)` unlinks the category
    pub category_id: Option<Option<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct OfferPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub duration: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplateImport {
    Added { category: Category, added: usize },
    NoTemplates,
}

pub async fn get_all_services(db: &Db) -> Result<Vec<Service>> {
    db.load::<Service>().await
}

pub async fn get_service(db: &Db, service_id: &str) -> Result<Option<Service>> {
    Ok(get_all_services(db)
        .await?
        .into_iter()
        .find(|s| same_id(&s.id, service_id)))
}

/// Services grouped by category name; unknown or empty categories go to [`UNCATEGORIZED`].
pub async fn services_by_category(db: &Db) -> Result<BTreeMap<String, Vec<Service>>> {
    let categories = get_all_categories(db).await?;
    let mut grouped: BTreeMap<String, Vec<Service>> = BTreeMap::new();
    for service in get_all_services(db).await? {
        let name = service
            .category_id
            .as_deref()
            .and_then(|cid| categories.iter().find(|c| same_id(&c.id, cid)))
            .map(|c| c.name.clone())
            .unwrap_or_else(|| UNCATEGORIZED.to_string());
        grouped.entry(name).or_default().push(service);
    }
    Ok(grouped)
}

/// `None` selects services without a category.
pub async fn get_services_in_category(db: &Db, category_id: Option<&str>) -> Result<Vec<Service>> {
    Ok(get_all_services(db)
        .await?
        .into_iter()
        .filter(|s| match (s.category_id.as_deref(), category_id) {
            (Some(own), Some(wanted)) => same_id(own, wanted),
            (None, None) => true,
            _ => false,
        })
        .collect())
}

pub async fn add_service(
    db: &Db,
    name: &str,
    description: &str,
    price: f64,
    duration: u32,
    category_id: Option<String>,
) -> Result<Service> {
    let mut services = get_all_services(db).await?;
    let service = Service {
        id: db.next_id::<Service>().await?,
        name: name.to_string(),
        description: description.to_string(),
        price,
        duration,
        category_id,
    };
    services.push(service.clone());
    db.save(&services).await?;
    Ok(service)
}

pub async fn update_service(db: &Db, service_id: &str, patch: ServicePatch) -> Result<bool> {
    let mut services = get_all_services(db).await?;
    let Some(service) = services.iter_mut().find(|s| same_id(&s.id, service_id)) else {
        return Ok(false);
    };
    if let Some(name) = patch.name {
        service.name = name;
    }
    if let Some(description) = patch.description {
        service.description = description;
    }
    if let Some(price) = patch.price {
        service.price = price;
    }
    if let Some(duration) = patch.duration {
        service.duration = duration;
    }
    if let Some(category_id) = patch.category_id {
        service.category_id = category_id;
    }
    db.save(&services).await?;
    Ok(true)
}

pub async fn delete_service(db: &Db, service_id: &str) -> Result<bool> {
    let mut services = get_all_services(db).await?;
    let before = services.len();
    services.retain(|s| !same_id(&s.id, service_id));
    if services.len() == before {
        return Ok(false);
    }
    db.save(&services).await?;
    Ok(true)
}

pub async fn get_all_categories(db: &Db) -> Result<Vec<Category>> {
    db.load::<Category>().await
}

pub async fn get_category(db: &Db, category_id: &str) -> Result<Option<Category>> {
    Ok(get_all_categories(db)
        .await?
        .into_iter()
        .find(|c| same_id(&c.id, category_id)))
}

pub async fn get_category_by_name(db: &Db, name: &str) -> Result<Option<Category>> {
    let wanted = name.trim().to_lowercase();
    Ok(get_all_categories(db)
        .await?
        .into_iter()
        .find(|c| c.name.to_lowercase() == wanted))
}

/// Returns the existing category when the name is already taken.
pub async fn add_category(db: &Db, name: &str) -> Result<Category> {
    let mut categories = get_all_categories(db).await?;
    let wanted = name.trim().to_lowercase();
    if let Some(existing) = categories.iter().find(|c| c.name.to_lowercase() == wanted) {
        return Ok(existing.clone());
    }

    let category = Category {
        id: db.next_id::<Category>().await?,
        name: name.trim().to_string(),
    };
    categories.push(category.clone());
    db.save(&categories).await?;
    Ok(category)
}

pub async fn update_category(db: &Db, category_id: &str, name: &str) -> Result<bool> {
    let mut categories = get_all_categories(db).await?;
    let Some(category) = categories.iter_mut().find(|c| same_id(&c.id, category_id)) else {
        return Ok(false);
    };
    category.name = name.trim().to_string();
    db.save(&categories).await?;
    Ok(true)
}

/// Deletes the category and unlinks its services.
pub async fn delete_category(db: &Db, category_id: &str) -> Result<bool> {
    let mut categories = get_all_categories(db).await?;
    let before = categories.len();
    categories.retain(|c| !same_id(&c.id, category_id));
    if categories.len() == before {
        return Ok(false);
    }
    db.save(&categories).await?;

    let mut services = get_all_services(db).await?;
    let mut unlinked = 0;
    for service in services.iter_mut() {
        if service
            .category_id
            .as_deref()
            .is_some_and(|cid| same_id(cid, category_id))
        {
            service.category_id = None;
            unlinked += 1;
        }
    }
    if unlinked > 0 {
        db.save(&services).await?;
        info!("Unlinked {} services from deleted category {}", unlinked, category_id);
    }
    Ok(true)
}

/// Sets one price on every service of the category; returns how many were updated.
pub async fn set_category_price(db: &Db, category_id: &str, price: f64) -> Result<usize> {
    let mut services = get_all_services(db).await?;
    let mut updated = 0;
    for service in services.iter_mut() {
        if service
            .category_id
            .as_deref()
            .is_some_and(|cid| same_id(cid, category_id))
        {
            service.price = price;
            updated += 1;
        }
    }
    if updated > 0 {
        db.save(&services).await?;
    }
    Ok(updated)
}

pub async fn get_all_offers(db: &Db) -> Result<Vec<Offer>> {
    db.load::<Offer>().await
}

pub async fn get_offer(db: &Db, offer_id: &str) -> Result<Option<Offer>> {
    Ok(get_all_offers(db)
        .await?
        .into_iter()
        .find(|o| same_id(&o.id, offer_id)))
}

pub async fn add_offer(
    db: &Db,
    name: &str,
    description: &str,
    price: f64,
    duration: u32,
) -> Result<Offer> {
    let mut offers = get_all_offers(db).await?;
    let offer = Offer {
        id: db.next_id::<Offer>().await?,
        name: name.to_string(),
        description: description.to_string(),
        price,
        duration,
    };
    offers.push(offer.clone());
    db.save(&offers).await?;
    Ok(offer)
}

pub async fn update_offer(db: &Db, offer_id: &str, patch: OfferPatch) -> Result<bool> {
    let mut offers = get_all_offers(db).await?;
    let Some(offer) = offers.iter_mut().find(|o| same_id(&o.id, offer_id)) else {
        return Ok(false);
    };
    if let Some(name) = patch.name {
        offer.name = name;
    }
    if let Some(description) = patch.description {
        offer.description = description;
    }
    if let Some(price) = patch.price {
        offer.price = price;
    }
    if let Some(duration) = patch.duration {
        offer.duration = duration;
    }
    db.save(&offers).await?;
    Ok(true)
}

pub async fn delete_offer(db: &Db, offer_id: &str) -> Result<bool> {
    let mut offers = get_all_offers(db).await?;
    let before = offers.len();
    offers.retain(|o| !same_id(&o.id, offer_id));
    if offers.len() == before {
        return Ok(false);
    }
    db.save(&offers).await?;
    Ok(true)
}

/// Sorted, de-duplicated template category names.
pub async fn get_template_categories(db: &Db) -> Result<Vec<String>> {
    let mut names: Vec<String> = db
        .load::<ServiceTemplate>()
        .await?
        .into_iter()
        .map(|t| t.category_name)
        .collect();
    names.sort();
    names.dedup();
    Ok(names)
}

pub async fn get_templates_in_category(db: &Db, category_name: &str) -> Result<Vec<ServiceTemplate>> {
    Ok(db
        .load::<ServiceTemplate>()
        .await?
        .into_iter()
        .filter(|t| t.category_name == category_name)
        .collect())
}

/// Creates the category if needed and adds every template service it lacks, priced at 0.
pub async fn add_template_services_to_category(db: &Db, category_name: &str) -> Result<TemplateImport> {
    let templates = get_templates_in_category(db, category_name).await?;
    if templates.is_empty() {
        return Ok(TemplateImport::NoTemplates);
    }

    let category = match get_category_by_name(db, category_name).await? {
        Some(category) => category,
        None => add_category(db, category_name).await?,
    };

    let mut services = get_all_services(db).await?;
    let mut id: i64 = db.next_id::<Service>().await?.parse().unwrap_or(1);
    let mut added = 0;
    for template in templates {
        let exists = services.iter().any(|s| {
            s.name == template.service_name
                && s.category_id.as_deref().is_some_and(|cid| same_id(cid, &category.id))
        });
        if exists {
            continue;
        }
        let duration = if template.default_duration == 0 {
            60
        } else {
            template.default_duration
        };
        services.push(Service {
            id: id.to_string(),
            name: template.service_name,
            description: template.description,
            price: 0.0,
            duration,
            category_id: Some(category.id.clone()),
        });
        id += 1;
        added += 1;
    }
    if added > 0 {
        db.save(&services).await?;
    }
    Ok(TemplateImport::Added { category, added })
}

const DEFAULT_TEMPLATES: &[(&str, &str, &str, u32)] = &[
    ("Маникюр", "Классический маникюр", "Обработка кутикулы и придание формы", 60),
    ("Маникюр", "Маникюр с покрытием гель-лак", "Маникюр и однотонное покрытие", 90),
    ("Маникюр", "Снятие покрытия", "Снятие гель-лака с уходом", 30),
    ("Педикюр", "Классический педикюр", "Обработка стоп и ногтей", 60),
    ("Педикюр", "Педикюр с покрытием", "Педикюр и покрытие гель-лаком", 90),
    ("Парикмахерские услуги", "Женская стрижка", "Стрижка с мытьём и укладкой", 60),
    ("Парикмахерские услуги", "Мужская стрижка", "Стрижка машинкой и ножницами", 45),
    ("Парикмахерские услуги", "Окрашивание", "Окрашивание в один тон", 120),
    ("Брови и ресницы", "Коррекция бровей", "Коррекция формы пинцетом или воском", 30),
    ("Брови и ресницы", "Окрашивание бровей", "Окрашивание краской или хной", 30),
    ("Брови и ресницы", "Наращивание ресниц", "Классическое наращивание", 120),
    ("Косметология", "Чистка лица", "Комбинированная чистка", 90),
    ("Косметология", "Уходовая процедура", "Увлажняющий уход по типу кожи", 60),
];

/// Seeds the template sheet on first run.
pub async fn initialize_template_data(db: &Db) -> Result<()> {
    if !db.load::<ServiceTemplate>().await?.is_empty() {
        return Ok(());
    }
    let templates: Vec<ServiceTemplate> = DEFAULT_TEMPLATES
        .iter()
        .map(|(category, service, description, duration)| ServiceTemplate {
            category_name: category.to_string(),
            service_name: service.to_string(),
            description: description.to_string(),
            default_duration: *duration,
        })
        .collect();
    db.save(&templates).await?;
    info!("Seeded {} service templates", templates.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_add_and_patch_service() {
        let db = Db::memory();
        let first = add_service(&db, "Cut", "", 1000.0, 60, None).await.unwrap();
        let second = add_service(&db, "Color", "", 2000.0, 120, None).await.unwrap();
        assert_eq!(first.id, "1");
        assert_eq!(second.id, "2");

        let patch = ServicePatch {
            price: Some(1500.0),
            ..Default::default()
        };
        assert!(update_service(&db, "1", patch).await.unwrap());
        let service = get_service(&db, "1.0").await.unwrap().unwrap();
        assert_eq!(service.price, 1500.0);
        assert_eq!(service.name, "Cut");

        assert!(!update_service(&db, "9", ServicePatch::default()).await.unwrap());
        assert!(delete_service(&db, "2").await.unwrap());
        assert!(!delete_service(&db, "2").await.unwrap());
    }

    #[tokio::test]
    async fn test_add_category_returns_existing_on_duplicate_name() {
        let db = Db::memory();
        let nails = add_category(&db, "Nails").await.unwrap();
        let again = add_category(&db, " nails ").await.unwrap();
        assert_eq!(nails, again);
        assert_eq!(get_all_categories(&db).await.unwrap().len(), 1);
        assert_eq!(get_category_by_name(&db, "NAILS").await.unwrap(), Some(nails));
    }

    #[tokio::test]
    async fn test_delete_category_unlinks_services() {
        let db = Db::memory();
        let hair = add_category(&db, "Hair").await.unwrap();
        add_service(&db, "Cut", "", 1000.0, 60, Some(hair.id.clone())).await.unwrap();
        add_service(&db, "Loose", "", 500.0, 30, None).await.unwrap();

        assert!(delete_category(&db, &hair.id).await.unwrap());
        let uncategorized = get_services_in_category(&db, None).await.unwrap();
        assert_eq!(uncategorized.len(), 2);

        let grouped = services_by_category(&db).await.unwrap();
        assert_eq!(grouped[UNCATEGORIZED].len(), 2);
    }

    #[tokio::test]
    async fn test_template_import_skips_existing_and_bulk_price() {
        let db = Db::memory();
        initialize_template_data(&db).await.unwrap();
        let categories = get_template_categories(&db).await.unwrap();
        assert!(categories.contains(&"Маникюр".to_string()));

        let TemplateImport::Added { category, added } =
            add_template_services_to_category(&db, "Маникюр").await.unwrap()
        else {
            panic!("templates expected");
        };
        assert_eq!(added, 3);
        let again = add_template_services_to_category(&db, "Маникюр").await.unwrap();
        assert_eq!(
            again,
            TemplateImport::Added {
                category: category.clone(),
                added: 0
            }
        );

        assert_eq!(set_category_price(&db, &category.id, 1200.0).await.unwrap(), 3);
        let services = get_services_in_category(&db, Some(&category.id)).await.unwrap();
        assert!(services.iter().all(|s| s.price == 1200.0));

        assert_eq!(
            add_template_services_to_category(&db, "Unknown").await.unwrap(),
            TemplateImport::NoTemplates
        );
    }

    #[tokio::test]
    async fn test_offer_crud() {
        let db = Db::memory();
        let offer = add_offer(&db, "Spring", "-20%", 800.0, 60).await.unwrap();
        let patch = OfferPatch {
            name: Some("Summer".into()),
            ..Default::default()
        };
        assert!(update_offer(&db, &offer.id, patch).await.unwrap());
        assert_eq!(get_offer(&db, &offer.id).await.unwrap().unwrap().name, "Summer");
        assert!(delete_offer(&db, &offer.id).await.unwrap());
        assert!(get_all_offers(&db).await.unwrap().is_empty());
    }
}
