use log::{info, warn};
use std::sync::Arc;

use crate::config::{Backend, Config};
use crate::error::{BotError, Result};
use crate::models::TABLES;
use crate::sheets::{
    grid_from_records, next_id, records_from_grid, GoogleSheets, MemorySheets, Record, Row, SheetStore,
};

/// Handle to the spreadsheet used as the bot's database.
#[derive(Clone)]
pub struct Db {
    store: Arc<dyn SheetStore>,
}

impl Db {
    pub fn new(store: Arc<dyn SheetStore>) -> Self {
        Db { store }
    }

    pub fn memory() -> Self {
        Db::new(Arc::new(MemorySheets::new()))
    }

    pub fn store(&self) -> &Arc<dyn SheetStore> {
        &self.store
    }

    /// Raw records of the model's worksheet. A missing worksheet reads as empty.
    async fn records<T: Row>(&self) -> Result<Vec<Record>> {
        match self.store.read_grid(T::SHEET).await {
            Ok(grid) => Ok(records_from_grid(&grid)),
            Err(BotError::NotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// All parsable rows of the model's worksheet.
    pub async fn load<T: Row>(&self) -> Result<Vec<T>> {
        let mut rows = Vec::new();
        for (i, record) in self.records::<T>().await?.iter().enumerate() {
            match T::from_record(record) {
                Some(row) => rows.push(row),
                // +2: header row and 1-based numbering
                None => warn!("Skipping unreadable row {} in {}", i + 2, T::SHEET),
            }
        }
        Ok(rows)
    }

    /// Rewrites the worksheet with these rows. Rows the model cannot read are
    /// kept as they are, after the given ones.
    pub async fn save<T: Row>(&self, rows: &[T]) -> Result<()> {
        let mut records: Vec<_> = rows.iter().map(Row::to_record).collect();
        records.extend(
            self.records::<T>()
                .await?
                .into_iter()
                .filter(|record| T::from_record(record).is_none()),
        );
        self.store
            .write_grid(T::SHEET, grid_from_records(T::HEADERS, &records))
            .await
    }

    pub async fn append<T: Row>(&self, row: T) -> Result<()> {
        let mut rows = self.load::<T>().await?;
        rows.push(row);
        self.save(&rows).await
    }

    /// Next free id of the worksheet, counting rows the model cannot read.
    pub async fn next_id<T: Row>(&self) -> Result<String> {
        let records = self.records::<T>().await?;
        Ok(next_id(records.iter().filter_map(|r| r.get("id")).map(String::as_str)))
    }

    /// Creates every missing worksheet with its header row.
    pub async fn setup(&self) -> Result<()> {
        let existing = self.store.sheet_titles().await?;
        for (title, headers) in TABLES {
            if existing.iter().any(|t| t == title) {
                continue;
            }
            info!("Creating worksheet {}", title);
            self.store.add_sheet(title, headers).await?;
        }
        Ok(())
    }
}

pub async fn get_db(config: &Config) -> Result<Db> {
    let db = match config.backend {
        Backend::Google => {
            let sheets =
                GoogleSheets::connect(&config.spreadsheet_id, &config.credentials_file).await?;
            Db::new(Arc::new(sheets))
        }
        Backend::Memory => {
            warn!("Using the in-memory spreadsheet, data is lost on exit");
            Db::memory()
        }
    };
    db.setup().await?;
    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Appointment, Category, Role, User};

    #[tokio::test]
    async fn test_setup_creates_all_sheets_once() {
        let db = Db::memory();
        db.setup().await.unwrap();
        db.setup().await.unwrap();
        let titles = db.store().sheet_titles().await.unwrap();
        assert_eq!(titles.len(), TABLES.len());
    }

    #[tokio::test]
    async fn test_load_skips_broken_rows() {
        let sheets = Arc::new(MemorySheets::new());
        sheets
            .insert_grid(
                "Clients",
                vec![
                    vec!["User ID".into(), "Username".into(), "Full Name".into(), "Role".into()],
                    vec!["10".into(), "anna".into(), "Anna".into(), "ceo".into()],
                    vec!["not-a-number".into(), "x".into(), "X".into(), "client".into()],
                ],
            )
            .await;
        let db = Db::new(sheets);
        let users = db.load::<User>().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].user_id, 10);
    }

    #[tokio::test]
    async fn test_unreadable_rows_survive_writes_and_keep_their_ids() {
        let sheets = Arc::new(MemorySheets::new());
        sheets
            .insert_grid(
                "Clients",
                vec![
                    vec!["User ID".into(), "Username".into(), "Full Name".into(), "Role".into()],
                    vec!["сорок два".into(), "old".into(), "Old".into(), "client".into()],
                ],
            )
            .await;
        let db = Db::new(sheets.clone());
        db.append(User {
            user_id: 10,
            username: "anna".into(),
            full_name: "Anna".into(),
            role: Role::Client,
        })
        .await
        .unwrap();

        let grid = sheets.read_grid("Clients").await.unwrap();
        assert_eq!(grid.len(), 3);
        assert_eq!(grid[1][0], "10");
        assert_eq!(grid[2][0], "сорок два");
        assert_eq!(db.load::<User>().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_next_id_counts_unreadable_rows() {
        let sheets = Arc::new(MemorySheets::new());
        sheets
            .insert_grid(
                "Appointments",
                vec![
                    vec!["id".into(), "user_id".into(), "date".into()],
                    vec!["4".into(), "6".into(), "15.03.2030".into()],
                ],
            )
            .await;
        let db = Db::new(sheets);
        assert!(db.load::<Appointment>().await.unwrap().is_empty());
        assert_eq!(db.next_id::<Appointment>().await.unwrap(), "5");
    }

    #[tokio::test]
    async fn test_missing_sheet_loads_empty_and_append_creates_it() {
        let db = Db::memory();
        assert!(db.load::<Category>().await.unwrap().is_empty());
        db.append(Category {
            id: "1".into(),
            name: "Nails".into(),
        })
        .await
        .unwrap();
        assert_eq!(db.load::<Category>().await.unwrap().len(), 1);
    }
}
