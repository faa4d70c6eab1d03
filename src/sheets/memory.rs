use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::SheetStore;
use crate::error::{BotError, Result};

/// In-process spreadsheet. Backs the dry-run mode and the tests.
#[derive(Default)]
pub struct MemorySheets {
    sheets: Mutex<HashMap<String, Vec<Vec<String>>>>,
}

impl MemorySheets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a worksheet with a raw grid, header row first.
    pub async fn insert_grid(&self, title: &str, grid: Vec<Vec<String>>) {
        self.sheets.lock().await.insert(title.to_string(), grid);
    }

    pub async fn grid(&self, title: &str) -> Option<Vec<Vec<String>>> {
        self.sheets.lock().await.get(title).cloned()
    }
}

#[async_trait]
impl SheetStore for MemorySheets {
    async fn sheet_titles(&self) -> Result<Vec<String>> {
        let mut titles: Vec<String> = self.sheets.lock().await.keys().cloned().collect();
        titles.sort();
        Ok(titles)
    }

    async fn add_sheet(&self, title: &str, headers: &[&str]) -> Result<()> {
        let mut sheets = self.sheets.lock().await;
        sheets
            .entry(title.to_string())
            .or_insert_with(|| vec![headers.iter().map(|h| h.to_string()).collect()]);
        Ok(())
    }

    async fn read_grid(&self, title: &str) -> Result<Vec<Vec<String>>> {
        self.sheets
            .lock()
            .await
            .get(title)
            .cloned()
            .ok_or_else(|| BotError::NotFound(format!("worksheet '{}'", title)))
    }

    async fn write_grid(&self, title: &str, grid: Vec<Vec<String>>) -> Result<()> {
        self.sheets.lock().await.insert(title.to_string(), grid);
        Ok(())
    }
}
