use dotenvy::dotenv;
use std::env;

use crate::error::{BotError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Google,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub backend: Backend,
    pub spreadsheet_id: String,
    pub credentials_file: String,
    /// Recipients of the evening appointment reminders
    pub admin_ids: Vec<i64>,
    /// Users always resolved as owners
    pub owner_ids: Vec<i64>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bot_token = lookup("BOT_TOKEN")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| BotError::Config("BOT_TOKEN not set".to_string()))?;

        let backend = match lookup("SHEETS_BACKEND").as_deref().map(str::trim) {
            None | Some("") | Some("google") => Backend::Google,
            Some("memory") => Backend::Memory,
            Some(other) => {
                return Err(BotError::Config(format!("unknown SHEETS_BACKEND '{}'", other)))
            }
        };

        let spreadsheet_id = lookup("SPREADSHEET_ID").unwrap_or_default();
        let credentials_file = lookup("GOOGLE_CREDENTIALS_FILE").unwrap_or_default();
        if backend == Backend::Google {
            if spreadsheet_id.trim().is_empty() {
                return Err(BotError::Config("SPREADSHEET_ID not set".to_string()));
            }
            if credentials_file.trim().is_empty() {
                return Err(BotError::Config("GOOGLE_CREDENTIALS_FILE not set".to_string()));
            }
        }

        Ok(Config {
            bot_token,
            backend,
            spreadsheet_id,
            credentials_file,
            admin_ids: parse_id_list(&lookup("ADMIN_IDS").unwrap_or_default()),
            owner_ids: parse_id_list(&lookup("OWNER_IDS").unwrap_or_default()),
        })
    }
}

/// Parses "1, 2,abc,3" into [1, 2, 3]; entries that are not plain digits are dropped.
pub fn parse_id_list(raw: &str) -> Vec<i64> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()))
        .filter_map(|s| s.parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_parse_id_list_skips_garbage() {
        assert_eq!(parse_id_list("1, 2,abc, ,-5,3"), vec![1, 2, 3]);
        assert!(parse_id_list("").is_empty());
    }

    #[test]
    fn test_google_backend_requires_spreadsheet() {
        let err = Config::from_lookup(lookup_from(&[("BOT_TOKEN", "t")])).unwrap_err();
        assert!(err.to_string().contains("SPREADSHEET_ID"));
    }

    #[test]
    fn test_memory_backend_needs_only_token() {
        let config = Config::from_lookup(lookup_from(&[
            ("BOT_TOKEN", "t"),
            ("SHEETS_BACKEND", "memory"),
            ("ADMIN_IDS", "10,20"),
            ("OWNER_IDS", "7"),
        ]))
        .unwrap();
        assert_eq!(config.backend, Backend::Memory);
        assert_eq!(config.admin_ids, vec![10, 20]);
        assert_eq!(config.owner_ids, vec![7]);
    }

    #[test]
    fn test_missing_token_is_rejected() {
        assert!(Config::from_lookup(lookup_from(&[("SHEETS_BACKEND", "memory")])).is_err());
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let err = Config::from_lookup(lookup_from(&[("BOT_TOKEN", "t"), ("SHEETS_BACKEND", "excel")]))
            .unwrap_err();
        assert!(err.to_string().contains("excel"));
    }
}
