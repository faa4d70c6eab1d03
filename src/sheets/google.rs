use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use url::Url;

use super::SheetStore;
use crate::error::{BotError, Result};

const API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const JWT_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

#[derive(Debug, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Deserialize)]
struct SheetProperties {
    title: String,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Google Sheets REST v4 client authenticated as a service account.
pub struct GoogleSheets {
    http: reqwest::Client,
    spreadsheet_id: String,
    key: ServiceAccountKey,
    token: Mutex<Option<CachedToken>>,
}

impl GoogleSheets {
    /// Loads the service-account key and fetches a first token so that bad
    /// credentials fail at startup.
    pub async fn connect(spreadsheet_id: &str, credentials_file: &str) -> Result<Self> {
        let raw = tokio::fs::read_to_string(credentials_file).await?;
        let key: ServiceAccountKey = serde_json::from_str(&raw)
            .map_err(|e| BotError::Credentials(format!("{}: {}", credentials_file, e)))?;
        if !key.private_key.contains("PRIVATE KEY") {
            return Err(BotError::Credentials(
                "private_key is not a PEM encoded key".to_string(),
            ));
        }

        let sheets = GoogleSheets {
            http: reqwest::Client::new(),
            spreadsheet_id: spreadsheet_id.to_string(),
            key,
            token: Mutex::new(None),
        };
        sheets.access_token().await?;
        Ok(sheets)
    }

    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.value.clone());
            }
        }

        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            iss: &self.key.client_email,
            scope: SCOPE,
            aud: &self.key.token_uri,
            iat: now,
            exp: now + 3600,
        };
        let signing_key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())?;
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &signing_key)?;

        let response = self
            .http
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;
        let token: TokenResponse = check(response).await?.json().await?;
        debug!("Obtained spreadsheet access token, valid for {}s", token.expires_in);

        // refresh a minute early
        let lifetime = Duration::from_secs((token.expires_in - 60).max(0) as u64);
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(token.access_token)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(API_BASE)?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| BotError::Config("invalid sheets api base url".to_string()))?;
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    async fn clear(&self, range: &str) -> Result<()> {
        let url = self.endpoint(&[&self.spreadsheet_id, "values", &format!("{}:clear", range)])?;
        let token = self.access_token().await?;
        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(&json!({}))
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }
}

/// Whole-sheet A1 range; quotes in titles are doubled.
fn sheet_range(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

fn cell_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(BotError::Api {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl SheetStore for GoogleSheets {
    async fn sheet_titles(&self) -> Result<Vec<String>> {
        let mut url = self.endpoint(&[&self.spreadsheet_id])?;
        url.query_pairs_mut().append_pair("fields", "sheets.properties.title");
        let token = self.access_token().await?;
        let response = self.http.get(url).bearer_auth(token).send().await?;
        let meta: SpreadsheetMeta = check(response).await?.json().await?;
        Ok(meta.sheets.into_iter().map(|s| s.properties.title).collect())
    }

    async fn add_sheet(&self, title: &str, headers: &[&str]) -> Result<()> {
        let url = self.endpoint(&[&format!("{}:batchUpdate", self.spreadsheet_id)])?;
        let token = self.access_token().await?;
        let body = json!({
            "requests": [{ "addSheet": { "properties": { "title": title } } }]
        });
        let response = self.http.post(url).bearer_auth(token).json(&body).send().await?;
        check(response).await?;
        debug!("Created worksheet {}", title);

        self.write_grid(title, vec![headers.iter().map(|h| h.to_string()).collect()])
            .await
    }

    async fn read_grid(&self, title: &str) -> Result<Vec<Vec<String>>> {
        let url = self.endpoint(&[&self.spreadsheet_id, "values", &sheet_range(title)])?;
        let token = self.access_token().await?;
        let response = self.http.get(url).bearer_auth(token).send().await?;
        let range: ValueRange = check(response).await?.json().await?;
        Ok(range
            .values
            .iter()
            .map(|row| row.iter().map(cell_to_string).collect())
            .collect())
    }

    /// Overwrites the grid first and only then clears leftover rows below it,
    /// so a failed request never leaves the worksheet empty.
    async fn write_grid(&self, title: &str, grid: Vec<Vec<String>>) -> Result<()> {
        let range = sheet_range(title);
        let rows = grid.len();

        let mut url = self.endpoint(&[&self.spreadsheet_id, "values", &range])?;
        url.query_pairs_mut().append_pair("valueInputOption", "RAW");
        let token = self.access_token().await?;
        let body = json!({ "range": range, "majorDimension": "ROWS", "values": grid });
        let response = self.http.put(url).bearer_auth(token).json(&body).send().await?;
        check(response).await?;

        self.clear(&rows_below(title, rows)).await?;
        debug!("Wrote {} rows to {}", rows, title);
        Ok(())
    }
}

/// Everything under the first `rows` rows.
fn rows_below(title: &str, rows: usize) -> String {
    format!("{}!A{}:ZZ", sheet_range(title), rows + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sheet_range_quotes_title() {
        assert_eq!(sheet_range("Services"), "'Services'");
        assert_eq!(sheet_range("Bob's"), "'Bob''s'");
    }

    #[test]
    fn test_rows_below_starts_after_the_grid() {
        assert_eq!(rows_below("Services", 3), "'Services'!A4:ZZ");
        assert_eq!(rows_below("Bob's", 0), "'Bob''s'!A1:ZZ");
    }

    #[test]
    fn test_cell_to_string() {
        assert_eq!(cell_to_string(&json!("a")), "a");
        assert_eq!(cell_to_string(&json!(12)), "12");
        assert_eq!(cell_to_string(&Value::Null), "");
    }

    #[test]
    fn test_value_range_without_values() {
        let range: ValueRange = serde_json::from_str(r#"{"range":"'A'!A1:Z1000"}"#).unwrap();
        assert!(range.values.is_empty());
    }
}
