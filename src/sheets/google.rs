//! Google Sheets REST backend with service-account authentication

use super::SheetBackend;
use crate::error::DeliveryError;
use crate::http::HttpClient;
use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Deserialize)]
struct ServiceAccount {
    client_email: String,
    private_key: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

pub struct GoogleSheets {
    http: HttpClient,
    spreadsheet_id: String,
    access_token: String,
}

impl GoogleSheets {
    /// Exchange the service account key for an access token
    pub async fn connect(
        service_account_json: &str,
        spreadsheet_id: &str,
        http: HttpClient,
    ) -> Result<Self, DeliveryError> {
        let account: ServiceAccount = serde_json::from_str(service_account_json)
            .map_err(|e| DeliveryError::Credentials(e.to_string()))?;

        let assertion = sign_assertion(&account, chrono::Utc::now().timestamp())?;
        let form = [("grant_type", JWT_GRANT), ("assertion", assertion.as_str())];
        let resp = http.post_form(&account.token_uri, &form).await?;
        let token: TokenResponse = read_json(resp).await?;

        tracing::info!("Google Sheets authorized as {}", account.client_email);
        Ok(Self {
            http,
            spreadsheet_id: spreadsheet_id.to_string(),
            access_token: token.access_token,
        })
    }

    fn spreadsheet_url(&self) -> String {
        format!("{}/{}", SHEETS_API, self.spreadsheet_id)
    }

    fn values_url(&self, range: &str) -> String {
        format!("{}/values/{}", self.spreadsheet_url(), urlencoding::encode(range))
    }

    fn bearer(&self) -> Option<&str> {
        Some(self.access_token.as_str())
    }
}

fn sign_assertion(account: &ServiceAccount, now: i64) -> Result<String, DeliveryError> {
    let claims = Claims {
        iss: &account.client_email,
        scope: SHEETS_SCOPE,
        aud: &account.token_uri,
        iat: now,
        exp: now + TOKEN_LIFETIME_SECS,
    };
    let key = EncodingKey::from_rsa_pem(account.private_key.as_bytes())
        .map_err(|e| DeliveryError::Credentials(e.to_string()))?;
    jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)
        .map_err(|e| DeliveryError::Credentials(e.to_string()))
}

async fn read_json<T: serde::de::DeserializeOwned>(resp: reqwest::Response) -> Result<T, DeliveryError> {
    resp.json::<T>()
        .await
        .map_err(|e| DeliveryError::Response(e.to_string()))
}

/// Spreadsheet column letters: 1 -> A, 26 -> Z, 27 -> AA
fn column_letter(mut index: usize) -> String {
    let mut letters = Vec::new();
    while index > 0 {
        let rem = (index - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        index = (index - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// A1 range on a named tab, with the tab name quoted
fn a1_range(sheet: &str, cells: &str) -> String {
    format!("'{}'!{}", sheet.replace('\'', "''"), cells)
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl SheetBackend for GoogleSheets {
    async fn sheet_titles(&self) -> Result<Vec<String>, DeliveryError> {
        let url = format!("{}?fields=sheets.properties.title", self.spreadsheet_url());
        let meta: SpreadsheetMeta = read_json(self.http.get(&url, self.bearer()).await?).await?;
        Ok(meta.sheets.into_iter().map(|s| s.properties.title).collect())
    }

    async fn add_sheet(&self, title: &str) -> Result<(), DeliveryError> {
        let url = format!("{}:batchUpdate", self.spreadsheet_url());
        let body = json!({
            "requests": [{"addSheet": {"properties": {"title": title}}}]
        });
        self.http
            .post_json(&url, &body, HeaderMap::new(), self.bearer())
            .await?;
        Ok(())
    }

    async fn key_column(&self, sheet: &str) -> Result<Vec<String>, DeliveryError> {
        let url = self.values_url(&a1_range(sheet, "A:A"));
        let range: ValueRange = read_json(self.http.get(&url, self.bearer()).await?).await?;
        Ok(range
            .values
            .iter()
            .map(|row| row.first().map(cell_text).unwrap_or_default())
            .collect())
    }

    async fn append_rows(&self, sheet: &str, rows: &[Vec<String>]) -> Result<(), DeliveryError> {
        let url = format!(
            "{}:append?valueInputOption=RAW&insertDataOption=INSERT_ROWS",
            self.values_url(&a1_range(sheet, "A1"))
        );
        let body = json!({ "values": rows });
        self.http
            .post_json(&url, &body, HeaderMap::new(), self.bearer())
            .await?;
        Ok(())
    }

    async fn update_row(
        &self,
        sheet: &str,
        row_number: usize,
        row: &[String],
    ) -> Result<(), DeliveryError> {
        let last = column_letter(row.len().max(1));
        let range = a1_range(sheet, &format!("A{}:{}{}", row_number, last, row_number));
        let url = format!("{}?valueInputOption=RAW", self.values_url(&range));
        let body = json!({ "range": range, "values": [row] });
        self.http.put_json(&url, &body, self.bearer()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_letter() {
        assert_eq!(column_letter(1), "A");
        assert_eq!(column_letter(5), "E");
        assert_eq!(column_letter(26), "Z");
        assert_eq!(column_letter(27), "AA");
        assert_eq!(column_letter(53), "BA");
    }

    #[test]
    fn test_a1_range_quotes_sheet_names() {
        assert_eq!(a1_range("월별", "A:A"), "'월별'!A:A");
        assert_eq!(a1_range("Plant 1!", "A1"), "'Plant 1!'!A1");
        assert_eq!(a1_range("Kim's plant", "A2:D2"), "'Kim''s plant'!A2:D2");
    }

    #[test]
    fn test_cell_text() {
        assert_eq!(cell_text(&json!("2024-12")), "2024-12");
        assert_eq!(cell_text(&json!(12.5)), "12.5");
        assert_eq!(cell_text(&Value::Null), "");
    }

    #[test]
    fn test_service_account_token_uri_default() {
        let account: ServiceAccount = serde_json::from_str(
            r#"{"client_email": "bot@example.iam.gserviceaccount.com", "private_key": "x"}"#,
        )
        .unwrap();
        assert_eq!(account.token_uri, DEFAULT_TOKEN_URI);
    }

    #[test]
    fn test_invalid_key_is_credentials_error() {
        let account = ServiceAccount {
            client_email: "bot@example.iam.gserviceaccount.com".into(),
            private_key: "not a pem".into(),
            token_uri: DEFAULT_TOKEN_URI.into(),
        };
        assert!(matches!(
            sign_assertion(&account, 0),
            Err(DeliveryError::Credentials(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_rejects_malformed_json() {
        let http = HttpClient::new(
            std::time::Duration::from_secs(2),
            std::time::Duration::from_secs(1),
        )
        .unwrap();
        let result = GoogleSheets::connect("{not json", "sheet-id", http).await;
        assert!(matches!(result, Err(DeliveryError::Credentials(_))));
    }
}
