//! Google Sheets and Drive REST client.
//!
//! The spreadsheet is located by exact name through Drive, then worksheets
//! are addressed by title. Sheet ids needed by `batchUpdate` are cached from
//! the spreadsheet metadata and refreshed after structural changes.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use folio_sync_core::{
    is_rate_limit_message, CellFormat, GridRange, Row, SheetError, SheetsConfig, SpreadsheetBackend,
};

use crate::auth::ServiceAccountAuth;

const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone)]
pub struct SheetsClientConfig {
    pub api_url: String,
    pub drive_url: String,
    pub timeout_secs: u64,
}

impl Default for SheetsClientConfig {
    fn default() -> Self {
        Self::from(&SheetsConfig::default())
    }
}

impl From<&SheetsConfig> for SheetsClientConfig {
    fn from(config: &SheetsConfig) -> Self {
        Self {
            api_url: config.api_url.trim_end_matches('/').to_string(),
            drive_url: config.drive_url.trim_end_matches('/').to_string(),
            timeout_secs: config.timeout_secs,
        }
    }
}

impl SheetsClientConfig {
    /// Points both APIs at one base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into().trim_end_matches('/').to_string();
        self.api_url = url.clone();
        self.drive_url = url;
        self
    }
}

// =============================================================================
// API Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMetadata {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
}

#[derive(Debug)]
struct OpenSpreadsheet {
    id: String,
    sheets: Vec<SheetProperties>,
}

// =============================================================================
// Client
// =============================================================================

/// [`SpreadsheetBackend`] backed by the Google Sheets v4 API.
pub struct GoogleSheetsClient {
    config: SheetsClientConfig,
    http: Client,
    auth: ServiceAccountAuth,
    open: RwLock<Option<OpenSpreadsheet>>,
}

impl std::fmt::Debug for GoogleSheetsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleSheetsClient")
            .field("api_url", &self.config.api_url)
            .field("client_email", &self.auth.client_email())
            .finish_non_exhaustive()
    }
}

impl GoogleSheetsClient {
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(config: SheetsClientConfig, auth: ServiceAccountAuth) -> Result<Self, SheetError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SheetError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            http,
            auth,
            open: RwLock::new(None),
        })
    }

    /// Service account the client authenticates as.
    #[must_use]
    pub fn client_email(&self) -> &str {
        self.auth.client_email()
    }

    /// Id of the currently open spreadsheet.
    #[must_use]
    pub fn spreadsheet_id(&self) -> Option<String> {
        self.open.read().as_ref().map(|s| s.id.clone())
    }

    fn current_id(&self) -> Result<String, SheetError> {
        self.spreadsheet_id().ok_or(SheetError::NotOpen)
    }

    fn sheet_id(&self, title: &str) -> Result<i64, SheetError> {
        let guard = self.open.read();
        let open = guard.as_ref().ok_or(SheetError::NotOpen)?;
        open.sheets
            .iter()
            .find(|s| s.title == title)
            .map(|s| s.sheet_id)
            .ok_or_else(|| SheetError::WorksheetNotFound(title.to_string()))
    }

    /// Builds `{base}/spreadsheets/{id}/values/{range}{suffix}` with each
    /// segment percent-encoded.
    fn values_url(&self, id: &str, range: &str, suffix: &str) -> Result<url::Url, SheetError> {
        let mut url = url::Url::parse(&self.config.api_url)
            .map_err(|e| SheetError::InvalidRange(format!("bad api url: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| SheetError::InvalidRange("api url cannot be a base".to_string()))?
            .pop_if_empty()
            .push("spreadsheets")
            .push(id)
            .push("values")
            .push(&format!("{range}{suffix}"));
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> Result<T, SheetError> {
        let token = self.auth.access_token(&self.http).await?;
        tracing::debug!("{} {}", method, url);

        let mut request = self
            .http
            .request(method, url)
            .query(query)
            .bearer_auth(token)
            .header("Accept", "application/json");
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SheetError::Network(e.to_string()))?;
        handle_response(response).await
    }

    async fn batch_update(&self, requests: Vec<Value>) -> Result<Value, SheetError> {
        let id = self.current_id()?;
        let url = format!("{}/spreadsheets/{id}:batchUpdate", self.config.api_url);
        self.send(Method::POST, &url, &[], Some(&json!({ "requests": requests })))
            .await
    }

    async fn find_spreadsheet(&self, name: &str) -> Result<String, SheetError> {
        let escaped = name.replace('\\', "\\\\").replace('\'', "\\'");
        let q = format!("name = '{escaped}' and mimeType = '{SPREADSHEET_MIME}' and trashed = false");
        let url = format!("{}/files", self.config.drive_url);
        let list: DriveFileList = self
            .send(
                Method::GET,
                &url,
                &[
                    ("q", q.as_str()),
                    ("fields", "files(id,name)"),
                    ("supportsAllDrives", "true"),
                    ("includeItemsFromAllDrives", "true"),
                ],
                None,
            )
            .await?;

        let mut matches = list
            .files
            .into_iter()
            .filter(|f| f.name.as_deref().map_or(true, |n| n == name));
        let first = matches
            .next()
            .ok_or_else(|| SheetError::SpreadsheetNotFound(name.to_string()))?;
        if matches.next().is_some() {
            tracing::warn!(name, id = %first.id, "several spreadsheets share this name, using the first");
        }
        Ok(first.id)
    }

    async fn load_sheets(&self, id: &str) -> Result<Vec<SheetProperties>, SheetError> {
        let url = format!("{}/spreadsheets/{id}", self.config.api_url);
        let meta: SpreadsheetMetadata = self
            .send(Method::GET, &url, &[("fields", "sheets.properties")], None)
            .await?;
        Ok(meta.sheets.into_iter().map(|s| s.properties).collect())
    }

    async fn refresh(&self) -> Result<(), SheetError> {
        let id = self.current_id()?;
        let sheets = self.load_sheets(&id).await?;
        *self.open.write() = Some(OpenSpreadsheet { id, sheets });
        Ok(())
    }
}

/// Quotes a worksheet title for use in an A1 range.
pub(crate) fn quoted_range(title: &str, cells: &str) -> String {
    format!("'{}'!{cells}", title.replace('\'', "''"))
}

/// `repeatCell` request applying `format` to `range` on `sheet_id`.
pub(crate) fn repeat_cell_request(sheet_id: i64, range: &GridRange, format: &CellFormat) -> Value {
    let mut text_format = serde_json::Map::new();
    let mut fields = Vec::new();

    text_format.insert("bold".to_string(), json!(format.bold));
    fields.push("userEnteredFormat.textFormat.bold");
    if let Some(size) = format.font_size {
        text_format.insert("fontSize".to_string(), json!(size));
        fields.push("userEnteredFormat.textFormat.fontSize");
    }

    let mut cell_format = json!({ "textFormat": Value::Object(text_format) });
    if let Some(color) = format.background {
        cell_format["backgroundColor"] = json!({
            "red": color.red,
            "green": color.green,
            "blue": color.blue,
        });
        fields.push("userEnteredFormat.backgroundColor");
    }

    json!({
        "repeatCell": {
            "range": {
                "sheetId": sheet_id,
                "startRowIndex": range.start_row,
                "endRowIndex": range.end_row,
                "startColumnIndex": range.start_col,
                "endColumnIndex": range.end_col,
            },
            "cell": { "userEnteredFormat": cell_format },
            "fields": fields.join(","),
        }
    })
}

async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, SheetError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| SheetError::Network(e.to_string()))?;

    if status.is_success() {
        let body = if text.trim().is_empty() { "{}" } else { text.as_str() };
        return serde_json::from_str(body).map_err(|e| SheetError::Serialization(e.to_string()));
    }

    let message = serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or(text);

    match status.as_u16() {
        429 => Err(SheetError::RateLimit(message)),
        403 if is_rate_limit_message(&message) => Err(SheetError::RateLimit(message)),
        401 => Err(SheetError::Authentication(message)),
        code => Err(SheetError::api(code, message)),
    }
}

#[async_trait]
impl SpreadsheetBackend for GoogleSheetsClient {
    async fn open(&self, name: &str) -> Result<(), SheetError> {
        let id = self.find_spreadsheet(name).await?;
        let sheets = self.load_sheets(&id).await?;
        tracing::info!(name, worksheets = sheets.len(), "opened spreadsheet");
        *self.open.write() = Some(OpenSpreadsheet { id, sheets });
        Ok(())
    }

    async fn worksheets(&self) -> Result<Vec<String>, SheetError> {
        let guard = self.open.read();
        let open = guard.as_ref().ok_or(SheetError::NotOpen)?;
        Ok(open.sheets.iter().map(|s| s.title.clone()).collect())
    }

    async fn ensure_worksheet(&self, title: &str, rows: u32, cols: u32) -> Result<(), SheetError> {
        if self.sheet_id(title).is_ok() {
            return Ok(());
        }

        tracing::info!(title, rows, cols, "creating worksheet");
        self.batch_update(vec![json!({
            "addSheet": {
                "properties": {
                    "title": title,
                    "gridProperties": { "rowCount": rows, "columnCount": cols }
                }
            }
        })])
        .await?;
        self.refresh().await
    }

    async fn clear(&self, title: &str) -> Result<(), SheetError> {
        let id = self.current_id()?;
        self.sheet_id(title)?;
        let url = self.values_url(&id, &quoted_range(title, "A:ZZ"), ":clear")?;
        let _: Value = self
            .send(Method::POST, url.as_str(), &[], Some(&json!({})))
            .await?;
        Ok(())
    }

    async fn write(&self, title: &str, anchor: &str, rows: &[Row]) -> Result<(), SheetError> {
        if rows.is_empty() {
            return Ok(());
        }
        let id = self.current_id()?;
        self.sheet_id(title)?;
        let range = quoted_range(title, anchor);
        let url = self.values_url(&id, &range, "")?;
        let body = json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": rows,
        });
        let _: Value = self
            .send(
                Method::PUT,
                url.as_str(),
                &[("valueInputOption", "USER_ENTERED")],
                Some(&body),
            )
            .await?;
        Ok(())
    }

    async fn format(&self, title: &str, range: &str, format: &CellFormat) -> Result<(), SheetError> {
        let sheet_id = self.sheet_id(title)?;
        let grid = GridRange::parse(range)?;
        self.batch_update(vec![repeat_cell_request(sheet_id, &grid, format)])
            .await?;
        Ok(())
    }

    async fn delete_worksheet(&self, title: &str) -> Result<(), SheetError> {
        let sheet_id = self.sheet_id(title)?;
        self.batch_update(vec![json!({ "deleteSheet": { "sheetId": sheet_id } })])
            .await?;
        self.refresh().await
    }
}
