//! Sheets v4 values API client.
//!
//! Each ledger table lives in its own sheet tab named after the table. Reads cover the whole
//! tab; writes clear the tab and then write from `A1`.

use async_trait::async_trait;
use homeledger_core::ledger::TableRow;
use homeledger_core::sync::{RemoteCallError, RemoteTableClient, RemoteTarget};
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

use crate::config::SheetsClientConfig;
use crate::error::{Result, SheetsSyncError};
use crate::types::*;

const MAX_LOG_BODY_CHARS: usize = 512;

/// Client for the spreadsheet values endpoints.
#[derive(Debug, Clone)]
pub struct SheetsClient {
    client: reqwest::Client,
    base_url: String,
}

impl SheetsClient {
    fn log_response(status: reqwest::StatusCode, body: &str) {
        if status.is_success() {
            debug!("[Sheets] Response status: {}", status);
            return;
        }

        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("[Sheets] Response error ({}): {}", status, preview);
    }

    pub fn new(config: &SheetsClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(&SheetsClientConfig::from_env())
    }

    fn headers(&self, token: &str) -> Result<HeaderMap> {
        if token.trim().is_empty() {
            return Err(SheetsSyncError::auth("Missing access token"));
        }
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| SheetsSyncError::auth("Invalid access token format"))?;
        headers.insert(AUTHORIZATION, auth_value);

        Ok(headers)
    }

    fn values_url(&self, target: &RemoteTarget, range: &str, suffix: &str) -> Result<String> {
        if target.spreadsheet_id.trim().is_empty() {
            return Err(SheetsSyncError::invalid_request("Spreadsheet ID is required"));
        }
        Ok(format!(
            "{}/spreadsheets/{}/values/{}{}",
            self.base_url,
            urlencoding::encode(&target.spreadsheet_id),
            urlencoding::encode(range),
            suffix
        ))
    }

    fn key_query(target: &RemoteTarget) -> String {
        if target.api_key.is_empty() {
            String::new()
        } else {
            format!("key={}", urlencoding::encode(&target.api_key))
        }
    }

    fn with_query(url: String, params: &[String]) -> String {
        let params: Vec<&str> = params
            .iter()
            .map(String::as_str)
            .filter(|p| !p.is_empty())
            .collect();
        if params.is_empty() {
            url
        } else {
            format!("{}?{}", url, params.join("&"))
        }
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;
        Self::log_response(status, &body);

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<ApiErrorResponse>(&body) {
                let message = match error.error.status {
                    Some(code) if !error.error.message.contains(&code) => {
                        format!("{}: {}", code, error.error.message)
                    }
                    _ => error.error.message,
                };
                return Err(SheetsSyncError::api(status.as_u16(), message));
            }
            return Err(SheetsSyncError::api(
                status.as_u16(),
                format!("Request failed: {}", body),
            ));
        }

        serde_json::from_str(&body).map_err(|e| {
            log::error!("[Sheets] Failed to deserialize response: {}", e);
            SheetsSyncError::Json(e)
        })
    }

    /// GET /spreadsheets/{id}/values/{range}
    pub async fn get_values(&self, target: &RemoteTarget, range: &str) -> Result<ValueRange> {
        let url = Self::with_query(
            self.values_url(target, range, "")?,
            &[Self::key_query(target)],
        );

        let response = self
            .client
            .get(&url)
            .headers(self.headers(&target.access_token)?)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// GET /spreadsheets/{id}/values:batchGet?ranges=...
    pub async fn batch_get_values(
        &self,
        target: &RemoteTarget,
        ranges: &[&str],
    ) -> Result<Vec<ValueRange>> {
        if ranges.is_empty() {
            return Ok(Vec::new());
        }
        if target.spreadsheet_id.trim().is_empty() {
            return Err(SheetsSyncError::invalid_request("Spreadsheet ID is required"));
        }
        let mut params: Vec<String> = ranges
            .iter()
            .map(|r| format!("ranges={}", urlencoding::encode(r)))
            .collect();
        params.push(Self::key_query(target));
        let url = Self::with_query(
            format!(
                "{}/spreadsheets/{}/values:batchGet",
                self.base_url,
                urlencoding::encode(&target.spreadsheet_id)
            ),
            &params,
        );
        debug!("[Sheets] batchGet {} ranges", ranges.len());

        let response = self
            .client
            .get(&url)
            .headers(self.headers(&target.access_token)?)
            .send()
            .await?;

        let batch: BatchGetValuesResponse = Self::parse_response(response).await?;
        if batch.value_ranges.len() != ranges.len() {
            return Err(SheetsSyncError::api(
                200,
                format!(
                    "batchGet returned {} ranges, expected {}",
                    batch.value_ranges.len(),
                    ranges.len()
                ),
            ));
        }
        Ok(batch.value_ranges)
    }

    /// POST /spreadsheets/{id}/values/{range}:clear
    pub async fn clear_values(&self, target: &RemoteTarget, range: &str) -> Result<()> {
        let url = Self::with_query(
            self.values_url(target, range, ":clear")?,
            &[Self::key_query(target)],
        );

        let response = self
            .client
            .post(&url)
            .headers(self.headers(&target.access_token)?)
            .json(&serde_json::json!({}))
            .send()
            .await?;

        let _: serde_json::Value = Self::parse_response(response).await?;
        Ok(())
    }

    /// PUT /spreadsheets/{id}/values/{range}?valueInputOption=RAW
    pub async fn update_values(
        &self,
        target: &RemoteTarget,
        range: &str,
        rows: Vec<TableRow>,
    ) -> Result<UpdateValuesResponse> {
        let url = Self::with_query(
            self.values_url(target, range, "")?,
            &["valueInputOption=RAW".to_string(), Self::key_query(target)],
        );
        let body = ValueRange::rows(range, rows);

        let response = self
            .client
            .put(&url)
            .headers(self.headers(&target.access_token)?)
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }
}

#[async_trait]
impl RemoteTableClient for SheetsClient {
    async fn read_table(
        &self,
        target: &RemoteTarget,
        table: &str,
    ) -> std::result::Result<Vec<TableRow>, RemoteCallError> {
        Ok(self.get_values(target, table).await?.into_table_rows())
    }

    async fn read_tables(
        &self,
        target: &RemoteTarget,
        tables: &[&str],
    ) -> std::result::Result<Vec<Vec<TableRow>>, RemoteCallError> {
        let ranges = self.batch_get_values(target, tables).await?;
        Ok(ranges.into_iter().map(ValueRange::into_table_rows).collect())
    }

    async fn write_table(
        &self,
        target: &RemoteTarget,
        table: &str,
        rows: Vec<TableRow>,
    ) -> std::result::Result<(), RemoteCallError> {
        self.clear_values(target, table).await?;
        if rows.is_empty() {
            return Ok(());
        }
        let updated = self
            .update_values(target, &format!("{}!A1", table), rows)
            .await?;
        debug!(
            "[Sheets] Wrote {} rows to {}",
            updated.updated_rows.unwrap_or(0),
            updated.updated_range.as_deref().unwrap_or(table)
        );
        Ok(())
    }

    async fn clear_table(
        &self,
        target: &RemoteTarget,
        table: &str,
    ) -> std::result::Result<(), RemoteCallError> {
        Ok(self.clear_values(target, table).await?)
    }
}
