//! Drive-compatible HTTP listing provider.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;

use storefront_catalog::{ListingEntry, ListingPage};

use super::{ListingProvider, ProviderError};

/// MIME type the Drive API reports for folders.
pub const DRIVE_FOLDER_MIME: &str = "application/vnd.google-apps.folder";

const FIELDS: &str = "nextPageToken,files(id,name,mimeType,modifiedTime)";

/// Lists folder children through the Drive v3 `files` endpoint.
#[derive(Debug, Clone)]
pub struct DriveListingProvider {
    client: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
}

impl DriveListingProvider {
    /// `api_base` is e.g. `https://www.googleapis.com/drive/v3`.
    pub fn new(api_base: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFileList {
    next_page_token: Option<String>,
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    mime_type: String,
    modified_time: DateTime<Utc>,
}

impl DriveFileList {
    fn into_page(self) -> ListingPage {
        ListingPage {
            entries: self
                .files
                .into_iter()
                .map(|f| ListingEntry {
                    is_folder: f.mime_type == DRIVE_FOLDER_MIME,
                    id: f.id,
                    name: f.name,
                    modified_at: f.modified_time,
                })
                .collect(),
            next_page_token: self.next_page_token.filter(|t| !t.is_empty()),
        }
    }
}

fn parents_query(parent_id: &str) -> String {
    // Drive query strings quote with single quotes; escape the id.
    let escaped = parent_id.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{escaped}' in parents and trashed=false")
}

#[async_trait]
impl ListingProvider for DriveListingProvider {
    async fn list(&self, parent_id: &str, page_token: Option<&str>) -> Result<ListingPage, ProviderError> {
        let url = format!("{}/files", self.api_base);
        let mut params: Vec<(&str, String)> = vec![
            ("q", parents_query(parent_id)),
            ("fields", FIELDS.to_string()),
            ("pageSize", "1000".to_string()),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }
        if let Some(key) = &self.api_key {
            params.push(("key", key.clone()));
        }

        let resp = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound(parent_id.to_string()));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(parent_id, %status, "listing request failed");
            return Err(ProviderError::Unavailable(format!("{status}: {body}")));
        }

        let list: DriveFileList = resp
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        Ok(list.into_page())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_maps_folders_by_mime_type() {
        let raw = r#"{
            "nextPageToken": "p2",
            "files": [
                {"id": "F1", "name": "Intro To Design", "mimeType": "application/vnd.google-apps.folder", "modifiedTime": "2024-03-01T10:00:00Z"},
                {"id": "D1", "name": "notes.pdf", "mimeType": "application/pdf", "modifiedTime": "2024-03-02T10:00:00.000Z"}
            ]
        }"#;
        let page = serde_json::from_str::<DriveFileList>(raw).unwrap().into_page();
        assert_eq!(page.next_page_token.as_deref(), Some("p2"));
        assert!(page.entries[0].is_folder);
        assert!(!page.entries[1].is_folder);
        assert_eq!(page.entries[1].name, "notes.pdf");
    }

    #[test]
    fn missing_or_empty_token_ends_the_cursor() {
        let page = serde_json::from_str::<DriveFileList>(r#"{"files": []}"#).unwrap().into_page();
        assert_eq!(page.next_page_token, None);
        let page = serde_json::from_str::<DriveFileList>(r#"{"nextPageToken": ""}"#).unwrap().into_page();
        assert_eq!(page.next_page_token, None);
    }

    #[test]
    fn parent_ids_are_quoted_in_the_query() {
        assert_eq!(parents_query("F1"), "'F1' in parents and trashed=false");
        assert_eq!(parents_query("a'b"), "'a\\'b' in parents and trashed=false");
    }
}
