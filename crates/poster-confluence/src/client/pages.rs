//! Page operations for Confluence API.

use serde_json::json;
use tracing::{debug, info};

use super::{ConfluenceClient, decode};
use crate::error::ApiError;
use crate::transport::{ApiRequest, Transport};
use crate::types::{Page, PageList};

impl<T: Transport> ConfluenceClient<T> {
    /// Find pages with an exact title in a space.
    pub(crate) fn find_pages(&self, space_key: &str, title: &str) -> Result<Vec<Page>, ApiError> {
        debug!(space_key, title, "Searching for page");
        let query = [
            ("spaceKey", space_key),
            ("title", title),
            ("type", "page"),
            ("expand", "version,ancestors"),
        ];
        let response = self.execute(&ApiRequest::get("/content", &query))?;
        Ok(decode::<PageList>(&response)?.results)
    }

    /// Get page by ID with its current version.
    pub(crate) fn get_page(&self, page_id: &str) -> Result<Page, ApiError> {
        debug!("Getting page {}", page_id);
        let path = format!("/content/{page_id}");
        let response = self.execute(&ApiRequest::get(&path, &[("expand", "version")]))?;
        decode(&response)
    }

    /// Create a page under `parent_id`.
    pub(crate) fn create_page(
        &self,
        space_key: &str,
        title: &str,
        body: &str,
        parent_id: &str,
    ) -> Result<Page, ApiError> {
        let payload = json!({
            "type": "page",
            "title": title,
            "space": {"key": space_key},
            "ancestors": [{"id": parent_id}],
            "body": {
                "storage": {
                    "value": body,
                    "representation": "storage"
                }
            }
        })
        .to_string();

        info!("Creating page {:?} in space {}", title, space_key);
        let response = self.execute(&ApiRequest::post("/content", payload.as_bytes()))?;
        let page: Page = decode(&response)?;
        info!("Created page {} ({:?})", page.id, page.title);
        Ok(page)
    }

    /// Replace a page's title, body and parent. `version` is the version the
    /// update is based on; the new page gets `version + 1`.
    pub(crate) fn update_page(
        &self,
        page_id: &str,
        title: &str,
        body: &str,
        version: u32,
        parent_id: &str,
    ) -> Result<Page, ApiError> {
        let payload = json!({
            "id": page_id,
            "type": "page",
            "title": title,
            "ancestors": [{"id": parent_id}],
            "body": {
                "storage": {
                    "value": body,
                    "representation": "storage"
                }
            },
            "version": {"number": version + 1}
        })
        .to_string();

        info!(
            "Updating page {} from version {} to {}",
            page_id,
            version,
            version + 1
        );
        let path = format!("/content/{page_id}");
        let response = self.execute(&ApiRequest::put(&path, payload.as_bytes()))?;
        let page: Page = decode(&response)?;
        info!("Updated page {} to version {}", page_id, page.version.number);
        Ok(page)
    }
}
