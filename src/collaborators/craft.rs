//! Craft knowledge-base archive client.
//!
//! The collection holds one entry per paper; deep-read notes become
//! standalone documents back-referenced from the entry. `upsert_base` is
//! keyed by the paper link: the collection is searched for an existing entry
//! with the same link before anything is inserted, which is what makes
//! repeated calls (crash re-entry, failed-and-restarted runs) converge on
//! one logical entry.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;

use super::{Archive, ArchiveEntry, ArchiveError, ArchiveUpdate, DeepReadNote};

// Property ids follow the collection schema.
const PROP_TAGS: &str = "";
const PROP_LINK: &str = "_2";
const PROP_SUMMARY: &str = "_3";
const PROP_DOC_REF: &str = "_4";
const PROP_DEEP_READ: &str = "_5";
const PROP_COMMENT: &str = "_7";

#[derive(Deserialize)]
struct ItemsResponse {
    #[serde(default)]
    items: Vec<CollectionItem>,
}

#[derive(Deserialize)]
struct CollectionItem {
    id: String,
    #[serde(default)]
    properties: Map<String, Value>,
}

#[derive(Deserialize)]
struct DocumentResponse {
    id: String,
}

/// Archive client over the Craft HTTP API.
pub struct CraftArchive {
    http: reqwest::Client,
    base_url: String,
    collection_id: String,
}

impl CraftArchive {
    #[must_use]
    pub fn new(base_url: impl Into<String>, collection_id: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            collection_id: collection_id.into(),
        }
    }

    fn items_url(&self) -> String {
        format!("{}/collections/{}/items", self.base_url, self.collection_id)
    }

    fn transport(e: reqwest::Error) -> ArchiveError {
        ArchiveError::Transport {
            message: e.to_string(),
        }
    }

    /// Find an existing collection item by its link property.
    async fn find_by_link(&self, link: &str) -> Result<Option<String>, ArchiveError> {
        let response: ItemsResponse = self
            .http
            .get(self.items_url())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(Self::transport)?
            .json()
            .await
            .map_err(Self::transport)?;

        Ok(response
            .items
            .into_iter()
            .find(|item| {
                item.properties
                    .get(PROP_LINK)
                    .and_then(Value::as_str)
                    .is_some_and(|existing| existing == link)
            })
            .map(|item| item.id))
    }

    fn doc_reference(title: &str, doc_id: &str) -> Value {
        json!({
            "title": title,
            "blockId": doc_id,
            "reference": { "blockId": doc_id }
        })
    }
}

#[async_trait]
impl Archive for CraftArchive {
    async fn upsert_base(&self, entry: &ArchiveEntry) -> Result<String, ArchiveError> {
        if let Some(existing) = self.find_by_link(&entry.link).await? {
            tracing::info!(item_id = %existing, link = %entry.link, "collection entry exists, reusing");
            return Ok(existing);
        }

        let payload = json!({
            "items": [{
                "title": entry.title,
                "properties": {
                    PROP_TAGS: entry.tags,
                    PROP_LINK: entry.link,
                    PROP_SUMMARY: entry.summary,
                    PROP_DEEP_READ: "No",
                }
            }]
        });

        let response: ItemsResponse = self
            .http
            .post(self.items_url())
            .json(&payload)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(Self::transport)?
            .json()
            .await
            .map_err(Self::transport)?;

        response
            .items
            .into_iter()
            .next()
            .map(|item| item.id)
            .ok_or(ArchiveError::MissingField { what: "items[0].id" })
    }

    async fn create_document(
        &self,
        title: &str,
        note: &DeepReadNote,
    ) -> Result<String, ArchiveError> {
        let payload = json!({
            "title": title,
            "blocks": [
                { "heading": "Overview", "text": note.overview },
                { "heading": "Innovations", "text": note.innovations },
                { "heading": "Directions", "text": note.directions },
                { "heading": "Thoughts", "text": "" },
            ]
        });

        let response: DocumentResponse = self
            .http
            .post(format!("{}/documents", self.base_url))
            .json(&payload)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(Self::transport)?
            .json()
            .await
            .map_err(Self::transport)?;

        Ok(response.id)
    }

    async fn update(&self, item_id: &str, update: &ArchiveUpdate) -> Result<(), ArchiveError> {
        let mut properties = Map::new();
        properties.insert(
            PROP_DEEP_READ.to_string(),
            json!(if update.deep_read { "Yes" } else { "No" }),
        );
        if let Some(doc_id) = &update.reading_doc_id {
            properties.insert(
                PROP_DOC_REF.to_string(),
                Self::doc_reference(&update.title, doc_id),
            );
        }
        if let Some(tags) = &update.tags {
            properties.insert(PROP_TAGS.to_string(), json!(tags));
        }
        if let Some(comment) = &update.comment {
            properties.insert(PROP_COMMENT.to_string(), json!(comment));
        }

        let payload = json!({
            "items": [{
                "id": item_id,
                "title": update.title,
                "properties": properties,
            }]
        });

        self.http
            .put(self.items_url())
            .json(&payload)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(Self::transport)?;

        Ok(())
    }
}
