//! Firestore REST implementation of the document store client.
//!
//! One fixed document holds the portfolio
//! (`artifacts/{app_id}/public/data/portfolio_list/main`). Writes PATCH the
//! `items` field with an update mask so the replacement is wholesale; the
//! change feed is a polling loop keyed on the document's `updateTime`, which
//! also delivers the echo of our own writes.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use smile_portfolio::PortfolioItem;

use crate::config::RemoteConfig;
use crate::document::{DocumentError, DocumentEvent, DocumentStore, DocumentSubscription};
use crate::identity::Identity;

const FIRESTORE_BASE: &str = "https://firestore.googleapis.com/v1";

/// Path of the single shared portfolio document under a project's document
/// root: namespace, application id, public data, portfolio list, main.
fn document_path(app_id: &str) -> String {
    format!("artifacts/{app_id}/public/data/portfolio_list/main")
}

/// Document store client over the Firestore REST API.
pub struct FirestoreDocumentStore {
    http: reqwest::Client,
    document_url: String,
    poll_interval: Duration,
}

impl FirestoreDocumentStore {
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

    pub fn new(config: &RemoteConfig) -> Self {
        let document_url = format!(
            "{FIRESTORE_BASE}/projects/{}/databases/(default)/documents/{}",
            config.project_id,
            document_path(&config.app_id),
        );
        Self {
            http: reqwest::Client::new(),
            document_url,
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
        }
    }

    /// Override how often the change feed polls the document.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

#[async_trait]
impl DocumentStore for FirestoreDocumentStore {
    async fn subscribe(&self, identity: &Identity) -> Result<DocumentSubscription, DocumentError> {
        let (tx, rx) = mpsc::channel(32);
        let http = self.http.clone();
        let url = self.document_url.clone();
        let token = identity.token.clone();
        let poll_interval = self.poll_interval;

        let feed = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last_update: Option<String> = None;

            loop {
                ticker.tick().await;
                let event = match fetch_document(&http, &url, &token).await {
                    Ok(Some((update_time, items))) => {
                        if last_update.as_deref() == Some(update_time.as_str()) {
                            continue;
                        }
                        last_update = Some(update_time);
                        DocumentEvent::Snapshot(items)
                    }
                    // Document absent, or no items field yet: local defaults
                    // stay authoritative.
                    Ok(None) => continue,
                    Err(err) => DocumentEvent::Error(err),
                };
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });

        Ok(DocumentSubscription::new(rx, Some(feed)))
    }

    async fn write(
        &self,
        identity: &Identity,
        items: &[PortfolioItem],
    ) -> Result<(), DocumentError> {
        let url = format!("{}?updateMask.fieldPaths=items", self.document_url);
        let body = json!({ "fields": { "items": encode_items(items) } });

        let response = self
            .http
            .patch(&url)
            .bearer_auth(&identity.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| DocumentError::Transport(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => {
                Err(DocumentError::PermissionDenied)
            }
            status => Err(DocumentError::Transport(format!(
                "write failed with status {status}"
            ))),
        }
    }
}

async fn fetch_document(
    http: &reqwest::Client,
    url: &str,
    token: &str,
) -> Result<Option<(String, Vec<PortfolioItem>)>, DocumentError> {
    let response = http
        .get(url)
        .bearer_auth(token)
        .send()
        .await
        .map_err(|e| DocumentError::Transport(e.to_string()))?;

    match response.status() {
        StatusCode::NOT_FOUND => return Ok(None),
        StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => {
            return Err(DocumentError::PermissionDenied)
        }
        status if !status.is_success() => {
            return Err(DocumentError::Transport(format!(
                "read failed with status {status}"
            )))
        }
        _ => {}
    }

    let document: serde_json::Value = response
        .json()
        .await
        .map_err(|e| DocumentError::Malformed(e.to_string()))?;

    let update_time = document
        .get("updateTime")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_string();

    Ok(decode_items_field(&document).map(|items| (update_time, items)))
}

/// Encode a full item sequence as a Firestore `arrayValue`.
fn encode_items(items: &[PortfolioItem]) -> serde_json::Value {
    let values: Vec<_> = items.iter().map(encode_item).collect();
    json!({ "arrayValue": { "values": values } })
}

fn encode_item(item: &PortfolioItem) -> serde_json::Value {
    // Firestore carries 64-bit integers as decimal strings.
    json!({
        "mapValue": {
            "fields": {
                "id": { "integerValue": item.id.to_string() },
                "title": { "stringValue": &item.title },
                "subtitle": { "stringValue": &item.subtitle },
                "img": { "stringValue": &item.img },
            }
        }
    })
}

/// Pull the item sequence out of a document, if the `items` field exists and
/// is an array. Shape is the only thing checked; entries decode leniently.
fn decode_items_field(document: &serde_json::Value) -> Option<Vec<PortfolioItem>> {
    let array = document.get("fields")?.get("items")?.get("arrayValue")?;
    let values = match array.get("values") {
        // An empty Firestore array omits the values key entirely.
        None => return Some(Vec::new()),
        Some(values) => values.as_array()?,
    };
    Some(values.iter().map(decode_item).collect())
}

fn decode_item(value: &serde_json::Value) -> PortfolioItem {
    let fields = value.get("mapValue").and_then(|m| m.get("fields"));
    PortfolioItem {
        id: field_int(fields, "id"),
        title: field_str(fields, "title"),
        subtitle: field_str(fields, "subtitle"),
        img: field_str(fields, "img"),
    }
}

fn field_str(fields: Option<&serde_json::Value>, name: &str) -> String {
    fields
        .and_then(|f| f.get(name))
        .and_then(|v| v.get("stringValue"))
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn field_int(fields: Option<&serde_json::Value>, name: &str) -> i64 {
    fields
        .and_then(|f| f.get(name))
        .and_then(|v| v.get("integerValue"))
        .and_then(serde_json::Value::as_str)
        .and_then(|s| s.parse().ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn item() -> PortfolioItem {
        PortfolioItem::new(1702300000000, "Veneers", "Cosmetic", "https://x/y.jpg")
    }

    #[test]
    fn encode_uses_firestore_value_types() {
        let encoded = encode_item(&item());
        let fields = &encoded["mapValue"]["fields"];
        assert_eq!(fields["id"]["integerValue"], "1702300000000");
        assert_eq!(fields["title"]["stringValue"], "Veneers");
        assert_eq!(fields["img"]["stringValue"], "https://x/y.jpg");
    }

    #[test]
    fn items_round_trip_through_the_codec() {
        let items = vec![item(), PortfolioItem::new(2, "Whitening", "Brightening", "https://x/w.png")];
        let document = json!({ "fields": { "items": encode_items(&items) } });
        assert_eq!(decode_items_field(&document), Some(items));
    }

    #[test]
    fn empty_array_omits_values_key() {
        let document = json!({ "fields": { "items": { "arrayValue": {} } } });
        assert_eq!(decode_items_field(&document), Some(Vec::new()));
    }

    #[test]
    fn missing_items_field_is_absence() {
        let document = json!({ "fields": { "other": { "stringValue": "x" } } });
        assert_eq!(decode_items_field(&document), None);
        assert_eq!(decode_items_field(&json!({})), None);
    }

    #[test]
    fn malformed_entries_decode_leniently() {
        let document = json!({
            "fields": { "items": { "arrayValue": { "values": [
                { "mapValue": { "fields": { "title": { "stringValue": "Only title" } } } },
                { "stringValue": "not a map at all" },
            ] } } }
        });
        let items = decode_items_field(&document).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Only title");
        assert_eq!(items[0].id, 0);
        assert_eq!(items[1].title, "");
    }

    #[test]
    fn document_path_is_fixed() {
        assert_eq!(
            document_path("dental-clinic-app"),
            "artifacts/dental-clinic-app/public/data/portfolio_list/main"
        );
    }
}
