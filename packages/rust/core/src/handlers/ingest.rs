//! Ingestion entry point: storage-write event → published deck.
//!
//! 1. Fetch every slide object from the event's location
//! 2. Group, order and render them
//! 3. Substitute the slides into the template and publish the document
//! 4. Invalidate the document and search paths at the CDN
//!
//! Any failure aborts the run before the document is written, so the
//! previously published document stays in place.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use deckhand_shared::{AppConfig, DeckhandError, FetchOptions, Result};
use deckhand_storage::{
    CdnInvalidator, InvalidationReceipt, InvalidationRequest, ObjectStore, PutReceipt,
    PutRequest, TemplateSource,
};

use crate::aggregate::aggregate;
use crate::assembler::Deck;
use crate::corpus::fetch_corpus;
use crate::keys::{classify, is_slide_key};

/// Content type of the published document.
const DOCUMENT_CONTENT_TYPE: &str = "text/html";

/// Response element carrying the id of the write that triggered the event.
const REQUEST_ID_ELEMENT: &str = "x-amz-request-id";

/// A storage-write notification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<EventRecord>,
}

/// One written object within a [`StorageEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub s3: EventEntity,
    #[serde(rename = "responseElements", default)]
    pub response_elements: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEntity {
    pub bucket: EventBucket,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventBucket {
    pub name: String,
}

impl StorageEvent {
    /// A single-record event for a write to `location`.
    pub fn for_location(location: impl Into<String>, request_id: Option<&str>) -> Self {
        let response_elements = request_id
            .map(|id| HashMap::from([(REQUEST_ID_ELEMENT.to_string(), id.to_string())]))
            .unwrap_or_default();

        Self {
            records: vec![EventRecord {
                s3: EventEntity {
                    bucket: EventBucket {
                        name: location.into(),
                    },
                },
                response_elements,
            }],
        }
    }

    /// Location named by the first record.
    pub fn location(&self) -> Result<&str> {
        self.records
            .first()
            .map(|r| r.s3.bucket.name.as_str())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| DeckhandError::validation("storage event has no records"))
    }

    /// Request id of the first record, if the event carries one.
    pub fn request_id(&self) -> Option<&str> {
        self.records
            .first()
            .and_then(|r| r.response_elements.get(REQUEST_ID_ELEMENT))
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }
}

/// Settings for the ingestion entry point.
#[derive(Debug, Clone)]
pub struct IngestSettings {
    /// Location the assembled document is published to.
    pub presentation_location: String,
    /// Identifier of the published document.
    pub document_key: String,
    /// Substitution marker in the template.
    pub marker: String,
    /// CDN distribution fronting the presentation location.
    pub distribution: String,
    /// Invalidation path covering search responses.
    pub search_path: String,
    pub fetch: FetchOptions,
}

impl From<&AppConfig> for IngestSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            presentation_location: config.presentation.location.clone(),
            document_key: config.presentation.document_key.clone(),
            marker: config.presentation.marker.clone(),
            distribution: config.cdn.distribution.clone(),
            search_path: config.cdn.search_path.clone(),
            fetch: FetchOptions::from(config),
        }
    }
}

/// Collaborators and settings for one ingestion run.
#[derive(Clone)]
pub struct IngestContext {
    pub store: Arc<dyn ObjectStore>,
    pub cdn: Arc<dyn CdnInvalidator>,
    pub template: Arc<dyn TemplateSource>,
    pub settings: IngestSettings,
}

/// Result of a successful ingestion run.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    /// The written document.
    pub receipt: PutReceipt,
    /// Number of slide groups in the deck.
    pub groups: usize,
    pub invalidation: InvalidationReceipt,
    pub elapsed: std::time::Duration,
}

/// Rebuild and publish the deck for the location named by `event`.
#[instrument(skip_all, fields(records = event.records.len()))]
pub async fn handle_ingest(ctx: &IngestContext, event: &StorageEvent) -> Result<IngestOutcome> {
    let start = Instant::now();
    let location = event.location()?;
    let settings = &ctx.settings;

    info!(%location, "starting ingestion");

    // --- Corpus ---
    let objects = fetch_corpus(
        Arc::clone(&ctx.store),
        location,
        is_slide_key,
        &settings.fetch,
    )
    .await?;

    // --- Aggregate + render ---
    let groups = aggregate(classify(objects));
    let deck = Deck::render(&groups);

    // --- Assemble ---
    let template = ctx.template.read_template()?;
    let document = deck.assemble(&template, &settings.marker)?;

    // --- Publish ---
    let receipt = ctx
        .store
        .put_object(
            &settings.presentation_location,
            PutRequest {
                identifier: settings.document_key.clone(),
                body: document.into_bytes(),
                content_type: DOCUMENT_CONTENT_TYPE.to_string(),
                public_read: true,
            },
        )
        .await?;
    info!(
        location = %settings.presentation_location,
        identifier = %receipt.identifier,
        sha256 = %receipt.sha256,
        size = receipt.size_bytes,
        "document published"
    );

    // --- Invalidate ---
    let request = invalidation_request(settings, event.request_id());
    let invalidation = ctx.cdn.create_invalidation(&request).await?;
    info!(id = %invalidation.id, paths = ?request.paths, "invalidation requested");

    let outcome = IngestOutcome {
        receipt,
        groups: groups.len(),
        invalidation,
        elapsed: start.elapsed(),
    };
    info!(
        groups = outcome.groups,
        elapsed_ms = outcome.elapsed.as_millis() as u64,
        "ingestion complete"
    );
    Ok(outcome)
}

/// Invalidation for the published document and every search response.
///
/// Without a request id, a fresh UUID v7 serves as the caller reference.
pub fn invalidation_request(
    settings: &IngestSettings,
    request_id: Option<&str>,
) -> InvalidationRequest {
    let caller_reference = request_id
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::now_v7().to_string());

    InvalidationRequest {
        distribution: settings.distribution.clone(),
        caller_reference,
        paths: vec![
            format!("/{}", settings.document_key.trim_start_matches('/')),
            settings.search_path.clone(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deckhand_storage::{MemoryCdnInvalidator, MemoryObjectStore, StaticTemplate};

    const TEMPLATE: &str = "<html><div class=\"slides\">%slides%</div></html>";

    fn settings() -> IngestSettings {
        IngestSettings::from(&AppConfig::default())
    }

    async fn source() -> Arc<MemoryObjectStore> {
        let store = Arc::new(MemoryObjectStore::new());
        store.insert("source", "2/2.md", "C").await;
        store.insert("source", "1/1.md", "A").await;
        store.insert("source", "2/1.html", "<h2>B</h2>").await;
        store.insert("source", "readme.txt", "not a slide").await;
        store.insert("source", "1/abc.md", "not a slide either").await;
        store
    }

    fn context(
        store: Arc<MemoryObjectStore>,
        cdn: Arc<MemoryCdnInvalidator>,
        template: &str,
    ) -> IngestContext {
        IngestContext {
            store,
            cdn,
            template: Arc::new(StaticTemplate(template.to_string())),
            settings: settings(),
        }
    }

    #[test]
    fn parses_storage_event_json() {
        let json = r#"{"Records":[{"s3":{"bucket":{"name":"source"}},
            "responseElements":{"x-amz-request-id":"REQ123"}}]}"#;
        let event: StorageEvent = serde_json::from_str(json).unwrap();

        assert_eq!(event.location().unwrap(), "source");
        assert_eq!(event.request_id(), Some("REQ123"));
        assert_eq!(event, StorageEvent::for_location("source", Some("REQ123")));
    }

    #[test]
    fn event_without_records_is_invalid() {
        let event: StorageEvent = serde_json::from_str("{}").unwrap();
        assert!(matches!(
            event.location().unwrap_err(),
            DeckhandError::Validation { .. }
        ));
    }

    #[test]
    fn invalidation_uses_request_id_or_fresh_reference() {
        let with_id = invalidation_request(&settings(), Some("REQ1"));
        assert_eq!(with_id.caller_reference, "REQ1");
        assert_eq!(with_id.paths, vec!["/index.html", "/search*"]);

        let first = invalidation_request(&settings(), None);
        let second = invalidation_request(&settings(), None);
        assert!(!first.caller_reference.is_empty());
        assert_ne!(first.caller_reference, second.caller_reference);
    }

    #[tokio::test]
    async fn publishes_ordered_deck_and_invalidates() {
        let store = source().await;
        let cdn = Arc::new(MemoryCdnInvalidator::new());
        let ctx = context(store.clone(), cdn.clone(), TEMPLATE);

        let outcome = handle_ingest(&ctx, &StorageEvent::for_location("source", Some("REQ9")))
            .await
            .unwrap();
        assert_eq!(outcome.groups, 2);
        assert_eq!(outcome.receipt.identifier, "index.html");

        let published = store.object("presentation", "index.html").await.unwrap();
        assert_eq!(published.content_type.as_deref(), Some("text/html"));
        assert!(published.public_read);

        let html = String::from_utf8(published.body).unwrap();
        let a = html.find(r#"<script type="text/template">A</script>"#).unwrap();
        let b = html.find("<section><h2>B</h2></section>").unwrap();
        let c = html.find(r#"<script type="text/template">C</script>"#).unwrap();
        assert!(a < b && b < c);
        assert!(!html.contains("not a slide"));
        assert!(!html.contains("%slides%"));

        let requests = cdn.requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].distribution, "local");
        assert_eq!(requests[0].caller_reference, "REQ9");
        assert_eq!(requests[0].paths, vec!["/index.html", "/search*"]);
    }

    #[tokio::test]
    async fn rerun_on_unchanged_corpus_is_byte_identical() {
        let store = source().await;
        let ctx = context(store.clone(), Arc::new(MemoryCdnInvalidator::new()), TEMPLATE);
        let event = StorageEvent::for_location("source", None);

        let first = handle_ingest(&ctx, &event).await.unwrap();
        let first_body = store.object("presentation", "index.html").await.unwrap().body;
        let second = handle_ingest(&ctx, &event).await.unwrap();
        let second_body = store.object("presentation", "index.html").await.unwrap().body;

        assert_eq!(first_body, second_body);
        assert_eq!(first.receipt.sha256, second.receipt.sha256);
    }

    #[tokio::test]
    async fn missing_marker_leaves_previous_document() {
        let store = source().await;
        store.insert("presentation", "index.html", "previous").await;
        let cdn = Arc::new(MemoryCdnInvalidator::new());
        let ctx = context(store.clone(), cdn.clone(), "<html>no marker</html>");

        let err = handle_ingest(&ctx, &StorageEvent::for_location("source", None))
            .await
            .unwrap_err();

        assert!(matches!(err, DeckhandError::Template { .. }));
        let kept = store.object("presentation", "index.html").await.unwrap();
        assert_eq!(kept.body, b"previous");
        assert!(cdn.requests().await.is_empty());
    }

    #[tokio::test]
    async fn failed_fetch_aborts_before_publishing() {
        let store = source().await;
        store.insert("presentation", "index.html", "previous").await;
        store.fail_on_get("2/1.html").await;
        let ctx = context(store.clone(), Arc::new(MemoryCdnInvalidator::new()), TEMPLATE);

        let err = handle_ingest(&ctx, &StorageEvent::for_location("source", None))
            .await
            .unwrap_err();

        assert!(matches!(err, DeckhandError::Storage(_)));
        let kept = store.object("presentation", "index.html").await.unwrap();
        assert_eq!(kept.body, b"previous");
    }

    #[tokio::test]
    async fn cdn_failure_is_propagated() {
        let store = source().await;
        let ctx = context(store, Arc::new(MemoryCdnInvalidator::failing()), TEMPLATE);

        let err = handle_ingest(&ctx, &StorageEvent::for_location("source", None))
            .await
            .unwrap_err();
        assert!(matches!(err, DeckhandError::Cdn(_)));
    }

    #[tokio::test]
    async fn empty_corpus_publishes_empty_deck() {
        let store = Arc::new(MemoryObjectStore::new());
        store.insert("source", "notes.txt", "unrelated").await;
        let ctx = context(store.clone(), Arc::new(MemoryCdnInvalidator::new()), "[%slides%]");

        let outcome = handle_ingest(&ctx, &StorageEvent::for_location("source", None))
            .await
            .unwrap();

        assert_eq!(outcome.groups, 0);
        let published = store.object("presentation", "index.html").await.unwrap();
        assert_eq!(published.body, b"[]");
    }
}
