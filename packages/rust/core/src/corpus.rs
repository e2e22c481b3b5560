//! Corpus retrieval: paginated listing and concurrent object fetches.
//!
//! Listing follows continuation tokens one page at a time, bounded by
//! `max_pages`. Fetches run concurrently, bounded by `concurrency`. Any
//! failed page or fetch fails the whole retrieval; nothing is retried.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument};

use deckhand_shared::{DeckhandError, FetchOptions, Result};
use deckhand_storage::{ListRequest, ObjectStore, ObjectSummary};

/// List every object in `location`, concatenating pages in order.
#[instrument(skip_all, fields(location = %location, page_size = options.page_size))]
pub async fn list_all(
    store: &dyn ObjectStore,
    location: &str,
    options: &FetchOptions,
) -> Result<Vec<ObjectSummary>> {
    let mut contents = Vec::new();
    let mut continuation_token: Option<String> = None;

    for page_number in 1..=options.max_pages {
        let request = ListRequest {
            continuation_token: continuation_token.take(),
            max_keys: options.page_size,
        };
        let page = store.list_page(location, &request).await?;

        debug!(page_number, count = page.contents.len(), "received listing page");
        contents.extend(page.contents);

        if !page.is_truncated {
            info!(pages = page_number, objects = contents.len(), "listing complete");
            return Ok(contents);
        }

        continuation_token = Some(page.next_continuation_token.ok_or_else(|| {
            DeckhandError::Storage(format!(
                "listing page {page_number} of {location:?} is truncated without a token"
            ))
        })?);
    }

    Err(DeckhandError::Storage(format!(
        "listing {location:?} exceeded {} pages",
        options.max_pages
    )))
}

/// Fetch the bodies of `identifiers` concurrently.
///
/// Results come back in the same order as `identifiers`. The first failure
/// aborts every fetch still pending or in flight.
#[instrument(skip_all, fields(location = %location, count = identifiers.len()))]
pub async fn retrieve_all(
    store: Arc<dyn ObjectStore>,
    location: &str,
    identifiers: Vec<String>,
    options: &FetchOptions,
) -> Result<Vec<(String, Vec<u8>)>> {
    let semaphore = Arc::new(Semaphore::new(options.concurrency.max(1)));
    let count = identifiers.len();
    let mut tasks = JoinSet::new();

    for (slot, identifier) in identifiers.into_iter().enumerate() {
        let store = Arc::clone(&store);
        let sem = Arc::clone(&semaphore);
        let location = location.to_string();

        tasks.spawn(async move {
            let _permit = sem
                .acquire_owned()
                .await
                .map_err(|e| DeckhandError::Storage(format!("fetch pool closed: {e}")))?;
            let body = store.get_object(&location, &identifier).await?;
            debug!(%identifier, size = body.len(), "fetched object");
            Ok::<_, DeckhandError>((slot, identifier, body))
        });
    }

    let mut slots: Vec<Option<(String, Vec<u8>)>> = vec![None; count];
    while let Some(joined) = tasks.join_next().await {
        let fetched = match joined {
            Ok(fetched) => fetched,
            Err(e) => Err(DeckhandError::Storage(format!("fetch task failed: {e}"))),
        };
        match fetched {
            Ok((slot, identifier, body)) => slots[slot] = Some((identifier, body)),
            Err(e) => {
                tasks.abort_all();
                return Err(e);
            }
        }
    }

    let objects: Vec<_> = slots.into_iter().flatten().collect();
    info!(objects = objects.len(), "corpus retrieved");
    Ok(objects)
}

/// List `location`, keep identifiers accepted by `filter`, and fetch them.
pub async fn fetch_corpus(
    store: Arc<dyn ObjectStore>,
    location: &str,
    filter: impl Fn(&str) -> bool,
    options: &FetchOptions,
) -> Result<Vec<(String, Vec<u8>)>> {
    let listed = list_all(store.as_ref(), location, options).await?;
    let identifiers: Vec<String> = listed
        .into_iter()
        .map(|o| o.identifier)
        .filter(|id| filter(id))
        .collect();

    debug!(?identifiers, "identifiers selected for retrieval");

    retrieve_all(store, location, identifiers, options).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use deckhand_storage::{ListPage, MemoryObjectStore, PutReceipt, PutRequest};

    fn options(page_size: usize, max_pages: usize, concurrency: usize) -> FetchOptions {
        FetchOptions {
            page_size,
            max_pages,
            concurrency,
        }
    }

    async fn seeded(count: usize) -> Arc<MemoryObjectStore> {
        let store = Arc::new(MemoryObjectStore::new());
        for i in 0..count {
            store
                .insert("src", &format!("{}/1.md", i + 1), format!("body {i}"))
                .await;
        }
        store.insert("src", "readme.txt", "ignored").await;
        store
    }

    /// Always claims more pages exist.
    struct EndlessStore;

    #[async_trait]
    impl ObjectStore for EndlessStore {
        async fn list_page(&self, _location: &str, request: &ListRequest) -> Result<ListPage> {
            let n: usize = request
                .continuation_token
                .as_deref()
                .and_then(|t| t.parse().ok())
                .unwrap_or(0);
            Ok(ListPage {
                contents: vec![ObjectSummary {
                    identifier: format!("{n}/1.md"),
                    size: 1,
                }],
                is_truncated: true,
                next_continuation_token: Some((n + 1).to_string()),
            })
        }

        async fn get_object(&self, _location: &str, _identifier: &str) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }

        async fn put_object(&self, _location: &str, _request: PutRequest) -> Result<PutReceipt> {
            Err(DeckhandError::Storage("read-only".into()))
        }
    }

    /// Claims more pages exist but never hands out a token.
    struct TokenlessStore;

    #[async_trait]
    impl ObjectStore for TokenlessStore {
        async fn list_page(&self, _location: &str, _request: &ListRequest) -> Result<ListPage> {
            Ok(ListPage {
                contents: vec![ObjectSummary {
                    identifier: "1/1.md".into(),
                    size: 1,
                }],
                is_truncated: true,
                next_continuation_token: None,
            })
        }

        async fn get_object(&self, _location: &str, _identifier: &str) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }

        async fn put_object(&self, _location: &str, _request: PutRequest) -> Result<PutReceipt> {
            Err(DeckhandError::Storage("read-only".into()))
        }
    }

    /// Fails `bad` at once; every other fetch completes after a delay.
    #[derive(Default)]
    struct SlowStore {
        completed: AtomicUsize,
    }

    #[async_trait]
    impl ObjectStore for SlowStore {
        async fn list_page(&self, _location: &str, _request: &ListRequest) -> Result<ListPage> {
            Ok(ListPage::default())
        }

        async fn get_object(&self, _location: &str, identifier: &str) -> Result<Vec<u8>> {
            if identifier == "bad" {
                return Err(DeckhandError::Storage("injected failure".into()));
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            self.completed.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        }

        async fn put_object(&self, _location: &str, _request: PutRequest) -> Result<PutReceipt> {
            Err(DeckhandError::Storage("read-only".into()))
        }
    }

    /// Tracks the peak number of concurrent fetches.
    #[derive(Default)]
    struct GaugedStore {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl ObjectStore for GaugedStore {
        async fn list_page(&self, _location: &str, _request: &ListRequest) -> Result<ListPage> {
            Ok(ListPage::default())
        }

        async fn get_object(&self, _location: &str, identifier: &str) -> Result<Vec<u8>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(identifier.as_bytes().to_vec())
        }

        async fn put_object(&self, _location: &str, _request: PutRequest) -> Result<PutReceipt> {
            Err(DeckhandError::Storage("read-only".into()))
        }
    }

    #[tokio::test]
    async fn list_all_follows_every_page() {
        let store = seeded(7).await;
        let listed = list_all(store.as_ref(), "src", &options(3, 100, 4))
            .await
            .unwrap();

        assert_eq!(listed.len(), 8);
        assert_eq!(store.list_calls(), 3);
        let ids: Vec<_> = listed.iter().map(|o| o.identifier.clone()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[tokio::test]
    async fn list_all_is_bounded() {
        let err = list_all(&EndlessStore, "src", &options(1, 5, 1))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("exceeded 5 pages"));
    }

    #[tokio::test]
    async fn truncated_page_without_token_fails() {
        let err = list_all(&TokenlessStore, "src", &options(1, 5, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, DeckhandError::Storage(_)));
        assert!(err.to_string().contains("truncated without a token"));
    }

    #[tokio::test]
    async fn failed_fetch_cancels_in_flight_fetches() {
        let store = Arc::new(SlowStore::default());
        let mut ids: Vec<String> = (0..6).map(|i| format!("{i}/1.md")).collect();
        ids.insert(0, "bad".to_string());

        let err = retrieve_all(store.clone(), "src", ids, &options(10, 10, 4))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("injected failure"));

        tokio::time::sleep(std::time::Duration::from_millis(150)).await;
        assert_eq!(store.completed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn list_all_missing_location_fails() {
        let store = MemoryObjectStore::new();
        assert!(list_all(&store, "nope", &FetchOptions::default()).await.is_err());
    }

    #[tokio::test]
    async fn retrieve_all_preserves_request_order() {
        let store = seeded(5).await;
        let ids = vec!["3/1.md".to_string(), "1/1.md".to_string(), "5/1.md".to_string()];
        let objects = retrieve_all(store, "src", ids.clone(), &options(10, 10, 2))
            .await
            .unwrap();

        let got: Vec<_> = objects.iter().map(|(id, _)| id.clone()).collect();
        assert_eq!(got, ids);
        assert_eq!(objects[1].1, b"body 0");
    }

    #[tokio::test]
    async fn retrieve_all_respects_concurrency_cap() {
        let store = Arc::new(GaugedStore::default());
        let ids: Vec<String> = (0..20).map(|i| format!("{i}/1.md")).collect();

        let objects = retrieve_all(store.clone(), "src", ids, &options(10, 10, 3))
            .await
            .unwrap();

        assert_eq!(objects.len(), 20);
        assert!(store.peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn single_failed_fetch_fails_retrieval() {
        let store = seeded(4).await;
        store.fail_on_get("2/1.md").await;

        let err = fetch_corpus(store, "src", |id| id.ends_with(".md"), &options(2, 10, 4))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("injected failure"));
    }

    #[tokio::test]
    async fn fetch_corpus_applies_filter() {
        let store = seeded(3).await;
        let keep = |id: &str| id != "readme.txt";
        let objects = fetch_corpus(store.clone(), "src", keep, &options(2, 10, 4))
            .await
            .unwrap();

        assert_eq!(objects.len(), 3);
        assert_eq!(store.get_calls(), 3);
    }
}
