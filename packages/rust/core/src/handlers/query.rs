//! Query entry point: HTTP-style request → ranked slide ids.
//!
//! The source location is resolved from the stack outputs on every request,
//! and the index is rebuilt from the current corpus each time.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use deckhand_shared::{AppConfig, DeckhandError, FetchOptions, Result, SearchOptions};
use deckhand_storage::{ObjectStore, StackOutputs};

use crate::corpus::fetch_corpus;
use crate::keys::is_search_key;
use crate::search::{SearchIndex, build_documents};

/// Query string parameter holding the search text.
const QUERY_PARAM: &str = "q";

/// An HTTP-style request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    #[serde(default)]
    pub query_string_parameters: Option<HashMap<String, String>>,
}

impl QueryRequest {
    pub fn with_query(query: impl Into<String>) -> Self {
        Self {
            query_string_parameters: Some(HashMap::from([(
                QUERY_PARAM.to_string(),
                query.into(),
            )])),
        }
    }

    /// The search text, if present and not blank.
    pub fn query(&self) -> Option<&str> {
        self.query_string_parameters
            .as_ref()
            .and_then(|params| params.get(QUERY_PARAM))
            .map(|q| q.trim())
            .filter(|q| !q.is_empty())
    }
}

/// An HTTP-style response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl QueryResponse {
    /// 400 with no body.
    pub fn bad_request() -> Self {
        Self {
            status_code: 400,
            headers: None,
            body: None,
        }
    }

    /// 200 with a JSON body.
    pub fn json(body: String) -> Self {
        Self {
            status_code: 200,
            headers: Some(HashMap::from([(
                "Content-Type".to_string(),
                "application/json".to_string(),
            )])),
            body: Some(body),
        }
    }
}

/// Settings for the query entry point.
#[derive(Debug, Clone)]
pub struct QuerySettings {
    /// Stack whose outputs name the source location.
    pub stack_name: String,
    /// Output key holding the source location.
    pub output_key: String,
    pub fetch: FetchOptions,
    pub search: SearchOptions,
}

impl From<&AppConfig> for QuerySettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            stack_name: config.stack.name.clone(),
            output_key: config.stack.source_output_key.clone(),
            fetch: FetchOptions::from(config),
            search: SearchOptions::from(config),
        }
    }
}

/// Collaborators and settings for one query.
#[derive(Clone)]
pub struct QueryContext {
    pub store: Arc<dyn ObjectStore>,
    pub outputs: Arc<dyn StackOutputs>,
    pub settings: QuerySettings,
}

/// Answer one search request.
///
/// A missing or blank query is answered with 400; every other failure is
/// returned as an error.
#[instrument(skip_all)]
pub async fn handle_query(ctx: &QueryContext, request: &QueryRequest) -> Result<QueryResponse> {
    let Some(query) = request.query() else {
        warn!("request has no query");
        return Ok(QueryResponse::bad_request());
    };

    let ids = search_corpus(ctx, query).await?;
    let body = serde_json::to_string(&ids)
        .map_err(|e| DeckhandError::validation(format!("failed to encode results: {e}")))?;

    Ok(QueryResponse::json(body))
}

/// Resolve the source location, index its markdown slides and run `query`.
#[instrument(skip(ctx), fields(stack = %ctx.settings.stack_name))]
pub async fn search_corpus(ctx: &QueryContext, query: &str) -> Result<Vec<String>> {
    let settings = &ctx.settings;
    let location = ctx
        .outputs
        .output(&settings.stack_name, &settings.output_key)
        .await?;

    let objects = fetch_corpus(
        Arc::clone(&ctx.store),
        &location,
        is_search_key,
        &settings.fetch,
    )
    .await?;

    let index = SearchIndex::build(build_documents(objects), &settings.search);
    let ids = index.search(query)?;

    info!(%location, results = ids.len(), "query answered");
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use deckhand_storage::{MemoryObjectStore, StaticStackOutputs};

    async fn context() -> QueryContext {
        let store = Arc::new(MemoryObjectStore::new());
        store.insert("source", "1/1.md", "introduction to networking").await;
        store.insert("source", "1/2.html", "<p>networking diagram</p>").await;
        store.insert("source", "2/1.md", "lamb dhal").await;
        store.insert("source", "3/2.md", "advanced networking topics").await;
        store.insert("source", "networking.md", "stray file").await;

        let outputs = StaticStackOutputs::new().with_output("deckhand", "SourceBucket", "source");

        QueryContext {
            store,
            outputs: Arc::new(outputs),
            settings: QuerySettings::from(&AppConfig::default()),
        }
    }

    fn ids(response: &QueryResponse) -> Vec<String> {
        serde_json::from_str(response.body.as_deref().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn answers_with_json_ids() {
        let ctx = context().await;
        let response = handle_query(&ctx, &QueryRequest::with_query("networking"))
            .await
            .unwrap();

        assert_eq!(response.status_code, 200);
        assert_eq!(
            response.headers.as_ref().unwrap().get("Content-Type").map(String::as_str),
            Some("application/json")
        );

        let ids = ids(&response);
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"1/1".to_string()));
        assert!(ids.contains(&"3/2".to_string()));
    }

    #[tokio::test]
    async fn no_match_is_empty_array() {
        let ctx = context().await;
        let response = handle_query(&ctx, &QueryRequest::with_query("zzz_no_match"))
            .await
            .unwrap();

        assert_eq!(response.status_code, 200);
        assert_eq!(response.body.as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn missing_or_blank_query_is_bad_request() {
        let ctx = context().await;
        let requests = [
            QueryRequest::default(),
            QueryRequest {
                query_string_parameters: Some(HashMap::new()),
            },
            QueryRequest::with_query(""),
            QueryRequest::with_query("   "),
        ];

        for request in &requests {
            let response = handle_query(&ctx, request).await.unwrap();
            assert_eq!(response, QueryResponse::bad_request());
        }
    }

    #[test]
    fn parses_request_with_null_parameters() {
        let request: QueryRequest =
            serde_json::from_str(r#"{"queryStringParameters":null}"#).unwrap();
        assert_eq!(request.query(), None);

        let request: QueryRequest =
            serde_json::from_str(r#"{"queryStringParameters":{"q":"slides"}}"#).unwrap();
        assert_eq!(request.query(), Some("slides"));
    }

    #[test]
    fn bad_request_serializes_without_body() {
        let json = serde_json::to_string(&QueryResponse::bad_request()).unwrap();
        assert_eq!(json, r#"{"statusCode":400}"#);
    }

    #[tokio::test]
    async fn unresolved_location_is_an_error() {
        let mut ctx = context().await;
        ctx.outputs = Arc::new(StaticStackOutputs::new());

        let err = handle_query(&ctx, &QueryRequest::with_query("networking"))
            .await
            .unwrap_err();
        assert!(matches!(err, DeckhandError::Resolution { .. }));
        assert!(!err.is_client_error());
    }

    #[tokio::test]
    async fn storage_failure_is_an_error() {
        let ctx = context().await;
        let store = Arc::new(MemoryObjectStore::new());
        store.insert("source", "1/1.md", "x").await;
        store.fail_on_get("1/1.md").await;
        let ctx = QueryContext { store, ..ctx };

        let err = handle_query(&ctx, &QueryRequest::with_query("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, DeckhandError::Storage(_)));
    }
}
