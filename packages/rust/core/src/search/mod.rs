//! Fuzzy search over markdown slide text.
//!
//! Each document is scored against the whole query and against every query
//! word. The reported score averages the whole-query score with the mean of
//! all word-pair scores, so documents sharing several query words rank
//! higher even when the full query never appears verbatim.

pub mod bitap;

use tracing::{debug, info, instrument};

use deckhand_shared::{DeckhandError, Result, SearchDocument, SearchOptions};

use crate::keys::{is_search_key, search_id};

use self::bitap::Bitap;

/// A matched document and its score (0.0 best, 1.0 worst).
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: String,
    pub score: f64,
}

/// An in-memory index over one corpus snapshot.
#[derive(Debug, Clone)]
pub struct SearchIndex {
    documents: Vec<SearchDocument>,
    options: SearchOptions,
}

impl SearchIndex {
    #[instrument(skip_all, fields(documents = documents.len()))]
    pub fn build(documents: Vec<SearchDocument>, options: &SearchOptions) -> Self {
        info!(
            threshold = options.threshold,
            distance = options.distance,
            "search index built"
        );
        Self {
            documents,
            options: options.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Ids of matching documents, best match first.
    pub fn search(&self, query: &str) -> Result<Vec<String>> {
        Ok(self
            .search_scored(query)?
            .into_iter()
            .map(|hit| hit.id)
            .collect())
    }

    /// Matching documents with scores, best match first.
    ///
    /// Equal scores keep document order.
    #[instrument(skip(self), fields(documents = self.documents.len()))]
    pub fn search_scored(&self, query: &str) -> Result<Vec<SearchHit>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(DeckhandError::InvalidQuery("query must not be empty".into()));
        }

        let main = Bitap::new(query, &self.options);
        let tokens: Vec<Bitap> = if self.options.tokenize {
            query
                .split_whitespace()
                .map(|token| Bitap::new(token, &self.options))
                .collect()
        } else {
            Vec::new()
        };

        let mut hits: Vec<SearchHit> = self
            .documents
            .iter()
            .filter_map(|doc| {
                score_document(&main, &tokens, &doc.text).map(|score| SearchHit {
                    id: doc.id.clone(),
                    score,
                })
            })
            .collect();
        hits.sort_by(|a, b| a.score.total_cmp(&b.score));

        debug!(hits = hits.len(), "query evaluated");
        Ok(hits)
    }
}

/// Score one document, or `None` when neither the query nor any word matched.
fn score_document(main: &Bitap, tokens: &[Bitap], text: &str) -> Option<f64> {
    let whole = main.search(text);
    if tokens.is_empty() {
        return whole.is_match.then_some(whole.score);
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    let mut any_token_matched = false;
    let mut total = 0.0;
    let mut pairs = 0usize;

    for token in tokens {
        for word in &words {
            let m = token.search(word);
            any_token_matched |= m.is_match;
            total += if m.is_match { m.score } else { 1.0 };
            pairs += 1;
        }
    }

    if !whole.is_match && !any_token_matched {
        return None;
    }
    if pairs == 0 {
        return Some(whole.score);
    }
    Some((whole.score + total / pairs as f64) / 2.0)
}

/// Turn fetched `(identifier, body)` pairs into search documents.
///
/// Only markdown identifiers are kept; ids drop the `.md` suffix.
pub fn build_documents<I>(objects: I) -> Vec<SearchDocument>
where
    I: IntoIterator<Item = (String, Vec<u8>)>,
{
    objects
        .into_iter()
        .filter(|(identifier, _)| is_search_key(identifier))
        .map(|(identifier, body)| {
            SearchDocument::new(
                search_id(&identifier),
                String::from_utf8_lossy(&body).into_owned(),
            )
        })
        .collect()
}
