//! Passage retrieval.
//!
//! Embeds a query and returns the nearest chunks from the passage index,
//! nearest first, in the order the index reports them. A passage index that
//! has not been built yet yields an empty list (logged at `warn`); every
//! other failure is logged and returned to the caller.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::embedding::{embed_query, EmbeddingProvider};
use crate::error::Result;
use crate::models::{Chunk, Passage};
use crate::store::{IndexPaths, StoreHandle};

/// Default number of passages returned per query.
pub const DEFAULT_TOP_K: usize = 3;

pub struct RetrievalService {
    provider: Arc<dyn EmbeddingProvider>,
    store: StoreHandle<Chunk>,
}

impl RetrievalService {
    pub fn new(paths: IndexPaths, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider,
            store: StoreHandle::new(paths),
        }
    }

    /// Up to `k` passages for `query`, nearest first.
    pub fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Passage>> {
        self.try_retrieve(query, k).inspect_err(|e| {
            error!(error = %e, kind = ?e.kind(), "passage retrieval failed");
        })
    }

    /// Forget the cached index; call after the passage index is rebuilt.
    pub fn reload(&self) {
        self.store.reload();
    }

    fn try_retrieve(&self, query: &str, k: usize) -> Result<Vec<Passage>> {
        let Some(store) = self.store.get()? else {
            warn!(
                dir = %self.store.paths().dir().display(),
                "passage index not built yet, returning no passages"
            );
            return Ok(Vec::new());
        };

        let query_vec = embed_query(self.provider.as_ref(), query)?;
        let passages: Vec<Passage> = store
            .search(&query_vec, k)?
            .into_iter()
            .map(|hit| Passage {
                text: hit.payload.text.clone(),
                source: hit.payload.source.clone(),
                distance: hit.distance,
            })
            .collect();

        debug!(k, returned = passages.len(), "retrieved passages");
        Ok(passages)
    }
}
