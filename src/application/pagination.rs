//! Offset pagination over a [`RecordStore`]: one ranged read plus one count read.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::application::query::RecordQuery;
use crate::application::repos::{RecordStore, RepoError, decode_row};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// 1-based page request; out-of-range values are clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn new(page: Option<u32>, page_size: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            page_size: page_size
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub count: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u64,
}

impl<T> Page<T> {
    fn new(items: Vec<T>, count: u64, request: PageRequest) -> Self {
        Self {
            items,
            count,
            page: request.page,
            page_size: request.page_size,
            total_pages: count.div_ceil(u64::from(request.page_size)),
        }
    }
}

/// Composes page and count reads from a single [`RecordQuery`].
#[derive(Clone)]
pub struct QueryComposer {
    store: Arc<dyn RecordStore>,
}

impl QueryComposer {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn fetch(
        &self,
        query: &RecordQuery,
        request: PageRequest,
    ) -> Result<Page<Value>, RepoError> {
        let (rows, count) = tokio::try_join!(
            self.store
                .fetch_page(query, request.offset(), request.limit()),
            self.store.count(query),
        )?;

        debug!(
            target = "marketdesk::pagination",
            collection = query.collection.table(),
            filters = query.filters.len(),
            page = request.page,
            page_size = request.page_size,
            returned = rows.len(),
            count,
            "page composed"
        );

        Ok(Page::new(rows, count, request))
    }

    pub async fn fetch_typed<T: DeserializeOwned>(
        &self,
        query: &RecordQuery,
        request: PageRequest,
    ) -> Result<Page<T>, RepoError> {
        let page = self.fetch(query, request).await?;
        let items = page
            .items
            .into_iter()
            .map(decode_row)
            .collect::<Result<Vec<T>, _>>()?;

        Ok(Page {
            items,
            count: page.count,
            page: page.page,
            page_size: page.page_size,
            total_pages: page.total_pages,
        })
    }
}
