//! Lazy, cursor-paginated listing of the objects in a bucket.

use crate::io::cloud::{CloudResult, ListObjectsRequest, ObjectIO, ObjectSummary};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

/// Produces the objects of one bucket (optionally under a key prefix), one page at a
/// time, in lexicographic key order.
#[derive(Clone)]
pub struct ObjectLister {
    store: Arc<dyn ObjectIO>,
    bucket: String,
    prefix: Option<String>,
    page_size: u32,
}

impl ObjectLister {
    pub fn new(
        store: Arc<dyn ObjectIO>,
        bucket: impl Into<String>,
        prefix: Option<String>,
        page_size: u32,
    ) -> Self {
        Self {
            store,
            bucket: bucket.into(),
            prefix,
            page_size,
        }
    }

    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Starts a fresh listing.
    ///
    /// No request is sent until the returned iterator is first advanced. `start_after`
    /// only goes out with the first request; later pages are addressed by the store's
    /// continuation token alone.
    #[must_use]
    pub fn list(&self, start_after: Option<&str>) -> ObjectSummaryIter {
        ObjectSummaryIter {
            store: Arc::clone(&self.store),
            request: ListObjectsRequest {
                bucket: self.bucket.clone(),
                prefix: self.prefix.clone(),
                max_keys: self.page_size,
                continuation_token: None,
                start_after: start_after.map(str::to_string),
            },
            buffer: VecDeque::new(),
            pages_fetched: 0,
            done: false,
        }
    }
}

/// Iterator over one listing. Not restartable: call [`ObjectLister::list`] again to
/// re-list from the store.
///
/// A failed page request is yielded as an `Err` and ends the iteration.
pub struct ObjectSummaryIter {
    store: Arc<dyn ObjectIO>,
    request: ListObjectsRequest,
    buffer: VecDeque<ObjectSummary>,
    pages_fetched: usize,
    done: bool,
}

impl ObjectSummaryIter {
    fn fetch_page(&mut self) -> CloudResult<()> {
        let page = self.store.list_objects(&self.request)?;
        self.pages_fetched += 1;
        debug!(
            bucket = %self.request.bucket,
            page = self.pages_fetched,
            objects = page.objects.len(),
            more = page.next_continuation_token.is_some(),
            "fetched listing page"
        );
        self.buffer.extend(page.objects);
        match page.next_continuation_token {
            Some(token) => {
                self.request.start_after = None;
                self.request.continuation_token = Some(token);
            }
            None => {
                self.request.continuation_token = None;
                self.done = true;
            }
        }
        Ok(())
    }
}

impl Iterator for ObjectSummaryIter {
    type Item = CloudResult<ObjectSummary>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(summary) = self.buffer.pop_front() {
                return Some(Ok(summary));
            }
            if self.done {
                return None;
            }
            if let Err(e) = self.fetch_page() {
                self.done = true;
                return Some(Err(e));
            }
        }
    }
}
