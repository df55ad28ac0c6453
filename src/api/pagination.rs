//! Bounded concurrent pagination.
//!
//! The first page of a query tells us how many pages exist. The remaining
//! pages are then requested concurrently, with at most `concurrency` requests
//! in flight, and handed back in page order.

use std::future::Future;

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, instrument};

use super::error::{ApiError, Result};
use super::types::{ObjectCollection, ObjectPage};

/// Default number of pages fetched at once.
pub const DEFAULT_PAGE_CONCURRENCY: usize = 5;

/// A page of a paginated API response.
pub trait Paged {
    /// This page's number (1-based).
    fn page_number(&self) -> u32;

    /// The total number of pages the API reports.
    fn page_count(&self) -> u32;

    /// Number of items on this page.
    fn item_count(&self) -> usize;
}

impl Paged for ObjectPage {
    fn page_number(&self) -> u32 {
        self.page_number
    }

    fn page_count(&self) -> u32 {
        self.page_size
    }

    fn item_count(&self) -> usize {
        self.object_entries.len()
    }
}

/// Drives a page fetcher over every page of a query.
#[derive(Debug, Clone, Copy)]
pub struct Paginator {
    concurrency: usize,
    max_pages: Option<u32>,
}

impl Default for Paginator {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_CONCURRENCY)
    }
}

impl Paginator {
    /// Create a paginator fetching up to `concurrency` pages at once.
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency: concurrency.max(1),
            max_pages: None,
        }
    }

    /// Stop after `max_pages` pages even if the API reports more.
    pub fn max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = Some(max_pages.max(1));
        self
    }

    /// Fetch every page, in page order.
    ///
    /// `fetch` is called with 1-based page numbers. The walk ends at the last
    /// page the API reports, at the first empty page, or at `max_pages`.
    ///
    /// # Errors
    ///
    /// The first failing page aborts the walk with `ApiError::PageFetch`;
    /// requests still in flight are dropped.
    #[instrument(skip(self, fetch), fields(concurrency = self.concurrency))]
    pub async fn fetch_all<P, F, Fut>(&self, fetch: F) -> Result<Vec<P>>
    where
        P: Paged,
        F: Fn(u32) -> Fut,
        Fut: Future<Output = Result<P>>,
    {
        let first = fetch(1).await.map_err(|e| ApiError::page_fetch(1, e))?;

        let mut last_page = first.page_count();
        if let Some(max) = self.max_pages {
            last_page = last_page.min(max);
        }
        debug!(
            page_count = first.page_count(),
            last_page, "Fetched first page"
        );

        if first.item_count() == 0 || last_page <= first.page_number() {
            return Ok(vec![first]);
        }

        let mut pages = Vec::with_capacity(last_page as usize);
        let next = first.page_number() + 1;
        pages.push(first);

        let mut remaining = stream::iter(next..=last_page)
            .map(|page| {
                let request = fetch(page);
                async move { request.await.map_err(|e| ApiError::page_fetch(page, e)) }
            })
            .buffered(self.concurrency);

        while let Some(page) = remaining.try_next().await? {
            let exhausted = page.item_count() == 0 || page.page_number() >= page.page_count();
            pages.push(page);
            if exhausted {
                break;
            }
        }

        debug!(pages = pages.len(), "Pagination finished");
        Ok(pages)
    }
}

impl ObjectCollection {
    /// Merge query pages into one collection.
    ///
    /// Attribute definitions and the total count come from the first page.
    pub fn from_pages(pages: Vec<ObjectPage>) -> Self {
        let pages_fetched = pages.len() as u32;
        let mut pages = pages.into_iter();

        let Some(first) = pages.next() else {
            return Self {
                objects: Vec::new(),
                object_type_attributes: Vec::new(),
                total_filter_count: 0,
                pages_fetched: 0,
            };
        };

        let total_filter_count = first.total_filter_count;
        let object_type_attributes = first.object_type_attributes;
        let mut objects = first.object_entries;
        for page in pages {
            objects.extend(page.object_entries);
        }

        Self {
            objects,
            object_type_attributes,
            total_filter_count,
            pages_fetched,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Debug)]
    struct FakePage {
        number: u32,
        count: u32,
        items: Vec<u32>,
    }

    impl Paged for FakePage {
        fn page_number(&self) -> u32 {
            self.number
        }

        fn page_count(&self) -> u32 {
            self.count
        }

        fn item_count(&self) -> usize {
            self.items.len()
        }
    }

    fn full_page(number: u32, count: u32) -> FakePage {
        FakePage {
            number,
            count,
            items: vec![number * 10, number * 10 + 1],
        }
    }

    #[tokio::test]
    async fn test_single_page_stops_after_first_request() {
        let calls = AtomicUsize::new(0);
        let pages = Paginator::default()
            .fetch_all(|n| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok(full_page(n, 1)) }
            })
            .await
            .unwrap();

        assert_eq!(pages.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fetches_every_reported_page_in_order() {
        let pages = Paginator::new(3)
            .fetch_all(|n| async move {
                // Later pages answer faster; order must still be kept.
                tokio::time::sleep(Duration::from_millis(u64::from(20 - n))).await;
                Ok(full_page(n, 7))
            })
            .await
            .unwrap();

        let numbers: Vec<u32> = pages.iter().map(|p| p.number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_is_bounded() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let pages = Paginator::new(2)
            .fetch_all(|n| {
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(full_page(n, 10))
                }
            })
            .await
            .unwrap();

        assert_eq!(pages.len(), 10);
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_page_terminates() {
        let requested = Mutex::new(Vec::new());
        let pages = Paginator::new(1)
            .fetch_all(|n| {
                requested.lock().unwrap().push(n);
                async move {
                    if n >= 3 {
                        Ok(FakePage {
                            number: n,
                            count: 10,
                            items: vec![],
                        })
                    } else {
                        Ok(full_page(n, 10))
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(pages.len(), 3);
        assert!(pages[2].items.is_empty());
        assert_eq!(*requested.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_empty_first_page_returns_immediately() {
        let pages = Paginator::default()
            .fetch_all(|n| async move {
                Ok(FakePage {
                    number: n,
                    count: 0,
                    items: vec![],
                })
            })
            .await
            .unwrap();

        assert_eq!(pages.len(), 1);
    }

    #[tokio::test]
    async fn test_max_pages_caps_walk() {
        let pages = Paginator::new(4)
            .max_pages(3)
            .fetch_all(|n| async move { Ok(full_page(n, 50)) })
            .await
            .unwrap();

        assert_eq!(pages.len(), 3);
    }

    #[tokio::test]
    async fn test_failing_page_reports_page_number() {
        let err = Paginator::new(2)
            .fetch_all(|n| async move {
                if n == 4 {
                    Err(ApiError::ServerError("HTTP 500".to_string()))
                } else {
                    Ok(full_page(n, 6))
                }
            })
            .await
            .unwrap_err();

        assert_eq!(err.failed_page(), Some(4));
        assert!(err.to_string().contains("page 4"));
    }

    #[tokio::test]
    async fn test_failing_first_page_is_page_fetch_error() {
        let err = Paginator::default()
            .fetch_all(|_| async { Err::<FakePage, _>(ApiError::Unauthorized) })
            .await
            .unwrap_err();

        match err {
            ApiError::PageFetch { page, source } => {
                assert_eq!(page, 1);
                assert!(matches!(*source, ApiError::Unauthorized));
            }
            other => panic!("Expected PageFetch, got {:?}", other),
        }
    }

    #[test]
    fn test_collection_from_pages() {
        let page = |n: u32, ids: &[i64]| -> ObjectPage {
            serde_json::from_value(serde_json::json!({
                "objectEntries": ids.iter().map(|id| serde_json::json!({"id": id})).collect::<Vec<_>>(),
                "objectTypeAttributes": [{"id": 70, "name": "Name"}],
                "totalFilterCount": 3,
                "pageNumber": n,
                "pageSize": 2
            }))
            .unwrap()
        };

        let collection = ObjectCollection::from_pages(vec![page(1, &[1, 2]), page(2, &[3])]);

        assert_eq!(collection.pages_fetched, 2);
        assert_eq!(collection.total_filter_count, 3);
        assert_eq!(collection.object_type_attributes.len(), 1);
        let ids: Vec<i64> = collection.objects.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_collection_from_no_pages() {
        let collection = ObjectCollection::from_pages(Vec::new());
        assert_eq!(collection.pages_fetched, 0);
        assert!(collection.objects.is_empty());
    }
}
