use roomchat_shared::wire::MessagePage;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::SyncResult;
use crate::store::{lock_store, MergeOutcome, Page, SharedStore};

/// Backward pagination over a conversation's history.
///
/// `cursor = None` is the newest page. A page whose `next_cursor` is `None`
/// is the oldest one.
pub trait MessageSource: Send + Sync {
    fn fetch_page(
        &self,
        conversation_id: &str,
        cursor: Option<&str>,
    ) -> impl Future<Output = SyncResult<MessagePage>> + Send;
}

impl<S: MessageSource> MessageSource for Arc<S> {
    fn fetch_page(
        &self,
        conversation_id: &str,
        cursor: Option<&str>,
    ) -> impl Future<Output = SyncResult<MessagePage>> + Send {
        (**self).fetch_page(conversation_id, cursor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied,
    /// Page was already merged.
    Unchanged,
    /// A later request for the same cursor owns the result, or the cursor is
    /// no longer the tail of the chain. Nothing was merged.
    Superseded,
    /// The oldest page is already cached.
    NoMoreHistory,
}

/// Fetches pages into one conversation's store.
///
/// Every request is tagged with a generation per cursor; a response is only
/// merged if no newer request for that cursor started in the meantime.
/// A failed request leaves the store untouched and may be retried with the
/// same cursor.
pub struct PageFetcher<S> {
    source: S,
    store: SharedStore,
    generations: Mutex<HashMap<Option<String>, u64>>,
}

impl<S: MessageSource> PageFetcher<S> {
    pub fn new(source: S, store: SharedStore) -> Self {
        Self {
            source,
            store,
            generations: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub async fn fetch_newest(&self) -> SyncResult<FetchOutcome> {
        self.fetch(None).await
    }

    /// Fetches the page after the current tail. Falls back to the newest page
    /// until a server page has been merged; live messages alone do not end
    /// the history.
    pub async fn fetch_next_older(&self) -> SyncResult<FetchOutcome> {
        let cursor = {
            let store = lock_store(&self.store);
            if !store.has_fetched() {
                None
            } else {
                match store.tail_cursor() {
                    Some(cursor) => Some(cursor.to_string()),
                    None => return Ok(FetchOutcome::NoMoreHistory),
                }
            }
        };
        self.fetch(cursor).await
    }

    async fn fetch(&self, cursor: Option<String>) -> SyncResult<FetchOutcome> {
        let generation = self.begin(&cursor);
        let conversation_id = lock_store(&self.store).conversation_id().to_string();

        let page = self
            .source
            .fetch_page(&conversation_id, cursor.as_deref())
            .await;
        let page = match page {
            Ok(page) => page,
            Err(e) => {
                tracing::debug!(
                    "Page fetch for {} (cursor {:?}) failed: {}",
                    conversation_id,
                    cursor,
                    e
                );
                return Err(e);
            }
        };

        if !self.is_current(&cursor, generation) {
            tracing::debug!(
                "Discarding superseded page for {} (cursor {:?})",
                conversation_id,
                cursor
            );
            return Ok(FetchOutcome::Superseded);
        }

        let page = match cursor {
            None => Page::newest(page),
            Some(cursor) => Page::older(cursor, page),
        };
        let outcome = lock_store(&self.store).prepend_older_page(page);
        Ok(match outcome {
            MergeOutcome::Applied => FetchOutcome::Applied,
            MergeOutcome::AlreadyMerged => FetchOutcome::Unchanged,
            MergeOutcome::Detached => {
                tracing::debug!("Discarding detached page for {}", conversation_id);
                FetchOutcome::Superseded
            }
        })
    }

    fn begin(&self, cursor: &Option<String>) -> u64 {
        let mut generations = self
            .generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let generation = generations.entry(cursor.clone()).or_insert(0);
        *generation += 1;
        *generation
    }

    fn is_current(&self, cursor: &Option<String>, generation: u64) -> bool {
        let generations = self
            .generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        generations.get(cursor) == Some(&generation)
    }
}
