use roomchat_shared::wire::{Message, MessagePage};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One fetched slice of history, newest message first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Cursor the page was requested with; `None` for the newest page.
    pub cursor: Option<String>,
    pub items: Vec<Message>,
    pub next_cursor: Option<String>,
}

impl Page {
    pub fn newest(page: MessagePage) -> Self {
        Self {
            cursor: None,
            items: page.items,
            next_cursor: page.next_cursor,
        }
    }

    pub fn older(cursor: impl Into<String>, page: MessagePage) -> Self {
        Self {
            cursor: Some(cursor.into()),
            items: page.items,
            next_cursor: page.next_cursor,
        }
    }

    pub fn has_more(&self) -> bool {
        self.next_cursor.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Applied,
    /// The cursor was merged before; nothing changed.
    AlreadyMerged,
    /// The page does not continue the current chain.
    Detached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Replaced,
    Inserted,
    /// Addressed to another conversation.
    Ignored,
}

/// Paginated cache for one open conversation.
///
/// Mutated only through [`MessageStore::prepend_older_page`] and
/// [`MessageStore::upsert_message`]. Across all pages ids are unique and
/// messages are ordered by `(created_at desc, id desc)`.
#[derive(Debug)]
pub struct MessageStore {
    conversation_id: String,
    pages: Vec<Page>,
    merged_cursors: HashSet<String>,
    /// Set once a server page has been merged. Before that the chain holds
    /// only live messages and its tail says nothing about older history.
    fetched: bool,
    stale: bool,
}

pub type SharedStore = Arc<Mutex<MessageStore>>;

/// Locks a shared store. A panic in another holder does not leave the page
/// chain half-written, so a poisoned lock is still usable.
pub fn lock_store(store: &SharedStore) -> MutexGuard<'_, MessageStore> {
    store.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MessageStore {
    pub fn new(conversation_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            pages: Vec::new(),
            merged_cursors: HashSet::new(),
            fetched: false,
            stale: false,
        }
    }

    pub fn shared(conversation_id: impl Into<String>) -> SharedStore {
        Arc::new(Mutex::new(Self::new(conversation_id)))
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Empty until the first fetch resolves.
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.pages.iter().flat_map(|p| p.items.iter())
    }

    pub fn len(&self) -> usize {
        self.pages.iter().map(|p| p.items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn find(&self, message_id: &str) -> Option<&Message> {
        self.messages().find(|m| m.id == message_id)
    }

    /// Whether a server page has been merged yet.
    pub fn has_fetched(&self) -> bool {
        self.fetched
    }

    /// Cursor for the next older page, if history remains.
    pub fn tail_cursor(&self) -> Option<&str> {
        self.pages.last()?.next_cursor.as_deref()
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn mark_stale(&mut self) {
        if !self.stale {
            tracing::debug!("Store for {} marked stale", self.conversation_id);
        }
        self.stale = true;
    }

    /// Merges a fetched page.
    ///
    /// An older page is appended at the tail, once per cursor, and only if
    /// its cursor is the current tail cursor. The newest page (no cursor)
    /// resynchronizes the head and clears the stale flag: its messages are
    /// upserted, and when it shares nothing with the cache while older
    /// history exists the chain restarts from it.
    pub fn prepend_older_page(&mut self, page: Page) -> MergeOutcome {
        match page.cursor.clone() {
            None => self.merge_newest(page),
            Some(cursor) => self.merge_older(cursor, page),
        }
    }

    fn merge_newest(&mut self, mut page: Page) -> MergeOutcome {
        self.stale = false;

        if !self.fetched {
            let live: Vec<Message> = self.pages.drain(..).flat_map(|p| p.items).collect();
            page.items.sort_by(Message::newest_first);
            self.pages.push(page);
            self.fetched = true;
            for message in live {
                self.upsert_message(message);
            }
            return MergeOutcome::Applied;
        }

        let overlaps = page.items.iter().any(|m| self.find(&m.id).is_some());
        if !overlaps && page.has_more() {
            tracing::debug!(
                "Newest page for {} does not overlap the cache; restarting chain",
                self.conversation_id
            );
            page.items.sort_by(Message::newest_first);
            self.pages = vec![page];
            self.merged_cursors.clear();
            return MergeOutcome::Applied;
        }

        for message in page.items {
            self.upsert_message(message);
        }
        MergeOutcome::Applied
    }

    fn merge_older(&mut self, cursor: String, page: Page) -> MergeOutcome {
        if self.merged_cursors.contains(&cursor) {
            return MergeOutcome::AlreadyMerged;
        }
        if self.tail_cursor() != Some(cursor.as_str()) {
            return MergeOutcome::Detached;
        }
        self.merged_cursors.insert(cursor.clone());

        let mut older = Vec::with_capacity(page.items.len());
        let mut misplaced = Vec::new();
        for message in page.items {
            if self.replace(&message) {
                continue;
            }
            let fits_tail = self
                .oldest()
                .map_or(true, |oldest| Message::newest_first(oldest, &message) == Ordering::Less);
            if fits_tail {
                older.push(message);
            } else {
                misplaced.push(message);
            }
        }
        older.sort_by(Message::newest_first);

        self.pages.push(Page {
            cursor: Some(cursor),
            items: older,
            next_cursor: page.next_cursor,
        });
        for message in misplaced {
            self.insert(message);
        }
        MergeOutcome::Applied
    }

    /// Replaces a cached message in place, or inserts it at its ordered
    /// position (the head of the first page for anything new).
    pub fn upsert_message(&mut self, message: Message) -> UpsertOutcome {
        if message.conversation_id != self.conversation_id {
            return UpsertOutcome::Ignored;
        }
        if self.replace(&message) {
            return UpsertOutcome::Replaced;
        }
        self.insert(message);
        UpsertOutcome::Inserted
    }

    fn replace(&mut self, message: &Message) -> bool {
        for page in &mut self.pages {
            if let Some(slot) = page.items.iter_mut().find(|m| m.id == message.id) {
                *slot = message.clone();
                return true;
            }
        }
        false
    }

    fn oldest(&self) -> Option<&Message> {
        self.pages.iter().rev().find_map(|p| p.items.last())
    }

    fn insert(&mut self, message: Message) {
        if self.pages.is_empty() {
            self.pages.push(Page {
                cursor: None,
                items: vec![message],
                next_cursor: None,
            });
            return;
        }

        // First page whose oldest item is older than the message.
        let target = self
            .pages
            .iter()
            .position(|p| {
                p.items
                    .last()
                    .is_some_and(|last| Message::newest_first(&message, last) == Ordering::Less)
            })
            .unwrap_or(self.pages.len() - 1);

        let items = &mut self.pages[target].items;
        let pos = items.partition_point(|m| Message::newest_first(m, &message) == Ordering::Less);
        items.insert(pos, message);
    }
}
