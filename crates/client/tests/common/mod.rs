#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use roomchat_client::{MessageSource, RoomApi, RoomSnapshot, SyncError, SyncResult};
use roomchat_shared::permissions::Role;
use roomchat_shared::wire::{Message, MessagePage};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub const CONVERSATION: &str = "conv-1";
pub const ROOM: &str = "room-1";
pub const ME: &str = "member-me";

pub fn at_minute(minute: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap() + Duration::minutes(minute)
}

pub fn message(id: &str, minute: i64, content: &str) -> Message {
    Message {
        id: id.to_string(),
        conversation_id: CONVERSATION.to_string(),
        member_id: ME.to_string(),
        content: content.to_string(),
        file_url: None,
        deleted: false,
        created_at: at_minute(minute),
        updated_at: at_minute(minute),
    }
}

pub fn authored(id: &str, minute: i64, member_id: &str) -> Message {
    Message {
        member_id: member_id.to_string(),
        ..message(id, minute, "hello")
    }
}

/// `m01`..`mNN`, one minute apart, oldest first.
pub fn history(count: i64) -> Vec<Message> {
    (1..=count)
        .map(|i| message(&format!("m{:02}", i), i, &format!("message {}", i)))
        .collect()
}

pub fn ids<'a>(messages: impl IntoIterator<Item = &'a Message>) -> Vec<String> {
    messages.into_iter().map(|m| m.id.clone()).collect()
}

/// Newest-first ids for the inclusive range.
pub fn expected(range: std::ops::RangeInclusive<i64>) -> Vec<String> {
    range.rev().map(|i| format!("m{:02}", i)).collect()
}

pub fn is_sorted_unique(messages: &[Message]) -> bool {
    let mut seen = std::collections::HashSet::new();
    messages.iter().all(|m| seen.insert(m.id.clone()))
        && messages
            .windows(2)
            .all(|w| Message::newest_first(&w[0], &w[1]) == std::cmp::Ordering::Less)
}

pub fn snapshot(role: Role, others: &[(&str, Role)]) -> RoomSnapshot {
    let mut members: HashMap<String, Role> = others
        .iter()
        .map(|(id, role)| (id.to_string(), *role))
        .collect();
    members.insert(ME.to_string(), role);
    RoomSnapshot {
        room_id: ROOM.to_string(),
        member_id: ME.to_string(),
        role,
        members,
    }
}

/// In-memory server: pages over `messages` and records every mutation.
pub struct FakeApi {
    pub messages: Mutex<Vec<Message>>,
    pub page_size: usize,
    pub snapshot: Mutex<RoomSnapshot>,
    pub failures: Mutex<VecDeque<SyncError>>,
    /// Per-call latency for fetches, in order; missing entries mean none.
    pub delays_ms: Mutex<VecDeque<u64>>,
    pub fetches: AtomicUsize,
    pub mutations: Mutex<Vec<String>>,
}

impl FakeApi {
    pub fn new(messages: Vec<Message>, snapshot: RoomSnapshot) -> Self {
        Self {
            messages: Mutex::new(messages),
            page_size: 10,
            snapshot: Mutex::new(snapshot),
            failures: Mutex::new(VecDeque::new()),
            delays_ms: Mutex::new(VecDeque::new()),
            fetches: AtomicUsize::new(0),
            mutations: Mutex::new(Vec::new()),
        }
    }

    pub fn with_history(count: i64) -> Self {
        Self::new(history(count), snapshot(Role::Admin, &[]))
    }

    pub fn fail_next(&self, err: SyncError) {
        self.failures.lock().unwrap().push_back(err);
    }

    pub fn delay_next(&self, ms: u64) {
        self.delays_ms.lock().unwrap().push_back(ms);
    }

    pub fn mutation_count(&self) -> usize {
        self.mutations.lock().unwrap().len()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn record(&self, call: String) -> SyncResult<()> {
        self.mutations.lock().unwrap().push(call);
        match self.failures.lock().unwrap().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn page(&self, cursor: Option<&str>) -> SyncResult<MessagePage> {
        let mut all = self.messages.lock().unwrap().clone();
        all.sort_by(Message::newest_first);

        let start = match cursor {
            Some(cursor) => {
                all.iter()
                    .position(|m| m.id == cursor)
                    .ok_or_else(|| SyncError::NotFound("Cursor not found".into()))?
                    + 1
            }
            None => 0,
        };
        let rest = &all[start.min(all.len())..];
        let items: Vec<Message> = rest.iter().take(self.page_size).cloned().collect();
        let next_cursor = if rest.len() > self.page_size {
            items.last().map(|m| m.id.clone())
        } else {
            None
        };
        Ok(MessagePage { items, next_cursor })
    }
}

impl MessageSource for FakeApi {
    async fn fetch_page(
        &self,
        _conversation_id: &str,
        cursor: Option<&str>,
    ) -> SyncResult<MessagePage> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let delay = self.delays_ms.lock().unwrap().pop_front();
        // Snapshot the answer before sleeping, like a response in flight.
        let failure = self.failures.lock().unwrap().pop_front();
        let page = self.page(cursor);
        if let Some(ms) = delay {
            tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
        }
        match failure {
            Some(err) => Err(err),
            None => page,
        }
    }
}

impl RoomApi for FakeApi {
    async fn send_message(
        &self,
        conversation_id: &str,
        content: &str,
        file_url: Option<&str>,
    ) -> SyncResult<Message> {
        self.record(format!("send {}", content))?;
        let count = self.messages.lock().unwrap().len() as i64;
        let sent = Message {
            conversation_id: conversation_id.to_string(),
            file_url: file_url.map(str::to_string),
            ..message(&format!("sent-{}", count), 1000 + count, content)
        };
        self.messages.lock().unwrap().push(sent.clone());
        Ok(sent)
    }

    async fn edit_message(
        &self,
        _conversation_id: &str,
        message_id: &str,
        content: &str,
    ) -> SyncResult<Message> {
        self.record(format!("edit {}", message_id))?;
        let mut messages = self.messages.lock().unwrap();
        let target = messages
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or_else(|| SyncError::NotFound("Message not found".into()))?;
        target.content = content.to_string();
        Ok(target.clone())
    }

    async fn delete_message(&self, _conversation_id: &str, message_id: &str) -> SyncResult<Message> {
        self.record(format!("delete {}", message_id))?;
        let mut messages = self.messages.lock().unwrap();
        let target = messages
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or_else(|| SyncError::NotFound("Message not found".into()))?;
        target.deleted = true;
        target.content = "This message has been deleted.".into();
        Ok(target.clone())
    }

    async fn change_role(&self, _room_id: &str, member_id: &str, role: Role) -> SyncResult<()> {
        self.record(format!("role {} {}", member_id, role))
    }

    async fn kick_member(&self, _room_id: &str, member_id: &str) -> SyncResult<()> {
        self.record(format!("kick {}", member_id))
    }

    async fn rotate_invite_code(&self, _room_id: &str) -> SyncResult<String> {
        self.record("rotate".into())?;
        Ok("fresh-code".into())
    }

    async fn leave_room(&self, _room_id: &str) -> SyncResult<()> {
        self.record("leave".into())
    }

    async fn room_snapshot(&self, _room_id: &str) -> SyncResult<RoomSnapshot> {
        Ok(self.snapshot.lock().unwrap().clone())
    }
}
