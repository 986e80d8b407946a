use roomchat_shared::membership::{MemberState, MembershipEvent};
use roomchat_shared::moderation::TermList;
use roomchat_shared::permissions::{authorize, Action, Denial, ResourceState, Role};
use roomchat_shared::validation::validate_message_content;
use roomchat_shared::wire::Message;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{SyncError, SyncResult};
use crate::fetcher::{FetchOutcome, MessageSource, PageFetcher};
use crate::http::{RoomApi, RoomSnapshot};
use crate::merger::{LiveEventMerger, MergeEvent, Subscription};
use crate::store::{lock_store, MessageStore, Page, SharedStore};
use crate::transport::GatewayTransport;

/// One open conversation: its store, its fetcher and its live subscription.
///
/// Mutations are pre-checked locally (validation, moderation, the role table
/// and the last-admin rule) and rejected without a network call when they
/// would fail. The server checks again. A successful mutation does not touch
/// the store; the change arrives through the live event stream like
/// everyone else's.
pub struct ConversationView<A> {
    api: Arc<A>,
    room_id: String,
    conversation_id: String,
    store: SharedStore,
    fetcher: PageFetcher<Arc<A>>,
    terms: TermList,
    snapshot: Arc<Mutex<RoomSnapshot>>,
    removed: Arc<AtomicBool>,
    session_ended: Arc<AtomicBool>,
    transport: Option<GatewayTransport>,
    _messages: Subscription,
    _room: Subscription,
}

fn lock_snapshot(snapshot: &Mutex<RoomSnapshot>) -> MutexGuard<'_, RoomSnapshot> {
    snapshot.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<A> ConversationView<A>
where
    A: RoomApi + MessageSource + 'static,
{
    /// Creates the store and subscribes it. Pages stay empty until
    /// [`ConversationView::fetch_newest_page`] resolves.
    pub async fn open(
        api: Arc<A>,
        merger: &LiveEventMerger,
        transport: Option<GatewayTransport>,
        room_id: &str,
        conversation_id: &str,
        terms: TermList,
    ) -> SyncResult<Self> {
        let snapshot = api.room_snapshot(room_id).await?;
        let snapshot = Arc::new(Mutex::new(snapshot));
        let removed = Arc::new(AtomicBool::new(false));
        let session_ended = Arc::new(AtomicBool::new(merger.is_session_ended()));

        let store = MessageStore::shared(conversation_id);
        if merger.is_stale() {
            lock_store(&store).mark_stale();
        }
        let messages = merger.subscribe_store(conversation_id, store.clone());

        let room = {
            let snapshot = snapshot.clone();
            let removed = removed.clone();
            let session_ended = session_ended.clone();
            merger.subscribe_room(room_id, move |event| match event {
                MergeEvent::RoomChanged(event) => {
                    if !lock_snapshot(&snapshot).apply(event) {
                        removed.store(true, Ordering::SeqCst);
                    }
                }
                MergeEvent::SessionEnded(_) => session_ended.store(true, Ordering::SeqCst),
                _ => {}
            })
        };

        if let Some(transport) = &transport {
            transport.subscribe(conversation_id)?;
        }

        tracing::debug!("Opened conversation {} in room {}", conversation_id, room_id);
        Ok(Self {
            fetcher: PageFetcher::new(api.clone(), store.clone()),
            api,
            room_id: room_id.to_string(),
            conversation_id: conversation_id.to_string(),
            store,
            terms,
            snapshot,
            removed,
            session_ended,
            transport,
            _messages: messages,
            _room: room,
        })
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn get_pages(&self) -> Vec<Page> {
        lock_store(&self.store).pages().to_vec()
    }

    /// All cached messages, newest first.
    pub fn messages(&self) -> Vec<Message> {
        lock_store(&self.store).messages().cloned().collect()
    }

    pub fn role(&self) -> Role {
        lock_snapshot(&self.snapshot).role
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        lock_snapshot(&self.snapshot).clone()
    }

    /// False once the caller was removed from the room or the room is gone.
    pub fn is_member(&self) -> bool {
        !self.removed.load(Ordering::SeqCst)
    }

    pub fn is_stale(&self) -> bool {
        lock_store(&self.store).is_stale()
    }

    /// True once the gateway refused the session; live updates have stopped
    /// and the caller needs to sign in again.
    pub fn is_session_ended(&self) -> bool {
        self.session_ended.load(Ordering::SeqCst)
    }

    pub async fn fetch_newest_page(&self) -> SyncResult<FetchOutcome> {
        self.fetcher.fetch_newest().await
    }

    pub async fn fetch_next_older_page(&self) -> SyncResult<FetchOutcome> {
        self.fetcher.fetch_next_older().await
    }

    /// Refetches the newest page if live events may have been missed.
    pub async fn resync_if_stale(&self) -> SyncResult<Option<FetchOutcome>> {
        if !self.is_stale() {
            return Ok(None);
        }
        tracing::debug!("Resynchronizing {}", self.conversation_id);
        self.fetch_newest_page().await.map(Some)
    }

    /// Reloads the membership snapshot used for pre-checks.
    pub async fn refresh_room(&self) -> SyncResult<()> {
        let fresh = self.api.room_snapshot(&self.room_id).await?;
        *lock_snapshot(&self.snapshot) = fresh;
        self.removed.store(false, Ordering::SeqCst);
        Ok(())
    }

    pub async fn send_message(&self, content: &str, file_url: Option<&str>) -> SyncResult<Message> {
        let file_url = file_url.map(str::trim).filter(|u| !u.is_empty());
        let has_attachment = file_url.is_some();

        validate_message_content(content, has_attachment).map_err(SyncError::ValidationFailed)?;
        self.moderate(content, has_attachment)?;
        self.check(Action::SendMessage, ResourceState::member())?;

        self.api
            .send_message(&self.conversation_id, content, file_url)
            .await
    }

    pub async fn edit_message(&self, message_id: &str, content: &str) -> SyncResult<Message> {
        if let Some(resource) = self.message_resource(message_id) {
            self.check(Action::EditMessage, resource)?;
        }
        validate_message_content(content, false).map_err(SyncError::ValidationFailed)?;
        self.moderate(content, false)?;

        self.api
            .edit_message(&self.conversation_id, message_id, content)
            .await
    }

    pub async fn delete_message(&self, message_id: &str) -> SyncResult<Message> {
        if let Some(resource) = self.message_resource(message_id) {
            self.check(Action::DeleteMessage, resource)?;
        }
        self.api
            .delete_message(&self.conversation_id, message_id)
            .await
    }

    pub async fn change_role(&self, member_id: &str, role: Role) -> SyncResult<()> {
        self.check_member_action(Action::ChangeRole, MembershipEvent::ChangeRole(role), member_id)?;
        self.api.change_role(&self.room_id, member_id, role).await
    }

    pub async fn kick_member(&self, member_id: &str) -> SyncResult<()> {
        self.check_member_action(Action::KickMember, MembershipEvent::Kick, member_id)?;
        self.api.kick_member(&self.room_id, member_id).await
    }

    pub async fn rotate_invite_code(&self) -> SyncResult<String> {
        self.check(Action::RotateInviteCode, ResourceState::member())?;
        self.api.rotate_invite_code(&self.room_id).await
    }

    pub async fn leave_room(&self) -> SyncResult<()> {
        self.ensure_member()?;
        {
            let snapshot = lock_snapshot(&self.snapshot);
            let admins = snapshot.admin_count();
            let resource = ResourceState {
                targets_self: true,
                sole_admin: snapshot.role == Role::Admin && admins <= 1,
                ..ResourceState::member()
            };
            authorize(snapshot.role, Action::LeaveRoom, &resource).into_result()?;
            MemberState::Member(snapshot.role).apply(MembershipEvent::Leave, admins)?;
        }
        self.api.leave_room(&self.room_id).await
    }

    /// Unsubscribes and drops the store.
    pub fn close(self) {
        if let Some(transport) = &self.transport {
            if let Err(e) = transport.unsubscribe(&self.conversation_id) {
                tracing::debug!("Unsubscribe on close failed: {}", e);
            }
        }
        tracing::debug!("Closed conversation {}", self.conversation_id);
    }

    fn ensure_member(&self) -> SyncResult<()> {
        if self.is_member() {
            Ok(())
        } else {
            Err(Denial::NotMember.into())
        }
    }

    fn check(&self, action: Action, resource: ResourceState) -> SyncResult<()> {
        self.ensure_member()?;
        let role = self.role();
        authorize(role, action, &resource).into_result()?;
        Ok(())
    }

    fn moderate(&self, content: &str, has_attachment: bool) -> SyncResult<()> {
        self.terms.check(content, has_attachment).map_err(|msg| {
            tracing::debug!("Submission to {} blocked by moderation", self.conversation_id);
            SyncError::ValidationFailed(msg)
        })
    }

    /// `None` when the message is not cached; the server decides alone then.
    fn message_resource(&self, message_id: &str) -> Option<ResourceState> {
        let store = lock_store(&self.store);
        let message = store.find(message_id)?;
        let me = lock_snapshot(&self.snapshot).member_id.clone();
        Some(ResourceState {
            targets_self: message.member_id == me,
            message_deleted: message.deleted,
            has_attachment: message.file_url.is_some(),
            ..ResourceState::member()
        })
    }

    /// Same order as the server: role gate, last-admin rule, self check.
    fn check_member_action(
        &self,
        action: Action,
        event: MembershipEvent,
        member_id: &str,
    ) -> SyncResult<()> {
        self.check(action, ResourceState::member())?;

        let snapshot = lock_snapshot(&self.snapshot);
        let target = snapshot
            .role_of(member_id)
            .ok_or_else(|| SyncError::NotFound("Member not found".into()))?;
        MemberState::Member(target).apply(event, snapshot.admin_count())?;

        let resource = ResourceState {
            targets_self: member_id == snapshot.member_id,
            ..ResourceState::member()
        };
        authorize(snapshot.role, action, &resource).into_result()?;
        Ok(())
    }
}
