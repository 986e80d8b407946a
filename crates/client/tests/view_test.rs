mod common;

use common::{authored, expected, ids, message, snapshot, FakeApi, CONVERSATION, ME, ROOM};
use roomchat_client::{ConversationView, FetchOutcome, LiveEventMerger, SyncError};
use roomchat_shared::moderation::TermList;
use roomchat_shared::permissions::Role;
use roomchat_shared::wire::{Message, ServerEvent};
use std::sync::Arc;

async fn open_view(api: &Arc<FakeApi>, merger: &LiveEventMerger) -> ConversationView<FakeApi> {
    ConversationView::open(
        api.clone(),
        merger,
        None,
        ROOM,
        CONVERSATION,
        TermList::new(["badword"]),
    )
    .await
    .unwrap()
}

fn api_as(role: Role, others: &[(&str, Role)], messages: Vec<Message>) -> Arc<FakeApi> {
    Arc::new(FakeApi::new(messages, snapshot(role, others)))
}

#[tokio::test]
async fn pages_empty_until_first_fetch() {
    let api = Arc::new(FakeApi::with_history(25));
    let merger = LiveEventMerger::new();
    let view = open_view(&api, &merger).await;

    assert!(view.get_pages().is_empty());
    assert_eq!(view.fetch_newest_page().await.unwrap(), FetchOutcome::Applied);
    assert_eq!(view.fetch_next_older_page().await.unwrap(), FetchOutcome::Applied);
    assert_eq!(view.get_pages().len(), 2);
    assert_eq!(ids(&view.messages()), expected(6..=25));
}

#[tokio::test]
async fn blank_message_blocked_without_request() {
    let api = api_as(Role::Guest, &[], vec![]);
    let merger = LiveEventMerger::new();
    let view = open_view(&api, &merger).await;

    let err = view.send_message("   ", None).await.unwrap_err();
    assert!(matches!(err, SyncError::ValidationFailed(_)));
    assert_eq!(api.mutation_count(), 0);
}

#[tokio::test]
async fn disallowed_term_blocked_without_request() {
    let api = api_as(Role::Guest, &[], vec![]);
    let merger = LiveEventMerger::new();
    let view = open_view(&api, &merger).await;

    let err = view
        .send_message("this is BADWORD here", None)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::ValidationFailed(_)));
    assert_eq!(api.mutation_count(), 0);

    view.send_message("this is fine", None).await.unwrap();
    assert_eq!(api.mutation_count(), 1);
}

#[tokio::test]
async fn attachment_bypasses_moderation() {
    let api = api_as(Role::Guest, &[], vec![]);
    let merger = LiveEventMerger::new();
    let view = open_view(&api, &merger).await;

    view.send_message("badword caption", Some("https://files.example/a.png"))
        .await
        .unwrap();
    assert_eq!(api.mutation_count(), 1);
}

#[tokio::test]
async fn sent_message_arrives_through_live_stream() {
    let api = api_as(Role::Guest, &[], vec![]);
    let merger = LiveEventMerger::new();
    let view = open_view(&api, &merger).await;
    view.fetch_newest_page().await.unwrap();

    let sent = view.send_message("hello", None).await.unwrap();
    assert!(view.messages().is_empty());

    merger.dispatch(&ServerEvent::MessageCreated {
        conversation_id: CONVERSATION.into(),
        message: sent.clone(),
    });
    assert_eq!(view.messages(), vec![sent]);
}

#[tokio::test]
async fn guest_cannot_edit_or_delete_others_message() {
    let theirs = authored("t1", 1, "member-2");
    let api = api_as(Role::Guest, &[("member-2", Role::Guest)], vec![theirs]);
    let merger = LiveEventMerger::new();
    let view = open_view(&api, &merger).await;
    view.fetch_newest_page().await.unwrap();

    let err = view.edit_message("t1", "rewrite").await.unwrap_err();
    assert!(matches!(err, SyncError::Unauthorized(_)));
    let err = view.delete_message("t1").await.unwrap_err();
    assert!(matches!(err, SyncError::Unauthorized(_)));
    assert_eq!(api.mutation_count(), 0);
}

#[tokio::test]
async fn moderator_deletes_others_but_cannot_edit_them() {
    let theirs = authored("t1", 1, "member-2");
    let api = api_as(Role::Moderator, &[("member-2", Role::Guest)], vec![theirs]);
    let merger = LiveEventMerger::new();
    let view = open_view(&api, &merger).await;
    view.fetch_newest_page().await.unwrap();

    assert!(view.edit_message("t1", "rewrite").await.is_err());
    view.delete_message("t1").await.unwrap();
    assert_eq!(api.mutation_count(), 1);
}

#[tokio::test]
async fn deleted_or_attached_message_cannot_be_edited() {
    let deleted = Message {
        deleted: true,
        ..message("d1", 1, "This message has been deleted.")
    };
    let attached = Message {
        file_url: Some("https://files.example/a.png".into()),
        ..message("a1", 2, "")
    };
    let api = api_as(Role::Admin, &[], vec![deleted, attached]);
    let merger = LiveEventMerger::new();
    let view = open_view(&api, &merger).await;
    view.fetch_newest_page().await.unwrap();

    let err = view.edit_message("d1", "back").await.unwrap_err();
    assert!(matches!(err, SyncError::Conflict(_)));
    let err = view.edit_message("a1", "caption").await.unwrap_err();
    assert!(matches!(err, SyncError::Unauthorized(_)));
    assert_eq!(api.mutation_count(), 0);
}

#[tokio::test]
async fn uncached_message_goes_to_server() {
    let api = api_as(Role::Guest, &[], vec![message("m1", 1, "hi")]);
    let merger = LiveEventMerger::new();
    let view = open_view(&api, &merger).await;

    view.edit_message("m1", "edited").await.unwrap();
    assert_eq!(api.mutation_count(), 1);
}

#[tokio::test]
async fn guest_cannot_change_roles() {
    let api = api_as(Role::Guest, &[("member-2", Role::Guest)], vec![]);
    let merger = LiveEventMerger::new();
    let view = open_view(&api, &merger).await;

    for role in Role::ALL {
        let err = view.change_role("member-2", role).await.unwrap_err();
        assert!(matches!(err, SyncError::Unauthorized(_)));
    }
    assert!(view.kick_member("member-2").await.is_err());
    assert!(view.rotate_invite_code().await.is_err());
    assert_eq!(api.mutation_count(), 0);
}

#[tokio::test]
async fn sole_admin_cannot_leave_or_be_kicked() {
    let api = api_as(Role::Admin, &[("member-2", Role::Guest)], vec![]);
    let merger = LiveEventMerger::new();
    let view = open_view(&api, &merger).await;

    let err = view.kick_member(ME).await.unwrap_err();
    assert!(matches!(err, SyncError::Conflict(_)));
    let err = view.leave_room().await.unwrap_err();
    assert!(matches!(err, SyncError::Conflict(_)));
    let err = view.change_role(ME, Role::Guest).await.unwrap_err();
    assert!(matches!(err, SyncError::Conflict(_)));
    assert_eq!(api.mutation_count(), 0);
}

#[tokio::test]
async fn admin_never_targets_self() {
    let api = api_as(Role::Admin, &[("member-2", Role::Admin)], vec![]);
    let merger = LiveEventMerger::new();
    let view = open_view(&api, &merger).await;

    let err = view.kick_member(ME).await.unwrap_err();
    assert!(matches!(err, SyncError::Unauthorized(_)));
    // With a second admin present, leaving is fine.
    view.leave_room().await.unwrap();
    assert_eq!(api.mutation_count(), 1);
}

#[tokio::test]
async fn admin_actions_reach_server() {
    let api = api_as(Role::Admin, &[("member-2", Role::Guest)], vec![]);
    let merger = LiveEventMerger::new();
    let view = open_view(&api, &merger).await;

    view.change_role("member-2", Role::Moderator).await.unwrap();
    view.kick_member("member-2").await.unwrap();
    assert_eq!(view.rotate_invite_code().await.unwrap(), "fresh-code");
    assert_eq!(
        *api.mutations.lock().unwrap(),
        vec!["role member-2 MODERATOR", "kick member-2", "rotate"]
    );
}

#[tokio::test]
async fn unknown_member_is_not_found() {
    let api = api_as(Role::Admin, &[], vec![]);
    let merger = LiveEventMerger::new();
    let view = open_view(&api, &merger).await;

    let err = view.kick_member("ghost").await.unwrap_err();
    assert!(matches!(err, SyncError::NotFound(_)));
}

#[tokio::test]
async fn server_rejection_surfaces() {
    let api = api_as(Role::Admin, &[("member-2", Role::Guest)], vec![]);
    let merger = LiveEventMerger::new();
    let view = open_view(&api, &merger).await;

    api.fail_next(SyncError::Conflict("A room must keep at least one admin".into()));
    let err = view.kick_member("member-2").await.unwrap_err();
    assert!(matches!(err, SyncError::Conflict(_)));
}

#[tokio::test]
async fn room_events_update_role() {
    let api = api_as(Role::Guest, &[("member-2", Role::Admin)], vec![]);
    let merger = LiveEventMerger::new();
    let view = open_view(&api, &merger).await;

    merger.dispatch(&ServerEvent::MemberRoleUpdated {
        room_id: ROOM.into(),
        member_id: ME.into(),
        role: Role::Moderator,
    });
    assert_eq!(view.role(), Role::Moderator);
    assert_eq!(view.snapshot().role_of(ME), Some(Role::Moderator));

    merger.dispatch(&ServerEvent::MemberRemoved {
        room_id: ROOM.into(),
        member_id: ME.into(),
    });
    assert!(!view.is_member());
    let err = view.send_message("hello", None).await.unwrap_err();
    assert!(matches!(err, SyncError::Unauthorized(_)));
    assert_eq!(api.mutation_count(), 0);
}

#[tokio::test]
async fn stale_view_resyncs_newest_page() {
    let api = Arc::new(FakeApi::with_history(5));
    let merger = LiveEventMerger::new();
    let view = open_view(&api, &merger).await;
    view.fetch_newest_page().await.unwrap();
    assert_eq!(view.resync_if_stale().await.unwrap(), None);

    merger.connection_lost();
    assert!(view.is_stale());
    // Missed while disconnected.
    api.messages.lock().unwrap().push(message("m06", 6, "missed"));
    merger.reconnected();

    assert_eq!(
        view.resync_if_stale().await.unwrap(),
        Some(FetchOutcome::Applied)
    );
    assert!(!view.is_stale());
    assert_eq!(ids(&view.messages()), expected(1..=6));
}

#[tokio::test]
async fn close_releases_subscriptions() {
    let api = Arc::new(FakeApi::with_history(1));
    let merger = LiveEventMerger::new();
    let view = open_view(&api, &merger).await;
    assert_eq!(merger.subscriber_count(), 2);

    view.close();
    assert_eq!(merger.subscriber_count(), 0);
}

#[tokio::test]
async fn views_do_not_share_stores() {
    let api = Arc::new(FakeApi::with_history(3));
    let merger = LiveEventMerger::new();
    let first = open_view(&api, &merger).await;
    let other = ConversationView::open(
        api.clone(),
        &merger,
        None,
        ROOM,
        "conv-2",
        TermList::default(),
    )
    .await
    .unwrap();

    merger.dispatch(&ServerEvent::MessageCreated {
        conversation_id: CONVERSATION.into(),
        message: message("m9", 9, "only here"),
    });
    assert_eq!(ids(&first.messages()), vec!["m9"]);
    assert!(other.messages().is_empty());
}

#[tokio::test]
async fn rejected_session_surfaces_on_view() {
    let api = Arc::new(FakeApi::with_history(3));
    let merger = LiveEventMerger::new();
    let view = open_view(&api, &merger).await;
    assert!(!view.is_session_ended());

    merger.session_ended("Gateway rejected the session token");
    assert!(view.is_session_ended());
    assert!(view.is_stale());

    // Views opened afterwards start out ended.
    let later = open_view(&api, &merger).await;
    assert!(later.is_session_ended());
}
