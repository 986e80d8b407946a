use roomchat_shared::permissions::{authorize, Action, Decision, Denial, ResourceState, Role};

fn every_resource_state() -> Vec<ResourceState> {
    let mut states = Vec::new();
    for bits in 0u8..64 {
        states.push(ResourceState {
            is_member: bits & 1 != 0,
            targets_self: bits & 2 != 0,
            message_deleted: bits & 4 != 0,
            has_attachment: bits & 8 != 0,
            general_chat: bits & 16 != 0,
            sole_admin: bits & 32 != 0,
        });
    }
    states
}

#[test]
fn guest_can_never_change_roles() {
    for state in every_resource_state() {
        assert!(!authorize(Role::Guest, Action::ChangeRole, &state).is_allowed());
    }
}

#[test]
fn moderator_can_never_administer_members() {
    for state in every_resource_state() {
        for action in [Action::ChangeRole, Action::KickMember, Action::RotateInviteCode, Action::DeleteRoom] {
            assert!(!authorize(Role::Moderator, action, &state).is_allowed());
        }
    }
}

#[test]
fn admin_cannot_kick_or_demote_self() {
    let own = ResourceState::member().own();
    assert_eq!(
        authorize(Role::Admin, Action::KickMember, &own),
        Decision::Deny(Denial::Forbidden)
    );
    assert_eq!(
        authorize(Role::Admin, Action::ChangeRole, &own),
        Decision::Deny(Denial::Forbidden)
    );
    assert!(authorize(Role::Admin, Action::KickMember, &ResourceState::member()).is_allowed());
}

#[test]
fn non_members_are_denied_everything() {
    let outsider = ResourceState::default();
    for role in Role::ALL {
        for action in Action::ALL {
            assert_eq!(
                authorize(role, action, &outsider),
                Decision::Deny(Denial::NotMember)
            );
        }
    }
}

#[test]
fn nobody_edits_someone_elses_message() {
    for role in Role::ALL {
        assert!(!authorize(role, Action::EditMessage, &ResourceState::member()).is_allowed());
        assert!(authorize(role, Action::EditMessage, &ResourceState::member().own()).is_allowed());
    }
}

#[test]
fn edits_blocked_for_deleted_or_attachment_messages() {
    let deleted = ResourceState::member().own().deleted();
    assert!(matches!(
        authorize(Role::Guest, Action::EditMessage, &deleted),
        Decision::Deny(Denial::Protected(_))
    ));
    let attached = ResourceState::member().own().with_attachment();
    assert_eq!(
        authorize(Role::Admin, Action::EditMessage, &attached),
        Decision::Deny(Denial::Forbidden)
    );
}

#[test]
fn delete_rules_follow_role() {
    let others = ResourceState::member();
    assert!(!authorize(Role::Guest, Action::DeleteMessage, &others).is_allowed());
    assert!(authorize(Role::Guest, Action::DeleteMessage, &others.own()).is_allowed());
    assert!(authorize(Role::Moderator, Action::DeleteMessage, &others).is_allowed());
    assert!(authorize(Role::Admin, Action::DeleteMessage, &others).is_allowed());
    assert!(!authorize(Role::Admin, Action::DeleteMessage, &others.deleted()).is_allowed());
}

#[test]
fn general_chat_is_protected_for_every_role() {
    let general = ResourceState::member().general();
    for role in [Role::Moderator, Role::Admin] {
        for action in [Action::EditChat, Action::DeleteChat] {
            assert!(matches!(
                authorize(role, action, &general),
                Decision::Deny(Denial::Protected(_))
            ));
            assert!(authorize(role, action, &ResourceState::member()).is_allowed());
        }
    }
    assert!(!authorize(Role::Guest, Action::CreateChat, &ResourceState::member()).is_allowed());
}

#[test]
fn sole_admin_cannot_leave() {
    let state = ResourceState::member().sole_admin();
    assert!(matches!(
        authorize(Role::Admin, Action::LeaveRoom, &state),
        Decision::Deny(Denial::Protected(_))
    ));
    assert!(authorize(Role::Admin, Action::LeaveRoom, &ResourceState::member()).is_allowed());
    assert!(authorize(Role::Guest, Action::LeaveRoom, &ResourceState::member()).is_allowed());
}

#[test]
fn role_round_trips_through_its_wire_name() {
    for role in Role::ALL {
        assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        assert_eq!(
            serde_json::to_string(&role).unwrap(),
            format!("\"{}\"", role.as_str())
        );
    }
    assert!("OWNER".parse::<Role>().is_err());
}
