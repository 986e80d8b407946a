use crate::permissions::Role;

/// Lifecycle of one profile's membership in one room.
///
/// `None -> Guest` on join, `None -> Admin` when creating the room,
/// `Guest <-> Moderator <-> Admin` on role change, `* -> None` on kick/leave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberState {
    None,
    Member(Role),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipEvent {
    CreateRoom,
    Join,
    ChangeRole(Role),
    Kick,
    Leave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionError {
    NotAMember,
    AlreadyMember,
    /// Kick or leave would leave the room without an admin.
    LastAdmin,
}

impl TransitionError {
    pub fn message(self) -> &'static str {
        match self {
            TransitionError::NotAMember => "Not a member of this room",
            TransitionError::AlreadyMember => "Already a member of this room",
            TransitionError::LastAdmin => "A room must keep at least one admin",
        }
    }
}

impl MemberState {
    pub fn from_role(role: Option<Role>) -> Self {
        match role {
            Some(r) => MemberState::Member(r),
            None => MemberState::None,
        }
    }

    pub fn role(self) -> Option<Role> {
        match self {
            MemberState::None => None,
            MemberState::Member(r) => Some(r),
        }
    }

    /// `admin_count` is the number of admins currently in the room,
    /// including this member if it is one.
    pub fn apply(
        self,
        event: MembershipEvent,
        admin_count: usize,
    ) -> Result<MemberState, TransitionError> {
        match (self, event) {
            (MemberState::None, MembershipEvent::CreateRoom) => Ok(MemberState::Member(Role::Admin)),
            (MemberState::None, MembershipEvent::Join) => Ok(MemberState::Member(Role::Guest)),
            (MemberState::None, _) => Err(TransitionError::NotAMember),
            (MemberState::Member(_), MembershipEvent::CreateRoom | MembershipEvent::Join) => {
                Err(TransitionError::AlreadyMember)
            }
            (MemberState::Member(current), MembershipEvent::ChangeRole(next)) => {
                if current == Role::Admin && next != Role::Admin && admin_count <= 1 {
                    return Err(TransitionError::LastAdmin);
                }
                Ok(MemberState::Member(next))
            }
            (MemberState::Member(current), MembershipEvent::Kick | MembershipEvent::Leave) => {
                if current == Role::Admin && admin_count <= 1 {
                    return Err(TransitionError::LastAdmin);
                }
                Ok(MemberState::None)
            }
        }
    }
}
