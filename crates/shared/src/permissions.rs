//! Role → action permission table.
//!
//! Every mutating path asks [`authorize`] with state freshly loaded from the
//! store. Pairs missing from [`RULES`] are denied.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Guest,
    Moderator,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Guest, Role::Moderator, Role::Admin];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Guest => "GUEST",
            Role::Moderator => "MODERATOR",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GUEST" => Ok(Role::Guest),
            "MODERATOR" => Ok(Role::Moderator),
            "ADMIN" => Ok(Role::Admin),
            other => Err(format!("Unknown role '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    SendMessage,
    EditMessage,
    DeleteMessage,
    CreateChat,
    EditChat,
    DeleteChat,
    ChangeRole,
    KickMember,
    RotateInviteCode,
    UpdateRoom,
    DeleteRoom,
    LeaveRoom,
}

impl Action {
    pub const ALL: [Action; 12] = [
        Action::SendMessage,
        Action::EditMessage,
        Action::DeleteMessage,
        Action::CreateChat,
        Action::EditChat,
        Action::DeleteChat,
        Action::ChangeRole,
        Action::KickMember,
        Action::RotateInviteCode,
        Action::UpdateRoom,
        Action::DeleteRoom,
        Action::LeaveRoom,
    ];
}

/// What the actor is touching, as currently persisted.
///
/// `targets_self` means "authored by the actor" for message actions and
/// "the target member is the actor" for member actions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceState {
    pub is_member: bool,
    pub targets_self: bool,
    pub message_deleted: bool,
    pub has_attachment: bool,
    pub general_chat: bool,
    pub sole_admin: bool,
}

impl ResourceState {
    /// A resource in a room the actor belongs to, with no other flags set.
    pub fn member() -> Self {
        Self {
            is_member: true,
            ..Self::default()
        }
    }

    pub fn own(mut self) -> Self {
        self.targets_self = true;
        self
    }

    pub fn deleted(mut self) -> Self {
        self.message_deleted = true;
        self
    }

    pub fn with_attachment(mut self) -> Self {
        self.has_attachment = true;
        self
    }

    pub fn general(mut self) -> Self {
        self.general_chat = true;
        self
    }

    pub fn sole_admin(mut self) -> Self {
        self.sole_admin = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    NotMember,
    /// The role does not grant the action on this resource.
    Forbidden,
    /// The role would be allowed, but a room invariant blocks it.
    Protected(&'static str),
}

impl Denial {
    pub fn message(self) -> &'static str {
        match self {
            Denial::NotMember => "Not a member of this room",
            Denial::Forbidden => "Insufficient permissions",
            Denial::Protected(reason) => reason,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(Denial),
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn into_result(self) -> Result<(), Denial> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(d) => Err(d),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    Always,
    /// Own, not deleted, no attachment.
    OwnEditable,
    /// Own and not deleted.
    OwnLive,
    /// Anyone's, not deleted.
    AnyLive,
    ExceptGeneral,
    NotSelf,
    NotSoleAdmin,
}

use Action::*;
use Role::*;

const RULES: &[(Action, Role, Rule)] = &[
    (SendMessage, Guest, Rule::Always),
    (SendMessage, Moderator, Rule::Always),
    (SendMessage, Admin, Rule::Always),
    (EditMessage, Guest, Rule::OwnEditable),
    (EditMessage, Moderator, Rule::OwnEditable),
    (EditMessage, Admin, Rule::OwnEditable),
    (DeleteMessage, Guest, Rule::OwnLive),
    (DeleteMessage, Moderator, Rule::AnyLive),
    (DeleteMessage, Admin, Rule::AnyLive),
    (CreateChat, Moderator, Rule::Always),
    (CreateChat, Admin, Rule::Always),
    (EditChat, Moderator, Rule::ExceptGeneral),
    (EditChat, Admin, Rule::ExceptGeneral),
    (DeleteChat, Moderator, Rule::ExceptGeneral),
    (DeleteChat, Admin, Rule::ExceptGeneral),
    (ChangeRole, Admin, Rule::NotSelf),
    (KickMember, Admin, Rule::NotSelf),
    (RotateInviteCode, Admin, Rule::Always),
    (UpdateRoom, Admin, Rule::Always),
    (DeleteRoom, Admin, Rule::Always),
    (LeaveRoom, Guest, Rule::Always),
    (LeaveRoom, Moderator, Rule::NotSoleAdmin),
    (LeaveRoom, Admin, Rule::NotSoleAdmin),
];

fn rule_for(action: Action, role: Role) -> Option<Rule> {
    RULES
        .iter()
        .find(|(a, r, _)| *a == action && *r == role)
        .map(|(_, _, rule)| *rule)
}

pub fn authorize(role: Role, action: Action, resource: &ResourceState) -> Decision {
    if !resource.is_member {
        return Decision::Deny(Denial::NotMember);
    }
    let Some(rule) = rule_for(action, role) else {
        return Decision::Deny(Denial::Forbidden);
    };
    match evaluate(rule, resource) {
        Ok(()) => Decision::Allow,
        Err(denial) => Decision::Deny(denial),
    }
}

fn evaluate(rule: Rule, r: &ResourceState) -> Result<(), Denial> {
    match rule {
        Rule::Always => Ok(()),
        Rule::OwnEditable => {
            if !r.targets_self || r.has_attachment {
                return Err(Denial::Forbidden);
            }
            if r.message_deleted {
                return Err(Denial::Protected("Deleted messages cannot be edited"));
            }
            Ok(())
        }
        Rule::OwnLive => {
            if !r.targets_self {
                return Err(Denial::Forbidden);
            }
            live(r)
        }
        Rule::AnyLive => live(r),
        Rule::ExceptGeneral => {
            if r.general_chat {
                return Err(Denial::Protected("The general chat cannot be renamed or deleted"));
            }
            Ok(())
        }
        Rule::NotSelf => {
            if r.targets_self {
                return Err(Denial::Forbidden);
            }
            Ok(())
        }
        Rule::NotSoleAdmin => {
            if r.sole_admin {
                return Err(Denial::Protected("A room must keep at least one admin"));
            }
            Ok(())
        }
    }
}

fn live(r: &ResourceState) -> Result<(), Denial> {
    if r.message_deleted {
        return Err(Denial::Protected("Message has already been deleted"));
    }
    Ok(())
}
