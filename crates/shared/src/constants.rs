pub const APP_NAME: &str = "Roomchat";

// Limits
pub const MAX_MESSAGE_LENGTH: usize = 4000;
pub const MAX_ROOM_NAME_LENGTH: usize = 100;
pub const MAX_CHAT_NAME_LENGTH: usize = 100;

/// Every room owns exactly one chat with this name; it can't be renamed or deleted.
pub const GENERAL_CHAT_NAME: &str = "general";

/// Content a soft-deleted message is left with.
pub const DELETED_MESSAGE_TOMBSTONE: &str = "This message has been deleted.";

pub const MESSAGE_PAGE_SIZE: i64 = 10;
pub const MAX_MESSAGE_PAGE_SIZE: i64 = 100;

// WebSocket
pub const WS_HEARTBEAT_INTERVAL_MS: u64 = 30_000;
pub const WS_RECONNECT_BASE_DELAY_MS: u64 = 1_000;
pub const WS_RECONNECT_MAX_DELAY_MS: u64 = 30_000;
