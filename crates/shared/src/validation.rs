use crate::constants::*;

pub fn validate_room_name(name: &str) -> Result<(), String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Room name is required".into());
    }
    if trimmed.chars().count() > MAX_ROOM_NAME_LENGTH {
        return Err(format!(
            "Room name must be at most {} characters",
            MAX_ROOM_NAME_LENGTH
        ));
    }
    Ok(())
}

pub fn validate_chat_name(name: &str) -> Result<(), String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Chat name is required".into());
    }
    if trimmed.chars().count() > MAX_CHAT_NAME_LENGTH {
        return Err(format!(
            "Chat name must be at most {} characters",
            MAX_CHAT_NAME_LENGTH
        ));
    }
    if trimmed.eq_ignore_ascii_case(GENERAL_CHAT_NAME) {
        return Err(format!("Chat name cannot be '{}'", GENERAL_CHAT_NAME));
    }
    Ok(())
}

/// Text content is required unless the message carries an attachment.
pub fn validate_message_content(content: &str, has_attachment: bool) -> Result<(), String> {
    if content.trim().is_empty() && !has_attachment {
        return Err("Message cannot be empty or contain only spaces".into());
    }
    if content.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(format!(
            "Message must be at most {} characters",
            MAX_MESSAGE_LENGTH
        ));
    }
    Ok(())
}
