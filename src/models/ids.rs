use uuid::Uuid;

pub const CONVERSATION_PREFIX: &str = "conv";
pub const MESSAGE_PREFIX: &str = "msg";

/// UUIDv7 puts the unix millis in the leading bits and fills the rest with
/// random data, so ids sort by creation time and never repeat in practice.
fn time_ordered(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::now_v7().simple())
}

pub fn new_conversation_id() -> String {
    time_ordered(CONVERSATION_PREFIX)
}

pub fn new_message_id() -> String {
    time_ordered(MESSAGE_PREFIX)
}
