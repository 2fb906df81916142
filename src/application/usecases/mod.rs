pub mod cancel_message;
pub mod get_message;
pub mod list_channels;
pub mod list_messages;
pub mod schedule_message;
