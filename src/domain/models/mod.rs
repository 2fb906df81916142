pub mod channel;
pub mod credential;
pub mod message;

pub use channel::Channel;
pub use credential::{CredentialStatus, SlackCredential};
pub use message::{MAX_BODY_LEN, MessageStatus, NewScheduledMessage, ScheduledMessage};
