pub mod user;
pub mod group;
pub mod message;

// Re-export per comodità
pub use user::User;
pub use group::Group;
pub use message::{ChatTarget, ChatType, Message, MessageStatus};
