use serde::{Deserialize, Serialize};

use crate::models::message::Message;

/// Gruppo (chat room) esposto sul wire.
///
/// Invariante: `admin_id` compare sempre in `members`. `latest_message` è
/// solo una cache per la lista conversazioni, assente finché il gruppo non
/// ha messaggi.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub group_id: String,
    pub name: String,
    pub members: Vec<String>,
    pub admin_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_message: Option<Message>,
    pub created_at: String, // RFC3339 UTC
}

impl Group {
    pub fn is_member(&self, user_id: &str) -> bool {
        self.members.iter().any(|m| m == user_id)
    }

    pub fn is_admin(&self, user_id: &str) -> bool {
        self.admin_id == user_id
    }
}
