use serde::{Deserialize, Serialize};

/// Tipo di conversazione: diretta (1:1) oppure di gruppo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChatType {
    #[serde(rename = "DM")]
    Dm,
    #[serde(rename = "GROUP")]
    Group,
}

impl ChatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatType::Dm => "DM",
            ChatType::Group => "GROUP",
        }
    }

    /// Parsing dal valore wire/DB ("DM" | "GROUP").
    pub fn parse(s: &str) -> Option<ChatType> {
        match s {
            "DM" => Some(ChatType::Dm),
            "GROUP" => Some(ChatType::Group),
            _ => None,
        }
    }
}

/// Stato di consegna persistito col messaggio (solo `sent` viene assegnato qui).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Seen,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Sent => "sent",
            MessageStatus::Delivered => "delivered",
            MessageStatus::Seen => "seen",
        }
    }

    pub fn parse(s: &str) -> Option<MessageStatus> {
        match s {
            "sent" => Some(MessageStatus::Sent),
            "delivered" => Some(MessageStatus::Delivered),
            "seen" => Some(MessageStatus::Seen),
            _ => None,
        }
    }
}

/// Messaggio persistito dal server e notificato via WS.
///
/// `chat_id` ha doppio significato sul wire: per i DM è l'id dell'ALTRO
/// partecipante, per i gruppi è l'id del gruppo. Internamente va sempre
/// risolto in un [`ChatTarget`] al confine dell'API, mai propagato grezzo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub message_id: String,
    pub sender_id: String,
    pub chat_id: String,
    pub chat_type: ChatType,
    pub content: String,
    pub status: MessageStatus,
    pub created_at: String, // RFC3339 UTC
}

impl Message {
    /// Risolve la coppia ambigua (chat_type, chat_id) nella variante esplicita.
    pub fn target(&self) -> ChatTarget {
        ChatTarget::new(self.chat_type, self.chat_id.clone())
    }
}

/// Destinazione di una conversazione, risolta una volta sola al confine dell'API.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChatTarget {
    /// DM: id dell'altro partecipante.
    Direct(String),
    /// Gruppo: id del gruppo.
    Group(String),
}

impl ChatTarget {
    pub fn new(chat_type: ChatType, chat_id: String) -> ChatTarget {
        match chat_type {
            ChatType::Dm => ChatTarget::Direct(chat_id),
            ChatType::Group => ChatTarget::Group(chat_id),
        }
    }

    pub fn chat_type(&self) -> ChatType {
        match self {
            ChatTarget::Direct(_) => ChatType::Dm,
            ChatTarget::Group(_) => ChatType::Group,
        }
    }

    /// Il valore che torna nel campo wire `chatId`.
    pub fn chat_id(&self) -> &str {
        match self {
            ChatTarget::Direct(id) | ChatTarget::Group(id) => id,
        }
    }
}
