use std::fmt;

use serde::{Deserialize, Serialize};

/// Errore condiviso per HTTP e WS (corpo wire).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Error {
    /// Codice messaggio
    pub code: String,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Tassonomia degli errori delle operazioni di chat.
///
/// Ogni variante è terminale per il chiamante tranne `Store`, che va
/// trattata come transitoria (l'operazione non ha avuto effetti).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    /// Input malformato o mancante: il chiamante deve correggere e rifare.
    Validation(String),
    /// Azione riservata all'admin tentata da un non-admin.
    Permission(String),
    /// Stato già presente (es. membro duplicato).
    Conflict(String),
    /// Gruppo/utente/destinatario sconosciuto.
    NotFound(String),
    /// Violazione di un invariante del modello (es. rimozione dell'admin).
    Invariant(String),
    /// Guasto del livello di persistenza.
    Store(String),
}

impl ChatError {
    pub fn validation<T: Into<String>>(msg: T) -> Self {
        ChatError::Validation(msg.into())
    }

    pub fn permission<T: Into<String>>(msg: T) -> Self {
        ChatError::Permission(msg.into())
    }

    pub fn conflict<T: Into<String>>(msg: T) -> Self {
        ChatError::Conflict(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        ChatError::NotFound(msg.into())
    }

    pub fn invariant<T: Into<String>>(msg: T) -> Self {
        ChatError::Invariant(msg.into())
    }

    pub fn store<T: Into<String>>(msg: T) -> Self {
        ChatError::Store(msg.into())
    }

    /// Codice stabile usato nel corpo wire.
    pub fn code(&self) -> &'static str {
        match self {
            ChatError::Validation(_) => "validation",
            ChatError::Permission(_) => "forbidden",
            ChatError::Conflict(_) => "conflict",
            ChatError::NotFound(_) => "not_found",
            ChatError::Invariant(_) => "invariant",
            ChatError::Store(_) => "store_error",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ChatError::Validation(msg)
            | ChatError::Permission(msg)
            | ChatError::Conflict(msg)
            | ChatError::NotFound(msg)
            | ChatError::Invariant(msg)
            | ChatError::Store(msg) => msg,
        }
    }

    /// Corpo wire corrispondente.
    pub fn to_wire(&self) -> Error {
        Error {
            code: self.code().to_string(),
            message: self.message().to_string(),
            details: None,
        }
    }
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

impl std::error::Error for ChatError {}
