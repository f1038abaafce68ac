//! staffetta-client: stato di riconciliazione lato client.
//!
//! Mantiene la lista conversazioni ordinata per attività recente e la
//! sequenza messaggi della conversazione aperta, fondendo gli invii
//! ottimistici locali con gli eventi autoritativi del server. Solo stato,
//! niente I/O: il layer UI che lo incapsula decide come parlare col server.

pub mod state;

pub use state::{ChatEntry, ChatState, ConversationItem};
