//! Pipeline di ingest dei messaggi: valida, persiste, innesca il fanout.

use sqlx::SqlitePool;
use staffetta_core::{
    new_id, now_timestamp, ChatError, ChatTarget, Message, MessageStatus,
};

use crate::fanout::FanoutRouter;
use crate::store;

#[derive(Clone)]
pub struct MessageIngest {
    pool: SqlitePool,
    fanout: FanoutRouter,
}

impl MessageIngest {
    pub fn new(pool: SqlitePool, fanout: FanoutRouter) -> Self {
        MessageIngest { pool, fanout }
    }

    /// Valida e persiste un messaggio, poi lo consegna alle connessioni vive.
    ///
    /// Le precondizioni violate falliscono con Validation PRIMA di qualunque
    /// scrittura. Un errore di persistenza fa fallire tutta l'operazione e
    /// NON innesca il fanout (niente consegne live di messaggi fantasma).
    /// Viceversa, dopo l'insert il messaggio è durevole: fanout e
    /// aggiornamento della cache latest_message non possono più far fallire
    /// la submit. Il Message ritornato è l'eco autoritativa per il client.
    pub async fn submit(
        &self,
        sender_id: &str,
        target: &ChatTarget,
        content: &str,
    ) -> Result<Message, ChatError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ChatError::validation("content must not be empty"));
        }

        match target {
            ChatTarget::Direct(other_id) => {
                // il chatId di un DM deve riferire un utente esistente
                if store::find_user(&self.pool, other_id).await?.is_none() {
                    return Err(ChatError::validation(
                        "chatId does not reference an existing user",
                    ));
                }
            }
            ChatTarget::Group(group_id) => {
                // un gruppo ha sempre almeno l'admin tra i membri, quindi
                // membership vuota equivale a gruppo inesistente
                let members = store::group_member_ids(&self.pool, group_id).await?;
                if members.is_empty() {
                    return Err(ChatError::validation(
                        "chatId does not reference an existing group",
                    ));
                }
                if !members.iter().any(|m| m == sender_id) {
                    return Err(ChatError::validation(
                        "sender is not a member of the group",
                    ));
                }
            }
        }

        let message = Message {
            message_id: new_id(),
            sender_id: sender_id.to_string(),
            chat_id: target.chat_id().to_string(),
            chat_type: target.chat_type(),
            content: content.to_string(),
            status: MessageStatus::Sent,
            created_at: now_timestamp(),
        };
        store::insert_message(&self.pool, &message).await?;

        self.fanout.route(&message).await;

        if let ChatTarget::Group(group_id) = target {
            // best-effort: la cache non deve far fallire una submit riuscita
            if let Err(e) =
                store::set_latest_message(&self.pool, group_id, &message.message_id).await
            {
                tracing::warn!(
                    "latest message cache update failed for group {}: {}",
                    group_id,
                    e
                );
            }
        }

        Ok(message)
    }

    /// Storia della conversazione, ascendente per data di creazione.
    ///
    /// Per i DM torna l'unione delle due direzioni; per i gruppi il
    /// chiamante deve esserne membro.
    pub async fn fetch_messages(
        &self,
        caller_id: &str,
        target: &ChatTarget,
    ) -> Result<Vec<Message>, ChatError> {
        match target {
            ChatTarget::Direct(other_id) => {
                store::list_dm_messages(&self.pool, caller_id, other_id).await
            }
            ChatTarget::Group(group_id) => {
                let members = store::group_member_ids(&self.pool, group_id).await?;
                if !members.iter().any(|m| m == caller_id) {
                    return Err(ChatError::validation(
                        "caller is not a member of the group",
                    ));
                }
                store::list_group_messages(&self.pool, group_id).await
            }
        }
    }
}
