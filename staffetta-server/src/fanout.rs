//! Fanout degli eventi verso le connessioni vive.
//!
//! Il router calcola l'insieme di identità destinatarie e consegna tramite
//! la directory; non tocca mai il transport direttamente. La consegna è
//! advisory: il chiamante ha già persistito, quindi qui non esistono errori
//! da propagare, solo log.

use std::sync::Arc;

use sqlx::SqlitePool;
use staffetta_core::{ChatTarget, Group, GroupUpdate, Message, WsMessage};

use crate::registry::ConnectionRegistry;
use crate::store;

/// Mutazione di membership da notificare. Le varianti col gruppo portano lo
/// snapshot post-mutazione; `MemberRemoved` porta anche chi è uscito, perché
/// riceve un payload ridotto e distinto dai membri restanti.
#[derive(Debug, Clone)]
pub enum MembershipEvent {
    New { group: Group },
    MemberAdded { group: Group },
    MemberRemoved { group: Group, removed_user_id: String },
}

#[derive(Clone)]
pub struct FanoutRouter {
    pool: SqlitePool,
    registry: Arc<ConnectionRegistry>,
}

impl FanoutRouter {
    pub fn new(pool: SqlitePool, registry: Arc<ConnectionRegistry>) -> Self {
        FanoutRouter { pool, registry }
    }

    /// Consegna un messaggio persistito a tutte le identità rilevanti.
    ///
    /// Il mittente è sempre incluso (così gli altri suoi dispositivi
    /// convergono). Per i gruppi la membership viene RILETTA dallo store al
    /// momento del routing, non presa dallo snapshot della richiesta: la
    /// finestra di corsa con una mutazione concorrente si restringe ma non
    /// sparisce, ed è un'inconsistenza accettata.
    pub async fn route(&self, message: &Message) {
        let envelope = match serde_json::to_string(&WsMessage::MessageReceived(message.clone())) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("failed to encode messageReceived event: {}", e);
                return;
            }
        };

        // 1. Always send back to the sender
        self.registry.deliver(&message.sender_id, &envelope);

        match message.target() {
            ChatTarget::Direct(other) => {
                // Nel DM il chatId È l'altro utente; se uno scrive a sé
                // stesso la consegna al mittente è già avvenuta sopra.
                if other != message.sender_id {
                    self.registry.deliver(&other, &envelope);
                }
            }
            ChatTarget::Group(group_id) => {
                match store::group_member_ids(&self.pool, &group_id).await {
                    Ok(members) => {
                        for member_id in members {
                            if member_id != message.sender_id {
                                self.registry.deliver(&member_id, &envelope);
                            }
                        }
                    }
                    Err(e) => {
                        // il messaggio è già durevole: i membri lo vedranno
                        // dalla storia alla prossima fetch
                        tracing::warn!(
                            "membership read failed during fanout for group {}: {}",
                            group_id,
                            e
                        );
                    }
                }
            }
        }
    }

    /// Consegna un evento di membership.
    ///
    /// NEW / MEMBER_ADDED / MEMBER_REMOVED portano il gruppo aggiornato ad
    /// ogni membro corrente; il rimosso riceve in più un REMOVED col solo id.
    pub async fn route_membership_change(&self, event: &MembershipEvent) {
        match event {
            MembershipEvent::New { group } => {
                self.broadcast_update(group, GroupUpdate::New {
                    group: group.clone(),
                });
            }
            MembershipEvent::MemberAdded { group } => {
                self.broadcast_update(group, GroupUpdate::MemberAdded {
                    group: group.clone(),
                });
            }
            MembershipEvent::MemberRemoved {
                group,
                removed_user_id,
            } => {
                self.send_update(
                    removed_user_id,
                    GroupUpdate::Removed {
                        group_id: group.group_id.clone(),
                    },
                );
                self.broadcast_update(group, GroupUpdate::MemberRemoved {
                    group: group.clone(),
                });
            }
        }
    }

    /// Serializza una volta e consegna ad ogni membro del gruppo.
    fn broadcast_update(&self, group: &Group, update: GroupUpdate) {
        if let Some(envelope) = encode_update(update) {
            for member_id in &group.members {
                self.registry.deliver(member_id, &envelope);
            }
        }
    }

    fn send_update(&self, user_id: &str, update: GroupUpdate) {
        if let Some(envelope) = encode_update(update) {
            self.registry.deliver(user_id, &envelope);
        }
    }
}

fn encode_update(update: GroupUpdate) -> Option<String> {
    match serde_json::to_string(&WsMessage::GroupUpdated(update)) {
        Ok(s) => Some(s),
        Err(e) => {
            tracing::error!("failed to encode groupUpdated event: {}", e);
            None
        }
    }
}
