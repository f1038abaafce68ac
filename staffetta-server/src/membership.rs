//! Mutazioni di membership dei gruppi, riservate all'admin.
//!
//! Lo stato di un gruppo è il set di membri persistito: queste operazioni
//! sono le uniche transizioni. Nessun lock tra richieste: due mutazioni
//! concorrenti sullo stesso gruppo vengono serializzate solo dallo store e
//! il fanout trasmette sempre lo snapshot post-mutazione, quindi i chiamanti
//! devono trattare lo stato come eventualmente consistente.

use sqlx::SqlitePool;
use staffetta_core::{new_id, now_timestamp, ChatError, Group};

use crate::fanout::{FanoutRouter, MembershipEvent};
use crate::store;

#[derive(Clone)]
pub struct MembershipService {
    pool: SqlitePool,
    fanout: FanoutRouter,
}

impl MembershipService {
    pub fn new(pool: SqlitePool, fanout: FanoutRouter) -> Self {
        MembershipService { pool, fanout }
    }

    /// Crea un gruppo: membership = memberIds ∪ {creatore}, admin = creatore.
    /// Emette NEW ad ogni membro.
    pub async fn create_group(
        &self,
        creator_id: &str,
        name: &str,
        member_ids: &[String],
    ) -> Result<Group, ChatError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ChatError::validation("group name is required"));
        }
        if member_ids.is_empty() {
            return Err(ChatError::validation("at least one member is required"));
        }

        // il creatore entra sempre nella membership, senza duplicati
        let creator = creator_id.to_string();
        let mut members: Vec<String> = Vec::with_capacity(member_ids.len() + 1);
        for id in member_ids.iter().chain(std::iter::once(&creator)) {
            if !members.iter().any(|m| m == id) {
                members.push(id.clone());
            }
        }

        let group = Group {
            group_id: new_id(),
            name: name.to_string(),
            members,
            admin_id: creator_id.to_string(),
            latest_message: None,
            created_at: now_timestamp(),
        };
        store::insert_group(&self.pool, &group).await?;

        self.fanout
            .route_membership_change(&MembershipEvent::New {
                group: group.clone(),
            })
            .await;
        Ok(group)
    }

    /// Aggiunge un membro (solo admin). Emette MEMBER_ADDED ad ogni membro
    /// dello snapshot aggiornato.
    pub async fn add_member(
        &self,
        requester_id: &str,
        group_id: &str,
        user_id: &str,
    ) -> Result<Group, ChatError> {
        let group = self.require_admin(requester_id, group_id).await?;
        if group.is_member(user_id) {
            return Err(ChatError::conflict("user is already a member of the group"));
        }
        if store::find_user(&self.pool, user_id).await?.is_none() {
            return Err(ChatError::not_found("user not found"));
        }

        store::add_group_member(&self.pool, group_id, user_id).await?;

        let updated = self.reload(group_id).await?;
        self.fanout
            .route_membership_change(&MembershipEvent::MemberAdded {
                group: updated.clone(),
            })
            .await;
        Ok(updated)
    }

    /// Rimuove un membro (solo admin; mai l'admin stesso). Il rimosso riceve
    /// REMOVED col solo groupId, i restanti MEMBER_REMOVED con lo snapshot.
    pub async fn remove_member(
        &self,
        requester_id: &str,
        group_id: &str,
        user_id: &str,
    ) -> Result<Group, ChatError> {
        let group = self.require_admin(requester_id, group_id).await?;
        if user_id == group.admin_id {
            // invariante: admin ∈ members, sempre; non esiste trasferimento
            // di ruolo, quindi la rimozione dell'admin è vietata
            return Err(ChatError::invariant(
                "the administrator cannot be removed from the group",
            ));
        }
        if !group.is_member(user_id) {
            return Err(ChatError::not_found("user is not a member of the group"));
        }

        store::remove_group_member(&self.pool, group_id, user_id).await?;

        let updated = self.reload(group_id).await?;
        self.fanout
            .route_membership_change(&MembershipEvent::MemberRemoved {
                group: updated.clone(),
                removed_user_id: user_id.to_string(),
            })
            .await;
        Ok(updated)
    }

    /// Carica il gruppo e verifica che il richiedente sia l'admin.
    async fn require_admin(&self, requester_id: &str, group_id: &str) -> Result<Group, ChatError> {
        let group = store::load_group(&self.pool, group_id)
            .await?
            .ok_or_else(|| ChatError::not_found("group not found"))?;
        if !group.is_admin(requester_id) {
            return Err(ChatError::permission(
                "only the group administrator can perform this action",
            ));
        }
        Ok(group)
    }

    /// Snapshot post-mutazione riletto dallo store.
    async fn reload(&self, group_id: &str) -> Result<Group, ChatError> {
        store::load_group(&self.pool, group_id)
            .await?
            .ok_or_else(|| ChatError::not_found("group not found"))
    }
}
