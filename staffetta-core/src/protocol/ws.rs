/* This file defines how data "travel" through the web socket.
    WsMessage is an enum for the envelope, this contains all the variants of ws data types which are:
    Authenticate -> token del client, primo frame se non passato in query
    AuthOk -> conferma del server con l'utente risolto
    MessageReceived -> fanout di un messaggio persistito (anche l'eco al mittente)
    GroupUpdated -> fanout di una mutazione di membership
    Error -> for errors not related to a command
*/
use serde::{Deserialize, Serialize};

use crate::{
    error::Error,
    models::{Group, Message, User},
};

/// Messaggio WS con envelope { type, payload }.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum WsMessage {
    /// Client → Server: autenticazione col token (se non in query string).
    #[serde(rename = "authenticate")]
    Authenticate(Authenticate),
    /// Server → Client: autenticazione riuscita.
    #[serde(rename = "authOk")]
    AuthOk(User),
    /// Server → Client: evento di nuovo messaggio (incluso l'eco al mittente).
    #[serde(rename = "messageReceived")]
    MessageReceived(Message),
    /// Server → Client: la membership di un gruppo è cambiata.
    #[serde(rename = "groupUpdated")]
    GroupUpdated(GroupUpdate),
    /// Server → Client: errore fuori banda.
    #[serde(rename = "error")]
    Error(Error),
}

/// Payload di autenticazione (C→S).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authenticate {
    pub token: String,
}

/// Evento di membership, taggato dal campo `type` dentro il payload.
///
/// Le varianti col Group portano lo snapshot POST-mutazione completo, così
/// ogni client rimpiazza in blocco la propria voce di lista. `Removed`
/// porta solo l'id: chi è stato rimosso non deve più risolvere il gruppo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GroupUpdate {
    #[serde(rename = "NEW")]
    New { group: Group },
    #[serde(rename = "MEMBER_ADDED")]
    MemberAdded { group: Group },
    #[serde(rename = "MEMBER_REMOVED")]
    MemberRemoved { group: Group },
    #[serde(rename = "REMOVED", rename_all = "camelCase")]
    Removed { group_id: String },
}

impl GroupUpdate {
    /// L'id del gruppo a cui si riferisce l'evento.
    pub fn group_id(&self) -> &str {
        match self {
            GroupUpdate::New { group }
            | GroupUpdate::MemberAdded { group }
            | GroupUpdate::MemberRemoved { group } => &group.group_id,
            GroupUpdate::Removed { group_id } => group_id,
        }
    }
}
