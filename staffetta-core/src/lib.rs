//! staffetta-core: tipi condivisi tra client e server (modelli, DTO HTTP, eventi WS, errori).
//! Niente I/O o dipendenze non compatibili con WASM.

pub mod models;
pub mod protocol;
pub mod error;
pub mod utils;

// Re-export utili per ridurre i percorsi nei crate client/server
pub use error::{ChatError, Error};
pub use models::{
    group::Group,
    message::{ChatTarget, ChatType, Message, MessageStatus},
    user::User,
};
pub use protocol::http::{
    AddMemberRequest, CreateGroupRequest, CreateGroupResponse, GroupResponse, ListChatsResponse,
    ListMessagesResponse, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse,
    RemoveMemberRequest, SendMessageRequest,
};
pub use protocol::ws::{Authenticate, GroupUpdate, WsMessage};
pub use utils::{new_client_msg_id, new_id, now_timestamp};
