pub mod ws;
pub mod http;

// Re-export comodi
pub use ws::{Authenticate, GroupUpdate, WsMessage};
pub use http::{
    AddMemberRequest, CreateGroupRequest, CreateGroupResponse, GroupResponse, ListChatsResponse,
    ListMessagesResponse, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse,
    RemoveMemberRequest, SendMessageRequest,
};
