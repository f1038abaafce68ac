use uuid::Uuid;

/// Genera un nuovo id di entità (UUIDv4) come stringa.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Genera un nuovo clientMsgId unico (UUIDv4) come stringa.
pub fn new_client_msg_id() -> String {
    Uuid::new_v4().to_string()
}
