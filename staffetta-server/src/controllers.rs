use axum::{
    extract::ws::{Message, WebSocket},
    extract::{Extension, Path, Query, WebSocketUpgrade},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use sqlx::Row;
use staffetta_core::{
    now_timestamp, Authenticate, ChatError, ChatTarget, ChatType, CreateGroupRequest,
    CreateGroupResponse, Error, GroupResponse, ListChatsResponse, ListMessagesResponse,
    LoginRequest, LoginResponse, RegisterRequest, RegisterResponse, SendMessageRequest, User,
    WsMessage,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{store, AppState};

/// Errore HTTP: status + corpo wire { code, message }.
pub struct ApiError {
    status: StatusCode,
    body: Error,
}

impl ApiError {
    fn unauthorized(msg: &str) -> Self {
        ApiError {
            status: StatusCode::UNAUTHORIZED,
            body: Error {
                code: "unauthorized".to_string(),
                message: msg.to_string(),
                details: None,
            },
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(e: ChatError) -> Self {
        // la tassonomia distingue permission/conflict/not-found così il
        // client può mostrare il motivo esatto del fallimento
        let status = match &e {
            ChatError::Validation(_) | ChatError::Invariant(_) => StatusCode::BAD_REQUEST,
            ChatError::Permission(_) => StatusCode::FORBIDDEN,
            ChatError::Conflict(_) => StatusCode::CONFLICT,
            ChatError::NotFound(_) => StatusCode::NOT_FOUND,
            ChatError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError {
            status,
            body: e.to_wire(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Risolve il chiamante dal bearer token. L'autenticazione vera e propria
/// (emissione credenziali) è un collaboratore esterno al motore di chat.
async fn auth_user(state: &AppState, headers: &HeaderMap) -> Result<User, ApiError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::unauthorized("missing bearer token"))?;
    match store::find_user_by_token(&state.pool, token).await? {
        Some(user) => Ok(user),
        None => Err(ApiError::unauthorized("invalid token")),
    }
}

/// Handler per POST /api/register
pub async fn register(
    Extension(state): Extension<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    if req.username.trim().is_empty() || req.password.is_empty() {
        return Err(ChatError::validation("username and password are required").into());
    }

    // controllo se lo username esiste già
    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = ?")
        .bind(&req.username)
        .fetch_one(&state.pool)
        .await
        .map_err(|e| ChatError::store(e.to_string()))?;
    if existing > 0 {
        return Err(ChatError::conflict("username already exists").into());
    }

    // genera id utente e token
    let user_id = Uuid::new_v4().to_string();
    let token = Uuid::new_v4().to_string();
    let password_hash = hash_password(&req.password);
    let created_at = now_timestamp();

    sqlx::query("INSERT INTO users (user_id, username, password_hash, token, created_at) VALUES (?, ?, ?, ?, ?)")
        .bind(&user_id)
        .bind(&req.username)
        .bind(&password_hash)
        .bind(&token)
        .bind(&created_at)
        .execute(&state.pool)
        .await
        .map_err(|e| ChatError::store(e.to_string()))?;

    let user = User {
        user_id,
        username: req.username.clone(),
        created_at,
    };
    Ok((StatusCode::CREATED, Json(RegisterResponse { user, token })))
}

/// Handler per POST /api/login
pub async fn login(
    Extension(state): Extension<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let row = sqlx::query("SELECT user_id, password_hash, created_at FROM users WHERE username = ?")
        .bind(&req.username)
        .fetch_optional(&state.pool)
        .await
        .map_err(|e| ChatError::store(e.to_string()))?;
    let row = match row {
        Some(r) => r,
        None => return Err(ChatError::not_found("user not found").into()),
    };

    let user_id: String = row
        .try_get("user_id")
        .map_err(|e| ChatError::store(e.to_string()))?;
    let stored_hash: String = row
        .try_get("password_hash")
        .map_err(|e| ChatError::store(e.to_string()))?;
    let created_at: String = row
        .try_get("created_at")
        .map_err(|e| ChatError::store(e.to_string()))?;

    // confronto dell'hash calcolato con quello salvato
    if hash_password(&req.password) != stored_hash {
        return Err(ApiError::unauthorized("invalid credentials"));
    }

    // genera token nuovo e aggiorna
    let token = Uuid::new_v4().to_string();
    sqlx::query("UPDATE users SET token = ? WHERE user_id = ?")
        .bind(&token)
        .bind(&user_id)
        .execute(&state.pool)
        .await
        .map_err(|e| ChatError::store(e.to_string()))?;

    let user = User {
        user_id,
        username: req.username.clone(),
        created_at,
    };
    Ok(Json(LoginResponse { token, user }))
}

/// Handler per GET /api/chats: l'universo conversazioni del chiamante
/// (tutti gli altri utenti + i suoi gruppi con la cache latest_message).
pub async fn list_chats(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ListChatsResponse>, ApiError> {
    let user = auth_user(&state, &headers).await?;
    let users = store::list_other_users(&state.pool, &user.user_id).await?;
    let groups = store::groups_for_user(&state.pool, &user.user_id).await?;
    Ok(Json(ListChatsResponse { users, groups }))
}

/// Handler per POST /api/messages: la submit della pipeline di ingest.
/// La coppia grezza (chatType, chatId) viene risolta in ChatTarget QUI,
/// al confine dell'API; dentro viaggia solo la variante esplicita.
pub async fn send_message(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<staffetta_core::Message>), ApiError> {
    let user = auth_user(&state, &headers).await?;
    let target = ChatTarget::new(req.chat_type, req.chat_id);
    let message = state.ingest.submit(&user.user_id, &target, &req.content).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMessagesParams {
    pub chat_id: String,
    pub chat_type: ChatType,
}

/// Handler per GET /api/messages?chatId=&chatType=
pub async fn list_messages(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<ListMessagesParams>,
) -> Result<Json<ListMessagesResponse>, ApiError> {
    let user = auth_user(&state, &headers).await?;
    let target = ChatTarget::new(params.chat_type, params.chat_id);
    let messages = state.ingest.fetch_messages(&user.user_id, &target).await?;
    Ok(Json(ListMessagesResponse { messages }))
}

/// Handler per POST /api/groups
pub async fn create_group(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<CreateGroupResponse>), ApiError> {
    let user = auth_user(&state, &headers).await?;
    let group = state
        .membership
        .create_group(&user.user_id, &req.name, &req.member_ids)
        .await?;
    Ok((StatusCode::CREATED, Json(CreateGroupResponse { group })))
}

/// Handler per PUT /api/groups/:group_id/add
pub async fn add_member(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(group_id): Path<String>,
    Json(req): Json<staffetta_core::AddMemberRequest>,
) -> Result<Json<GroupResponse>, ApiError> {
    let user = auth_user(&state, &headers).await?;
    let group = state
        .membership
        .add_member(&user.user_id, &group_id, &req.user_id)
        .await?;
    Ok(Json(GroupResponse { group }))
}

/// Handler per PUT /api/groups/:group_id/remove
pub async fn remove_member(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(group_id): Path<String>,
    Json(req): Json<staffetta_core::RemoveMemberRequest>,
) -> Result<Json<GroupResponse>, ApiError> {
    let user = auth_user(&state, &headers).await?;
    let group = state
        .membership
        .remove_member(&user.user_id, &group_id, &req.user_id)
        .await?;
    Ok(Json(GroupResponse { group }))
}

/// Handler per /ws
pub async fn ws_handler(
    Extension(state): Extension<Arc<AppState>>,
    ws: WebSocketUpgrade,
    Query(params): Query<std::collections::HashMap<String, String>>,
) -> impl IntoResponse {
    let token = params.get("token").cloned();
    ws.on_upgrade(move |socket| handle_socket(socket, state, token))
}

async fn send_ws_error(socket: &mut WebSocket, code: &str, message: String) {
    let err = WsMessage::Error(Error {
        code: code.to_string(),
        message,
        details: None,
    });
    if let Ok(s) = serde_json::to_string(&err) {
        let _ = socket.send(Message::Text(s)).await;
    }
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>, token_q: Option<String>) {
    // Try authenticate via query param first
    let mut user_opt: Option<User> = None;

    if let Some(token) = token_q {
        match store::find_user_by_token(&state.pool, &token).await {
            Ok(found) => user_opt = found,
            Err(e) => {
                send_ws_error(&mut socket, "internal_error", format!("db error: {}", e)).await;
                return;
            }
        }
    }

    // If not authenticated via query, wait for first Authenticate message
    if user_opt.is_none() {
        if let Some(Ok(msg)) = socket.next().await {
            if let Message::Text(txt) = msg {
                match serde_json::from_str::<WsMessage>(&txt) {
                    Ok(WsMessage::Authenticate(Authenticate { token })) => {
                        match store::find_user_by_token(&state.pool, &token).await {
                            Ok(found) => user_opt = found,
                            Err(e) => {
                                send_ws_error(
                                    &mut socket,
                                    "internal_error",
                                    format!("db error: {}", e),
                                )
                                .await;
                                return;
                            }
                        }
                    }
                    _ => {
                        send_ws_error(
                            &mut socket,
                            "auth_required",
                            "expected authenticate message".to_string(),
                        )
                        .await;
                        return;
                    }
                }
            } else {
                send_ws_error(
                    &mut socket,
                    "auth_required",
                    "expected text authenticate message".to_string(),
                )
                .await;
                return;
            }
        } else {
            // connection closed or error
            return;
        }
    }

    // if still none -> auth failed
    let user = match user_opt {
        Some(u) => u,
        None => {
            send_ws_error(&mut socket, "unauthorized", "invalid token".to_string()).await;
            return;
        }
    };

    // Registra questa sessione nella directory: `tx` è il canale che il
    // fanout usa per recapitare eventi a QUESTA connessione (server -> client).
    // Più connessioni della stessa identità convivono (multi-dispositivo).
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    let conn_id = state.registry.register(&user.user_id, tx);
    tracing::info!(
        "ws connected: user {} conn {} ({} active)",
        user.user_id,
        conn_id,
        state.registry.connections(&user.user_id)
    );

    // Send AuthOk
    if let Ok(s) = serde_json::to_string(&WsMessage::AuthOk(user.clone())) {
        let _ = socket.send(Message::Text(s)).await;
    }

    // Split socket into sink/stream
    let (mut sender, mut receiver) = socket.split();

    // Task: forward messages from rx -> websocket
    let forward_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(Message::Text(msg)).await.is_err() {
                break;
            }
        }
    });

    // Task: gli invii viaggiano via HTTP POST /api/messages, quindi dal
    // client non aspettiamo frame applicativi: teniamo aperto fino a Close.
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(t) => {
                tracing::debug!("ignoring ws frame from {}: {}", user.user_id, t);
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    // cleanup: la deregistrazione chiude il canale e fa terminare il forward task
    state.registry.unregister(&user.user_id, conn_id);
    tracing::info!("ws disconnected: user {} conn {}", user.user_id, conn_id);
    let _ = forward_task.await;
}
