use axum::{
    routing::{get, post, put},
    Extension, Router,
};
use std::sync::Arc;

use crate::controllers;
use crate::{health_with_pool, AppState};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(|Extension(state): Extension<Arc<AppState>>| async move {
            health_with_pool(&state.pool).await
        }))
        .route("/api/register", post(controllers::register))
        .route("/api/login", post(controllers::login))
        .route("/api/chats", get(controllers::list_chats))
        .route("/api/messages", post(controllers::send_message).get(controllers::list_messages))
        .route("/api/groups", post(controllers::create_group))
        .route("/api/groups/:group_id/add", put(controllers::add_member))
        .route("/api/groups/:group_id/remove", put(controllers::remove_member))
        .route("/ws", get(controllers::ws_handler))
        .layer(Extension(state))
}
