//! Accesso al Durable Store (SQLite via sqlx) per utenti, gruppi e messaggi.
//! Le pipeline non contengono SQL: passano tutte da qui e trattano lo store
//! come unica fonte di verità, senza cache scrivibili tra le richieste.

use sqlx::{Row, SqlitePool};
use staffetta_core::{now_timestamp, ChatError, ChatType, Group, Message, MessageStatus, User};

fn store_err(e: sqlx::Error) -> ChatError {
    ChatError::store(e.to_string())
}

fn user_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<User, ChatError> {
    Ok(User {
        user_id: row.try_get("user_id").map_err(store_err)?,
        username: row.try_get("username").map_err(store_err)?,
        created_at: row.try_get("created_at").map_err(store_err)?,
    })
}

fn message_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Message, ChatError> {
    let chat_type: String = row.try_get("chat_type").map_err(store_err)?;
    let status: String = row.try_get("status").map_err(store_err)?;
    Ok(Message {
        message_id: row.try_get("message_id").map_err(store_err)?,
        sender_id: row.try_get("sender_id").map_err(store_err)?,
        chat_id: row.try_get("chat_id").map_err(store_err)?,
        chat_type: ChatType::parse(&chat_type)
            .ok_or_else(|| ChatError::store(format!("corrupt chat_type: {}", chat_type)))?,
        content: row.try_get("content").map_err(store_err)?,
        status: MessageStatus::parse(&status)
            .ok_or_else(|| ChatError::store(format!("corrupt status: {}", status)))?,
        created_at: row.try_get("created_at").map_err(store_err)?,
    })
}

pub async fn find_user(pool: &SqlitePool, user_id: &str) -> Result<Option<User>, ChatError> {
    let row = sqlx::query("SELECT user_id, username, created_at FROM users WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(store_err)?;
    row.as_ref().map(user_from_row).transpose()
}

pub async fn find_user_by_token(pool: &SqlitePool, token: &str) -> Result<Option<User>, ChatError> {
    let row = sqlx::query("SELECT user_id, username, created_at FROM users WHERE token = ?")
        .bind(token)
        .fetch_optional(pool)
        .await
        .map_err(store_err)?;
    row.as_ref().map(user_from_row).transpose()
}

/// Tutti gli utenti tranne il chiamante (controparti DM possibili).
pub async fn list_other_users(pool: &SqlitePool, user_id: &str) -> Result<Vec<User>, ChatError> {
    let rows = sqlx::query(
        "SELECT user_id, username, created_at FROM users WHERE user_id != ? ORDER BY username",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(store_err)?;
    rows.iter().map(user_from_row).collect()
}

/// Inserisce il gruppo e le righe di membership.
pub async fn insert_group(pool: &SqlitePool, group: &Group) -> Result<(), ChatError> {
    sqlx::query(
        "INSERT INTO groups (group_id, name, admin_id, latest_message_id, created_at) VALUES (?, ?, ?, NULL, ?)",
    )
    .bind(&group.group_id)
    .bind(&group.name)
    .bind(&group.admin_id)
    .bind(&group.created_at)
    .execute(pool)
    .await
    .map_err(store_err)?;

    for member_id in &group.members {
        add_group_member(pool, &group.group_id, member_id).await?;
    }
    Ok(())
}

pub async fn add_group_member(
    pool: &SqlitePool,
    group_id: &str,
    user_id: &str,
) -> Result<(), ChatError> {
    sqlx::query("INSERT INTO group_members (group_id, user_id, joined_at) VALUES (?, ?, ?)")
        .bind(group_id)
        .bind(user_id)
        .bind(now_timestamp())
        .execute(pool)
        .await
        .map_err(store_err)?;
    Ok(())
}

pub async fn remove_group_member(
    pool: &SqlitePool,
    group_id: &str,
    user_id: &str,
) -> Result<(), ChatError> {
    sqlx::query("DELETE FROM group_members WHERE group_id = ? AND user_id = ?")
        .bind(group_id)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(store_err)?;
    Ok(())
}

/// Snapshot CORRENTE della membership, riletto ad ogni chiamata.
pub async fn group_member_ids(
    pool: &SqlitePool,
    group_id: &str,
) -> Result<Vec<String>, ChatError> {
    let ids = sqlx::query_scalar(
        "SELECT user_id FROM group_members WHERE group_id = ? ORDER BY joined_at, user_id",
    )
    .bind(group_id)
    .fetch_all(pool)
    .await
    .map_err(store_err)?;
    Ok(ids)
}

/// Carica il gruppo completo: riga, membership e cache dell'ultimo messaggio.
pub async fn load_group(pool: &SqlitePool, group_id: &str) -> Result<Option<Group>, ChatError> {
    let row = sqlx::query(
        "SELECT group_id, name, admin_id, latest_message_id, created_at FROM groups WHERE group_id = ?",
    )
    .bind(group_id)
    .fetch_optional(pool)
    .await
    .map_err(store_err)?;
    let row = match row {
        Some(r) => r,
        None => return Ok(None),
    };

    let members = group_member_ids(pool, group_id).await?;
    let latest_message_id: Option<String> = row.try_get("latest_message_id").map_err(store_err)?;
    let latest_message = match latest_message_id {
        Some(id) => find_message(pool, &id).await?,
        None => None,
    };

    Ok(Some(Group {
        group_id: row.try_get("group_id").map_err(store_err)?,
        name: row.try_get("name").map_err(store_err)?,
        members,
        admin_id: row.try_get("admin_id").map_err(store_err)?,
        latest_message,
        created_at: row.try_get("created_at").map_err(store_err)?,
    }))
}

/// Tutti i gruppi di cui l'utente è membro, con la cache dell'ultimo messaggio.
pub async fn groups_for_user(pool: &SqlitePool, user_id: &str) -> Result<Vec<Group>, ChatError> {
    let group_ids: Vec<String> = sqlx::query_scalar(
        "SELECT group_id FROM group_members WHERE user_id = ? ORDER BY joined_at, group_id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(store_err)?;

    let mut groups = Vec::with_capacity(group_ids.len());
    for id in group_ids {
        if let Some(group) = load_group(pool, &id).await? {
            groups.push(group);
        }
    }
    Ok(groups)
}

pub async fn find_message(pool: &SqlitePool, message_id: &str) -> Result<Option<Message>, ChatError> {
    let row = sqlx::query(
        "SELECT message_id, sender_id, chat_id, chat_type, content, status, created_at FROM messages WHERE message_id = ?",
    )
    .bind(message_id)
    .fetch_optional(pool)
    .await
    .map_err(store_err)?;
    row.as_ref().map(message_from_row).transpose()
}

pub async fn insert_message(pool: &SqlitePool, message: &Message) -> Result<(), ChatError> {
    sqlx::query(
        "INSERT INTO messages (message_id, sender_id, chat_id, chat_type, content, status, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&message.message_id)
    .bind(&message.sender_id)
    .bind(&message.chat_id)
    .bind(message.chat_type.as_str())
    .bind(&message.content)
    .bind(message.status.as_str())
    .bind(&message.created_at)
    .execute(pool)
    .await
    .map_err(store_err)?;
    Ok(())
}

/// Aggiorna il puntatore latest_message del gruppo (cache per la lista chat).
pub async fn set_latest_message(
    pool: &SqlitePool,
    group_id: &str,
    message_id: &str,
) -> Result<(), ChatError> {
    sqlx::query("UPDATE groups SET latest_message_id = ? WHERE group_id = ?")
        .bind(message_id)
        .bind(group_id)
        .execute(pool)
        .await
        .map_err(store_err)?;
    Ok(())
}

/// Storia DM: unione delle due direzioni (a→b e b→a), ascendente per data.
pub async fn list_dm_messages(
    pool: &SqlitePool,
    user_a: &str,
    user_b: &str,
) -> Result<Vec<Message>, ChatError> {
    let rows = sqlx::query(
        r#"SELECT message_id, sender_id, chat_id, chat_type, content, status, created_at
           FROM messages
           WHERE chat_type = 'DM'
             AND ((sender_id = ? AND chat_id = ?) OR (sender_id = ? AND chat_id = ?))
           ORDER BY created_at, message_id"#,
    )
    .bind(user_a)
    .bind(user_b)
    .bind(user_b)
    .bind(user_a)
    .fetch_all(pool)
    .await
    .map_err(store_err)?;
    rows.iter().map(message_from_row).collect()
}

/// Storia di gruppo, ascendente per data.
pub async fn list_group_messages(
    pool: &SqlitePool,
    group_id: &str,
) -> Result<Vec<Message>, ChatError> {
    let rows = sqlx::query(
        r#"SELECT message_id, sender_id, chat_id, chat_type, content, status, created_at
           FROM messages
           WHERE chat_type = 'GROUP' AND chat_id = ?
           ORDER BY created_at, message_id"#,
    )
    .bind(group_id)
    .fetch_all(pool)
    .await
    .map_err(store_err)?;
    rows.iter().map(message_from_row).collect()
}
