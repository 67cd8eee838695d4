// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Message Repository
//!
//! `MessageRepository` backed by the `messages` table. History order is the
//! `BIGSERIAL` id order.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use crate::domain::chat::{ChatId, ChatRole, Message, MessageId, MessageStatus, NewMessage};
use crate::domain::repository::{MessageRepository, RepositoryError};

pub struct PostgresMessageRepository {
    pool: PgPool,
}

impl PostgresMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn message_from_row(row: &PgRow) -> Result<Message, RepositoryError> {
    let role: String = row.get("role");
    let status: String = row.get("status");

    Ok(Message {
        id: MessageId(row.get("id")),
        chat_id: ChatId(row.get("chat_id")),
        role: ChatRole::parse(&role)
            .ok_or_else(|| RepositoryError::Serialization(format!("unknown role '{}'", role)))?,
        author: row.get("author"),
        content: row.get("content"),
        status: MessageStatus::parse(&status)
            .ok_or_else(|| RepositoryError::Serialization(format!("unknown status '{}'", status)))?,
        created_at: row.get("created_at"),
    })
}

#[async_trait]
impl MessageRepository for PostgresMessageRepository {
    async fn create_message(&self, message: NewMessage) -> Result<Message, RepositoryError> {
        let row = sqlx::query(
            r#"
            INSERT INTO messages (chat_id, role, author, content, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, chat_id, role, author, content, status, created_at
            "#,
        )
        .bind(message.chat_id.0)
        .bind(message.role.as_str())
        .bind(&message.author)
        .bind(&message.content)
        .bind(MessageStatus::Delivered.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to save message: {}", e)))?;

        message_from_row(&row)
    }

    async fn find_by_id(&self, id: MessageId) -> Result<Option<Message>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, chat_id, role, author, content, status, created_at
            FROM messages
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(message_from_row).transpose()
    }

    async fn list_by_chat(&self, chat_id: ChatId) -> Result<Vec<Message>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, chat_id, role, author, content, status, created_at
            FROM messages
            WHERE chat_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(chat_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(message_from_row).collect()
    }

    async fn set_status(&self, id: MessageId, status: MessageStatus) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE messages SET status = $2 WHERE id = $1")
            .bind(id.0)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("message {}", id)));
        }
        Ok(())
    }

    async fn update_content(
        &self,
        id: MessageId,
        content: &str,
    ) -> Result<Message, RepositoryError> {
        let row = sqlx::query(
            r#"
            UPDATE messages
            SET content = $2
            WHERE id = $1
            RETURNING id, chat_id, role, author, content, status, created_at
            "#,
        )
        .bind(id.0)
        .bind(content)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => message_from_row(&row),
            None => Err(RepositoryError::NotFound(format!("message {}", id))),
        }
    }

    async fn delete_message(&self, id: MessageId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM messages WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("message {}", id)));
        }
        Ok(())
    }
}
