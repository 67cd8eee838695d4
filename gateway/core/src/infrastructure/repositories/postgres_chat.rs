// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Chat Repository
//!
//! `ChatRepository` backed by the `chats` table. Ownership checks are
//! evaluated in Rust against the stored owner so the admin rule lives in
//! one place ([`Chat::access_for`]).

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use crate::domain::chat::{Chat, ChatAccess, ChatBinding, ChatId, ChatUpdate, NewChat};
use crate::domain::identity::Identity;
use crate::domain::repository::{ChatRepository, RepositoryError};

pub struct PostgresChatRepository {
    pool: PgPool,
}

impl PostgresChatRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn chat_from_row(row: &PgRow) -> Chat {
    Chat {
        id: ChatId(row.get("id")),
        owner_id: row.get("owner_id"),
        title: row.get("title"),
        agent_name: row.get("agent_name"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl ChatRepository for PostgresChatRepository {
    async fn create(&self, chat: NewChat) -> Result<Chat, RepositoryError> {
        let row = sqlx::query(
            r#"
            INSERT INTO chats (owner_id, title, agent_name)
            VALUES ($1, $2, $3)
            RETURNING id, owner_id, title, agent_name, created_at
            "#,
        )
        .bind(&chat.owner_id)
        .bind(&chat.title)
        .bind(&chat.agent_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("Failed to create chat: {}", e)))?;

        Ok(chat_from_row(&row))
    }

    async fn find_by_id(&self, id: ChatId) -> Result<Option<Chat>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, owner_id, title, agent_name, created_at
            FROM chats
            WHERE id = $1
            "#,
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(chat_from_row))
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Chat>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, owner_id, title, agent_name, created_at
            FROM chats
            WHERE owner_id = $1
            ORDER BY id DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(chat_from_row).collect())
    }

    async fn update(&self, id: ChatId, update: ChatUpdate) -> Result<Chat, RepositoryError> {
        let row = sqlx::query(
            r#"
            UPDATE chats
            SET title = COALESCE($2, title),
                agent_name = COALESCE($3, agent_name)
            WHERE id = $1
            RETURNING id, owner_id, title, agent_name, created_at
            "#,
        )
        .bind(id.0)
        .bind(&update.title)
        .bind(&update.agent_name)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref()
            .map(chat_from_row)
            .ok_or_else(|| RepositoryError::NotFound(format!("chat {}", id)))
    }

    async fn delete(&self, id: ChatId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM chats WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("chat {}", id)));
        }
        Ok(())
    }

    async fn get_chat_binding(&self, id: ChatId) -> Result<Option<ChatBinding>, RepositoryError> {
        let row = sqlx::query("SELECT agent_name FROM chats WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| ChatBinding {
            chat_id: id,
            agent_name: row.get("agent_name"),
        }))
    }

    async fn check_chat_access(
        &self,
        id: ChatId,
        identity: &Identity,
    ) -> Result<ChatAccess, RepositoryError> {
        Ok(match self.find_by_id(id).await? {
            Some(chat) => chat.access_for(identity),
            None => ChatAccess::Missing,
        })
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
