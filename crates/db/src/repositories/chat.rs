use chrono::Utc;
use sqlx::Row;

use mesero_core::domain::chat::{ChatRole, ChatTurn};

use super::{decode_error, format_timestamp, ChatRepository, RepositoryError};
use crate::DbPool;

pub struct SqlChatRepository {
    pool: DbPool,
}

impl SqlChatRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ChatRepository for SqlChatRepository {
    async fn append_turn(&self, session_id: &str, turn: &ChatTurn) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO chat_turns (session_id, role, content, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(session_id)
        .bind(turn.role.as_str())
        .bind(&turn.content)
        .bind(format_timestamp(Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_session(&self, session_id: &str) -> Result<Vec<ChatTurn>, RepositoryError> {
        let rows =
            sqlx::query("SELECT role, content FROM chat_turns WHERE session_id = ? ORDER BY id")
                .bind(session_id)
                .fetch_all(&self.pool)
                .await?;

        rows.iter()
            .map(|row| {
                let role: String = row.try_get("role").map_err(decode_error)?;
                let role = ChatRole::parse(&role)
                    .ok_or_else(|| RepositoryError::Decode(format!("unknown chat role `{role}`")))?;
                Ok(ChatTurn { role, content: row.try_get("content").map_err(decode_error)? })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use mesero_core::domain::chat::ChatTurn;

    use super::SqlChatRepository;
    use crate::repositories::ChatRepository;
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn sessions_are_isolated_and_ordered() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let repo = SqlChatRepository::new(pool);

        repo.append_turn("s-1", &ChatTurn::user("hola")).await.expect("append");
        repo.append_turn("s-2", &ChatTurn::user("otra mesa")).await.expect("append");
        repo.append_turn("s-1", &ChatTurn::assistant("¡Hola! ¿Qué se te antoja?"))
            .await
            .expect("append");

        let turns = repo.list_session("s-1").await.expect("list");
        assert_eq!(turns, vec![ChatTurn::user("hola"), ChatTurn::assistant("¡Hola! ¿Qué se te antoja?")]);
        assert!(repo.list_session("s-3").await.expect("list").is_empty());
    }
}
