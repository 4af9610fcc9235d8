//! SQLite backend.
//!
//! Single database file, five tables:
//! - `profiles` — user profiles including the daily quota counter
//! - `conversations` — conversation records
//! - `messages` — append-only message log (integer rowid breaks
//!   `created_at` ties)
//! - `knowledge_documents` — curated knowledge base
//! - `community_posts` — community posts, read-only here
//!
//! `consume_interaction` runs inside a transaction whose first statement
//! is an UPDATE, so SQLite takes the write lock up front and concurrent
//! turns for the same user serialize on the decrement.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use clara_core::error::StoreError;
use clara_core::knowledge::{CommunityPost, KnowledgeDocument};
use clara_core::message::{Author, Conversation, ConversationId, StoredMessage};
use clara_core::profile::{Plan, UserProfile};
use clara_core::store::{
    CommunityStore, ConversationStore, KnowledgeStore, ProfileStore, QuotaConsume,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};

const DATE_FMT: &str = "%Y-%m-%d";

/// A production SQLite store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new SQLite store from a file path.
    ///
    /// The database and all tables/indexes are created automatically.
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool (useful for testing).
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS profiles (
                id                    TEXT PRIMARY KEY,
                name                  TEXT NOT NULL,
                age                   INTEGER,
                profession            TEXT,
                goals                 TEXT,
                plan                  TEXT NOT NULL DEFAULT 'free',
                admin                 INTEGER NOT NULL DEFAULT 0,
                daily_interactions    INTEGER NOT NULL DEFAULT 0,
                last_interaction_date TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("profiles table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS conversations (
                id         TEXT PRIMARY KEY,
                user_id    TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                title      TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("conversations table: {e}")))?;

        // Integer rowid alias preserves insertion order for created_at ties
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                iid             INTEGER PRIMARY KEY AUTOINCREMENT,
                id              TEXT UNIQUE NOT NULL,
                conversation_id TEXT NOT NULL REFERENCES conversations(id),
                author          TEXT NOT NULL,
                content         TEXT NOT NULL,
                created_at      TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("messages table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS knowledge_documents (
                id         TEXT PRIMARY KEY,
                title      TEXT NOT NULL,
                summary    TEXT NOT NULL,
                content    TEXT NOT NULL,
                active     INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("knowledge_documents table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS community_posts (
                id         TEXT PRIMARY KEY,
                user_id    TEXT NOT NULL,
                content    TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("community_posts table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_messages_conversation
             ON messages(conversation_id, created_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("messages index: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_documents_active
             ON knowledge_documents(active, created_at DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("documents index: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_posts_user
             ON community_posts(user_id, created_at DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("posts index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn row_to_profile(row: &sqlx::sqlite::SqliteRow) -> Result<UserProfile, StoreError> {
        let id: String = row
            .try_get("id")
            .map_err(|e| StoreError::Storage(format!("id column: {e}")))?;
        let name: String = row
            .try_get("name")
            .map_err(|e| StoreError::Storage(format!("name column: {e}")))?;
        let age: Option<i64> = row
            .try_get("age")
            .map_err(|e| StoreError::Storage(format!("age column: {e}")))?;
        let profession: Option<String> = row
            .try_get("profession")
            .map_err(|e| StoreError::Storage(format!("profession column: {e}")))?;
        let goals: Option<String> = row
            .try_get("goals")
            .map_err(|e| StoreError::Storage(format!("goals column: {e}")))?;
        let plan_str: String = row
            .try_get("plan")
            .map_err(|e| StoreError::Storage(format!("plan column: {e}")))?;
        let admin: bool = row
            .try_get("admin")
            .map_err(|e| StoreError::Storage(format!("admin column: {e}")))?;
        let daily_interactions: i64 = row
            .try_get("daily_interactions")
            .map_err(|e| StoreError::Storage(format!("daily_interactions column: {e}")))?;
        let date_str: Option<String> = row
            .try_get("last_interaction_date")
            .map_err(|e| StoreError::Storage(format!("last_interaction_date column: {e}")))?;

        let plan = Plan::from_str(&plan_str).unwrap_or_default();
        let last_interaction_date =
            date_str.and_then(|s| NaiveDate::parse_from_str(&s, DATE_FMT).ok());

        Ok(UserProfile {
            id,
            name,
            age: age.map(|a| a as u32),
            profession,
            goals,
            plan,
            admin,
            daily_interactions,
            last_interaction_date,
        })
    }

    fn row_to_conversation(row: &sqlx::sqlite::SqliteRow) -> Result<Conversation, StoreError> {
        let id: String = row
            .try_get("id")
            .map_err(|e| StoreError::Storage(format!("id column: {e}")))?;
        let user_id: String = row
            .try_get("user_id")
            .map_err(|e| StoreError::Storage(format!("user_id column: {e}")))?;
        let created_at_str: String = row
            .try_get("created_at")
            .map_err(|e| StoreError::Storage(format!("created_at column: {e}")))?;
        let updated_at_str: String = row
            .try_get("updated_at")
            .map_err(|e| StoreError::Storage(format!("updated_at column: {e}")))?;
        let title: Option<String> = row
            .try_get("title")
            .map_err(|e| StoreError::Storage(format!("title column: {e}")))?;

        let created_at = chrono::DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());
        let updated_at = chrono::DateTime::parse_from_rfc3339(&updated_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(Conversation {
            id: ConversationId(id),
            user_id,
            created_at,
            updated_at,
            title,
        })
    }

    fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<StoredMessage, StoreError> {
        let id: String = row
            .try_get("id")
            .map_err(|e| StoreError::Storage(format!("id column: {e}")))?;
        let conversation_id: String = row
            .try_get("conversation_id")
            .map_err(|e| StoreError::Storage(format!("conversation_id column: {e}")))?;
        let author_str: String = row
            .try_get("author")
            .map_err(|e| StoreError::Storage(format!("author column: {e}")))?;
        let content: String = row
            .try_get("content")
            .map_err(|e| StoreError::Storage(format!("content column: {e}")))?;
        let created_at_str: String = row
            .try_get("created_at")
            .map_err(|e| StoreError::Storage(format!("created_at column: {e}")))?;

        let author = Author::from_str(&author_str)
            .map_err(|e| StoreError::Storage(format!("author column: {e}")))?;
        let created_at = chrono::DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(StoredMessage {
            id,
            conversation_id: ConversationId(conversation_id),
            author,
            content,
            created_at,
        })
    }

    fn row_to_document(row: &sqlx::sqlite::SqliteRow) -> Result<KnowledgeDocument, StoreError> {
        let id: String = row
            .try_get("id")
            .map_err(|e| StoreError::Storage(format!("id column: {e}")))?;
        let title: String = row
            .try_get("title")
            .map_err(|e| StoreError::Storage(format!("title column: {e}")))?;
        let summary: String = row
            .try_get("summary")
            .map_err(|e| StoreError::Storage(format!("summary column: {e}")))?;
        let content: String = row
            .try_get("content")
            .map_err(|e| StoreError::Storage(format!("content column: {e}")))?;
        let active: bool = row
            .try_get("active")
            .map_err(|e| StoreError::Storage(format!("active column: {e}")))?;
        let created_at_str: String = row
            .try_get("created_at")
            .map_err(|e| StoreError::Storage(format!("created_at column: {e}")))?;

        let created_at = chrono::DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(KnowledgeDocument {
            id,
            title,
            summary,
            content,
            active,
            created_at,
        })
    }

    fn row_to_post(row: &sqlx::sqlite::SqliteRow) -> Result<CommunityPost, StoreError> {
        let id: String = row
            .try_get("id")
            .map_err(|e| StoreError::Storage(format!("id column: {e}")))?;
        let user_id: String = row
            .try_get("user_id")
            .map_err(|e| StoreError::Storage(format!("user_id column: {e}")))?;
        let content: String = row
            .try_get("content")
            .map_err(|e| StoreError::Storage(format!("content column: {e}")))?;
        let created_at_str: String = row
            .try_get("created_at")
            .map_err(|e| StoreError::Storage(format!("created_at column: {e}")))?;

        let created_at = chrono::DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(CommunityPost {
            id,
            user_id,
            content,
            created_at,
        })
    }

    /// Insert a knowledge document (admin/seed path).
    pub async fn add_document(&self, document: &KnowledgeDocument) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO knowledge_documents (id, title, summary, content, active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                summary = excluded.summary,
                content = excluded.content,
                active = excluded.active
            "#,
        )
        .bind(&document.id)
        .bind(&document.title)
        .bind(&document.summary)
        .bind(&document.content)
        .bind(document.active)
        .bind(document.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("document INSERT failed: {e}")))?;
        Ok(())
    }

    /// Insert a community post (seed path).
    pub async fn add_post(&self, post: &CommunityPost) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO community_posts (id, user_id, content, created_at)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&post.id)
        .bind(&post.user_id)
        .bind(&post.content)
        .bind(post.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("post INSERT failed: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for SqliteStore {
    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError> {
        let row = sqlx::query("SELECT * FROM profiles WHERE id = ?1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("profile SELECT failed: {e}")))?;

        match row {
            Some(ref r) => Ok(Some(Self::row_to_profile(r)?)),
            None => Ok(None),
        }
    }

    async fn upsert_profile(&self, profile: UserProfile) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO profiles
                (id, name, age, profession, goals, plan, admin,
                 daily_interactions, last_interaction_date)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                age = excluded.age,
                profession = excluded.profession,
                goals = excluded.goals,
                plan = excluded.plan,
                admin = excluded.admin,
                daily_interactions = excluded.daily_interactions,
                last_interaction_date = excluded.last_interaction_date
            "#,
        )
        .bind(&profile.id)
        .bind(&profile.name)
        .bind(profile.age.map(|a| a as i64))
        .bind(&profile.profession)
        .bind(&profile.goals)
        .bind(profile.plan.as_str())
        .bind(profile.admin)
        .bind(profile.daily_interactions)
        .bind(
            profile
                .last_interaction_date
                .map(|d| d.format(DATE_FMT).to_string()),
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("profile INSERT failed: {e}")))?;
        Ok(())
    }

    async fn consume_interaction(
        &self,
        user_id: &str,
        today: NaiveDate,
        ceiling: i64,
        enforce_limit: bool,
    ) -> Result<Option<QuotaConsume>, StoreError> {
        let today_str = today.format(DATE_FMT).to_string();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Storage(format!("quota transaction begin: {e}")))?;

        // Opening with an UPDATE takes SQLite's write lock immediately, so
        // the read below cannot interleave with another consumer. This is
        // the lazy daily rollover.
        sqlx::query(
            "UPDATE profiles
             SET daily_interactions = ?1, last_interaction_date = ?2
             WHERE id = ?3
               AND (last_interaction_date IS NULL OR last_interaction_date != ?2)",
        )
        .bind(ceiling)
        .bind(&today_str)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Storage(format!("quota reset: {e}")))?;

        let row = sqlx::query("SELECT daily_interactions FROM profiles WHERE id = ?1")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| StoreError::Storage(format!("quota SELECT: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let remaining: i64 = row
            .try_get("daily_interactions")
            .map_err(|e| StoreError::Storage(format!("daily_interactions column: {e}")))?;

        if enforce_limit && remaining <= 0 {
            tx.commit()
                .await
                .map_err(|e| StoreError::Storage(format!("quota commit: {e}")))?;
            return Ok(Some(QuotaConsume {
                allowed: false,
                remaining: remaining.max(0),
            }));
        }

        // MAX keeps the counter at zero even for unenforced consumers
        sqlx::query(
            "UPDATE profiles
             SET daily_interactions = MAX(daily_interactions - 1, 0),
                 last_interaction_date = ?1
             WHERE id = ?2",
        )
        .bind(&today_str)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Storage(format!("quota decrement: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Storage(format!("quota commit: {e}")))?;

        Ok(Some(QuotaConsume {
            allowed: true,
            remaining: (remaining - 1).max(0),
        }))
    }
}

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn get_conversation(
        &self,
        id: &ConversationId,
    ) -> Result<Option<Conversation>, StoreError> {
        let row = sqlx::query("SELECT * FROM conversations WHERE id = ?1")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("conversation SELECT failed: {e}")))?;

        match row {
            Some(ref r) => Ok(Some(Self::row_to_conversation(r)?)),
            None => Ok(None),
        }
    }

    async fn create_conversation(&self, conversation: Conversation) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO conversations (id, user_id, created_at, updated_at, title)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&conversation.id.0)
        .bind(&conversation.user_id)
        .bind(conversation.created_at.to_rfc3339())
        .bind(conversation.updated_at.to_rfc3339())
        .bind(&conversation.title)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("conversation INSERT failed: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!(
                "conversation {} already exists",
                conversation.id
            )));
        }
        Ok(())
    }

    async fn append_message(&self, message: StoredMessage) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            "INSERT INTO messages (id, conversation_id, author, content, created_at)
             SELECT ?1, ?2, ?3, ?4, ?5
             WHERE EXISTS (SELECT 1 FROM conversations WHERE id = ?2)",
        )
        .bind(&message.id)
        .bind(&message.conversation_id.0)
        .bind(message.author.as_str())
        .bind(&message.content)
        .bind(message.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("message INSERT failed: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!(
                "conversation {}",
                message.conversation_id
            )));
        }

        sqlx::query("UPDATE conversations SET updated_at = ?1 WHERE id = ?2")
            .bind(&now)
            .bind(&message.conversation_id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Storage(format!("conversation touch failed: {e}")))?;

        Ok(())
    }

    async fn recent_messages(
        &self,
        conversation_id: &ConversationId,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        // Fetch the newest `limit` then flip back to ascending order
        let rows = sqlx::query(
            "SELECT * FROM messages
             WHERE conversation_id = ?1
             ORDER BY created_at DESC, iid DESC
             LIMIT ?2",
        )
        .bind(&conversation_id.0)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("messages SELECT failed: {e}")))?;

        let mut messages: Vec<StoredMessage> = rows
            .iter()
            .map(Self::row_to_message)
            .collect::<Result<_, _>>()?;
        messages.reverse();
        Ok(messages)
    }
}

#[async_trait]
impl KnowledgeStore for SqliteStore {
    async fn active_documents(&self, limit: usize) -> Result<Vec<KnowledgeDocument>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM knowledge_documents
             WHERE active = 1
             ORDER BY created_at DESC
             LIMIT ?1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("documents SELECT failed: {e}")))?;

        rows.iter().map(Self::row_to_document).collect()
    }
}

#[async_trait]
impl CommunityStore for SqliteStore {
    async fn recent_posts_by(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<CommunityPost>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM community_posts
             WHERE user_id = ?1
             ORDER BY created_at DESC
             LIMIT ?2",
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("posts SELECT failed: {e}")))?;

        rows.iter().map(Self::row_to_post).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    async fn test_store() -> (SqliteStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clara-test.db");
        let store = SqliteStore::new(path.to_str().unwrap()).await.unwrap();
        (store, dir)
    }

    fn test_profile(id: &str) -> UserProfile {
        UserProfile::new(id, "Ana")
    }

    #[tokio::test]
    async fn profile_round_trip() {
        let (store, _dir) = test_store().await;
        let mut profile = test_profile("u1");
        profile.age = Some(34);
        profile.profession = Some("enfermeira".into());
        profile.goals = Some("dormir melhor".into());
        profile.plan = Plan::Premium;
        store.upsert_profile(profile).await.unwrap();

        let fetched = store.get_profile("u1").await.unwrap().unwrap();
        assert_eq!(fetched.name, "Ana");
        assert_eq!(fetched.age, Some(34));
        assert_eq!(fetched.plan, Plan::Premium);
        assert!(store.get_profile("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_replaces_existing_profile() {
        let (store, _dir) = test_store().await;
        store.upsert_profile(test_profile("u1")).await.unwrap();

        let mut updated = test_profile("u1");
        updated.name = "Ana Paula".into();
        updated.daily_interactions = 9;
        store.upsert_profile(updated).await.unwrap();

        let fetched = store.get_profile("u1").await.unwrap().unwrap();
        assert_eq!(fetched.name, "Ana Paula");
        assert_eq!(fetched.daily_interactions, 9);
    }

    #[tokio::test]
    async fn consume_resets_on_first_ever_interaction() {
        let (store, _dir) = test_store().await;
        store.upsert_profile(test_profile("u1")).await.unwrap();

        let today = NaiveDate::from_ymd_opt(2026, 8, 30).unwrap();
        let outcome = store
            .consume_interaction("u1", today, 15, true)
            .await
            .unwrap()
            .unwrap();
        assert!(outcome.allowed);
        assert_eq!(outcome.remaining, 14);

        let profile = store.get_profile("u1").await.unwrap().unwrap();
        assert_eq!(profile.last_interaction_date, Some(today));
    }

    #[tokio::test]
    async fn consume_resets_on_stale_date() {
        let (store, _dir) = test_store().await;
        let mut profile = test_profile("u1");
        profile.daily_interactions = 1;
        profile.last_interaction_date = NaiveDate::from_ymd_opt(2026, 8, 29);
        store.upsert_profile(profile).await.unwrap();

        let today = NaiveDate::from_ymd_opt(2026, 8, 30).unwrap();
        let outcome = store
            .consume_interaction("u1", today, 15, true)
            .await
            .unwrap()
            .unwrap();
        assert!(outcome.allowed);
        assert_eq!(outcome.remaining, 14);
    }

    #[tokio::test]
    async fn consume_blocks_at_zero() {
        let (store, _dir) = test_store().await;
        let today = NaiveDate::from_ymd_opt(2026, 8, 30).unwrap();
        let mut profile = test_profile("u1");
        profile.daily_interactions = 1;
        profile.last_interaction_date = Some(today);
        store.upsert_profile(profile).await.unwrap();

        let first = store
            .consume_interaction("u1", today, 15, true)
            .await
            .unwrap()
            .unwrap();
        assert!(first.allowed);
        assert_eq!(first.remaining, 0);

        let second = store
            .consume_interaction("u1", today, 15, true)
            .await
            .unwrap()
            .unwrap();
        assert!(!second.allowed);
        assert_eq!(second.remaining, 0);

        let profile = store.get_profile("u1").await.unwrap().unwrap();
        assert_eq!(profile.daily_interactions, 0);
    }

    #[tokio::test]
    async fn consume_unenforced_allows_and_floors_at_zero() {
        let (store, _dir) = test_store().await;
        let today = NaiveDate::from_ymd_opt(2026, 8, 30).unwrap();
        let mut profile = test_profile("u1");
        profile.daily_interactions = 0;
        profile.last_interaction_date = Some(today);
        store.upsert_profile(profile).await.unwrap();

        let outcome = store
            .consume_interaction("u1", today, 1_000_000, false)
            .await
            .unwrap()
            .unwrap();
        assert!(outcome.allowed);
        assert_eq!(outcome.remaining, 0);

        let profile = store.get_profile("u1").await.unwrap().unwrap();
        assert_eq!(profile.daily_interactions, 0);
    }

    #[tokio::test]
    async fn consume_missing_profile() {
        let (store, _dir) = test_store().await;
        let today = NaiveDate::from_ymd_opt(2026, 8, 30).unwrap();
        let outcome = store
            .consume_interaction("missing", today, 15, true)
            .await
            .unwrap();
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn conversation_round_trip() {
        let (store, _dir) = test_store().await;
        let conv = Conversation::new("u1");
        let id = conv.id.clone();
        store.create_conversation(conv).await.unwrap();

        let fetched = store.get_conversation(&id).await.unwrap().unwrap();
        assert_eq!(fetched.user_id, "u1");
        assert!(fetched.title.is_none());
    }

    #[tokio::test]
    async fn duplicate_conversation_rejected() {
        let (store, _dir) = test_store().await;
        let conv = Conversation::new("u1");
        store.create_conversation(conv.clone()).await.unwrap();
        let err = store.create_conversation(conv).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn append_requires_existing_conversation() {
        let (store, _dir) = test_store().await;
        let msg = StoredMessage::user(ConversationId::from("nope"), "oi");
        let err = store.append_message(msg).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn recent_messages_tail_ascending() {
        let (store, _dir) = test_store().await;
        let conv = Conversation::new("u1");
        let conv_id = conv.id.clone();
        store.create_conversation(conv).await.unwrap();

        let base = Utc::now();
        for i in 0..20 {
            let mut msg = StoredMessage::user(conv_id.clone(), format!("msg {i}"));
            msg.created_at = base + Duration::seconds(i);
            store.append_message(msg).await.unwrap();
        }

        let messages = store.recent_messages(&conv_id, 5).await.unwrap();
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[0].content, "msg 15");
        assert_eq!(messages[4].content, "msg 19");
        assert_eq!(messages[0].author, Author::User);
    }

    #[tokio::test]
    async fn active_documents_bounded_and_newest_first() {
        let (store, _dir) = test_store().await;
        let now = Utc::now();
        for i in 0..5 {
            let mut doc = KnowledgeDocument::new(format!("Doc {i}"), "resumo", "conteúdo");
            doc.created_at = now + Duration::seconds(i);
            store.add_document(&doc).await.unwrap();
        }
        let mut inactive = KnowledgeDocument::new("Inativo", "resumo", "conteúdo");
        inactive.active = false;
        store.add_document(&inactive).await.unwrap();

        let docs = store.active_documents(3).await.unwrap();
        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0].title, "Doc 4");
        assert!(docs.iter().all(|d| d.active));
    }

    #[tokio::test]
    async fn community_posts_filtered_by_author() {
        let (store, _dir) = test_store().await;
        store
            .add_post(&CommunityPost::new("u1", "meu post"))
            .await
            .unwrap();
        store
            .add_post(&CommunityPost::new("u2", "outro autor"))
            .await
            .unwrap();

        let posts = store.recent_posts_by("u1", 5).await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].content, "meu post");
    }
}
