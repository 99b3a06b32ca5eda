//! Text step repository
//!
//! Database operations for text lessons. The `order` field is stored in
//! the `sort_order` column.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Text, TextInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Text repository trait
#[async_trait]
pub trait TextRepository: Send + Sync {
    async fn create(&self, input: &TextInput) -> Result<Text>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Text>>;

    /// Get a text by id, only when it belongs to the given published course
    async fn get_in_published_course(&self, course_id: i64, id: i64) -> Result<Option<Text>>;

    async fn update(&self, id: i64, input: &TextInput) -> Result<Option<Text>>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Texts of a course, by `order` then id
    async fn list_by_course(&self, course_id: i64) -> Result<Vec<Text>>;

    /// Texts of several courses in one query, by course then `order`
    async fn list_by_courses(&self, course_ids: &[i64]) -> Result<Vec<Text>>;
}

/// SQLx-based text repository implementation
pub struct SqlxTextRepository {
    pool: DynDatabasePool,
}

impl SqlxTextRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TextRepository> {
        Arc::new(Self::new(pool))
    }
}

const TEXT_COLUMNS: &str =
    "t.id, t.course_id, t.title, t.description, t.sort_order, t.content, t.created_at";

#[async_trait]
impl TextRepository for SqlxTextRepository {
    async fn create(&self, input: &TextInput) -> Result<Text> {
        let sql = r#"
            INSERT INTO texts (course_id, title, description, sort_order, content, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
        "#;
        let now = Utc::now();
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(input.course_id)
                .bind(&input.title)
                .bind(&input.description)
                .bind(input.order)
                .bind(&input.content)
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to create text")?
                .last_insert_rowid(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(input.course_id)
                .bind(&input.title)
                .bind(&input.description)
                .bind(input.order)
                .bind(&input.content)
                .bind(now)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to create text")?
                .last_insert_id() as i64,
        };

        Ok(Text {
            id,
            course_id: input.course_id,
            title: input.title.clone(),
            description: input.description.clone(),
            order: input.order,
            content: input.content.clone(),
            created_at: now,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Text>> {
        let sql = format!("SELECT {} FROM texts t WHERE t.id = ?", TEXT_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get text")?;
                Ok(row.as_ref().map(row_to_text_sqlite))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get text")?;
                Ok(row.as_ref().map(row_to_text_mysql))
            }
        }
    }

    async fn get_in_published_course(&self, course_id: i64, id: i64) -> Result<Option<Text>> {
        let sql = format!(
            r#"SELECT {} FROM texts t
               JOIN courses c ON c.id = t.course_id
               WHERE t.id = ? AND t.course_id = ? AND c.published = 1"#,
            TEXT_COLUMNS
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .bind(course_id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get text")?;
                Ok(row.as_ref().map(row_to_text_sqlite))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .bind(course_id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get text")?;
                Ok(row.as_ref().map(row_to_text_mysql))
            }
        }
    }

    async fn update(&self, id: i64, input: &TextInput) -> Result<Option<Text>> {
        let sql = r#"
            UPDATE texts
            SET course_id = ?, title = ?, description = ?, sort_order = ?, content = ?
            WHERE id = ?
        "#;
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                update_text_sqlite(self.pool.sqlite()?, sql, id, input).await?;
            }
            DatabaseDriver::Mysql => {
                update_text_mysql(self.pool.mysql()?, sql, id, input).await?;
            }
        }
        self.get_by_id(id).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM texts WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete text")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete text")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn list_by_course(&self, course_id: i64) -> Result<Vec<Text>> {
        let sql = format!(
            "SELECT {} FROM texts t WHERE t.course_id = ? ORDER BY t.sort_order, t.id",
            TEXT_COLUMNS
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(&sql)
                    .bind(course_id)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list texts")?;
                Ok(rows.iter().map(row_to_text_sqlite).collect())
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(&sql)
                    .bind(course_id)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list texts")?;
                Ok(rows.iter().map(row_to_text_mysql).collect())
            }
        }
    }

    async fn list_by_courses(&self, course_ids: &[i64]) -> Result<Vec<Text>> {
        if course_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; course_ids.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM texts t WHERE t.course_id IN ({}) ORDER BY t.course_id, t.sort_order, t.id",
            TEXT_COLUMNS, placeholders
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut query = sqlx::query(&sql);
                for id in course_ids {
                    query = query.bind(*id);
                }
                let rows = query
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list texts")?;
                Ok(rows.iter().map(row_to_text_sqlite).collect())
            }
            DatabaseDriver::Mysql => {
                let mut query = sqlx::query(&sql);
                for id in course_ids {
                    query = query.bind(*id);
                }
                let rows = query
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list texts")?;
                Ok(rows.iter().map(row_to_text_mysql).collect())
            }
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn update_text_sqlite(pool: &SqlitePool, sql: &str, id: i64, input: &TextInput) -> Result<()> {
    sqlx::query(sql)
        .bind(input.course_id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.order)
        .bind(&input.content)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update text")?;
    Ok(())
}

fn row_to_text_sqlite(row: &sqlx::sqlite::SqliteRow) -> Text {
    Text {
        id: row.get("id"),
        course_id: row.get("course_id"),
        title: row.get("title"),
        description: row.get("description"),
        order: row.get("sort_order"),
        content: row.get("content"),
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn update_text_mysql(pool: &MySqlPool, sql: &str, id: i64, input: &TextInput) -> Result<()> {
    sqlx::query(sql)
        .bind(input.course_id)
        .bind(&input.title)
        .bind(&input.description)
        .bind(input.order)
        .bind(&input.content)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to update text")?;
    Ok(())
}

fn row_to_text_mysql(row: &sqlx::mysql::MySqlRow) -> Text {
    Text {
        id: row.get("id"),
        course_id: row.get("course_id"),
        title: row.get("title"),
        description: row.get("description"),
        order: row.get("sort_order"),
        content: row.get("content"),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::course::test_support::*;

    fn input(course_id: i64, order: i32) -> TextInput {
        TextInput {
            course_id,
            title: format!("Lesson {}", order),
            description: "Read this".to_string(),
            order,
            content: "# Heading\n\nSome words here".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let pool = migrated_pool().await;
        let teacher = insert_user(&pool, "kenneth", "teacher").await;
        let course = insert_course(&pool, teacher, "C", "d", true, Utc::now()).await;
        let repo = SqlxTextRepository::new(pool);

        let created = repo.create(&input(course, 3)).await.unwrap();
        let found = repo.get_by_id(created.id).await.unwrap().unwrap();

        assert_eq!(found.order, 3);
        assert_eq!(found.content, "# Heading\n\nSome words here");
        assert_eq!(found.course_id, course);
    }

    #[tokio::test]
    async fn test_get_in_published_course_scoping() {
        let pool = migrated_pool().await;
        let teacher = insert_user(&pool, "kenneth", "teacher").await;
        let published = insert_course(&pool, teacher, "P", "d", true, Utc::now()).await;
        let other = insert_course(&pool, teacher, "O", "d", true, Utc::now()).await;
        let draft = insert_course(&pool, teacher, "D", "d", false, Utc::now()).await;
        let repo = SqlxTextRepository::new(pool);

        let text = repo.create(&input(published, 0)).await.unwrap();
        let hidden = repo.create(&input(draft, 0)).await.unwrap();

        assert!(repo.get_in_published_course(published, text.id).await.unwrap().is_some());
        assert!(repo.get_in_published_course(other, text.id).await.unwrap().is_none());
        assert!(repo.get_in_published_course(draft, hidden.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_delete_and_list_order() {
        let pool = migrated_pool().await;
        let teacher = insert_user(&pool, "kenneth", "teacher").await;
        let course = insert_course(&pool, teacher, "C", "d", true, Utc::now()).await;
        let repo = SqlxTextRepository::new(pool);

        let first = repo.create(&input(course, 5)).await.unwrap();
        let second = repo.create(&input(course, 1)).await.unwrap();

        let listed: Vec<i64> = repo.list_by_course(course).await.unwrap().iter().map(|t| t.id).collect();
        assert_eq!(listed, vec![second.id, first.id]);

        let mut changed = input(course, 0);
        changed.content = String::new();
        let updated = repo.update(first.id, &changed).await.unwrap().unwrap();
        assert_eq!(updated.order, 0);
        assert!(updated.content.is_empty());

        assert!(repo.delete(first.id).await.unwrap());
        assert!(repo.get_by_id(first.id).await.unwrap().is_none());
        assert!(repo.update(first.id, &changed).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_by_courses() {
        let pool = migrated_pool().await;
        let teacher = insert_user(&pool, "kenneth", "teacher").await;
        let first = insert_course(&pool, teacher, "A", "d", true, Utc::now()).await;
        let second = insert_course(&pool, teacher, "B", "d", false, Utc::now()).await;
        let other = insert_course(&pool, teacher, "C", "d", true, Utc::now()).await;
        let repo = SqlxTextRepository::new(pool);

        repo.create(&input(first, 1)).await.unwrap();
        repo.create(&input(second, 0)).await.unwrap();
        repo.create(&input(other, 0)).await.unwrap();

        let texts = repo.list_by_courses(&[first, second]).await.unwrap();
        assert_eq!(texts.len(), 2);
        assert!(texts.iter().all(|t| t.course_id != other));
        assert!(repo.list_by_courses(&[]).await.unwrap().is_empty());
    }
}
