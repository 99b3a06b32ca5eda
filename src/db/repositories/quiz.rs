//! Quiz step repository

use crate::config::DatabaseDriver;
use crate::db::repositories::course::contains_pattern;
use crate::db::DynDatabasePool;
use crate::models::{Quiz, QuizInput, QuizListing};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Quiz repository trait
#[async_trait]
pub trait QuizRepository: Send + Sync {
    async fn create(&self, course_id: i64, input: &QuizInput) -> Result<Quiz>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Quiz>>;

    /// Get a quiz by id, only when it belongs to the given published course
    async fn get_in_published_course(&self, course_id: i64, id: i64) -> Result<Option<Quiz>>;

    /// Replace the editable fields of a quiz, possibly moving it to
    /// another course
    async fn update(&self, id: i64, course_id: i64, input: &QuizInput) -> Result<Option<Quiz>>;

    /// Hard delete; questions and answers cascade
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Quizzes of a course, by `order` then id
    async fn list_by_course(&self, course_id: i64) -> Result<Vec<Quiz>>;

    /// Every quiz with its course title, optionally filtered by a title
    /// substring
    async fn list_with_course(&self, search: Option<&str>) -> Result<Vec<QuizListing>>;
}

/// SQLx-based quiz repository implementation
pub struct SqlxQuizRepository {
    pool: DynDatabasePool,
}

impl SqlxQuizRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn QuizRepository> {
        Arc::new(Self::new(pool))
    }
}

const QUIZ_COLUMNS: &str =
    "q.id, q.course_id, q.title, q.description, q.sort_order, q.total_questions, q.created_at";

#[async_trait]
impl QuizRepository for SqlxQuizRepository {
    async fn create(&self, course_id: i64, input: &QuizInput) -> Result<Quiz> {
        let now = Utc::now();
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                create_quiz_sqlite(self.pool.sqlite()?, course_id, input, now).await?
            }
            DatabaseDriver::Mysql => {
                create_quiz_mysql(self.pool.mysql()?, course_id, input, now).await?
            }
        };

        Ok(Quiz {
            id,
            course_id,
            title: input.title.clone(),
            description: input.description.clone(),
            order: input.order,
            total_questions: input.total_questions,
            created_at: now,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Quiz>> {
        let sql = format!("SELECT {} FROM quizzes q WHERE q.id = ?", QUIZ_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get quiz")?;
                Ok(row.as_ref().map(row_to_quiz_sqlite))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get quiz")?;
                Ok(row.as_ref().map(row_to_quiz_mysql))
            }
        }
    }

    async fn get_in_published_course(&self, course_id: i64, id: i64) -> Result<Option<Quiz>> {
        let sql = format!(
            r#"SELECT {} FROM quizzes q
               JOIN courses c ON c.id = q.course_id
               WHERE q.id = ? AND q.course_id = ? AND c.published = 1"#,
            QUIZ_COLUMNS
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .bind(course_id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get quiz")?;
                Ok(row.as_ref().map(row_to_quiz_sqlite))
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .bind(course_id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get quiz")?;
                Ok(row.as_ref().map(row_to_quiz_mysql))
            }
        }
    }

    async fn update(&self, id: i64, course_id: i64, input: &QuizInput) -> Result<Option<Quiz>> {
        let sql = r#"
            UPDATE quizzes
            SET course_id = ?, title = ?, description = ?, sort_order = ?, total_questions = ?
            WHERE id = ?
        "#;
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(course_id)
                    .bind(&input.title)
                    .bind(&input.description)
                    .bind(input.order)
                    .bind(input.total_questions)
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to update quiz")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(course_id)
                    .bind(&input.title)
                    .bind(&input.description)
                    .bind(input.order)
                    .bind(input.total_questions)
                    .bind(id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to update quiz")?;
            }
        }
        self.get_by_id(id).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM quizzes WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete quiz")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete quiz")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn list_by_course(&self, course_id: i64) -> Result<Vec<Quiz>> {
        let sql = format!(
            "SELECT {} FROM quizzes q WHERE q.course_id = ? ORDER BY q.sort_order, q.id",
            QUIZ_COLUMNS
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(&sql)
                    .bind(course_id)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list quizzes")?;
                Ok(rows.iter().map(row_to_quiz_sqlite).collect())
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(&sql)
                    .bind(course_id)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list quizzes")?;
                Ok(rows.iter().map(row_to_quiz_mysql).collect())
            }
        }
    }

    async fn list_with_course(&self, search: Option<&str>) -> Result<Vec<QuizListing>> {
        let pattern = search.map(contains_pattern);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let sql = format!(
                    r#"SELECT {}, c.title AS course_title FROM quizzes q
                       JOIN courses c ON c.id = q.course_id
                       WHERE (? IS NULL OR LOWER(q.title) LIKE ? ESCAPE '\')
                       ORDER BY c.title, q.sort_order, q.id"#,
                    QUIZ_COLUMNS
                );
                let rows = sqlx::query(&sql)
                    .bind(&pattern)
                    .bind(&pattern)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list quizzes")?;
                Ok(rows
                    .iter()
                    .map(|row| QuizListing {
                        quiz: row_to_quiz_sqlite(row),
                        course_title: row.get("course_title"),
                    })
                    .collect())
            }
            DatabaseDriver::Mysql => {
                let sql = format!(
                    r#"SELECT {}, c.title AS course_title FROM quizzes q
                       JOIN courses c ON c.id = q.course_id
                       WHERE (? IS NULL OR LOWER(q.title) LIKE ?)
                       ORDER BY c.title, q.sort_order, q.id"#,
                    QUIZ_COLUMNS
                );
                let rows = sqlx::query(&sql)
                    .bind(&pattern)
                    .bind(&pattern)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list quizzes")?;
                Ok(rows
                    .iter()
                    .map(|row| QuizListing {
                        quiz: row_to_quiz_mysql(row),
                        course_title: row.get("course_title"),
                    })
                    .collect())
            }
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_quiz_sqlite(
    pool: &SqlitePool,
    course_id: i64,
    input: &QuizInput,
    now: chrono::DateTime<Utc>,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO quizzes (course_id, title, description, sort_order, total_questions, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(course_id)
    .bind(&input.title)
    .bind(&input.description)
    .bind(input.order)
    .bind(input.total_questions)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create quiz")?;

    Ok(result.last_insert_rowid())
}

fn row_to_quiz_sqlite(row: &sqlx::sqlite::SqliteRow) -> Quiz {
    Quiz {
        id: row.get("id"),
        course_id: row.get("course_id"),
        title: row.get("title"),
        description: row.get("description"),
        order: row.get("sort_order"),
        total_questions: row.get("total_questions"),
        created_at: row.get("created_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_quiz_mysql(
    pool: &MySqlPool,
    course_id: i64,
    input: &QuizInput,
    now: chrono::DateTime<Utc>,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO quizzes (course_id, title, description, sort_order, total_questions, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(course_id)
    .bind(&input.title)
    .bind(&input.description)
    .bind(input.order)
    .bind(input.total_questions)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create quiz")?;

    Ok(result.last_insert_id() as i64)
}

fn row_to_quiz_mysql(row: &sqlx::mysql::MySqlRow) -> Quiz {
    Quiz {
        id: row.get("id"),
        course_id: row.get("course_id"),
        title: row.get("title"),
        description: row.get("description"),
        order: row.get("sort_order"),
        total_questions: row.get("total_questions"),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::course::test_support::*;

    fn input(title: &str, order: i32) -> QuizInput {
        QuizInput {
            title: title.to_string(),
            description: "Check yourself".to_string(),
            order,
            total_questions: 4,
        }
    }

    #[tokio::test]
    async fn test_create_and_scope_to_published_course() {
        let pool = migrated_pool().await;
        let teacher = insert_user(&pool, "kenneth", "teacher").await;
        let course = insert_course(&pool, teacher, "C", "d", true, Utc::now()).await;
        let draft = insert_course(&pool, teacher, "D", "d", false, Utc::now()).await;
        let repo = SqlxQuizRepository::new(pool);

        let quiz = repo.create(course, &input("Basics", 1)).await.unwrap();
        let hidden = repo.create(draft, &input("Hidden", 1)).await.unwrap();

        assert_eq!(quiz.total_questions, 4);
        assert!(repo.get_in_published_course(course, quiz.id).await.unwrap().is_some());
        assert!(repo.get_in_published_course(draft, quiz.id).await.unwrap().is_none());
        assert!(repo.get_in_published_course(draft, hidden.id).await.unwrap().is_none());
        assert!(repo.get_by_id(hidden.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update() {
        let pool = migrated_pool().await;
        let teacher = insert_user(&pool, "kenneth", "teacher").await;
        let course = insert_course(&pool, teacher, "C", "d", true, Utc::now()).await;
        let repo = SqlxQuizRepository::new(pool);
        let quiz = repo.create(course, &input("Basics", 1)).await.unwrap();

        let mut changed = input("Advanced", 2);
        changed.total_questions = 10;
        let updated = repo.update(quiz.id, course, &changed).await.unwrap().unwrap();

        assert_eq!(updated.title, "Advanced");
        assert_eq!(updated.order, 2);
        assert_eq!(updated.total_questions, 10);
        assert_eq!(updated.course_id, course);
    }

    #[tokio::test]
    async fn test_update_moves_quiz_and_delete_cascades() {
        let pool = migrated_pool().await;
        let teacher = insert_user(&pool, "kenneth", "teacher").await;
        let first = insert_course(&pool, teacher, "First", "d", true, Utc::now()).await;
        let second = insert_course(&pool, teacher, "Second", "d", false, Utc::now()).await;
        let repo = SqlxQuizRepository::new(pool.clone());
        let quiz = repo.create(first, &input("Basics", 1)).await.unwrap();

        let moved = repo.update(quiz.id, second, &input("Basics", 1)).await.unwrap().unwrap();
        assert_eq!(moved.course_id, second);
        assert!(repo.list_by_course(first).await.unwrap().is_empty());

        sqlx::query("INSERT INTO questions (quiz_id, kind, sort_order, prompt, shuffle_answers, created_at) VALUES (?, 'tf', 0, 'Q', 0, ?)")
            .bind(quiz.id)
            .bind(Utc::now())
            .execute(pool.sqlite().unwrap())
            .await
            .unwrap();

        assert!(repo.delete(quiz.id).await.unwrap());
        assert!(!repo.delete(quiz.id).await.unwrap());
        assert!(repo.get_by_id(quiz.id).await.unwrap().is_none());
        let questions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM questions")
            .fetch_one(pool.sqlite().unwrap())
            .await
            .unwrap();
        assert_eq!(questions, 0);
    }

    #[tokio::test]
    async fn test_list_with_course_search() {
        let pool = migrated_pool().await;
        let teacher = insert_user(&pool, "kenneth", "teacher").await;
        let course = insert_course(&pool, teacher, "Python", "d", true, Utc::now()).await;
        let repo = SqlxQuizRepository::new(pool);
        repo.create(course, &input("Loops Quiz", 1)).await.unwrap();
        repo.create(course, &input("Functions Quiz", 2)).await.unwrap();

        let all = repo.list_with_course(None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].course_title, "Python");

        let loops = repo.list_with_course(Some("loop")).await.unwrap();
        assert_eq!(loops.len(), 1);
        assert_eq!(loops[0].quiz.title, "Loops Quiz");
    }
}
