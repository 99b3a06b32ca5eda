//! Question and answer repository
//!
//! Questions are always written together with their answers. Each write
//! runs in a single transaction: if any statement fails, nothing is kept.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Answer, AnswerChanges, AnswerInput, Question, QuestionInput, QuestionKind};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySql, Row, Sqlite, Transaction};
use std::sync::Arc;

/// Question repository trait
#[async_trait]
pub trait QuestionRepository: Send + Sync {
    async fn get_by_id(&self, id: i64) -> Result<Option<Question>>;

    /// Get a question only if it belongs to the given quiz
    async fn get_in_quiz(&self, quiz_id: i64, id: i64) -> Result<Option<Question>>;

    /// Questions of a quiz, by `order` then id
    async fn list_by_quiz(&self, quiz_id: i64) -> Result<Vec<Question>>;

    /// Answers of a question, by `order` then id
    async fn list_answers(&self, question_id: i64) -> Result<Vec<Answer>>;

    /// Answers of every question in a quiz, by question then `order`
    async fn list_answers_for_quiz(&self, quiz_id: i64) -> Result<Vec<Answer>>;

    /// Insert a question and all its answers atomically
    async fn create_with_answers(
        &self,
        quiz_id: i64,
        input: &QuestionInput,
        answers: &[AnswerInput],
    ) -> Result<Question>;

    /// Update a question and apply answer inserts, updates and deletions
    /// atomically
    async fn update_with_answers(
        &self,
        id: i64,
        input: &QuestionInput,
        changes: &AnswerChanges,
    ) -> Result<Question>;

    /// Insert or update answers of an existing question atomically.
    /// Returns the number of rows written.
    async fn save_answers(&self, question_id: i64, answers: &[AnswerInput]) -> Result<usize>;

    /// Hard delete; answers cascade
    async fn delete(&self, id: i64) -> Result<bool>;
}

/// SQLx-based question repository implementation
pub struct SqlxQuestionRepository {
    pool: DynDatabasePool,
}

impl SqlxQuestionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn QuestionRepository> {
        Arc::new(Self::new(pool))
    }
}

const QUESTION_COLUMNS: &str =
    "id, quiz_id, kind, sort_order, prompt, shuffle_answers, created_at";

const ANSWER_COLUMNS: &str = "a.id, a.question_id, a.sort_order, a.text, a.correct";

#[async_trait]
impl QuestionRepository for SqlxQuestionRepository {
    async fn get_by_id(&self, id: i64) -> Result<Option<Question>> {
        let sql = format!("SELECT {} FROM questions WHERE id = ?", QUESTION_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get question")?;
                row.as_ref().map(row_to_question_sqlite).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get question")?;
                row.as_ref().map(row_to_question_mysql).transpose()
            }
        }
    }

    async fn get_in_quiz(&self, quiz_id: i64, id: i64) -> Result<Option<Question>> {
        let sql = format!(
            "SELECT {} FROM questions WHERE id = ? AND quiz_id = ?",
            QUESTION_COLUMNS
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .bind(quiz_id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get question")?;
                row.as_ref().map(row_to_question_sqlite).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .bind(quiz_id)
                    .fetch_optional(self.pool.mysql()?)
                    .await
                    .context("Failed to get question")?;
                row.as_ref().map(row_to_question_mysql).transpose()
            }
        }
    }

    async fn list_by_quiz(&self, quiz_id: i64) -> Result<Vec<Question>> {
        let sql = format!(
            "SELECT {} FROM questions WHERE quiz_id = ? ORDER BY sort_order, id",
            QUESTION_COLUMNS
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(&sql)
                    .bind(quiz_id)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list questions")?;
                rows.iter().map(row_to_question_sqlite).collect()
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(&sql)
                    .bind(quiz_id)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list questions")?;
                rows.iter().map(row_to_question_mysql).collect()
            }
        }
    }

    async fn list_answers(&self, question_id: i64) -> Result<Vec<Answer>> {
        let sql = format!(
            "SELECT {} FROM answers a WHERE a.question_id = ? ORDER BY a.sort_order, a.id",
            ANSWER_COLUMNS
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(&sql)
                    .bind(question_id)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list answers")?;
                Ok(rows.iter().map(row_to_answer_sqlite).collect())
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(&sql)
                    .bind(question_id)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list answers")?;
                Ok(rows.iter().map(row_to_answer_mysql).collect())
            }
        }
    }

    async fn list_answers_for_quiz(&self, quiz_id: i64) -> Result<Vec<Answer>> {
        let sql = format!(
            r#"SELECT {} FROM answers a
               JOIN questions q ON q.id = a.question_id
               WHERE q.quiz_id = ?
               ORDER BY a.question_id, a.sort_order, a.id"#,
            ANSWER_COLUMNS
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(&sql)
                    .bind(quiz_id)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list quiz answers")?;
                Ok(rows.iter().map(row_to_answer_sqlite).collect())
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(&sql)
                    .bind(quiz_id)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list quiz answers")?;
                Ok(rows.iter().map(row_to_answer_mysql).collect())
            }
        }
    }

    async fn create_with_answers(
        &self,
        quiz_id: i64,
        input: &QuestionInput,
        answers: &[AnswerInput],
    ) -> Result<Question> {
        let now = Utc::now();
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut tx = self.pool.sqlite()?.begin().await?;
                let id = insert_question_sqlite(&mut tx, quiz_id, input, now).await?;
                for answer in answers {
                    upsert_answer_sqlite(&mut tx, id, answer).await?;
                }
                tx.commit().await.context("Failed to commit question")?;
                id
            }
            DatabaseDriver::Mysql => {
                let mut tx = self.pool.mysql()?.begin().await?;
                let id = insert_question_mysql(&mut tx, quiz_id, input, now).await?;
                for answer in answers {
                    upsert_answer_mysql(&mut tx, id, answer).await?;
                }
                tx.commit().await.context("Failed to commit question")?;
                id
            }
        };

        Ok(Question {
            id,
            quiz_id,
            order: input.order,
            prompt: input.prompt.clone(),
            kind: input.kind,
            created_at: now,
        })
    }

    async fn update_with_answers(
        &self,
        id: i64,
        input: &QuestionInput,
        changes: &AnswerChanges,
    ) -> Result<Question> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut tx = self.pool.sqlite()?.begin().await?;
                update_question_sqlite(&mut tx, id, input).await?;
                for answer_id in &changes.delete {
                    sqlx::query("DELETE FROM answers WHERE id = ? AND question_id = ?")
                        .bind(answer_id)
                        .bind(id)
                        .execute(&mut *tx)
                        .await
                        .context("Failed to delete answer")?;
                }
                for answer in &changes.save {
                    upsert_answer_sqlite(&mut tx, id, answer).await?;
                }
                tx.commit().await.context("Failed to commit question")?;
            }
            DatabaseDriver::Mysql => {
                let mut tx = self.pool.mysql()?.begin().await?;
                update_question_mysql(&mut tx, id, input).await?;
                for answer_id in &changes.delete {
                    sqlx::query("DELETE FROM answers WHERE id = ? AND question_id = ?")
                        .bind(answer_id)
                        .bind(id)
                        .execute(&mut *tx)
                        .await
                        .context("Failed to delete answer")?;
                }
                for answer in &changes.save {
                    upsert_answer_mysql(&mut tx, id, answer).await?;
                }
                tx.commit().await.context("Failed to commit question")?;
            }
        }

        self.get_by_id(id)
            .await?
            .with_context(|| format!("Question {} vanished after update", id))
    }

    async fn save_answers(&self, question_id: i64, answers: &[AnswerInput]) -> Result<usize> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut tx = self.pool.sqlite()?.begin().await?;
                for answer in answers {
                    upsert_answer_sqlite(&mut tx, question_id, answer).await?;
                }
                tx.commit().await.context("Failed to commit answers")?;
            }
            DatabaseDriver::Mysql => {
                let mut tx = self.pool.mysql()?.begin().await?;
                for answer in answers {
                    upsert_answer_mysql(&mut tx, question_id, answer).await?;
                }
                tx.commit().await.context("Failed to commit answers")?;
            }
        }
        Ok(answers.len())
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM questions WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete question")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete question")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn insert_question_sqlite(
    tx: &mut Transaction<'_, Sqlite>,
    quiz_id: i64,
    input: &QuestionInput,
    now: chrono::DateTime<Utc>,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO questions (quiz_id, kind, sort_order, prompt, shuffle_answers, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(quiz_id)
    .bind(input.kind.code())
    .bind(input.order)
    .bind(&input.prompt)
    .bind(input.kind.shuffle_answers())
    .bind(now)
    .execute(&mut **tx)
    .await
    .context("Failed to create question")?;

    Ok(result.last_insert_rowid())
}

async fn update_question_sqlite(
    tx: &mut Transaction<'_, Sqlite>,
    id: i64,
    input: &QuestionInput,
) -> Result<()> {
    // The kind is fixed at creation; only its options change.
    let affected = sqlx::query(
        "UPDATE questions SET sort_order = ?, prompt = ?, shuffle_answers = ? WHERE id = ?",
    )
    .bind(input.order)
    .bind(&input.prompt)
    .bind(input.kind.shuffle_answers())
    .bind(id)
    .execute(&mut **tx)
    .await
    .context("Failed to update question")?
    .rows_affected();

    if affected == 0 {
        bail!("Question {} not found", id);
    }
    Ok(())
}

async fn upsert_answer_sqlite(
    tx: &mut Transaction<'_, Sqlite>,
    question_id: i64,
    answer: &AnswerInput,
) -> Result<()> {
    match answer.id {
        Some(answer_id) => {
            let owned: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM answers WHERE id = ? AND question_id = ?")
                    .bind(answer_id)
                    .bind(question_id)
                    .fetch_one(&mut **tx)
                    .await
                    .context("Failed to look up answer")?;
            if owned == 0 {
                bail!("Answer {} does not belong to question {}", answer_id, question_id);
            }
            sqlx::query("UPDATE answers SET sort_order = ?, text = ?, correct = ? WHERE id = ?")
                .bind(answer.order)
                .bind(&answer.text)
                .bind(answer.correct)
                .bind(answer_id)
                .execute(&mut **tx)
                .await
                .context("Failed to update answer")?;
        }
        None => {
            sqlx::query(
                "INSERT INTO answers (question_id, sort_order, text, correct) VALUES (?, ?, ?, ?)",
            )
            .bind(question_id)
            .bind(answer.order)
            .bind(&answer.text)
            .bind(answer.correct)
            .execute(&mut **tx)
            .await
            .context("Failed to create answer")?;
        }
    }
    Ok(())
}

fn row_to_question_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Question> {
    let kind: String = row.get("kind");
    Ok(Question {
        id: row.get("id"),
        quiz_id: row.get("quiz_id"),
        order: row.get("sort_order"),
        prompt: row.get("prompt"),
        kind: QuestionKind::from_columns(&kind, row.get("shuffle_answers"))?,
        created_at: row.get("created_at"),
    })
}

fn row_to_answer_sqlite(row: &sqlx::sqlite::SqliteRow) -> Answer {
    Answer {
        id: row.get("id"),
        question_id: row.get("question_id"),
        order: row.get("sort_order"),
        text: row.get("text"),
        correct: row.get("correct"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn insert_question_mysql(
    tx: &mut Transaction<'_, MySql>,
    quiz_id: i64,
    input: &QuestionInput,
    now: chrono::DateTime<Utc>,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO questions (quiz_id, kind, sort_order, prompt, shuffle_answers, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(quiz_id)
    .bind(input.kind.code())
    .bind(input.order)
    .bind(&input.prompt)
    .bind(input.kind.shuffle_answers())
    .bind(now)
    .execute(&mut **tx)
    .await
    .context("Failed to create question")?;

    Ok(result.last_insert_id() as i64)
}

async fn update_question_mysql(
    tx: &mut Transaction<'_, MySql>,
    id: i64,
    input: &QuestionInput,
) -> Result<()> {
    let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM questions WHERE id = ?")
        .bind(id)
        .fetch_one(&mut **tx)
        .await
        .context("Failed to look up question")?;
    if exists == 0 {
        bail!("Question {} not found", id);
    }

    sqlx::query("UPDATE questions SET sort_order = ?, prompt = ?, shuffle_answers = ? WHERE id = ?")
        .bind(input.order)
        .bind(&input.prompt)
        .bind(input.kind.shuffle_answers())
        .bind(id)
        .execute(&mut **tx)
        .await
        .context("Failed to update question")?;
    Ok(())
}

async fn upsert_answer_mysql(
    tx: &mut Transaction<'_, MySql>,
    question_id: i64,
    answer: &AnswerInput,
) -> Result<()> {
    match answer.id {
        Some(answer_id) => {
            let owned: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM answers WHERE id = ? AND question_id = ?")
                    .bind(answer_id)
                    .bind(question_id)
                    .fetch_one(&mut **tx)
                    .await
                    .context("Failed to look up answer")?;
            if owned == 0 {
                bail!("Answer {} does not belong to question {}", answer_id, question_id);
            }
            sqlx::query("UPDATE answers SET sort_order = ?, text = ?, correct = ? WHERE id = ?")
                .bind(answer.order)
                .bind(&answer.text)
                .bind(answer.correct)
                .bind(answer_id)
                .execute(&mut **tx)
                .await
                .context("Failed to update answer")?;
        }
        None => {
            sqlx::query(
                "INSERT INTO answers (question_id, sort_order, text, correct) VALUES (?, ?, ?, ?)",
            )
            .bind(question_id)
            .bind(answer.order)
            .bind(&answer.text)
            .bind(answer.correct)
            .execute(&mut **tx)
            .await
            .context("Failed to create answer")?;
        }
    }
    Ok(())
}

fn row_to_question_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Question> {
    let kind: String = row.get("kind");
    Ok(Question {
        id: row.get("id"),
        quiz_id: row.get("quiz_id"),
        order: row.get("sort_order"),
        prompt: row.get("prompt"),
        kind: QuestionKind::from_columns(&kind, row.get("shuffle_answers"))?,
        created_at: row.get("created_at"),
    })
}

fn row_to_answer_mysql(row: &sqlx::mysql::MySqlRow) -> Answer {
    Answer {
        id: row.get("id"),
        question_id: row.get("question_id"),
        order: row.get("sort_order"),
        text: row.get("text"),
        correct: row.get("correct"),
    }
}
