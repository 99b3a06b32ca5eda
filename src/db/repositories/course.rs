//! Course repository
//!
//! Database operations for courses.
//!
//! This module provides:
//! - `CourseRepository` trait defining the interface for course data access
//! - `SqlxCourseRepository` implementing the trait for SQLite and MySQL
//!
//! Every learner-facing query filters on `published`. Step totals are
//! computed in SQL with one count subquery per step table.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Course, CourseInput, CourseLink, CourseStatus, CourseSummary};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// Course repository trait
#[async_trait]
pub trait CourseRepository: Send + Sync {
    async fn create(&self, input: &CourseInput) -> Result<Course>;

    /// Get a course by ID, published or not
    async fn get_by_id(&self, id: i64) -> Result<Option<Course>>;

    /// Get a course by ID only if it is published
    async fn get_published(&self, id: i64) -> Result<Option<Course>>;

    /// Replace the editable fields of a course
    async fn update(&self, id: i64, input: &CourseInput) -> Result<Option<Course>>;

    /// Hard delete; steps, questions and answers cascade
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Published courses with their step totals
    async fn list_published(&self) -> Result<Vec<CourseSummary>>;

    /// Published courses owned by the given username
    async fn list_published_by_teacher(&self, username: &str) -> Result<Vec<CourseSummary>>;

    /// Published courses whose title or description contains `term`,
    /// ignoring case. `%` and `_` are matched literally.
    async fn search_published(&self, term: &str) -> Result<Vec<CourseSummary>>;

    /// The `limit` most recently created published courses
    async fn recent_published(&self, limit: i64) -> Result<Vec<CourseLink>>;

    /// All courses for the admin console, optionally narrowed by a search
    /// term (title or description) and an exact title
    async fn list_admin(&self, search: Option<&str>, title: Option<&str>) -> Result<Vec<Course>>;

    /// Distinct course titles, for the admin title filter
    async fn list_titles(&self) -> Result<Vec<String>>;

    async fn set_status(&self, id: i64, status: CourseStatus) -> Result<bool>;

    /// Force `status = p` and `is_live = true` on every given course
    async fn publish_many(&self, ids: &[i64]) -> Result<u64>;
}

/// SQLx-based course repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxCourseRepository {
    pool: DynDatabasePool,
}

impl SqlxCourseRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn CourseRepository> {
        Arc::new(Self::new(pool))
    }
}

const COURSE_SELECT: &str = r#"
    SELECT c.id, c.subject, c.title, c.description, c.teacher_id,
           u.username AS teacher_username, c.created_at, c.published,
           c.is_live, c.status
    FROM courses c
    JOIN users u ON u.id = c.teacher_id
"#;

const SUMMARY_SELECT: &str = r#"
    SELECT c.id, c.subject, c.title, c.description, c.teacher_id,
           u.username AS teacher_username, c.created_at, c.published,
           c.is_live, c.status,
           (SELECT COUNT(*) FROM texts t WHERE t.course_id = c.id)
             + (SELECT COUNT(*) FROM quizzes q WHERE q.course_id = c.id) AS total_steps
    FROM courses c
    JOIN users u ON u.id = c.teacher_id
"#;

/// Build a `LIKE` pattern matching `term` anywhere, with the wildcard
/// characters escaped by a backslash.
///
/// Only ASCII letters are folded, the same as SQLite's `LOWER()`, so
/// matching is case-insensitive for ASCII only: "ÉCOLE" finds "École" but
/// "école" does not.
pub(crate) fn contains_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.to_ascii_lowercase().chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

#[async_trait]
impl CourseRepository for SqlxCourseRepository {
    async fn create(&self, input: &CourseInput) -> Result<Course> {
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => create_course_sqlite(self.pool.sqlite()?, input).await?,
            DatabaseDriver::Mysql => create_course_mysql(self.pool.mysql()?, input).await?,
        };
        self.get_by_id(id)
            .await?
            .with_context(|| format!("Course {} vanished after insert", id))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Course>> {
        let sql = format!("{} WHERE c.id = ?", COURSE_SELECT);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => fetch_course_sqlite(self.pool.sqlite()?, &sql, id).await,
            DatabaseDriver::Mysql => fetch_course_mysql(self.pool.mysql()?, &sql, id).await,
        }
    }

    async fn get_published(&self, id: i64) -> Result<Option<Course>> {
        let sql = format!("{} WHERE c.id = ? AND c.published = 1", COURSE_SELECT);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => fetch_course_sqlite(self.pool.sqlite()?, &sql, id).await,
            DatabaseDriver::Mysql => fetch_course_mysql(self.pool.mysql()?, &sql, id).await,
        }
    }

    async fn update(&self, id: i64, input: &CourseInput) -> Result<Option<Course>> {
        let sql = r#"
            UPDATE courses
            SET subject = ?, title = ?, description = ?, teacher_id = ?, published = ?
            WHERE id = ?
        "#;
        // MySQL reports zero affected rows for a no-op update, so the
        // row is looked up again instead of trusting the count.
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(&input.subject)
                    .bind(&input.title)
                    .bind(&input.description)
                    .bind(input.teacher_id)
                    .bind(input.published)
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to update course")?;
            }
            DatabaseDriver::Mysql => {
                sqlx::query(sql)
                    .bind(&input.subject)
                    .bind(&input.title)
                    .bind(&input.description)
                    .bind(input.teacher_id)
                    .bind(input.published)
                    .bind(id)
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to update course")?;
            }
        }

        self.get_by_id(id).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM courses WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete course")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to delete course")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn list_published(&self) -> Result<Vec<CourseSummary>> {
        let sql = format!(
            "{} WHERE c.published = 1 ORDER BY c.created_at, c.id",
            SUMMARY_SELECT
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(&sql)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list published courses")?;
                rows.iter().map(row_to_summary_sqlite).collect()
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(&sql)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list published courses")?;
                rows.iter().map(row_to_summary_mysql).collect()
            }
        }
    }

    async fn list_published_by_teacher(&self, username: &str) -> Result<Vec<CourseSummary>> {
        let sql = format!(
            "{} WHERE c.published = 1 AND u.username = ? ORDER BY c.created_at, c.id",
            SUMMARY_SELECT
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(&sql)
                    .bind(username)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list courses by teacher")?;
                rows.iter().map(row_to_summary_sqlite).collect()
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(&sql)
                    .bind(username)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list courses by teacher")?;
                rows.iter().map(row_to_summary_mysql).collect()
            }
        }
    }

    async fn search_published(&self, term: &str) -> Result<Vec<CourseSummary>> {
        let pattern = contains_pattern(term);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let sql = format!(
                    r#"{} WHERE c.published = 1
                       AND (LOWER(c.title) LIKE ? ESCAPE '\' OR LOWER(c.description) LIKE ? ESCAPE '\')
                       ORDER BY c.created_at, c.id"#,
                    SUMMARY_SELECT
                );
                let rows = sqlx::query(&sql)
                    .bind(&pattern)
                    .bind(&pattern)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to search courses")?;
                rows.iter().map(row_to_summary_sqlite).collect()
            }
            DatabaseDriver::Mysql => {
                // backslash is already MySQL's default LIKE escape
                let sql = format!(
                    r#"{} WHERE c.published = 1
                       AND (LOWER(c.title) LIKE ? OR LOWER(c.description) LIKE ?)
                       ORDER BY c.created_at, c.id"#,
                    SUMMARY_SELECT
                );
                let rows = sqlx::query(&sql)
                    .bind(&pattern)
                    .bind(&pattern)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to search courses")?;
                rows.iter().map(row_to_summary_mysql).collect()
            }
        }
    }

    async fn recent_published(&self, limit: i64) -> Result<Vec<CourseLink>> {
        let sql = r#"
            SELECT id, title FROM courses
            WHERE published = 1
            ORDER BY created_at DESC, id DESC
            LIMIT ?
        "#;
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(sql)
                    .bind(limit)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list recent courses")?;
                Ok(rows
                    .iter()
                    .map(|row| CourseLink {
                        id: row.get("id"),
                        title: row.get("title"),
                    })
                    .collect())
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(sql)
                    .bind(limit)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list recent courses")?;
                Ok(rows
                    .iter()
                    .map(|row| CourseLink {
                        id: row.get("id"),
                        title: row.get("title"),
                    })
                    .collect())
            }
        }
    }

    async fn list_admin(&self, search: Option<&str>, title: Option<&str>) -> Result<Vec<Course>> {
        let pattern = search.map(contains_pattern);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let sql = format!(
                    r#"{} WHERE (? IS NULL OR LOWER(c.title) LIKE ? ESCAPE '\' OR LOWER(c.description) LIKE ? ESCAPE '\')
                       AND (? IS NULL OR c.title = ?)
                       ORDER BY c.created_at DESC, c.id DESC"#,
                    COURSE_SELECT
                );
                let rows = sqlx::query(&sql)
                    .bind(&pattern)
                    .bind(&pattern)
                    .bind(&pattern)
                    .bind(title)
                    .bind(title)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list courses")?;
                rows.iter().map(row_to_course_sqlite).collect()
            }
            DatabaseDriver::Mysql => {
                let sql = format!(
                    r#"{} WHERE (? IS NULL OR LOWER(c.title) LIKE ? OR LOWER(c.description) LIKE ?)
                       AND (? IS NULL OR c.title = ?)
                       ORDER BY c.created_at DESC, c.id DESC"#,
                    COURSE_SELECT
                );
                let rows = sqlx::query(&sql)
                    .bind(&pattern)
                    .bind(&pattern)
                    .bind(&pattern)
                    .bind(title)
                    .bind(title)
                    .fetch_all(self.pool.mysql()?)
                    .await
                    .context("Failed to list courses")?;
                rows.iter().map(row_to_course_mysql).collect()
            }
        }
    }

    async fn list_titles(&self) -> Result<Vec<String>> {
        let sql = "SELECT DISTINCT title FROM courses ORDER BY title";
        let titles = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query_scalar(sql)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to list course titles")?,
            DatabaseDriver::Mysql => sqlx::query_scalar(sql)
                .fetch_all(self.pool.mysql()?)
                .await
                .context("Failed to list course titles")?,
        };
        Ok(titles)
    }

    async fn set_status(&self, id: i64, status: CourseStatus) -> Result<bool> {
        let sql = "UPDATE courses SET status = ? WHERE id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(status.code())
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to update course status")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(status.code())
                .bind(id)
                .execute(self.pool.mysql()?)
                .await
                .context("Failed to update course status")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn publish_many(&self, ids: &[i64]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "UPDATE courses SET status = 'p', is_live = 1 WHERE id IN ({})",
            placeholders
        );
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut query = sqlx::query(&sql);
                for id in ids {
                    query = query.bind(*id);
                }
                query
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to publish courses")?
                    .rows_affected()
            }
            DatabaseDriver::Mysql => {
                let mut query = sqlx::query(&sql);
                for id in ids {
                    query = query.bind(*id);
                }
                query
                    .execute(self.pool.mysql()?)
                    .await
                    .context("Failed to publish courses")?
                    .rows_affected()
            }
        };
        Ok(affected)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_course_sqlite(pool: &SqlitePool, input: &CourseInput) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO courses (subject, title, description, teacher_id, published, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.subject)
    .bind(&input.title)
    .bind(&input.description)
    .bind(input.teacher_id)
    .bind(input.published)
    .bind(Utc::now())
    .execute(pool)
    .await
    .context("Failed to create course")?;

    Ok(result.last_insert_rowid())
}

async fn fetch_course_sqlite(pool: &SqlitePool, sql: &str, id: i64) -> Result<Option<Course>> {
    let row = sqlx::query(sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get course")?;

    row.as_ref().map(row_to_course_sqlite).transpose()
}

fn row_to_course_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Course> {
    let status: String = row.get("status");
    Ok(Course {
        id: row.get("id"),
        subject: row.get("subject"),
        title: row.get("title"),
        description: row.get("description"),
        teacher_id: row.get("teacher_id"),
        teacher_username: row.get("teacher_username"),
        created_at: row.get("created_at"),
        published: row.get("published"),
        is_live: row.get("is_live"),
        status: CourseStatus::from_str(status.trim())?,
    })
}

fn row_to_summary_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<CourseSummary> {
    Ok(CourseSummary {
        course: row_to_course_sqlite(row)?,
        total_steps: row.get("total_steps"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_course_mysql(pool: &MySqlPool, input: &CourseInput) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO courses (subject, title, description, teacher_id, published, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&input.subject)
    .bind(&input.title)
    .bind(&input.description)
    .bind(input.teacher_id)
    .bind(input.published)
    .bind(Utc::now())
    .execute(pool)
    .await
    .context("Failed to create course")?;

    Ok(result.last_insert_id() as i64)
}

async fn fetch_course_mysql(pool: &MySqlPool, sql: &str, id: i64) -> Result<Option<Course>> {
    let row = sqlx::query(sql)
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get course")?;

    row.as_ref().map(row_to_course_mysql).transpose()
}

fn row_to_course_mysql(row: &sqlx::mysql::MySqlRow) -> Result<Course> {
    let status: String = row.get("status");
    Ok(Course {
        id: row.get("id"),
        subject: row.get("subject"),
        title: row.get("title"),
        description: row.get("description"),
        teacher_id: row.get("teacher_id"),
        teacher_username: row.get("teacher_username"),
        created_at: row.get("created_at"),
        published: row.get("published"),
        is_live: row.get("is_live"),
        status: CourseStatus::from_str(status.trim())?,
    })
}

fn row_to_summary_mysql(row: &sqlx::mysql::MySqlRow) -> Result<CourseSummary> {
    Ok(CourseSummary {
        course: row_to_course_mysql(row)?,
        total_steps: row.get("total_steps"),
    })
}
