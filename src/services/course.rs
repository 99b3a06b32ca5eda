//! Course service
//!
//! Learner-facing listing, detail and search (published courses only),
//! the navigation helpers, and the staff operations behind the admin
//! console: course and text lesson management and workflow status changes.

use crate::db::repositories::{CourseRepository, QuizRepository, TextRepository};
use crate::models::{
    merge_steps, AdminCourseFilter, AdminCourseRow, Course, CourseInput, CourseLink, CourseStatus,
    CourseSummary, Step, Text, TextInput,
};
use crate::services::markdown::time_estimate;
use anyhow::Context;
use chrono::Datelike;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Number of courses in the navigation list
pub const NAV_COURSE_COUNT: i64 = 5;

const MAX_TITLE_LEN: usize = 255;

/// Error types for course service operations
#[derive(Debug, thiserror::Error)]
pub enum CourseServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// A list of courses and the sum of their step totals
#[derive(Debug, Clone, Serialize)]
pub struct CourseListing {
    pub courses: Vec<CourseSummary>,
    pub total: i64,
}

impl CourseListing {
    fn new(courses: Vec<CourseSummary>) -> Self {
        let total = courses.iter().map(|c| c.total_steps).sum();
        Self { courses, total }
    }
}

/// A published course with its merged, ordered steps
#[derive(Debug, Clone, Serialize)]
pub struct CourseDetail {
    pub course: Course,
    pub steps: Vec<Step>,
}

/// A text lesson together with the course it belongs to
#[derive(Debug, Clone, Serialize)]
pub struct TextDetail {
    pub course: Course,
    pub step: Text,
}

pub struct CourseService {
    course_repo: Arc<dyn CourseRepository>,
    text_repo: Arc<dyn TextRepository>,
    quiz_repo: Arc<dyn QuizRepository>,
}

impl CourseService {
    pub fn new(
        course_repo: Arc<dyn CourseRepository>,
        text_repo: Arc<dyn TextRepository>,
        quiz_repo: Arc<dyn QuizRepository>,
    ) -> Self {
        Self {
            course_repo,
            text_repo,
            quiz_repo,
        }
    }

    // ========================================================================
    // Public browsing
    // ========================================================================

    /// All published courses with step totals
    pub async fn list_published(&self) -> Result<CourseListing, CourseServiceError> {
        let courses = self
            .course_repo
            .list_published()
            .await
            .context("Failed to list courses")?;
        Ok(CourseListing::new(courses))
    }

    /// A published course and its steps, texts and quizzes interleaved by
    /// `order`
    pub async fn course_detail(&self, id: i64) -> Result<CourseDetail, CourseServiceError> {
        let course = self.get_published(id).await?;
        let texts = self
            .text_repo
            .list_by_course(id)
            .await
            .context("Failed to list texts")?;
        let quizzes = self
            .quiz_repo
            .list_by_course(id)
            .await
            .context("Failed to list quizzes")?;

        Ok(CourseDetail {
            course,
            steps: merge_steps(texts, quizzes),
        })
    }

    /// A text step of a published course
    pub async fn text_detail(&self, course_id: i64, step_id: i64) -> Result<TextDetail, CourseServiceError> {
        let step = self
            .text_repo
            .get_in_published_course(course_id, step_id)
            .await
            .context("Failed to get text")?
            .ok_or_else(|| CourseServiceError::NotFound(format!("Text {} in course {}", step_id, course_id)))?;
        let course = self.get_published(course_id).await?;
        Ok(TextDetail { course, step })
    }

    /// A published course by id
    pub async fn get_published(&self, id: i64) -> Result<Course, CourseServiceError> {
        self.course_repo
            .get_published(id)
            .await
            .context("Failed to get course")?
            .ok_or_else(|| CourseServiceError::NotFound(format!("Course {}", id)))
    }

    /// Published courses owned by `username`
    pub async fn by_teacher(&self, username: &str) -> Result<CourseListing, CourseServiceError> {
        let courses = self
            .course_repo
            .list_published_by_teacher(username)
            .await
            .context("Failed to list courses by teacher")?;
        Ok(CourseListing::new(courses))
    }

    /// Published courses matching `term` in title or description.
    ///
    /// A missing or empty term matches every published course.
    pub async fn search(&self, term: Option<&str>) -> Result<CourseListing, CourseServiceError> {
        let term = term.map(str::trim).unwrap_or_default();
        let courses = self
            .course_repo
            .search_published(term)
            .await
            .context("Failed to search courses")?;
        Ok(CourseListing::new(courses))
    }

    /// The five most recently created published courses
    pub async fn nav_courses(&self) -> Result<Vec<CourseLink>, CourseServiceError> {
        Ok(self
            .course_repo
            .recent_published(NAV_COURSE_COUNT)
            .await
            .context("Failed to list recent courses")?)
    }

    /// The most recently created published course, if any
    pub async fn newest_course(&self) -> Result<Option<CourseLink>, CourseServiceError> {
        let mut recent = self
            .course_repo
            .recent_published(1)
            .await
            .context("Failed to get newest course")?;
        Ok(recent.pop())
    }

    // ========================================================================
    // Admin: courses
    // ========================================================================

    /// Courses for the admin list, filtered and annotated with reading time
    pub async fn admin_list(&self, filter: &AdminCourseFilter) -> Result<Vec<AdminCourseRow>, CourseServiceError> {
        let search = filter.q.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let title = filter.title.as_deref().filter(|s| !s.is_empty());

        let courses = self
            .course_repo
            .list_admin(search, title)
            .await
            .context("Failed to list courses")?;

        let courses: Vec<Course> = courses
            .into_iter()
            .filter(|c| filter.year.map_or(true, |year| c.created_at.year() == year))
            .collect();

        let ids: Vec<i64> = courses.iter().map(|c| c.id).collect();
        let texts = self
            .text_repo
            .list_by_courses(&ids)
            .await
            .context("Failed to list texts")?;
        let mut words: HashMap<i64, u64> = HashMap::new();
        for text in &texts {
            *words.entry(text.course_id).or_default() += text.word_count();
        }

        Ok(courses
            .into_iter()
            .map(|course| {
                let total = words.get(&course.id).copied().unwrap_or(0);
                AdminCourseRow {
                    time_to_complete: format_minutes(total),
                    course,
                }
            })
            .collect())
    }

    /// Every course, newest first, for admin choice lists
    pub async fn all_courses(&self) -> Result<Vec<Course>, CourseServiceError> {
        Ok(self
            .course_repo
            .list_admin(None, None)
            .await
            .context("Failed to list courses")?)
    }

    /// Distinct titles offered by the admin title filter
    pub async fn admin_titles(&self) -> Result<Vec<String>, CourseServiceError> {
        Ok(self
            .course_repo
            .list_titles()
            .await
            .context("Failed to list course titles")?)
    }

    /// Any course by id, published or not
    pub async fn get(&self, id: i64) -> Result<Course, CourseServiceError> {
        self.course_repo
            .get_by_id(id)
            .await
            .context("Failed to get course")?
            .ok_or_else(|| CourseServiceError::NotFound(format!("Course {}", id)))
    }

    pub async fn create(&self, input: CourseInput) -> Result<Course, CourseServiceError> {
        validate_course(&input)?;
        let course = self
            .course_repo
            .create(&input)
            .await
            .context("Failed to create course")?;
        tracing::info!("Created course {} ({})", course.id, course.title);
        Ok(course)
    }

    pub async fn update(&self, id: i64, input: CourseInput) -> Result<Course, CourseServiceError> {
        validate_course(&input)?;
        self.course_repo
            .update(id, &input)
            .await
            .context("Failed to update course")?
            .ok_or_else(|| CourseServiceError::NotFound(format!("Course {}", id)))
    }

    /// Hard delete a course and everything it owns
    pub async fn delete(&self, id: i64) -> Result<(), CourseServiceError> {
        let deleted = self
            .course_repo
            .delete(id)
            .await
            .context("Failed to delete course")?;
        if !deleted {
            return Err(CourseServiceError::NotFound(format!("Course {}", id)));
        }
        tracing::info!("Deleted course {}", id);
        Ok(())
    }

    /// Apply inline status edits, returning how many courses changed
    pub async fn update_statuses(&self, changes: &[(i64, CourseStatus)]) -> Result<usize, CourseServiceError> {
        let mut updated = 0;
        for (id, status) in changes {
            if self
                .course_repo
                .set_status(*id, *status)
                .await
                .context("Failed to update course status")?
            {
                updated += 1;
            }
        }
        Ok(updated)
    }

    /// Bulk action: mark the selected courses published and live
    pub async fn make_published(&self, ids: &[i64]) -> Result<u64, CourseServiceError> {
        let count = self
            .course_repo
            .publish_many(ids)
            .await
            .context("Failed to publish courses")?;
        tracing::info!("Marked {} course(s) as published", count);
        Ok(count)
    }

    // ========================================================================
    // Admin: text lessons
    // ========================================================================

    pub async fn get_text(&self, id: i64) -> Result<Text, CourseServiceError> {
        self.text_repo
            .get_by_id(id)
            .await
            .context("Failed to get text")?
            .ok_or_else(|| CourseServiceError::NotFound(format!("Text {}", id)))
    }

    pub async fn create_text(&self, input: TextInput) -> Result<Text, CourseServiceError> {
        self.validate_text(&input).await?;
        Ok(self
            .text_repo
            .create(&input)
            .await
            .context("Failed to create text")?)
    }

    pub async fn update_text(&self, id: i64, input: TextInput) -> Result<Text, CourseServiceError> {
        self.validate_text(&input).await?;
        self.text_repo
            .update(id, &input)
            .await
            .context("Failed to update text")?
            .ok_or_else(|| CourseServiceError::NotFound(format!("Text {}", id)))
    }

    pub async fn delete_text(&self, id: i64) -> Result<(), CourseServiceError> {
        let deleted = self
            .text_repo
            .delete(id)
            .await
            .context("Failed to delete text")?;
        if !deleted {
            return Err(CourseServiceError::NotFound(format!("Text {}", id)));
        }
        Ok(())
    }

    async fn validate_text(&self, input: &TextInput) -> Result<(), CourseServiceError> {
        validate_title(&input.title)?;
        self.course_repo
            .get_by_id(input.course_id)
            .await
            .context("Failed to get course")?
            .ok_or_else(|| CourseServiceError::ValidationError("Select a valid course".to_string()))?;
        Ok(())
    }
}

fn validate_title(title: &str) -> Result<(), CourseServiceError> {
    if title.trim().is_empty() {
        return Err(CourseServiceError::ValidationError("Title is required".to_string()));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(CourseServiceError::ValidationError(format!(
            "Title must be at most {} characters",
            MAX_TITLE_LEN
        )));
    }
    Ok(())
}

fn validate_course(input: &CourseInput) -> Result<(), CourseServiceError> {
    validate_title(&input.title)?;
    if input.description.trim().is_empty() {
        return Err(CourseServiceError::ValidationError(
            "Description is required".to_string(),
        ));
    }
    Ok(())
}

fn format_minutes(words: u64) -> String {
    format!("{} min.", time_estimate(words))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::course::test_support::*;
    use crate::db::repositories::{SqlxCourseRepository, SqlxQuizRepository, SqlxTextRepository};
    use crate::db::DynDatabasePool;
    use chrono::{TimeZone, Utc};

    async fn setup() -> (DynDatabasePool, CourseService, i64) {
        let pool = migrated_pool().await;
        let teacher = insert_user(&pool, "kenneth", "teacher").await;
        let service = CourseService::new(
            SqlxCourseRepository::boxed(pool.clone()),
            SqlxTextRepository::boxed(pool.clone()),
            SqlxQuizRepository::boxed(pool.clone()),
        );
        (pool, service, teacher)
    }

    #[tokio::test]
    async fn test_list_published_total_is_sum_of_steps() {
        let (pool, service, teacher) = setup().await;
        let a = insert_course(&pool, teacher, "A", "d", true, Utc::now()).await;
        let b = insert_course(&pool, teacher, "B", "d", true, Utc::now()).await;
        let hidden = insert_course(&pool, teacher, "Hidden", "d", false, Utc::now()).await;
        insert_text(&pool, a, 0, "").await;
        insert_quiz(&pool, a, 1).await;
        insert_quiz(&pool, b, 0).await;
        insert_text(&pool, hidden, 0, "").await;

        let listing = service.list_published().await.unwrap();

        assert_eq!(listing.courses.len(), 2);
        assert!(listing.courses.iter().all(|c| c.course.published));
        assert_eq!(listing.total, 3);
        for summary in &listing.courses {
            let expected = if summary.course.id == a { 2 } else { 1 };
            assert_eq!(summary.total_steps, expected);
        }
    }

    #[tokio::test]
    async fn test_empty_listing_total_is_zero() {
        let (_pool, service, _teacher) = setup().await;
        let listing = service.list_published().await.unwrap();
        assert!(listing.courses.is_empty());
        assert_eq!(listing.total, 0);
    }

    #[tokio::test]
    async fn test_course_detail_merges_steps_in_order() {
        let (pool, service, teacher) = setup().await;
        let course = insert_course(&pool, teacher, "C", "d", true, Utc::now()).await;
        insert_text(&pool, course, 2, "").await;
        insert_quiz(&pool, course, 1).await;
        insert_text(&pool, course, 0, "").await;

        let detail = service.course_detail(course).await.unwrap();
        let shape: Vec<(&str, i32)> = detail
            .steps
            .iter()
            .map(|s| match s {
                Step::Text(t) => ("text", t.order),
                Step::Quiz(q) => ("quiz", q.order),
            })
            .collect();

        assert_eq!(shape, vec![("text", 0), ("quiz", 1), ("text", 2)]);
    }

    #[tokio::test]
    async fn test_unpublished_course_detail_is_not_found() {
        let (pool, service, teacher) = setup().await;
        let course = insert_course(&pool, teacher, "C", "d", false, Utc::now()).await;
        let text = insert_text(&pool, course, 0, "").await;

        assert!(matches!(service.course_detail(course).await, Err(CourseServiceError::NotFound(_))));
        assert!(matches!(service.course_detail(9999).await, Err(CourseServiceError::NotFound(_))));
        assert!(matches!(
            service.text_detail(course, text).await,
            Err(CourseServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_search_python() {
        let (pool, service, teacher) = setup().await;
        let basics = insert_course(&pool, teacher, "Python Basics", "Start here", true, Utc::now()).await;
        let django = insert_course(&pool, teacher, "Django", "Web apps with python", true, Utc::now()).await;
        insert_course(&pool, teacher, "Ruby", "Gems", true, Utc::now()).await;

        let ids: Vec<i64> = service
            .search(Some("python"))
            .await
            .unwrap()
            .courses
            .iter()
            .map(|c| c.course.id)
            .collect();

        assert_eq!(ids, vec![basics, django]);
        assert_eq!(service.search(None).await.unwrap().courses.len(), 3);
        assert_eq!(service.search(Some("   ")).await.unwrap().courses.len(), 3);
    }

    #[tokio::test]
    async fn test_nav_helpers_only_published() {
        let (pool, service, teacher) = setup().await;
        assert!(service.newest_course().await.unwrap().is_none());

        let base = Utc.with_ymd_and_hms(2016, 3, 1, 0, 0, 0).unwrap();
        let old = insert_course(&pool, teacher, "Old", "d", true, base).await;
        let newer = insert_course(&pool, teacher, "Newer", "d", true, base + chrono::Duration::days(1)).await;
        insert_course(&pool, teacher, "Draft", "d", false, base + chrono::Duration::days(2)).await;

        let nav: Vec<i64> = service.nav_courses().await.unwrap().iter().map(|c| c.id).collect();
        assert_eq!(nav, vec![newer, old]);
        assert_eq!(service.newest_course().await.unwrap().unwrap().id, newer);
    }

    #[tokio::test]
    async fn test_admin_list_year_filter_and_reading_time() {
        let (pool, service, teacher) = setup().await;
        let y2015 = insert_course(
            &pool,
            teacher,
            "Old",
            "d",
            false,
            Utc.with_ymd_and_hms(2015, 12, 31, 23, 59, 59).unwrap(),
        )
        .await;
        let y2016 = insert_course(
            &pool,
            teacher,
            "New",
            "d",
            false,
            Utc.with_ymd_and_hms(2016, 1, 1, 0, 0, 0).unwrap(),
        )
        .await;
        insert_text(&pool, y2016, 0, &"word ".repeat(30)).await;
        insert_text(&pool, y2016, 1, &"word ".repeat(20)).await;

        let filter = AdminCourseFilter {
            year: Some(2016),
            ..Default::default()
        };
        let rows = service.admin_list(&filter).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].course.id, y2016);
        assert_eq!(rows[0].time_to_complete, "2 min.");

        let filter = AdminCourseFilter {
            year: Some(2015),
            ..Default::default()
        };
        let rows = service.admin_list(&filter).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].course.id, y2015);
        assert_eq!(rows[0].time_to_complete, "0 min.");
    }

    #[tokio::test]
    async fn test_admin_list_reading_time_per_course() {
        let (pool, service, teacher) = setup().await;
        let short = insert_course(&pool, teacher, "Short", "d", true, Utc::now()).await;
        let long = insert_course(&pool, teacher, "Long", "d", true, Utc::now()).await;
        insert_text(&pool, short, 0, &"word ".repeat(20)).await;
        insert_text(&pool, long, 0, &"word ".repeat(60)).await;
        insert_text(&pool, long, 1, &"word ".repeat(40)).await;

        let rows = service.admin_list(&AdminCourseFilter::default()).await.unwrap();
        let minutes = |id: i64| {
            rows.iter()
                .find(|r| r.course.id == id)
                .map(|r| r.time_to_complete.clone())
                .unwrap()
        };
        assert_eq!(minutes(short), "1 min.");
        assert_eq!(minutes(long), "5 min.");
    }

    #[tokio::test]
    async fn test_status_changes() {
        let (pool, service, teacher) = setup().await;
        let a = insert_course(&pool, teacher, "A", "d", false, Utc::now()).await;
        let b = insert_course(&pool, teacher, "B", "d", false, Utc::now()).await;

        let changed = service
            .update_statuses(&[(a, CourseStatus::InReview), (9999, CourseStatus::Published)])
            .await
            .unwrap();
        assert_eq!(changed, 1);
        assert_eq!(service.get(a).await.unwrap().status, CourseStatus::InReview);

        assert_eq!(service.make_published(&[b]).await.unwrap(), 1);
        let b = service.get(b).await.unwrap();
        assert_eq!(b.status, CourseStatus::Published);
        assert!(b.is_live);
        // the workflow status does not affect learner visibility
        assert!(!b.published);
    }

    #[tokio::test]
    async fn test_course_validation_and_delete() {
        let (_pool, service, teacher) = setup().await;
        let blank = CourseInput {
            subject: String::new(),
            title: "  ".to_string(),
            description: "d".to_string(),
            teacher_id: teacher,
            published: false,
        };
        assert!(matches!(service.create(blank).await, Err(CourseServiceError::ValidationError(_))));

        let course = service
            .create(CourseInput {
                subject: "Code".to_string(),
                title: "Rust".to_string(),
                description: "Ownership".to_string(),
                teacher_id: teacher,
                published: true,
            })
            .await
            .unwrap();
        service.delete(course.id).await.unwrap();
        assert!(matches!(service.delete(course.id).await, Err(CourseServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_text_admin_requires_existing_course() {
        let (pool, service, teacher) = setup().await;
        let course = insert_course(&pool, teacher, "C", "d", false, Utc::now()).await;
        let input = |course_id| TextInput {
            course_id,
            title: "Intro".to_string(),
            description: String::new(),
            order: 0,
            content: String::new(),
        };

        assert!(matches!(
            service.create_text(input(9999)).await,
            Err(CourseServiceError::ValidationError(_))
        ));

        let text = service.create_text(input(course)).await.unwrap();
        let mut changed = input(course);
        changed.content = "Now with content".to_string();
        assert_eq!(service.update_text(text.id, changed).await.unwrap().content, "Now with content");

        service.delete_text(text.id).await.unwrap();
        assert!(matches!(service.get_text(text.id).await, Err(CourseServiceError::NotFound(_))));
    }
}
