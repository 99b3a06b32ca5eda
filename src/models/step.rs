//! Course steps: text lessons and quizzes
//!
//! Both kinds share a course, a title, a description and an integer
//! `order`. A course's steps are the union of its texts and quizzes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::services::markdown::word_count;

/// A text lesson with markdown content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Text {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    pub description: String,
    pub order: i32,
    /// Markdown source, may be empty
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Text {
    pub fn word_count(&self) -> u64 {
        word_count(&self.content)
    }
}

/// A quiz step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,
    pub course_id: i64,
    pub title: String,
    pub description: String,
    pub order: i32,
    /// Expected number of questions, informational only
    pub total_questions: i32,
    pub created_at: DateTime<Utc>,
}

/// Quiz row in the admin list, with its course title
#[derive(Debug, Clone, Serialize)]
pub struct QuizListing {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub course_title: String,
}

/// Either kind of step, tagged with `kind` when serialized
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Step {
    Text(Text),
    Quiz(Quiz),
}

impl Step {
    pub fn id(&self) -> i64 {
        match self {
            Step::Text(t) => t.id,
            Step::Quiz(q) => q.id,
        }
    }

    pub fn order(&self) -> i32 {
        match self {
            Step::Text(t) => t.order,
            Step::Quiz(q) => q.order,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Step::Text(t) => &t.title,
            Step::Quiz(q) => &q.title,
        }
    }

    // Texts sort ahead of quizzes sharing the same order.
    fn kind_rank(&self) -> u8 {
        match self {
            Step::Text(_) => 0,
            Step::Quiz(_) => 1,
        }
    }
}

/// Merge texts and quizzes into one sequence sorted by `order`.
///
/// Equal orders fall back to texts first, then ascending id, so the
/// result is deterministic.
pub fn merge_steps(texts: Vec<Text>, quizzes: Vec<Quiz>) -> Vec<Step> {
    let mut steps: Vec<Step> = texts
        .into_iter()
        .map(Step::Text)
        .chain(quizzes.into_iter().map(Step::Quiz))
        .collect();
    steps.sort_by_key(|s| (s.order(), s.kind_rank(), s.id()));
    steps
}

/// Fields of a text lesson
#[derive(Debug, Clone)]
pub struct TextInput {
    pub course_id: i64,
    pub title: String,
    pub description: String,
    pub order: i32,
    pub content: String,
}

/// Fields of a quiz; the course comes from the route
#[derive(Debug, Clone)]
pub struct QuizInput {
    pub title: String,
    pub description: String,
    pub order: i32,
    pub total_questions: i32,
}
