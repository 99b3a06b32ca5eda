//! Course model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Editorial workflow state of a course.
///
/// Independent of `published`, which alone decides learner visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CourseStatus {
    #[default]
    #[serde(rename = "i")]
    InProgress,
    #[serde(rename = "r")]
    InReview,
    #[serde(rename = "p")]
    Published,
}

impl CourseStatus {
    pub const ALL: [CourseStatus; 3] = [Self::InProgress, Self::InReview, Self::Published];

    /// Single-letter code stored in the database
    pub fn code(&self) -> &'static str {
        match self {
            Self::InProgress => "i",
            Self::InReview => "r",
            Self::Published => "p",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::InProgress => "In Progress",
            Self::InReview => "In Review",
            Self::Published => "Published",
        }
    }
}

impl fmt::Display for CourseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for CourseStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "i" => Ok(Self::InProgress),
            "r" => Ok(Self::InReview),
            "p" => Ok(Self::Published),
            _ => Err(anyhow::anyhow!("Invalid course status: {}", s)),
        }
    }
}

/// A course owned by a teacher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    pub subject: String,
    pub title: String,
    pub description: String,
    pub teacher_id: i64,
    /// Username of the owning teacher, joined on load
    pub teacher_username: String,
    pub created_at: DateTime<Utc>,
    /// Visible to learners
    pub published: bool,
    pub is_live: bool,
    pub status: CourseStatus,
}

/// A course annotated with its number of steps
#[derive(Debug, Clone, Serialize)]
pub struct CourseSummary {
    #[serde(flatten)]
    pub course: Course,
    pub total_steps: i64,
}

/// Minimal course reference used by the navigation list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseLink {
    pub id: i64,
    pub title: String,
}

/// Admin list row: a course plus its estimated reading time
#[derive(Debug, Clone, Serialize)]
pub struct AdminCourseRow {
    #[serde(flatten)]
    pub course: Course,
    /// Rendered as "N min."
    pub time_to_complete: String,
}

/// Fields editable through the admin course form
#[derive(Debug, Clone)]
pub struct CourseInput {
    pub subject: String,
    pub title: String,
    pub description: String,
    pub teacher_id: i64,
    pub published: bool,
}

/// Filters accepted by the admin course list
#[derive(Debug, Clone, Default, Serialize)]
pub struct AdminCourseFilter {
    /// Substring searched in title and description
    pub q: Option<String>,
    /// Exact title
    pub title: Option<String>,
    /// Creation year, inclusive Jan 1 to Dec 31
    pub year: Option<i32>,
}
