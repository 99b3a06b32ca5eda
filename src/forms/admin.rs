//! Admin console and login forms

use serde::{Deserialize, Serialize};

use super::{integer, required_text, FormData, FormErrors, QuizForm, REQUIRED};
use crate::models::{Course, CourseInput, CourseStatus, Quiz, QuizInput, Text, TextInput};

/// Course add/change form
#[derive(Debug, Clone, Default, Serialize)]
pub struct CourseForm {
    pub subject: String,
    pub title: String,
    pub description: String,
    pub teacher_id: String,
    pub published: bool,
}

impl CourseForm {
    pub fn from_data(data: &FormData) -> Self {
        Self {
            subject: data.text("subject"),
            title: data.text("title"),
            description: data.text("description"),
            teacher_id: data.text("teacher_id"),
            published: data.checked("published"),
        }
    }

    pub fn from_course(course: &Course) -> Self {
        Self {
            subject: course.subject.clone(),
            title: course.title.clone(),
            description: course.description.clone(),
            teacher_id: course.teacher_id.to_string(),
            published: course.published,
        }
    }

    pub fn validate(&self) -> Result<CourseInput, FormErrors> {
        let mut errors = FormErrors::default();
        required_text(&self.title, "title", Some(255), &mut errors);
        required_text(&self.description, "description", None, &mut errors);
        let teacher_id = required_id(&self.teacher_id, "teacher_id", &mut errors);

        errors.into_result(CourseInput {
            subject: self.subject.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            teacher_id,
            published: self.published,
        })
    }
}

/// Text lesson add/change form
#[derive(Debug, Clone, Serialize)]
pub struct TextForm {
    pub course_id: String,
    pub title: String,
    pub description: String,
    pub order: String,
    pub content: String,
}

impl Default for TextForm {
    fn default() -> Self {
        Self {
            course_id: String::new(),
            title: String::new(),
            description: String::new(),
            order: "0".to_string(),
            content: String::new(),
        }
    }
}

impl TextForm {
    pub fn from_data(data: &FormData) -> Self {
        Self {
            course_id: data.text("course_id"),
            title: data.text("title"),
            description: data.text("description"),
            order: data.text("order"),
            // markdown keeps its leading indentation
            content: data.get("content").unwrap_or_default().to_string(),
        }
    }

    pub fn from_text(text: &Text) -> Self {
        Self {
            course_id: text.course_id.to_string(),
            title: text.title.clone(),
            description: text.description.clone(),
            order: text.order.to_string(),
            content: text.content.clone(),
        }
    }

    pub fn validate(&self) -> Result<TextInput, FormErrors> {
        let mut errors = FormErrors::default();
        let course_id = required_id(&self.course_id, "course_id", &mut errors);
        required_text(&self.title, "title", Some(255), &mut errors);
        let order = integer(&self.order, "order", 0, &mut errors);

        errors.into_result(TextInput {
            course_id,
            title: self.title.clone(),
            description: self.description.clone(),
            order,
            content: self.content.clone(),
        })
    }
}

/// Quiz add/change form of the admin: the authoring fields plus the course
#[derive(Debug, Clone, Default, Serialize)]
pub struct AdminQuizForm {
    pub course_id: String,
    #[serde(flatten)]
    pub quiz: QuizForm,
}

impl AdminQuizForm {
    pub fn from_data(data: &FormData) -> Self {
        Self {
            course_id: data.text("course_id"),
            quiz: QuizForm::from_data(data),
        }
    }

    pub fn from_quiz(quiz: &Quiz) -> Self {
        Self {
            course_id: quiz.course_id.to_string(),
            quiz: QuizForm::from_quiz(quiz),
        }
    }

    /// The target course id and the quiz fields
    pub fn validate(&self) -> Result<(i64, QuizInput), FormErrors> {
        let mut errors = FormErrors::default();
        let course_id = required_id(&self.course_id, "course_id", &mut errors);
        match self.quiz.validate() {
            Ok(input) => errors.into_result((course_id, input)),
            Err(quiz_errors) => {
                for (field, messages) in quiz_errors.fields {
                    for message in messages {
                        errors.add(&field, message);
                    }
                }
                Err(errors)
            }
        }
    }
}

/// Login form. `next` is carried through a hidden field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}

/// Actions posted to the admin course list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CourseListAction {
    /// Inline status edits, one per `status-<id>` field
    SaveStatuses(Vec<(i64, CourseStatus)>),
    /// Bulk publish of the ticked `selected` ids
    MakePublished(Vec<i64>),
}

impl CourseListAction {
    pub fn from_data(data: &FormData) -> Result<Self, String> {
        match data.get("action").unwrap_or("save") {
            "save" => {
                let mut changes = Vec::new();
                for (id, code) in data.with_prefix("status-") {
                    let id = id
                        .parse::<i64>()
                        .map_err(|_| format!("Invalid course id: {}", id))?;
                    let status = code
                        .parse::<CourseStatus>()
                        .map_err(|_| format!("Invalid status: {}", code))?;
                    changes.push((id, status));
                }
                Ok(Self::SaveStatuses(changes))
            }
            "make_published" => {
                let ids = data
                    .all("selected")
                    .into_iter()
                    .map(|id| id.parse::<i64>().map_err(|_| format!("Invalid course id: {}", id)))
                    .collect::<Result<Vec<_>, _>>()?;
                if ids.is_empty() {
                    return Err("Items must be selected in order to perform actions on them.".to_string());
                }
                Ok(Self::MakePublished(ids))
            }
            other => Err(format!("Unknown action: {}", other)),
        }
    }
}

fn required_id(value: &str, field: &str, errors: &mut FormErrors) -> i64 {
    if value.trim().is_empty() {
        errors.add(field, REQUIRED);
        return 0;
    }
    match value.trim().parse::<i64>() {
        Ok(id) => id,
        Err(_) => {
            errors.add(field, "Select a valid choice.");
            0
        }
    }
}
