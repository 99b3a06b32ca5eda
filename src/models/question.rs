//! Question and answer models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of question, stored as the `kind` discriminant column.
///
/// Only multiple-choice questions carry `shuffle_answers`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum QuestionKind {
    #[serde(rename = "tf")]
    TrueFalse,
    #[serde(rename = "mc")]
    MultipleChoice { shuffle_answers: bool },
}

impl QuestionKind {
    /// Discriminant stored in the database and used in URLs
    pub fn code(&self) -> &'static str {
        match self {
            Self::TrueFalse => "tf",
            Self::MultipleChoice { .. } => "mc",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::TrueFalse => "True/False",
            Self::MultipleChoice { .. } => "Multiple Choice",
        }
    }

    /// Resolve the URL discriminator of the add-question route.
    ///
    /// `tf` selects true/false; anything else is multiple choice.
    pub fn from_route(kind: &str) -> Self {
        if kind == "tf" {
            Self::TrueFalse
        } else {
            Self::MultipleChoice {
                shuffle_answers: false,
            }
        }
    }

    /// Rebuild the kind from its stored columns
    pub fn from_columns(code: &str, shuffle_answers: bool) -> anyhow::Result<Self> {
        match code {
            "tf" => Ok(Self::TrueFalse),
            "mc" => Ok(Self::MultipleChoice { shuffle_answers }),
            other => Err(anyhow::anyhow!("Invalid question kind: {}", other)),
        }
    }

    pub fn shuffle_answers(&self) -> bool {
        matches!(
            self,
            Self::MultipleChoice {
                shuffle_answers: true
            }
        )
    }

    pub fn is_multiple_choice(&self) -> bool {
        matches!(self, Self::MultipleChoice { .. })
    }
}

/// A question belonging to a quiz
#[derive(Debug, Clone, Serialize)]
pub struct Question {
    pub id: i64,
    pub quiz_id: i64,
    pub order: i32,
    pub prompt: String,
    #[serde(flatten)]
    pub kind: QuestionKind,
    pub created_at: DateTime<Utc>,
}

/// An answer to a question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub id: i64,
    pub question_id: i64,
    pub order: i32,
    pub text: String,
    pub correct: bool,
}

/// A question together with its answers, both in display order
#[derive(Debug, Clone, Serialize)]
pub struct QuestionWithAnswers {
    #[serde(flatten)]
    pub question: Question,
    pub answers: Vec<Answer>,
}

impl QuestionWithAnswers {
    pub fn answer_ids(&self) -> Vec<i64> {
        self.answers.iter().map(|a| a.id).collect()
    }
}

/// Fields of a question; the quiz comes from the route
#[derive(Debug, Clone)]
pub struct QuestionInput {
    pub order: i32,
    pub prompt: String,
    pub kind: QuestionKind,
}

/// One answer row to save; `id` is set for existing answers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerInput {
    pub id: Option<i64>,
    pub order: i32,
    pub text: String,
    pub correct: bool,
}

/// Answer writes applied together with a question
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerChanges {
    /// Rows to insert (no id) or update (with id)
    pub save: Vec<AnswerInput>,
    /// Existing answers to remove
    pub delete: Vec<i64>,
}
