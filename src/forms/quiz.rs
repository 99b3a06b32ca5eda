//! Quiz and question forms

use serde::Serialize;

use super::{integer, required_text, FormData, FormErrors};
use crate::models::{Question, QuestionInput, QuestionKind, Quiz, QuizInput};

const DEFAULT_TOTAL_QUESTIONS: i32 = 4;

/// Quiz fields as submitted
#[derive(Debug, Clone, Serialize)]
pub struct QuizForm {
    pub title: String,
    pub description: String,
    pub order: String,
    pub total_questions: String,
}

impl Default for QuizForm {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            order: "0".to_string(),
            total_questions: DEFAULT_TOTAL_QUESTIONS.to_string(),
        }
    }
}

impl QuizForm {
    pub fn from_data(data: &FormData) -> Self {
        Self {
            title: data.text("title"),
            description: data.text("description"),
            order: data.text("order"),
            total_questions: data.text("total_questions"),
        }
    }

    pub fn from_quiz(quiz: &Quiz) -> Self {
        Self {
            title: quiz.title.clone(),
            description: quiz.description.clone(),
            order: quiz.order.to_string(),
            total_questions: quiz.total_questions.to_string(),
        }
    }

    pub fn validate(&self) -> Result<QuizInput, FormErrors> {
        let mut errors = FormErrors::default();
        required_text(&self.title, "title", Some(255), &mut errors);
        let order = integer(&self.order, "order", 0, &mut errors);
        let total_questions = integer(
            &self.total_questions,
            "total_questions",
            DEFAULT_TOTAL_QUESTIONS,
            &mut errors,
        );
        if total_questions < 0 {
            errors.add("total_questions", "Ensure this value is greater than or equal to 0.");
        }

        errors.into_result(QuizInput {
            title: self.title.clone(),
            description: self.description.clone(),
            order,
            total_questions,
        })
    }
}

/// Question fields as submitted. `shuffle_answers` only applies to
/// multiple-choice questions.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionForm {
    pub order: String,
    pub prompt: String,
    pub shuffle_answers: bool,
}

impl Default for QuestionForm {
    fn default() -> Self {
        Self {
            order: "0".to_string(),
            prompt: String::new(),
            shuffle_answers: false,
        }
    }
}

impl QuestionForm {
    pub fn from_data(data: &FormData) -> Self {
        Self {
            order: data.text("order"),
            prompt: data.text("prompt"),
            shuffle_answers: data.checked("shuffle_answers"),
        }
    }

    pub fn from_question(question: &Question) -> Self {
        Self {
            order: question.order.to_string(),
            prompt: question.prompt.clone(),
            shuffle_answers: question.kind.shuffle_answers(),
        }
    }

    /// Validate as a question of the given kind
    pub fn validate(&self, kind: QuestionKind) -> Result<QuestionInput, FormErrors> {
        let mut errors = FormErrors::default();
        required_text(&self.prompt, "prompt", None, &mut errors);
        let order = integer(&self.order, "order", 0, &mut errors);

        let kind = match kind {
            QuestionKind::TrueFalse => QuestionKind::TrueFalse,
            QuestionKind::MultipleChoice { .. } => QuestionKind::MultipleChoice {
                shuffle_answers: self.shuffle_answers,
            },
        };

        errors.into_result(QuestionInput {
            order,
            prompt: self.prompt.clone(),
            kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(pairs: &[(&str, &str)]) -> FormData {
        FormData::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_quiz_form_valid() {
        let form = QuizForm::from_data(&data(&[
            ("title", "Loops"),
            ("description", "for and while"),
            ("order", "3"),
            ("total_questions", ""),
        ]));

        let input = form.validate().unwrap();
        assert_eq!(input.title, "Loops");
        assert_eq!(input.order, 3);
        assert_eq!(input.total_questions, 4);
    }

    #[test]
    fn test_quiz_form_errors() {
        let form = QuizForm::from_data(&data(&[("title", ""), ("order", "first")]));
        let errors = form.validate().unwrap_err();

        assert_eq!(errors.field("title").len(), 1);
        assert_eq!(errors.field("order").len(), 1);
        assert!(errors.field("description").is_empty());
    }

    #[test]
    fn test_question_form_shuffle_only_for_multiple_choice() {
        let form = QuestionForm::from_data(&data(&[
            ("prompt", "Pick one"),
            ("shuffle_answers", "on"),
        ]));

        let tf = form.validate(QuestionKind::TrueFalse).unwrap();
        assert_eq!(tf.kind, QuestionKind::TrueFalse);

        let mc = form
            .validate(QuestionKind::MultipleChoice {
                shuffle_answers: false,
            })
            .unwrap();
        assert!(mc.kind.shuffle_answers());
    }

    #[test]
    fn test_question_form_requires_prompt() {
        let form = QuestionForm::from_data(&data(&[("prompt", "   ")]));
        assert!(form.validate(QuestionKind::TrueFalse).is_err());
    }
}
