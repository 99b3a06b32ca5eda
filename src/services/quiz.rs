//! Quiz authoring and display
//!
//! Quizzes are created and edited only inside published courses. Questions
//! are written together with their answers; the repository makes each of
//! those writes atomic, this service checks the answer set before it gets
//! that far.

use crate::db::repositories::{CourseRepository, QuestionRepository, QuizRepository};
use crate::models::{
    Answer, AnswerChanges, AnswerInput, Course, Question, QuestionInput, QuestionWithAnswers, Quiz,
    QuizInput, QuizListing,
};
use anyhow::Context;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Maximum length of an answer's text
pub const MAX_ANSWER_LEN: usize = 255;

pub const NO_CORRECT_ANSWER: &str = "At least one answer must be correct.";

pub const NO_ANSWERS: &str = "At least one answer is required.";

#[derive(Debug, thiserror::Error)]
pub enum QuizServiceError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// A quiz page: the course, the quiz and its questions with answers
#[derive(Debug, Clone, Serialize)]
pub struct QuizDetail {
    pub course: Course,
    pub quiz: Quiz,
    pub questions: Vec<QuestionWithAnswers>,
}

/// A question with its answers and the quiz it belongs to
#[derive(Debug, Clone, Serialize)]
pub struct QuestionContext {
    pub quiz: Quiz,
    pub question: QuestionWithAnswers,
}

pub struct QuizService {
    course_repo: Arc<dyn CourseRepository>,
    quiz_repo: Arc<dyn QuizRepository>,
    question_repo: Arc<dyn QuestionRepository>,
}

impl QuizService {
    pub fn new(
        course_repo: Arc<dyn CourseRepository>,
        quiz_repo: Arc<dyn QuizRepository>,
        question_repo: Arc<dyn QuestionRepository>,
    ) -> Self {
        Self {
            course_repo,
            quiz_repo,
            question_repo,
        }
    }

    /// A quiz step of a published course with every question and answer
    pub async fn quiz_detail(&self, course_id: i64, step_id: i64) -> Result<QuizDetail, QuizServiceError> {
        let quiz = self.quiz_in_published_course(course_id, step_id).await?;
        let course = self.published_course(course_id).await?;
        let questions = self.quiz_questions(quiz.id).await?;

        Ok(QuizDetail {
            course,
            quiz,
            questions,
        })
    }

    pub async fn published_course(&self, course_id: i64) -> Result<Course, QuizServiceError> {
        self.course_repo
            .get_published(course_id)
            .await
            .context("Failed to get course")?
            .ok_or_else(|| QuizServiceError::NotFound(format!("Course {}", course_id)))
    }

    pub async fn quiz_in_published_course(&self, course_id: i64, quiz_id: i64) -> Result<Quiz, QuizServiceError> {
        self.quiz_repo
            .get_in_published_course(course_id, quiz_id)
            .await
            .context("Failed to get quiz")?
            .ok_or_else(|| QuizServiceError::NotFound(format!("Quiz {} in course {}", quiz_id, course_id)))
    }

    /// Any quiz by id
    pub async fn get_quiz(&self, quiz_id: i64) -> Result<Quiz, QuizServiceError> {
        self.quiz_repo
            .get_by_id(quiz_id)
            .await
            .context("Failed to get quiz")?
            .ok_or_else(|| QuizServiceError::NotFound(format!("Quiz {}", quiz_id)))
    }

    /// Add a quiz to a published course
    pub async fn create_quiz(&self, course_id: i64, input: QuizInput) -> Result<Quiz, QuizServiceError> {
        self.published_course(course_id).await?;
        validate_quiz(&input)?;
        let quiz = self
            .quiz_repo
            .create(course_id, &input)
            .await
            .context("Failed to create quiz")?;
        tracing::info!("Created quiz {} in course {}", quiz.id, course_id);
        Ok(quiz)
    }

    pub async fn update_quiz(&self, course_id: i64, quiz_id: i64, input: QuizInput) -> Result<Quiz, QuizServiceError> {
        self.quiz_in_published_course(course_id, quiz_id).await?;
        validate_quiz(&input)?;
        self.quiz_repo
            .update(quiz_id, course_id, &input)
            .await
            .context("Failed to update quiz")?
            .ok_or_else(|| QuizServiceError::NotFound(format!("Quiz {}", quiz_id)))
    }

    /// Add a quiz to any existing course, published or not
    pub async fn admin_create_quiz(&self, course_id: i64, input: QuizInput) -> Result<Quiz, QuizServiceError> {
        self.existing_course(course_id).await?;
        validate_quiz(&input)?;
        let quiz = self
            .quiz_repo
            .create(course_id, &input)
            .await
            .context("Failed to create quiz")?;
        tracing::info!("Created quiz {} in course {} from the admin", quiz.id, course_id);
        Ok(quiz)
    }

    /// Change a quiz, possibly moving it to another course
    pub async fn admin_update_quiz(
        &self,
        quiz_id: i64,
        course_id: i64,
        input: QuizInput,
    ) -> Result<Quiz, QuizServiceError> {
        self.get_quiz(quiz_id).await?;
        self.existing_course(course_id).await?;
        validate_quiz(&input)?;
        self.quiz_repo
            .update(quiz_id, course_id, &input)
            .await
            .context("Failed to update quiz")?
            .ok_or_else(|| QuizServiceError::NotFound(format!("Quiz {}", quiz_id)))
    }

    /// Delete a quiz with its questions and answers
    pub async fn delete_quiz(&self, quiz_id: i64) -> Result<Quiz, QuizServiceError> {
        let quiz = self.get_quiz(quiz_id).await?;
        let deleted = self
            .quiz_repo
            .delete(quiz_id)
            .await
            .context("Failed to delete quiz")?;
        if !deleted {
            return Err(QuizServiceError::NotFound(format!("Quiz {}", quiz_id)));
        }
        tracing::info!("Deleted quiz {} from course {}", quiz_id, quiz.course_id);
        Ok(quiz)
    }

    /// Questions of any quiz with their answers, in display order
    pub async fn quiz_questions(&self, quiz_id: i64) -> Result<Vec<QuestionWithAnswers>, QuizServiceError> {
        let questions = self
            .question_repo
            .list_by_quiz(quiz_id)
            .await
            .context("Failed to list questions")?;
        let answers = self
            .question_repo
            .list_answers_for_quiz(quiz_id)
            .await
            .context("Failed to list answers")?;
        Ok(attach_answers(questions, answers))
    }

    async fn existing_course(&self, course_id: i64) -> Result<Course, QuizServiceError> {
        match self.course_repo.get_by_id(course_id).await.context("Failed to get course")? {
            Some(course) => Ok(course),
            None => Err(QuizServiceError::ValidationError("Select a valid choice.".to_string())),
        }
    }

    /// Quizzes with their course titles for the admin list
    pub async fn admin_quizzes(&self, search: Option<&str>) -> Result<Vec<QuizListing>, QuizServiceError> {
        let search = search.map(str::trim).filter(|s| !s.is_empty());
        Ok(self
            .quiz_repo
            .list_with_course(search)
            .await
            .context("Failed to list quizzes")?)
    }

    // ========================================================================
    // Questions and answers
    // ========================================================================

    /// Save a new question and its answers as one unit
    pub async fn create_question(
        &self,
        quiz_id: i64,
        input: QuestionInput,
        answers: Vec<AnswerInput>,
    ) -> Result<Question, QuizServiceError> {
        self.get_quiz(quiz_id).await?;
        validate_prompt(&input.prompt)?;
        validate_answer_group(&answers, true)?;

        let question = self
            .question_repo
            .create_with_answers(quiz_id, &input, &answers)
            .await
            .context("Failed to create question")?;
        tracing::info!(
            "Added {} question {} with {} answer(s) to quiz {}",
            question.kind.code(),
            question.id,
            answers.len(),
            quiz_id
        );
        Ok(question)
    }

    /// A question scoped to its quiz, with answers
    pub async fn question_in_quiz(&self, quiz_id: i64, question_id: i64) -> Result<QuestionWithAnswers, QuizServiceError> {
        let question = self
            .question_repo
            .get_in_quiz(quiz_id, question_id)
            .await
            .context("Failed to get question")?
            .ok_or_else(|| QuizServiceError::NotFound(format!("Question {} in quiz {}", question_id, quiz_id)))?;
        self.with_answers(question).await
    }

    /// Edit a question and its answers together.
    ///
    /// The question keeps its stored kind; only the multiple-choice shuffle
    /// flag can change.
    pub async fn update_question(
        &self,
        quiz_id: i64,
        question_id: i64,
        mut input: QuestionInput,
        changes: AnswerChanges,
    ) -> Result<Question, QuizServiceError> {
        let existing = self.question_in_quiz(quiz_id, question_id).await?;
        if existing.question.kind.code() != input.kind.code() {
            input.kind = existing.question.kind;
        }

        validate_prompt(&input.prompt)?;
        validate_answer_group(&changes.save, true)?;

        Ok(self
            .question_repo
            .update_with_answers(question_id, &input, &changes)
            .await
            .context("Failed to update question")?)
    }

    /// A question, its answers and its quiz
    pub async fn question_context(&self, question_id: i64) -> Result<QuestionContext, QuizServiceError> {
        let question = self
            .question_repo
            .get_by_id(question_id)
            .await
            .context("Failed to get question")?
            .ok_or_else(|| QuizServiceError::NotFound(format!("Question {}", question_id)))?;
        let quiz = self.get_quiz(question.quiz_id).await?;
        let question = self.with_answers(question).await?;
        Ok(QuestionContext { quiz, question })
    }

    /// Add or update answers of a question without touching the question
    pub async fn save_answers(&self, question_id: i64, answers: Vec<AnswerInput>) -> Result<usize, QuizServiceError> {
        validate_answer_group(&answers, false)?;
        Ok(self
            .question_repo
            .save_answers(question_id, &answers)
            .await
            .context("Failed to save answers")?)
    }

    /// Delete a question and its answers, returning what was removed
    pub async fn delete_question(&self, question_id: i64) -> Result<QuestionContext, QuizServiceError> {
        let context = self.question_context(question_id).await?;
        let deleted = self
            .question_repo
            .delete(question_id)
            .await
            .context("Failed to delete question")?;
        if !deleted {
            return Err(QuizServiceError::NotFound(format!("Question {}", question_id)));
        }
        tracing::info!("Deleted question {} from quiz {}", question_id, context.quiz.id);
        Ok(context)
    }

    async fn with_answers(&self, question: Question) -> Result<QuestionWithAnswers, QuizServiceError> {
        let answers = self
            .question_repo
            .list_answers(question.id)
            .await
            .context("Failed to list answers")?;
        Ok(QuestionWithAnswers { question, answers })
    }
}

/// Group answers under their questions, keeping both orders intact
fn attach_answers(questions: Vec<Question>, answers: Vec<Answer>) -> Vec<QuestionWithAnswers> {
    let mut by_question: HashMap<i64, Vec<Answer>> = HashMap::new();
    for answer in answers {
        by_question.entry(answer.question_id).or_default().push(answer);
    }

    questions
        .into_iter()
        .map(|question| {
            let answers = by_question.remove(&question.id).unwrap_or_default();
            QuestionWithAnswers { question, answers }
        })
        .collect()
}

fn validate_quiz(input: &QuizInput) -> Result<(), QuizServiceError> {
    if input.title.trim().is_empty() {
        return Err(QuizServiceError::ValidationError("Title is required".to_string()));
    }
    if input.title.chars().count() > 255 {
        return Err(QuizServiceError::ValidationError(
            "Title must be at most 255 characters".to_string(),
        ));
    }
    if input.total_questions < 0 {
        return Err(QuizServiceError::ValidationError(
            "Total questions cannot be negative".to_string(),
        ));
    }
    Ok(())
}

fn validate_prompt(prompt: &str) -> Result<(), QuizServiceError> {
    if prompt.trim().is_empty() {
        return Err(QuizServiceError::ValidationError("Prompt is required".to_string()));
    }
    Ok(())
}

/// Check a submitted answer group.
///
/// `require_any` demands at least one answer, as the inline group on the
/// question forms does.
pub fn validate_answer_group(answers: &[AnswerInput], require_any: bool) -> Result<(), QuizServiceError> {
    if require_any && answers.is_empty() {
        return Err(QuizServiceError::ValidationError(NO_ANSWERS.to_string()));
    }
    for answer in answers {
        if answer.text.trim().is_empty() {
            return Err(QuizServiceError::ValidationError("Answer text is required".to_string()));
        }
        if answer.text.chars().count() > MAX_ANSWER_LEN {
            return Err(QuizServiceError::ValidationError(format!(
                "Answer text must be at most {} characters",
                MAX_ANSWER_LEN
            )));
        }
    }
    if !answers.iter().any(|a| a.correct) {
        return Err(QuizServiceError::ValidationError(NO_CORRECT_ANSWER.to_string()));
    }
    Ok(())
}
