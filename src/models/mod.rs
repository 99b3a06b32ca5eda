//! Data models
//!
//! Database entities (Course, Text, Quiz, Question, Answer, User, Session)
//! and the input types the services accept.

mod course;
mod question;
mod session;
mod step;
mod user;

pub use course::{AdminCourseFilter, AdminCourseRow, Course, CourseInput, CourseLink, CourseStatus, CourseSummary};
pub use question::{Answer, AnswerChanges, AnswerInput, Question, QuestionInput, QuestionKind, QuestionWithAnswers};
pub use session::Session;
pub use step::{merge_steps, Quiz, QuizInput, QuizListing, Step, Text, TextInput};
pub use user::{CreateUserInput, User, UserRole};
