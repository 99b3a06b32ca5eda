//! Database repositories
//!
//! One repository per aggregate. Each exposes a trait and an sqlx-backed
//! implementation that works on SQLite and MySQL.

pub mod course;
pub mod question;
pub mod quiz;
pub mod session;
pub mod text;
pub mod user;

pub use course::{CourseRepository, SqlxCourseRepository};
pub use question::{QuestionRepository, SqlxQuestionRepository};
pub use quiz::{QuizRepository, SqlxQuizRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use text::{SqlxTextRepository, TextRepository};
pub use user::{SqlxUserRepository, UserRepository};
