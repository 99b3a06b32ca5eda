//! Services layer - Business logic
//!
//! Services sit between the web handlers and the repositories. They are
//! responsible for:
//! - Enforcing visibility (learners only ever see published courses)
//! - Validating input before anything is written
//! - Mapping storage failures to typed service errors

pub mod course;
pub mod markdown;
pub mod password;
pub mod quiz;
pub mod user;

pub use course::{CourseDetail, CourseListing, CourseService, CourseServiceError, TextDetail};
pub use markdown::{markdown_to_html, time_estimate, MarkdownRenderer};
pub use password::{hash_password, verify_password};
pub use quiz::{QuestionContext, QuizDetail, QuizService, QuizServiceError};
pub use user::{LoginInput, UserService, UserServiceError};
