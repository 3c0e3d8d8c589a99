//! Lessons: stored demonstration videos and their procedures

pub mod model;
pub mod repository;
pub mod service;

pub use model::{Lesson, LessonStatus, LessonUpdate, UNTITLED_LESSON};
pub use repository::{
    InMemoryLessonRepository, JsonLessonRepository, LessonRepository, RepositoryError,
};
pub use service::{FeedbackRequest, FeedbackResponse, LessonError, LessonService};
