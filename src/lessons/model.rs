use crate::procedure::Procedure;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Title given to lessons created without one
pub const UNTITLED_LESSON: &str = "Untitled Lesson";

/// Where a lesson is in its extraction lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LessonStatus {
    /// Extraction is running; no procedure yet
    #[default]
    Processing,
    /// Procedure attached
    Ready,
    /// Extraction failed; the lesson is kept without a procedure
    Failed,
}

impl fmt::Display for LessonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            LessonStatus::Processing => "processing",
            LessonStatus::Ready => "ready",
            LessonStatus::Failed => "failed",
        };
        f.write_str(tag)
    }
}

/// A demonstration video and the procedure extracted from it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: String,
    pub title: String,
    /// Path of the stored demonstration video
    pub demo_video_url: String,
    #[serde(default)]
    pub status: LessonStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    #[serde(default)]
    pub ai_teacher_config: Option<Procedure>,
    pub created_at: DateTime<Utc>,
}

impl Lesson {
    /// New lesson in the `processing` state with a fresh id
    pub fn new(title: &str, demo_video_url: impl Into<String>) -> Self {
        let title = title.trim();
        Self {
            id: Uuid::new_v4().to_string(),
            title: if title.is_empty() {
                UNTITLED_LESSON.to_string()
            } else {
                title.to_string()
            },
            demo_video_url: demo_video_url.into(),
            status: LessonStatus::Processing,
            failure_reason: None,
            ai_teacher_config: None,
            created_at: Utc::now(),
        }
    }

    pub fn procedure(&self) -> Option<&Procedure> {
        self.ai_teacher_config.as_ref()
    }

    pub fn is_ready(&self) -> bool {
        self.status == LessonStatus::Ready && self.ai_teacher_config.is_some()
    }
}

/// Partial update applied by the repository
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LessonUpdate {
    pub title: Option<String>,
    pub status: Option<LessonStatus>,
    pub failure_reason: Option<Option<String>>,
    pub procedure: Option<Option<Procedure>>,
}

impl LessonUpdate {
    /// Extraction succeeded
    pub fn ready(procedure: Procedure) -> Self {
        Self {
            status: Some(LessonStatus::Ready),
            failure_reason: Some(None),
            procedure: Some(Some(procedure)),
            ..Self::default()
        }
    }

    /// Extraction failed; any procedure is cleared
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: Some(LessonStatus::Failed),
            failure_reason: Some(Some(reason.into())),
            procedure: Some(None),
            ..Self::default()
        }
    }

    /// Replaces the procedure without touching the status
    pub fn procedure(procedure: Procedure) -> Self {
        Self {
            procedure: Some(Some(procedure)),
            ..Self::default()
        }
    }

    pub fn apply(self, lesson: &mut Lesson) {
        if let Some(title) = self.title {
            lesson.title = title;
        }
        if let Some(status) = self.status {
            lesson.status = status;
        }
        if let Some(reason) = self.failure_reason {
            lesson.failure_reason = reason;
        }
        if let Some(procedure) = self.procedure {
            lesson.ai_teacher_config = procedure;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_lesson() {
        let lesson = Lesson::new("  ", "storage/videos/a.mp4");
        assert_eq!(lesson.title, UNTITLED_LESSON);
        assert_eq!(lesson.status, LessonStatus::Processing);
        assert!(Uuid::parse_str(&lesson.id).is_ok());
        assert!(!lesson.is_ready());
    }

    #[test]
    fn test_updates() {
        let mut lesson = Lesson::new("Tea", "tea.mp4");

        LessonUpdate::ready(Procedure::fallback(&lesson.id)).apply(&mut lesson);
        assert!(lesson.is_ready());

        LessonUpdate::failed("backend down").apply(&mut lesson);
        assert_eq!(lesson.status, LessonStatus::Failed);
        assert_eq!(lesson.failure_reason.as_deref(), Some("backend down"));
        assert!(lesson.procedure().is_none());
    }

    #[test]
    fn test_record_without_status_reads_as_processing() {
        let lesson: Lesson = serde_json::from_str(
            r#"{"id": "x", "title": "t", "demo_video_url": "v.mp4", "ai_teacher_config": null,
                "created_at": "2024-05-01T10:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(lesson.status, LessonStatus::Processing);
        assert_eq!(lesson.status.to_string(), "processing");
    }
}
