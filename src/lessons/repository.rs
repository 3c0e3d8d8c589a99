//! Lesson persistence
//!
//! [`JsonLessonRepository`] keeps every lesson in one pretty-printed JSON
//! array. A missing file reads as an empty store; an unreadable one is moved
//! aside to `*.json.corrupt` first. Writes go through a temporary file so a
//! crash never leaves half a document behind.

use crate::lessons::{Lesson, LessonUpdate};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Lesson already exists: {0}")]
    Duplicate(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize lessons: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[async_trait]
pub trait LessonRepository: Send + Sync {
    async fn create(&self, lesson: Lesson) -> Result<Lesson, RepositoryError>;

    async fn get(&self, id: &str) -> Result<Option<Lesson>, RepositoryError>;

    async fn get_all(&self) -> Result<Vec<Lesson>, RepositoryError>;

    /// Applies `update` and returns the new record, or `None` for an unknown id
    async fn update(&self, id: &str, update: LessonUpdate)
        -> Result<Option<Lesson>, RepositoryError>;

    /// Returns whether a lesson was removed
    async fn delete(&self, id: &str) -> Result<bool, RepositoryError>;
}

/// Single-file JSON store
#[derive(Debug)]
pub struct JsonLessonRepository {
    path: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl JsonLessonRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<Vec<Lesson>, RepositoryError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str(&content) {
            Ok(lessons) => Ok(lessons),
            Err(e) => {
                let aside = self.corrupt_path();
                tokio::fs::rename(&self.path, &aside).await?;
                warn!(
                    "Lesson store {} is unreadable, moved to {} and starting empty: {}",
                    self.path.display(),
                    aside.display(),
                    e
                );
                Ok(Vec::new())
            }
        }
    }

    /// Where an unreadable store is kept so the next write cannot destroy it
    pub fn corrupt_path(&self) -> PathBuf {
        self.path.with_extension("json.corrupt")
    }

    async fn write_all(&self, lessons: &[Lesson]) -> Result<(), RepositoryError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(lessons)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!("Wrote {} lessons to {}", lessons.len(), self.path.display());
        Ok(())
    }
}

#[async_trait]
impl LessonRepository for JsonLessonRepository {
    async fn create(&self, lesson: Lesson) -> Result<Lesson, RepositoryError> {
        let _guard = self.lock.lock().await;
        let mut lessons = self.read_all().await?;
        if lessons.iter().any(|l| l.id == lesson.id) {
            return Err(RepositoryError::Duplicate(lesson.id));
        }
        lessons.push(lesson.clone());
        self.write_all(&lessons).await?;
        Ok(lesson)
    }

    async fn get(&self, id: &str) -> Result<Option<Lesson>, RepositoryError> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all().await?.into_iter().find(|l| l.id == id))
    }

    async fn get_all(&self) -> Result<Vec<Lesson>, RepositoryError> {
        let _guard = self.lock.lock().await;
        self.read_all().await
    }

    async fn update(
        &self,
        id: &str,
        update: LessonUpdate,
    ) -> Result<Option<Lesson>, RepositoryError> {
        let _guard = self.lock.lock().await;
        let mut lessons = self.read_all().await?;
        let Some(lesson) = lessons.iter_mut().find(|l| l.id == id) else {
            return Ok(None);
        };
        update.apply(lesson);
        let updated = lesson.clone();
        self.write_all(&lessons).await?;
        Ok(Some(updated))
    }

    async fn delete(&self, id: &str) -> Result<bool, RepositoryError> {
        let _guard = self.lock.lock().await;
        let mut lessons = self.read_all().await?;
        let before = lessons.len();
        lessons.retain(|l| l.id != id);
        if lessons.len() == before {
            return Ok(false);
        }
        self.write_all(&lessons).await?;
        Ok(true)
    }
}

/// Process-local store, mainly for tests and one-shot CLI runs
#[derive(Debug, Default)]
pub struct InMemoryLessonRepository {
    lessons: Mutex<Vec<Lesson>>,
}

impl InMemoryLessonRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lessons(&self) -> MutexGuard<'_, Vec<Lesson>> {
        self.lessons
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl LessonRepository for InMemoryLessonRepository {
    async fn create(&self, lesson: Lesson) -> Result<Lesson, RepositoryError> {
        let mut lessons = self.lessons();
        if lessons.iter().any(|l| l.id == lesson.id) {
            return Err(RepositoryError::Duplicate(lesson.id));
        }
        lessons.push(lesson.clone());
        Ok(lesson)
    }

    async fn get(&self, id: &str) -> Result<Option<Lesson>, RepositoryError> {
        Ok(self.lessons().iter().find(|l| l.id == id).cloned())
    }

    async fn get_all(&self) -> Result<Vec<Lesson>, RepositoryError> {
        Ok(self.lessons().clone())
    }

    async fn update(
        &self,
        id: &str,
        update: LessonUpdate,
    ) -> Result<Option<Lesson>, RepositoryError> {
        let mut lessons = self.lessons();
        Ok(lessons.iter_mut().find(|l| l.id == id).map(|lesson| {
            update.apply(lesson);
            lesson.clone()
        }))
    }

    async fn delete(&self, id: &str) -> Result<bool, RepositoryError> {
        let mut lessons = self.lessons();
        let before = lessons.len();
        lessons.retain(|l| l.id != id);
        Ok(lessons.len() != before)
    }
}
