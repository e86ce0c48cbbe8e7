use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::model::ids::ChapterId;
use crate::time::to_millis;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("chapter ids start at 1")]
    InvalidChapterId,

    #[error("chapter {0} is locked")]
    ChapterLocked(ChapterId),
}

//
// ─── STORY PROGRESS ────────────────────────────────────────────────────────────
//

/// Where the learner is in story mode and what they have earned.
///
/// Invariant: `current_chapter` is the first chapter or its predecessor is in
/// `completed`, so progress never points at a locked chapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    current_chapter: ChapterId,
    current_scene: usize,
    total_xp: u32,
    completed: BTreeSet<ChapterId>,
    last_updated: DateTime<Utc>,
}

impl Progress {
    /// Fresh progress: chapter 1, scene 0, no experience, nothing completed.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            current_chapter: ChapterId::FIRST,
            current_scene: 0,
            total_xp: 0,
            completed: BTreeSet::new(),
            last_updated: to_millis(now),
        }
    }

    /// Rehydrate progress from storage, re-checking the unlock invariant.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::InvalidChapterId` for chapter 0, or
    /// `ProgressError::ChapterLocked` if the current chapter is not unlocked.
    pub fn from_persisted(
        current_chapter: ChapterId,
        current_scene: usize,
        total_xp: u32,
        completed: impl IntoIterator<Item = ChapterId>,
        last_updated: DateTime<Utc>,
    ) -> Result<Self, ProgressError> {
        let completed: BTreeSet<ChapterId> = completed.into_iter().collect();
        if current_chapter.value() == 0 || completed.iter().any(|id| id.value() == 0) {
            return Err(ProgressError::InvalidChapterId);
        }
        let progress = Self {
            current_chapter,
            current_scene,
            total_xp,
            completed,
            last_updated: to_millis(last_updated),
        };
        if !progress.is_unlocked(current_chapter) {
            return Err(ProgressError::ChapterLocked(current_chapter));
        }
        Ok(progress)
    }

    #[must_use]
    pub fn current_chapter(&self) -> ChapterId {
        self.current_chapter
    }

    #[must_use]
    pub fn current_scene(&self) -> usize {
        self.current_scene
    }

    #[must_use]
    pub fn total_xp(&self) -> u32 {
        self.total_xp
    }

    #[must_use]
    pub fn completed(&self) -> &BTreeSet<ChapterId> {
        &self.completed
    }

    #[must_use]
    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    #[must_use]
    pub fn is_completed(&self, id: ChapterId) -> bool {
        self.completed.contains(&id)
    }

    /// Chapter 1 is always open; any other chapter opens once its predecessor is completed.
    #[must_use]
    pub fn is_unlocked(&self, id: ChapterId) -> bool {
        match id.predecessor() {
            None => id.is_first(),
            Some(prev) => self.completed.contains(&prev),
        }
    }

    /// True once the learner has moved past the very first scene.
    #[must_use]
    pub fn has_started(&self) -> bool {
        !self.current_chapter.is_first() || self.current_scene > 0 || !self.completed.is_empty()
    }

    /// Point progress at the start of `id`.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::ChapterLocked` if the chapter is not unlocked.
    pub fn enter_chapter(&mut self, id: ChapterId, now: DateTime<Utc>) -> Result<(), ProgressError> {
        if !self.is_unlocked(id) {
            return Err(ProgressError::ChapterLocked(id));
        }
        self.current_chapter = id;
        self.current_scene = 0;
        self.last_updated = to_millis(now);
        Ok(())
    }

    pub fn set_scene(&mut self, index: usize, now: DateTime<Utc>) {
        self.current_scene = index;
        self.last_updated = to_millis(now);
    }

    pub fn award_xp(&mut self, xp: u32, now: DateTime<Utc>) {
        self.total_xp = self.total_xp.saturating_add(xp);
        self.last_updated = to_millis(now);
    }

    /// Record a chapter completion. Returns `true` only the first time.
    pub fn mark_completed(&mut self, id: ChapterId, now: DateTime<Utc>) -> bool {
        let first = self.completed.insert(id);
        self.last_updated = to_millis(now);
        first
    }
}

//
// ─── LESSON FLAGS ──────────────────────────────────────────────────────────────
//

/// Completion flags for standalone lessons, keyed by lesson slug.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LessonFlags(BTreeMap<String, bool>);

impl LessonFlags {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_map(map: BTreeMap<String, bool>) -> Self {
        Self(map)
    }

    #[must_use]
    pub fn as_map(&self) -> &BTreeMap<String, bool> {
        &self.0
    }

    pub fn set(&mut self, key: impl Into<String>, done: bool) {
        self.0.insert(key.into(), done);
    }

    #[must_use]
    pub fn is_complete(&self, key: &str) -> bool {
        self.0.get(key).copied().unwrap_or(false)
    }

    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.0.values().filter(|done| **done).count()
    }

    /// Rounded share of `total` lessons completed, capped at 100.
    #[must_use]
    pub fn completion_percentage(&self, total: usize) -> u8 {
        if total == 0 {
            return 0;
        }
        let done = self.completed_count().min(total);
        let pct = (done * 200 + total) / (total * 2);
        u8::try_from(pct.min(100)).unwrap_or(100)
    }
}
