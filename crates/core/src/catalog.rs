//! Read-only story and test content, validated once at load time.

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;
use thiserror::Error;

use crate::model::{
    CefrLevel, Chapter, ChapterDraft, ChapterId, Question, QuestionDraft, QuestionError,
    StoryError,
};

const BUILTIN_CATALOG: &str = include_str!("../content/builtin.json");

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("catalog is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Story(#[from] StoryError),

    #[error("test bank {level}: {source}")]
    Question {
        level: CefrLevel,
        #[source]
        source: QuestionError,
    },

    #[error("chapter ids must run 1..=n without gaps: expected {expected}, found {found}")]
    NonDenseIds { expected: ChapterId, found: ChapterId },

    #[error("test bank {level}: duplicate question id {id}")]
    DuplicateQuestion { level: CefrLevel, id: u32 },

    #[error("unknown test bank level: {0}")]
    UnknownLevel(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogDocument {
    chapters: Vec<ChapterDraft>,
    #[serde(default)]
    test_banks: BTreeMap<String, Vec<QuestionDraft>>,
}

/// Chapters indexed by id plus one ordered question bank per level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    chapters: Vec<Chapter>,
    banks: BTreeMap<CefrLevel, Vec<Question>>,
}

impl Catalog {
    /// The sample content shipped with the crate.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if the embedded content fails validation.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json(BUILTIN_CATALOG)
    }

    /// Parse and validate a catalog document.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` for malformed JSON or content that fails validation.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let doc: CatalogDocument = serde_json::from_str(json)?;
        let mut banks = Vec::with_capacity(doc.test_banks.len());
        for (code, questions) in doc.test_banks {
            let level = code
                .parse::<CefrLevel>()
                .map_err(|_| CatalogError::UnknownLevel(code.clone()))?;
            banks.push((level, questions));
        }
        Self::from_drafts(doc.chapters, banks)
    }

    /// Validate authoring drafts into a catalog.
    ///
    /// Chapters may arrive in any order; after sorting their ids must be exactly `1..=n`.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` for invalid chapters/questions, gaps or duplicates
    /// in chapter ids, or duplicate question ids within a bank.
    pub fn from_drafts(
        chapters: Vec<ChapterDraft>,
        banks: impl IntoIterator<Item = (CefrLevel, Vec<QuestionDraft>)>,
    ) -> Result<Self, CatalogError> {
        let mut chapters = chapters
            .into_iter()
            .map(ChapterDraft::validate)
            .collect::<Result<Vec<_>, _>>()?;
        chapters.sort_by_key(Chapter::id);

        for (index, chapter) in chapters.iter().enumerate() {
            let expected = ChapterId::new(u32::try_from(index + 1).unwrap_or(u32::MAX));
            if chapter.id() != expected {
                return Err(CatalogError::NonDenseIds {
                    expected,
                    found: chapter.id(),
                });
            }
        }

        let mut validated = BTreeMap::new();
        for (level, drafts) in banks {
            let mut seen = BTreeSet::new();
            let mut questions = Vec::with_capacity(drafts.len());
            for draft in drafts {
                if !seen.insert(draft.id) {
                    return Err(CatalogError::DuplicateQuestion { level, id: draft.id });
                }
                let question = draft
                    .validate()
                    .map_err(|source| CatalogError::Question { level, source })?;
                questions.push(question);
            }
            validated.entry(level).or_insert_with(Vec::new).extend(questions);
        }

        Ok(Self {
            chapters,
            banks: validated,
        })
    }

    #[must_use]
    pub fn chapter(&self, id: ChapterId) -> Option<&Chapter> {
        let index = usize::try_from(id.value()).ok()?.checked_sub(1)?;
        self.chapters.get(index)
    }

    #[must_use]
    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    /// The chapter after `id`, if the catalog has one.
    #[must_use]
    pub fn next_chapter(&self, id: ChapterId) -> Option<&Chapter> {
        self.chapter(id.successor())
    }

    /// Ordered questions for `level`; empty when the level has no bank.
    #[must_use]
    pub fn test_bank(&self, level: CefrLevel) -> &[Question] {
        self.banks.get(&level).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }
}
