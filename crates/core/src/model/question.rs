use serde::Deserialize;
use thiserror::Error;

use crate::model::ids::QuestionId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question {0}: prompt cannot be empty")]
    EmptyPrompt(QuestionId),

    #[error("question {0}: accepted answer cannot be empty")]
    EmptyAnswer(QuestionId),

    #[error("question {0}: multiple choice needs at least two options")]
    TooFewOptions(QuestionId),

    #[error("question {0}: accepted answer is not one of the options")]
    AnswerNotAnOption(QuestionId),
}

/// How a question is presented and answered.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    MultipleChoice { options: Vec<String> },
    FillBlank,
    Translation,
}

/// Authoring shape of a test question, as found in catalog JSON.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDraft {
    pub id: u32,
    #[serde(flatten)]
    pub kind: QuestionKind,
    pub prompt: String,
    /// Sentence to translate or complete, when the prompt refers to one.
    #[serde(default)]
    pub source: Option<String>,
    pub answer: String,
    #[serde(default)]
    pub explanation: String,
}

impl QuestionDraft {
    /// # Errors
    ///
    /// Returns `QuestionError` for blank prompts/answers, or a multiple-choice
    /// question whose answer is missing from its options.
    pub fn validate(self) -> Result<Question, QuestionError> {
        let id = QuestionId::new(self.id);
        if self.prompt.trim().is_empty() {
            return Err(QuestionError::EmptyPrompt(id));
        }
        if self.answer.trim().is_empty() {
            return Err(QuestionError::EmptyAnswer(id));
        }
        if let QuestionKind::MultipleChoice { options } = &self.kind {
            if options.len() < 2 {
                return Err(QuestionError::TooFewOptions(id));
            }
            let accepted = normalize_answer(&self.answer);
            if !options.iter().any(|opt| normalize_answer(opt) == accepted) {
                return Err(QuestionError::AnswerNotAnOption(id));
            }
        }

        Ok(Question {
            id,
            kind: self.kind,
            prompt: self.prompt,
            source: self.source.filter(|s| !s.trim().is_empty()),
            answer: self.answer,
            explanation: self.explanation,
        })
    }
}

/// A single test question for a proficiency level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    kind: QuestionKind,
    prompt: String,
    source: Option<String>,
    answer: String,
    explanation: String,
}

impl Question {
    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn kind(&self) -> &QuestionKind {
        &self.kind
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    #[must_use]
    pub fn answer(&self) -> &str {
        &self.answer
    }

    #[must_use]
    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    /// Exact match after trimming and case folding.
    #[must_use]
    pub fn accepts(&self, given: &str) -> bool {
        normalize_answer(given) == normalize_answer(&self.answer)
    }
}

fn normalize_answer(s: &str) -> String {
    s.trim().to_lowercase()
}
