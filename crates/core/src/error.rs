use thiserror::Error;

use crate::catalog::CatalogError;
use crate::model::{ProfileError, ProgressError, QuestionError, StoryError, TestResultError};

/// Any validation failure raised by the domain model.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Story(#[from] StoryError),
    #[error(transparent)]
    Question(#[from] QuestionError),
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    TestResult(#[from] TestResultError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}
