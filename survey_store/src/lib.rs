//! Survey storage over a versioned remote file namespace.
//!
//! A survey lives as two CSV artifacts under `surveys/{id}/`: the
//! metadata file (identity, title, description and the question list as
//! an embedded JSON blob) and the responses file (one row per
//! submission). The [`codec`] module handles the text format, the
//! [`github`] module talks to the remote contents API with optimistic
//! per-file concurrency, and [`SurveyRepository`] composes the two into
//! list/load/save operations over whole survey entities.

pub mod codec;
pub mod github;
pub mod model;
pub mod repository;
pub mod summary;

pub use crate::github::{
    DirEntry, GithubConfig, GithubStore, RevisionedStore, StoreError, StoreResult, DEFAULT_BRANCH,
};
pub use crate::model::*;
pub use crate::repository::{generate_id, SurveyRepository, SURVEYS_ROOT};
pub use crate::summary::{summarize, summary_to_json, QuestionSummary, SurveySummary};
