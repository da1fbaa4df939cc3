// ********* Survey data structures ***********

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// The kind of a question, which decides how answers are captured and
/// how they are folded back when reading the responses file.
///
/// The serialized names below are the type tags used inside the
/// questions blob of the metadata file.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Serialize, Deserialize)]
pub enum QuestionKind {
    /// A single line of free text.
    #[serde(rename = "short-text")]
    ShortText,
    /// A longer free-text answer.
    #[serde(rename = "long-text")]
    LongText,
    /// Exactly one of the declared options.
    #[serde(rename = "single-choice")]
    SingleChoice,
    /// Any subset of the declared options.
    #[serde(rename = "multi-choice")]
    MultiChoice,
}

impl QuestionKind {
    /// Free-text kinds are listed verbatim in result summaries, choice
    /// kinds are tallied.
    pub fn is_choice(&self) -> bool {
        matches!(self, QuestionKind::SingleChoice | QuestionKind::MultiChoice)
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub text: String,
    /// Only meaningful for the choice kinds. A choice question with no
    /// options is malformed but the codec passes it through untouched.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

/// One answer as given by a respondent.
///
/// Multi-choice questions carry a set of selected options, everything
/// else is a plain string. Matching on this enum is exhaustive, so
/// rendering and aggregation code cannot forget a case.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Answer {
    Text(String),
    Selected(BTreeSet<String>),
}

impl Answer {
    pub fn text(value: impl Into<String>) -> Answer {
        Answer::Text(value.into())
    }

    pub fn selected<I, S>(values: I) -> Answer
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Answer::Selected(values.into_iter().map(|s| s.into()).collect())
    }
}

/// A single submission. Answers are keyed by question id; question text
/// is only ever used for display and for the public responses header.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct SurveyResponse {
    pub id: String,
    pub answers: BTreeMap<String, Answer>,
}

/// A survey with its full response set. The whole entity is persisted on
/// every save; there is no separate lifecycle for individual responses.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct Survey {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Order is significant: it defines the column order of the
    /// responses file.
    pub questions: Vec<Question>,
    pub responses: Vec<SurveyResponse>,
}
