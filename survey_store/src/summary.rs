// Tabulation of a survey's responses, one summary per question.

use std::collections::HashMap;

use serde_json::json;
use serde_json::Value as JSValue;

use crate::model::{Answer, QuestionKind, Survey};

/// The tabulated outcome for one question.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum QuestionSummary {
    /// Free-text answers are listed verbatim, one entry per response,
    /// in response order. A missing answer lists as an empty entry.
    FreeText {
        question_id: String,
        text: String,
        entries: Vec<String>,
    },
    /// Choice answers are tallied. For single-choice questions the
    /// counts cover the observed answer values in first-seen order; for
    /// multi-choice questions they cover the declared options, and a
    /// response counts toward every option it selected.
    Choice {
        question_id: String,
        text: String,
        counts: Vec<(String, u64)>,
    },
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SurveySummary {
    pub survey_id: String,
    pub title: String,
    pub total_responses: u64,
    pub questions: Vec<QuestionSummary>,
}

/// Tabulates every question of the survey against its response set.
pub fn summarize(survey: &Survey) -> SurveySummary {
    let mut questions: Vec<QuestionSummary> = Vec::new();
    for question in survey.questions.iter() {
        let summary = match question.kind {
            QuestionKind::ShortText | QuestionKind::LongText => QuestionSummary::FreeText {
                question_id: question.id.clone(),
                text: question.text.clone(),
                entries: survey
                    .responses
                    .iter()
                    .map(|r| match r.answers.get(&question.id) {
                        Some(Answer::Text(s)) => s.clone(),
                        // A selection under a free-text question should
                        // not happen; render it the way the file does.
                        Some(Answer::Selected(values)) => {
                            values.iter().cloned().collect::<Vec<String>>().join(";")
                        }
                        None => String::new(),
                    })
                    .collect(),
            },
            QuestionKind::SingleChoice => {
                let mut order: Vec<String> = Vec::new();
                let mut counts: HashMap<String, u64> = HashMap::new();
                for response in survey.responses.iter() {
                    let value = match response.answers.get(&question.id) {
                        Some(Answer::Text(s)) => s.clone(),
                        Some(Answer::Selected(values)) => {
                            values.iter().cloned().collect::<Vec<String>>().join(";")
                        }
                        None => String::new(),
                    };
                    if !counts.contains_key(&value) {
                        order.push(value.clone());
                    }
                    *counts.entry(value).or_insert(0) += 1;
                }
                QuestionSummary::Choice {
                    question_id: question.id.clone(),
                    text: question.text.clone(),
                    counts: order
                        .into_iter()
                        .map(|value| {
                            let count = counts.get(&value).cloned().unwrap_or(0);
                            (value, count)
                        })
                        .collect(),
                }
            }
            QuestionKind::MultiChoice => {
                let counts: Vec<(String, u64)> = question
                    .options
                    .iter()
                    .map(|option| {
                        let count = survey
                            .responses
                            .iter()
                            .filter(|r| match r.answers.get(&question.id) {
                                Some(Answer::Selected(values)) => values.contains(option),
                                Some(Answer::Text(s)) => s == option,
                                None => false,
                            })
                            .count() as u64;
                        (option.clone(), count)
                    })
                    .collect();
                QuestionSummary::Choice {
                    question_id: question.id.clone(),
                    text: question.text.clone(),
                    counts,
                }
            }
        };
        questions.push(summary);
    }

    SurveySummary {
        survey_id: survey.id.clone(),
        title: survey.title.clone(),
        total_responses: survey.responses.len() as u64,
        questions,
    }
}

/// Renders a summary as JSON, for printing or reference comparison.
/// Counts are emitted as an ordered array so the output is stable.
pub fn summary_to_json(summary: &SurveySummary) -> JSValue {
    let questions: Vec<JSValue> = summary
        .questions
        .iter()
        .map(|qs| match qs {
            QuestionSummary::FreeText {
                question_id,
                text,
                entries,
            } => json!({
                "id": question_id,
                "text": text,
                "entries": entries,
            }),
            QuestionSummary::Choice {
                question_id,
                text,
                counts,
            } => {
                let tally: Vec<JSValue> = counts
                    .iter()
                    .map(|(option, count)| json!({"option": option, "count": count}))
                    .collect();
                json!({
                    "id": question_id,
                    "text": text,
                    "tally": tally,
                })
            }
        })
        .collect();
    json!({
        "surveyId": summary.survey_id,
        "title": summary.title,
        "totalResponses": summary.total_responses,
        "questions": questions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Answer, Question, QuestionKind, Survey, SurveyResponse};

    fn survey() -> Survey {
        let questions = vec![
            Question {
                id: "q1".to_string(),
                kind: QuestionKind::SingleChoice,
                text: "Color?".to_string(),
                options: vec!["Red".to_string(), "Blue".to_string()],
            },
            Question {
                id: "q2".to_string(),
                kind: QuestionKind::MultiChoice,
                text: "Toppings?".to_string(),
                options: vec!["Olives".to_string(), "Onions".to_string()],
            },
            Question {
                id: "q3".to_string(),
                kind: QuestionKind::LongText,
                text: "Anything else?".to_string(),
                options: Vec::new(),
            },
        ];
        let responses = vec![
            SurveyResponse {
                id: "r1".to_string(),
                answers: [
                    ("q1".to_string(), Answer::text("Red")),
                    ("q2".to_string(), Answer::selected(["Olives", "Onions"])),
                    ("q3".to_string(), Answer::text("More cheese")),
                ]
                .into_iter()
                .collect(),
            },
            SurveyResponse {
                id: "r2".to_string(),
                answers: [
                    ("q1".to_string(), Answer::text("Red")),
                    ("q2".to_string(), Answer::selected(["Olives"])),
                ]
                .into_iter()
                .collect(),
            },
            SurveyResponse {
                id: "r3".to_string(),
                answers: [("q1".to_string(), Answer::text("Blue"))]
                    .into_iter()
                    .collect(),
            },
        ];
        Survey {
            id: "42".to_string(),
            title: "Lunch".to_string(),
            description: String::new(),
            questions,
            responses,
        }
    }

    #[test]
    fn single_choice_counts_observed_values_in_order() {
        let summary = summarize(&survey());
        assert_eq!(summary.total_responses, 3);
        assert_eq!(
            summary.questions[0],
            QuestionSummary::Choice {
                question_id: "q1".to_string(),
                text: "Color?".to_string(),
                counts: vec![("Red".to_string(), 2), ("Blue".to_string(), 1)],
            }
        );
    }

    #[test]
    fn multi_choice_counts_declared_options() {
        let summary = summarize(&survey());
        assert_eq!(
            summary.questions[1],
            QuestionSummary::Choice {
                question_id: "q2".to_string(),
                text: "Toppings?".to_string(),
                counts: vec![("Olives".to_string(), 2), ("Onions".to_string(), 1)],
            }
        );
    }

    #[test]
    fn free_text_lists_verbatim_entries() {
        let summary = summarize(&survey());
        assert_eq!(
            summary.questions[2],
            QuestionSummary::FreeText {
                question_id: "q3".to_string(),
                text: "Anything else?".to_string(),
                entries: vec![
                    "More cheese".to_string(),
                    String::new(),
                    String::new()
                ],
            }
        );
    }

    #[test]
    fn json_rendering_is_stable() {
        let summary = summarize(&survey());
        let js = summary_to_json(&summary);
        assert_eq!(js["surveyId"], "42");
        assert_eq!(js["totalResponses"], 3);
        assert_eq!(js["questions"][0]["tally"][0]["option"], "Red");
        assert_eq!(js["questions"][0]["tally"][0]["count"], 2);
        assert_eq!(js["questions"][2]["entries"][0], "More cheese");
    }
}
