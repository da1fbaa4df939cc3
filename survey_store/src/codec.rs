// Primitives for encoding surveys to and from the persisted CSV pair.
//
// Everything in this module is pure: the repository layer decides where
// the text goes. Two artifacts exist per survey so that appending
// responses never rewrites the survey metadata:
//  - survey.csv     id,title,description,questions (one data row)
//  - responses.csv  response_id plus one column per question, in order

use std::collections::BTreeMap;

use log::warn;

use crate::model::{Answer, Question, QuestionKind, Survey, SurveyResponse};

/// Fixed header of the metadata file.
pub const METADATA_HEADER: &str = "id,title,description,questions";

/// First column of the responses file.
pub const RESPONSE_ID_HEADER: &str = "response_id";

/// Separator between the selected options of a multi-choice answer,
/// inside a single CSV field.
pub const MULTI_VALUE_SEPARATOR: char = ';';

/// Quotes a field if it contains a delimiter, a quote or a newline, and
/// doubles any embedded quote. Everything else passes through verbatim.
fn escape_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn encode_row(fields: &[String]) -> String {
    let escaped: Vec<String> = fields.iter().map(|f| escape_field(f)).collect();
    escaped.join(",")
}

/// Splits one logical row into its fields.
///
/// Single pass over the characters with an inside-quotes flag: a comma
/// outside quotes closes the field, a doubled quote inside quotes is a
/// literal quote, any other quote toggles the flag. The last field is
/// always flushed, even when empty, so trailing empty columns survive.
pub fn decode_row(line: &str) -> Vec<String> {
    let mut fields: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut inside_quotes = false;

    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                if inside_quotes && chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    inside_quotes = !inside_quotes;
                }
            }
            ',' if !inside_quotes => {
                fields.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

/// Encodes the survey metadata: the fixed header and a single data row.
/// The question list is serialized as a JSON blob and escaped as one
/// field like any other.
pub fn encode_metadata(survey: &Survey) -> String {
    let questions = serde_json::to_string(&survey.questions)
        .expect("a list of plain string records always serializes");
    let row = [
        survey.id.clone(),
        survey.title.clone(),
        survey.description.clone(),
        questions,
    ];
    format!("{}\n{}", METADATA_HEADER, encode_row(&row))
}

/// Decodes a metadata file into a survey with an empty response set.
///
/// Returns `None` when there is no data row at all. An unreadable
/// questions blob degrades to an empty question list with a warning
/// rather than an error, so one corrupt field never makes the whole
/// survey unreadable.
pub fn decode_metadata(content: &str) -> Option<Survey> {
    // Rows are split on raw newlines, so a quoted field containing a
    // newline spans two physical lines and does not survive this split.
    let mut lines = content.trim().lines();
    lines.next()?;
    let row = lines.next()?;

    let mut fields = decode_row(row).into_iter();
    let id = fields.next().unwrap_or_default();
    let title = fields.next().unwrap_or_default();
    let description = fields.next().unwrap_or_default();
    let questions_blob = fields.next().unwrap_or_default();

    let questions: Vec<Question> = match serde_json::from_str(&questions_blob) {
        Ok(qs) => qs,
        Err(e) => {
            warn!(
                "decode_metadata: unreadable questions blob for survey {:?}: {}",
                id, e
            );
            Vec::new()
        }
    };

    Some(Survey {
        id,
        title,
        description,
        questions,
        responses: Vec::new(),
    })
}

/// Encodes the response set. The header lists the question texts in
/// question order; two questions with identical text therefore produce
/// duplicate headers. This is a known limitation of the public format,
/// kept for legibility. Decoding goes by position, never by header.
pub fn encode_responses(survey: &Survey) -> String {
    let mut header: Vec<String> = vec![RESPONSE_ID_HEADER.to_string()];
    header.extend(survey.questions.iter().map(|q| q.text.clone()));

    let mut lines: Vec<String> = vec![encode_row(&header)];
    for response in survey.responses.iter() {
        let mut row: Vec<String> = vec![response.id.clone()];
        for question in survey.questions.iter() {
            // Answers for ids that are not in the question list are
            // dropped; a missing answer encodes as an empty field.
            let field = match response.answers.get(&question.id) {
                Some(Answer::Selected(values)) => {
                    let parts: Vec<String> = values.iter().cloned().collect();
                    parts.join(&MULTI_VALUE_SEPARATOR.to_string())
                }
                Some(Answer::Text(s)) => s.clone(),
                None => String::new(),
            };
            row.push(field);
        }
        lines.push(encode_row(&row));
    }
    lines.join("\n")
}

/// Decodes a responses file against the question list of its survey.
///
/// A field is folded into the multi-valued variant exactly when the
/// question at that position is multi-choice; everything else is kept
/// as the raw string, defaulting to empty when the row is short.
/// A header-only file decodes to an empty response set.
pub fn decode_responses(content: &str, questions: &[Question]) -> Vec<SurveyResponse> {
    let mut responses: Vec<SurveyResponse> = Vec::new();
    for line in content.trim().lines().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = decode_row(line).into_iter();
        let id = match fields.next() {
            Some(x) => x,
            None => continue,
        };
        let values: Vec<String> = fields.collect();

        let mut answers: BTreeMap<String, Answer> = BTreeMap::new();
        for (idx, question) in questions.iter().enumerate() {
            let raw = values.get(idx).cloned().unwrap_or_default();
            let answer = match question.kind {
                QuestionKind::MultiChoice => Answer::Selected(
                    raw.split(MULTI_VALUE_SEPARATOR)
                        .filter(|s| !s.is_empty())
                        .map(|s| s.to_string())
                        .collect(),
                ),
                _ => Answer::Text(raw),
            };
            answers.insert(question.id.clone(), answer);
        }
        responses.push(SurveyResponse { id, answers });
    }
    responses
}
