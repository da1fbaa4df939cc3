use log::{debug, info, warn};

use std::collections::BTreeMap;
use std::fs;

use serde::Deserialize;
use serde_json::json;
use serde_json::Value as JSValue;
use snafu::{prelude::*, Snafu};
use text_diff::print_diff;

use survey_store::{
    summarize, summary_to_json, Answer, GithubConfig, GithubStore, Question, StoreError, Survey,
    SurveyRepository,
};

use crate::args::{Args, Command};

#[derive(Debug, Snafu)]
pub enum AppError {
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing file {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error writing file {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error rendering JSON output"))]
    RenderingJson { source: serde_json::Error },
    #[snafu(display("{source}"))]
    Store { source: StoreError },
    #[snafu(display("Survey {id} was not found"))]
    SurveyNotFound { id: String },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

type AppResult<T> = Result<T, AppError>;

/// The operator-authored part of a survey. Identifier and responses are
/// never part of a definition; both are minted by the repository.
#[derive(Eq, PartialEq, Debug, Clone, Deserialize)]
pub struct SurveyDefinition {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub questions: Vec<Question>,
}

/// An answer as written in an answers file: a plain string, or an array
/// of selected options.
#[derive(Eq, PartialEq, Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawAnswer {
    One(String),
    Many(Vec<String>),
}

pub fn run(args: Args) -> AppResult<()> {
    let config = load_config(args.config.as_deref())?;
    let store = GithubStore::new(config).context(StoreSnafu {})?;
    let repository = SurveyRepository::new(store);

    match args.command {
        Command::Create { definition } => run_create(&repository, &definition),
        Command::List => run_list(&repository),
        Command::Show { id } => run_show(&repository, &id),
        Command::Respond { id, answers } => run_respond(&repository, &id, &answers),
        Command::Results { id, reference, out } => {
            run_results(&repository, &id, reference.as_deref(), out.as_deref())
        }
    }
}

fn load_config(path: Option<&str>) -> AppResult<GithubConfig> {
    match path {
        Some(path) => {
            let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
            let config: GithubConfig =
                serde_json::from_str(&contents).context(ParsingJsonSnafu { path })?;
            debug!("load_config: read settings from {}", path);
            Ok(config)
        }
        None => GithubConfig::from_env().context(StoreSnafu {}),
    }
}

fn run_create(
    repository: &SurveyRepository<GithubStore>,
    definition_path: &str,
) -> AppResult<()> {
    let contents = fs::read_to_string(definition_path).context(OpeningJsonSnafu {
        path: definition_path,
    })?;
    let definition: SurveyDefinition = serde_json::from_str(&contents).context(ParsingJsonSnafu {
        path: definition_path,
    })?;
    info!(
        "Creating survey {:?} with {} questions",
        definition.title,
        definition.questions.len()
    );

    let survey = repository
        .create(definition.title, definition.description, definition.questions)
        .context(StoreSnafu {})?;
    println!("{}", survey.id);
    Ok(())
}

fn run_list(repository: &SurveyRepository<GithubStore>) -> AppResult<()> {
    let ids = repository.list().context(StoreSnafu {})?;
    info!("Found {} surveys", ids.len());
    for id in ids {
        println!("{}", id);
    }
    Ok(())
}

fn run_show(repository: &SurveyRepository<GithubStore>, id: &str) -> AppResult<()> {
    let survey = repository
        .load(id)
        .context(StoreSnafu {})?
        .context(SurveyNotFoundSnafu { id })?;
    let js = survey_to_json(&survey);
    let pretty = serde_json::to_string_pretty(&js).context(RenderingJsonSnafu {})?;
    println!("{}", pretty);
    Ok(())
}

fn run_respond(
    repository: &SurveyRepository<GithubStore>,
    id: &str,
    answers_path: &str,
) -> AppResult<()> {
    let contents = fs::read_to_string(answers_path).context(OpeningJsonSnafu {
        path: answers_path,
    })?;
    let raw: BTreeMap<String, RawAnswer> =
        serde_json::from_str(&contents).context(ParsingJsonSnafu { path: answers_path })?;

    let survey = repository
        .load(id)
        .context(StoreSnafu {})?
        .context(SurveyNotFoundSnafu { id })?;

    let answers = validate_answers(&survey, raw);
    let response = repository
        .submit_response(id, answers)
        .context(StoreSnafu {})?
        .context(SurveyNotFoundSnafu { id })?;
    info!("Recorded response {} for survey {}", response.id, id);
    println!("{}", response.id);
    Ok(())
}

/// Turns raw answers into typed ones, guided by the question kinds.
/// Answers for unknown question ids are dropped with a warning; the
/// storage layer would drop them silently anyway.
fn validate_answers(
    survey: &Survey,
    raw: BTreeMap<String, RawAnswer>,
) -> BTreeMap<String, Answer> {
    let mut answers: BTreeMap<String, Answer> = BTreeMap::new();
    for (question_id, value) in raw {
        if !survey.questions.iter().any(|q| q.id == question_id) {
            warn!(
                "validate_answers: survey {} has no question {:?}, dropping the answer",
                survey.id, question_id
            );
            continue;
        }
        let answer = match value {
            RawAnswer::One(s) => Answer::Text(s),
            RawAnswer::Many(values) => Answer::selected(values),
        };
        answers.insert(question_id, answer);
    }
    answers
}

fn run_results(
    repository: &SurveyRepository<GithubStore>,
    id: &str,
    reference_path: Option<&str>,
    out_path: Option<&str>,
) -> AppResult<()> {
    let survey = repository
        .load(id)
        .context(StoreSnafu {})?
        .context(SurveyNotFoundSnafu { id })?;

    let summary = summarize(&survey);
    let result_js = summary_to_json(&summary);
    let pretty_js_stats =
        serde_json::to_string_pretty(&result_js).context(RenderingJsonSnafu {})?;

    match out_path {
        Some(path) if path != "stdout" => {
            fs::write(path, &pretty_js_stats).context(WritingOutputSnafu { path })?;
            info!("Wrote summary for survey {} to {}", id, path);
        }
        _ => {
            println!("{}", pretty_js_stats);
        }
    }

    // The reference summary, if provided for comparison
    if let Some(path) = reference_path {
        let reference = read_reference(path)?;
        let pretty_js_reference =
            serde_json::to_string_pretty(&reference).context(RenderingJsonSnafu {})?;
        if pretty_js_reference != pretty_js_stats {
            warn!("Found differences with the reference summary");
            print_diff(pretty_js_reference.as_str(), pretty_js_stats.as_ref(), "\n");
            whatever!("Difference detected between tabulated summary and reference summary");
        }
        info!("Tabulated summary matches the reference at {}", path);
    }

    Ok(())
}

fn read_reference(path: &str) -> AppResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(&contents).context(ParsingJsonSnafu { path })?;
    Ok(js)
}

fn survey_to_json(survey: &Survey) -> JSValue {
    let questions: Vec<JSValue> = survey
        .questions
        .iter()
        .map(|q| serde_json::to_value(q).unwrap_or(JSValue::Null))
        .collect();
    json!({
        "id": survey.id,
        "title": survey.title,
        "description": survey.description,
        "questions": questions,
        "responseCount": survey.responses.len(),
    })
}
