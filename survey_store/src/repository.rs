// Maps survey entities onto the two-file-per-survey namespace and
// drives the codec and the store together.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info};

use crate::codec;
use crate::github::{RevisionedStore, StoreResult};
use crate::model::{Answer, Question, Survey, SurveyResponse};

/// Root of the survey namespace in the remote repository.
pub const SURVEYS_ROOT: &str = "surveys";

fn metadata_path(id: &str) -> String {
    format!("{}/{}/survey.csv", SURVEYS_ROOT, id)
}

fn responses_path(id: &str) -> String {
    format!("{}/{}/responses.csv", SURVEYS_ROOT, id)
}

/// Generates an identifier for a new survey or response. Millisecond
/// timestamps are unique enough at this scale and sort chronologically.
pub fn generate_id() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
        .to_string()
}

/// Survey persistence over any [`RevisionedStore`].
///
/// Metadata and responses are written as two independent revisioned
/// commits, never as an atomic pair. A crash between the two leaves a
/// partially updated survey that later readers will see as-is.
pub struct SurveyRepository<S: RevisionedStore> {
    store: S,
}

impl<S: RevisionedStore> SurveyRepository<S> {
    pub fn new(store: S) -> SurveyRepository<S> {
        SurveyRepository { store }
    }

    /// The identifiers of all stored surveys, in listing order. An
    /// absent namespace lists as empty, and placeholder files under the
    /// root are skipped.
    pub fn list(&self) -> StoreResult<Vec<String>> {
        let entries = self.store.list_dir(SURVEYS_ROOT)?;
        let ids: Vec<String> = entries
            .into_iter()
            .filter(|e| e.is_dir())
            .map(|e| e.name)
            .collect();
        debug!("list: {} surveys", ids.len());
        Ok(ids)
    }

    /// Loads a survey with its full response set.
    ///
    /// An absent or rowless metadata file reports the whole survey as
    /// absent. An absent responses file is a survey with zero responses;
    /// a survey can legitimately never have been answered, but it cannot
    /// legitimately lack metadata.
    pub fn load(&self, id: &str) -> StoreResult<Option<Survey>> {
        let metadata = match self.store.read(&metadata_path(id))? {
            Some(content) => content,
            None => return Ok(None),
        };
        let mut survey = match codec::decode_metadata(&metadata) {
            Some(survey) => survey,
            None => return Ok(None),
        };
        if let Some(content) = self.store.read(&responses_path(id))? {
            survey.responses = codec::decode_responses(&content, &survey.questions);
        }
        debug!(
            "load: survey {} with {} questions, {} responses",
            survey.id,
            survey.questions.len(),
            survey.responses.len()
        );
        Ok(Some(survey))
    }

    /// Persists the survey in full: one commit for the metadata, one for
    /// the responses.
    pub fn save(&self, survey: &Survey) -> StoreResult<()> {
        self.store.write(
            &metadata_path(&survey.id),
            &codec::encode_metadata(survey),
            &format!("Update survey {} metadata", survey.id),
        )?;
        self.store.write(
            &responses_path(&survey.id),
            &codec::encode_responses(survey),
            &format!("Update survey {} responses", survey.id),
        )?;
        info!("save: survey {} ({} responses)", survey.id, survey.responses.len());
        Ok(())
    }

    /// Creates and persists a survey with a fresh identifier and no
    /// responses.
    pub fn create(
        &self,
        title: String,
        description: String,
        questions: Vec<Question>,
    ) -> StoreResult<Survey> {
        let survey = Survey {
            id: generate_id(),
            title,
            description,
            questions,
            responses: Vec::new(),
        };
        self.save(&survey)?;
        Ok(survey)
    }

    /// Appends one response to a stored survey: read-modify-write over
    /// the full response list. Returns the stored response, or `None`
    /// when the survey does not exist.
    ///
    /// Two concurrent submissions to the same survey race: both read the
    /// same response list and the second write can silently drop the
    /// first submission. The per-file revision check does not close this
    /// window.
    pub fn submit_response(
        &self,
        id: &str,
        answers: BTreeMap<String, Answer>,
    ) -> StoreResult<Option<SurveyResponse>> {
        let mut survey = match self.load(id)? {
            Some(survey) => survey,
            None => return Ok(None),
        };
        let response = SurveyResponse {
            id: generate_id(),
            answers,
        };
        survey.responses.push(response.clone());
        self.save(&survey)?;
        Ok(Some(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::{DirEntry, RevisionedStore, RevisionConflictSnafu, StoreResult};
    use crate::model::{Answer, Question, QuestionKind};
    use std::cell::RefCell;
    use std::collections::{BTreeMap, BTreeSet};

    /// A revisioned namespace held in memory, with the same observable
    /// contract as the remote one.
    #[derive(Default)]
    struct MemoryStore {
        files: RefCell<BTreeMap<String, (String, u64)>>,
    }

    impl MemoryStore {
        fn seed(&self, path: &str, content: &str) {
            self.files
                .borrow_mut()
                .insert(path.to_string(), (content.to_string(), 0));
        }

        fn paths(&self) -> Vec<String> {
            self.files.borrow().keys().cloned().collect()
        }
    }

    impl RevisionedStore for MemoryStore {
        fn read(&self, path: &str) -> StoreResult<Option<String>> {
            Ok(self.files.borrow().get(path).map(|(c, _)| c.clone()))
        }

        fn write(&self, path: &str, content: &str, _message: &str) -> StoreResult<()> {
            let mut files = self.files.borrow_mut();
            let revision = files.get(path).map(|(_, r)| r + 1).unwrap_or(0);
            files.insert(path.to_string(), (content.to_string(), revision));
            Ok(())
        }

        fn list_dir(&self, path: &str) -> StoreResult<Vec<DirEntry>> {
            let prefix = format!("{}/", path);
            let mut seen: BTreeSet<(String, bool)> = BTreeSet::new();
            for key in self.files.borrow().keys() {
                if let Some(rest) = key.strip_prefix(&prefix) {
                    match rest.split_once('/') {
                        Some((name, _)) => {
                            seen.insert((name.to_string(), true));
                        }
                        None => {
                            seen.insert((rest.to_string(), false));
                        }
                    }
                }
            }
            Ok(seen
                .into_iter()
                .map(|(name, is_dir)| DirEntry {
                    name,
                    kind: if is_dir { "dir" } else { "file" }.to_string(),
                })
                .collect())
        }
    }

    /// Rejects every write, the way a remote rejects a stale revision.
    struct StaleStore;

    impl RevisionedStore for StaleStore {
        fn read(&self, _path: &str) -> StoreResult<Option<String>> {
            Ok(None)
        }

        fn write(&self, path: &str, _content: &str, _message: &str) -> StoreResult<()> {
            RevisionConflictSnafu { path }.fail()
        }

        fn list_dir(&self, _path: &str) -> StoreResult<Vec<DirEntry>> {
            Ok(Vec::new())
        }
    }

    fn sample_survey(id: &str) -> Survey {
        Survey {
            id: id.to_string(),
            title: "Team lunch".to_string(),
            description: "Weekly food poll".to_string(),
            questions: vec![
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
            ],
            responses: vec![SurveyResponse {
                id: "r1".to_string(),
                answers: [
                    ("q1".to_string(), Answer::text("Red")),
                    ("q2".to_string(), Answer::selected(["Olives", "Onions"])),
                ]
                .into_iter()
                .collect(),
            }],
        }
    }

    #[test]
    fn missing_metadata_reports_absent_survey() {
        let repository = SurveyRepository::new(MemoryStore::default());
        assert_eq!(repository.load("nope").unwrap(), None);
    }

    #[test]
    fn missing_responses_file_means_zero_responses() {
        let store = MemoryStore::default();
        let mut survey = sample_survey("77");
        survey.responses.clear();
        store.seed("surveys/77/survey.csv", &codec::encode_metadata(&survey));

        let repository = SurveyRepository::new(store);
        let loaded = repository.load("77").unwrap().unwrap();
        assert_eq!(loaded.title, "Team lunch");
        assert!(loaded.responses.is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let repository = SurveyRepository::new(MemoryStore::default());
        let survey = sample_survey("42");
        repository.save(&survey).unwrap();
        assert_eq!(repository.load("42").unwrap(), Some(survey));
    }

    #[test]
    fn save_writes_both_files() {
        let repository = SurveyRepository::new(MemoryStore::default());
        repository.save(&sample_survey("42")).unwrap();
        assert_eq!(
            repository.store.paths(),
            vec![
                "surveys/42/responses.csv".to_string(),
                "surveys/42/survey.csv".to_string()
            ]
        );
        assert_eq!(repository.list().unwrap(), vec!["42".to_string()]);
    }

    #[test]
    fn saves_to_distinct_surveys_do_not_interfere() {
        let repository = SurveyRepository::new(MemoryStore::default());
        let a = sample_survey("100");
        let b = sample_survey("200");
        repository.save(&a).unwrap();
        repository.save(&b).unwrap();
        assert_eq!(repository.load("100").unwrap(), Some(a));
        assert_eq!(repository.load("200").unwrap(), Some(b));
        assert_eq!(
            repository.list().unwrap(),
            vec!["100".to_string(), "200".to_string()]
        );
    }

    #[test]
    fn list_skips_placeholder_files() {
        let store = MemoryStore::default();
        store.seed("surveys/.gitkeep", "");
        let survey = sample_survey("42");
        store.seed("surveys/42/survey.csv", &codec::encode_metadata(&survey));

        let repository = SurveyRepository::new(store);
        assert_eq!(repository.list().unwrap(), vec!["42".to_string()]);
    }

    #[test]
    fn list_is_empty_when_namespace_is_absent() {
        let repository = SurveyRepository::new(MemoryStore::default());
        assert!(repository.list().unwrap().is_empty());
    }

    #[test]
    fn submit_response_appends_to_the_stored_set() {
        let repository = SurveyRepository::new(MemoryStore::default());
        repository.save(&sample_survey("42")).unwrap();

        let answers: BTreeMap<String, Answer> = [
            ("q1".to_string(), Answer::text("Blue")),
            ("q2".to_string(), Answer::selected(["Olives"])),
        ]
        .into_iter()
        .collect();
        let stored = repository.submit_response("42", answers.clone()).unwrap();
        let stored = stored.expect("survey exists");
        assert!(!stored.id.is_empty());

        let loaded = repository.load("42").unwrap().unwrap();
        assert_eq!(loaded.responses.len(), 2);
        assert_eq!(loaded.responses[1].answers, answers);
    }

    #[test]
    fn submit_response_to_unknown_survey_is_absent() {
        let repository = SurveyRepository::new(MemoryStore::default());
        let outcome = repository.submit_response("nope", BTreeMap::new()).unwrap();
        assert_eq!(outcome, None);
    }

    #[test]
    fn stale_revision_surfaces_as_conflict() {
        let repository = SurveyRepository::new(StaleStore);
        let err = repository.save(&sample_survey("42")).unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn create_mints_an_id_and_persists() {
        let repository = SurveyRepository::new(MemoryStore::default());
        let survey = repository
            .create(
                "Snacks".to_string(),
                String::new(),
                sample_survey("x").questions,
            )
            .unwrap();
        assert!(!survey.id.is_empty());
        assert!(survey.responses.is_empty());
        let loaded = repository.load(&survey.id).unwrap().unwrap();
        assert_eq!(loaded, survey);
    }
}
