use clap::{Parser, Subcommand};

/// This is a survey authoring and tabulation program. Surveys and their
/// responses are stored as CSV files in a git-hosted repository, reached
/// through its contents API.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) A JSON file with the connection settings:
    /// githubOwner, githubRepo, githubToken and optionally branch. When not
    /// provided, the GITHUB_OWNER, GITHUB_REPO, GITHUB_TOKEN and
    /// GITHUB_BRANCH environment variables are used instead.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Creates a new survey from a definition file and prints its identifier.
    Create {
        /// (file path) The survey definition in JSON format: title, description
        /// and the list of questions.
        #[clap(short, long, value_parser)]
        definition: String,
    },
    /// Lists the identifiers of all stored surveys.
    List,
    /// Prints a stored survey (metadata, questions and response count) as JSON.
    Show {
        /// The identifier of the survey.
        #[clap(short, long, value_parser)]
        id: String,
    },
    /// Appends one response to a stored survey.
    Respond {
        /// The identifier of the survey.
        #[clap(short, long, value_parser)]
        id: String,
        /// (file path) A JSON object mapping question ids to an answer: a string,
        /// or an array of selected options for multi-choice questions.
        #[clap(short, long, value_parser)]
        answers: String,
    },
    /// Tabulates the responses of a survey and prints the summary as JSON.
    Results {
        /// The identifier of the survey.
        #[clap(short, long, value_parser)]
        id: String,
        /// (file path) A reference summary in JSON format. If provided, qsurvey
        /// will check that the tabulated output matches the reference.
        #[clap(short, long, value_parser)]
        reference: Option<String>,
        /// (file path or empty) If specified, the summary will be written in
        /// JSON format to the given location instead of the standard output.
        #[clap(short, long, value_parser)]
        out: Option<String>,
    },
}
