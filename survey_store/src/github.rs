// The remote side of the store: a revisioned file namespace reached
// through the GitHub contents API.

use std::env;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use log::{debug, info};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use snafu::{ensure, prelude::*, Snafu};

/// Branch that holds the survey data when none is configured.
pub const DEFAULT_BRANCH: &str = "gh-pages";

const API_VERSION: &str = "2022-11-28";
const ACCEPT_HEADER: &str = "application/vnd.github.v3+json";
const USER_AGENT: &str = concat!("qsurvey/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StoreError {
    #[snafu(display("configuration value {name} is missing"))]
    MissingConfig { name: &'static str },
    #[snafu(display("could not build the HTTP client"))]
    Client { source: reqwest::Error },
    #[snafu(display("request for {path} failed"))]
    Request {
        source: reqwest::Error,
        path: String,
    },
    #[snafu(display("remote returned status {status} for {path}"))]
    Status { status: u16, path: String },
    #[snafu(display("unexpected payload for {path}"))]
    Payload {
        source: reqwest::Error,
        path: String,
    },
    #[snafu(display("content of {path} is not valid base64"))]
    ContentEncoding {
        source: base64::DecodeError,
        path: String,
    },
    #[snafu(display("content of {path} is not valid UTF-8"))]
    ContentText {
        source: std::string::FromUtf8Error,
        path: String,
    },
    #[snafu(display("write to {path} was rejected: the revision tag is stale"))]
    RevisionConflict { path: String },
}

impl StoreError {
    /// A conflict means the remote moved between our read and our write.
    /// The caller may re-read and try again; nothing retries on its own.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::RevisionConflict { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One entry of a directory listing.
#[derive(Eq, PartialEq, Debug, Clone, Deserialize)]
pub struct DirEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl DirEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == "dir"
    }
}

/// Read and write text content at logical paths in a versioned remote
/// namespace.
///
/// The write contract is read-then-write: the implementation fetches the
/// current revision tag for the path (tolerating absence) and submits
/// the new content against it, so a write over a revision the writer
/// never observed fails with [`StoreError::RevisionConflict`]. There is
/// no automatic retry; callers decide whether a conflict is worth a
/// fresh read.
pub trait RevisionedStore {
    /// `Ok(None)` when nothing exists at the path. Absence is a normal
    /// outcome, not a failure.
    fn read(&self, path: &str) -> StoreResult<Option<String>>;

    /// Replaces the content at the path in a single revisioned commit.
    fn write(&self, path: &str, content: &str, message: &str) -> StoreResult<()>;

    /// Lists the entries directly under a directory-like path. An absent
    /// namespace lists as empty.
    fn list_dir(&self, path: &str) -> StoreResult<Vec<DirEntry>>;
}

/// Connection settings for the hosting repository.
///
/// The field names match the deployment's `config.json`.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    #[serde(rename = "githubOwner")]
    pub owner: String,
    #[serde(rename = "githubRepo")]
    pub repo: String,
    #[serde(rename = "githubToken")]
    pub token: String,
    #[serde(rename = "branch", default = "default_branch")]
    pub branch: String,
}

fn default_branch() -> String {
    DEFAULT_BRANCH.to_string()
}

impl GithubConfig {
    /// Reads the settings from `GITHUB_OWNER`, `GITHUB_REPO`,
    /// `GITHUB_TOKEN` and (optionally) `GITHUB_BRANCH`.
    pub fn from_env() -> StoreResult<GithubConfig> {
        Ok(GithubConfig {
            owner: require_env("GITHUB_OWNER")?,
            repo: require_env("GITHUB_REPO")?,
            token: require_env("GITHUB_TOKEN")?,
            branch: env::var("GITHUB_BRANCH").unwrap_or_else(|_| default_branch()),
        })
    }
}

fn require_env(name: &'static str) -> StoreResult<String> {
    match env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => MissingConfigSnafu { name }.fail(),
    }
}

// The GET endpoint answers with a list for directories and an object
// for files (and symlinks, which we treat as absent).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContentsPayload {
    Entries(Vec<DirEntry>),
    File(FilePayload),
}

#[derive(Debug, Deserialize)]
struct FilePayload {
    #[serde(rename = "type")]
    kind: String,
    sha: String,
    #[serde(default)]
    content: Option<String>,
}

/// Store backed by the contents API of a single repository and branch.
/// Every write is an externally visible commit on that branch.
#[derive(Debug)]
pub struct GithubStore {
    client: Client,
    config: GithubConfig,
}

impl GithubStore {
    /// Fails fast on blank owner/repo/token so that a misconfigured
    /// deployment never reaches the network.
    pub fn new(config: GithubConfig) -> StoreResult<GithubStore> {
        ensure!(
            !config.owner.trim().is_empty(),
            MissingConfigSnafu { name: "githubOwner" }
        );
        ensure!(
            !config.repo.trim().is_empty(),
            MissingConfigSnafu { name: "githubRepo" }
        );
        ensure!(
            !config.token.trim().is_empty(),
            MissingConfigSnafu { name: "githubToken" }
        );
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context(ClientSnafu {})?;
        Ok(GithubStore { client, config })
    }

    fn contents_url(&self, path: &str) -> String {
        format!(
            "https://api.github.com/repos/{}/{}/contents/{}",
            self.config.owner, self.config.repo, path
        )
    }

    fn get_contents(&self, path: &str) -> StoreResult<Option<ContentsPayload>> {
        let response = self
            .client
            .get(self.contents_url(path))
            .query(&[("ref", self.config.branch.as_str())])
            .header("Authorization", format!("token {}", self.config.token))
            .header("Accept", ACCEPT_HEADER)
            .header("X-GitHub-Api-Version", API_VERSION)
            .send()
            .context(RequestSnafu { path })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        ensure!(
            status.is_success(),
            StatusSnafu {
                status: status.as_u16(),
                path
            }
        );
        let payload: ContentsPayload = response.json().context(PayloadSnafu { path })?;
        Ok(Some(payload))
    }

    /// The current revision tag for a path, if the path exists as a file.
    fn revision(&self, path: &str) -> StoreResult<Option<String>> {
        match self.get_contents(path)? {
            Some(ContentsPayload::File(file)) => Ok(Some(file.sha)),
            _ => Ok(None),
        }
    }
}

/// The API wraps base64 content at 60 columns; strip the line breaks
/// before decoding.
fn decode_content(path: &str, raw: &str) -> StoreResult<String> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = BASE64
        .decode(compact.as_bytes())
        .context(ContentEncodingSnafu { path })?;
    String::from_utf8(bytes).context(ContentTextSnafu { path })
}

impl RevisionedStore for GithubStore {
    fn read(&self, path: &str) -> StoreResult<Option<String>> {
        match self.get_contents(path)? {
            None => Ok(None),
            // A directory where a file was expected reads as absent.
            Some(ContentsPayload::Entries(_)) => Ok(None),
            Some(ContentsPayload::File(file)) if file.kind == "file" => {
                let raw = file.content.unwrap_or_default();
                let text = decode_content(path, &raw)?;
                debug!("read: {} ({} bytes)", path, text.len());
                Ok(Some(text))
            }
            Some(ContentsPayload::File(file)) => {
                debug!("read: {} has kind {:?}, treating as absent", path, file.kind);
                Ok(None)
            }
        }
    }

    fn write(&self, path: &str, content: &str, message: &str) -> StoreResult<()> {
        // Read-then-write: the revision tag observed here makes the PUT
        // a compare-and-swap against the last known state of the file.
        let revision = self.revision(path)?;
        debug!("write: {} against revision {:?}", path, revision);

        let mut body = json!({
            "message": message,
            "content": BASE64.encode(content.as_bytes()),
            "branch": self.config.branch,
        });
        if let Some(sha) = revision {
            body["sha"] = json!(sha);
        }

        let response = self
            .client
            .put(self.contents_url(path))
            .header("Authorization", format!("token {}", self.config.token))
            .header("Accept", ACCEPT_HEADER)
            .header("X-GitHub-Api-Version", API_VERSION)
            .json(&body)
            .send()
            .context(RequestSnafu { path })?;

        let status = response.status();
        // 409 is a sha mismatch; 422 is the answer to a missing sha when
        // the file already exists. Both mean our revision tag went stale.
        if status == StatusCode::CONFLICT || status == StatusCode::UNPROCESSABLE_ENTITY {
            return RevisionConflictSnafu { path }.fail();
        }
        ensure!(
            status.is_success(),
            StatusSnafu {
                status: status.as_u16(),
                path
            }
        );
        info!("write: committed {} ({})", path, message);
        Ok(())
    }

    fn list_dir(&self, path: &str) -> StoreResult<Vec<DirEntry>> {
        match self.get_contents(path)? {
            Some(ContentsPayload::Entries(entries)) => Ok(entries),
            // Absent namespace, or a plain file where a directory was
            // expected: nothing to enumerate.
            _ => Ok(Vec::new()),
        }
    }
}
