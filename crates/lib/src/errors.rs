use thiserror::Error;

/// Errors raised by the external generative APIs (text and image).
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Failed to build Reqwest client: {0}")]
    ReqwestClientBuild(reqwest::Error),
    #[error("Failed to send request to AI provider: {0}")]
    AiRequest(reqwest::Error),
    #[error("AI provider request timed out: {0}")]
    Timeout(reqwest::Error),
    #[error("Failed to deserialize AI provider response: {0}")]
    AiDeserialization(reqwest::Error),
    #[error("AI provider returned an error (status {status}): {body}")]
    AiApi { status: u16, body: String },
    #[error("AI provider returned an empty response")]
    EmptyResponse,
    #[error("API key is missing")]
    MissingApiKey,
}

impl ProviderError {
    /// Classifies a transport error, keeping timeouts distinguishable in logs.
    pub(crate) fn from_request(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout(err)
        } else {
            ProviderError::AiRequest(err)
        }
    }
}

/// Errors raised while filling a prompt template.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("No value supplied for placeholder '{{{0}}}'")]
    MissingPlaceholder(String),
    #[error("Prompt template '{0}' is not defined")]
    UnknownTemplate(String),
    #[error("Unbalanced brace at byte {0}")]
    Unbalanced(usize),
}

/// The reason a single item was discarded by the pipeline.
///
/// None of these abort a batch. The driver logs them and moves to the next item.
#[derive(Error, Debug)]
pub enum ItemError {
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),
    #[error("Upstream error: {0}")]
    Upstream(#[from] ProviderError),
    #[error("Malformed response at line {line}, column {column} (found {found:?}): {message}")]
    MalformedResponse {
        line: usize,
        column: usize,
        found: Option<char>,
        message: String,
    },
    #[error("Required field '{0}' is missing from the response")]
    MissingField(String),
    #[error("Field '{field}' has the wrong type, expected {expected}")]
    InvalidField {
        field: String,
        expected: &'static str,
    },
    #[error("Image stage failed: {0}")]
    Image(String),
}

/// Setup failures that stop a whole batch (or a whole city).
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to read CSV input: {0}")]
    Csv(#[from] csv::Error),
    #[error("Invalid JSON in '{path}': {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),
    #[error("Provider setup failed: {0}")]
    Provider(#[from] ProviderError),
    #[error("No workers configured; at least one credential is required")]
    NoWorkers,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Worker task failed: {0}")]
    Worker(String),
}

impl BatchError {
    pub(crate) fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        BatchError::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    pub(crate) fn json(path: impl AsRef<std::path::Path>, source: serde_json::Error) -> Self {
        BatchError::Json {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}
