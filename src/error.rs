use thiserror::Error;

/// All failure modes surfaced across compiling templates, compiling a
/// table, and running a parse.
#[derive(Error, Debug)]
pub enum Error {
    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("template error: {0}")]
    Template(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{message}. Rule line: {location}")]
    Fsm { location: String, message: String },

    #[error("regex error: {0}")]
    Regex(#[from] fancy_regex::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Internal-only signal raised by `Required` during `Value::save`.
/// Never escapes the crate; callers only ever see a `Result<Vec<Record>>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SaveOutcome {
    Keep,
    Skip,
}
