//! Error types for the test harness
//!
//! An assertion that simply fails is not represented here: a false
//! predicate is a normal failing [`Verdict`](crate::evaluate::Verdict)
//! recorded in the case outcome. Errors cover registration conflicts,
//! fatal configuration problems, and collaborator failures.

use thiserror::Error;

/// Errors raised while registering test cases.
#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error("duplicate test case id '{id}' in group '{group}'")]
    DuplicateIdentifier { group: String, id: String },
}

/// Fatal configuration problems. These abort the whole run before any
/// test case executes.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("malformed base URL '{url}': {reason}")]
    BaseUrl { url: String, reason: String },

    #[error("invalid timeout: {0}")]
    Timeout(String),

    #[error("invalid worker count: {0}")]
    Workers(String),

    #[error("spec file {path}: {reason}")]
    Spec { path: String, reason: String },
}

/// Failures surfaced by an external collaborator (browser automation or
/// HTTP client). These abort only the current test case; the run
/// continues with the next one.
#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("navigation timed out: {0}")]
    NavigationTimeout(String),

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("assertion timed out after {timeout_ms} ms: {target}")]
    AssertionTimeout { target: String, timeout_ms: u64 },

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("collaborator protocol error: {0}")]
    Protocol(String),

    #[error("playwright not found; install with: npx playwright install")]
    PlaywrightNotFound,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Top-level harness error.
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type HarnessResult<T> = Result<T, HarnessError>;
