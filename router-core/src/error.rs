//! Error taxonomy shared across the conversion pipeline.
//!
//! Mirrors the policy table in the design doc: `InputInvalid` and
//! `Unauthorized` and `TemplateError` and `Internal` are surfaced to the
//! caller; `FetchFailure`, `ParseFailure`, `ScriptError` and `Exhausted` are
//! recovered locally and never abort a request.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InputInvalid(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("fetch failed for {url}: {reason}")]
    FetchFailure { url: String, reason: String },

    #[error("failed to parse {what}: {reason}")]
    ParseFailure { what: String, reason: String },

    #[error("script error: {0}")]
    ScriptError(String),

    #[error("template error: {0}")]
    TemplateError(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// HTTP-ish status code a caller embedding these over HTTP should use.
    /// `router-api` maps this onto an actix `StatusCode`.
    pub fn status_code(&self) -> u16 {
        match self {
            CoreError::InputInvalid(_) => 400,
            CoreError::Unauthorized(_) => 403,
            CoreError::TemplateError(_) => 400,
            CoreError::Internal(_) => 500,
            // These are never surfaced as a top-level request failure in
            // normal operation, but keep a sane mapping for callers that
            // bubble one up anyway (e.g. `/getruleset` on a total fetch miss).
            CoreError::FetchFailure { .. } => 502,
            CoreError::ParseFailure { .. } => 422,
            CoreError::ScriptError(_) => 500,
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
