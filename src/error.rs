//! Unified error types for the router bootstrap.

use std::fmt;

use thiserror::Error;

/// Unrecoverable startup error.
///
/// Every variant aborts the bootstrap before any request is served. Use
/// [`StartupError::stage`] for the label reported by the process entry point.
#[derive(Error, Debug)]
pub enum StartupError {
    /// Configuration loading or validation error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// No contract source produced any bytes.
    #[error("contract unavailable: {0}")]
    SpecUnavailable(#[from] SourceError),

    /// Contract bytes could not be parsed.
    #[error("contract malformed: {0}")]
    SpecMalformed(#[from] ParseError),

    /// Contract parsed but is not internally consistent.
    #[error("contract invalid: {0}")]
    SpecInvalid(#[from] ValidationError),

    /// Declared operations and registered handlers do not line up.
    #[error("binding incomplete: {0}")]
    BindingIncomplete(#[from] BindingError),

    /// Metrics exporter could not be installed.
    #[error("metrics exporter error: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    /// Listener could not be bound or the server failed.
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

impl StartupError {
    /// Stable label of the bootstrap stage that failed.
    pub fn stage(&self) -> &'static str {
        match self {
            StartupError::Config(_) => "config",
            StartupError::SpecUnavailable(_) => "spec-unavailable",
            StartupError::SpecMalformed(_) => "spec-malformed",
            StartupError::SpecInvalid(_) => "spec-invalid",
            StartupError::BindingIncomplete(_) => "binding-incomplete",
            StartupError::Metrics(_) => "metrics",
            StartupError::Serve(_) => "serve",
        }
    }
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Environment could not be deserialized.
    #[error("failed to read environment: {0}")]
    Env(#[from] envy::Error),

    /// A value was read but is not acceptable.
    #[error("{0}")]
    Invalid(String),
}

/// Contract source resolution errors.
#[derive(Error, Debug)]
pub enum SourceError {
    /// A source exists but reading it failed. Never retried.
    #[error("failed to read contract from {origin}: {error}")]
    Read {
        /// Description of the failing source.
        origin: String,
        /// Underlying IO error.
        #[source]
        error: std::io::Error,
    },

    /// Every source was absent or empty.
    #[error("no contract bytes found (tried: {})", .tried.join(", "))]
    Exhausted {
        /// Descriptions of every source tried, in order.
        tried: Vec<String>,
    },
}

/// Contract parse errors.
#[derive(Error, Debug)]
pub enum ParseError {
    /// Not valid YAML or JSON.
    #[error("syntax error: {0}")]
    Syntax(#[from] serde_yaml::Error),

    /// Top level of the document is not a mapping.
    #[error("document root must be a mapping")]
    NotAMapping,

    /// Valid YAML, but the shape does not match an OpenAPI document.
    #[error("unexpected document structure: {0}")]
    Structure(#[from] serde_json::Error),
}

/// One problem found while validating a contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// JSON pointer into the document (`#/paths/~1healthz/get`).
    pub pointer: String,
    /// What is wrong at that location.
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.pointer, self.message)
    }
}

/// Contract validation failure carrying every issue found.
#[derive(Error, Debug)]
#[error("{} problem(s): {}", .issues.len(), join_issues(.issues))]
pub struct ValidationError {
    /// Issues in document order.
    pub issues: Vec<ValidationIssue>,
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Contract-to-handler binding errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum BindingError {
    /// Base path is not mountable.
    #[error("invalid base path {0:?}: must be empty or start with '/' and not end with '/'")]
    InvalidBasePath(String),

    /// The same operation was registered more than once.
    #[error("handler registered more than once for: {}", .0.join(", "))]
    DuplicateHandlers(Vec<String>),

    /// Declared operations without a handler.
    #[error("no handler for declared operation(s): {}", .0.join(", "))]
    MissingHandlers(Vec<String>),

    /// Handlers for operations the contract does not declare.
    #[error("handler registered for undeclared operation(s): {}", .0.join(", "))]
    UndeclaredHandlers(Vec<String>),

    /// Path template the router cannot express.
    #[error("path {path} cannot be routed: {reason}")]
    UnsupportedPath {
        /// Path as declared in the contract.
        path: String,
        /// Why it cannot be routed.
        reason: String,
    },
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, StartupError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_labels_identify_failing_step() {
        let err = StartupError::from(SourceError::Exhausted { tried: vec![] });
        assert_eq!(err.stage(), "spec-unavailable");

        let err = StartupError::from(BindingError::MissingHandlers(vec!["getHealthz".into()]));
        assert_eq!(err.stage(), "binding-incomplete");
        assert!(err.to_string().contains("getHealthz"));
    }

    #[test]
    fn validation_error_lists_every_issue() {
        let err = ValidationError {
            issues: vec![
                ValidationIssue {
                    pointer: "#/info/title".into(),
                    message: "must not be empty".into(),
                },
                ValidationIssue {
                    pointer: "#/paths".into(),
                    message: "bad".into(),
                },
            ],
        };

        let text = err.to_string();
        assert!(text.starts_with("2 problem(s)"));
        assert!(text.contains("#/info/title: must not be empty; #/paths: bad"));
    }
}
