//! Structured error types shared across CDT crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`CdtError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (move kind, pass, counts, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the CDT engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum CdtError {
    /// Contract breach by the caller (e.g. a ratio requested before seeding).
    #[error("precondition violated: {0}")]
    Precondition(ErrorInfo),
    /// A classifier, executor or action evaluator could not proceed.
    #[error("collaborator failure: {0}")]
    Collaborator(ErrorInfo),
    /// Numerical degeneracy or count underflow.
    #[error("numerical error: {0}")]
    Numerical(ErrorInfo),
    /// Invalid run parameters or configuration documents.
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// Run aborted between move attempts.
    #[error("run cancelled: {0}")]
    Cancelled(ErrorInfo),
    /// Filesystem errors while persisting reports.
    #[error("io error: {0}")]
    Io(ErrorInfo),
    /// Serialization and schema errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl CdtError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            CdtError::Precondition(info)
            | CdtError::Collaborator(info)
            | CdtError::Numerical(info)
            | CdtError::Config(info)
            | CdtError::Cancelled(info)
            | CdtError::Io(info)
            | CdtError::Serde(info) => info,
        }
    }

    fn info_mut(&mut self) -> &mut ErrorInfo {
        match self {
            CdtError::Precondition(info)
            | CdtError::Collaborator(info)
            | CdtError::Numerical(info)
            | CdtError::Config(info)
            | CdtError::Cancelled(info)
            | CdtError::Io(info)
            | CdtError::Serde(info) => info,
        }
    }

    /// Adds a context entry to the payload, keeping the error family.
    ///
    /// Existing keys are not overwritten so the innermost context wins.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.info_mut()
            .context
            .entry(key.into())
            .or_insert_with(|| value.into());
        self
    }

    /// Short family label, handy for logs and reports.
    pub fn family(&self) -> &'static str {
        match self {
            CdtError::Precondition(_) => "precondition",
            CdtError::Collaborator(_) => "collaborator",
            CdtError::Numerical(_) => "numerical",
            CdtError::Config(_) => "config",
            CdtError::Cancelled(_) => "cancelled",
            CdtError::Io(_) => "io",
            CdtError::Serde(_) => "serde",
        }
    }
}
