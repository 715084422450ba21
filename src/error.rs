//! Error types for the Corda node provisioner
//!
//! Every step of a provisioning run either succeeds or returns the first
//! error it observes. Nothing here is retried.

use std::path::PathBuf;
use thiserror::Error;

/// Unified error type for the provisioner
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Session Errors
    // =========================================================================
    #[error("Authentication failed running `{command}`: {reason}")]
    Authentication { command: String, reason: String },

    #[error("Provisioning state error: {0}")]
    StateStore(String),

    // =========================================================================
    // Local IO Errors
    // =========================================================================
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Source file is empty: {path}")]
    EmptySource { path: PathBuf },

    // =========================================================================
    // Remote Lookup Errors
    // =========================================================================
    #[error("Remote lookup failed running `{command}`: {reason}")]
    RemoteLookup { command: String, reason: String },

    #[error("No pod matching prefix '{prefix}' in namespace {namespace}")]
    PodNotFound { namespace: String, prefix: String },

    #[error("Multiple pods matching prefix '{prefix}' in namespace {namespace}: {pods:?}")]
    AmbiguousPod {
        namespace: String,
        prefix: String,
        pods: Vec<String>,
    },

    #[error("Copy from pod {pod} failed: {reason}")]
    RemoteCopy { pod: String, reason: String },

    // =========================================================================
    // Declaration Errors
    // =========================================================================
    #[error("Declaring {kind}/{name} failed: {reason}")]
    Declaration {
        kind: String,
        name: String,
        reason: String,
    },

    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid kubeconfig: {0}")]
    Kubeconfig(String),

    #[error("Mode {mode} expects {expected} volume claims, got {actual}")]
    InvalidRoleBindings {
        mode: String,
        expected: usize,
        actual: usize,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Broad class of a failure, used for the final diagnostic line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Cloud login, credential retrieval, or the persisted session state
    Session,
    /// Missing, unreadable or empty local files
    LocalIo,
    /// Pod lookup or copy out of a running pod
    RemoteLookup,
    /// The cluster rejected a declared resource
    Declaration,
    /// Bad inputs to the run itself
    Configuration,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Session => write!(f, "session"),
            ErrorCategory::LocalIo => write!(f, "local-io"),
            ErrorCategory::RemoteLookup => write!(f, "remote-lookup"),
            ErrorCategory::Declaration => write!(f, "declaration"),
            ErrorCategory::Configuration => write!(f, "configuration"),
        }
    }
}

impl Error {
    /// Wrap an IO error with the path that caused it
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap a rejected declaration with the resource it concerns
    pub fn declaration(kind: &str, name: &str, reason: impl std::fmt::Display) -> Self {
        Error::Declaration {
            kind: kind.to_string(),
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Classify this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Authentication { .. } | Error::StateStore(_) => ErrorCategory::Session,

            Error::Io { .. } | Error::EmptySource { .. } => ErrorCategory::LocalIo,

            Error::RemoteLookup { .. }
            | Error::PodNotFound { .. }
            | Error::AmbiguousPod { .. }
            | Error::RemoteCopy { .. } => ErrorCategory::RemoteLookup,

            Error::Declaration { .. } | Error::Kube(_) => ErrorCategory::Declaration,

            Error::Configuration(_)
            | Error::Kubeconfig(_)
            | Error::InvalidRoleBindings { .. }
            | Error::Json(_) => ErrorCategory::Configuration,
        }
    }

    /// Provisioning never retries; a failed step ends the run.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

/// Result type alias for the provisioner
pub type Result<T> = std::result::Result<T, Error>;
