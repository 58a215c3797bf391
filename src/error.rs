use thiserror::Error;

/// Errors surfaced by the dashboard engine.
///
/// None of these are fatal to the process: a `NotFound` degrades one view, a
/// `Parse` aborts one manifest load, a `MalformedPath` drops the run label.
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("parse error in {what}: {reason}")]
    Parse { what: String, reason: String },

    #[error("no run number in path '{0}'")]
    MalformedPath(String),

    #[error("fetch of '{path}' failed: {reason}")]
    Fetch { path: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl DashboardError {
    pub fn parse(what: impl Into<String>, reason: impl Into<String>) -> Self {
        DashboardError::Parse {
            what: what.into(),
            reason: reason.into(),
        }
    }

    pub fn fetch(path: impl Into<String>, reason: impl ToString) -> Self {
        DashboardError::Fetch {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Short machine-readable tag used in log records.
    pub fn kind(&self) -> &'static str {
        match self {
            DashboardError::NotFound(_) => "not_found",
            DashboardError::Parse { .. } => "parse",
            DashboardError::MalformedPath(_) => "malformed_path",
            DashboardError::Fetch { .. } => "fetch",
            DashboardError::Config(_) => "config",
        }
    }
}

pub type Result<T> = std::result::Result<T, DashboardError>;
