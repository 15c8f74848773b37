use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvisionerError {
    #[error("validation failed: {0}")]
    Validation(#[from] atlas_core::ValidationError),

    #[error("invalid resource id: {0}")]
    InvalidId(String),

    #[error("resource creation failed: {0}")]
    CreateFailed(String),

    #[error("resource read failed: {0}")]
    ReadFailed(String),

    #[error("resource deletion failed: {0}")]
    DeleteFailed(String),

    #[error("resource import failed: {0}")]
    ImportFailed(String),

    /// The remote system never finished converging. Distinct from the
    /// failure variants above, which mean the remote system said no.
    #[error(
        "{operation} of {scope}/{key} did not converge within {elapsed:?} ({attempts} attempts){}",
        .last_pending.as_deref().map(|r| format!(": last status: {r}")).unwrap_or_default()
    )]
    DeadlineExceeded {
        operation: &'static str,
        scope: String,
        key: String,
        attempts: u32,
        elapsed: Duration,
        last_pending: Option<String>,
    },

    #[error("resource not found: {resource_type}/{resource_id}")]
    ResourceNotFound {
        resource_type: String,
        resource_id: String,
    },

    #[error("state error: {0}")]
    State(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<atlas_core::CoreError> for ProvisionerError {
    fn from(err: atlas_core::CoreError) -> Self {
        match err {
            atlas_core::CoreError::Validation(e) => Self::Validation(e),
            atlas_core::CoreError::ImportFormat(raw) => Self::ImportFailed(format!(
                "expected an import id of the form {{project_id}}-{{entry}}, got {raw:?}"
            )),
            other => Self::InvalidId(other.to_string()),
        }
    }
}

impl ProvisionerError {
    /// Prepend resource identity to the error message.
    pub fn with_resource(self, label: &str, name: &str) -> Self {
        match self {
            Self::CreateFailed(msg) => Self::CreateFailed(format!("{label} ({name}): {msg}")),
            Self::ReadFailed(msg) => Self::ReadFailed(format!("{label} ({name}): {msg}")),
            Self::DeleteFailed(msg) => Self::DeleteFailed(format!("{label} ({name}): {msg}")),
            Self::ImportFailed(msg) => Self::ImportFailed(format!("{label} ({name}): {msg}")),
            other => other,
        }
    }

    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, Self::DeadlineExceeded { .. })
    }
}

/// Walk the full error chain and join all causes into one string.
pub fn format_err_chain(err: &dyn std::error::Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}
