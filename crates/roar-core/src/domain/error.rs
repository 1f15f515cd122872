//! Domain-level error taxonomy for roar.

/// Which identity field a conflict was detected on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityField {
    Instance,
    Env,
}

impl std::fmt::Display for IdentityField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentityField::Instance => write!(f, "instance"),
            IdentityField::Env => write!(f, "env"),
        }
    }
}

/// roar errors.
#[derive(Debug, thiserror::Error)]
pub enum RoarError {
    #[error("failed to decode yaml document #{index}{}: {message}", location_suffix(.location))]
    MalformedDocument {
        index: usize,
        location: Option<String>,
        message: String,
    },

    #[error("invalid filter '{input}': {reason}")]
    InvalidPredicate { input: String, reason: String },

    #[error(
        "application '{application}' is invalid: conflicting values for '{field}': label is '{label}', plugin.env is '{plugin}'"
    )]
    ConflictingIdentity {
        application: String,
        field: IdentityField,
        label: String,
        plugin: String,
    },

    #[error(
        "application '{application}' is invalid: both 'rawRepository' annotation and 'spec.source.repoURL' are empty"
    )]
    MissingRepository { application: String },

    #[error("invalid repo URL '{url}': {reason}")]
    InvalidLocation { url: String, reason: String },

    #[error("helm template failed: {0}")]
    RenderFailed(String),

    #[error("git clone failed: {0}")]
    FetchFailed(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn location_suffix(location: &Option<String>) -> String {
    location
        .as_ref()
        .map(|loc| format!(" at {loc}"))
        .unwrap_or_default()
}

impl RoarError {
    /// Whether this error invalidates the whole resolution pass rather than a
    /// single application.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RoarError::MalformedDocument { .. } | RoarError::InvalidPredicate { .. }
        )
    }
}

/// Result type for roar operations.
pub type Result<T> = std::result::Result<T, RoarError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflicting_identity_display() {
        let err = RoarError::ConflictingIdentity {
            application: "test-app".to_string(),
            field: IdentityField::Instance,
            label: "from-label".to_string(),
            plugin: "from-plugin".to_string(),
        };
        assert!(err.to_string().contains(
            "conflicting values for 'instance': label is 'from-label', plugin.env is 'from-plugin'"
        ));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_malformed_document_includes_location() {
        let err = RoarError::MalformedDocument {
            index: 2,
            location: Some("3:7".to_string()),
            message: "mapping values are not allowed".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("failed to decode yaml document #2 at 3:7"));
        assert!(err.is_fatal());

        let err = RoarError::MalformedDocument {
            index: 0,
            location: None,
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "failed to decode yaml document #0: boom");
    }

    #[test]
    fn test_missing_repository_error() {
        let err = RoarError::MissingRepository {
            application: "api".to_string(),
        };
        assert!(err
            .to_string()
            .contains("both 'rawRepository' annotation and 'spec.source.repoURL' are empty"));
    }
}
