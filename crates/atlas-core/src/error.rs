use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid state id {id:?}: {reason}")]
    InvalidId { id: String, reason: String },

    #[error("import format error: to import an access list entry, use the format {{project_id}}-{{access_list_entry}} (got {0:?})")]
    ImportFormat(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl CoreError {
    pub(crate) fn invalid_id(id: &str, reason: impl Into<String>) -> Self {
        Self::InvalidId {
            id: id.to_string(),
            reason: reason.into(),
        }
    }
}

/// A desired resource that must be rejected before any remote call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("cidr_block, ip_address or aws_security_group needs to contain a value")]
    NoIdentifier,

    #[error("only one of cidr_block, ip_address or aws_security_group may be set (got {})", .0.join(", "))]
    ConflictingIdentifiers(Vec<&'static str>),

    #[error("expected cidr_block to contain a valid CIDR, got: {value} with err: {reason}")]
    InvalidCidr { value: String, reason: String },

    #[error("expected cidr_block to contain a valid network CIDR, expected {expected}, got {value}")]
    NonCanonicalCidr { value: String, expected: String },

    #[error("expected ip_address to contain a valid IP, got: {0}")]
    InvalidIpAddress(String),

    #[error("comment must not be empty when set")]
    EmptyComment,

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("delivery type {0} requires target_cluster_name and target_project_id")]
    TargetRequired(&'static str),

    #[error("delivery type pointInTime requires point_in_time_utc_seconds")]
    PointInTimeRequired,
}
