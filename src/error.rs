use thiserror::Error;

// ─────────────────────────────────────────────────────────────────────────────
// Filter configuration errors
// ─────────────────────────────────────────────────────────────────────────────

/// Raised while building a domain filter from its serialized form.
/// Fatal to startup, never to a single sync.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("cannot have both domain list and regex")]
    BothLiteralAndRegex,

    #[error("invalid {field}: {source}")]
    InvalidRegex {
        field: &'static str,
        #[source]
        source: regex::Error,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Routing policy errors
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("weight {0} is out of range, must be between 0 and 255")]
    WeightOutOfRange(i64),

    #[error("set identifier length {0} is invalid, must be between 1 and 128 characters")]
    SetIdentifierLength(usize),

    #[error("weight '{0}' is not an integer")]
    UnparsableWeight(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory provider errors
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("specified zone already exists")]
    ZoneAlreadyExists,

    #[error("specified zone not found")]
    ZoneNotFound,

    #[error("record already exists")]
    RecordAlreadyExists,

    #[error("record not found")]
    RecordNotFound,

    #[error("invalid batch request")]
    DuplicateRecord,
}
