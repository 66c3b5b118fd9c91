use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Request(#[from] odata_core::Error),

    /// Syntactically valid, but the expression kind has no CQN rendering here.
    #[error("feature not supported: {option} with expression of kind '{kind}'")]
    NotSupported {
        option: &'static str,
        kind: &'static str,
    },

    #[error("unknown operation kind: {0}")]
    UnknownOperation(String),

    #[error("entity '{entity}' has no property '{property}'")]
    UnknownProperty { entity: String, property: String },

    #[error("invalid key for '{entity}': {reason}")]
    InvalidKey { entity: String, reason: String },

    #[error("{operation} on '{entity}' requires a key predicate")]
    MissingKeys {
        entity: String,
        operation: &'static str,
    },

    #[error("key '{key}' in payload does not match the resource path")]
    KeyMismatch { key: String },

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("invalid base64 value for binary element '{element}'")]
    InvalidBinary { element: String },

    #[error("unsupported function or args: {0}()")]
    UnsupportedFunction(String),

    #[error("bare identifier not allowed: {0}")]
    BareIdentifier(String),

    #[error("bare literal not allowed")]
    BareLiteral,
}

pub type Result<T> = std::result::Result<T, Error>;
