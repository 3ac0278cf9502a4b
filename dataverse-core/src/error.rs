//! Error types for Dataverse client operations.

use std::io;
use thiserror::Error;
use uuid::Uuid;

/// The main error type for Dataverse client operations.
#[derive(Debug, Error)]
pub enum DataverseError {
    /// A lookup attribute has no metadata entry on the owning entity.
    #[error("entity reference {attribute} was not found for entity {entity}")]
    UnresolvedLookupMetadata {
        /// Lower-cased attribute name that was looked up.
        attribute: String,
        /// Entity the attribute was expected on.
        entity: String,
    },

    /// Entity-level metadata (entity set name, relationships) is missing.
    #[error("entity metadata was not found for entity {0}")]
    EntityMetadataNotFound(String),

    /// Caller supplied a value that violates an input contract.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A batch id does not refer to an open batch.
    #[error("batch {0} does not refer to an open batch")]
    InvalidBatchReference(Uuid),

    /// A batch holds more requests than the service accepts.
    #[error("batch {batch_id} holds {count} requests, limit is {limit}")]
    BatchLimitExceeded {
        /// The offending batch.
        batch_id: Uuid,
        /// Number of queued requests.
        count: usize,
        /// Configured maximum.
        limit: usize,
    },

    /// The metadata provider failed to answer a lookup.
    #[error("metadata error: {0}")]
    Metadata(String),

    /// Connection-related errors raised by the transport.
    #[error("connection error: {0}")]
    Connection(String),

    /// Configuration errors (invalid settings).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Serialization/deserialization errors.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O errors from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// A specialized `Result` type for Dataverse operations.
pub type Result<T> = std::result::Result<T, DataverseError>;
