//! Core types for Dataverse Web API clients.
//!
//! This crate holds the value model, the error type, Web API value encoding
//! and the [`AttributePayloadTranslator`], which turns typed attribute
//! collections into ordered `@odata.bind`-aware payloads. It performs no I/O;
//! metadata is read through the [`MetadataProvider`] trait.

#![warn(missing_docs)]

pub mod encoding;
pub mod error;
pub mod metadata;
pub mod payload;
pub mod request;
pub mod translate;
pub mod value;

pub use error::{DataverseError, Result};
pub use metadata::{
    AttributeKind, AttributeMetadata, EntityFilters, EntityMetadata, MetadataProvider,
    RelationshipInfo,
};
pub use payload::{SerializedField, WebApiPayload};
pub use request::{OrganizationRequest, RequestParameter};
pub use translate::AttributePayloadTranslator;
pub use value::{
    AttributeCollection, AttributeValue, Entity, EntityReference, KeyAttributeCollection, Money,
    OptionSetValue,
};
