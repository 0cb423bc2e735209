// Copyright (c) 2025 - Cowboy AI, Inc.
//! Error types for infrastructure declaration and deployment
//!
//! Every variant carries owned strings so the error is `Clone`: a failed
//! resource hands the same error to every consumer of its outputs.

use thiserror::Error;

use crate::domain::{NetworkError, ValidationError};
use crate::state_machine::TransitionError;

/// Errors that can occur while declaring or deploying infrastructure
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InfrastructureError {
    /// Missing or malformed stack configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The provider refused a resource operation
    #[error("Provider rejected {urn}: {message}")]
    ProviderRejection {
        /// Resource the operation was issued for
        urn: String,
        /// Provider message, verbatim
        message: String,
    },

    /// A value was consumed before (or without) its producer completing
    #[error("Dependency ordering error: {0}")]
    DependencyOrdering(String),

    /// Two declarations produced the same URN
    #[error("Duplicate resource URN: {0}")]
    DuplicateUrn(String),

    /// A resolved value did not have the expected shape
    #[error("Missing attribute {attribute} on {urn}")]
    MissingAttribute {
        /// Resource that was expected to expose the attribute
        urn: String,
        /// Attribute name
        attribute: String,
    },

    /// Network value error (CIDR parsing, address exhaustion)
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// A graph invariant does not hold
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// State store read/write failure
    #[error("State store error: {0}")]
    StateStore(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// The declaration was abandoned because an earlier one failed
    #[error("Cancelled: {0}")]
    Cancelled(String),
}

/// Result type for infrastructure operations
pub type InfrastructureResult<T> = Result<T, InfrastructureError>;

impl InfrastructureError {
    /// Build a provider rejection for a resource
    pub fn rejected(urn: impl ToString, message: impl Into<String>) -> Self {
        InfrastructureError::ProviderRejection {
            urn: urn.to_string(),
            message: message.into(),
        }
    }

    /// Whether this error only reports that another failure stopped the run
    pub fn is_cancellation(&self) -> bool {
        matches!(self, InfrastructureError::Cancelled(_))
    }
}

impl From<serde_json::Error> for InfrastructureError {
    fn from(err: serde_json::Error) -> Self {
        InfrastructureError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for InfrastructureError {
    fn from(err: serde_yaml::Error) -> Self {
        InfrastructureError::Configuration(err.to_string())
    }
}

impl From<std::io::Error> for InfrastructureError {
    fn from(err: std::io::Error) -> Self {
        InfrastructureError::StateStore(err.to_string())
    }
}

impl From<TransitionError> for InfrastructureError {
    fn from(err: TransitionError) -> Self {
        InfrastructureError::DependencyOrdering(err.to_string())
    }
}
