//! Errors produced while converting and persisting configuration records.

use std::{fmt, io, path::PathBuf};

use crate::value::Value;

/// Error raised by a storage agent when the backing file cannot be read, parsed or written.
///
/// Carries the location the agent was operating on for diagnostics.
#[derive(Debug)]
pub struct StorageError {
    location: PathBuf,
    inner: anyhow::Error,
}

impl StorageError {
    pub(crate) fn new(location: impl Into<PathBuf>, inner: impl Into<anyhow::Error>) -> Self {
        Self {
            location: location.into(),
            inner: inner.into(),
        }
    }

    pub(crate) fn io(location: impl Into<PathBuf>, err: io::Error) -> Self {
        Self::new(location, err)
    }

    /// Returns the location the failing operation was attempted against.
    pub fn location(&self) -> &std::path::Path {
        &self.location
    }

    /// Returns the underlying cause.
    pub fn inner(&self) -> &anyhow::Error {
        &self.inner
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "storage error at `{}`: {:#}",
            self.location.display(),
            self.inner
        )
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.inner.as_ref())
    }
}

/// Errors occurring when converting between records and persisted data, or when
/// persisting that data.
///
/// Nothing in this taxonomy is silently downgraded by the library; every variant
/// propagates to the caller of `load` / `save` / [`ConfRoot::open`](crate::ConfRoot::open).
/// The only locally absorbed condition is a missing backing file during the initial
/// existence check, which signals bootstrap rather than failure.
#[derive(Debug)]
#[non_exhaustive]
pub enum ConfigError {
    /// A stored value could not be converted to the field's declared type.
    TypeCoercion {
        /// Dotted path of the failing field within its model.
        field: String,
        /// Underlying conversion error.
        inner: anyhow::Error,
    },
    /// A field value could not be serialized into the persisted object model.
    Serialization {
        /// Dotted path of the failing field within its model.
        field: String,
        /// Underlying serialization error.
        inner: anyhow::Error,
    },
    /// A resolved field value failed one of the field's validators.
    Validation {
        /// Dotted path of the failing field within its model.
        field: String,
        /// The stored value that produced the failing field value.
        value: Value,
        /// Position of the failing validator in declaration order.
        index: usize,
        /// Human-readable description of the failed validation.
        description: String,
    },
    /// A field with no default had no value available.
    MissingField {
        /// Dotted path of the missing field within its model.
        field: String,
    },
    /// Underlying filesystem or parse failure.
    Storage(StorageError),
}

impl ConfigError {
    pub(crate) fn coercion(field: impl Into<String>, inner: impl Into<anyhow::Error>) -> Self {
        Self::TypeCoercion {
            field: field.into(),
            inner: inner.into(),
        }
    }

    pub(crate) fn serialization(field: impl Into<String>, inner: impl Into<anyhow::Error>) -> Self {
        Self::Serialization {
            field: field.into(),
            inner: inner.into(),
        }
    }

    /// Prefixes the field path with the name of the enclosing nested field.
    pub(crate) fn nest(self, prefix: &str) -> Self {
        let prefixed = |field: String| format!("{prefix}.{field}");
        match self {
            Self::TypeCoercion { field, inner } => Self::TypeCoercion {
                field: prefixed(field),
                inner,
            },
            Self::Serialization { field, inner } => Self::Serialization {
                field: prefixed(field),
                inner,
            },
            Self::Validation {
                field,
                value,
                index,
                description,
            } => Self::Validation {
                field: prefixed(field),
                value,
                index,
                description,
            },
            Self::MissingField { field } => Self::MissingField {
                field: prefixed(field),
            },
            Self::Storage(_) => self,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypeCoercion { field, inner } => {
                write!(
                    formatter,
                    "stored value for field `{field}` could not be converted to the declared type: {inner:#}"
                )
            }
            Self::Serialization { field, inner } => {
                write!(formatter, "error serializing field `{field}`: {inner:#}")
            }
            Self::Validation {
                field,
                value,
                index,
                description,
            } => {
                write!(
                    formatter,
                    "value {value:?} for field `{field}` failed validator #{index}: {description}"
                )
            }
            Self::MissingField { field } => {
                write!(
                    formatter,
                    "field `{field}` has no default and no value was supplied"
                )
            }
            Self::Storage(err) => fmt::Display::fmt(err, formatter),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TypeCoercion { inner, .. } | Self::Serialization { inner, .. } => {
                Some(inner.as_ref())
            }
            Self::Storage(err) => Some(err),
            Self::Validation { .. } | Self::MissingField { .. } => None,
        }
    }
}

impl From<StorageError> for ConfigError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}
