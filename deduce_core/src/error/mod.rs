//! error.rs – Error types for converters and deduced functions

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use thiserror::Error;

/*───────────────────────────────────────────────────────────────────────────*/

/// A single converter rejected its input.
///
/// Keeps the message as a `Cow` so that converters with a fixed message
/// don't allocate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ValidationError {
    message: Cow<'static, str>,
}

impl ValidationError {
    pub fn new(message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// One or more arguments of a deduced call failed conversion.
///
/// Maps each failing parameter name to the message of its converter. Never
/// contains parameters that converted successfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionError {
    errors: BTreeMap<String, String>,
}

impl ConversionError {
    pub(crate) fn from_failures(errors: BTreeMap<String, String>) -> Self {
        debug_assert!(!errors.is_empty());
        Self { errors }
    }

    /// Parameter name → failure message.
    pub fn errors(&self) -> &BTreeMap<String, String> {
        &self.errors
    }

    pub fn into_errors(self) -> BTreeMap<String, String> {
        self.errors
    }

    /// Failure message for `param`, if that parameter failed.
    pub fn get(&self, param: &str) -> Option<&str> {
        self.errors.get(param).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("failed to convert arguments: ")?;
        for (i, (param, message)) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{param}: {message}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ConversionError {}

/// The supplied arguments don't fit the function's signature.
///
/// These are usage errors and are reported before any conversion runs.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    #[error("expected at most {expected} positional args, got {found}")]
    TooManyPositional { expected: usize, found: usize },

    #[error("unexpected keyword argument '{name}'")]
    UnexpectedKeyword { name: String },

    #[error("got multiple values for argument '{name}'")]
    MultipleValues { name: String },

    #[error("missing required argument(s): {}", names.join(", "))]
    MissingArguments { names: Vec<String> },

    /// Arguments given as JSON must be an array, an object or `null`.
    #[error("arguments must be an array, an object or null, got {found}")]
    InvalidArguments { found: &'static str },
}

/// A converted argument could not be deserialized into the Rust type the
/// function expects.
#[derive(Debug, Error)]
#[error("failed to deserialize argument '{param}': {source}")]
pub struct DeserializationError {
    pub param: Cow<'static, str>,
    #[source]
    pub source: JsonError,
}

impl DeserializationError {
    pub fn new(param: impl Into<Cow<'static, str>>, source: JsonError) -> Self {
        Self {
            param: param.into(),
            source,
        }
    }
}

/*───────────────────────────────────────────────────────────────────────────*/

/// All the ways building or calling a deduced function can fail.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DeduceError {
    /// A parameter refers to an alias nobody registered and has no fallback.
    #[error("no converter registered for alias '{alias}' (parameter '{param}')")]
    UnknownAlias {
        param: Cow<'static, str>,
        alias: Cow<'static, str>,
    },

    /// The same parameter name was declared twice in a signature.
    #[error("parameter '{name}' is declared more than once")]
    DuplicateParameter { name: Cow<'static, str> },

    #[error(transparent)]
    Bind(#[from] BindError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Deserialize(#[from] DeserializationError),

    /// Tried to call a deduced function that was never registered.
    #[error("Deduced function '{name}' not found")]
    FunctionNotFound { name: Cow<'static, str> },

    /// Attempted to register a function under a name that is already taken.
    #[error("Deduced function '{name}' is already registered")]
    AlreadyRegistered { name: Cow<'static, str> },

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] JsonError),
}

impl DeduceError {
    /// The aggregate conversion failure, if that's what this error is.
    pub fn as_conversion(&self) -> Option<&ConversionError> {
        match self {
            DeduceError::Conversion(err) => Some(err),
            _ => None,
        }
    }
}
