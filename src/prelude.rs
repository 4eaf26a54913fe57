//! Convenient re-exports for common usage patterns.
//!
//! ```rust
//! use deduce_rs::prelude::*;
//! ```

// Core functionality
pub use crate::{call_deduced, chain, collect_deduced, deduce, deduce_fallible, deduce_typed};

// Essential types
pub use crate::{
    Arguments, BoundArguments, ConversionError, Converter, ConverterSpec, DeduceError, Deduced,
    DeducedCollection, FunctionCall, Registry, Signature, ValidationError,
};

// Combinators
pub use crate::{Equiv, Filter, Identity, OneOf, Optional, Range, Regex, Transform};

// Registry free functions (and the `#[alias]` attribute with the `macros` feature)
pub use crate::{alias, record, retrieve};

// Commonly used external types
pub use serde_json::{Value, json};

// Re-export commonly needed traits for doc examples
pub use serde::{Deserialize, Serialize};
