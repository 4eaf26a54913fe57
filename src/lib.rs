//! Declarative argument conversion for Rust functions.
//!
//! Each parameter of a function is paired with a converter: a registered
//! alias, a converter value, or the parameter's own type. Calls go through
//! [`Deduced::call`], which converts every argument first and reports all
//! failing parameters at once in a [`ConversionError`].
//!
//! ```rust
//! use deduce_rs::prelude::*;
//!
//! let sig = Signature::new().required("x", "i64").required("y", "i64");
//! let add = deduce_fallible(sig, |b| Ok(b.get::<i64>("x")? + b.get::<i64>("y")?)).unwrap();
//!
//! assert_eq!(add.call_json(json!(["1", "2"])).unwrap(), 3);
//!
//! let err = add.call_json(json!(["foo", "2"])).unwrap_err();
//! assert_eq!(err.as_conversion().unwrap().errors().len(), 1);
//! ```
#![deny(unsafe_code)]

pub mod prelude;

use once_cell::sync::Lazy;

pub use deduce_core::*;

#[cfg(feature = "macros")]
pub use deduce_macros::{alias, deduce};

/// Collected on first use; aliases are resolved against the global registry
/// as it is at that moment.
static DEDUCED: Lazy<DeducedCollection> = Lazy::new(DeducedCollection::collect_deduced);

/// Every `#[deduce]` function linked into the binary, callable by name.
///
/// Returns a fresh collection the caller may extend or trim.
pub fn collect_deduced() -> DeducedCollection {
    DeducedCollection::collect_deduced()
}

/// Calls a `#[deduce]` function by name with JSON arguments.
pub fn call_deduced(
    name: &str,
    arguments: serde_json::Value,
) -> Result<serde_json::Value, DeduceError> {
    tracing::trace!(function = name, "calling deduced function");
    DEDUCED.call(FunctionCall::new(name, arguments))
}
