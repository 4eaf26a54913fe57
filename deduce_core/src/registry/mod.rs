//! Alias registry: maps alias keys to converters.
//!
//! A process-wide registry is created on first use, seeded with the
//! built-in aliases and every `#[alias]` registration linked into the
//! binary. The free functions [`record`], [`retrieve`], [`alias`] and
//! [`chain`] operate on it. Independent registries can be built with
//! [`Registry::new`] / [`Registry::builtin`] and passed around explicitly.
//!
//! Register aliases during setup; concurrent registration and lookup is
//! memory-safe, but a call deduced before a registration won't see it.

use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock, RwLockReadGuard},
};

use once_cell::sync::Lazy;
use serde_json::Value;
use tracing::debug;

use crate::builtin;
use crate::converter::Converter;
use crate::error::{DeduceError, ValidationError};
use crate::models::{AliasKey, ConverterSpec};

/// What [`Registry::retrieve`] found for an alias.
#[derive(Debug, Clone)]
pub enum Retrieved {
    /// A converter is registered under the alias.
    Converter(Converter),
    /// Nothing is registered; the alias is handed back unchanged.
    Alias(AliasKey),
}

impl Retrieved {
    pub fn into_converter(self) -> Option<Converter> {
        match self {
            Retrieved::Converter(converter) => Some(converter),
            Retrieved::Alias(_) => None,
        }
    }
}

/// A collection of converter aliases.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    aliases: HashMap<AliasKey, Converter>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry seeded with the built-in aliases.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        builtin::seed(&mut registry);
        registry
    }

    /// Registers `converter` under `alias`, replacing any earlier one.
    pub fn record(&mut self, alias: impl Into<AliasKey>, converter: impl Into<Converter>) {
        let alias = alias.into();
        let converter = converter.into();
        debug!(alias = %alias, converter = converter.name(), "recorded converter alias");
        self.aliases.insert(alias, converter);
    }

    /// The converter registered under `alias`, or the alias itself.
    pub fn retrieve(&self, alias: impl Into<AliasKey>) -> Retrieved {
        let alias = alias.into();
        match self.aliases.get(&alias) {
            Some(converter) => Retrieved::Converter(converter.clone()),
            None => Retrieved::Alias(alias),
        }
    }

    /// Decorator form of [`Registry::record`]: records `func` and hands it
    /// back so it stays usable on its own.
    pub fn alias<F>(&mut self, key: impl Into<AliasKey>, func: F) -> F
    where
        F: Fn(Value) -> Result<Value, ValidationError> + Clone + Send + Sync + 'static,
    {
        let key = key.into();
        self.record(key.clone(), Converter::new(key, func.clone()));
        func
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.aliases.contains_key(alias)
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.aliases.keys().map(|key| &**key)
    }

    /// Chains converters given as converters or alias keys, resolving the
    /// aliases against this registry now.
    pub fn chain<I>(&self, steps: I) -> Result<Converter, DeduceError>
    where
        I: IntoIterator,
        I::Item: Into<ConverterSpec>,
    {
        let converters = steps
            .into_iter()
            .map(|step| self.resolve("chain", step.into()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(crate::converter::chain(converters))
    }

    /// Resolves a parameter's conversion spec to exactly one converter.
    pub fn resolve(&self, param: &str, spec: ConverterSpec) -> Result<Converter, DeduceError> {
        match spec {
            ConverterSpec::Identity => Ok(Converter::identity()),
            ConverterSpec::Converter(converter) => Ok(converter),
            ConverterSpec::Alias { key, fallback } => match self.retrieve(key) {
                Retrieved::Converter(converter) => Ok(converter),
                Retrieved::Alias(key) => fallback.ok_or_else(|| DeduceError::UnknownAlias {
                    param: param.to_string().into(),
                    alias: key,
                }),
            },
            ConverterSpec::Optional(inner) => {
                let inner = self.resolve(param, *inner)?;
                Ok(crate::converter::Optional(inner).into())
            }
        }
    }
}

// ============================================================================
// LINK-TIME REGISTRATIONS
// ============================================================================

/// Link-time registration emitted by `#[alias("key")]`.
pub struct AliasRegistration {
    pub alias: &'static str,
    pub name: &'static str,
    pub f: fn(Value) -> Result<Value, ValidationError>,
}

impl AliasRegistration {
    pub const fn new(
        alias: &'static str,
        name: &'static str,
        f: fn(Value) -> Result<Value, ValidationError>,
    ) -> Self {
        Self { alias, name, f }
    }
}

inventory::collect!(AliasRegistration);

// ============================================================================
// GLOBAL REGISTRY
// ============================================================================

static GLOBAL: Lazy<RwLock<Registry>> = Lazy::new(|| {
    let mut registry = Registry::builtin();
    for reg in inventory::iter::<AliasRegistration> {
        registry.record(reg.alias, Converter::new(reg.name, reg.f));
    }
    debug!(aliases = registry.len(), "seeded global converter registry");
    RwLock::new(registry)
});

/// Read access to the process-wide registry.
pub fn global() -> RwLockReadGuard<'static, Registry> {
    GLOBAL.read().unwrap_or_else(PoisonError::into_inner)
}

/// Runs `f` with write access to the process-wide registry.
pub fn configure<R>(f: impl FnOnce(&mut Registry) -> R) -> R {
    let mut registry = GLOBAL.write().unwrap_or_else(PoisonError::into_inner);
    f(&mut registry)
}

/// Registers `converter` under `alias` in the process-wide registry.
pub fn record(alias: impl Into<AliasKey>, converter: impl Into<Converter>) {
    configure(|registry| registry.record(alias, converter));
}

/// Looks `alias` up in the process-wide registry.
pub fn retrieve(alias: impl Into<AliasKey>) -> Retrieved {
    global().retrieve(alias)
}

/// Decorator form of [`record`]: `alias("key")(func)` records `func` in the
/// process-wide registry and returns it unmodified.
pub fn alias<F>(key: impl Into<AliasKey>) -> impl FnOnce(F) -> F
where
    F: Fn(Value) -> Result<Value, ValidationError> + Clone + Send + Sync + 'static,
{
    let key = key.into();
    move |func| configure(|registry| registry.alias(key, func))
}

/// [`Registry::chain`] against the process-wide registry.
pub fn chain<I>(steps: I) -> Result<Converter, DeduceError>
where
    I: IntoIterator,
    I::Item: Into<ConverterSpec>,
{
    global().chain(steps)
}
