//! Named builder extensions registered at runtime.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::query::Builder;
use crate::value::SqlValue;

/// A registered builder macro.
pub type MacroFn = dyn for<'a> Fn(Builder<'a>, &[SqlValue]) -> Builder<'a> + Send + Sync;

/// Name to macro lookup table.
#[derive(Clone, Default)]
pub struct MacroRegistry {
    macros: HashMap<String, Arc<MacroFn>>,
}

impl MacroRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `f` under `name`, replacing any previous macro.
    pub fn register<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: for<'a> Fn(Builder<'a>, &[SqlValue]) -> Builder<'a> + Send + Sync + 'static,
    {
        self.macros.insert(name.into(), Arc::new(f));
    }

    /// Returns true if a macro is registered under `name`.
    #[must_use]
    pub fn has(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    /// Applies the macro `name` to `builder`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UndefinedMethod`] if no macro is registered.
    pub fn call<'a>(&self, name: &str, builder: Builder<'a>, args: &[SqlValue]) -> Result<Builder<'a>> {
        let f = self
            .macros
            .get(name)
            .ok_or_else(|| Error::UndefinedMethod(name.to_string()))?;
        Ok(f(builder, args))
    }
}

impl fmt::Debug for MacroRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.macros.keys().collect();
        names.sort();
        f.debug_struct("MacroRegistry").field("macros", &names).finish()
    }
}
