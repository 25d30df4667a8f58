//! Named model factories.
//!
//! Models are compiled in, so `attach <name>` resolves the name here rather
//! than loading code at run time.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use super::traits::Model;
use crate::common::CtError;

/// Builds a model from the `attach` arguments that follow its name.
pub type ModelFactory = Rc<dyn Fn(&[String]) -> Result<Box<dyn Model>, CtError>>;

/// Models available to `attach`.
#[derive(Clone, Default)]
pub struct ModelRegistry {
    factories: BTreeMap<String, ModelFactory>,
}

impl ModelRegistry {
    /// Registers `factory` under `name`.
    ///
    /// # Returns
    ///
    /// `CtError::AlreadyRegistered` if the name is taken.
    pub fn register(&mut self, name: &str, factory: ModelFactory) -> Result<(), CtError> {
        if self.factories.contains_key(name) {
            return Err(CtError::AlreadyRegistered(name.to_string()));
        }
        let _ = self.factories.insert(name.to_string(), factory);
        Ok(())
    }

    /// Instantiates the model registered under `name`.
    pub fn create(&self, name: &str, args: &[String]) -> Result<Box<dyn Model>, CtError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| CtError::UnknownModel(name.to_string()))?;
        factory(args)
    }

    /// Registered model names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}
