//! Criterion registry.
//!
//! Maps criterion names to factories. A registry is assembled once through
//! [`RegistryBuilder`] and is immutable afterwards, so it can be shared
//! freely between threads.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use super::{CompiledCriterion, Criterion, CriterionDataType, Generator, client_certificate};
use crate::error::{Error, Result};
use crate::value::Value;

/// Builds a criterion bound to a compiler context.
pub type CriterionFactory = fn(Arc<Generator>) -> Box<dyn Criterion>;

/// One registry entry.
#[derive(Debug, Clone, Copy)]
pub struct Registration {
    /// Name the criterion is looked up by.
    pub name: &'static str,
    /// Configuration shape it accepts.
    pub data_type: CriterionDataType,
    /// Constructor.
    pub factory: CriterionFactory,
}

/// Collects registrations before freezing them into a [`Registry`].
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    entries: BTreeMap<&'static str, Registration>,
}

impl RegistryBuilder {
    /// Add a registration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RegistrationConflict`] if the name is already taken.
    pub fn try_register(&mut self, registration: Registration) -> Result<&mut Self> {
        if self.entries.contains_key(registration.name) {
            return Err(Error::RegistrationConflict {
                name: registration.name.to_owned(),
            });
        }
        debug!(
            criterion = registration.name,
            data_type = %registration.data_type,
            "registered criterion"
        );
        self.entries.insert(registration.name, registration);
        Ok(self)
    }

    /// Add a registration, treating a duplicate name as a programming error.
    ///
    /// # Panics
    ///
    /// Panics if the name is already taken.
    pub fn register(&mut self, registration: Registration) -> &mut Self {
        if let Err(e) = self.try_register(registration) {
            panic!("{e}");
        }
        self
    }

    /// Freeze the registrations.
    #[must_use]
    pub fn build(&mut self) -> Registry {
        Registry {
            entries: std::mem::take(&mut self.entries),
        }
    }
}

/// Immutable name → factory table.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: BTreeMap<&'static str, Registration>,
}

impl Registry {
    /// Start an empty builder.
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Registry holding every built-in criterion.
    #[must_use]
    pub fn builtin() -> Self {
        Self::builder()
            .register(client_certificate::REGISTRATION)
            .build()
    }

    /// Look up a registration by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Registration> {
        self.entries.get(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.keys().copied()
    }

    /// All registrations, sorted by name.
    pub fn registrations(&self) -> impl Iterator<Item = &Registration> {
        self.entries.values()
    }

    /// Build the criterion registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownCriterion`] if nothing is registered under it.
    pub fn instantiate(&self, name: &str, generator: &Arc<Generator>) -> Result<Box<dyn Criterion>> {
        let registration = self
            .get(name)
            .ok_or_else(|| Error::UnknownCriterion(name.to_owned()))?;
        Ok((registration.factory)(Arc::clone(generator)))
    }

    /// Instantiate `name` and compile one configured value with it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownCriterion`] for an unregistered name and
    /// [`Error::Compile`] when the value is rejected.
    pub fn compile(
        &self,
        name: &str,
        generator: &Arc<Generator>,
        label: &str,
        data: &Value,
    ) -> Result<CompiledCriterion> {
        Ok(self.instantiate(name, generator)?.compile(label, data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registers_client_certificate() {
        let registry = Registry::builtin();
        assert_eq!(registry.names().collect::<Vec<_>>(), ["client_certificate"]);

        let registration = registry.get("client_certificate").unwrap();
        assert_eq!(registration.data_type, CriterionDataType::CertificateMatcher);
    }

    #[test]
    fn instantiate_binds_generator() {
        let registry = Registry::builtin();
        let criterion = registry
            .instantiate("client_certificate", &Arc::new(Generator::default()))
            .unwrap();
        assert_eq!(criterion.name(), "client_certificate");
        assert_eq!(criterion.data_type(), CriterionDataType::CertificateMatcher);
    }

    #[test]
    fn unknown_name_is_an_error() {
        let err = Registry::builtin()
            .instantiate("accept", &Arc::new(Generator::default()))
            .err()
            .unwrap();
        assert!(matches!(err, Error::UnknownCriterion(ref n) if n == "accept"));
    }

    #[test]
    fn try_register_reports_conflict() {
        let mut builder = Registry::builder();
        builder.try_register(client_certificate::REGISTRATION).unwrap();
        let err = builder
            .try_register(client_certificate::REGISTRATION)
            .err()
            .unwrap();
        assert_eq!(
            err.to_string(),
            "criterion `client_certificate` is already registered"
        );
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn register_panics_on_duplicate() {
        Registry::builder()
            .register(client_certificate::REGISTRATION)
            .register(client_certificate::REGISTRATION);
    }
}
