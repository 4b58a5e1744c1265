use std::collections::HashMap;

use isotone_config::Config;
use isotone_types::ServiceDescriptor;

use crate::{Error, Result};

/// The fixed catalog of managed services, in configuration order.
#[derive(Debug, Clone)]
pub struct ServiceRegistry {
    descriptors: Vec<ServiceDescriptor>,
    index: HashMap<String, usize>,
}

impl ServiceRegistry {
    /// # Errors
    ///
    /// Fails if the catalog is empty or two descriptors share a name.
    pub fn new(descriptors: impl IntoIterator<Item = ServiceDescriptor>) -> Result<Self> {
        let descriptors: Vec<_> = descriptors.into_iter().collect();
        if descriptors.is_empty() {
            return Err(Error::InvalidRegistry("no services".into()));
        }

        let mut index = HashMap::with_capacity(descriptors.len());
        for (i, descriptor) in descriptors.iter().enumerate() {
            if index.insert(descriptor.name.clone(), i).is_some() {
                return Err(Error::InvalidRegistry(format!(
                    "duplicate service `{}`",
                    descriptor.name
                )));
            }
        }

        Ok(Self { descriptors, index })
    }

    /// # Errors
    ///
    /// See [`ServiceRegistry::new`].
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.descriptors().cloned())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ServiceDescriptor> {
        self.position(name).map(|i| &self.descriptors[i])
    }

    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[ServiceDescriptor] {
        &self.descriptors
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServiceDescriptor> {
        self.descriptors.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.descriptors.iter().map(|d| d.name.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
