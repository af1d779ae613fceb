//! Service registry plugins contribute to.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// How long a registered service instance lives in the host container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServiceLifetime {
    #[default]
    Singleton,
    Scoped,
    Transient,
}

/// One registration: a name, a lifetime and a type-erased instance.
#[derive(Clone)]
pub struct ServiceDescriptor {
    pub name: String,
    pub lifetime: ServiceLifetime,
    pub instance: Arc<dyn Any + Send + Sync>,
}

impl ServiceDescriptor {
    pub fn new(
        name: impl Into<String>,
        lifetime: ServiceLifetime,
        instance: Arc<dyn Any + Send + Sync>,
    ) -> Self {
        Self {
            name: name.into(),
            lifetime,
            instance,
        }
    }

    pub fn singleton<T: Any + Send + Sync>(name: impl Into<String>, value: T) -> Self {
        Self::new(name, ServiceLifetime::Singleton, Arc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.instance.downcast_ref::<T>()
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("name", &self.name)
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

/// Mutable registration surface owned by the host application.
pub trait ServiceRegistry: Send {
    fn add(&mut self, descriptor: ServiceDescriptor);

    fn len(&self) -> usize;

    fn contains(&self, name: &str) -> bool;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Plain ordered list of registrations.
#[derive(Debug, Clone, Default)]
pub struct ServiceCollection {
    descriptors: Vec<ServiceDescriptor>,
}

impl ServiceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recent registration under `name`.
    pub fn get(&self, name: &str) -> Option<&ServiceDescriptor> {
        self.descriptors.iter().rev().find(|d| d.name == name)
    }

    pub fn get_as<T: Any>(&self, name: &str) -> Option<&T> {
        self.get(name).and_then(ServiceDescriptor::downcast_ref)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServiceDescriptor> {
        self.descriptors.iter()
    }
}

impl ServiceRegistry for ServiceCollection {
    fn add(&mut self, descriptor: ServiceDescriptor) {
        self.descriptors.push(descriptor);
    }

    fn len(&self) -> usize {
        self.descriptors.len()
    }

    fn contains(&self, name: &str) -> bool {
        self.descriptors.iter().any(|d| d.name == name)
    }
}
