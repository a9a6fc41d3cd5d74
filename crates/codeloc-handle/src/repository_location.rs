//! ---
//! codeloc_section: "06-location-handles"
//! codeloc_subsection: "module"
//! codeloc_type: "source"
//! codeloc_scope: "code"
//! codeloc_description: "Location handles and the references derived from them."
//! codeloc_version: "v0.1.0"
//! codeloc_owner: "tbd"
//! ---
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{HandleError, Result};
use crate::location::RepositoryLocationHandle;
use crate::reference::RepositoryHandle;

/// Catalog payload of one repository paired with its reference handle.
#[derive(Debug, Clone)]
pub struct ExternalRepository {
    data: serde_json::Value,
    handle: RepositoryHandle,
}

impl ExternalRepository {
    pub fn new(data: serde_json::Value, handle: RepositoryHandle) -> Self {
        Self { data, handle }
    }

    pub fn name(&self) -> &str {
        self.handle.repository_name()
    }

    pub fn data(&self) -> &serde_json::Value {
        &self.data
    }

    pub fn handle(&self) -> &RepositoryHandle {
        &self.handle
    }
}

/// Catalog view over a location handle.
pub struct RepositoryLocation {
    handle: Arc<dyn RepositoryLocationHandle>,
    repositories: IndexMap<String, ExternalRepository>,
}

impl RepositoryLocation {
    /// Build the view from the handle's catalog snapshot.
    pub fn new(handle: Arc<dyn RepositoryLocationHandle>) -> Result<Self> {
        let repositories = handle
            .repositories_data()?
            .into_iter()
            .map(|(name, data)| {
                let reference = RepositoryHandle::new(name.as_str(), handle.clone());
                (name, ExternalRepository::new(data, reference))
            })
            .collect();
        Ok(Self {
            handle,
            repositories,
        })
    }

    pub fn name(&self) -> &str {
        self.handle.location_name()
    }

    pub fn handle(&self) -> &Arc<dyn RepositoryLocationHandle> {
        &self.handle
    }

    pub fn has_repository(&self, name: &str) -> bool {
        self.repositories.contains_key(name)
    }

    pub fn get_repository(&self, name: &str) -> Result<&ExternalRepository> {
        self.repositories
            .get(name)
            .ok_or_else(|| HandleError::RepositoryNotFound {
                repository_name: name.to_owned(),
                location_name: self.name().to_owned(),
            })
    }

    /// Repositories in the order the location streamed them.
    pub fn repositories(&self) -> impl Iterator<Item = &ExternalRepository> {
        self.repositories.values()
    }
}

impl fmt::Debug for RepositoryLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryLocation")
            .field("name", &self.name())
            .field("repositories", &self.repositories.keys().collect::<Vec<_>>())
            .finish()
    }
}
