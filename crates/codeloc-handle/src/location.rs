//! ---
//! codeloc_section: "06-location-handles"
//! codeloc_subsection: "module"
//! codeloc_type: "source"
//! codeloc_scope: "code"
//! codeloc_description: "Location handles and the references derived from them."
//! codeloc_version: "v0.1.0"
//! codeloc_owner: "tbd"
//! ---
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use codeloc_rpc::RepositoryCatalog;
use codeloc_schema::{CodePointer, DisplayMetadata, RepositoryLocationOrigin, RepositoryPythonOrigin};
use codeloc_supervision::LocationStateSubscriber;
use indexmap::IndexMap;

use crate::error::{HandleError, Result};
use crate::repository_location::RepositoryLocation;

/// A live connection to one code location.
///
/// Every variant is built by a single atomic construction sequence and torn
/// down by [`RepositoryLocationHandle::cleanup`], which is idempotent and never
/// fails. Catalog accessors read the snapshot taken during construction.
#[async_trait]
pub trait RepositoryLocationHandle: Send + Sync + fmt::Debug {
    fn origin(&self) -> &RepositoryLocationOrigin;

    fn location_name(&self) -> &str {
        self.origin().location_name()
    }

    /// Repository names advertised by the location.
    fn repository_names(&self) -> BTreeSet<String>;

    fn executable_path(&self) -> &str;

    fn repository_code_pointers(&self) -> &IndexMap<String, CodePointer>;

    fn container_image(&self) -> Option<String> {
        None
    }

    /// Runtime origin of `repository_name`; fails when the location does not host it.
    fn repository_python_origin(&self, repository_name: &str) -> Result<RepositoryPythonOrigin> {
        repository_python_origin(
            self.executable_path(),
            self.repository_code_pointers(),
            repository_name,
            self.container_image(),
            self.location_name(),
        )
    }

    fn display_metadata(&self) -> DisplayMetadata {
        let mut metadata = self.origin().display_metadata();
        if let Some(image) = self.container_image() {
            metadata.insert("image".to_owned(), image);
        }
        metadata
    }

    /// Current server incarnation, for variants that talk to a server.
    fn server_id(&self) -> Option<String> {
        None
    }

    /// Register for state change events. A no-op unless the handle watches its server.
    fn add_state_subscriber(&self, _subscriber: Arc<dyn LocationStateSubscriber>) {}

    /// Streamed repository payloads keyed by repository name.
    fn repositories_data(&self) -> Result<RepositoryCatalog>;

    /// Build the catalog view of this location.
    fn create_location(self: Arc<Self>) -> Result<RepositoryLocation>;

    fn is_cleaned_up(&self) -> bool;

    async fn cleanup(&self);
}

/// Compose the runtime origin for `repository_name` out of a code-pointer map.
pub fn repository_python_origin(
    executable_path: &str,
    code_pointers: &IndexMap<String, CodePointer>,
    repository_name: &str,
    container_image: Option<String>,
    location_name: &str,
) -> Result<RepositoryPythonOrigin> {
    let pointer = code_pointers
        .get(repository_name)
        .ok_or_else(|| HandleError::RepositoryNotFound {
            repository_name: repository_name.to_owned(),
            location_name: location_name.to_owned(),
        })?;
    Ok(RepositoryPythonOrigin::new(
        executable_path,
        pointer.clone(),
        container_image,
    ))
}

/// Per-construction switches for client-owning handles.
#[derive(Clone)]
pub struct HandleOptions {
    /// Reuse a server id the caller already knows instead of asking the server.
    ///
    /// The watch loop compares every poll against this id, so a stale value
    /// produces an `UPDATED` event carrying the live id on the first poll.
    pub server_id: Option<String>,
    pub heartbeat: bool,
    pub watch: bool,
    /// Subscribers registered before the watch loop starts.
    pub subscribers: Vec<Arc<dyn LocationStateSubscriber>>,
}

impl Default for HandleOptions {
    fn default() -> Self {
        Self {
            server_id: None,
            heartbeat: false,
            watch: true,
            subscribers: Vec::new(),
        }
    }
}

impl fmt::Debug for HandleOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleOptions")
            .field("server_id", &self.server_id)
            .field("heartbeat", &self.heartbeat)
            .field("watch", &self.watch)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl HandleOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_server_id(mut self, server_id: impl Into<String>) -> Self {
        self.server_id = Some(server_id.into());
        self
    }

    pub fn with_heartbeat(mut self, heartbeat: bool) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    pub fn with_watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }

    pub fn with_subscriber(mut self, subscriber: Arc<dyn LocationStateSubscriber>) -> Self {
        self.subscribers.push(subscriber);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_repository_is_reported() {
        let mut pointers = IndexMap::new();
        pointers.insert("etl".to_owned(), CodePointer::module("jobs.etl", "etl"));

        let origin = repository_python_origin("/usr/bin/python3", &pointers, "etl", None, "loc").unwrap();
        assert_eq!(origin.code_pointer, CodePointer::module("jobs.etl", "etl"));

        let err = repository_python_origin("/usr/bin/python3", &pointers, "missing", None, "loc")
            .unwrap_err();
        assert!(matches!(
            err,
            HandleError::RepositoryNotFound { ref repository_name, .. } if repository_name == "missing"
        ));
    }

    #[test]
    fn default_options_watch_without_heartbeat() {
        let options = HandleOptions::new();
        assert!(options.watch);
        assert!(!options.heartbeat);
        assert!(options.server_id.is_none());
    }
}
