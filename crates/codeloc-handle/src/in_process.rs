//! ---
//! codeloc_section: "06-location-handles"
//! codeloc_subsection: "module"
//! codeloc_type: "source"
//! codeloc_scope: "code"
//! codeloc_description: "Location handles and the references derived from them."
//! codeloc_version: "v0.1.0"
//! codeloc_owner: "tbd"
//! ---
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use codeloc_metrics::LocationMetrics;
use codeloc_rpc::RepositoryCatalog;
use codeloc_schema::{CodePointer, InProcessOrigin, RepositoryLocationOrigin};
use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::{HandleError, LoadError, Result};
use crate::location::RepositoryLocationHandle;
use crate::repository_location::RepositoryLocation;

pub(crate) const VARIANT: &str = "in_process";

/// A repository definition resolved in the calling process.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedRepository {
    pub name: String,
    /// Catalog payload describing the repository.
    pub data: serde_json::Value,
}

impl LoadedRepository {
    pub fn new(name: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

/// Resolves code pointers into repository definitions.
///
/// This is the only place the in-process variant touches user code, so any
/// plugin or interpreter integration lives behind it.
pub trait RepositoryLoader: Send + Sync {
    fn load(&self, pointer: &CodePointer) -> std::result::Result<LoadedRepository, LoadError>;
}

/// Loader backed by definitions registered up front.
#[derive(Debug, Default)]
pub struct StaticRepositoryLoader {
    definitions: RwLock<HashMap<CodePointer, LoadedRepository>>,
}

impl StaticRepositoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, pointer: CodePointer, repository: LoadedRepository) {
        self.definitions.write().insert(pointer, repository);
    }

    pub fn with_repository(self, pointer: CodePointer, repository: LoadedRepository) -> Self {
        self.register(pointer, repository);
        self
    }
}

impl RepositoryLoader for StaticRepositoryLoader {
    fn load(&self, pointer: &CodePointer) -> std::result::Result<LoadedRepository, LoadError> {
        self.definitions
            .read()
            .get(pointer)
            .cloned()
            .ok_or_else(|| LoadError::NotFound {
                pointer: pointer.to_string(),
            })
    }
}

/// Handle on a repository loaded directly into this process.
///
/// No client, no loops: the catalog comes from the loader and teardown only
/// flips the cleaned-up flag.
#[derive(Debug)]
pub struct InProcessLocationHandle {
    origin: RepositoryLocationOrigin,
    executable_path: String,
    code_pointers: IndexMap<String, CodePointer>,
    repositories_data: RepositoryCatalog,
    cleaned_up: AtomicBool,
    metrics: Option<LocationMetrics>,
}

impl InProcessLocationHandle {
    pub fn load(
        loader: &dyn RepositoryLoader,
        origin: InProcessOrigin,
        metrics: Option<LocationMetrics>,
    ) -> Result<Self> {
        let result = Self::load_inner(loader, origin, metrics.clone());
        if let Some(metrics) = &metrics {
            metrics.record_construction(VARIANT, result.is_ok());
        }
        result
    }

    fn load_inner(
        loader: &dyn RepositoryLoader,
        origin: InProcessOrigin,
        metrics: Option<LocationMetrics>,
    ) -> Result<Self> {
        let location_name = origin.location_name.clone();
        let pointer = origin.repository_pointer.clone();
        let repository = loader
            .load(&pointer)
            .map_err(|err| HandleError::construction(&location_name, err))?;
        let executable_path = std::env::current_exe()
            .map_err(|err| HandleError::construction(&location_name, LoadError::Executable(err)))?
            .display()
            .to_string();
        info!(location = %location_name, repository = %repository.name, pointer = %pointer, "loaded repository in process");

        let mut code_pointers = IndexMap::new();
        code_pointers.insert(repository.name.clone(), pointer);
        let mut repositories_data = RepositoryCatalog::new();
        repositories_data.insert(repository.name, repository.data);

        Ok(Self {
            origin: RepositoryLocationOrigin::from(origin),
            executable_path,
            code_pointers,
            repositories_data,
            cleaned_up: AtomicBool::new(false),
            metrics,
        })
    }
}

#[async_trait]
impl RepositoryLocationHandle for InProcessLocationHandle {
    fn origin(&self) -> &RepositoryLocationOrigin {
        &self.origin
    }

    fn repository_names(&self) -> BTreeSet<String> {
        self.code_pointers.keys().cloned().collect()
    }

    fn executable_path(&self) -> &str {
        &self.executable_path
    }

    fn repository_code_pointers(&self) -> &IndexMap<String, CodePointer> {
        &self.code_pointers
    }

    fn repositories_data(&self) -> Result<RepositoryCatalog> {
        Ok(self.repositories_data.clone())
    }

    fn create_location(self: Arc<Self>) -> Result<RepositoryLocation> {
        RepositoryLocation::new(self)
    }

    fn is_cleaned_up(&self) -> bool {
        self.cleaned_up.load(Ordering::SeqCst)
    }

    async fn cleanup(&self) {
        if !self.cleaned_up.swap(true, Ordering::SeqCst) {
            debug!(location = self.origin.location_name(), "in-process location released");
            if let Some(metrics) = &self.metrics {
                metrics.record_cleanup(VARIANT);
            }
        }
    }
}
