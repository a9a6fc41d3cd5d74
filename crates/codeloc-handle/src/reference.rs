//! ---
//! codeloc_section: "06-location-handles"
//! codeloc_subsection: "module"
//! codeloc_type: "source"
//! codeloc_scope: "code"
//! codeloc_description: "Location handles and the references derived from them."
//! codeloc_version: "v0.1.0"
//! codeloc_owner: "tbd"
//! ---
//! Immutable addressing keys for entities hosted at a location.
//!
//! Equality and hashing follow the name chain only. A reference built on one
//! location handle compares equal to the same reference built on another
//! handle with the same location name, so references survive a reload.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use codeloc_schema::{
    ExternalJobOrigin, ExternalPartitionSetOrigin, ExternalPipelineOrigin, ExternalRepositoryOrigin,
    PipelinePythonOrigin, PipelineSelector, RepositoryPythonOrigin,
};

use crate::error::Result;
use crate::location::RepositoryLocationHandle;

/// A repository at a location.
#[derive(Clone)]
pub struct RepositoryHandle {
    repository_name: String,
    location_handle: Arc<dyn RepositoryLocationHandle>,
}

impl RepositoryHandle {
    pub fn new(
        repository_name: impl Into<String>,
        location_handle: Arc<dyn RepositoryLocationHandle>,
    ) -> Self {
        Self {
            repository_name: repository_name.into(),
            location_handle,
        }
    }

    pub fn repository_name(&self) -> &str {
        &self.repository_name
    }

    pub fn location_name(&self) -> &str {
        self.location_handle.location_name()
    }

    pub fn location_handle(&self) -> &Arc<dyn RepositoryLocationHandle> {
        &self.location_handle
    }

    pub fn external_origin(&self) -> ExternalRepositoryOrigin {
        ExternalRepositoryOrigin::new(self.location_handle.origin().clone(), self.repository_name.as_str())
    }

    /// Fails with `RepositoryNotFound` when the location has no code pointer for this repository.
    pub fn python_origin(&self) -> Result<RepositoryPythonOrigin> {
        self.location_handle.repository_python_origin(&self.repository_name)
    }

    pub fn pipeline(&self, pipeline_name: impl Into<String>) -> PipelineHandle {
        PipelineHandle::new(pipeline_name, self.clone())
    }

    pub fn job(&self, job_name: impl Into<String>) -> JobHandle {
        JobHandle::new(job_name, self.clone())
    }

    pub fn partition_set(&self, partition_set_name: impl Into<String>) -> PartitionSetHandle {
        PartitionSetHandle::new(partition_set_name, self.clone())
    }
}

impl PartialEq for RepositoryHandle {
    fn eq(&self, other: &Self) -> bool {
        self.repository_name == other.repository_name && self.location_name() == other.location_name()
    }
}

impl Eq for RepositoryHandle {}

impl Hash for RepositoryHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.location_name().hash(state);
        self.repository_name.hash(state);
    }
}

impl fmt::Debug for RepositoryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryHandle")
            .field("repository_name", &self.repository_name)
            .field("location_name", &self.location_name())
            .finish()
    }
}

/// A pipeline within a repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineHandle {
    pipeline_name: String,
    repository_handle: RepositoryHandle,
}

impl PipelineHandle {
    pub fn new(pipeline_name: impl Into<String>, repository_handle: RepositoryHandle) -> Self {
        Self {
            pipeline_name: pipeline_name.into(),
            repository_handle,
        }
    }

    pub fn pipeline_name(&self) -> &str {
        &self.pipeline_name
    }

    pub fn repository_name(&self) -> &str {
        self.repository_handle.repository_name()
    }

    pub fn location_name(&self) -> &str {
        self.repository_handle.location_name()
    }

    pub fn repository_handle(&self) -> &RepositoryHandle {
        &self.repository_handle
    }

    pub fn external_origin(&self) -> ExternalPipelineOrigin {
        self.repository_handle
            .external_origin()
            .pipeline_origin(self.pipeline_name.as_str())
    }

    pub fn python_origin(&self) -> Result<PipelinePythonOrigin> {
        Ok(self
            .repository_handle
            .python_origin()?
            .pipeline_origin(self.pipeline_name.as_str()))
    }

    pub fn to_selector(&self) -> PipelineSelector {
        PipelineSelector::new(self.location_name(), self.repository_name(), self.pipeline_name.as_str())
    }
}

/// `<location>.<repository>.<pipeline>`
impl fmt::Display for PipelineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}",
            self.location_name(),
            self.repository_name(),
            self.pipeline_name
        )
    }
}

/// A job within a repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobHandle {
    job_name: String,
    repository_handle: RepositoryHandle,
}

impl JobHandle {
    pub fn new(job_name: impl Into<String>, repository_handle: RepositoryHandle) -> Self {
        Self {
            job_name: job_name.into(),
            repository_handle,
        }
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn repository_name(&self) -> &str {
        self.repository_handle.repository_name()
    }

    pub fn location_name(&self) -> &str {
        self.repository_handle.location_name()
    }

    pub fn external_origin(&self) -> ExternalJobOrigin {
        self.repository_handle.external_origin().job_origin(self.job_name.as_str())
    }
}

/// A partition set within a repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionSetHandle {
    partition_set_name: String,
    repository_handle: RepositoryHandle,
}

impl PartitionSetHandle {
    pub fn new(partition_set_name: impl Into<String>, repository_handle: RepositoryHandle) -> Self {
        Self {
            partition_set_name: partition_set_name.into(),
            repository_handle,
        }
    }

    pub fn partition_set_name(&self) -> &str {
        &self.partition_set_name
    }

    pub fn repository_name(&self) -> &str {
        self.repository_handle.repository_name()
    }

    pub fn location_name(&self) -> &str {
        self.repository_handle.location_name()
    }

    pub fn external_origin(&self) -> ExternalPartitionSetOrigin {
        self.repository_handle
            .external_origin()
            .partition_set_origin(self.partition_set_name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_process::{InProcessLocationHandle, LoadedRepository, StaticRepositoryLoader};
    use codeloc_schema::{CodePointer, InProcessOrigin};
    use std::collections::HashSet;

    fn location(name: &str) -> Arc<dyn RepositoryLocationHandle> {
        let pointer = CodePointer::module("jobs.defs", "defs");
        let loader = StaticRepositoryLoader::new()
            .with_repository(pointer.clone(), LoadedRepository::new("defs", serde_json::json!({})));
        Arc::new(InProcessLocationHandle::load(&loader, InProcessOrigin::new(pointer, name), None).unwrap())
    }

    #[test]
    fn equality_ignores_handle_identity() {
        let first = location("local");
        let second = location("local");
        assert!(!Arc::ptr_eq(&first, &second));

        let a = RepositoryHandle::new("defs", first);
        let b = RepositoryHandle::new("defs", second);
        assert_eq!(a, b);
        assert_eq!(a.pipeline("nightly"), b.pipeline("nightly"));
        assert_ne!(a.job("nightly"), b.job("hourly"));

        let set: HashSet<_> = [a.clone(), b].into_iter().collect();
        assert_eq!(set.len(), 1);
        assert_ne!(a, RepositoryHandle::new("defs", location("elsewhere")));
    }

    #[test]
    fn pipeline_addresses() {
        let repository = RepositoryHandle::new("defs", location("local"));
        let pipeline = repository.pipeline("nightly");
        assert_eq!(pipeline.to_string(), "local.defs.nightly");

        let selector = pipeline.to_selector();
        assert_eq!(selector.location_name, "local");
        assert_eq!(selector.repository_name, "defs");
        assert!(selector.solid_selection.is_none());

        let external = pipeline.external_origin();
        assert_eq!(external.pipeline_name, "nightly");
        assert_eq!(external.repository_origin.location_origin.location_name(), "local");

        let python = pipeline.python_origin().unwrap();
        assert_eq!(python.pipeline_name, "nightly");
        assert_eq!(python.repository_origin.code_pointer, CodePointer::module("jobs.defs", "defs"));
    }

    #[test]
    fn unknown_repository_python_origin_fails() {
        let repository = RepositoryHandle::new("other", location("local"));
        let err = repository.pipeline("nightly").python_origin().unwrap_err();
        assert!(matches!(err, crate::error::HandleError::RepositoryNotFound { .. }));
        assert_eq!(
            repository.partition_set("daily").external_origin().partition_set_name,
            "daily"
        );
    }
}
