//! ---
//! codeloc_section: "02-origins-schema"
//! codeloc_subsection: "module"
//! codeloc_type: "source"
//! codeloc_scope: "code"
//! codeloc_description: "Shared schema definitions for origins and events."
//! codeloc_version: "v0.1.0"
//! codeloc_owner: "tbd"
//! ---
//! Location-relative addresses of entities hosted at a location.
use serde::{Deserialize, Serialize};

use crate::{stable_id, RepositoryLocationOrigin, SchemaResult};

/// A repository addressed by its location origin and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalRepositoryOrigin {
    /// Origin of the hosting location.
    pub location_origin: RepositoryLocationOrigin,
    /// Repository name inside the location.
    pub repository_name: String,
}

impl ExternalRepositoryOrigin {
    /// Address `repository_name` at `location_origin`.
    pub fn new(location_origin: RepositoryLocationOrigin, repository_name: impl Into<String>) -> Self {
        Self {
            location_origin,
            repository_name: repository_name.into(),
        }
    }

    /// Address a pipeline inside this repository.
    pub fn pipeline_origin(&self, pipeline_name: impl Into<String>) -> ExternalPipelineOrigin {
        ExternalPipelineOrigin {
            repository_origin: self.clone(),
            pipeline_name: pipeline_name.into(),
        }
    }

    /// Address a job inside this repository.
    pub fn job_origin(&self, job_name: impl Into<String>) -> ExternalJobOrigin {
        ExternalJobOrigin {
            repository_origin: self.clone(),
            job_name: job_name.into(),
        }
    }

    /// Address a partition set inside this repository.
    pub fn partition_set_origin(
        &self,
        partition_set_name: impl Into<String>,
    ) -> ExternalPartitionSetOrigin {
        ExternalPartitionSetOrigin {
            repository_origin: self.clone(),
            partition_set_name: partition_set_name.into(),
        }
    }

    /// Stable identifier of the address.
    pub fn id(&self) -> SchemaResult<String> {
        stable_id(self)
    }
}

/// A pipeline addressed through its repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalPipelineOrigin {
    /// Owning repository.
    pub repository_origin: ExternalRepositoryOrigin,
    /// Pipeline name.
    pub pipeline_name: String,
}

impl ExternalPipelineOrigin {
    /// Stable identifier of the address.
    pub fn id(&self) -> SchemaResult<String> {
        stable_id(self)
    }
}

/// A job addressed through its repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalJobOrigin {
    /// Owning repository.
    pub repository_origin: ExternalRepositoryOrigin,
    /// Job name.
    pub job_name: String,
}

impl ExternalJobOrigin {
    /// Stable identifier of the address.
    pub fn id(&self) -> SchemaResult<String> {
        stable_id(self)
    }
}

/// A partition set addressed through its repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalPartitionSetOrigin {
    /// Owning repository.
    pub repository_origin: ExternalRepositoryOrigin,
    /// Partition set name.
    pub partition_set_name: String,
}

impl ExternalPartitionSetOrigin {
    /// Stable identifier of the address.
    pub fn id(&self) -> SchemaResult<String> {
        stable_id(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ExternalGrpcOrigin, GrpcEndpoint};

    fn repo_origin() -> ExternalRepositoryOrigin {
        let location = ExternalGrpcOrigin::new("localhost", GrpcEndpoint::Port(4000))
            .with_location_name("analytics");
        ExternalRepositoryOrigin::new(location.into(), "demo_repo")
    }

    #[test]
    fn derived_origins_keep_the_repository_chain() {
        let repo = repo_origin();
        let job = repo.job_origin("nightly");
        assert_eq!(job.repository_origin, repo);
        assert_eq!(job.repository_origin.location_origin.location_name(), "analytics");
        let partitions = repo.partition_set_origin("daily");
        assert_eq!(partitions.partition_set_name, "daily");
    }

    #[test]
    fn sibling_ids_differ() {
        let repo = repo_origin();
        let pipeline = repo.pipeline_origin("ingest").id().unwrap();
        let job = repo.job_origin("ingest").id().unwrap();
        assert_ne!(pipeline, repo.id().unwrap());
        assert_eq!(pipeline, repo_origin().pipeline_origin("ingest").id().unwrap());
        assert_ne!(pipeline, repo.pipeline_origin("other").id().unwrap());
        assert_eq!(job.len(), 64);
    }
}
