//! ---
//! codeloc_section: "02-origins-schema"
//! codeloc_subsection: "module"
//! codeloc_type: "source"
//! codeloc_scope: "code"
//! codeloc_description: "Shared schema definitions for origins and events."
//! codeloc_version: "v0.1.0"
//! codeloc_owner: "tbd"
//! ---
//! Runtime origins: enough to relaunch or re-identify the exact code behind a repository.
use serde::{Deserialize, Serialize};

use crate::{stable_id, CodePointer, SchemaResult};

/// Executable, code pointer and image that together define a repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryPythonOrigin {
    /// Interpreter or binary that hosts the code.
    pub executable_path: String,
    /// Where the repository definition lives.
    pub code_pointer: CodePointer,
    /// Container image the location runs in, when known.
    #[serde(default)]
    pub container_image: Option<String>,
}

impl RepositoryPythonOrigin {
    /// Build a runtime origin.
    pub fn new(
        executable_path: impl Into<String>,
        code_pointer: CodePointer,
        container_image: Option<String>,
    ) -> Self {
        Self {
            executable_path: executable_path.into(),
            code_pointer,
            container_image,
        }
    }

    /// Runtime origin of a pipeline inside this repository.
    pub fn pipeline_origin(&self, pipeline_name: impl Into<String>) -> PipelinePythonOrigin {
        PipelinePythonOrigin {
            pipeline_name: pipeline_name.into(),
            repository_origin: self.clone(),
        }
    }

    /// Stable identifier of the origin.
    pub fn id(&self) -> SchemaResult<String> {
        stable_id(self)
    }
}

/// Runtime origin of a single pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PipelinePythonOrigin {
    /// Pipeline name.
    pub pipeline_name: String,
    /// Owning repository's runtime origin.
    pub repository_origin: RepositoryPythonOrigin,
}

impl PipelinePythonOrigin {
    /// Executable shared with the owning repository.
    pub fn executable_path(&self) -> &str {
        &self.repository_origin.executable_path
    }

    /// Stable identifier of the origin.
    pub fn id(&self) -> SchemaResult<String> {
        stable_id(self)
    }
}
