//! ---
//! codeloc_section: "02-origins-schema"
//! codeloc_subsection: "module"
//! codeloc_type: "source"
//! codeloc_scope: "code"
//! codeloc_description: "Shared schema definitions for origins and events."
//! codeloc_version: "v0.1.0"
//! codeloc_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};

/// Name-only address of a pipeline, optionally narrowed to a subset of its steps.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PipelineSelector {
    /// Location name.
    pub location_name: String,
    /// Repository name.
    pub repository_name: String,
    /// Pipeline name.
    pub pipeline_name: String,
    /// Step subset; `None` selects the whole pipeline.
    #[serde(default)]
    pub solid_selection: Option<Vec<String>>,
}

impl PipelineSelector {
    /// Selector for a whole pipeline.
    pub fn new(
        location_name: impl Into<String>,
        repository_name: impl Into<String>,
        pipeline_name: impl Into<String>,
    ) -> Self {
        Self {
            location_name: location_name.into(),
            repository_name: repository_name.into(),
            pipeline_name: pipeline_name.into(),
            solid_selection: None,
        }
    }

    /// Narrow the selector to the given steps.
    pub fn with_solid_selection(mut self, selection: Vec<String>) -> Self {
        self.solid_selection = Some(selection);
        self
    }
}
