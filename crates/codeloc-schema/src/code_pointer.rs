//! ---
//! codeloc_section: "02-origins-schema"
//! codeloc_subsection: "module"
//! codeloc_type: "source"
//! codeloc_scope: "code"
//! codeloc_description: "Shared schema definitions for origins and events."
//! codeloc_version: "v0.1.0"
//! codeloc_owner: "tbd"
//! ---
use std::fmt;

use serde::{Deserialize, Serialize};

/// Serialisable reference to where a repository's defining code lives.
///
/// A pointer carries enough information to re-resolve the repository in a
/// different process: a source file, a module path or a package, plus the
/// attribute that yields the repository definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CodePointer {
    /// Definition loaded from a source file.
    File {
        /// Path of the file that holds the definition.
        source_file: String,
        /// Attribute resolved after loading the file.
        attribute: String,
        /// Directory the file is loaded relative to.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        working_directory: Option<String>,
    },
    /// Definition loaded from an importable module path.
    Module {
        /// Dotted module path.
        module: String,
        /// Attribute resolved after importing the module.
        attribute: String,
        /// Directory prepended to the search path before importing.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        working_directory: Option<String>,
    },
    /// Definition exported by an installed package.
    Package {
        /// Package identity.
        package: String,
        /// Attribute resolved from the package.
        attribute: String,
        /// Directory prepended to the search path before importing.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        working_directory: Option<String>,
    },
}

impl CodePointer {
    /// Pointer to an attribute defined in a source file.
    pub fn file(source_file: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::File {
            source_file: source_file.into(),
            attribute: attribute.into(),
            working_directory: None,
        }
    }

    /// Pointer to an attribute defined in a module.
    pub fn module(module: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::Module {
            module: module.into(),
            attribute: attribute.into(),
            working_directory: None,
        }
    }

    /// Pointer to an attribute exported by a package.
    pub fn package(package: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::Package {
            package: package.into(),
            attribute: attribute.into(),
            working_directory: None,
        }
    }

    /// Attach a working directory to the pointer.
    pub fn with_working_directory(mut self, directory: impl Into<String>) -> Self {
        let directory = Some(directory.into());
        match &mut self {
            Self::File {
                working_directory, ..
            }
            | Self::Module {
                working_directory, ..
            }
            | Self::Package {
                working_directory, ..
            } => *working_directory = directory,
        }
        self
    }

    /// Attribute that yields the repository definition.
    pub fn attribute(&self) -> &str {
        match self {
            Self::File { attribute, .. }
            | Self::Module { attribute, .. }
            | Self::Package { attribute, .. } => attribute,
        }
    }

    /// Working directory, if one was recorded.
    pub fn working_directory(&self) -> Option<&str> {
        match self {
            Self::File {
                working_directory, ..
            }
            | Self::Module {
                working_directory, ..
            }
            | Self::Package {
                working_directory, ..
            } => working_directory.as_deref(),
        }
    }

    /// The file, module or package the attribute lives in.
    pub fn container(&self) -> &str {
        match self {
            Self::File { source_file, .. } => source_file,
            Self::Module { module, .. } => module,
            Self::Package { package, .. } => package,
        }
    }
}

impl fmt::Display for CodePointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File { .. } => write!(f, "{}::{}", self.container(), self.attribute()),
            Self::Module { .. } => write!(f, "module {}::{}", self.container(), self.attribute()),
            Self::Package { .. } => write!(f, "package {}::{}", self.container(), self.attribute()),
        }
    }
}
