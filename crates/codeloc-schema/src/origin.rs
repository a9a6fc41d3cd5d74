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
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{stable_id, CodePointer, DisplayMetadata, SchemaError, SchemaResult};

/// Description of the code a managed worker must load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoadableTargetOrigin {
    /// Interpreter or binary used to host the code; `None` means the platform default.
    #[serde(default)]
    pub executable_path: Option<String>,
    /// Source file holding the definitions.
    #[serde(default)]
    pub source_file: Option<String>,
    /// Module path holding the definitions.
    #[serde(default)]
    pub module_name: Option<String>,
    /// Installed package holding the definitions.
    #[serde(default)]
    pub package_name: Option<String>,
    /// Working directory for the worker process.
    #[serde(default)]
    pub working_directory: Option<String>,
    /// Attribute to load; when absent the worker discovers every repository.
    #[serde(default)]
    pub attribute: Option<String>,
}

impl LoadableTargetOrigin {
    /// Reject targets that name no code at all.
    pub fn validate(&self) -> SchemaResult<()> {
        if self.source_file.is_none() && self.module_name.is_none() && self.package_name.is_none()
        {
            return Err(SchemaError::EmptyTarget);
        }
        Ok(())
    }

    /// Default location name: the attribute, module, package or file stem, in that order.
    pub fn default_location_name(&self) -> String {
        if let Some(attribute) = &self.attribute {
            return attribute.clone();
        }
        if let Some(module) = &self.module_name {
            return module.clone();
        }
        if let Some(package) = &self.package_name {
            return package.clone();
        }
        self.source_file
            .as_deref()
            .and_then(|file| Path::new(file).file_stem())
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "managed".to_owned())
    }

    /// Operator-facing metadata for the target.
    pub fn display_metadata(&self) -> DisplayMetadata {
        let mut metadata = DisplayMetadata::new();
        let fields = [
            ("source_file", &self.source_file),
            ("module_name", &self.module_name),
            ("package_name", &self.package_name),
            ("working_directory", &self.working_directory),
            ("attribute", &self.attribute),
            ("executable_path", &self.executable_path),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                metadata.insert(key.to_owned(), value.clone());
            }
        }
        metadata
    }
}

/// Network endpoint of a location server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrpcEndpoint {
    /// TCP port on the origin's host.
    Port(u16),
    /// Unix domain socket path.
    Socket(String),
}

impl fmt::Display for GrpcEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Port(port) => write!(f, "{port}"),
            Self::Socket(socket) => f.write_str(socket),
        }
    }
}

/// An externally operated location server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalGrpcOrigin {
    /// Host the server listens on.
    pub host: String,
    /// Port or socket of the server.
    pub endpoint: GrpcEndpoint,
    /// Whether the channel must use TLS.
    #[serde(default)]
    pub use_tls: bool,
    /// Addressing key of the location.
    pub location_name: String,
}

impl ExternalGrpcOrigin {
    /// Origin with the default `grpc:<host>:<endpoint>` location name.
    pub fn new(host: impl Into<String>, endpoint: GrpcEndpoint) -> Self {
        let host = host.into();
        let location_name = format!("grpc:{host}:{endpoint}");
        Self {
            host,
            endpoint,
            use_tls: false,
            location_name,
        }
    }

    /// Override the location name.
    pub fn with_location_name(mut self, location_name: impl Into<String>) -> Self {
        self.location_name = location_name.into();
        self
    }

    /// Require TLS on the channel.
    pub fn with_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }

    /// Operator-facing metadata for the server.
    pub fn display_metadata(&self) -> DisplayMetadata {
        let mut metadata = DisplayMetadata::new();
        metadata.insert("host".to_owned(), self.host.clone());
        match &self.endpoint {
            GrpcEndpoint::Port(port) => metadata.insert("port".to_owned(), port.to_string()),
            GrpcEndpoint::Socket(socket) => metadata.insert("socket".to_owned(), socket.clone()),
        };
        if self.use_tls {
            metadata.insert("use_tls".to_owned(), "true".to_owned());
        }
        metadata
    }
}

/// A worker process the platform spawns and owns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManagedWorkerOrigin {
    /// Code the worker loads.
    pub loadable_target_origin: LoadableTargetOrigin,
    /// Addressing key of the location.
    pub location_name: String,
}

impl ManagedWorkerOrigin {
    /// Origin named after its target.
    pub fn new(loadable_target_origin: LoadableTargetOrigin) -> Self {
        let location_name = loadable_target_origin.default_location_name();
        Self {
            loadable_target_origin,
            location_name,
        }
    }

    /// Override the location name.
    pub fn with_location_name(mut self, location_name: impl Into<String>) -> Self {
        self.location_name = location_name.into();
        self
    }
}

/// Code loaded directly into the calling process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InProcessOrigin {
    /// Pointer to the repository definition.
    pub repository_pointer: CodePointer,
    /// Addressing key of the location.
    pub location_name: String,
}

impl InProcessOrigin {
    /// Origin for a pointer under an explicit name.
    pub fn new(repository_pointer: CodePointer, location_name: impl Into<String>) -> Self {
        Self {
            repository_pointer,
            location_name: location_name.into(),
        }
    }
}

/// How to reach or create a location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RepositoryLocationOrigin {
    /// Externally operated RPC server.
    ExternalGrpc(ExternalGrpcOrigin),
    /// Worker process spawned and owned by the platform.
    ManagedWorker(ManagedWorkerOrigin),
    /// Definitions loaded in the caller's process.
    InProcess(InProcessOrigin),
}

impl RepositoryLocationOrigin {
    /// Addressing key shared by every reference derived from this location.
    pub fn location_name(&self) -> &str {
        match self {
            Self::ExternalGrpc(origin) => &origin.location_name,
            Self::ManagedWorker(origin) => &origin.location_name,
            Self::InProcess(origin) => &origin.location_name,
        }
    }

    /// Short label of the variant, used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ExternalGrpc(_) => "external_grpc",
            Self::ManagedWorker(_) => "managed_worker",
            Self::InProcess(_) => "in_process",
        }
    }

    /// Operator-facing metadata describing how the location is reached.
    pub fn display_metadata(&self) -> DisplayMetadata {
        match self {
            Self::ExternalGrpc(origin) => origin.display_metadata(),
            Self::ManagedWorker(origin) => origin.loadable_target_origin.display_metadata(),
            Self::InProcess(origin) => {
                let mut metadata = DisplayMetadata::new();
                metadata.insert("in_process".to_owned(), origin.repository_pointer.to_string());
                metadata
            }
        }
    }

    /// Stable identifier of the origin.
    pub fn id(&self) -> SchemaResult<String> {
        stable_id(self)
    }
}

impl From<ExternalGrpcOrigin> for RepositoryLocationOrigin {
    fn from(origin: ExternalGrpcOrigin) -> Self {
        Self::ExternalGrpc(origin)
    }
}

impl From<ManagedWorkerOrigin> for RepositoryLocationOrigin {
    fn from(origin: ManagedWorkerOrigin) -> Self {
        Self::ManagedWorker(origin)
    }
}

impl From<InProcessOrigin> for RepositoryLocationOrigin {
    fn from(origin: InProcessOrigin) -> Self {
        Self::InProcess(origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grpc_origin_default_name_uses_endpoint() {
        let port = ExternalGrpcOrigin::new("localhost", GrpcEndpoint::Port(4266));
        assert_eq!(port.location_name, "grpc:localhost:4266");
        let socket = ExternalGrpcOrigin::new("localhost", GrpcEndpoint::Socket("/tmp/loc.sock".into()));
        assert_eq!(socket.location_name, "grpc:localhost:/tmp/loc.sock");
    }

    #[test]
    fn grpc_display_metadata_lists_endpoint() {
        let origin = ExternalGrpcOrigin::new("10.0.0.5", GrpcEndpoint::Port(4000)).with_tls(true);
        let metadata = RepositoryLocationOrigin::from(origin).display_metadata();
        let keys: Vec<_> = metadata.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["host", "port", "use_tls"]);
        assert_eq!(metadata["port"], "4000");
    }

    #[test]
    fn managed_location_name_prefers_attribute_then_module_then_file() {
        let mut target = LoadableTargetOrigin {
            source_file: Some("/srv/code/etl_repo.py".into()),
            ..LoadableTargetOrigin::default()
        };
        assert_eq!(target.default_location_name(), "etl_repo");
        target.module_name = Some("pipelines.etl".into());
        assert_eq!(target.default_location_name(), "pipelines.etl");
        target.attribute = Some("etl".into());
        assert_eq!(ManagedWorkerOrigin::new(target).location_name, "etl");
    }

    #[test]
    fn empty_target_is_rejected() {
        assert!(matches!(
            LoadableTargetOrigin::default().validate(),
            Err(SchemaError::EmptyTarget)
        ));
    }

    #[test]
    fn id_is_structural() {
        let a = RepositoryLocationOrigin::from(ExternalGrpcOrigin::new("h", GrpcEndpoint::Port(1)));
        let b = RepositoryLocationOrigin::from(ExternalGrpcOrigin::new("h", GrpcEndpoint::Port(1)));
        let c = RepositoryLocationOrigin::from(ExternalGrpcOrigin::new("h", GrpcEndpoint::Port(2)));
        assert_eq!(a.id().unwrap(), b.id().unwrap());
        assert_ne!(a.id().unwrap(), c.id().unwrap());
        assert_eq!(a.id().unwrap().len(), 64);
    }

    #[test]
    fn origin_round_trips_through_json() {
        let origin = RepositoryLocationOrigin::from(InProcessOrigin::new(
            CodePointer::module("jobs", "repo"),
            "local",
        ));
        let json = serde_json::to_string(&origin).unwrap();
        assert!(json.contains("\"kind\":\"in_process\""));
        let back: RepositoryLocationOrigin = serde_json::from_str(&json).unwrap();
        assert_eq!(back, origin);
        assert_eq!(back.location_name(), "local");
    }
}
