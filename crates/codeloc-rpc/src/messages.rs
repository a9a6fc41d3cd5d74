//! ---
//! codeloc_section: "04-rpc-interfaces"
//! codeloc_subsection: "module"
//! codeloc_type: "source"
//! codeloc_scope: "code"
//! codeloc_description: "Location RPC contract and managed worker supervision."
//! codeloc_version: "v0.1.0"
//! codeloc_owner: "tbd"
//! ---
use codeloc_schema::CodePointer;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A repository advertised by `ListRepositories`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySymbol {
    pub repository_name: String,
    #[serde(default)]
    pub attribute: Option<String>,
}

impl RepositorySymbol {
    pub fn new(repository_name: impl Into<String>) -> Self {
        Self {
            repository_name: repository_name.into(),
            attribute: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListRepositoriesResponse {
    pub executable_path: String,
    pub repository_code_pointers: IndexMap<String, CodePointer>,
    pub repository_symbols: Vec<RepositorySymbol>,
}

impl ListRepositoriesResponse {
    pub fn symbol_names(&self) -> impl Iterator<Item = &str> {
        self.repository_symbols
            .iter()
            .map(|symbol| symbol.repository_name.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentImage {
    #[serde(default)]
    pub current_image: Option<String>,
}

/// One element of the streamed catalog. `repository_data` is opaque to this layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryDataChunk {
    pub repository_name: String,
    pub repository_data: serde_json::Value,
}

/// Full catalog payload keyed by repository name, in stream order.
pub type RepositoryCatalog = IndexMap<String, serde_json::Value>;
