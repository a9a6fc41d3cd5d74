//! ---
//! codeloc_section: "07-test-harness"
//! codeloc_subsection: "module"
//! codeloc_type: "source"
//! codeloc_scope: "code"
//! codeloc_description: "Stub collaborators for exercising location handles without real servers."
//! codeloc_version: "v0.1.0"
//! codeloc_owner: "tbd"
//! ---
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use codeloc_rpc::{
    ConnectionParams, CurrentImage, ListRepositoriesResponse, LocationClient, RepositoryDataChunk,
    RepositoryDataStream, RepositorySymbol, Result, RpcError,
};
use codeloc_schema::{CodePointer, RepositoryLocationOrigin};
use futures::StreamExt;
use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::trace;

/// RPC methods of the location surface, used for call counting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StubMethod {
    ListRepositories,
    GetServerId,
    Heartbeat,
    GetCurrentImage,
    FetchRepositoriesData,
    ShutdownServer,
}

impl StubMethod {
    fn name(self) -> &'static str {
        match self {
            Self::ListRepositories => "ListRepositories",
            Self::GetServerId => "GetServerId",
            Self::Heartbeat => "Heartbeat",
            Self::GetCurrentImage => "GetCurrentImage",
            Self::FetchRepositoriesData => "FetchRepositoriesData",
            Self::ShutdownServer => "ShutdownServer",
        }
    }
}

#[derive(Debug)]
struct StubRepository {
    pointer: CodePointer,
    data: serde_json::Value,
}

#[derive(Debug)]
struct StubState {
    executable_path: String,
    repositories: IndexMap<String, StubRepository>,
    image: Option<String>,
    server_ids: VecDeque<String>,
    failures: HashMap<StubMethod, RpcError>,
    /// `None` hangs the call until it is dropped.
    stalls: HashMap<StubMethod, Option<Duration>>,
    unreachable: bool,
    shut_down: bool,
    calls: HashMap<StubMethod, usize>,
}

/// Scriptable in-memory location server.
///
/// `GetServerId` walks the scripted id sequence and keeps answering with the
/// last id once the sequence is exhausted. After `ShutdownServer` every call
/// fails as unavailable.
#[derive(Debug)]
pub struct StubLocationServer {
    params: ConnectionParams,
    state: Mutex<StubState>,
}

impl StubLocationServer {
    pub fn new(params: ConnectionParams) -> Self {
        Self {
            params,
            state: Mutex::new(StubState {
                executable_path: "/usr/bin/python3".to_owned(),
                repositories: IndexMap::new(),
                image: None,
                server_ids: VecDeque::from([uuid::Uuid::new_v4().to_string()]),
                failures: HashMap::new(),
                stalls: HashMap::new(),
                unreachable: false,
                shut_down: false,
                calls: HashMap::new(),
            }),
        }
    }

    /// Advertise a repository. Its catalog payload is `{"name": <name>}`.
    pub fn with_repository(self, name: &str, pointer: CodePointer) -> Self {
        let data = serde_json::json!({ "name": name });
        self.with_repository_data(name, pointer, data)
    }

    pub fn with_repository_data(self, name: &str, pointer: CodePointer, data: serde_json::Value) -> Self {
        self.state
            .lock()
            .repositories
            .insert(name.to_owned(), StubRepository { pointer, data });
        self
    }

    pub fn with_executable_path(self, path: &str) -> Self {
        self.state.lock().executable_path = path.to_owned();
        self
    }

    pub fn with_image(self, image: &str) -> Self {
        self.state.lock().image = Some(image.to_owned());
        self
    }

    /// Simulate a redeploy under a new image.
    pub fn set_image(&self, image: Option<&str>) {
        self.state.lock().image = image.map(str::to_owned);
    }

    pub fn with_server_ids<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.script_server_ids(ids);
        self
    }

    /// Replace the id sequence served from now on.
    pub fn script_server_ids<I, S>(&self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: VecDeque<String> = ids.into_iter().map(Into::into).collect();
        if !ids.is_empty() {
            self.state.lock().server_ids = ids;
        }
    }

    /// Simulate a restart under `server_id`.
    pub fn set_server_id(&self, server_id: &str) {
        self.script_server_ids([server_id]);
    }

    /// Make `method` fail with `error` until cleared with [`Self::clear_failure`].
    pub fn fail(&self, method: StubMethod, error: RpcError) {
        self.state.lock().failures.insert(method, error);
    }

    pub fn clear_failure(&self, method: StubMethod) {
        self.state.lock().failures.remove(&method);
    }

    /// Delay every answer to `method` by `delay`, or never answer when `delay` is `None`.
    ///
    /// Calls are counted when they arrive, so a hung call still shows up in [`Self::calls`].
    pub fn stall(&self, method: StubMethod, delay: Option<Duration>) {
        self.state.lock().stalls.insert(method, delay);
    }

    pub fn clear_stall(&self, method: StubMethod) {
        self.state.lock().stalls.remove(&method);
    }

    /// Toggle a full outage: every method answers unavailable.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unreachable = unreachable;
    }

    pub fn calls(&self, method: StubMethod) -> usize {
        self.state.lock().calls.get(&method).copied().unwrap_or(0)
    }

    pub fn shutdown_calls(&self) -> usize {
        self.calls(StubMethod::ShutdownServer)
    }

    pub fn is_shut_down(&self) -> bool {
        self.state.lock().shut_down
    }

    /// Count the call, then hold it for as long as the method is stalled.
    async fn arrive(&self, method: StubMethod) {
        let stall = {
            let mut state = self.state.lock();
            *state.calls.entry(method).or_default() += 1;
            state.stalls.get(&method).copied()
        };
        trace!(endpoint = %self.params, method = method.name(), ?stall, "stub call");
        match stall {
            None => {}
            Some(Some(delay)) => tokio::time::sleep(delay).await,
            Some(None) => futures::future::pending::<()>().await,
        }
    }

    fn enter(&self, method: StubMethod) -> Result<parking_lot::MutexGuard<'_, StubState>> {
        let state = self.state.lock();
        if state.unreachable || state.shut_down {
            return Err(RpcError::Unavailable {
                endpoint: self.params.to_string(),
                message: "stub server unreachable".to_owned(),
            });
        }
        if let Some(error) = state.failures.get(&method) {
            return Err(error.clone());
        }
        Ok(state)
    }
}

#[async_trait]
impl LocationClient for StubLocationServer {
    fn params(&self) -> &ConnectionParams {
        &self.params
    }

    async fn list_repositories(&self) -> Result<ListRepositoriesResponse> {
        self.arrive(StubMethod::ListRepositories).await;
        let state = self.enter(StubMethod::ListRepositories)?;
        Ok(ListRepositoriesResponse {
            executable_path: state.executable_path.clone(),
            repository_code_pointers: state
                .repositories
                .iter()
                .map(|(name, repo)| (name.clone(), repo.pointer.clone()))
                .collect(),
            repository_symbols: state
                .repositories
                .iter()
                .map(|(name, repo)| RepositorySymbol {
                    repository_name: name.clone(),
                    attribute: Some(repo.pointer.attribute().to_owned()),
                })
                .collect(),
        })
    }

    async fn get_server_id(&self) -> Result<String> {
        self.arrive(StubMethod::GetServerId).await;
        let mut state = self.enter(StubMethod::GetServerId)?;
        if state.server_ids.len() > 1 {
            if let Some(id) = state.server_ids.pop_front() {
                return Ok(id);
            }
        }
        state
            .server_ids
            .front()
            .cloned()
            .ok_or_else(|| RpcError::Stream("no server id scripted".to_owned()))
    }

    async fn heartbeat(&self, echo: &str) -> Result<String> {
        self.arrive(StubMethod::Heartbeat).await;
        self.enter(StubMethod::Heartbeat)?;
        Ok(echo.to_owned())
    }

    async fn get_current_image(&self) -> Result<CurrentImage> {
        self.arrive(StubMethod::GetCurrentImage).await;
        let state = self.enter(StubMethod::GetCurrentImage)?;
        Ok(CurrentImage {
            current_image: state.image.clone(),
        })
    }

    async fn fetch_repositories_data(
        &self,
        _location: &RepositoryLocationOrigin,
    ) -> Result<RepositoryDataStream> {
        self.arrive(StubMethod::FetchRepositoriesData).await;
        let state = self.enter(StubMethod::FetchRepositoriesData)?;
        let chunks: Vec<Result<RepositoryDataChunk>> = state
            .repositories
            .iter()
            .map(|(name, repo)| {
                Ok(RepositoryDataChunk {
                    repository_name: name.clone(),
                    repository_data: repo.data.clone(),
                })
            })
            .collect();
        Ok(futures::stream::iter(chunks).boxed())
    }

    async fn shutdown_server(&self) -> Result<()> {
        self.arrive(StubMethod::ShutdownServer).await;
        let mut state = self.enter(StubMethod::ShutdownServer)?;
        state.shut_down = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> StubLocationServer {
        StubLocationServer::new(ConnectionParams::tcp("localhost", 4000))
            .with_repository("demo_repo", CodePointer::file("repo.py", "demo_repo"))
    }

    #[tokio::test]
    async fn server_ids_advance_then_repeat_last() {
        let stub = server().with_server_ids(["a", "b"]);
        assert_eq!(stub.get_server_id().await.unwrap(), "a");
        assert_eq!(stub.get_server_id().await.unwrap(), "b");
        assert_eq!(stub.get_server_id().await.unwrap(), "b");
        assert_eq!(stub.calls(StubMethod::GetServerId), 3);
    }

    #[tokio::test]
    async fn injected_failure_is_returned() {
        let stub = server();
        stub.fail(StubMethod::GetCurrentImage, RpcError::Closed);
        assert!(matches!(stub.get_current_image().await, Err(RpcError::Closed)));
        stub.clear_failure(StubMethod::GetCurrentImage);
        assert!(stub.get_current_image().await.is_ok());
    }

    #[tokio::test]
    async fn stalled_calls_answer_late_or_never() {
        let stub = server();
        stub.stall(StubMethod::Heartbeat, Some(Duration::from_millis(30)));
        let started = std::time::Instant::now();
        assert_eq!(stub.heartbeat("ping").await.unwrap(), "ping");
        assert!(started.elapsed() >= Duration::from_millis(30));

        stub.stall(StubMethod::GetServerId, None);
        let hung = tokio::time::timeout(Duration::from_millis(50), stub.get_server_id()).await;
        assert!(hung.is_err());
        assert_eq!(stub.calls(StubMethod::GetServerId), 1);

        stub.clear_stall(StubMethod::GetServerId);
        assert!(stub.get_server_id().await.is_ok());
    }

    #[tokio::test]
    async fn shutdown_makes_server_unavailable() {
        let stub = server();
        stub.shutdown_server().await.unwrap();
        assert!(stub.is_shut_down());
        let err = stub.heartbeat("ping").await.unwrap_err();
        assert!(err.is_unavailable());
        assert_eq!(stub.shutdown_calls(), 1);
    }

    #[tokio::test]
    async fn listing_reports_pointers_and_symbols() {
        let listing = server().list_repositories().await.unwrap();
        assert_eq!(listing.symbol_names().collect::<Vec<_>>(), vec!["demo_repo"]);
        assert!(listing.repository_code_pointers.contains_key("demo_repo"));
    }
}
