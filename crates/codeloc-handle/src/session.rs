//! ---
//! codeloc_section: "06-location-handles"
//! codeloc_subsection: "module"
//! codeloc_type: "source"
//! codeloc_scope: "code"
//! codeloc_description: "Location handles and the references derived from them."
//! codeloc_version: "v0.1.0"
//! codeloc_owner: "tbd"
//! ---
//! Construction and teardown shared by the handles that own an RPC client.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use codeloc_common::LocationConfig;
use codeloc_metrics::LocationMetrics;
use codeloc_rpc::{
    collect_repositories_data, ClientConnector, ConnectionParams, ListRepositoriesResponse,
    LocationClient, RepositoryCatalog, RpcError,
};
use codeloc_schema::{CodePointer, RepositoryLocationOrigin};
use codeloc_supervision::{
    spawn_heartbeat_loop, spawn_watch_loop, LocationStateSubscriber, LoopHandle, ServerIdentity,
    SubscriberRegistry, WatchLoopParams,
};
use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::error::{HandleError, Result};
use crate::location::HandleOptions;

/// Collaborators shared by every client-owning handle.
#[derive(Clone)]
pub struct ClientContext {
    pub connector: Arc<dyn ClientConnector>,
    pub config: LocationConfig,
    pub metrics: Option<LocationMetrics>,
}

impl std::fmt::Debug for ClientContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientContext")
            .field("config", &self.config)
            .field("metrics", &self.metrics.is_some())
            .finish_non_exhaustive()
    }
}

impl ClientContext {
    pub fn new(connector: Arc<dyn ClientConnector>, config: LocationConfig) -> Self {
        Self {
            connector,
            config,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: LocationMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

/// Background loops owned by a handle.
#[derive(Debug, Default)]
pub(crate) struct LiveLoops {
    heartbeat: Option<LoopHandle>,
    watch: Option<LoopHandle>,
}

impl LiveLoops {
    /// Signal and join the heartbeat loop, then the watch loop.
    pub(crate) async fn stop(&mut self) {
        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.stop().await;
        }
        if let Some(watch) = self.watch.take() {
            watch.stop().await;
        }
    }

    pub(crate) fn signal(&self) {
        for handle in [&self.heartbeat, &self.watch].into_iter().flatten() {
            handle.signal();
        }
    }
}

/// Resources released by teardown.
pub(crate) struct LiveSession {
    pub(crate) client: Arc<dyn LocationClient>,
    pub(crate) loops: LiveLoops,
}

impl std::fmt::Debug for LiveSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveSession")
            .field("endpoint", &self.client.params().to_string())
            .field("loops", &self.loops)
            .finish()
    }
}

/// Catalog and supervision state of a freshly constructed handle.
pub(crate) struct Established {
    pub(crate) live: LiveSession,
    pub(crate) listing: ListRepositoriesResponse,
    pub(crate) server_id: Arc<ServerIdentity>,
    pub(crate) subscribers: Option<Arc<SubscriberRegistry>>,
    pub(crate) container_image: Option<String>,
    pub(crate) repositories_data: RepositoryCatalog,
}

/// A construction that stopped part way. Any loops it started are already joined.
pub(crate) struct Failed {
    pub(crate) cause: RpcError,
    /// Client opened before the failure, if any.
    pub(crate) client: Option<Arc<dyn LocationClient>>,
}

pub(crate) struct SessionRequest<'a> {
    pub(crate) origin: &'a RepositoryLocationOrigin,
    pub(crate) params: &'a ConnectionParams,
    pub(crate) context: &'a ClientContext,
    /// Tries of connect plus `ListRepositories` while the endpoint is unavailable.
    pub(crate) attempts: u32,
    pub(crate) options: HandleOptions,
}

/// Run the construction sequence: connect, list repositories, resolve the
/// server id, start heartbeat and watch loops, fetch the image and the catalog.
///
/// On failure every loop started so far is stopped and joined before returning.
pub(crate) async fn establish(request: SessionRequest<'_>) -> std::result::Result<Established, Failed> {
    let mut loops = LiveLoops::default();
    let mut client = None;
    match run_steps(&request, &mut loops, &mut client).await {
        Ok(established) => Ok(established),
        Err(cause) => {
            warn!(
                location = request.origin.location_name(),
                error = %cause,
                "location construction failed; unwinding"
            );
            loops.stop().await;
            Err(Failed { cause, client })
        }
    }
}

async fn run_steps(
    request: &SessionRequest<'_>,
    loops: &mut LiveLoops,
    client_slot: &mut Option<Arc<dyn LocationClient>>,
) -> std::result::Result<Established, RpcError> {
    let location = request.origin.location_name();
    let config = &request.context.config;
    let rpc_timeout = config.connect.rpc_timeout;

    let (client, listing) = connect_and_list(request).await?;
    *client_slot = Some(client.clone());

    let server_id = match &request.options.server_id {
        Some(server_id) => server_id.clone(),
        None => with_deadline("GetServerId", rpc_timeout, client.get_server_id()).await?,
    };
    let identity = Arc::new(ServerIdentity::new(server_id.as_str()));

    if request.options.heartbeat {
        loops.heartbeat = Some(spawn_heartbeat_loop(
            location,
            client.clone(),
            &config.heartbeat,
            request.context.metrics.clone(),
        ));
    }

    let subscribers = if request.options.watch {
        let registry = Arc::new(SubscriberRegistry::new(location, request.context.metrics.clone()));
        for subscriber in &request.options.subscribers {
            registry.add(subscriber.clone());
        }
        loops.watch = Some(spawn_watch_loop(WatchLoopParams {
            location_name: location.to_owned(),
            client: client.clone(),
            server_id: identity.clone(),
            subscribers: registry.clone(),
            config: config.watch.clone(),
            metrics: request.context.metrics.clone(),
        }));
        Some(registry)
    } else {
        None
    };

    let container_image = with_deadline("GetCurrentImage", rpc_timeout, client.get_current_image())
        .await?
        .current_image;
    let repositories_data = with_deadline(
        "FetchRepositoriesData",
        rpc_timeout,
        collect_repositories_data(client.as_ref(), request.origin),
    )
    .await?;

    info!(
        location,
        endpoint = %request.params,
        server_id = %server_id,
        repositories = repositories_data.len(),
        "location handle ready"
    );
    Ok(Established {
        live: LiveSession {
            client,
            loops: std::mem::take(loops),
        },
        listing,
        server_id: identity,
        subscribers,
        container_image,
        repositories_data,
    })
}

async fn connect_and_list(
    request: &SessionRequest<'_>,
) -> std::result::Result<(Arc<dyn LocationClient>, ListRepositoriesResponse), RpcError> {
    let connect = &request.context.config.connect;
    let attempts = request.attempts.max(1);
    let mut attempt = 1;
    loop {
        let result = async {
            let client = request.context.connector.connect(request.params).await?;
            let listing =
                with_deadline("ListRepositories", connect.rpc_timeout, client.list_repositories())
                    .await?;
            Ok::<_, RpcError>((client, listing))
        }
        .await;
        match result {
            Ok(connected) => return Ok(connected),
            Err(err) if err.is_unavailable() && attempt < attempts => {
                debug!(
                    location = request.origin.location_name(),
                    attempt,
                    attempts,
                    error = %err,
                    "location endpoint not reachable yet"
                );
                attempt += 1;
                tokio::time::sleep(connect.retry_interval).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Bound `call` by `limit`, reporting overruns as `DeadlineExceeded`.
pub(crate) async fn with_deadline<T, F>(
    method: &'static str,
    limit: Duration,
    call: F,
) -> codeloc_rpc::Result<T>
where
    F: Future<Output = codeloc_rpc::Result<T>>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| RpcError::DeadlineExceeded { method })?
}

/// State shared by the handles that talk to a location server.
///
/// The catalog snapshot is fixed at construction; only the server id (through
/// the watch loop) and the container image (through an explicit reload) change.
pub(crate) struct ClientState {
    pub(crate) origin: RepositoryLocationOrigin,
    pub(crate) params: ConnectionParams,
    pub(crate) executable_path: String,
    pub(crate) repository_names: BTreeSet<String>,
    pub(crate) code_pointers: IndexMap<String, CodePointer>,
    container_image: RwLock<Option<String>>,
    repositories_data: RepositoryCatalog,
    server_id: Arc<ServerIdentity>,
    subscribers: Option<Arc<SubscriberRegistry>>,
    live: tokio::sync::Mutex<Option<LiveSession>>,
    cleaned_up: AtomicBool,
    rpc_timeout: Duration,
}

impl std::fmt::Debug for ClientState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientState")
            .field("location", &self.origin.location_name())
            .field("endpoint", &self.params.to_string())
            .field("server_id", &self.server_id.get())
            .field("repositories", &self.repository_names)
            .field("cleaned_up", &self.is_cleaned_up())
            .finish()
    }
}

impl ClientState {
    pub(crate) fn new(
        origin: RepositoryLocationOrigin,
        params: ConnectionParams,
        established: Established,
        executable_path: String,
        repository_names: BTreeSet<String>,
        rpc_timeout: Duration,
    ) -> Self {
        let Established {
            live,
            listing,
            server_id,
            subscribers,
            container_image,
            repositories_data,
        } = established;
        Self {
            origin,
            params,
            executable_path,
            repository_names,
            code_pointers: listing.repository_code_pointers,
            container_image: RwLock::new(container_image),
            repositories_data,
            server_id,
            subscribers,
            live: tokio::sync::Mutex::new(Some(live)),
            cleaned_up: AtomicBool::new(false),
            rpc_timeout,
        }
    }

    pub(crate) fn location_name(&self) -> &str {
        self.origin.location_name()
    }

    pub(crate) fn rpc_timeout(&self) -> Duration {
        self.rpc_timeout
    }

    pub(crate) fn container_image(&self) -> Option<String> {
        self.container_image.read().clone()
    }

    pub(crate) fn server_id(&self) -> String {
        self.server_id.get()
    }

    pub(crate) fn is_cleaned_up(&self) -> bool {
        self.cleaned_up.load(Ordering::SeqCst)
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.is_cleaned_up() {
            return Err(HandleError::closed(self.location_name()));
        }
        Ok(())
    }

    pub(crate) fn add_subscriber(&self, subscriber: Arc<dyn LocationStateSubscriber>) {
        match &self.subscribers {
            Some(registry) => registry.add(subscriber),
            None => debug!(location = self.location_name(), "watch disabled; subscriber ignored"),
        }
    }

    pub(crate) fn repositories_data(&self) -> Result<RepositoryCatalog> {
        self.ensure_open()?;
        Ok(self.repositories_data.clone())
    }

    /// Client of a handle that has not been torn down.
    pub(crate) async fn client(&self) -> Result<Arc<dyn LocationClient>> {
        let live = self.live.lock().await;
        let client = live.as_ref().map(|session| session.client.clone());
        client.ok_or_else(|| HandleError::closed(self.location_name()))
    }

    /// Ask the server for its current image and remember the answer.
    pub(crate) async fn reload_current_image(&self) -> Result<Option<String>> {
        let client = self.client().await?;
        let image = with_deadline("GetCurrentImage", self.rpc_timeout, client.get_current_image())
            .await
            .map_err(|source| HandleError::Rpc {
                location_name: self.location_name().to_owned(),
                source,
            })?
            .current_image;
        *self.container_image.write() = image.clone();
        Ok(image)
    }

    /// Stop the loops, hand the client to `release`, then mark the state cleaned up.
    ///
    /// Runs at most once; concurrent callers wait for the first to finish.
    pub(crate) async fn teardown<F, Fut>(&self, release: F) -> bool
    where
        F: FnOnce(Arc<dyn LocationClient>) -> Fut,
        Fut: Future<Output = ()>,
    {
        let mut live = self.live.lock().await;
        let Some(mut session) = live.take() else {
            return false;
        };
        session.loops.stop().await;
        release(session.client).await;
        self.cleaned_up.store(true, Ordering::SeqCst);
        debug!(location = self.location_name(), "location handle cleaned up");
        true
    }

    /// Best-effort release from a destructor: signal the loops and drop the client.
    ///
    /// Returns `true` when live resources were still held.
    pub(crate) fn abandon(&self) -> bool {
        let Ok(mut live) = self.live.try_lock() else {
            return false;
        };
        let Some(session) = live.take() else {
            return false;
        };
        session.loops.signal();
        self.cleaned_up.store(true, Ordering::SeqCst);
        true
    }
}
