//! ---
//! codeloc_section: "06-location-handles"
//! codeloc_subsection: "tests"
//! codeloc_type: "source"
//! codeloc_scope: "test"
//! codeloc_description: "End-to-end lifecycle of a managed worker location."
//! codeloc_version: "v0.1.0"
//! codeloc_owner: "tbd"
//! ---
mod support;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use codeloc_handle::{
    HandleOptions, ManagedWorkerLocationHandle, PipelineHandle, RepositoryHandle,
    RepositoryLocationHandle, StaticRepositoryLoader,
};
use codeloc_schema::{LocationStateChangeKind, RepositoryLocationOrigin};
use codeloc_testharness::{EventRecorder, StubMethod};
use futures::FutureExt;
use support::{eventually, managed_origin, Env};

#[tokio::test]
async fn managed_worker_restart_is_reported_once_and_teardown_shuts_it_down() {
    let env = Env::new(4600);
    let recorder = EventRecorder::new();
    let options = HandleOptions::new().with_subscriber(Arc::new(recorder.subscriber()));

    let handle = Arc::new(
        ManagedWorkerLocationHandle::launch(&env.context(), env.spawner.as_ref(), managed_origin(), options)
            .await
            .expect("managed worker starts"),
    );
    assert!(env.spawner.heartbeat_requested(), "managed workers always heartbeat");
    assert!(handle.repository_names().contains("demo_repo"));
    assert_eq!(handle.server_id().as_deref(), Some("s1"));
    assert_eq!(
        (handle.host(), handle.port(), handle.use_tls()),
        ("localhost", Some(4600), false)
    );

    let location: Arc<dyn RepositoryLocationHandle> = handle.clone();
    let repository = RepositoryHandle::new("demo_repo", location);
    let pipeline = PipelineHandle::new("demo_pipeline", repository);
    assert_eq!(pipeline.to_string(), "demo_location.demo_repo.demo_pipeline");

    let metrics = env.metrics.clone();
    assert!(eventually(|| metrics.active_loops("demo_location") == 2).await);

    env.server.set_server_id("s2");
    assert!(recorder.wait_for(1, Duration::from_secs(2)).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(recorder.updated_ids(), vec!["s2"]);
    assert_eq!(recorder.count(LocationStateChangeKind::Error), 0);

    handle.cleanup().await;
    handle.cleanup().await;

    assert_eq!(env.server.shutdown_calls(), 1);
    assert_eq!(env.metrics.active_loops("demo_location"), 0);
    assert!(handle.is_cleaned_up());
    assert_eq!(env.metrics.cleanups("managed_worker"), 1);
}

#[tokio::test]
async fn managed_catalog_comes_from_code_pointers() {
    let env = Env::new(4601);
    let handle = ManagedWorkerLocationHandle::launch(
        &env.context(),
        env.spawner.as_ref(),
        managed_origin(),
        HandleOptions::new().with_watch(false),
    )
    .await
    .unwrap();

    assert_eq!(
        handle.repository_names().into_iter().collect::<Vec<_>>(),
        vec!["demo_repo", "etl_repo"]
    );
    assert_eq!(handle.executable_path(), "/opt/venv/bin/python");
    assert_eq!(handle.loadable_target_origin().attribute.as_deref(), Some("demo_repo"));

    let python = handle.repository_python_origin("etl_repo").unwrap();
    assert_eq!(python.container_image.as_deref(), Some(support::IMAGE));
    assert_eq!(python.code_pointer.attribute(), "etl_repo");

    let metadata = handle.display_metadata();
    assert_eq!(metadata.get("attribute").map(String::as_str), Some("demo_repo"));
    assert_eq!(metadata.get("image").map(String::as_str), Some(support::IMAGE));

    let heartbeats = env.server.calls(StubMethod::Heartbeat);
    let server = env.server.clone();
    assert!(eventually(|| server.calls(StubMethod::Heartbeat) > heartbeats).await);

    handle.cleanup().await;
    assert_eq!(env.server.shutdown_calls(), 1);
}

#[tokio::test]
async fn scoped_handle_is_released_after_use() {
    let env = Env::new(4602);
    let factory = env.factory(StaticRepositoryLoader::new());
    let origin = RepositoryLocationOrigin::from(managed_origin());

    let names = factory
        .with_handle(&origin, HandleOptions::new(), |handle| async move {
            handle.repository_names()
        })
        .await
        .unwrap();

    assert!(names.contains("demo_repo"));
    assert_eq!(env.server.shutdown_calls(), 1);
    assert_eq!(env.metrics.active_loops("demo_location"), 0);
}

#[tokio::test]
async fn scoped_handle_is_released_when_the_body_panics() {
    let env = Env::new(4603);
    let factory = env.factory(StaticRepositoryLoader::new());
    let origin = RepositoryLocationOrigin::from(managed_origin());

    let outcome = AssertUnwindSafe(factory.with_handle(
        &origin,
        HandleOptions::new(),
        |_handle| async move { panic!("caller bug") },
    ))
    .catch_unwind()
    .await;

    assert!(outcome.is_err());
    assert_eq!(env.server.shutdown_calls(), 1);
    assert_eq!(env.metrics.active_loops("demo_location"), 0);
}
