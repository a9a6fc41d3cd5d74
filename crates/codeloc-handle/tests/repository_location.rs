//! ---
//! codeloc_section: "06-location-handles"
//! codeloc_subsection: "tests"
//! codeloc_type: "source"
//! codeloc_scope: "test"
//! codeloc_description: "Catalog views and references built from live handles."
//! codeloc_version: "v0.1.0"
//! codeloc_owner: "tbd"
//! ---
mod support;

use std::sync::Arc;

use codeloc_handle::{
    GrpcServerLocationHandle, HandleError, HandleOptions, LoadedRepository, RepositoryHandle,
    RepositoryLocationHandle, StaticRepositoryLoader,
};
use codeloc_schema::{CodePointer, InProcessOrigin, RepositoryLocationOrigin};
use support::{grpc_origin, Env};

#[tokio::test]
async fn location_view_follows_streamed_catalog() {
    let env = Env::new(4700);
    env.serve();
    let handle = Arc::new(
        GrpcServerLocationHandle::connect(&env.context(), grpc_origin(4700), HandleOptions::new())
            .await
            .unwrap(),
    );

    let location = handle.clone().create_location().unwrap();
    assert_eq!(location.name(), "remote");
    assert!(location.has_repository("etl_repo"));
    assert!(!location.has_repository("missing"));

    let names: Vec<_> = location.repositories().map(|repo| repo.name().to_owned()).collect();
    assert_eq!(names, vec!["demo_repo", "etl_repo"]);

    let repository = location.get_repository("demo_repo").unwrap();
    assert_eq!(repository.data()["name"], "demo_repo");
    assert_eq!(repository.handle().location_name(), "remote");

    let err = location.get_repository("missing").unwrap_err();
    assert!(matches!(err, HandleError::RepositoryNotFound { .. }));
    assert_eq!(
        err.to_string(),
        "Unable to find repository name missing on location remote."
    );

    handle.cleanup().await;
}

#[tokio::test]
async fn python_origin_and_metadata_carry_the_image() {
    let env = Env::new(4701);
    env.serve();
    let handle = GrpcServerLocationHandle::connect(&env.context(), grpc_origin(4701), HandleOptions::new())
        .await
        .unwrap();

    let python = handle.repository_python_origin("demo_repo").unwrap();
    assert_eq!(python.executable_path, "/opt/venv/bin/python");
    assert_eq!(python.code_pointer, CodePointer::file("/srv/code/repo.py", "demo_repo"));
    assert_eq!(python.container_image.as_deref(), Some(support::IMAGE));

    let metadata = handle.display_metadata();
    assert_eq!(metadata.get("host").map(String::as_str), Some("localhost"));
    assert_eq!(metadata.get("port").map(String::as_str), Some("4701"));
    assert_eq!(metadata.get("image").map(String::as_str), Some(support::IMAGE));
    assert!(!metadata.contains_key("use_tls"));

    handle.cleanup().await;
}

#[tokio::test]
async fn reload_picks_up_a_new_image() {
    let env = Env::new(4702);
    env.serve();
    let handle = GrpcServerLocationHandle::connect(&env.context(), grpc_origin(4702), HandleOptions::new())
        .await
        .unwrap();

    env.server.set_image(Some("registry.internal/pipelines:2024.07"));
    assert_eq!(handle.container_image().as_deref(), Some(support::IMAGE));
    let reloaded = handle.reload_current_image().await.unwrap();
    assert_eq!(reloaded.as_deref(), Some("registry.internal/pipelines:2024.07"));
    assert_eq!(handle.container_image(), reloaded);

    handle.cleanup().await;
    assert!(matches!(
        handle.reload_current_image().await,
        Err(HandleError::Closed { .. })
    ));
}

#[tokio::test]
async fn references_from_separate_handles_compare_equal() {
    let env = Env::new(4703);
    env.serve();
    let first: Arc<dyn RepositoryLocationHandle> = Arc::new(
        GrpcServerLocationHandle::connect(&env.context(), grpc_origin(4703), HandleOptions::new())
            .await
            .unwrap(),
    );
    let second: Arc<dyn RepositoryLocationHandle> = Arc::new(
        GrpcServerLocationHandle::connect(&env.context(), grpc_origin(4703), HandleOptions::new())
            .await
            .unwrap(),
    );

    let a = RepositoryHandle::new("demo_repo", first.clone());
    let b = RepositoryHandle::new("demo_repo", second.clone());
    assert_eq!(a, b);
    assert_eq!(a.pipeline("daily"), b.pipeline("daily"));
    assert_eq!(a.external_origin(), b.external_origin());
    assert_ne!(a, RepositoryHandle::new("etl_repo", first.clone()));

    first.cleanup().await;
    second.cleanup().await;
}

#[tokio::test]
async fn factory_loads_in_process_locations() {
    let env = Env::new(4704);
    let pointer = CodePointer::module("pipelines.local", "local_repo");
    let loader = StaticRepositoryLoader::new().with_repository(
        pointer.clone(),
        LoadedRepository::new("local_repo", serde_json::json!({ "jobs": ["nightly"] })),
    );
    let factory = env.factory(loader);
    let origin = RepositoryLocationOrigin::from(InProcessOrigin::new(pointer.clone(), "local"));

    let handle = factory.create(&origin, HandleOptions::new()).await.unwrap();
    assert_eq!(handle.location_name(), "local");
    assert_eq!(handle.server_id(), None);
    assert_eq!(handle.repository_python_origin("local_repo").unwrap().code_pointer, pointer);

    let location = handle.clone().create_location().unwrap();
    assert_eq!(location.get_repository("local_repo").unwrap().data()["jobs"][0], "nightly");
    assert_eq!(env.metrics.constructions("in_process", true), 1);

    handle.cleanup().await;
    assert!(handle.is_cleaned_up());

    let missing = RepositoryLocationOrigin::from(InProcessOrigin::new(
        CodePointer::module("pipelines.gone", "gone"),
        "gone",
    ));
    let err = factory.create(&missing, HandleOptions::new()).await.unwrap_err();
    assert!(err.construction_cause().is_some());
}
