use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use checkr_core::{BackendRegistry, ValidatorKind};
use checkr_runtime::{
    ContentProvider, HttpClient, HttpConfig, ProviderRegistry, ProviderServices,
};
use httpmock::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;

const BASE: &str = "\"\"\"\n---\ntitle: Base Validator\ntype: base\ndescription: Shared logic\n---\n\"\"\"\nclass BaseValidator:\n    pass\n";
const LENGTH: &str = "\"\"\"\n---\ntitle: Length Check\ndescription: Rejects overly long replies\nstage: stable\ntags: [gate1]\n---\n\"\"\"\n";
const SHARED: &str = "\"\"\"\n---\ntitle: Shared Check\ndescription: Lives outside the validator root\n---\n\"\"\"\n";

fn services() -> ProviderServices {
    ProviderServices {
        http: Arc::new(HttpClient::new(HttpConfig::default()).unwrap()),
        registry: Arc::new(BackendRegistry::new()),
    }
}

fn create(provider: &str, config: Value) -> Arc<dyn ContentProvider> {
    ProviderRegistry::with_defaults()
        .create(provider, &config, &services())
        .unwrap()
}

fn file_body(content: &str) -> Value {
    json!({"content": STANDARD.encode(content), "encoding": "base64"})
}

#[tokio::test]
async fn github_walks_tree_and_fetches_raw_sources() {
    let server = MockServer::start_async().await;

    let tree = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/repos/org/validators/git/trees/main")
                .query_param("recursive", "1")
                .header("authorization", "token ghp_test");
            then.status(200).json_body(json!({
                "sha": "abc",
                "truncated": false,
                "tree": [
                    {"path": "frontend", "type": "tree"},
                    {"path": "frontend/validators/base_validator.py", "type": "blob"},
                    {"path": "frontend/validators/gate1/length.py", "type": "blob"},
                    {"path": "frontend/validators/gate1/gone.py", "type": "blob"},
                    {"path": "frontend/validators/gate1/notes.md", "type": "blob"},
                    {"path": "other/elsewhere.py", "type": "blob"}
                ]
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/raw/org/validators/main/frontend/validators/base_validator.py");
            then.status(200).body(BASE);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/raw/org/validators/main/frontend/validators/gate1/length.py");
            then.status(200).body(LENGTH);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/raw/org/validators/main/frontend/validators/gate1/gone.py");
            then.status(404).body("Not Found");
        })
        .await;

    let provider = create(
        "github",
        json!({
            "repo": "org/validators",
            "path": "frontend/validators",
            "private_token": "ghp_test",
            "api_url": server.base_url(),
            "raw_url": server.url("/raw"),
        }),
    );

    let listed = provider.list_validators().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].source, "github/frontend/validators/gate1/length.py");
    assert_eq!(listed[0].title, "Length Check");
    assert_eq!(listed[0].kind, ValidatorKind::DatasetFrontend);
    assert_eq!(listed[0].stage, "stable");

    let skipped = provider.skipped_entries();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].path, "frontend/validators/gate1/gone.py");

    assert_eq!(
        provider
            .fetch_source("github/frontend/validators/gate1/length.py")
            .await
            .unwrap(),
        LENGTH
    );
    assert_eq!(provider.fetch_source("github/unknown.py").await.unwrap(), "");

    let base = provider.fetch_base_sources().await.unwrap();
    assert_eq!(base.len(), 1);
    assert_eq!(base["validators/base_validator.py"], BASE);

    // Listing is built once per instance.
    provider.list_validators().await.unwrap();
    tree.assert_hits_async(1).await;
}

#[tokio::test]
async fn gitlab_paginates_and_resolves_symlinks() {
    let server = MockServer::start_async().await;
    let tree_path = "/api/v4/projects/42/repository/tree";

    let root_first = server
        .mock_async(|when, then| {
            when.method(GET)
                .path(tree_path)
                .query_param("path", "frontend/validators")
                .query_param("ref", "main")
                .query_param("per_page", "100")
                .query_param("page", "1")
                .header("private-token", "glpat-test");
            then.status(200).header("x-next-page", "2").json_body(json!([
                {"path": "frontend/validators/base_validator.py", "type": "blob", "mode": "100644"},
                {"path": "frontend/validators/gate1", "type": "tree", "mode": "040000"}
            ]));
        })
        .await;
    let root_second = server
        .mock_async(|when, then| {
            when.method(GET)
                .path(tree_path)
                .query_param("path", "frontend/validators")
                .query_param("page", "2");
            then.status(200).header("x-next-page", "").json_body(json!([
                {"path": "frontend/validators/README.md", "type": "blob", "mode": "100644"}
            ]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path(tree_path)
                .query_param("path", "frontend/validators/gate1")
                .query_param("page", "1");
            then.status(200).json_body(json!([
                {"path": "frontend/validators/gate1/length.py", "type": "blob", "mode": "100644"},
                {"path": "frontend/validators/gate1/alias.py", "type": "blob", "mode": "120000"},
                {"path": "frontend/validators/gate1/broken.py", "type": "blob", "mode": "120000"}
            ]));
        })
        .await;

    for (name, content) in [
        ("base_validator.py", BASE),
        ("length.py", LENGTH),
        ("alias.py", "../../common/shared_check.py\n"),
        ("shared_check.py", SHARED),
        ("broken.py", "../../../../escape.py"),
    ] {
        server
            .mock_async(|when, then| {
                when.method(GET)
                    .path_contains("/repository/files/")
                    .path_contains(name)
                    .query_param("ref", "main");
                then.status(200).json_body(file_body(content));
            })
            .await;
    }

    let provider = create(
        "gitlab",
        json!({
            "url": server.base_url(),
            "project_id": 42,
            "path": "/frontend/validators/",
            "private_token": "glpat-test",
        }),
    );

    let listed = provider.list_validators().await.unwrap();
    let sources: Vec<&str> = listed.iter().map(|d| d.source.as_str()).collect();
    assert_eq!(
        sources,
        vec![
            "gitlab/frontend/validators/gate1/length.py",
            "gitlab/frontend/validators/gate1/alias.py",
        ]
    );
    assert_eq!(listed[1].title, "Shared Check");

    assert_eq!(
        provider
            .fetch_source("frontend/validators/gate1/alias.py")
            .await
            .unwrap(),
        SHARED
    );

    let skipped = provider.skipped_entries();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].path, "frontend/validators/gate1/broken.py");
    assert!(skipped[0].reason.contains("escapes repository root"));

    let base = provider.fetch_base_sources().await.unwrap();
    assert_eq!(base["validators/base_validator.py"], BASE);

    root_first.assert_hits_async(1).await;
    root_second.assert_hits_async(1).await;
}

#[tokio::test]
async fn gitlab_listing_failure_is_an_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/api/v4/projects/7/repository/tree");
            then.status(401).json_body(json!({"message": "401 Unauthorized"}));
        })
        .await;

    let provider = create(
        "gitlab",
        json!({"url": server.base_url(), "project_id": 7}),
    );

    let err = provider.list_validators().await.unwrap_err();
    assert!(err.to_string().contains("401"));
}

#[test]
fn github_section_must_name_a_repository() {
    let result = ProviderRegistry::with_defaults().create(
        "github",
        &json!({"repo": "not-a-repo"}),
        &services(),
    );
    assert!(result.is_err());
}
