mod common;

use assert_matches::assert_matches;
use bitsync::config::LayoutConfig;
use bitsync::{DatabaseEntity, DatabaseScript, SourceSync, SyncError};
use common::{contents, full_fixture, FakeBitbucket, RecordingReconciler};
use pretty_assertions::assert_eq;
use std::sync::Arc;

// Full sync pipeline against an in-memory Bitbucket

fn sync_for(api: Arc<FakeBitbucket>) -> SourceSync<FakeBitbucket, RecordingReconciler> {
    SourceSync::new(api, LayoutConfig::default(), RecordingReconciler)
}

#[tokio::test]
async fn test_sync_assembles_every_category() {
    let api = Arc::new(full_fixture());
    let output = sync_for(api.clone())
        .sync("acme/tenant", "master", "abc123", None)
        .await
        .unwrap();

    assert_eq!(
        output.rules,
        vec![
            (
                "a".to_string(),
                contents("rules/a.js"),
                contents("rules/a.json")
            ),
            ("b".to_string(), contents("rules/b.js"), None),
        ]
    );
    assert_eq!(
        output.pages,
        vec![(
            "login".to_string(),
            contents("pages/login.html"),
            contents("pages/login.json")
        )]
    );
    assert_eq!(
        output.databases,
        vec![DatabaseEntity {
            name: "db1".to_string(),
            scripts: vec![DatabaseScript {
                name: "login".to_string(),
                contents: b"contents of database-connections/db1/login.js".to_vec(),
            }],
        }]
    );

    // README.md, unknown.html and helper.js are never downloaded
    assert_eq!(api.raw_calls(), 6);
}

#[tokio::test]
async fn test_every_read_is_pinned_to_revision() {
    let api = Arc::new(full_fixture());
    sync_for(api.clone())
        .sync("https://bitbucket.org/acme/tenant", "feature/x", "abc123", None)
        .await
        .unwrap();

    let revisions = api.revisions();
    assert!(!revisions.is_empty());
    assert!(revisions.iter().all(|r| r == "abc123"));
}

#[tokio::test]
async fn test_missing_rules_directory_contributes_nothing() {
    let api = Arc::new(
        FakeBitbucket::new()
            .with_directory("pages", &["pages/error_page.html"], &[])
            .with_directory("database-connections", &[], &[]),
    );

    let output = sync_for(api)
        .sync("acme/tenant", "master", "abc123", None)
        .await
        .unwrap();

    assert!(output.rules.is_empty());
    assert!(output.databases.is_empty());
    assert_eq!(output.pages.len(), 1);
    assert_eq!(output.pages[0].0, "error_page");
    assert_eq!(output.pages[0].2, None);
}

#[tokio::test]
async fn test_one_failed_download_fails_the_sync() {
    let api = Arc::new(
        FakeBitbucket::new()
            .with_directory("rules", &["rules/a.js", "rules/a.json", "rules/b.js"], &[])
            .with_failing_file("rules/a.json"),
    );

    let result = sync_for(api)
        .sync("acme/tenant", "master", "abc123", None)
        .await;

    assert_matches!(
        result,
        Err(SyncError::Download { path, source }) if path == "rules/a.json" && source.status == Some(500)
    );
}

#[tokio::test]
async fn test_failed_database_script_fails_the_sync() {
    let api = Arc::new(
        full_fixture().with_failing_file("database-connections/db1/login.js"),
    );

    let result = sync_for(api)
        .sync("acme/tenant", "master", "abc123", None)
        .await;

    assert_matches!(result, Err(SyncError::Download { path, .. }) if path == "database-connections/db1/login.js");
}

#[tokio::test]
async fn test_entity_downloads_are_capped_at_two() {
    let rules: Vec<String> = (0..6).map(|i| format!("rules/rule{}.js", i)).collect();
    let paths: Vec<&str> = rules.iter().map(String::as_str).collect();
    let api = Arc::new(FakeBitbucket::new().with_directory("rules", &paths, &[]));

    let output = sync_for(api.clone())
        .sync("acme/tenant", "master", "abc123", None)
        .await
        .unwrap();

    assert_eq!(output.rules.len(), 6);
    assert_eq!(api.raw_calls(), 6);
    assert_eq!(api.peak_in_flight(), 2);
}

#[tokio::test]
async fn test_configured_concurrency_is_respected() {
    let rules: Vec<String> = (0..6).map(|i| format!("rules/rule{}.js", i)).collect();
    let paths: Vec<&str> = rules.iter().map(String::as_str).collect();
    let api = Arc::new(FakeBitbucket::new().with_directory("rules", &paths, &[]));

    sync_for(api.clone())
        .with_entity_concurrency(3)
        .sync("acme/tenant", "master", "abc123", None)
        .await
        .unwrap();

    assert_eq!(api.peak_in_flight(), 3);
}

#[tokio::test]
async fn test_missing_repository_is_reported() {
    let mut fake = full_fixture();
    fake.missing_repository = true;
    let api = Arc::new(fake);

    let result = sync_for(api.clone())
        .sync("acme/tenant", "master", "abc123", None)
        .await;

    assert_matches!(result, Err(SyncError::RepositoryNotFound { .. }));
    assert!(api.revisions().is_empty());
}

#[tokio::test]
async fn test_tree_lists_only_valid_files() {
    let api = Arc::new(full_fixture());
    let sync = sync_for(api);

    let repo = sync.check_repository("acme/tenant").await.unwrap();
    let files = sync.fetch_tree(&repo, "abc123", None).await.unwrap();
    let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();

    assert_eq!(
        paths,
        vec![
            "rules/a.js",
            "rules/a.json",
            "rules/b.js",
            "database-connections/db1/login.js",
            "pages/login.html",
            "pages/login.json",
        ]
    );
    assert_eq!(files[0].sha, "sha-rules/a.js");
}

#[tokio::test]
async fn test_nested_database_directory_is_synced() {
    let api = Arc::new(
        FakeBitbucket::new()
            .with_directory("auth/dbs", &[], &["users"])
            .with_directory("auth/dbs/users", &["auth/dbs/users/login.js"], &[]),
    );
    let layout = LayoutConfig {
        database_connections_directory: "auth/dbs".to_string(),
        ..Default::default()
    };

    let output = SourceSync::new(api, layout, RecordingReconciler)
        .sync("acme/tenant", "master", "abc123", None)
        .await
        .unwrap();

    assert_eq!(
        output.databases,
        vec![DatabaseEntity {
            name: "users".to_string(),
            scripts: vec![DatabaseScript {
                name: "login".to_string(),
                contents: b"contents of auth/dbs/users/login.js".to_vec(),
            }],
        }]
    );
}
