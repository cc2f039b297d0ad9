//! Fetch, compare, and cache without an orchestrator in the loop

use std::sync::Arc;
use std::time::Duration;

use mcpchat_core::{
    ArtifactId, ArtifactKind, ClientError, EndpointClient, MaxAttempts, ResourceArtifact,
};
use mcpchat_pool::{ArtifactCache, ArtifactRepository, ChangeDetector};
use pretty_assertions::assert_eq;
use tests::{fixtures, MockEndpointClient};

async fn connected(client: MockEndpointClient) -> Arc<MockEndpointClient> {
    let client = Arc::new(client);
    client.connect(Duration::from_secs(1)).await.unwrap();
    client
}

fn repository() -> ArtifactRepository {
    ArtifactRepository::from_settings(&fixtures::settings(MaxAttempts::Bounded(3)))
}

#[tokio::test(start_paused = true)]
async fn test_fetch_all_keeps_endpoints_isolated() {
    let docs = connected(
        MockEndpointClient::new("docs").with_artifacts(fixtures::collection(&["read", "list"])),
    )
    .await;
    let search = connected(
        MockEndpointClient::new("search").with_artifacts(fixtures::collection(&["query"])),
    )
    .await;
    search.fail_list(
        ArtifactKind::Tool,
        ClientError::Transport("connection reset".to_string()),
    );

    let endpoints: Vec<(String, Arc<dyn EndpointClient>)> = vec![
        ("docs".to_string(), docs.clone() as Arc<dyn EndpointClient>),
        ("search".to_string(), search.clone() as Arc<dyn EndpointClient>),
    ];
    let results = repository().fetch_all(&endpoints).await;

    let names: Vec<&str> = results.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["docs", "search"]);
    assert_eq!(results[0].1.tools.len(), 2);
    // Tools failed on search only; its other kinds still arrived
    assert!(results[1].1.tools.is_empty());
    assert_eq!(results[1].1.resources.len(), 1);
    assert_eq!(results[1].1.prompts.len(), 1);

    // Transient failure: initial call plus one retry
    assert_eq!(search.list_calls(ArtifactKind::Tool), 2);
}

#[tokio::test(start_paused = true)]
async fn test_fetch_from_disconnected_client_is_empty() {
    let client = MockEndpointClient::new("docs").with_artifacts(fixtures::collection(&["read"]));

    let collection = repository().fetch("docs", &client).await;

    assert!(collection.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_fetch_compare_cache_cycle() {
    let client = connected(
        MockEndpointClient::new("docs").with_artifacts(fixtures::collection(&["A", "B"])),
    )
    .await;
    let cache = Arc::new(ArtifactCache::new());
    let detector = ChangeDetector::new(cache.clone());
    let repository = repository();

    let first = repository.fetch("docs", client.as_ref()).await;
    let report = detector.check_and_update("docs", &first);
    assert!(report.changed);
    assert_eq!(cache.get("docs"), Some(first.clone()));

    // Same content, no change
    let again = repository.fetch("docs", client.as_ref()).await;
    assert!(!detector.check_and_update("docs", &again).changed);

    // Tool C added, resource replaced
    client.set_tools(fixtures::tools(&["A", "B", "C"]));
    let mut changed = fixtures::collection(&["A", "B", "C"]);
    changed.resources = vec![ResourceArtifact::new("file:///changelog.md")];
    client.set_artifacts(changed);

    let fresh = repository.fetch("docs", client.as_ref()).await;
    let report = detector.check_and_update("docs", &fresh);

    assert!(report.changed);
    assert_eq!(
        report.diff.added,
        vec![
            ArtifactId::new(ArtifactKind::Tool, "C"),
            ArtifactId::new(ArtifactKind::Resource, "file:///changelog.md"),
        ]
    );
    assert_eq!(
        report.diff.removed,
        vec![ArtifactId::new(ArtifactKind::Resource, "file:///readme.md")]
    );
    assert!(report.diff.touches(ArtifactKind::Resource));
    assert!(!report.diff.touches(ArtifactKind::Prompt));
    assert_eq!(cache.get("docs").map(|c| c.tools.len()), Some(3));
}

#[tokio::test(start_paused = true)]
async fn test_cache_entries_are_per_endpoint() {
    let cache = Arc::new(ArtifactCache::new());
    let detector = ChangeDetector::new(cache.clone());

    detector.check_and_update("docs", &fixtures::collection(&["A"]));
    detector.check_and_update("search", &fixtures::collection(&["A"]));

    assert_eq!(cache.endpoints(), vec!["docs".to_string(), "search".to_string()]);

    cache.remove("docs");
    assert!(detector.has_changed("docs", &fixtures::collection(&["A"])));
    assert!(!detector.has_changed("search", &fixtures::collection(&["A"])));
}
