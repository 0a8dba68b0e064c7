mod support;

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use adosync_sync::{CachedSearch, PipelineUpdater, SearchItems, Updater};
use adosync_types::{Search, SyncConfig};

use support::*;

const DEFINITION_ID: i64 = 42;

fn seeded_client() -> Arc<MockLiveClient> {
    let client = Arc::new(MockLiveClient::new());
    client.seed_definition(DEFINITION_ID, "CI", vec![build(1, 100), build(2, 300)]);
    client
}

#[tokio::test]
async fn sync_caches_definition_and_builds() {
    let client = seeded_client();
    let updater = PipelineUpdater::new(test_context(client));
    let search = Search::Pipeline(pipeline_search(DEFINITION_ID));

    updater
        .update_data(Some(&search), &CancellationToken::new())
        .await
        .unwrap();

    let Some(CachedSearch::Pipeline(definition)) = updater.cached_search(&search).unwrap() else {
        panic!("expected cached definition");
    };
    assert_eq!(definition.external_id, DEFINITION_ID);
    assert_eq!(definition.name, "CI");

    let SearchItems::Builds(builds) = updater.cached_children(&search).unwrap() else {
        panic!("expected builds");
    };
    let order: Vec<i64> = builds.iter().map(|b| b.external_id).collect();
    assert_eq!(order, vec![2, 1], "most recently queued first");
}

#[tokio::test]
async fn definition_row_update_is_throttled() {
    let client = seeded_client();
    let updater = PipelineUpdater::new(test_context(client.clone()));
    let search = Search::Pipeline(pipeline_search(DEFINITION_ID));
    let cancel = CancellationToken::new();

    for _ in 0..3 {
        updater.update_data(Some(&search), &cancel).await.unwrap();
    }

    // One definition fetch for the initial row; the two later syncs are
    // inside the update threshold. Builds refresh every time.
    assert_eq!(client.call_count("get_definition"), 1);
    assert_eq!(client.call_count("get_builds"), 3);
}

#[tokio::test]
async fn definition_row_unchanged_inside_threshold() {
    let client = seeded_client();
    let updater = PipelineUpdater::new(test_context(client.clone()));
    let search = Search::Pipeline(pipeline_search(DEFINITION_ID));
    let cancel = CancellationToken::new();

    updater.update_data(Some(&search), &cancel).await.unwrap();
    let Some(CachedSearch::Pipeline(first)) = updater.cached_search(&search).unwrap() else {
        panic!("expected cached definition");
    };

    // Remote renames the definition; within the threshold the cached row
    // must not change.
    client
        .definitions
        .lock()
        .unwrap()
        .get_mut(&DEFINITION_ID)
        .unwrap()
        .name = "CI (renamed)".into();
    updater.update_data(Some(&search), &cancel).await.unwrap();

    let Some(CachedSearch::Pipeline(second)) = updater.cached_search(&search).unwrap() else {
        panic!("expected cached definition");
    };
    assert_eq!(second.name, first.name);
    assert_eq!(second.time_updated, first.time_updated);
}

#[tokio::test]
async fn zero_threshold_lets_definition_refresh() {
    let client = seeded_client();
    let config = SyncConfig {
        definition_update_threshold: Duration::from_millis(0),
        ..test_config()
    };
    let ctx = test_context_with(client.clone(), signed_in_accounts(), config);
    let updater = PipelineUpdater::new(ctx);
    let search = Search::Pipeline(pipeline_search(DEFINITION_ID));
    let cancel = CancellationToken::new();

    updater.update_data(Some(&search), &cancel).await.unwrap();
    client
        .definitions
        .lock()
        .unwrap()
        .get_mut(&DEFINITION_ID)
        .unwrap()
        .name = "CI (renamed)".into();
    updater.update_data(Some(&search), &cancel).await.unwrap();

    let Some(CachedSearch::Pipeline(row)) = updater.cached_search(&search).unwrap() else {
        panic!("expected cached definition");
    };
    assert_eq!(row.name, "CI (renamed)");
    assert_eq!(client.call_count("get_definition"), 2);
}

#[tokio::test]
async fn expired_builds_and_their_definition_are_pruned() {
    let client = seeded_client();
    let config = SyncConfig {
        build_retention: Duration::from_millis(30),
        ..test_config()
    };
    let ctx = test_context_with(client, signed_in_accounts(), config);
    let updater = PipelineUpdater::new(ctx);
    let search = Search::Pipeline(pipeline_search(DEFINITION_ID));

    updater
        .update_data(Some(&search), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(updater.cached_children(&search).unwrap().len(), 2);

    tokio::time::sleep(Duration::from_millis(60)).await;
    updater.prune().unwrap();

    assert!(updater.cached_search(&search).unwrap().is_none());
    assert!(updater.cached_children(&search).unwrap().is_empty());
}
