mod support;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use adosync_sync::{QueryUpdater, SearchItems, SyncError, Updater};
use adosync_types::Search;

use support::*;

fn updater(client: Arc<MockLiveClient>) -> QueryUpdater {
    QueryUpdater::new(test_context(client))
}

#[tokio::test]
async fn sync_mirrors_remote_result_into_cache() {
    let client = seeded_query_client(3);
    let updater = updater(client.clone());
    let search = Search::Query(query_search());

    updater
        .update_data(Some(&search), &CancellationToken::new())
        .await
        .unwrap();

    let SearchItems::WorkItems(items) = updater.cached_children(&search).unwrap() else {
        panic!("expected work items");
    };
    assert_eq!(items.len(), 3);
    assert!(updater.cached_search(&search).unwrap().is_some());
}

#[tokio::test]
async fn two_hundred_one_ids_issue_two_chunks() {
    let client = seeded_query_client(201);
    let updater = updater(client.clone());
    let search = Search::Query(query_search());

    updater
        .update_data(Some(&search), &CancellationToken::new())
        .await
        .unwrap();

    let mut sizes = client.batch_sizes.lock().unwrap().clone();
    sizes.sort_unstable();
    assert_eq!(sizes, vec![1, 200]);

    let children = updater.cached_children(&search).unwrap();
    assert_eq!(children.len(), 201);
}

#[tokio::test]
async fn repeat_sync_on_unchanged_remote_is_idempotent() {
    let client = seeded_query_client(5);
    let updater = updater(client.clone());
    let search = Search::Query(query_search());
    let cancel = CancellationToken::new();

    updater.update_data(Some(&search), &cancel).await.unwrap();
    let first = updater.cached_children(&search).unwrap();
    updater.update_data(Some(&search), &cancel).await.unwrap();
    let second = updater.cached_children(&search).unwrap();

    assert_eq!(first.len(), second.len());
    assert_eq!(first, second);
}

#[tokio::test]
async fn empty_remote_result_empties_the_cache() {
    let client = seeded_query_client(3);
    let updater = updater(client.clone());
    let search = Search::Query(query_search());
    let cancel = CancellationToken::new();

    updater.update_data(Some(&search), &cancel).await.unwrap();
    assert_eq!(updater.cached_children(&search).unwrap().len(), 3);

    // The remote result drops to nothing.
    client
        .query_ids
        .lock()
        .unwrap()
        .insert(QUERY_GUID.parse().unwrap(), Vec::new());
    updater.update_data(Some(&search), &cancel).await.unwrap();
    assert_eq!(updater.cached_children(&search).unwrap().len(), 0);

    // And the prune pass leaves no orphaned work items behind.
    updater.prune().unwrap();
}

#[tokio::test]
async fn temporary_query_is_unsupported() {
    let client = seeded_query_client(1);
    client
        .queries
        .lock()
        .unwrap()
        .get_mut(&QUERY_GUID.parse().unwrap())
        .unwrap()
        .kind = None;

    let updater = updater(client);
    let search = Search::Query(query_search());
    match updater
        .update_data(Some(&search), &CancellationToken::new())
        .await
    {
        Err(SyncError::Unsupported(_)) => {}
        other => panic!("expected Unsupported, got {other:?}"),
    }
}

#[tokio::test]
async fn children_ordered_by_type_priority_then_changed_date() {
    let client = Arc::new(MockLiveClient::new());
    client.add_type("Feature");
    client.seed_query(
        QUERY_GUID.parse().unwrap(),
        "Mixed",
        vec![
            work_item(1, "Task", 5_000),
            work_item(2, "Bug", 1_000),
            work_item(3, "Feature", 9_000),
            work_item(4, "Bug", 3_000),
        ],
    );

    let updater = updater(client);
    let search = Search::Query(query_search());
    updater
        .update_data(Some(&search), &CancellationToken::new())
        .await
        .unwrap();

    let SearchItems::WorkItems(items) = updater.cached_children(&search).unwrap() else {
        panic!("expected work items");
    };
    let order: Vec<i64> = items.iter().map(|w| w.external_id).collect();
    // Bugs first (newest bug first), then the feature, then the task.
    assert_eq!(order, vec![4, 2, 3, 1]);
}

#[tokio::test]
async fn type_lookup_deduplicates_case_insensitively() {
    let client = Arc::new(MockLiveClient::new());
    client.seed_query(
        QUERY_GUID.parse().unwrap(),
        "Bugs",
        vec![
            work_item(1, "Bug", 1_000),
            {
                let mut w = work_item(2, "Bug", 2_000);
                w.work_item_type = "bug".into();
                w
            },
            work_item(3, "Bug", 3_000),
        ],
    );
    // The lowercase variant resolves through the same memo entry.
    client.add_type("bug");

    let updater = updater(client.clone());
    let search = Search::Query(query_search());
    updater
        .update_data(Some(&search), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(client.call_count("get_work_item_type"), 1);
}

#[tokio::test]
async fn pre_cancelled_sync_touches_nothing() {
    let client = seeded_query_client(2);
    let updater = updater(client);
    let search = Search::Query(query_search());

    let cancel = CancellationToken::new();
    cancel.cancel();
    match updater.update_data(Some(&search), &cancel).await {
        Err(SyncError::Cancelled) => {}
        other => panic!("expected Cancelled, got {other:?}"),
    }
    assert!(updater.cached_search(&search).unwrap().is_none());
}

#[tokio::test]
async fn remote_failure_leaves_cache_in_previous_state() {
    let client = seeded_query_client(2);
    let updater = updater(client.clone());
    let search = Search::Query(query_search());
    let cancel = CancellationToken::new();

    updater.update_data(Some(&search), &cancel).await.unwrap();
    assert_eq!(updater.cached_children(&search).unwrap().len(), 2);

    *client.fail_status.lock().unwrap() = Some(500);
    match updater.update_data(Some(&search), &cancel).await {
        Err(SyncError::Remote(e)) => assert_eq!(e.status(), Some(500)),
        other => panic!("expected Remote, got {other:?}"),
    }
    assert_eq!(updater.cached_children(&search).unwrap().len(), 2);
}
