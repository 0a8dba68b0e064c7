mod support;

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use adosync_searches::{DefinitionSearchDef, QueryDef};
use adosync_sync::{DataUpdateService, TerminalOutcome, Updater};
use adosync_types::{Search, UpdateKind, UpdateParams};

use support::*;

#[tokio::test]
async fn successful_dispatch_records_last_updated() {
    let client = seeded_query_client(2);
    let service = DataUpdateService::new(test_context(client));
    assert_eq!(service.last_updated(), None);

    let params = UpdateParams::for_search(Search::Query(query_search()));
    let outcome = service.dispatch(&params, &CancellationToken::new()).await;
    assert!(matches!(outcome, TerminalOutcome::Success));
    assert!(service.last_updated().is_some());
}

#[tokio::test]
async fn failed_dispatch_is_exactly_one_error() {
    let client = seeded_query_client(2);
    *client.fail_status.lock().unwrap() = Some(503);
    let service = DataUpdateService::new(test_context(client));

    let params = UpdateParams::for_search(Search::Query(query_search()));
    let outcome = service.dispatch(&params, &CancellationToken::new()).await;
    match outcome {
        TerminalOutcome::Error(e) => assert!(e.to_string().contains("503")),
        other => panic!("expected Error, got {other:?}"),
    }
    assert_eq!(service.last_updated(), None);
}

#[tokio::test]
async fn all_path_aggregates_but_still_terminates_once() {
    let client = Arc::new(MockLiveClient::new());
    client.seed_definition(42, "CI", vec![build(1, 100)]);
    let ctx = test_context(client.clone());

    // A saved query pointing at a query the remote no longer has, plus a
    // healthy pipeline search.
    ctx.repos
        .queries
        .add_or_update(&QueryDef::new(
            "Gone",
            format!("{ORG_URL}/{PROJECT}/_queries/query/{QUERY_GUID}/"),
        ))
        .await
        .unwrap();
    ctx.repos
        .definitions
        .add_or_update(&DefinitionSearchDef::new(
            "CI",
            42,
            format!("{ORG_URL}/{PROJECT}/_build?definitionId=42"),
        ))
        .await
        .unwrap();

    let service = DataUpdateService::new(ctx);
    let outcome = service
        .dispatch(&UpdateParams::all(), &CancellationToken::new())
        .await;

    // The query updater failed, and that failure is the single terminal
    // outcome; the pipeline updater still ran and cached its builds.
    assert!(matches!(outcome, TerminalOutcome::Error(_)));
    let pipeline = service.updater(UpdateKind::Pipeline).unwrap();
    let search = Search::Pipeline(pipeline_search(42));
    assert_eq!(pipeline.cached_children(&search).unwrap().len(), 1);
}

#[tokio::test]
async fn cancellation_mid_dispatch_is_a_cancel_outcome() {
    let client = seeded_query_client(2);
    *client.delay.lock().unwrap() = Some(Duration::from_millis(300));
    let service = Arc::new(DataUpdateService::new(test_context(client)));

    let cancel = CancellationToken::new();
    let task = {
        let service = service.clone();
        let cancel = cancel.clone();
        let params = UpdateParams::for_search(Search::Query(query_search()));
        tokio::spawn(async move { service.dispatch(&params, &cancel).await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();
    let outcome = task.await.unwrap();
    assert!(matches!(outcome, TerminalOutcome::Cancelled));

    // The aborted sync left nothing behind.
    let query = service.updater(UpdateKind::Query).unwrap();
    let search = Search::Query(query_search());
    assert!(query.cached_search(&search).unwrap().is_none());
}

#[tokio::test]
async fn purge_drops_every_cached_row() {
    let client = seeded_query_client(3);
    let service = DataUpdateService::new(test_context(client));
    let params = UpdateParams::for_search(Search::Query(query_search()));
    service.dispatch(&params, &CancellationToken::new()).await;

    let query = service.updater(UpdateKind::Query).unwrap();
    let search = Search::Query(query_search());
    assert_eq!(query.cached_children(&search).unwrap().len(), 3);

    service.purge_all_data().await.unwrap();
    assert!(query.cached_search(&search).unwrap().is_none());
    assert!(query.cached_children(&search).unwrap().is_empty());
    assert_eq!(service.last_updated(), None);
}

#[tokio::test]
async fn staleness_respects_cooldown() {
    let client = seeded_query_client(1);
    let service = DataUpdateService::new(test_context(client));
    let params = UpdateParams::for_search(Search::Query(query_search()));

    // Never synced: stale.
    assert!(service.is_new_or_stale(&params, Duration::from_secs(180)));

    service.dispatch(&params, &CancellationToken::new()).await;
    assert!(!service.is_new_or_stale(&params, Duration::from_secs(180)));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(service.is_new_or_stale(&params, Duration::from_millis(5)));

    // All is always stale.
    assert!(service.is_new_or_stale(&UpdateParams::all(), Duration::from_secs(180)));
}
