mod support;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use adosync_client::RemotePolicyEvaluation;
use adosync_sync::{PullRequestUpdater, SearchItems, Updater};
use adosync_types::{PolicyStatus, PullRequestView, Search};

use support::*;

fn updater(client: Arc<MockLiveClient>) -> PullRequestUpdater {
    PullRequestUpdater::new(test_context(client))
}

#[tokio::test]
async fn mine_view_filters_by_creator() {
    let client = Arc::new(MockLiveClient::new());
    let updater = updater(client.clone());
    let search = Search::PullRequests(pr_search(PullRequestView::Mine));

    updater
        .update_data(Some(&search), &CancellationToken::new())
        .await
        .unwrap();

    let filter = client.last_pr_filter.lock().unwrap().clone().unwrap();
    assert_eq!(filter.creator_id.as_deref(), Some(USER_GUID));
    assert_eq!(filter.reviewer_id, None);
}

#[tokio::test]
async fn assigned_view_filters_by_reviewer() {
    let client = Arc::new(MockLiveClient::new());
    let updater = updater(client.clone());
    let search = Search::PullRequests(pr_search(PullRequestView::Assigned));

    updater
        .update_data(Some(&search), &CancellationToken::new())
        .await
        .unwrap();

    let filter = client.last_pr_filter.lock().unwrap().clone().unwrap();
    assert_eq!(filter.creator_id, None);
    assert_eq!(filter.reviewer_id.as_deref(), Some(USER_GUID));
}

#[tokio::test]
async fn policy_evaluations_fold_to_worst_outcome() {
    let client = Arc::new(MockLiveClient::new());
    *client.pull_requests.lock().unwrap() = vec![pull_request(55, 1_000)];
    client.policies.lock().unwrap().insert(
        55,
        vec![
            RemotePolicyEvaluation {
                status: PolicyStatus::Approved,
                policy_name: "Build".into(),
            },
            RemotePolicyEvaluation {
                status: PolicyStatus::Running,
                policy_name: "Reviewers".into(),
            },
        ],
    );

    let updater = updater(client);
    let search = Search::PullRequests(pr_search(PullRequestView::All));
    updater
        .update_data(Some(&search), &CancellationToken::new())
        .await
        .unwrap();

    let SearchItems::PullRequests(prs) = updater.cached_children(&search).unwrap() else {
        panic!("expected pull requests");
    };
    assert_eq!(prs.len(), 1);
    assert_eq!(prs[0].policy_status, "Running");
    assert!(prs[0].policy_status_reason.contains("Reviewers"));
}

#[tokio::test]
async fn children_ordered_by_creation_date_descending() {
    let client = Arc::new(MockLiveClient::new());
    *client.pull_requests.lock().unwrap() = vec![
        pull_request(1, 100),
        pull_request(2, 300),
        pull_request(3, 200),
    ];

    let updater = updater(client);
    let search = Search::PullRequests(pr_search(PullRequestView::All));
    updater
        .update_data(Some(&search), &CancellationToken::new())
        .await
        .unwrap();

    let SearchItems::PullRequests(prs) = updater.cached_children(&search).unwrap() else {
        panic!("expected pull requests");
    };
    let order: Vec<i64> = prs.iter().map(|pr| pr.external_id).collect();
    assert_eq!(order, vec![2, 3, 1]);
}

#[tokio::test]
async fn two_views_of_one_repository_are_independent_searches() {
    let client = Arc::new(MockLiveClient::new());
    *client.pull_requests.lock().unwrap() = vec![pull_request(7, 100)];

    let updater = updater(client.clone());
    let mine = Search::PullRequests(pr_search(PullRequestView::Mine));
    let all = Search::PullRequests(pr_search(PullRequestView::All));
    let cancel = CancellationToken::new();

    updater.update_data(Some(&mine), &cancel).await.unwrap();
    updater.update_data(Some(&all), &cancel).await.unwrap();
    assert_eq!(updater.cached_children(&mine).unwrap().len(), 1);
    assert_eq!(updater.cached_children(&all).unwrap().len(), 1);

    // The mine view empties remotely; the all view's rows survive both the
    // diff and the orphan prune because the shared pull request is still
    // reachable through it.
    client.pull_requests.lock().unwrap().clear();
    updater.update_data(Some(&mine), &cancel).await.unwrap();
    updater.prune().unwrap();

    assert_eq!(updater.cached_children(&mine).unwrap().len(), 0);
    assert_eq!(updater.cached_children(&all).unwrap().len(), 1);
}

#[tokio::test]
async fn items_that_fall_out_of_the_result_are_removed() {
    let client = Arc::new(MockLiveClient::new());
    *client.pull_requests.lock().unwrap() =
        vec![pull_request(1, 100), pull_request(2, 200)];

    let updater = updater(client.clone());
    let search = Search::PullRequests(pr_search(PullRequestView::All));
    let cancel = CancellationToken::new();

    updater.update_data(Some(&search), &cancel).await.unwrap();
    assert_eq!(updater.cached_children(&search).unwrap().len(), 2);

    *client.pull_requests.lock().unwrap() = vec![pull_request(2, 200)];
    updater.update_data(Some(&search), &cancel).await.unwrap();

    let SearchItems::PullRequests(prs) = updater.cached_children(&search).unwrap() else {
        panic!("expected pull requests");
    };
    assert_eq!(prs.len(), 1);
    assert_eq!(prs[0].external_id, 2);
}
