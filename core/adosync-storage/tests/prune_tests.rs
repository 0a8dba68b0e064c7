use adosync_storage::CacheStore;
use adosync_types::{now_millis, PolicyStatus};

/// Seeds one org/project and returns their ids.
fn seed_scope(store: &CacheStore) -> (i64, i64) {
    store
        .read(|tx| {
            let org = tx.upsert_organization("contoso", "https://dev.azure.com/contoso")?;
            let project = tx.upsert_project("Fabrikam", "guid-1", "", org.id)?;
            Ok((org.id, project.id))
        })
        .unwrap()
}

#[test]
fn ttl_prune_then_orphan_prune_collects_parents() {
    let store = CacheStore::open_in_memory().unwrap();
    let (_, project_id) = seed_scope(&store);

    store
        .with_tx(|tx| {
            let wit = tx.upsert_work_item_type("Bug", "", "", "", project_id)?;
            let query = tx.upsert_query("q-1", "Bugs", "ada", project_id)?;
            let old = now_millis() - 100_000;
            let wid = tx.upsert_work_item(1, "t", "", "", "", None, 0, None, 0, None, wit.id)?;
            tx.upsert_query_work_item(query.id, wid, old)?;

            // TTL prune expires the join row; orphan prune must then collect
            // the work item in the same pass.
            tx.delete_query_work_items_before(now_millis() - 50_000)?;
            let orphaned = tx.delete_orphans()?;
            assert_eq!(orphaned, 1);
            assert_eq!(tx.query_work_item_count(query.id)?, 0);
            Ok(())
        })
        .unwrap();
}

#[test]
fn saved_query_ttl_ignores_my_work_items_rows() {
    let store = CacheStore::open_in_memory().unwrap();
    let (_, project_id) = seed_scope(&store);

    store
        .with_tx(|tx| {
            let wit = tx.upsert_work_item_type("Task", "", "", "", project_id)?;
            let saved = tx.upsert_query("q-1", "Bugs", "ada", project_id)?;
            let mine = tx.upsert_query("my-work-items:contoso|fabrikam", "My Work Items", "ada", project_id)?;
            let old = now_millis() - 100_000;
            for (query_id, ext) in [(saved.id, 1), (mine.id, 2)] {
                let wid =
                    tx.upsert_work_item(ext, "t", "", "", "", None, 0, None, 0, None, wit.id)?;
                tx.upsert_query_work_item(query_id, wid, old)?;
            }

            let cutoff = now_millis() - 50_000;
            let removed = tx.delete_query_work_items_before(cutoff)?;
            assert_eq!(removed, 1, "only the saved query's join row expires");
            assert_eq!(tx.query_work_item_count(mine.id)?, 1);

            let removed = tx.delete_my_work_item_joins_before(cutoff)?;
            assert_eq!(removed, 1);
            assert_eq!(tx.query_work_item_count(mine.id)?, 0);
            Ok(())
        })
        .unwrap();
}

#[test]
fn expired_builds_orphan_their_definition() {
    let store = CacheStore::open_in_memory().unwrap();
    let (_, project_id) = seed_scope(&store);

    store
        .with_tx(|tx| {
            let def = tx.upsert_definition(42, "CI", project_id, 0, "")?;
            tx.upsert_build(1, "b1", "completed", "succeeded", 0, 0, 0, "", def.id, "", "", None)?;

            // Retention expires every build; the definition is then orphaned.
            tx.delete_builds_before(now_millis() + 1)?;
            tx.delete_orphans()?;
            assert_eq!(tx.definition_by_key(42, project_id)?, None);
            Ok(())
        })
        .unwrap();
}

#[test]
fn live_rows_survive_prune() {
    let store = CacheStore::open_in_memory().unwrap();
    let (_, project_id) = seed_scope(&store);

    store
        .with_tx(|tx| {
            let repo = tx.upsert_repository("widgets", "repo-1", project_id, "", false)?;
            let search = tx.upsert_pull_request_search(project_id, repo.id, "ada", 1)?;
            let pr_id = tx.upsert_pull_request(
                1, "t", "", repo.id, None, "Active",
                PolicyStatus::Approved, "", "", 0, "",
            )?;
            tx.upsert_search_pull_request(search.id, pr_id, now_millis())?;

            tx.delete_orphans()?;
            assert_eq!(tx.pull_requests_for_search(search.id)?.len(), 1);
            Ok(())
        })
        .unwrap();
}
