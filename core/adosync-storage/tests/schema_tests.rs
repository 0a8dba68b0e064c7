use adosync_storage::{CacheStore, CACHE_SCHEMA_VERSION};

#[test]
fn fresh_file_is_stamped_with_current_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("AzureData.db");
    let store = CacheStore::open(&path).unwrap();
    assert_eq!(store.schema_version().unwrap(), CACHE_SCHEMA_VERSION);
    assert_eq!(store.path(), Some(path.as_path()));
}

#[test]
fn reopen_preserves_rows_when_version_matches() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("AzureData.db");

    {
        let store = CacheStore::open(&path).unwrap();
        store
            .read(|tx| tx.upsert_organization("contoso", "https://dev.azure.com/contoso"))
            .unwrap();
    }

    let store = CacheStore::open(&path).unwrap();
    let org = store
        .read(|tx| tx.organization_by_connection("https://dev.azure.com/contoso"))
        .unwrap();
    assert!(org.is_some());
}

#[test]
fn version_bump_rebuilds_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("AzureData.db");

    {
        let store = CacheStore::open(&path).unwrap();
        store
            .read(|tx| tx.upsert_organization("contoso", "https://dev.azure.com/contoso"))
            .unwrap();
    }

    // Simulate an older client's schema stamp.
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch(&format!("PRAGMA user_version = {};", CACHE_SCHEMA_VERSION - 1))
            .unwrap();
    }

    let store = CacheStore::open(&path).unwrap();
    assert_eq!(store.schema_version().unwrap(), CACHE_SCHEMA_VERSION);
    let org = store
        .read(|tx| tx.organization_by_connection("https://dev.azure.com/contoso"))
        .unwrap();
    assert_eq!(org, None, "rebuild must discard old rows");
}

#[test]
fn corrupt_file_is_rebuilt() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("AzureData.db");
    std::fs::write(&path, b"this is not a database").unwrap();

    let store = CacheStore::open(&path).unwrap();
    assert_eq!(store.schema_version().unwrap(), CACHE_SCHEMA_VERSION);
}
