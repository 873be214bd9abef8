use chrono::Duration;
use mathkids_core::model::{AgeGroup, LearningSession, SessionId, UserProgress};
use mathkids_core::time::fixed_now;
use storage::keys::{SESSIONS_KEY, all_keys, progress_key};
use storage::repository::{KeyValueStore, Loaded, Storage, load_json, store_json};
use storage::sqlite::SqliteStore;

async fn connect(name: &str) -> SqliteStore {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let store = SqliteStore::connect(&url).await.expect("connect");
    store.migrate().await.expect("migrate");
    store
}

#[tokio::test]
async fn sqlite_roundtrips_and_overwrites_values() {
    let store = connect("memdb_kv_roundtrip").await;

    assert_eq!(store.get("missing").await.unwrap(), None);
    store.set("greeting", "hello").await.unwrap();
    store.set("greeting", "hi").await.unwrap();
    assert_eq!(store.get("greeting").await.unwrap().as_deref(), Some("hi"));

    store.remove("greeting").await.unwrap();
    store.remove("greeting").await.unwrap();
    assert_eq!(store.get("greeting").await.unwrap(), None);
}

#[tokio::test]
async fn sqlite_batch_writes_are_visible_together() {
    let store = connect("memdb_kv_batch").await;

    let entries: Vec<(String, String)> = all_keys()
        .into_iter()
        .map(|k| (k.clone(), format!("\"{k}\"")))
        .collect();
    store.set_many(&entries).await.unwrap();
    for (key, value) in &entries {
        assert_eq!(store.get(key).await.unwrap().as_ref(), Some(value));
    }

    store.remove_many(&all_keys()).await.unwrap();
    for key in all_keys() {
        assert_eq!(store.get(&key).await.unwrap(), None);
    }
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let store = connect("memdb_kv_migrate").await;
    store.set(SESSIONS_KEY, "[]").await.unwrap();
    store.migrate().await.expect("second migrate");
    assert_eq!(store.get(SESSIONS_KEY).await.unwrap().as_deref(), Some("[]"));
}

#[tokio::test]
async fn storage_sqlite_persists_typed_documents() {
    let storage = Storage::sqlite("sqlite:file:memdb_kv_typed?mode=memory&cache=shared")
        .await
        .expect("storage");
    let kv = storage.kv.as_ref();

    let start = fixed_now();
    let mut session = LearningSession::start(SessionId::random(), AgeGroup::ElementaryLow, 3, start);
    session.finish(start + Duration::seconds(90)).unwrap();
    let mut progress = UserProgress::empty(AgeGroup::ElementaryLow, start);
    progress.apply_session(&session, start);

    store_json(kv, SESSIONS_KEY, &vec![session.clone()]).await.unwrap();
    store_json(kv, &progress_key(AgeGroup::ElementaryLow), &progress)
        .await
        .unwrap();

    let sessions: Loaded<Vec<LearningSession>> = load_json(kv, SESSIONS_KEY).await.unwrap();
    assert_eq!(sessions, Loaded::Found(vec![session]));
    let loaded: Loaded<UserProgress> = load_json(kv, &progress_key(AgeGroup::ElementaryLow))
        .await
        .unwrap();
    assert_eq!(loaded, Loaded::Found(progress));

    kv.set(&progress_key(AgeGroup::Preschool), "not json")
        .await
        .unwrap();
    let corrupt: Loaded<UserProgress> = load_json(kv, &progress_key(AgeGroup::Preschool))
        .await
        .unwrap();
    assert!(corrupt.is_corrupt());
}
