// Tests for the upsert stores

use floorwalk_core::aggregate::finalize;
use floorwalk_core::data::{RunStatus, SqliteStore};
use floorwalk_core::schema::SchemaMapping;
use floorwalk_core::sink::{PersistenceSink, SinkError, UpsertStore};
use floorwalk_core::supabase::{SupabaseConfig, SupabaseStore};
use floorwalk_scanner::BrandRecord;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_json, header, headers, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_test_store() -> (TempDir, SqliteStore) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let store = SqliteStore::open(&db_path).unwrap();
    (temp_dir, store)
}

fn supabase(server: &MockServer) -> SupabaseStore {
    SupabaseStore::new(&SupabaseConfig {
        url: server.uri(),
        key: "service-key".to_string(),
    })
    .unwrap()
}

// ============================================================================
// SQLite Store Tests
// ============================================================================

#[test]
fn test_store_creation() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");

    assert!(!SqliteStore::exists(&db_path));
    let _store = SqliteStore::open(&db_path).unwrap();
    assert!(SqliteStore::exists(&db_path));
}

#[tokio::test]
async fn test_sqlite_upsert_creates_table_with_mapped_columns() {
    let (_temp_dir, store) = create_test_store();
    let sink = PersistenceSink::new(store, SchemaMapping::korean("brands"));
    let result = finalize(vec![BrandRecord::new("Chanel", "1F", "Cosmetics", "02-1")]);

    assert_eq!(sink.upsert(&result).await.unwrap(), 1);
}

#[tokio::test]
async fn test_sqlite_upsert_replaces_on_conflict() {
    let (_temp_dir, store) = create_test_store();
    let mapping = SchemaMapping::english("brand2");

    let first = mapping.to_rows(&finalize(vec![BrandRecord::new("Dior", "2F", "Cosmetics", "old")]));
    let second = mapping.to_rows(&finalize(vec![
        BrandRecord::new("Dior", "2F", "Cosmetics", "new"),
        BrandRecord::new("Gucci", "2F", "Fashion", ""),
    ]));

    store.upsert_batch("brand2", first, "id").await.unwrap();
    store.upsert_batch("brand2", second, "id").await.unwrap();

    assert_eq!(store.count_rows("brand2").unwrap(), 2);
    let phones = store.column_values("brand2", "id", "tel").unwrap();
    assert_eq!(
        phones,
        vec![
            ("Dior-2F".to_string(), "new".to_string()),
            ("Gucci-2F".to_string(), "".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_sqlite_upsert_twice_is_idempotent() {
    let (_temp_dir, store) = create_test_store();
    let mapping = SchemaMapping::korean("brands");
    let rows = mapping.to_rows(&finalize(vec![
        BrandRecord::new("A", "L1", "", ""),
        BrandRecord::new("A", "L2", "", ""),
        BrandRecord::new("B", "L1", "", ""),
    ]));

    store.upsert_batch("brands", rows.clone(), "id").await.unwrap();
    store.upsert_batch("brands", rows, "id").await.unwrap();

    assert_eq!(store.count_rows("brands").unwrap(), 3);
}

#[tokio::test]
async fn test_sqlite_empty_batch_is_noop() {
    let (_temp_dir, store) = create_test_store();
    let accepted = store.upsert_batch("brands", Vec::new(), "id").await.unwrap();
    assert!(accepted.is_empty());
}

#[test]
fn test_run_log_records_failure() {
    let (_temp_dir, store) = create_test_store();
    let run_id = store.start_run("t2", "https://example.com").unwrap();

    store.finish_run(&run_id, RunStatus::Failed, 0).unwrap();

    let run = store.get_run(&run_id).unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.profile, "t2");
    assert_eq!(run.records, 0);
}

// ============================================================================
// Supabase Store Tests
// ============================================================================

#[tokio::test]
async fn test_supabase_upsert_request_shape() {
    let server = MockServer::start().await;
    let expected = json!([
        {"id": "Chanel-1F", "brand_name": "Chanel", "location": "1F", "category": "Cosmetics", "tel": ""}
    ]);

    Mock::given(method("POST"))
        .and(path("/rest/v1/brand2"))
        .and(query_param("on_conflict", "id"))
        .and(header("apikey", "service-key"))
        .and(header("authorization", "Bearer service-key"))
        .and(headers(
            "prefer",
            vec!["resolution=merge-duplicates", "return=representation"],
        ))
        .and(body_json(&expected))
        .respond_with(ResponseTemplate::new(201).set_body_json(&expected))
        .expect(1)
        .mount(&server)
        .await;

    let sink = PersistenceSink::new(supabase(&server), SchemaMapping::english("brand2"));
    let result = finalize(vec![BrandRecord::new("Chanel", "1F", "Cosmetics", "")]);

    assert_eq!(sink.upsert(&result).await.unwrap(), 1);
}

#[tokio::test]
async fn test_supabase_accepted_count_comes_from_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/brands"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{"id": "A-L1"}])))
        .mount(&server)
        .await;

    let sink = PersistenceSink::new(supabase(&server), SchemaMapping::korean("brands"));
    let result = finalize(vec![
        BrandRecord::new("A", "L1", "", ""),
        BrandRecord::new("B", "L1", "", ""),
    ]);

    assert_eq!(sink.upsert(&result).await.unwrap(), 1);
}

#[tokio::test]
async fn test_supabase_rejection_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Invalid API key"))
        .mount(&server)
        .await;

    let sink = PersistenceSink::new(supabase(&server), SchemaMapping::default());
    let result = finalize(vec![BrandRecord::new("A", "L1", "", "")]);

    match sink.upsert(&result).await {
        Err(SinkError::Rejected { status, message }) => {
            assert_eq!(status, 401);
            assert_eq!(message, "Invalid API key");
        }
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn test_supabase_unexpected_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let store = supabase(&server);
    let err = store
        .upsert_batch("brands", vec![serde_json::Map::new()], "id")
        .await
        .unwrap_err();
    assert!(matches!(err, SinkError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_supabase_unreachable() {
    let store = SupabaseStore::new(&SupabaseConfig {
        url: "http://127.0.0.1:1".to_string(),
        key: "k".to_string(),
    })
    .unwrap();

    let err = store.upsert_batch("brands", Vec::new(), "id").await.unwrap_err();
    assert!(matches!(err, SinkError::Unavailable(_)));
}
