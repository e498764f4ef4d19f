use quote_core::{
    Cluster, ClusterConfig, Document, DocumentStore, Quote, QuoteService, RepoError,
    ServiceConfig, StoreError, ViewQuery,
};
use serde_json::Map;
use std::sync::Arc;

#[test]
fn opening_bucket_twice_returns_same_handle() {
    let cluster = Cluster::connect(ClusterConfig::InMemory).unwrap();
    let first = cluster.open_bucket("default").unwrap();
    let second = cluster.open_bucket("default").unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let other = cluster.open_bucket("other").unwrap();
    assert!(!Arc::ptr_eq(&first, &other));
}

#[test]
fn invalid_bucket_name_is_rejected() {
    let cluster = Cluster::connect(ClusterConfig::InMemory).unwrap();
    let err = cluster.open_bucket("../etc").err().unwrap();
    assert!(matches!(err, StoreError::InvalidBucketName(_)));
}

#[test]
fn operations_after_disconnect_fail() {
    let cluster = Cluster::connect(ClusterConfig::InMemory).unwrap();
    let bucket = cluster.open_bucket("default").unwrap();
    bucket.insert(&Document::new("k", Map::new())).unwrap();

    cluster.disconnect();
    cluster.disconnect();

    assert!(!cluster.is_connected());
    assert!(matches!(bucket.get("k"), Err(StoreError::Disconnected)));
    assert!(matches!(
        bucket.upsert(&Document::new("k", Map::new())),
        Err(StoreError::Disconnected)
    ));
    assert!(matches!(
        bucket.query(&ViewQuery::from("d", "v")),
        Err(StoreError::Disconnected)
    ));
    assert!(matches!(
        cluster.open_bucket("default"),
        Err(StoreError::Disconnected)
    ));
}

#[test]
fn directory_cluster_persists_documents_across_connections() {
    let dir = tempfile::tempdir().unwrap();
    let config = ClusterConfig::directory(dir.path().join("data"));

    let cluster = Cluster::connect(config.clone()).unwrap();
    let bucket = cluster.open_bucket("quotes").unwrap();
    let stored = bucket
        .insert(&Document::new("Alice", Quote::new("Alice", "Hello").to_content()))
        .unwrap();
    cluster.disconnect();
    drop(bucket);

    assert!(dir.path().join("data").join("quotes.bucket.sqlite3").exists());

    let reopened = Cluster::connect(config).unwrap();
    let bucket = reopened.open_bucket("quotes").unwrap();
    assert_eq!(bucket.get("Alice").unwrap(), Some(stored));
}

#[test]
fn service_round_trip_and_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let config = ServiceConfig {
        cluster: ClusterConfig::directory(dir.path()),
        bucket: "quotes".to_string(),
    };

    let service = QuoteService::start(&config).unwrap();
    assert!(service.upsert_quote(&Quote::new("Alice", "Hello")).unwrap());
    assert!(service.upsert_quote(&Quote::new("Bob", "Old")).unwrap());
    assert!(service.upsert_quote(&Quote::new("Bob", "New")).unwrap());
    let bucket = Arc::clone(service.bucket());
    service.shutdown();

    assert!(matches!(bucket.get("Alice"), Err(StoreError::Disconnected)));

    let restarted = QuoteService::start(&config).unwrap();
    assert_eq!(
        restarted.fetch_all_quotes().unwrap(),
        vec![Quote::new("Alice", "Hello"), Quote::new("Bob", "New")]
    );
    assert_eq!(
        restarted.get_quote("Bob").unwrap(),
        Some(Quote::new("Bob", "New"))
    );
    restarted.shutdown();
}

#[test]
fn service_start_reports_bad_bucket_name() {
    let config = ServiceConfig {
        bucket: "no spaces".to_string(),
        ..ServiceConfig::default()
    };
    let err = QuoteService::start(&config).err().unwrap();
    assert!(matches!(
        err,
        RepoError::Store(StoreError::InvalidBucketName(_))
    ));
}

#[test]
fn default_service_config_is_in_memory_default_bucket() {
    let config = ServiceConfig::default();
    assert_eq!(config.cluster, ClusterConfig::InMemory);
    assert_eq!(config.bucket, quote_core::DEFAULT_BUCKET);

    let decoded: ServiceConfig =
        serde_json::from_value(serde_json::json!({"cluster": {"mode": "in_memory"}})).unwrap();
    assert_eq!(decoded, config);
}
