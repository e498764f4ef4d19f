use quote_core::{Bucket, Cluster, ClusterConfig, Document, DocumentStore, StoreError};
use serde_json::{json, Map, Value};
use std::sync::Arc;

fn open_bucket() -> (Cluster, Arc<Bucket>) {
    let cluster = Cluster::connect(ClusterConfig::InMemory).unwrap();
    let bucket = cluster.open_bucket("docs").unwrap();
    (cluster, bucket)
}

fn body(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

#[test]
fn insert_then_get_roundtrip() {
    let (_cluster, bucket) = open_bucket();

    let stored = bucket
        .insert(&Document::new("k1", body(json!({"a": 1, "b": "two"}))))
        .unwrap();
    assert!(stored.cas > 0);

    let loaded = bucket.get("k1").unwrap().unwrap();
    assert_eq!(loaded, stored);
}

#[test]
fn get_missing_key_is_none() {
    let (_cluster, bucket) = open_bucket();
    assert_eq!(bucket.get("absent").unwrap(), None);
}

#[test]
fn insert_existing_key_fails_and_keeps_original() {
    let (_cluster, bucket) = open_bucket();
    bucket
        .insert(&Document::new("k1", body(json!({"v": "original"}))))
        .unwrap();

    let err = bucket
        .insert(&Document::new("k1", body(json!({"v": "intruder"}))))
        .unwrap_err();

    assert!(matches!(err, StoreError::DocumentAlreadyExists(ref id) if id == "k1"));
    let loaded = bucket.get("k1").unwrap().unwrap();
    assert_eq!(loaded.get_str("v"), Some("original"));
}

#[test]
fn replace_missing_document_fails() {
    let (_cluster, bucket) = open_bucket();
    let err = bucket
        .replace(&Document::new("ghost", body(json!({}))))
        .unwrap_err();
    assert!(matches!(err, StoreError::DocumentNotFound(ref id) if id == "ghost"));
}

#[test]
fn replace_checks_cas_when_given() {
    let (_cluster, bucket) = open_bucket();
    let first = bucket
        .insert(&Document::new("k1", body(json!({"v": 1}))))
        .unwrap();

    let mut update = first.clone();
    update.put("v", 2);
    let second = bucket.replace(&update).unwrap();
    assert!(second.cas > first.cas);

    let mut stale = first.clone();
    stale.put("v", 3);
    let err = bucket.replace(&stale).unwrap_err();
    match err {
        StoreError::CasMismatch {
            id,
            expected,
            actual,
        } => {
            assert_eq!(id, "k1");
            assert_eq!(expected, first.cas);
            assert_eq!(actual, second.cas);
        }
        other => panic!("unexpected error: {other}"),
    }

    let unchecked = Document::new("k1", body(json!({"v": 4})));
    bucket.replace(&unchecked).unwrap();
    assert_eq!(bucket.get("k1").unwrap().unwrap().content["v"], json!(4));
}

#[test]
fn upsert_creates_and_overwrites() {
    let (_cluster, bucket) = open_bucket();

    let created = bucket
        .upsert(&Document::new("k1", body(json!({"v": "a"}))))
        .unwrap();
    let overwritten = bucket
        .upsert(&Document::new("k1", body(json!({"w": "b"}))))
        .unwrap();

    assert!(overwritten.cas > created.cas);
    let loaded = bucket.get("k1").unwrap().unwrap();
    assert_eq!(Value::Object(loaded.content), json!({"w": "b"}));
}

#[test]
fn cas_increases_across_documents() {
    let (_cluster, bucket) = open_bucket();
    let mut last = 0;
    for key in ["a", "b", "c"] {
        let stored = bucket.upsert(&Document::new(key, Map::new())).unwrap();
        assert!(stored.cas > last);
        last = stored.cas;
    }
}

#[test]
fn failed_insert_does_not_consume_cas() {
    let (_cluster, bucket) = open_bucket();
    let first = bucket.insert(&Document::new("k1", Map::new())).unwrap();
    bucket.insert(&Document::new("k1", Map::new())).unwrap_err();
    let next = bucket.insert(&Document::new("k2", Map::new())).unwrap();
    assert_eq!(next.cas, first.cas + 1);
}

#[test]
fn invalid_keys_are_rejected_on_every_operation() {
    let (_cluster, bucket) = open_bucket();
    let long_key = "x".repeat(quote_core::store::MAX_KEY_BYTES + 1);

    assert!(matches!(bucket.get(""), Err(StoreError::InvalidKey(_))));
    assert!(matches!(
        bucket.insert(&Document::new(long_key.as_str(), Map::new())),
        Err(StoreError::InvalidKey(_))
    ));
    assert!(matches!(
        bucket.replace(&Document::new("", Map::new())),
        Err(StoreError::InvalidKey(_))
    ));
    assert!(matches!(
        bucket.upsert(&Document::new("", Map::new())),
        Err(StoreError::InvalidKey(_))
    ));
}
