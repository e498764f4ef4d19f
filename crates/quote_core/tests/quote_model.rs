use quote_core::Quote;
use serde_json::json;

#[test]
fn quote_serializes_to_document_wire_shape() {
    let quote = Quote::new("Alice", "Hello");
    let json = serde_json::to_value(&quote).unwrap();
    assert_eq!(json, json!({"name": "Alice", "quote": "Hello"}));

    let decoded: Quote = serde_json::from_value(json).unwrap();
    assert_eq!(decoded, quote);
}

#[test]
fn quote_requires_both_fields() {
    let err = serde_json::from_value::<Quote>(json!({"name": "Alice"})).unwrap_err();
    assert!(err.to_string().contains("quote"));
}

#[test]
fn key_is_the_name() {
    assert_eq!(Quote::new("Bob", "x").key(), "Bob");
}
