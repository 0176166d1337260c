//! Tests for the optional field bag

use super::*;
use serde_json::json;

#[test]
fn test_missing_and_null_read_as_absent() {
    let value = json!({"a": null, "b": 1});
    let bag = FieldBag::new(&value);

    assert!(!bag.get("a").is_present());
    assert!(!bag.get("missing").is_present());
    assert!(bag.get("b").is_present());
    assert!(!FieldBag::empty().get("b").is_present());
}

#[test]
fn test_lookup_on_wrong_type_is_absent() {
    let value = json!({"a": "text", "list": [1, 2]});
    let bag = FieldBag::new(&value);

    assert!(!bag.path("a.b.c").is_present());
    assert!(!bag.get("list").get("0").is_present());
    assert_eq!(bag.get("a").as_u64(), None);
    assert_eq!(bag.get("list").as_str(), None);
}

#[test]
fn test_dotted_path() {
    let value = json!({"response": {"body": {"usage": {"input_tokens": 7}}}});
    let bag = FieldBag::new(&value);

    assert_eq!(bag.path("response.body.usage.input_tokens").as_u64(), Some(7));
    assert_eq!(bag.path("response..body").as_object().map(|o| o.len()), Some(1));
}

#[test]
fn test_first_candidate_wins_in_order() {
    let value = json!({"legacy": 1, "current": 2});
    let bag = FieldBag::new(&value);

    assert_eq!(bag.first_u64(&["current", "legacy"]), Some(2));
    assert_eq!(bag.first_u64(&["missing", "legacy", "current"]), Some(1));
    assert_eq!(bag.first_u64(&["missing"]), None);
}

#[test]
fn test_first_typed_candidate_skips_wrong_types() {
    // An object under the first key must not shadow a numeric alias
    let value = json!({"inputTokens": {"total": 12}, "promptTokens": 3});
    let bag = FieldBag::new(&value);

    assert_eq!(bag.first_u64(&["inputTokens", "inputTokens.total"]), Some(12));
    assert_eq!(bag.first_u64(&["inputTokens", "promptTokens"]), Some(3));
}

#[test]
fn test_tolerant_numbers() {
    let value = json!({
        "int": 5,
        "float_integral": 6.0,
        "float_fraction": 6.5,
        "string_int": " 42 ",
        "string_float": "8.0",
        "negative": -3,
        "garbage": "abc"
    });
    let bag = FieldBag::new(&value);

    assert_eq!(bag.get("int").as_u64(), Some(5));
    assert_eq!(bag.get("float_integral").as_u64(), Some(6));
    assert_eq!(bag.get("float_fraction").as_u64(), None);
    assert_eq!(bag.get("string_int").as_u64(), Some(42));
    assert_eq!(bag.get("string_float").as_u64(), Some(8));
    assert_eq!(bag.get("negative").as_u64(), None);
    assert_eq!(bag.get("garbage").as_u64(), None);

    assert_eq!(bag.get("float_fraction").as_f64(), Some(6.5));
    assert_eq!(bag.get("string_float").as_f64(), Some(8.0));
    assert_eq!(bag.get("garbage").as_f64(), None);
}

#[test]
fn test_tolerant_bools() {
    let value = json!({"a": true, "b": "FALSE", "c": 1});
    let bag = FieldBag::new(&value);

    assert_eq!(bag.get("a").as_bool(), Some(true));
    assert_eq!(bag.get("b").as_bool(), Some(false));
    assert_eq!(bag.get("c").as_bool(), None);
}

#[test]
fn test_get_ignore_case() {
    let value = json!({"X-Request-Id": "req_1"});
    let bag = FieldBag::new(&value);

    assert_eq!(bag.get_ignore_case("x-request-id").as_str(), Some("req_1"));
    assert_eq!(bag.get("x-request-id").as_str(), None);
}

#[test]
fn test_items_and_entries() {
    let value = json!({"list": [{"n": 1}, {"n": 2}], "map": {"a": 1, "b": 2}});
    let bag = FieldBag::new(&value);

    let ns: Vec<u64> = bag.get("list").items().filter_map(|i| i.get("n").as_u64()).collect();
    assert_eq!(ns, vec![1, 2]);

    let keys: Vec<&str> = bag.get("map").entries().map(|(k, _)| k).collect();
    assert_eq!(keys.len(), 2);

    assert_eq!(bag.get("map").items().count(), 0);
    assert_eq!(bag.get("list").entries().count(), 0);
}

#[test]
fn test_path_indexes_arrays() {
    let value = json!({"choices": [{"message": {"content": "hi"}}], "map": {"0": "zero"}});
    let bag = FieldBag::new(&value);

    assert_eq!(bag.path("choices.0.message.content").as_str(), Some("hi"));
    assert!(!bag.path("choices.1.message").is_present());
    assert_eq!(bag.path("map.0").as_str(), Some("zero"));
    assert_eq!(bag.get("choices").index(0).get("message").get("content").as_str(), Some("hi"));
}
