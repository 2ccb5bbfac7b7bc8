// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use std::collections::HashSet;
use yare::parameterized;

fn digester() -> KeyDigester {
    KeyDigester::new("uniq", DigestMethod::default())
}

#[test]
fn key_renders_prefix_class_and_digest() {
    let key = digester().digest(&JobIdentity::new("ReportGenerator", vec![json!(42)]));

    assert_eq!(key.prefix, "uniq");
    assert_eq!(key.class, "ReportGenerator");
    assert_eq!(key.digest.len(), 32);
    assert_eq!(key.to_string(), format!("uniq:ReportGenerator:{}", key.digest));
}

#[test]
fn runtime_scope_appends_suffix() {
    let key = digester().digest(&JobIdentity::new("ReportGenerator", vec![json!(42)]));

    assert_eq!(key.for_scope(LockScope::Enqueue), key.to_string());
    assert_eq!(
        key.for_scope(LockScope::Runtime),
        format!("{}:runtime", key)
    );
}

#[test]
fn object_key_order_does_not_change_digest() {
    let a: Value = serde_json::from_str(r#"{"b":1,"a":{"y":[1,2],"x":null}}"#).unwrap();
    let b: Value = serde_json::from_str(r#"{"a":{"x":null,"y":[1,2]},"b":1}"#).unwrap();

    let d = digester();
    assert_eq!(d.digest_arguments(&[a]), d.digest_arguments(&[b]));
}

#[test]
fn canonical_form_sorts_nested_keys_and_keeps_array_order() {
    let args = vec![json!({"z": 1, "a": [3, {"d": true, "c": "s"}]}), json!("x")];
    assert_eq!(
        canonical_arguments(&args),
        r#"[{"a":[3,{"c":"s","d":true}],"z":1},"x"]"#
    );
}

#[parameterized(
    different_value = { vec![json!(42)], vec![json!(43)] },
    different_order = { vec![json!(1), json!(2)], vec![json!(2), json!(1)] },
    string_vs_number = { vec![json!("42")], vec![json!(42)] },
    extra_argument = { vec![json!(1)], vec![json!(1), json!(null)] },
    nested_value = { vec![json!({"a": [1]})], vec![json!({"a": [2]})] },
)]
fn different_arguments_produce_different_digests(left: Vec<Value>, right: Vec<Value>) {
    let d = digester();
    assert_ne!(d.digest_arguments(&left), d.digest_arguments(&right));
}

#[test]
fn different_class_produces_different_key() {
    let d = digester();
    let a = d.digest(&JobIdentity::new("Invoice", vec![json!(1)]));
    let b = d.digest(&JobIdentity::new("Receipt", vec![json!(1)]));
    assert_ne!(a.to_string(), b.to_string());
}

#[test]
fn no_collisions_over_a_hundred_thousand_inputs() {
    let d = digester();
    let mut seen = HashSet::with_capacity(100_000);
    for i in 0..100_000u64 {
        let args = [json!(i), json!({"tenant": i % 7})];
        assert!(seen.insert(d.digest_arguments(&args)), "collision at {i}");
    }
}

#[test]
fn full_sha256_is_sixty_four_hex_chars() {
    let d = KeyDigester::new("uniq", DigestMethod::Sha256);
    let digest = d.digest_arguments(&[json!(1)]);
    assert_eq!(digest.len(), 64);
    assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn custom_digest_receives_canonical_bytes() {
    let d = KeyDigester::new("p", DigestMethod::custom(|bytes| format!("len{}", bytes.len())));
    assert_eq!(d.digest_arguments(&[json!(12)]), "len4");
}

#[test]
fn digest_method_parses_from_name() {
    assert!(matches!(
        DigestMethod::try_from("sha256".to_string()),
        Ok(DigestMethod::Sha256)
    ));
    assert!(matches!(
        DigestMethod::try_from("sha256-128".to_string()),
        Ok(DigestMethod::TruncatedSha256)
    ));
    assert!(matches!(
        DigestMethod::try_from("md4".to_string()),
        Err(ConfigError::UnknownDigest(name)) if name == "md4"
    ));
}

use proptest::prelude::*;

fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        "[a-z]{0,6}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,4}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

proptest! {
    #[test]
    fn canonical_form_round_trips_to_an_equal_value(args in prop::collection::vec(arb_json(), 0..4)) {
        let canonical = canonical_arguments(&args);
        let parsed: Vec<Value> = serde_json::from_str(&canonical).unwrap();
        prop_assert_eq!(parsed, args);
    }

    #[test]
    fn digest_is_deterministic(args in prop::collection::vec(arb_json(), 0..4)) {
        let d = digester();
        prop_assert_eq!(d.digest_arguments(&args), d.digest_arguments(&args.clone()));
    }
}
