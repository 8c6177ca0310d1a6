use proptest::prelude::*;
use serde_json::{json, Value};
use soroban_sandbox_mock::storage::StorageHelper;
use stellar_xdr::curr::ScVal;

proptest! {
    #[test]
    fn test_json_integers_become_i64(n in any::<i64>()) {
        let value = StorageHelper::json_to_scval(&Value::from(n)).unwrap();
        prop_assert_eq!(value, ScVal::I64(n));
    }

    #[test]
    fn test_short_identifiers_become_symbols(name in "[a-z_][a-z0-9_]{0,31}") {
        let value = StorageHelper::json_to_scval(&Value::String(name.clone())).unwrap();
        prop_assert!(matches!(value, ScVal::Symbol(_)));
        prop_assert_eq!(StorageHelper::scval_to_json(&value), Value::String(name));
    }

    #[test]
    fn test_text_with_spaces_stays_a_string(a in "[a-z]{1,8}", b in "[a-z]{1,8}") {
        let text = format!("{a} {b}");
        let value = StorageHelper::json_to_scval(&json!(text)).unwrap();
        prop_assert!(matches!(value, ScVal::String(_)));
    }

    #[test]
    fn test_object_keys_are_sorted(keys in proptest::collection::btree_set("[a-z]{1,6}", 1..8)) {
        let object: serde_json::Map<String, Value> =
            keys.iter().rev().map(|k| (k.clone(), json!(1))).collect();
        let ScVal::Map(Some(map)) = StorageHelper::json_to_scval(&Value::Object(object)).unwrap() else {
            panic!("expected a map");
        };
        let sorted = map.0.windows(2).all(|pair| pair[0].key < pair[1].key);
        prop_assert!(sorted);
        prop_assert_eq!(map.0.len(), keys.len());
    }
}
