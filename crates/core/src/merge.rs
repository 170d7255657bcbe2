//! Deep-merge semantics used to compute a WRITE's after-image from the
//! caller-supplied patch.
//!
//! This is deliberately not RFC 7396 JSON Merge Patch: a `null` in the
//! patch overwrites the target field with `null` rather than deleting it.
//! Arrays replace wholesale; only plain objects merge key-by-key.

use serde_json::Value;

/// Recursively merge `source` onto `target`, returning a new value.
///
/// Rules, applied recursively:
/// - `source` is `null` → return `target` unchanged.
/// - `source` is not an object (array, string, number, bool) → return
///   `source` (arrays replace, they do not merge element-wise).
/// - `source` is an object → for each of its keys, recurse if both sides
///   are objects at that key, otherwise overwrite with `source`'s value.
///
/// `target` is never mutated in place; a new `Value` is always returned.
///
/// # Examples
///
/// ```
/// use ledgerdb_core::merge::deep_merge;
/// use serde_json::json;
///
/// let target = json!({"user": {"profile": {"name": "John", "age": 30}}});
/// let patch = json!({"user": {"profile": {"age": 31}, "preferences": {"lang": "en"}}});
/// let merged = deep_merge(&target, &patch);
/// assert_eq!(
///     merged,
///     json!({"user": {"profile": {"name": "John", "age": 31}, "preferences": {"lang": "en"}}})
/// );
/// ```
pub fn deep_merge(target: &Value, source: &Value) -> Value {
    if source.is_null() {
        return target.clone();
    }
    match (target, source) {
        (Value::Object(target_obj), Value::Object(source_obj)) => {
            let mut merged = target_obj.clone();
            for (key, source_value) in source_obj {
                match merged.get(key) {
                    Some(target_value) if target_value.is_object() && source_value.is_object() => {
                        let nested = deep_merge(target_value, source_value);
                        merged.insert(key.clone(), nested);
                    }
                    _ => {
                        merged.insert(key.clone(), source_value.clone());
                    }
                }
            }
            Value::Object(merged)
        }
        _ => source.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_patch_is_noop() {
        let target = json!({"a": 1});
        assert_eq!(deep_merge(&target, &Value::Null), target);
    }

    #[test]
    fn null_field_overwrites_not_deletes() {
        let target = json!({"a": 1, "b": 2});
        let source = json!({"b": null});
        assert_eq!(deep_merge(&target, &source), json!({"a": 1, "b": null}));
    }

    #[test]
    fn array_patch_replaces_wholesale() {
        let target = json!({"a": 1});
        let source = json!([1, 2, 3]);
        assert_eq!(deep_merge(&target, &source), json!([1, 2, 3]));
    }

    #[test]
    fn disjoint_fields_coexist() {
        let target = json!({"f0": "v0"});
        let source = json!({"f1": "v1"});
        assert_eq!(deep_merge(&target, &source), json!({"f0": "v0", "f1": "v1"}));
    }

    #[test]
    fn nested_objects_merge_preserving_siblings() {
        let target = json!({"user": {"profile": {"name": "John", "age": 30}}});
        let source =
            json!({"user": {"profile": {"age": 31}, "preferences": {"lang": "en"}}});
        let merged = deep_merge(&target, &source);
        assert_eq!(
            merged,
            json!({
                "user": {
                    "profile": {"name": "John", "age": 31},
                    "preferences": {"lang": "en"}
                }
            })
        );
    }

    #[test]
    fn target_not_mutated() {
        let target = json!({"a": {"b": 1}});
        let snapshot = target.clone();
        let _ = deep_merge(&target, &json!({"a": {"b": 2}}));
        assert_eq!(target, snapshot);
    }

    proptest::proptest! {
        #[test]
        fn merge_with_null_is_identity(a in proptest::arbitrary::any::<u64>()) {
            let target = json!({"n": a});
            let merged = deep_merge(&target, &Value::Null);
            proptest::prop_assert_eq!(merged, target);
        }
    }
}
