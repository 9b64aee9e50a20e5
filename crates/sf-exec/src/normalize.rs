//! Flatten per-node execution output into one field namespace.
//!
//! A workflow yields `{nodeId: {outputData: {...}, ...}, ...}`; consumers want
//! `{field: value, ...}` regardless of which node produced the field.

use serde_json::{Map, Value};
use tracing::warn;

pub const OUTPUT_DATA_KEY: &str = "outputData";

/// Flattened result plus merge diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizeReport {
    pub result: Value,
    /// Nodes whose `outputData` was merged. Zero means the input was returned as is.
    pub merged_nodes: usize,
    /// Fields written by more than one node, whether or not the values agree.
    pub collisions: Vec<String>,
}

/// Flatten `raw`. See [`normalize_with_report`].
pub fn normalize(raw: Value) -> Value {
    normalize_with_report(raw).result
}

/// Flatten `raw`, reporting collisions.
///
/// - Non-objects pass through unchanged.
/// - Every top-level value carrying an `outputData` object has that object's
///   keys merged into one map; on collision the later node wins.
/// - An object with no such value is already flat and is returned unchanged.
pub fn normalize_with_report(raw: Value) -> NormalizeReport {
    let Value::Object(nodes) = raw else {
        return unchanged(raw);
    };

    if !nodes.values().any(|v| output_data(v).is_some()) {
        return unchanged(Value::Object(nodes));
    }

    let mut flat = Map::new();
    let mut merged_nodes = 0;
    let mut collisions = Vec::new();

    for (node_id, node) in &nodes {
        let Some(fields) = output_data(node) else {
            continue;
        };
        merged_nodes += 1;
        for (field, value) in fields {
            if flat.insert(field.clone(), value.clone()).is_some() {
                warn!(
                    field = field.as_str(),
                    node_id = node_id.as_str(),
                    "output field produced by several nodes; keeping the last value"
                );
                if !collisions.contains(field) {
                    collisions.push(field.clone());
                }
            }
        }
    }

    NormalizeReport {
        result: Value::Object(flat),
        merged_nodes,
        collisions,
    }
}

fn output_data(node: &Value) -> Option<&Map<String, Value>> {
    node.get(OUTPUT_DATA_KEY).and_then(Value::as_object)
}

fn unchanged(raw: Value) -> NormalizeReport {
    NormalizeReport {
        result: raw,
        merged_nodes: 0,
        collisions: Vec::new(),
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn flat_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<i64>().prop_map(Value::from),
            any::<bool>().prop_map(Value::from),
            "[a-z ]{0,8}".prop_map(Value::from),
            ("[a-z]{1,4}", any::<i32>()).prop_map(|(k, v)| {
                let mut map = Map::new();
                map.insert(k, Value::from(v));
                Value::Object(map)
            }),
        ]
    }

    proptest! {
        #[test]
        fn flat_objects_are_a_fixed_point(
            entries in prop::collection::btree_map("[a-z]{1,6}", flat_value(), 0..8)
        ) {
            let raw: Map<String, Value> = entries.into_iter().collect();
            let raw = Value::Object(raw);
            prop_assert_eq!(normalize(raw.clone()), raw);
        }
    }
}
