//! Live parameter values of a simulation.
//!
//! Every producer (direct edits, chat actions, history and scenario loads)
//! writes through [`ParameterStore::apply`]; the last writer wins.

use serde_json::Value;
use sf_core::{ParameterValues, coerce_bool, coerce_number, number_value};
use sf_project::{ControlKind, ParameterDef, Simulation};
use tracing::debug;

use crate::error::{AppError, AppResult};

/// Whole- or partial-map replacement.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterPatch {
    /// Overwrite the listed ids, keep every other value.
    Merge(ParameterValues),
    /// Replace the whole map.
    Replace(ParameterValues),
}

/// What to do with a numeric value outside its control's bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundsPolicy {
    Reject,
    Clamp,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterStore {
    values: ParameterValues,
}

impl ParameterStore {
    pub fn new(values: ParameterValues) -> Self {
        Self { values }
    }

    /// Start from every parameter's default value.
    pub fn from_defaults(simulation: &Simulation) -> Self {
        Self::new(simulation.default_values())
    }

    pub fn values(&self) -> &ParameterValues {
        &self.values
    }

    pub fn snapshot(&self) -> ParameterValues {
        self.values.clone()
    }

    pub fn get(&self, id: &str) -> Option<&Value> {
        self.values.get(id)
    }

    pub fn apply(&mut self, patch: ParameterPatch) {
        match patch {
            ParameterPatch::Merge(values) => {
                debug!(count = values.len(), "merging parameter values");
                self.values.extend(values);
            }
            ParameterPatch::Replace(values) => {
                debug!(count = values.len(), "replacing parameter values");
                self.values = values;
            }
        }
    }
}

/// Patch that restores `snapshot` onto the live simulation id by id.
///
/// Ids the simulation no longer defines are ignored; live ids missing from
/// the snapshot are left out of the patch and keep their current value.
pub fn restore_patch(simulation: &Simulation, snapshot: &ParameterValues) -> ParameterPatch {
    let restored: ParameterValues = simulation
        .parameters
        .iter()
        .filter_map(|p| snapshot.get(&p.id).map(|v| (p.id.clone(), v.clone())))
        .collect();
    ParameterPatch::Merge(restored)
}

/// Check `value` against the parameter's control and return the value to store.
///
/// Numeric controls accept numeric strings. Out-of-range numbers are rejected
/// or clamped according to `policy`.
pub fn check_value(def: &ParameterDef, value: &Value, policy: BoundsPolicy) -> AppResult<Value> {
    let invalid = |reason: String| AppError::InvalidParameterValue {
        parameter: def.id.clone(),
        reason,
    };

    match &def.control {
        ControlKind::Slider { .. } | ControlKind::Number { .. } => {
            let mut number = coerce_number(&def.id, value).map_err(|e| invalid(e.to_string()))?;
            let (min, max) = def.control.bounds();
            let below = min.filter(|min| number < *min);
            let above = max.filter(|max| number > *max);

            if let Some(bound) = below.or(above) {
                match policy {
                    BoundsPolicy::Reject => {
                        return Err(invalid(format!(
                            "{} is outside [{}, {}]",
                            number,
                            min.map(|v| v.to_string()).unwrap_or_else(|| "-inf".to_string()),
                            max.map(|v| v.to_string()).unwrap_or_else(|| "inf".to_string()),
                        )));
                    }
                    BoundsPolicy::Clamp => number = bound,
                }
            }

            // Keep integral numbers integral on the wire.
            if value.is_number() && number == value.as_f64().unwrap_or(f64::NAN) {
                return Ok(value.clone());
            }
            number_value(&def.id, number).map_err(|e| invalid(e.to_string()))
        }
        ControlKind::Toggle => coerce_bool(&def.id, value)
            .map(Value::Bool)
            .map_err(|e| invalid(e.to_string())),
        ControlKind::Select { options } => {
            let choice = value
                .as_str()
                .ok_or_else(|| invalid("select values must be strings".to_string()))?;
            options
                .iter()
                .find(|o| o.as_str() == choice)
                .or_else(|| options.iter().find(|o| o.eq_ignore_ascii_case(choice)))
                .map(|o| Value::String(o.clone()))
                .ok_or_else(|| invalid(format!("'{}' is not one of {:?}", choice, options)))
        }
        ControlKind::Text => match value {
            Value::String(_) => Ok(value.clone()),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            _ => Err(invalid("text values must be scalars".to_string())),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sf_project::demo_simulation;

    fn def(control: ControlKind) -> ParameterDef {
        ParameterDef {
            id: "p".to_string(),
            bound_node_id: "n".to_string(),
            variable_name: "p".to_string(),
            label: String::new(),
            control,
            default_value: json!(0),
            group: None,
            order: 0,
            unit: None,
        }
    }

    #[test]
    fn merge_keeps_unlisted_values() {
        let mut store = ParameterStore::from_defaults(&demo_simulation());
        let mut patch = ParameterValues::new();
        patch.insert("price".to_string(), json!(120));
        store.apply(ParameterPatch::Merge(patch));

        assert_eq!(store.get("price"), Some(&json!(120)));
        assert_eq!(store.get("volume"), Some(&json!(1000)));
    }

    #[test]
    fn replace_drops_unlisted_values() {
        let mut store = ParameterStore::from_defaults(&demo_simulation());
        let mut values = ParameterValues::new();
        values.insert("price".to_string(), json!(5));
        store.apply(ParameterPatch::Replace(values.clone()));
        assert_eq!(store.values(), &values);
    }

    #[test]
    fn restore_patch_ignores_unknown_and_missing_ids() {
        let simulation = demo_simulation();
        let mut snapshot = ParameterValues::new();
        snapshot.insert("price".to_string(), json!(150));
        snapshot.insert("retired".to_string(), json!(1));

        let ParameterPatch::Merge(values) = restore_patch(&simulation, &snapshot) else {
            panic!("restore must merge");
        };
        assert_eq!(values.len(), 1);
        assert_eq!(values["price"], json!(150));
    }

    #[test]
    fn slider_rejects_or_clamps_out_of_range() {
        let slider = def(ControlKind::Slider {
            min: 0.0,
            max: 100.0,
            step: 1.0,
        });
        assert!(check_value(&slider, &json!(150), BoundsPolicy::Reject).is_err());
        assert_eq!(
            check_value(&slider, &json!(150), BoundsPolicy::Clamp).unwrap(),
            json!(100.0)
        );
        assert_eq!(
            check_value(&slider, &json!("42"), BoundsPolicy::Reject).unwrap(),
            json!(42.0)
        );
        assert_eq!(
            check_value(&slider, &json!(42), BoundsPolicy::Reject).unwrap(),
            json!(42)
        );
    }

    #[test]
    fn select_matches_case_insensitively() {
        let select = def(ControlKind::Select {
            options: vec!["Europe".to_string(), "Asia".to_string()],
        });
        assert_eq!(
            check_value(&select, &json!("europe"), BoundsPolicy::Reject).unwrap(),
            json!("Europe")
        );
        assert!(check_value(&select, &json!("Mars"), BoundsPolicy::Reject).is_err());
    }

    #[test]
    fn toggle_and_text_coercions() {
        let toggle = def(ControlKind::Toggle);
        assert_eq!(
            check_value(&toggle, &json!("true"), BoundsPolicy::Reject).unwrap(),
            json!(true)
        );
        let text = def(ControlKind::Text);
        assert_eq!(
            check_value(&text, &json!(7), BoundsPolicy::Reject).unwrap(),
            json!("7")
        );
        assert!(check_value(&text, &json!([1]), BoundsPolicy::Reject).is_err());
    }
}
