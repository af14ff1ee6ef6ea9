//! Merging of the project wizard file with local overrides.
//!
//! # Merge Rules
//!
//! - Mappings are merged recursively
//! - Sequences and scalars in the overlay replace the base
//! - Null values in the overlay delete the key from the base
//! - `steps` is merged by `id`: a local entry whose id exists in the base
//!   may change its `command` and `title`; other fields are ignored. Entries
//!   with new ids are appended.

use serde_yaml::{Mapping, Value};
use tracing::warn;

/// Fields a local override may change on an existing step.
const OVERRIDABLE_STEP_FIELDS: &[&str] = &["command", "title"];

/// Deep merge two YAML values; `overlay` wins at the point of conflict.
pub fn deep_merge(base: &Value, overlay: &Value) -> Value {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            let mut result = base_map.clone();

            for (key, overlay_value) in overlay_map {
                if overlay_value.is_null() {
                    result.remove(key);
                } else if let Some(base_value) = base_map.get(key) {
                    result.insert(key.clone(), deep_merge(base_value, overlay_value));
                } else {
                    result.insert(key.clone(), overlay_value.clone());
                }
            }

            Value::Mapping(result)
        }
        (_, overlay) => overlay.clone(),
    }
}

/// Merge a local override file into the project wizard file.
pub fn merge_wizard(project: &Value, local: &Value) -> Value {
    let Value::Mapping(local_map) = local else {
        return project.clone();
    };

    let mut rest = local_map.clone();
    let local_steps = rest.remove("steps");
    let mut merged = deep_merge(project, &Value::Mapping(rest));

    if let (Value::Mapping(root), Some(Value::Sequence(local_steps))) = (&mut merged, local_steps)
    {
        let mut steps = match root.get("steps") {
            Some(Value::Sequence(seq)) => seq.clone(),
            _ => Vec::new(),
        };
        for entry in local_steps {
            merge_step(&mut steps, entry);
        }
        root.insert(Value::from("steps"), Value::Sequence(steps));
    }

    merged
}

fn step_id(entry: &Value) -> Option<&str> {
    entry.get("id").and_then(Value::as_str)
}

fn merge_step(steps: &mut Vec<Value>, entry: Value) {
    let Some(id) = step_id(&entry).map(str::to_string) else {
        warn!("Ignoring local step override without an id");
        return;
    };

    let Some(pos) = steps.iter().position(|s| step_id(s) == Some(id.as_str())) else {
        steps.push(entry);
        return;
    };

    let (Value::Mapping(target), Value::Mapping(overlay)) = (&mut steps[pos], entry) else {
        return;
    };
    let mut allowed = Mapping::new();
    for (key, value) in overlay {
        match key.as_str() {
            Some("id") => {}
            Some(field) if OVERRIDABLE_STEP_FIELDS.contains(&field) => {
                allowed.insert(key, value);
            }
            Some(field) => warn!("Local override of '{}' on step '{}' ignored", field, id),
            None => {}
        }
    }
    let base = Value::Mapping(target.clone());
    if let Value::Mapping(updated) = deep_merge(&base, &Value::Mapping(allowed)) {
        *target = updated;
    }
}
