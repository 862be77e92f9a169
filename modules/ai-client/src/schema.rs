use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Types that can be requested as structured LLM output.
pub trait StructuredOutput: JsonSchema + DeserializeOwned {}

impl<T: JsonSchema + DeserializeOwned> StructuredOutput for T {}

/// JSON schema for `T` in the strict form structured-output endpoints accept:
/// references inlined, every object closed, every property required.
pub fn output_schema<T: StructuredOutput>() -> Value {
    let mut root = serde_json::to_value(schema_for!(T)).unwrap_or_default();

    let definitions = root
        .as_object_mut()
        .and_then(|map| {
            map.remove("$schema");
            map.remove("definitions")
        })
        .unwrap_or(Value::Object(Map::new()));

    normalize(&mut root, &definitions);
    root
}

fn normalize(value: &mut Value, definitions: &Value) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(path)) = map.get("$ref") {
                let name = path.trim_start_matches("#/definitions/");
                if let Some(def) = definitions.get(name) {
                    *value = def.clone();
                    normalize(value, definitions);
                    return;
                }
            }

            // schemars wraps documented refs as a single-element allOf
            if let Some(Value::Array(all_of)) = map.get("allOf") {
                if let [only] = all_of.as_slice() {
                    *value = only.clone();
                    normalize(value, definitions);
                    return;
                }
            }

            if map.get("type").and_then(Value::as_str) == Some("object") {
                map.insert("additionalProperties".to_string(), Value::Bool(false));
                if let Some(Value::Object(props)) = map.get("properties") {
                    let required = props.keys().cloned().map(Value::String).collect();
                    map.insert("required".to_string(), Value::Array(required));
                }
            }

            for child in map.values_mut() {
                normalize(child, definitions);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                normalize(item, definitions);
            }
        }
        _ => {}
    }
}
