//! Result wrapping and small shared helpers.

use std::sync::Arc;

use heck::{ToLowerCamelCase, ToSnakeCase};
use serde_json::Value;

/// Post-processing function applied to a result before table rendering.
pub type TableTransformer = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// The wrapped outcome of one command invocation, handed to the output
/// producer.
#[derive(Clone)]
pub struct CommandResultItem {
    pub result: Value,
    pub table_transformer: Option<TableTransformer>,
    pub is_query_active: bool,
}

impl CommandResultItem {
    pub fn new(result: Value) -> Self {
        CommandResultItem {
            result,
            table_transformer: None,
            is_query_active: false,
        }
    }
}

impl std::fmt::Debug for CommandResultItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandResultItem")
            .field("result", &self.result)
            .field("is_query_active", &self.is_query_active)
            .field("has_table_transformer", &self.table_transformer.is_some())
            .finish()
    }
}

pub fn to_camel_case(s: &str) -> String {
    s.to_lower_camel_case()
}

pub fn to_snake_case(s: &str) -> String {
    s.to_snake_case()
}

/// Convert a handler result into a plain nested mapping/sequence structure
/// for the output formatter. Keys with the reserved `_` prefix are dropped;
/// when `camel_case_keys` is set, snake_case map keys are renamed for
/// display. The input is never mutated, and converting the same value twice
/// yields identical output.
pub fn wrap_result(value: &Value, camel_case_keys: bool) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, inner) in map {
                if key.starts_with('_') {
                    continue;
                }
                let key = if camel_case_keys {
                    to_camel_case(key)
                } else {
                    key.clone()
                };
                out.insert(key, wrap_result(inner, camel_case_keys));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| wrap_result(item, camel_case_keys))
                .collect(),
        ),
        other => other.clone(),
    }
}
