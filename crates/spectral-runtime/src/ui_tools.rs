//! Built-in `ui.*` tools
//!
//! These run in-process against the window's [`StateStore`] and complete
//! synchronously, in the order the interactions arrive. Everything outside
//! the `ui.` namespace goes to the transport.

use serde_json::{Value, json};
use spectral_core::{Props, ToolError, ToolInvocation};

use crate::expr;
use crate::state::StateStore;

/// Key used by the display-style tools when none is given
pub const DEFAULT_DISPLAY_KEY: &str = "display";

/// List key used by the `ui.list.*` tools when none is given
pub const DEFAULT_LIST_KEY: &str = "items";

const NOT_FOUND: &str = "NOT_FOUND";

/// One local tool call with the context of the component that fired it
#[derive(Debug, Clone, Copy)]
pub struct LocalCall<'a> {
    pub invocation: &'a ToolInvocation,
    pub component_id: &'a str,
    pub component_props: &'a Props,
    pub payload: Option<&'a Value>,
}

/// True when the tool id is handled here rather than by the transport
pub fn is_local(tool_id: &str) -> bool {
    tool_id.starts_with("ui.")
}

/// Run a local tool; returns the value it wrote or read
pub fn apply(state: &StateStore, call: &LocalCall<'_>) -> Result<Value, ToolError> {
    let tool_id = call.invocation.tool_id.as_str();
    let params = &call.invocation.params;

    match tool_id {
        "ui.set" => {
            let key = key_or(params, call.component_id);
            let value = params
                .get("value")
                .or(call.payload)
                .cloned()
                .unwrap_or(Value::Null);
            state.set(key, value.clone());
            Ok(value)
        }
        "ui.get" => {
            let key = key_or(params, call.component_id);
            Ok(state.get_or(&key, Value::Null))
        }
        "ui.append" => {
            let key = key_or(params, DEFAULT_DISPLAY_KEY);
            let Some(suffix) = params
                .get("value")
                .or_else(|| call.component_props.get("text"))
                .or_else(|| call.component_props.get("label"))
                .or(call.payload)
                .map(display_string)
            else {
                return Err(ToolError::invalid_params(tool_id, "nothing to append"));
            };

            let current = display_string(&state.get_or(&key, Value::Null));
            let next = if (current == "0" && suffix != ".") || current == "Error" {
                suffix
            } else {
                current + &suffix
            };
            state.set(key, Value::String(next.clone()));
            Ok(Value::String(next))
        }
        "ui.clear" => {
            let key = key_or(params, DEFAULT_DISPLAY_KEY);
            let reset = params.get("default").cloned().unwrap_or_else(|| json!("0"));
            state.set(key, reset.clone());
            Ok(reset)
        }
        "ui.backspace" => {
            let key = key_or(params, DEFAULT_DISPLAY_KEY);
            let mut current = display_string(&state.get_or(&key, Value::Null));
            current.pop();
            if current.is_empty() || current == "-" {
                current = "0".to_string();
            }
            state.set(key, Value::String(current.clone()));
            Ok(Value::String(current))
        }
        "ui.toggle" => {
            let key = key_or(params, call.component_id);
            let next = !state.get(&key).and_then(|v| v.as_bool()).unwrap_or(false);
            state.set(key, Value::Bool(next));
            Ok(Value::Bool(next))
        }
        "ui.compute" => {
            let key = key_or(params, DEFAULT_DISPLAY_KEY);
            let source = match params.get("expression") {
                Some(expression) => display_string(expression),
                None => display_string(&state.get_or(&key, Value::Null)),
            };
            let result = match expr::evaluate(&source) {
                Ok(value) => expr::format_number(value),
                Err(e) => {
                    tracing::debug!(expression = %source, error = %e, "Expression failed");
                    "Error".to_string()
                }
            };
            state.set(key, Value::String(result.clone()));
            Ok(Value::String(result))
        }
        "ui.list.add" => {
            let list_key = list_key(params);
            let item = params
                .get("item")
                .or_else(|| params.get("value"))
                .or(call.payload)
                .cloned()
                .unwrap_or(Value::Null);
            if item.is_null() || item.as_str().is_some_and(|s| s.trim().is_empty()) {
                return Err(ToolError::invalid_params(tool_id, "item must not be empty"));
            }

            let counter_key = format!("{list_key}:next_id");
            let next_id = state.get(&counter_key).and_then(|v| v.as_u64()).unwrap_or(1);
            let Some(following) = next_id.checked_add(1) else {
                return Err(ToolError::invalid_params(tool_id, "item id counter exhausted"));
            };
            state.set(counter_key, json!(following));

            let entry = json!({ "id": format!("item-{next_id}"), "value": item, "done": false });
            let mut items = list_items(state, &list_key);
            items.push(entry.clone());
            state.set(list_key, Value::Array(items));
            Ok(entry)
        }
        "ui.list.remove" => {
            let list_key = list_key(params);
            let mut items = list_items(state, &list_key);
            let index = find_item(&items, params).ok_or_else(|| item_not_found(tool_id, params))?;
            let removed = items.remove(index);
            state.set(list_key, Value::Array(items));
            Ok(removed)
        }
        "ui.list.toggle" => {
            let list_key = list_key(params);
            let mut items = list_items(state, &list_key);
            let index = find_item(&items, params).ok_or_else(|| item_not_found(tool_id, params))?;
            let entry = &mut items[index];
            let done = !entry.get("done").and_then(Value::as_bool).unwrap_or(false);
            if let Value::Object(fields) = entry {
                fields.insert("done".to_string(), Value::Bool(done));
            }
            let toggled = entry.clone();
            state.set(list_key, Value::Array(items));
            Ok(toggled)
        }
        "ui.list.clear" => {
            state.set(list_key(params), Value::Array(Vec::new()));
            Ok(Value::Null)
        }
        _ => Err(ToolError::unknown_tool(tool_id)),
    }
}

fn key_or(params: &Props, fallback: &str) -> String {
    params
        .get("key")
        .and_then(Value::as_str)
        .filter(|k| !k.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

fn list_key(params: &Props) -> String {
    params
        .get("list_id")
        .or_else(|| params.get("listId"))
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_LIST_KEY)
        .to_string()
}

fn list_items(state: &StateStore, list_key: &str) -> Vec<Value> {
    match state.get(list_key) {
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

/// Match by `item_id` against entry ids, or treat a number as an index
fn find_item(items: &[Value], params: &Props) -> Option<usize> {
    match params.get("item_id").or_else(|| params.get("itemId"))? {
        Value::String(id) => items
            .iter()
            .position(|item| item.get("id").and_then(Value::as_str) == Some(id.as_str())),
        Value::Number(n) => n.as_u64().map(|i| i as usize).filter(|i| *i < items.len()),
        _ => None,
    }
}

fn item_not_found(tool_id: &str, params: &Props) -> ToolError {
    let wanted = params
        .get("item_id")
        .or_else(|| params.get("itemId"))
        .map(display_string)
        .unwrap_or_default();
    ToolError::execution(tool_id, NOT_FOUND, format!("no list item '{wanted}'"))
}

fn display_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
