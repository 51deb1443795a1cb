//! UI specifications as supplied by the external generator

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::error::SpecError;
use crate::node::{ComponentNode, NodeDecoder, Props, ToolInvocation, json_kind};

/// A complete specification for one window
///
/// Owned by the generator; the runtime only ever reads it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UiSpec {
    pub title: String,
    pub layout: String,
    pub components: Vec<ComponentNode>,
    #[serde(skip_serializing_if = "Props::is_empty")]
    pub style: Props,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<String>,
    /// Hook name (e.g. `on_mount`) to the invocations it triggers
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub lifecycle_hooks: BTreeMap<String, Vec<ToolInvocation>>,
}

impl Default for UiSpec {
    fn default() -> Self {
        Self {
            title: "Untitled".to_string(),
            layout: "vertical".to_string(),
            components: Vec::new(),
            style: Props::new(),
            services: Vec::new(),
            lifecycle_hooks: BTreeMap::new(),
        }
    }
}

impl UiSpec {
    pub fn new(layout: impl Into<String>, components: Vec<ComponentNode>) -> Self {
        Self {
            layout: layout.into(),
            components,
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_hook(mut self, hook: impl Into<String>, invocation: ToolInvocation) -> Self {
        self.lifecycle_hooks.entry(hook.into()).or_default().push(invocation);
        self
    }

    /// Parse a JSON document
    pub fn from_json_str(json: &str) -> Result<Self, SpecError> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| SpecError::InvalidJson(e.to_string()))?;
        Self::from_value(&value)
    }

    /// Decode from an already-parsed value
    ///
    /// Only the root must be an object; every node below it is decoded
    /// independently.
    pub fn from_value(value: &Value) -> Result<Self, SpecError> {
        let obj = value.as_object().ok_or_else(|| {
            SpecError::Malformed(format!("spec root must be an object, got {}", json_kind(value)))
        })?;

        let mut decoder = NodeDecoder::new();
        let components = decoder.decode_list(obj.get("components"));

        let title = obj
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or("Untitled")
            .to_string();
        let layout = obj
            .get("layout")
            .and_then(Value::as_str)
            .unwrap_or("vertical")
            .to_string();
        let style = obj
            .get("style")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let services = obj
            .get("services")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let lifecycle_hooks = obj
            .get("lifecycle_hooks")
            .or_else(|| obj.get("lifecycleHooks"))
            .map(decode_hooks)
            .unwrap_or_default();

        Ok(Self {
            title,
            layout,
            components,
            style,
            services,
            lifecycle_hooks,
        })
    }

    /// Depth-first search across all roots
    pub fn find(&self, id: &str) -> Option<&ComponentNode> {
        self.components.iter().find_map(|root| root.find(id))
    }

    /// Total number of nodes in the tree
    pub fn node_count(&self) -> usize {
        self.components.iter().map(ComponentNode::subtree_len).sum()
    }

    pub fn hooks(&self, hook: &str) -> &[ToolInvocation] {
        self.lifecycle_hooks
            .get(hook)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Hooks accept a single binding or a list of bindings per hook name
pub(crate) fn decode_hooks(value: &Value) -> BTreeMap<String, Vec<ToolInvocation>> {
    let mut hooks = BTreeMap::new();
    let Some(obj) = value.as_object() else {
        return hooks;
    };

    for (hook, entry) in obj {
        let bindings: Vec<&Value> = match entry {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };
        let decoded = bindings
            .into_iter()
            .filter_map(|binding| match ToolInvocation::from_value(binding) {
                Ok(invocation) => Some(invocation),
                Err(e) => {
                    tracing::warn!(hook = %hook, error = %e, "Dropping lifecycle binding");
                    None
                }
            })
            .collect();
        hooks.insert(hook.clone(), decoded);
    }

    hooks
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CALCULATOR: &str = r#"{
        "type": "app",
        "title": "Calculator",
        "layout": "vertical",
        "components": [
            {"type": "input", "id": "display", "props": {"readonly": true, "value": "0"}},
            {"type": "grid", "id": "keys", "props": {"columns": 4}, "children": [
                {"type": "button", "id": "btn-7", "props": {"text": "7"}, "on_event": {"click": "ui.append"}},
                {"type": "button", "id": "btn-eq", "props": {"text": "="}, "on_event": {"click": "ui.compute"}}
            ]}
        ],
        "lifecycle_hooks": {"on_mount": "ui.clear"}
    }"#;

    #[test]
    fn test_parse_calculator() {
        let spec = UiSpec::from_json_str(CALCULATOR).unwrap();
        assert_eq!(spec.title, "Calculator");
        assert_eq!(spec.layout, "vertical");
        assert_eq!(spec.components.len(), 2);
        assert_eq!(spec.node_count(), 4);
        assert_eq!(spec.find("btn-eq").unwrap().on_event["click"].tool_id, "ui.compute");
        assert_eq!(spec.hooks("on_mount").len(), 1);
        assert!(spec.hooks("on_unmount").is_empty());
    }

    #[test]
    fn test_defaults_for_missing_fields() {
        let spec = UiSpec::from_value(&json!({})).unwrap();
        assert_eq!(spec.title, "Untitled");
        assert_eq!(spec.layout, "vertical");
        assert!(spec.components.is_empty());
    }

    #[test]
    fn test_root_must_be_object() {
        assert!(matches!(
            UiSpec::from_value(&json!([1, 2])),
            Err(SpecError::Malformed(_))
        ));
        assert!(matches!(
            UiSpec::from_json_str("{not json"),
            Err(SpecError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_hook_lists() {
        let hooks = decode_hooks(&json!({
            "on_mount": ["storage.get", {"toolId": "ui.set", "params": {"key": "ready", "value": true}}],
            "on_focus": 12
        }));
        assert_eq!(hooks["on_mount"].len(), 2);
        assert!(hooks["on_focus"].is_empty());
    }
}
