//! Component nodes and tool invocations
//!
//! A [`ComponentNode`] is immutable once handed to a render pass. Nodes are
//! built by [`NodeDecoder`], which never fails as a whole: entries it cannot
//! make sense of become nodes carrying a [`SpecError`] in `defect`.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::SpecError;

/// Opaque property map, not interpreted by the core
pub type Props = Map<String, Value>;

/// One remote (or local `ui.*`) call described by a spec
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocation {
    pub tool_id: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub params: Props,
    /// Overrides the dispatcher's bound app id for this call only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
}

impl ToolInvocation {
    pub fn new(tool_id: impl Into<String>) -> Self {
        Self {
            tool_id: tool_id.into(),
            params: Props::new(),
            app_id: None,
        }
    }

    pub fn with_params(mut self, params: Props) -> Self {
        self.params = params;
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    /// Decode a binding in either the shorthand (`"ui.append"`) or the
    /// object form (`{"toolId": ..., "params": {...}, "appId": ...}`).
    pub fn from_value(value: &Value) -> Result<Self, SpecError> {
        match value {
            Value::String(tool_id) if !tool_id.trim().is_empty() => Ok(Self::new(tool_id.trim())),
            Value::String(_) => Err(SpecError::Malformed("empty tool id".to_string())),
            Value::Object(obj) => {
                let tool_id = obj
                    .get("toolId")
                    .or_else(|| obj.get("tool_id"))
                    .or_else(|| obj.get("tool"))
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .ok_or_else(|| SpecError::Malformed("binding without toolId".to_string()))?;

                let params = match obj.get("params") {
                    None | Some(Value::Null) => Props::new(),
                    Some(Value::Object(params)) => params.clone(),
                    Some(_) => {
                        return Err(SpecError::Malformed(format!(
                            "params of '{tool_id}' must be an object"
                        )));
                    }
                };

                let app_id = obj
                    .get("appId")
                    .or_else(|| obj.get("app_id"))
                    .and_then(Value::as_str)
                    .map(str::to_string);

                Ok(Self {
                    tool_id: tool_id.to_string(),
                    params,
                    app_id,
                })
            }
            other => Err(SpecError::Malformed(format!(
                "binding must be a string or object, got {}",
                json_kind(other)
            ))),
        }
    }
}

/// One element of a specification tree
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentNode {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub props: Props,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ComponentNode>,
    #[serde(rename = "on_event", skip_serializing_if = "BTreeMap::is_empty")]
    pub on_event: BTreeMap<String, ToolInvocation>,
    /// Set when the source entry could not be decoded
    #[serde(skip)]
    pub defect: Option<SpecError>,
    /// Event bindings dropped while decoding: event name → reason
    #[serde(skip)]
    pub rejected_bindings: BTreeMap<String, String>,
}

impl ComponentNode {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            props: Props::new(),
            children: Vec::new(),
            on_event: BTreeMap::new(),
            defect: None,
            rejected_bindings: BTreeMap::new(),
        }
    }

    pub fn with_prop(mut self, key: impl Into<String>, value: Value) -> Self {
        self.props.insert(key.into(), value);
        self
    }

    pub fn with_child(mut self, child: ComponentNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = ComponentNode>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn with_event(mut self, event: impl Into<String>, invocation: ToolInvocation) -> Self {
        self.on_event.insert(event.into(), invocation);
        self
    }

    /// A node standing in for an entry that failed to decode
    pub fn malformed(id: impl Into<String>, error: SpecError) -> Self {
        let mut node = Self::new(id, "");
        node.defect = Some(error);
        node
    }

    /// String prop lookup
    pub fn prop_str(&self, key: &str) -> Option<&str> {
        self.props.get(key).and_then(Value::as_str)
    }

    /// Numeric prop lookup, accepting integers and floats
    pub fn prop_f64(&self, key: &str) -> Option<f64> {
        self.props.get(key).and_then(Value::as_f64)
    }

    /// Depth-first search for a node by id
    pub fn find(&self, id: &str) -> Option<&ComponentNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    /// Number of nodes in this subtree, including self
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(ComponentNode::subtree_len).sum::<usize>()
    }
}

/// Node-by-node decoder for untrusted JSON
///
/// Ids missing from the source are assigned `"{type}-{n}"` using a counter
/// that is local to one decode.
#[derive(Debug, Default)]
pub struct NodeDecoder {
    next_auto_id: usize,
}

impl NodeDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn auto_id(&mut self, prefix: &str) -> String {
        let id = format!("{}-{}", prefix, self.next_auto_id);
        self.next_auto_id += 1;
        id
    }

    /// Decode an optional JSON array of nodes
    ///
    /// A present value that is not an array yields a single malformed node.
    pub fn decode_list(&mut self, value: Option<&Value>) -> Vec<ComponentNode> {
        match value {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.iter().map(|item| self.decode(item)).collect(),
            Some(other) => {
                let id = self.auto_id("invalid");
                vec![ComponentNode::malformed(
                    id,
                    SpecError::Malformed(format!(
                        "children must be an array, got {}",
                        json_kind(other)
                    )),
                )]
            }
        }
    }

    /// Decode a single node
    pub fn decode(&mut self, value: &Value) -> ComponentNode {
        match value {
            Value::String(text) => {
                let id = self.auto_id("text");
                ComponentNode::new(id, "text").with_prop("content", Value::String(text.clone()))
            }
            Value::Object(obj) => self.decode_object(obj),
            other => {
                let id = self.auto_id("invalid");
                ComponentNode::malformed(
                    id,
                    SpecError::Malformed(format!("expected an object, got {}", json_kind(other))),
                )
            }
        }
    }

    fn decode_object(&mut self, obj: &Map<String, Value>) -> ComponentNode {
        let kind = match obj.get("type") {
            None | Some(Value::Null) => "container".to_string(),
            Some(Value::String(kind)) => kind.trim().to_string(),
            Some(other) => {
                let id = self.explicit_id(obj).unwrap_or_else(|| self.auto_id("invalid"));
                return ComponentNode::malformed(
                    id,
                    SpecError::Malformed(format!(
                        "type must be a string, got {}",
                        json_kind(other)
                    )),
                );
            }
        };

        let id = match self.explicit_id(obj) {
            Some(id) => id,
            None => {
                let prefix = if kind.is_empty() { "node" } else { kind.as_str() }.to_string();
                self.auto_id(&prefix)
            }
        };

        let props = match obj.get("props") {
            None | Some(Value::Null) => Props::new(),
            Some(Value::Object(props)) => props.clone(),
            Some(other) => {
                return ComponentNode::malformed(
                    id,
                    SpecError::Malformed(format!(
                        "props must be an object, got {}",
                        json_kind(other)
                    )),
                );
            }
        };

        let mut on_event = BTreeMap::new();
        let mut rejected_bindings = BTreeMap::new();
        match obj.get("on_event").or_else(|| obj.get("onEvent")) {
            None | Some(Value::Null) => {}
            Some(Value::Object(bindings)) => {
                for (event, binding) in bindings {
                    match ToolInvocation::from_value(binding) {
                        Ok(invocation) => {
                            on_event.insert(event.clone(), invocation);
                        }
                        Err(e) => {
                            tracing::warn!(
                                component_id = %id,
                                event = %event,
                                error = %e,
                                "Dropping event binding"
                            );
                            rejected_bindings.insert(event.clone(), e.to_string());
                        }
                    }
                }
            }
            Some(other) => {
                tracing::warn!(
                    component_id = %id,
                    found = json_kind(other),
                    "Ignoring on_event that is not an object"
                );
                rejected_bindings.insert(
                    "*".to_string(),
                    format!("on_event must be an object, got {}", json_kind(other)),
                );
            }
        }

        let children = self.decode_list(obj.get("children"));

        ComponentNode {
            id,
            kind,
            props,
            children,
            on_event,
            defect: None,
            rejected_bindings,
        }
    }

    fn explicit_id(&self, obj: &Map<String, Value>) -> Option<String> {
        match obj.get("id") {
            Some(Value::String(id)) if !id.trim().is_empty() => Some(id.trim().to_string()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
