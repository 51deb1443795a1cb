//! Render strategies and the type table
//!
//! Each component type maps to one [`RenderStrategy`]. The table starts with
//! the built-in types and can be extended by the host; a type missing from
//! the table renders as a placeholder.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use spectral_core::{ComponentNode, SpecError};

use super::virtual_list::ListStrategy;
use super::{RenderContext, RenderedNode};

/// Renders one node type
pub trait RenderStrategy: Send + Sync {
    /// Render `node`. Returning an error replaces the node with a
    /// placeholder; siblings are unaffected.
    fn render(
        &self,
        node: &ComponentNode,
        cx: &mut RenderContext<'_>,
    ) -> Result<RenderedNode, SpecError>;
}

/// State key a node reads its bound value from: `props.bind`, else its id
pub fn bound_key(node: &ComponentNode) -> &str {
    node.prop_str("bind").unwrap_or(&node.id)
}

/// Generic element with an optional state-bound prop
///
/// When `bound_prop` is set the node's bound key is read from state and,
/// if present, overrides that prop in the output.
pub struct ElementStrategy {
    tag: &'static str,
    bound_prop: Option<&'static str>,
    required_str_props: &'static [&'static str],
}

impl ElementStrategy {
    pub fn new(tag: &'static str) -> Self {
        Self {
            tag,
            bound_prop: None,
            required_str_props: &[],
        }
    }

    pub fn bound(tag: &'static str, prop: &'static str) -> Self {
        Self {
            tag,
            bound_prop: Some(prop),
            required_str_props: &[],
        }
    }

    /// Props that must be strings when present
    pub fn with_string_props(mut self, props: &'static [&'static str]) -> Self {
        self.required_str_props = props;
        self
    }
}

impl RenderStrategy for ElementStrategy {
    fn render(
        &self,
        node: &ComponentNode,
        cx: &mut RenderContext<'_>,
    ) -> Result<RenderedNode, SpecError> {
        for prop in self.required_str_props {
            match node.props.get(*prop) {
                None | Some(Value::String(_)) => {}
                Some(other) => {
                    return Err(SpecError::InvalidProp {
                        prop: prop.to_string(),
                        reason: format!("expected a string, got {other}"),
                    });
                }
            }
        }

        let mut props = node.props.clone();
        if let Some(prop) = self.bound_prop {
            if let Some(value) = cx.read(&node.id, bound_key(node)) {
                props.insert(prop.to_string(), value);
            }
        }

        let children = cx.render_children(&node.children);
        Ok(RenderedNode::element(&node.id, self.tag)
            .with_props(props)
            .with_children(children))
    }
}

/// Type tag → strategy
#[derive(Clone)]
pub struct StrategyTable {
    strategies: HashMap<String, Arc<dyn RenderStrategy>>,
}

impl StrategyTable {
    /// A table with no types registered
    pub fn empty() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    /// The built-in component types
    pub fn with_defaults() -> Self {
        let mut table = Self::empty();

        for tag in ["container", "row", "col", "grid", "card", "section", "form"] {
            table.register(tag, ElementStrategy::new(tag));
        }
        for tag in ["text", "heading", "label"] {
            table.register(tag, ElementStrategy::bound(tag, "content"));
        }
        for tag in ["input", "textarea", "select", "slider", "progress"] {
            table.register(tag, ElementStrategy::bound(tag, "value"));
        }
        table.register("checkbox", ElementStrategy::bound("checkbox", "checked"));
        table.register("button", ElementStrategy::new("button"));
        table.register("divider", ElementStrategy::new("divider"));
        table.register(
            "image",
            ElementStrategy::new("image").with_string_props(&["src", "alt"]),
        );
        table.register(
            "iframe",
            ElementStrategy::new("iframe").with_string_props(&["src"]),
        );
        table.register("list", ListStrategy);

        table
    }

    /// Add or replace the strategy for a type
    pub fn register(&mut self, kind: impl Into<String>, strategy: impl RenderStrategy + 'static) {
        self.strategies.insert(kind.into(), Arc::new(strategy));
    }

    pub fn get(&self, kind: &str) -> Option<&dyn RenderStrategy> {
        self.strategies.get(kind).map(|s| s.as_ref())
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.strategies.contains_key(kind)
    }

    /// Registered types, sorted
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.strategies.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

impl Default for StrategyTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}
