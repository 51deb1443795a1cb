//! Recursive renderer
//!
//! Walks a [`UiSpec`], hands each node to the strategy registered for its
//! type and collects three things alongside the rendered tree: the event
//! bindings, the state keys each component read, and the window of every
//! virtualized list.
//!
//! A render pass never awaits. Event bindings are wired here and fire later;
//! their results come back through state, not through this module.

pub mod strategy;
pub mod virtual_list;

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::Serialize;
use serde_json::{Map, Value};
use spectral_core::{ComponentNode, Props, SpecError, UiSpec};

use crate::bindings::{BindingTable, BoundEvent, EventScope};
use crate::config::RuntimeConfig;
use crate::state::StateStore;

pub use strategy::{ElementStrategy, RenderStrategy, StrategyTable, bound_key};
pub use virtual_list::{ListStrategy, ListWindow, scroll_key, visible_range};

/// What a node rendered as
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RenderedKind {
    Element { tag: String },
    VirtualList { window: ListWindow },
    /// Stand-in for a node that could not be rendered
    Placeholder { requested_type: String, error: String },
}

/// One node of the rendered tree handed to the window chrome
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedNode {
    pub id: String,
    #[serde(flatten)]
    pub kind: RenderedKind,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub props: Props,
    /// Event names with a live binding
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RenderedNode>,
}

impl RenderedNode {
    pub fn element(id: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: RenderedKind::Element { tag: tag.into() },
            props: Props::new(),
            events: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn placeholder(node: &ComponentNode, error: &SpecError) -> Self {
        Self {
            id: node.id.clone(),
            kind: RenderedKind::Placeholder {
                requested_type: node.kind.clone(),
                error: error.to_string(),
            },
            props: Props::new(),
            events: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_props(mut self, props: Props) -> Self {
        self.props = props;
        self
    }

    pub fn with_children(mut self, children: Vec<RenderedNode>) -> Self {
        self.children = children;
        self
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.kind, RenderedKind::Placeholder { .. })
    }

    /// Tag for elements, `None` for lists and placeholders
    pub fn tag(&self) -> Option<&str> {
        match &self.kind {
            RenderedKind::Element { tag } => Some(tag),
            _ => None,
        }
    }

    pub fn find(&self, id: &str) -> Option<&RenderedNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }

    /// Ids of this subtree in depth-first order
    pub fn ids(&self) -> Vec<&str> {
        let mut out = vec![self.id.as_str()];
        for child in &self.children {
            out.extend(child.ids());
        }
        out
    }
}

/// Everything one render pass produced
#[derive(Debug, Default, Serialize)]
pub struct RenderOutput {
    pub title: String,
    pub layout: String,
    pub roots: Vec<RenderedNode>,
    /// State key → components that read it
    pub reads: BTreeMap<String, BTreeSet<String>>,
    /// List id → mounted window, for virtualized lists only
    pub lists: BTreeMap<String, MountedList>,
    #[serde(skip)]
    pub bindings: BindingTable,
}

impl RenderOutput {
    pub fn find(&self, id: &str) -> Option<&RenderedNode> {
        self.roots.iter().find_map(|root| root.find(id))
    }

    pub fn placeholder_count(&self) -> usize {
        fn count(node: &RenderedNode) -> usize {
            usize::from(node.is_placeholder()) + node.children.iter().map(count).sum::<usize>()
        }
        self.roots.iter().map(count).sum()
    }
}

/// A virtualized list as mounted by one pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MountedList {
    pub window: ListWindow,
    /// Ids of the mounted children, in order
    pub item_ids: Vec<String>,
}

/// Mutable context threaded through one render pass
pub struct RenderContext<'a> {
    scope: &'a EventScope,
    strategies: &'a StrategyTable,
    config: &'a RuntimeConfig,
    depth: usize,
    seen_ids: HashSet<String>,
    reads: BTreeMap<String, BTreeSet<String>>,
    lists: BTreeMap<String, MountedList>,
    bindings: BindingTable,
}

impl<'a> RenderContext<'a> {
    fn new(
        scope: &'a EventScope,
        strategies: &'a StrategyTable,
        config: &'a RuntimeConfig,
    ) -> Self {
        Self {
            scope,
            strategies,
            config,
            depth: 0,
            seen_ids: HashSet::new(),
            reads: BTreeMap::new(),
            lists: BTreeMap::new(),
            bindings: BindingTable::default(),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        self.config
    }

    pub fn state(&self) -> &StateStore {
        &self.scope.state
    }

    /// Nesting depth of the node being rendered; roots are at 0
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Read a state key on behalf of a component
    ///
    /// The read is recorded so a later write to `key` marks `component_id`
    /// dirty.
    pub fn read(&mut self, component_id: &str, key: &str) -> Option<Value> {
        self.reads
            .entry(key.to_string())
            .or_default()
            .insert(component_id.to_string());
        self.scope.state.get(key)
    }

    /// Record the window a virtualized list mounted
    pub fn mount_list(&mut self, list_id: &str, window: &ListWindow, item_ids: Vec<String>) {
        self.lists.insert(
            list_id.to_string(),
            MountedList {
                window: window.clone(),
                item_ids,
            },
        );
    }

    /// Render children one level deeper, in order
    pub fn render_children(&mut self, children: &[ComponentNode]) -> Vec<RenderedNode> {
        self.depth += 1;
        let rendered = children.iter().map(|child| self.render_node(child)).collect();
        self.depth -= 1;
        rendered
    }

    /// Render one node, containing any failure to this node
    pub fn render_node(&mut self, node: &ComponentNode) -> RenderedNode {
        if let Some(defect) = &node.defect {
            tracing::warn!(
                component_id = %node.id,
                error = %defect,
                "Rendering placeholder for malformed node"
            );
            return RenderedNode::placeholder(node, defect);
        }

        let max_depth = self.config.render.max_depth;
        if self.depth >= max_depth {
            let error = SpecError::DepthExceeded { max: max_depth };
            tracing::warn!(component_id = %node.id, depth = self.depth, "Nesting too deep");
            return RenderedNode::placeholder(node, &error);
        }

        if !self.seen_ids.insert(node.id.clone()) {
            tracing::warn!(component_id = %node.id, "Duplicate component id");
        }

        let strategies = self.strategies;
        let Some(strategy) = strategies.get(&node.kind) else {
            let error = SpecError::UnknownType(node.kind.clone());
            tracing::warn!(component_id = %node.id, kind = %node.kind, "Unknown component type");
            return RenderedNode::placeholder(node, &error);
        };

        match strategy.render(node, self) {
            Ok(mut rendered) => {
                self.bind_events(node, &mut rendered);
                rendered
            }
            Err(error) => {
                tracing::warn!(
                    component_id = %node.id,
                    kind = %node.kind,
                    error = %error,
                    "Render strategy failed"
                );
                RenderedNode::placeholder(node, &error)
            }
        }
    }

    fn bind_events(&mut self, node: &ComponentNode, rendered: &mut RenderedNode) {
        for (event, invocation) in &node.on_event {
            self.bindings.insert(BoundEvent::new(
                node.id.clone(),
                event.clone(),
                invocation.clone(),
                node.props.clone(),
                self.scope.clone(),
            ));
            rendered.events.push(event.clone());
        }
    }
}

/// Renders specs with a fixed strategy table and configuration
pub struct Renderer {
    strategies: StrategyTable,
    config: RuntimeConfig,
}

impl Renderer {
    pub fn new(config: RuntimeConfig) -> Self {
        Self::with_strategies(config, StrategyTable::with_defaults())
    }

    pub fn with_strategies(config: RuntimeConfig, strategies: StrategyTable) -> Self {
        Self { strategies, config }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn strategies(&self) -> &StrategyTable {
        &self.strategies
    }

    /// Register an additional component type
    pub fn register(&mut self, kind: impl Into<String>, strategy: impl RenderStrategy + 'static) {
        self.strategies.register(kind, strategy);
    }

    /// Render every root of `spec` in order
    pub fn render_spec(&self, spec: &UiSpec, scope: &EventScope) -> RenderOutput {
        let _span = tracing::debug_span!(
            "render_pass",
            title = %spec.title,
            roots = spec.components.len()
        )
        .entered();

        let mut cx = RenderContext::new(scope, &self.strategies, &self.config);
        let roots = spec.components.iter().map(|node| cx.render_node(node)).collect();

        let output = RenderOutput {
            title: spec.title.clone(),
            layout: spec.layout.clone(),
            roots,
            reads: cx.reads,
            lists: cx.lists,
            bindings: cx.bindings,
        };
        tracing::debug!(
            bindings = output.bindings.len(),
            placeholders = output.placeholder_count(),
            "Render pass complete"
        );
        output
    }

    /// Render a single tree
    pub fn render_tree(&self, node: &ComponentNode, scope: &EventScope) -> RenderOutput {
        let spec = UiSpec::new("vertical", vec![node.clone()]);
        self.render_spec(&spec, scope)
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}
