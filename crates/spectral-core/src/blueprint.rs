//! Blueprint documents
//!
//! A blueprint bundles app metadata, service imports, and a UI tree written in
//! a terser hand-authoring syntax. Expansion rewrites the terse forms into the
//! explicit `{type, id, props, on_event, children}` shape and then decodes it
//! with the same tolerant decoder used for generated specs.
//!
//! Supported shortcuts:
//!
//! - `"Hello"` as a component becomes a `text` node
//! - `{"button#save": {"text": "Save", "@click": "storage.set"}}` compact form
//! - `row` / `col` become containers with a horizontal / vertical layout
//! - semantic roles (`sidebar`, `header`, ...) become containers with `props.role`

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::error::BlueprintError;
use crate::node::NodeDecoder;
use crate::spec::{UiSpec, decode_hooks};

const ROLE_CONTAINERS: &[&str] = &[
    "sidebar", "main", "editor", "header", "footer", "content", "section",
];

/// A service imported by a package
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ServiceImport {
    /// Every tool of the service
    All(String),
    /// Only the listed tools, with any extra per-service config
    Tools {
        service: String,
        tools: Vec<String>,
        #[serde(skip_serializing_if = "Map::is_empty")]
        config: Map<String, Value>,
    },
}

impl ServiceImport {
    pub fn service(&self) -> &str {
        match self {
            ServiceImport::All(service) | ServiceImport::Tools { service, .. } => service,
        }
    }

    /// Whether `tool` is reachable through this import
    pub fn allows(&self, tool: &str) -> bool {
        match self {
            ServiceImport::All(_) => true,
            ServiceImport::Tools { tools, .. } => tools.iter().any(|t| t == tool),
        }
    }
}

/// An app package expanded from a blueprint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Package {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub version: String,
    pub author: String,
    pub services: Vec<ServiceImport>,
    pub permissions: Vec<String>,
    pub tags: Vec<String>,
    pub ui_spec: UiSpec,
    pub config: Map<String, Value>,
}

/// Parse a blueprint document into a [`Package`]
pub fn parse_blueprint(content: &str) -> Result<Package, BlueprintError> {
    let doc: Value =
        serde_json::from_str(content).map_err(|e| BlueprintError::InvalidJson(e.to_string()))?;
    let doc = doc.as_object().ok_or(BlueprintError::NotAnObject)?;

    let app = doc
        .get("app")
        .and_then(Value::as_object)
        .ok_or_else(|| BlueprintError::MissingSection("app".to_string()))?;

    let id = required_str(app, "id")?;
    let name = required_str(app, "name")?;

    let ui_spec = expand_ui(doc.get("ui"));

    Ok(Package {
        id,
        name,
        description: optional_str(app, "description").unwrap_or_default(),
        icon: optional_str(app, "icon"),
        category: optional_str(app, "category"),
        version: optional_str(app, "version").unwrap_or_else(|| "1.0.0".to_string()),
        author: optional_str(app, "author").unwrap_or_else(|| "user".to_string()),
        services: expand_services(doc.get("services")),
        permissions: string_list(app.get("permissions"))
            .unwrap_or_else(|| vec!["STANDARD".to_string()]),
        tags: string_list(app.get("tags")).unwrap_or_default(),
        ui_spec,
        config: doc
            .get("config")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default(),
    })
}

fn required_str(obj: &Map<String, Value>, field: &str) -> Result<String, BlueprintError> {
    obj.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| BlueprintError::MissingField(format!("app.{field}")))
}

fn optional_str(obj: &Map<String, Value>, field: &str) -> Option<String> {
    obj.get(field).and_then(Value::as_str).map(str::to_string)
}

fn string_list(value: Option<&Value>) -> Option<Vec<String>> {
    value.and_then(Value::as_array).map(|items| {
        items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    })
}

fn expand_services(value: Option<&Value>) -> Vec<ServiceImport> {
    let Some(entries) = value.and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut imports = Vec::new();
    for entry in entries {
        match entry {
            Value::String(service) => imports.push(ServiceImport::All(service.clone())),
            Value::Object(obj) => {
                for (service, spec) in obj {
                    imports.push(expand_service(service, spec));
                }
            }
            _ => {}
        }
    }
    imports
}

fn expand_service(service: &str, spec: &Value) -> ServiceImport {
    match spec {
        Value::Array(_) => ServiceImport::Tools {
            service: service.to_string(),
            tools: string_list(Some(spec)).unwrap_or_default(),
            config: Map::new(),
        },
        Value::Object(obj) => match obj.get("tools") {
            Some(tools @ Value::Array(_)) => {
                let config = obj
                    .iter()
                    .filter(|(k, _)| k.as_str() != "tools")
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                ServiceImport::Tools {
                    service: service.to_string(),
                    tools: string_list(Some(tools)).unwrap_or_default(),
                    config,
                }
            }
            _ => ServiceImport::All(service.to_string()),
        },
        // "*", null, or anything unrecognised imports the whole service
        _ => ServiceImport::All(service.to_string()),
    }
}

fn expand_ui(ui: Option<&Value>) -> UiSpec {
    let Some(ui) = ui.and_then(Value::as_object).filter(|ui| !ui.is_empty()) else {
        return UiSpec::default();
    };

    let mut expander = Expander::default();
    let components: Vec<Value> = ui
        .get("components")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(|c| expander.expand(c)).collect())
        .unwrap_or_default();

    let mut decoder = NodeDecoder::new();
    let components = decoder.decode_list(Some(&Value::Array(components)));

    let mut spec = UiSpec::new(
        ui.get("layout")
            .and_then(Value::as_str)
            .unwrap_or("vertical"),
        components,
    )
    .with_title(ui.get("title").and_then(Value::as_str).unwrap_or("Untitled"));

    if let Some(style) = ui.get("style").and_then(Value::as_object) {
        spec.style = style.clone();
    }
    if let Some(lifecycle) = ui.get("lifecycle") {
        spec.lifecycle_hooks = decode_hooks(lifecycle);
    }
    spec
}

/// Rewrites terse component forms into the explicit shape
#[derive(Default)]
struct Expander {
    next_auto_id: usize,
}

impl Expander {
    fn auto_id(&mut self, prefix: &str) -> String {
        let id = format!("{}-{}", prefix, self.next_auto_id);
        self.next_auto_id += 1;
        id
    }

    fn expand(&mut self, component: &Value) -> Option<Value> {
        match component {
            Value::String(text) => {
                let id = self.auto_id("text");
                Some(json!({"type": "text", "id": id, "props": {"content": text}}))
            }
            Value::Object(obj) if obj.contains_key("type") => {
                Some(self.expand_explicit(obj.clone()))
            }
            Value::Object(obj) => {
                let (key, body) = obj.iter().next()?;
                Some(self.expand_compact(key, body))
            }
            _ => None,
        }
    }

    fn expand_compact(&mut self, key: &str, body: &Value) -> Value {
        let (kind, id) = match key.split_once('#') {
            Some((kind, id)) if !id.is_empty() => (kind.to_string(), id.to_string()),
            Some((kind, _)) => (kind.to_string(), self.auto_id(kind)),
            None => (key.to_string(), self.auto_id(key)),
        };

        let mut props = Map::new();
        let mut events = Map::new();
        let mut children = None;

        if let Some(body) = body.as_object() {
            for (k, v) in body {
                if let Some(event) = k.strip_prefix('@') {
                    events.insert(event.to_string(), v.clone());
                } else if k == "children" {
                    children = Some(v.clone());
                } else {
                    props.insert(k.clone(), v.clone());
                }
            }
        }

        let mut explicit = Map::new();
        explicit.insert("type".to_string(), Value::String(kind));
        explicit.insert("id".to_string(), Value::String(id));
        explicit.insert("props".to_string(), Value::Object(props));
        if !events.is_empty() {
            explicit.insert("on_event".to_string(), Value::Object(events));
        }
        if let Some(children) = children {
            explicit.insert("children".to_string(), children);
        }
        self.expand_explicit(explicit)
    }

    fn expand_explicit(&mut self, mut comp: Map<String, Value>) -> Value {
        let mut kind = comp
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("container")
            .to_string();

        if !matches!(comp.get("id"), Some(Value::String(id)) if !id.is_empty()) {
            let id = self.auto_id(&kind);
            comp.insert("id".to_string(), Value::String(id));
        }

        let mut props = match comp.remove("props") {
            Some(Value::Object(props)) => props,
            _ => Map::new(),
        };

        let default_layout = match kind.as_str() {
            "row" => Some("horizontal"),
            "col" => Some("vertical"),
            role if ROLE_CONTAINERS.contains(&role) => {
                props.insert("role".to_string(), Value::String(role.to_string()));
                Some("vertical")
            }
            _ => None,
        };
        if let Some(layout) = default_layout {
            kind = "container".to_string();
            props
                .entry("layout")
                .or_insert_with(|| Value::String(layout.to_string()));
        }

        if let Some(Value::Array(children)) = comp.remove("children") {
            let expanded: Vec<Value> = children.iter().filter_map(|c| self.expand(c)).collect();
            if !expanded.is_empty() {
                comp.insert("children".to_string(), Value::Array(expanded));
            }
        }

        comp.insert("type".to_string(), Value::String(kind));
        comp.insert("props".to_string(), Value::Object(props));
        Value::Object(comp)
    }
}
