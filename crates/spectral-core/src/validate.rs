//! Advisory checks over a whole specification
//!
//! Nothing reported here blocks rendering. Hosts use it to surface generator
//! mistakes in logs or devtools.

use std::collections::HashSet;

use serde::Serialize;

use crate::node::ComponentNode;
use crate::spec::UiSpec;

/// A problem found by [`validate`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "issue", rename_all = "snake_case")]
pub enum SpecIssue {
    DuplicateId { id: String },
    Malformed { id: String, reason: String },
    DepthExceeded { id: String, depth: usize },
    EmptyType { id: String },
    InvalidBinding { id: String, event: String, reason: String },
}

/// Walk the tree and report duplicate ids, undecodable nodes, dropped event
/// bindings, and nodes nested deeper than `max_depth`
pub fn validate(spec: &UiSpec, max_depth: usize) -> Vec<SpecIssue> {
    let mut issues = Vec::new();
    let mut seen = HashSet::new();
    for root in &spec.components {
        walk(root, 1, max_depth, &mut seen, &mut issues);
    }
    issues
}

fn walk<'a>(
    node: &'a ComponentNode,
    depth: usize,
    max_depth: usize,
    seen: &mut HashSet<&'a str>,
    issues: &mut Vec<SpecIssue>,
) {
    if !seen.insert(node.id.as_str()) {
        issues.push(SpecIssue::DuplicateId {
            id: node.id.clone(),
        });
    }

    if let Some(defect) = &node.defect {
        issues.push(SpecIssue::Malformed {
            id: node.id.clone(),
            reason: defect.to_string(),
        });
        return;
    }

    for (event, reason) in &node.rejected_bindings {
        issues.push(SpecIssue::InvalidBinding {
            id: node.id.clone(),
            event: event.clone(),
            reason: reason.clone(),
        });
    }

    if node.kind.is_empty() {
        issues.push(SpecIssue::EmptyType {
            id: node.id.clone(),
        });
    }

    if depth > max_depth {
        issues.push(SpecIssue::DepthExceeded {
            id: node.id.clone(),
            depth,
        });
        return;
    }

    for child in &node.children {
        walk(child, depth + 1, max_depth, seen, issues);
    }
}
