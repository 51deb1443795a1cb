//! # Spectral Core
//!
//! Data model and error types for UI trees whose shape is produced at runtime
//! by an external generator.
//!
//! Nothing in a received specification is trusted beyond a small schema:
//! decoding is done node by node so that one broken entry never prevents its
//! siblings from being rendered.
//!
//! ## Key Types
//!
//! - [`ComponentNode`]: One element of a specification tree
//! - [`UiSpec`]: Layout hint plus ordered root nodes, as supplied per render pass
//! - [`ToolInvocation`]: A tool id, its params, and an optional app override
//! - [`Package`]: An app package expanded from the blueprint format
//!
//! ## Errors
//!
//! See [`error`] for the taxonomy: [`SpecError`] stays at the node boundary,
//! [`ToolError`] travels only along the call that produced it, and
//! [`LifecycleError`] covers window/app binding misuse.

pub mod blueprint;
pub mod error;
pub mod node;
pub mod spec;
pub mod validate;

pub use blueprint::{Package, ServiceImport, parse_blueprint};
pub use error::*;
pub use node::{ComponentNode, Props, ToolInvocation};
pub use spec::UiSpec;
pub use validate::{SpecIssue, validate};

pub use serde_json::Value;
