//! Spectral window runtime
//!
//! Renders UI specs supplied at runtime and routes interaction on them into
//! asynchronous tool calls. Every open window owns exactly one
//! [`StateStore`] and one [`ToolDispatcher`], created together by the
//! [`InstanceRegistry`] and disposed together when the window closes.
//!
//! # Flow
//!
//! ```ignore
//! use std::sync::Arc;
//! use spectral_runtime::{InMemoryTransport, RuntimeConfig, WindowHost};
//!
//! let mut host = WindowHost::new(
//!     Arc::new(InMemoryTransport::with_calculator()),
//!     RuntimeConfig::default(),
//! );
//! let session = host.open("W1", "calc", spec)?;
//! let tree = session.render();
//! session.handle_event("btn-7", "click", None);
//! session.settle().await;          // apply tool results
//! if session.needs_render() {
//!     let tree = session.render();
//! }
//! host.close("W1")?;
//! ```

pub mod bindings;
pub mod config;
pub mod dispatcher;
pub mod expr;
pub mod host;
pub mod registry;
pub mod render;
pub mod state;
pub mod transport;
pub mod ui_tools;

pub use bindings::{BindingTable, BoundEvent, EventOutcome, EventScope, WindowMessage};
pub use config::{DispatchConfig, RenderConfig, RuntimeConfig, VirtualizationConfig};
pub use dispatcher::{CallHandle, CallId, CallOutcome, ToolDispatcher, ToolRequest, ToolTransport};
pub use host::{MountDiff, WindowHost, WindowSession};
pub use registry::{InstanceHandle, InstanceRecord, InstanceRegistry};
pub use render::{
    ListWindow, MountedList, RenderContext, RenderOutput, RenderStrategy, RenderedKind,
    RenderedNode, Renderer, StrategyTable,
};
pub use state::{StateChange, StateStore, Subscription};
pub use transport::InMemoryTransport;
