//! Scripted interactions replayed against a window session
//!
//! A script is a JSON array of steps:
//!
//! ```json
//! [
//!   {"event": {"component": "btn-7"}},
//!   {"event": {"component": "sum", "name": "click", "payload": 3}},
//!   "settle",
//!   {"scroll": {"list": "rows", "offset": 1200}},
//!   "render"
//! ]
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use spectral_runtime::{EventOutcome, WindowSession};

fn default_event() -> String {
    "click".to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Fire an interaction on a component
    Event {
        component: String,
        #[serde(default = "default_event")]
        name: String,
        #[serde(default)]
        payload: Option<Value>,
    },
    /// Set a virtualized list's scroll offset
    Scroll { list: String, offset: f64 },
    /// Wait for every in-flight call and apply its result
    Settle,
    /// Apply whatever results are already queued
    Pump,
    /// Run a render pass
    Render,
}

/// What happened while replaying a script
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptReport {
    pub steps: usize,
    pub local_calls: usize,
    pub remote_calls: usize,
    pub failed_local_calls: usize,
    /// Events that had no binding in the latest render pass
    pub unbound: Vec<String>,
    pub applied: usize,
    pub renders: usize,
}

pub fn parse_script(content: &str) -> Result<Vec<Step>> {
    serde_json::from_str(content).context("Script must be a JSON array of steps")
}

pub fn load_script(path: &Path) -> Result<Vec<Step>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read script {}", path.display()))?;
    parse_script(&content).with_context(|| format!("Invalid script in {}", path.display()))
}

/// Replay `steps` in order
///
/// The session must already have been rendered once so that its event
/// bindings exist. Queued results are settled before returning.
pub async fn run_script(session: &mut WindowSession, steps: &[Step]) -> ScriptReport {
    let mut report = ScriptReport::default();

    for step in steps {
        report.steps += 1;
        match step {
            Step::Event {
                component,
                name,
                payload,
            } => match session.handle_event(component, name, payload.clone()) {
                Some(EventOutcome::Local(Ok(_))) => report.local_calls += 1,
                Some(EventOutcome::Local(Err(e))) => {
                    tracing::warn!(
                        component_id = %component,
                        event = %name,
                        code = e.code(),
                        "Local tool failed"
                    );
                    report.local_calls += 1;
                    report.failed_local_calls += 1;
                }
                Some(EventOutcome::Remote(handle)) => {
                    tracing::debug!(
                        component_id = %component,
                        call_id = handle.call_id,
                        "Remote call started"
                    );
                    report.remote_calls += 1;
                }
                None => {
                    tracing::warn!(
                        component_id = %component,
                        event = %name,
                        "Event has no binding"
                    );
                    report.unbound.push(format!("{component}/{name}"));
                }
            },
            Step::Scroll { list, offset } => session.scroll(list, *offset),
            Step::Settle => report.applied += session.settle().await,
            Step::Pump => report.applied += session.pump(),
            Step::Render => {
                session.render();
                report.renders += 1;
            }
        }
    }

    report.applied += session.settle().await;
    report
}
