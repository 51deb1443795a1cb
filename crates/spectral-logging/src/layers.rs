//! Custom tracing layers

use tracing::{Subscriber, span};
use tracing_subscriber::{
    layer::{Context, Layer},
    registry::LookupSpan,
};

use crate::context::{WindowContextData, WindowContextGuard};

/// Layer that attaches the active window context to new spans
///
/// Spans opened while a [`WindowContextGuard`] is alive get a
/// [`WindowContextExtension`], which keeps the window identity reachable
/// after the guard has been dropped (for example inside a spawned tool call).
pub struct WindowContextLayer;

impl WindowContextLayer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WindowContextLayer {
    fn default() -> Self {
        Self::new()
    }
}

/// Extension data stored on spans
#[derive(Debug, Clone)]
pub struct WindowContextExtension {
    pub data: WindowContextData,
}

impl<S> Layer<S> for WindowContextLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_new_span(&self, _attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(id) {
            if let Some(window_ctx) = WindowContextGuard::current() {
                span.extensions_mut()
                    .insert(WindowContextExtension { data: window_ctx });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::layer::SubscriberExt;

    #[test]
    fn test_window_context_layer_creation() {
        let _layer = WindowContextLayer::new();
    }

    #[test]
    fn test_layer_accepts_spans_with_context() {
        let subscriber = tracing_subscriber::registry().with(WindowContextLayer::new());
        tracing::subscriber::with_default(subscriber, || {
            let _guard = WindowContextGuard::new("W1", "calc");
            let span = tracing::info_span!("render_pass");
            let _entered = span.enter();
            tracing::info!("inside");
        });
    }
}
