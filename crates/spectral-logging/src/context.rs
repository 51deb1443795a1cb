//! Window context injection
//!
//! Thread-local storage for the window currently being rendered or routed,
//! so every log entry in that scope carries `window_id` and `app_id`.

use std::cell::RefCell;

use uuid::Uuid;

/// Window context data stored in thread-local storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowContextData {
    pub window_id: String,
    pub app_id: String,
    /// Unique id for this scope, distinguishes reopened windows in logs
    pub scope_id: Uuid,
}

thread_local! {
    static WINDOW_CONTEXT: RefCell<Option<WindowContextData>> = const { RefCell::new(None) };
}

/// RAII guard for window context
///
/// Creating the guard sets the window context for the current thread;
/// dropping it restores whatever was active before.
///
/// ```ignore
/// use spectral_logging::WindowContextGuard;
///
/// let _guard = WindowContextGuard::new("W1", "calc");
/// tracing::info!("Rendering"); // carries window_id = "W1"
/// ```
pub struct WindowContextGuard {
    previous: Option<WindowContextData>,
}

impl WindowContextGuard {
    pub fn new(window_id: impl Into<String>, app_id: impl Into<String>) -> Self {
        Self::with_scope_id(window_id, app_id, Uuid::new_v4())
    }

    /// Create a guard with a specific scope id
    pub fn with_scope_id(
        window_id: impl Into<String>,
        app_id: impl Into<String>,
        scope_id: Uuid,
    ) -> Self {
        let previous = WINDOW_CONTEXT.with(|ctx| ctx.borrow().clone());

        let new_ctx = WindowContextData {
            window_id: window_id.into(),
            app_id: app_id.into(),
            scope_id,
        };

        WINDOW_CONTEXT.with(|ctx| *ctx.borrow_mut() = Some(new_ctx));

        Self { previous }
    }

    /// Get the current window context (if any)
    pub fn current() -> Option<WindowContextData> {
        WINDOW_CONTEXT.with(|ctx| ctx.borrow().clone())
    }

    pub fn current_window_id() -> Option<String> {
        Self::current().map(|ctx| ctx.window_id)
    }
}

impl Drop for WindowContextGuard {
    fn drop(&mut self) {
        WINDOW_CONTEXT.with(|ctx| *ctx.borrow_mut() = self.previous.take());
    }
}

/// Run a block with a window context active
///
/// ```ignore
/// with_window_context!("W1", "calc", {
///     tracing::info!("Handling click");
/// });
/// ```
#[macro_export]
macro_rules! with_window_context {
    ($window_id:expr, $app_id:expr, $body:block) => {{
        let _guard = $crate::context::WindowContextGuard::new($window_id, $app_id);
        $body
    }};
}
