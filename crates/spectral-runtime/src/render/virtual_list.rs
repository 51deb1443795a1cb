//! Virtualized list path
//!
//! Lists with at least `threshold` children mount only the items whose
//! fixed-height slots intersect the viewport, plus `overscan` items on each
//! side. Everything else is represented by two spacers so the scrollable
//! extent stays `item_count * item_height`.
//!
//! Item heights are assumed uniform within a list. Heterogeneous content
//! will be positioned approximately.

use serde::Serialize;
use serde_json::Value;
use spectral_core::{ComponentNode, SpecError};

use super::strategy::RenderStrategy;
use super::{RenderContext, RenderedKind, RenderedNode};

/// State key holding a list's scroll offset
pub fn scroll_key(list_id: &str) -> String {
    format!("{list_id}:scroll")
}

/// The slice of a list that is mounted for one scroll position
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListWindow {
    /// First mounted index
    pub start: usize,
    /// One past the last mounted index
    pub end: usize,
    pub item_count: usize,
    pub item_height: f64,
    pub viewport_height: f64,
    /// Offset after clamping to the scrollable range
    pub scroll_offset: f64,
    pub total_extent: f64,
    pub top_spacer: f64,
    pub bottom_spacer: f64,
}

impl ListWindow {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, index: usize) -> bool {
        index >= self.start && index < self.end
    }

    /// Largest offset that still fills the viewport
    pub fn max_scroll_offset(&self) -> f64 {
        (self.total_extent - self.viewport_height).max(0.0)
    }
}

/// Compute the mounted range for a scroll position
///
/// Callers guarantee `item_height` and `viewport_height` are positive.
pub fn visible_range(
    item_count: usize,
    item_height: f64,
    scroll_offset: f64,
    viewport_height: f64,
    overscan: usize,
) -> ListWindow {
    let total_extent = item_count as f64 * item_height;
    let max_offset = (total_extent - viewport_height).max(0.0);
    let scroll_offset = if scroll_offset.is_finite() {
        scroll_offset.clamp(0.0, max_offset)
    } else {
        0.0
    };

    let first_visible = (scroll_offset / item_height).floor() as usize;
    let last_visible = ((scroll_offset + viewport_height) / item_height).ceil() as usize;

    let start = first_visible.saturating_sub(overscan).min(item_count);
    let end = last_visible.saturating_add(overscan).min(item_count);

    ListWindow {
        start,
        end,
        item_count,
        item_height,
        viewport_height,
        scroll_offset,
        total_extent,
        top_spacer: start as f64 * item_height,
        bottom_spacer: (item_count - end) as f64 * item_height,
    }
}

/// Strategy for the `list` type
///
/// Below the threshold the list is an ordinary element with every child
/// rendered. At or above it, children outside the window are skipped.
pub struct ListStrategy;

impl ListStrategy {
    fn positive_prop(
        node: &ComponentNode,
        prop: &str,
        fallback: f64,
    ) -> Result<f64, SpecError> {
        match node.props.get(prop) {
            None | Some(Value::Null) => Ok(fallback),
            Some(value) => value
                .as_f64()
                .filter(|v| v.is_finite() && *v > 0.0)
                .ok_or_else(|| SpecError::InvalidProp {
                    prop: prop.to_string(),
                    reason: format!("expected a positive number, got {value}"),
                }),
        }
    }
}

impl RenderStrategy for ListStrategy {
    fn render(
        &self,
        node: &ComponentNode,
        cx: &mut RenderContext<'_>,
    ) -> Result<RenderedNode, SpecError> {
        let settings = cx.config().virtualization.clone();
        let count = node.children.len();

        if count < settings.threshold {
            let children = cx.render_children(&node.children);
            return Ok(RenderedNode::element(&node.id, "list")
                .with_props(node.props.clone())
                .with_children(children));
        }

        let item_height = Self::positive_prop(node, "itemHeight", settings.item_height)?;
        let viewport_height =
            Self::positive_prop(node, "viewportHeight", settings.viewport_height)?;
        let scroll_offset = cx
            .read(&node.id, &scroll_key(&node.id))
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);

        let window = visible_range(
            count,
            item_height,
            scroll_offset,
            viewport_height,
            settings.overscan,
        );

        tracing::trace!(
            list_id = %node.id,
            start = window.start,
            end = window.end,
            count,
            "Virtualized list window"
        );

        let children = cx.render_children(&node.children[window.start..window.end]);
        cx.mount_list(&node.id, &window, children.iter().map(|c| c.id.clone()).collect());

        Ok(RenderedNode {
            id: node.id.clone(),
            kind: RenderedKind::VirtualList { window },
            props: node.props.clone(),
            events: Vec::new(),
            children,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_at_top() {
        let window = visible_range(50, 40.0, 0.0, 480.0, 3);
        assert_eq!(window.start, 0);
        // 12 visible + 3 overscan
        assert_eq!(window.end, 15);
        assert_eq!(window.total_extent, 2000.0);
        assert_eq!(window.top_spacer, 0.0);
        assert_eq!(window.bottom_spacer, 35.0 * 40.0);
    }

    #[test]
    fn test_window_mid_scroll() {
        let window = visible_range(50, 40.0, 400.0, 480.0, 3);
        assert_eq!(window.start, 7);
        assert_eq!(window.end, 25);
        assert!(window.contains(10));
        assert!(!window.contains(6));
    }

    #[test]
    fn test_partial_item_rounds_outward() {
        let window = visible_range(100, 40.0, 20.0, 100.0, 0);
        assert_eq!(window.start, 0);
        assert_eq!(window.end, 3);
    }

    #[test]
    fn test_scroll_is_clamped() {
        let window = visible_range(50, 40.0, 99_999.0, 480.0, 3);
        assert_eq!(window.scroll_offset, 1520.0);
        assert_eq!(window.end, 50);
        assert_eq!(window.bottom_spacer, 0.0);

        let window = visible_range(50, 40.0, -50.0, 480.0, 3);
        assert_eq!(window.scroll_offset, 0.0);

        let window = visible_range(50, 40.0, f64::NAN, 480.0, 3);
        assert_eq!(window.scroll_offset, 0.0);
    }

    #[test]
    fn test_short_list_fits_viewport() {
        let window = visible_range(5, 40.0, 100.0, 480.0, 3);
        assert_eq!(window.scroll_offset, 0.0);
        assert_eq!((window.start, window.end), (0, 5));
        assert_eq!(window.max_scroll_offset(), 0.0);
    }

    #[test]
    fn test_empty_list() {
        let window = visible_range(0, 40.0, 0.0, 480.0, 3);
        assert!(window.is_empty());
        assert_eq!(window.total_extent, 0.0);
    }

    #[test]
    fn test_scroll_key() {
        assert_eq!(scroll_key("feed"), "feed:scroll");
    }
}
