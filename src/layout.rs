//! Grid geometry: desktop coordinate grid, mobile strips, placement and
//! reconciliation of externally produced layouts.

use std::collections::HashSet;

use crate::config::{
    CHROME_HEIGHT_PX, GRID_COLUMNS, GRID_MARGIN_PX, GRID_PADDING_PX, MIN_ROW_HEIGHT_PX,
    MOBILE_BREAKPOINT_PX, TERMINAL_CHROME_ROWS, TERMINAL_MIN_ROW_HEIGHT,
    TERMINAL_MOBILE_BREAKPOINT,
};
use crate::widget::{WidgetCategory, WidgetKind};
use crate::workspace::{GridEntry, Tab, WidgetInstance};

/// Units are whatever the host measures in (pixels in a browser, cells in a terminal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridMetrics {
    pub columns: u32,
    pub margin: u32,
    pub padding: u32,
    pub chrome: u32,
    pub min_row_height: u32,
    pub mobile_breakpoint: u32,
}

impl Default for GridMetrics {
    fn default() -> Self {
        Self {
            columns: GRID_COLUMNS,
            margin: GRID_MARGIN_PX,
            padding: GRID_PADDING_PX,
            chrome: CHROME_HEIGHT_PX,
            min_row_height: MIN_ROW_HEIGHT_PX,
            mobile_breakpoint: MOBILE_BREAKPOINT_PX,
        }
    }
}

impl GridMetrics {
    pub fn terminal() -> Self {
        Self {
            columns: GRID_COLUMNS,
            margin: 0,
            padding: 0,
            chrome: TERMINAL_CHROME_ROWS,
            min_row_height: TERMINAL_MIN_ROW_HEIGHT,
            mobile_breakpoint: TERMINAL_MOBILE_BREAKPOINT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Concrete rectangle for one widget, relative to the grid container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub widget_id: String,
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MobileLayout {
    pub strip_height: u32,
    pub card_width: u32,
    pub primary: Vec<String>,
    pub secondary: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutPlan {
    Desktop { row_height: u32, cells: Vec<Cell> },
    Mobile(MobileLayout),
}

pub fn is_mobile(viewport: Viewport, metrics: &GridMetrics) -> bool {
    viewport.width < metrics.mobile_breakpoint
}

/// Lowest occupied row, `max(y + h)`, or 0 for an empty layout.
pub fn max_row(layout: &[GridEntry]) -> u32 {
    layout.iter().map(GridEntry::bottom).max().unwrap_or(0)
}

/// Row height that makes the grid fill the viewport exactly.
pub fn row_height(layout: &[GridEntry], viewport_height: u32, metrics: &GridMetrics) -> u32 {
    let rows = max_row(layout).max(1);
    let reserved = metrics
        .chrome
        .saturating_add(metrics.padding.saturating_mul(2))
        .saturating_add(metrics.margin.saturating_mul(rows - 1));
    let available = viewport_height.saturating_sub(reserved);
    (available / rows).max(metrics.min_row_height)
}

pub fn desktop_cells(layout: &[GridEntry], viewport: Viewport, metrics: &GridMetrics) -> (u32, Vec<Cell>) {
    let row_h = row_height(layout, viewport.height, metrics);
    let columns = metrics.columns.max(1) as f64;
    let margin = metrics.margin as f64;
    let padding = metrics.padding as f64;
    let col_w = ((viewport.width as f64 - padding * 2.0 - margin * (columns - 1.0)) / columns).max(0.0);
    let row_hf = row_h as f64;

    let cells = layout
        .iter()
        .map(|e| {
            let w = e.w as f64;
            let h = e.h as f64;
            Cell {
                widget_id: e.widget_id.clone(),
                left: ((col_w + margin) * e.x as f64 + padding).round() as u32,
                top: ((row_hf + margin) * e.y as f64 + padding).round() as u32,
                width: (col_w * w + margin * (w - 1.0).max(0.0)).round() as u32,
                height: (row_hf * h + margin * (h - 1.0).max(0.0)).round() as u32,
            }
        })
        .collect();
    (row_h, cells)
}

/// Two horizontally scrolling strips, each half of the height below the chrome.
pub fn mobile_strips(widgets: &[WidgetInstance], viewport: Viewport, metrics: &GridMetrics) -> MobileLayout {
    let (primary, secondary): (Vec<&WidgetInstance>, Vec<&WidgetInstance>) = widgets
        .iter()
        .partition(|w| w.kind.category() == WidgetCategory::Primary);
    MobileLayout {
        strip_height: viewport.height.saturating_sub(metrics.chrome) / 2,
        card_width: viewport.width.saturating_sub(metrics.padding * 2),
        primary: primary.into_iter().map(|w| w.id.clone()).collect(),
        secondary: secondary.into_iter().map(|w| w.id.clone()).collect(),
    }
}

pub fn compute(tab: &Tab, viewport: Viewport, metrics: &GridMetrics) -> LayoutPlan {
    if is_mobile(viewport, metrics) {
        LayoutPlan::Mobile(mobile_strips(&tab.widgets, viewport, metrics))
    } else {
        let (row_height, cells) = desktop_cells(&tab.layout, viewport, metrics);
        LayoutPlan::Desktop { row_height, cells }
    }
}

/// Entry for a new widget: type-dependent size, appended below everything.
pub fn place_new(widget_id: &str, kind: WidgetKind, layout: &[GridEntry]) -> GridEntry {
    let (w, h) = kind.default_size();
    GridEntry::new(widget_id, 0, max_row(layout), w, h)
}

/// Applies an externally produced layout against the current widget set.
/// Entries for unknown widgets and repeated ids are dropped, sizes are clamped
/// to the grid, and widgets the input forgot keep their previous entry (or a
/// fresh one at the bottom).
pub fn reconcile(
    incoming: &[GridEntry],
    widgets: &[WidgetInstance],
    previous: &[GridEntry],
    columns: u32,
) -> Vec<GridEntry> {
    let columns = columns.max(1);
    let known: HashSet<&str> = widgets.iter().map(|w| w.id.as_str()).collect();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut result: Vec<GridEntry> = Vec::with_capacity(widgets.len());

    for entry in incoming {
        let id = entry.widget_id.as_str();
        if !known.contains(id) || !seen.insert(id) {
            continue;
        }
        let w = entry.w.clamp(1, columns);
        result.push(GridEntry {
            widget_id: entry.widget_id.clone(),
            x: entry.x.min(columns - w),
            y: entry.y,
            w,
            h: entry.h.max(1),
        });
    }

    for widget in widgets {
        if seen.contains(widget.id.as_str()) {
            continue;
        }
        let entry = previous
            .iter()
            .find(|e| e.widget_id == widget.id)
            .cloned()
            .unwrap_or_else(|| place_new(&widget.id, widget.kind, &result));
        result.push(entry);
    }
    result
}
