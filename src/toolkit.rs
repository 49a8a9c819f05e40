//! The widget capability the configuration view is built on, plus an
//! in-memory implementation rendered by [`crate::ui`].

use std::collections::HashMap;

use tracing::trace;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WidgetId(u64);

/// Widget operations needed by the view. Every call happens on the thread
/// that owns the view.
pub trait Toolkit {
    /// The scrollable container every group is created in.
    fn root(&self) -> WidgetId;

    fn new_group(&mut self, parent: WidgetId) -> Result<WidgetId, Error>;
    fn new_label(&mut self, parent: WidgetId) -> Result<WidgetId, Error>;
    /// A read-only, selectable single line of text.
    fn new_line_edit(&mut self, parent: WidgetId) -> Result<WidgetId, Error>;

    fn text(&self, id: WidgetId) -> &str;
    fn set_text(&mut self, id: WidgetId, text: &str);
    fn title(&self, id: WidgetId) -> &str;
    fn set_title(&mut self, id: WidgetId, title: &str);
    fn is_visible(&self, id: WidgetId) -> bool;
    fn set_visible(&mut self, id: WidgetId, visible: bool);

    /// Selected character range `[start, end)`.
    fn text_selection(&self, id: WidgetId) -> (usize, usize);
    fn set_text_selection(&mut self, id: WidgetId, start: usize, end: usize);

    fn set_grid_cell(&mut self, id: WidgetId, row: usize, column: usize);

    /// Detaches `id` from its parent and disposes it with all children.
    fn remove(&mut self, id: WidgetId);

    /// While suspended, structural changes do not trigger layout passes.
    /// Resuming runs a single pass.
    fn set_suspended(&mut self, suspended: bool);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetKind {
    Root,
    Group,
    Label,
    LineEdit,
}

#[derive(Debug)]
struct Widget {
    kind: WidgetKind,
    parent: Option<WidgetId>,
    children: Vec<WidgetId>,
    text: String,
    visible: bool,
    selection: (usize, usize),
    cell: Option<(usize, usize)>,
}

impl Widget {
    fn new(kind: WidgetKind, parent: Option<WidgetId>) -> Self {
        Self {
            kind,
            parent,
            children: Vec::new(),
            text: String::new(),
            visible: true,
            selection: (0, 0),
            cell: None,
        }
    }
}

/// One laid-out grid line: a label and the value next to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridRow {
    pub label: WidgetId,
    pub value: WidgetId,
}

/// A group as placed by the last layout pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupLayout {
    pub group: WidgetId,
    pub rows: Vec<GridRow>,
}

/// Widget tree kept in memory and drawn with ratatui.
#[derive(Debug)]
pub struct TermToolkit {
    widgets: HashMap<WidgetId, Widget>,
    root: WidgetId,
    next_id: u64,
    suspended: bool,
    layout: Vec<GroupLayout>,
    layout_passes: usize,
    focus: Option<WidgetId>,
}

impl Default for TermToolkit {
    fn default() -> Self {
        Self::new()
    }
}

impl TermToolkit {
    pub fn new() -> Self {
        let root = WidgetId(0);
        let mut widgets = HashMap::new();
        widgets.insert(root, Widget::new(WidgetKind::Root, None));
        Self {
            widgets,
            root,
            next_id: 1,
            suspended: false,
            layout: Vec::new(),
            layout_passes: 0,
            focus: None,
        }
    }

    pub fn contains(&self, id: WidgetId) -> bool {
        self.widgets.contains_key(&id)
    }

    pub fn parent(&self, id: WidgetId) -> Option<WidgetId> {
        self.widgets.get(&id).and_then(|w| w.parent)
    }

    pub fn children(&self, id: WidgetId) -> &[WidgetId] {
        self.widgets
            .get(&id)
            .map(|w| w.children.as_slice())
            .unwrap_or_default()
    }

    pub fn widget_count(&self) -> usize {
        self.widgets.len()
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Number of layout passes run so far.
    pub fn layout_passes(&self) -> usize {
        self.layout_passes
    }

    /// Groups and their rows as of the last layout pass.
    pub fn layout(&self) -> &[GroupLayout] {
        &self.layout
    }

    pub fn focus(&self) -> Option<WidgetId> {
        self.focus
    }

    /// Moves focus to the next (or previous) visible line edit in layout
    /// order. Gaining focus clears the selection.
    pub fn focus_next(&mut self, forward: bool) {
        let order: Vec<_> = self
            .layout
            .iter()
            .flat_map(|g| g.rows.iter().map(|r| r.value))
            .filter(|id| self.is_visible(*id))
            .collect();
        if order.is_empty() {
            self.focus = None;
            return;
        }

        let len = order.len();
        let next = match self.focus.and_then(|f| order.iter().position(|id| *id == f)) {
            None if forward => 0,
            None => len - 1,
            Some(i) if forward => (i + 1) % len,
            Some(i) => (i + len - 1) % len,
        };
        self.set_focus(Some(order[next]));
    }

    pub fn set_focus(&mut self, id: Option<WidgetId>) {
        if self.focus == id {
            return;
        }
        self.focus = id;
        if let Some(id) = id {
            self.set_text_selection(id, 0, 0);
        }
    }

    pub fn select_all(&mut self) {
        if let Some(id) = self.focus {
            let len = self.text(id).chars().count();
            self.set_text_selection(id, 0, len);
        }
    }

    /// Moves the end of the focused selection by `delta` characters.
    pub fn extend_selection(&mut self, delta: isize) {
        let Some(id) = self.focus else {
            return;
        };
        let (start, end) = self.text_selection(id);
        let end = end.saturating_add_signed(delta).max(start);
        self.set_text_selection(id, start, end);
    }

    fn insert(&mut self, kind: WidgetKind, parent: WidgetId) -> Result<WidgetId, Error> {
        let id = WidgetId(self.next_id);
        let parent_widget = self
            .widgets
            .get_mut(&parent)
            .ok_or(Error::UnknownWidget(parent))?;
        parent_widget.children.push(id);
        self.next_id += 1;

        self.widgets.insert(id, Widget::new(kind, Some(parent)));
        self.structure_changed();
        Ok(id)
    }

    fn structure_changed(&mut self) {
        if !self.suspended {
            self.relayout();
        }
    }

    fn relayout(&mut self) {
        let mut layout = Vec::new();
        for group in self.children(self.root) {
            let Some(w) = self.widgets.get(group) else {
                continue;
            };
            if w.kind != WidgetKind::Group {
                continue;
            }

            let mut cells: HashMap<usize, (Option<WidgetId>, Option<WidgetId>)> = HashMap::new();
            for child in &w.children {
                let Some(c) = self.widgets.get(child) else {
                    continue;
                };
                match (c.kind, c.cell) {
                    (WidgetKind::Label, Some((row, _))) => {
                        cells.entry(row).or_default().0 = Some(*child)
                    }
                    (WidgetKind::LineEdit, Some((row, _))) => {
                        cells.entry(row).or_default().1 = Some(*child)
                    }
                    _ => {}
                }
            }

            let mut rows: Vec<_> = cells
                .into_iter()
                .filter_map(|(row, (label, value))| {
                    Some((
                        row,
                        GridRow {
                            label: label?,
                            value: value?,
                        },
                    ))
                })
                .collect();
            rows.sort_by_key(|(row, _)| *row);
            layout.push(GroupLayout {
                group: *group,
                rows: rows.into_iter().map(|(_, r)| r).collect(),
            });
        }
        self.layout = layout;
        self.layout_passes += 1;
        trace!(passes = self.layout_passes, "layout pass");
    }

    fn dispose(&mut self, id: WidgetId) {
        let Some(widget) = self.widgets.remove(&id) else {
            return;
        };
        if self.focus == Some(id) {
            self.focus = None;
        }
        for child in widget.children {
            self.dispose(child);
        }
    }
}

impl Toolkit for TermToolkit {
    fn root(&self) -> WidgetId {
        self.root
    }

    fn new_group(&mut self, parent: WidgetId) -> Result<WidgetId, Error> {
        self.insert(WidgetKind::Group, parent)
    }

    fn new_label(&mut self, parent: WidgetId) -> Result<WidgetId, Error> {
        self.insert(WidgetKind::Label, parent)
    }

    fn new_line_edit(&mut self, parent: WidgetId) -> Result<WidgetId, Error> {
        self.insert(WidgetKind::LineEdit, parent)
    }

    fn text(&self, id: WidgetId) -> &str {
        self.widgets.get(&id).map_or("", |w| w.text.as_str())
    }

    fn set_text(&mut self, id: WidgetId, text: &str) {
        if let Some(w) = self.widgets.get_mut(&id) {
            w.text = text.into();
            w.selection = (0, 0);
        }
    }

    fn title(&self, id: WidgetId) -> &str {
        self.text(id)
    }

    fn set_title(&mut self, id: WidgetId, title: &str) {
        if let Some(w) = self.widgets.get_mut(&id) {
            w.text = title.into();
        }
    }

    fn is_visible(&self, id: WidgetId) -> bool {
        self.widgets.get(&id).is_some_and(|w| w.visible)
    }

    fn set_visible(&mut self, id: WidgetId, visible: bool) {
        if let Some(w) = self.widgets.get_mut(&id) {
            w.visible = visible;
        }
    }

    fn text_selection(&self, id: WidgetId) -> (usize, usize) {
        self.widgets.get(&id).map_or((0, 0), |w| w.selection)
    }

    fn set_text_selection(&mut self, id: WidgetId, start: usize, end: usize) {
        if let Some(w) = self.widgets.get_mut(&id) {
            let len = w.text.chars().count();
            let end = end.min(len);
            w.selection = (start.min(end), end);
        }
    }

    fn set_grid_cell(&mut self, id: WidgetId, row: usize, column: usize) {
        if let Some(w) = self.widgets.get_mut(&id) {
            w.cell = Some((row, column));
            self.structure_changed();
        }
    }

    fn remove(&mut self, id: WidgetId) {
        if id == self.root {
            return;
        }
        if let Some(parent) = self.parent(id)
            && let Some(p) = self.widgets.get_mut(&parent)
        {
            p.children.retain(|c| *c != id);
        }
        self.dispose(id);
        self.structure_changed();
    }

    fn set_suspended(&mut self, suspended: bool) {
        let resumed = self.suspended && !suspended;
        self.suspended = suspended;
        if resumed {
            self.relayout();
        }
    }
}
