//! Pointer and keyboard state machine
//!
//! The engine is the only writer of the annotation store while editing.
//! A gesture takes one history snapshot when it begins. Pointer moves inside
//! the gesture then mutate the element in place, so a whole drag is undone
//! in one step.

use crate::assets::{Asset, AssetKind};
use crate::bake::parse_hex_color;
use crate::config::{EditorConfig, ElementSize};
use crate::coords::{MediaBox, PagePoint, PageRect, ResizeHandle, ScreenPoint};
use crate::element::{ElementId, ElementKind, ElementPatch, PlacedElement};
use crate::error::AnnotatorError;
use crate::history::History;
use crate::store::AnnotationStore;
use crate::text_layout::{line_height, wrap_text, Helvetica};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    #[default]
    Select,
    Text,
    Highlight,
}

impl Tool {
    pub fn from_name(name: &str) -> Option<Tool> {
        match name {
            "select" => Some(Tool::Select),
            "text" => Some(Tool::Text),
            "highlight" => Some(Tool::Highlight),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Tool::Select => "select",
            Tool::Text => "text",
            Tool::Highlight => "highlight",
        }
    }
}

/// Gesture in progress. The active tool is kept next to it on the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureState {
    Idle,
    Dragging {
        id: ElementId,
        pointer_anchor: ScreenPoint,
        element_anchor: PagePoint,
    },
    Resizing {
        id: ElementId,
        handle: ResizeHandle,
        pointer_anchor: ScreenPoint,
        anchor_box: PageRect,
    },
    DrawingHighlight {
        id: ElementId,
        anchor: PagePoint,
    },
}

impl GestureState {
    pub fn is_idle(&self) -> bool {
        matches!(self, GestureState::Idle)
    }
}

/// Page shown on the canvas and the zoom it is shown at
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub page: u32,
    pub scale: f64,
}

/// A key press as reported by the host
#[derive(Debug, Clone, PartialEq)]
pub struct KeyInput {
    /// DOM `KeyboardEvent.key` value
    pub key: String,
    pub ctrl: bool,
    pub meta: bool,
    /// A text field has focus, so editor shortcuts stay off
    pub text_input_focused: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    DeleteSelection,
    Undo,
}

impl KeyInput {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ctrl: false,
            meta: false,
            text_input_focused: false,
        }
    }

    pub fn with_ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn with_meta(mut self) -> Self {
        self.meta = true;
        self
    }

    pub fn in_text_input(mut self) -> Self {
        self.text_input_focused = true;
        self
    }

    pub fn command(&self) -> Option<KeyCommand> {
        if self.text_input_focused {
            return None;
        }
        match self.key.as_str() {
            "Delete" | "Backspace" => Some(KeyCommand::DeleteSelection),
            "z" | "Z" if self.ctrl || self.meta => Some(KeyCommand::Undo),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    PointerDown(ScreenPoint),
    PointerMove(ScreenPoint),
    PointerUp(ScreenPoint),
    Click(ScreenPoint),
    Key(KeyInput),
}

/// Whether the overlay needs to be redrawn after an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Unchanged,
    Redraw,
}

impl From<bool> for EventOutcome {
    fn from(changed: bool) -> Self {
        if changed {
            EventOutcome::Redraw
        } else {
            EventOutcome::Unchanged
        }
    }
}

/// Settings for the next text commit
#[derive(Debug, Clone, PartialEq)]
pub struct TextOptions {
    pub text: String,
    pub font_size: f64,
    pub color: String,
}

/// Element store plus its undo history
#[derive(Debug, Clone)]
pub struct Workspace {
    pub store: AnnotationStore,
    pub history: History,
}

impl Workspace {
    pub fn new(pages: Vec<MediaBox>, history_capacity: usize) -> Self {
        Self {
            store: AnnotationStore::new(pages),
            history: History::new(history_capacity),
        }
    }

    /// Push the current list onto the history before a mutation
    pub fn checkpoint(&mut self) {
        self.history.snapshot(self.store.elements());
    }

    /// Restore the most recent snapshot. Returns false when there is none.
    pub fn undo(&mut self) -> bool {
        match self.history.undo() {
            Some(snapshot) => {
                self.store.replace_all(snapshot);
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InteractionEngine {
    tool: Tool,
    state: GestureState,
    text: TextOptions,
    config: EditorConfig,
}

impl InteractionEngine {
    pub fn new(config: EditorConfig) -> Self {
        let text = TextOptions {
            text: String::new(),
            font_size: config.text.font_size,
            color: config.text.color.clone(),
        };
        Self {
            tool: Tool::Select,
            state: GestureState::Idle,
            text,
            config,
        }
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
    }

    pub fn state(&self) -> &GestureState {
        &self.state
    }

    pub fn text_options(&self) -> &TextOptions {
        &self.text
    }

    pub fn set_pending_text(&mut self, text: impl Into<String>) {
        self.text.text = text.into();
    }

    /// Font size for the next text commit; non-positive sizes are ignored
    pub fn set_text_font_size(&mut self, size: f64) -> bool {
        if size.is_finite() && size > 0.0 {
            self.text.font_size = size;
            true
        } else {
            false
        }
    }

    pub fn set_text_color(&mut self, color: &str) -> Result<(), AnnotatorError> {
        parse_hex_color(color)?;
        self.text.color = color.to_string();
        Ok(())
    }

    pub fn handle(
        &mut self,
        ws: &mut Workspace,
        view: Viewport,
        event: EditorEvent,
    ) -> Result<EventOutcome, AnnotatorError> {
        match event {
            EditorEvent::PointerDown(point) => self.pointer_down(ws, view, point),
            EditorEvent::PointerMove(point) => self.pointer_move(ws, view, point),
            EditorEvent::PointerUp(point) => {
                self.pointer_move(ws, view, point)?;
                Ok(self.finish_gesture(ws))
            }
            EditorEvent::Click(point) => self.click(ws, view, point),
            EditorEvent::Key(input) => Ok(match input.command() {
                Some(KeyCommand::DeleteSelection) => self.delete_selected(ws).into(),
                Some(KeyCommand::Undo) => self.undo(ws).into(),
                None => EventOutcome::Unchanged,
            }),
        }
    }

    fn pointer_down(
        &mut self,
        ws: &mut Workspace,
        view: Viewport,
        point: ScreenPoint,
    ) -> Result<EventOutcome, AnnotatorError> {
        if !self.state.is_idle() {
            return Ok(EventOutcome::Unchanged);
        }
        let bounds = ws.store.media_box(view.page)?.bounds();

        match self.tool {
            Tool::Select => {
                if let Some((id, handle, anchor_box)) = self.handle_at(&ws.store, view, point) {
                    ws.checkpoint();
                    self.state = GestureState::Resizing {
                        id,
                        handle,
                        pointer_anchor: point,
                        anchor_box,
                    };
                    debug!(element = id, ?handle, "Resize started");
                    return Ok(EventOutcome::Redraw);
                }

                let hit = ws
                    .store
                    .hit_test(view.page, point.to_page(view.scale))
                    .and_then(|id| ws.store.get(id))
                    .map(|el| (el.id, el.rect.origin()));
                let Some((id, element_anchor)) = hit else {
                    return Ok(EventOutcome::Unchanged);
                };

                ws.checkpoint();
                ws.store.select(Some(id));
                self.state = GestureState::Dragging {
                    id,
                    pointer_anchor: point,
                    element_anchor,
                };
                debug!(element = id, "Drag started");
                Ok(EventOutcome::Redraw)
            }
            Tool::Highlight => {
                let anchor = point.to_page(view.scale).clamped_to(&bounds);
                ws.checkpoint();
                let id = ws.store.add(
                    view.page,
                    PageRect::new(anchor.x, anchor.y, 0.0, 0.0),
                    ElementKind::Highlight {
                        color: self.config.highlight.color.clone(),
                    },
                )?;
                ws.store.select(Some(id));
                self.state = GestureState::DrawingHighlight { id, anchor };
                debug!(element = id, "Highlight started");
                Ok(EventOutcome::Redraw)
            }
            // Text is committed on click
            Tool::Text => Ok(EventOutcome::Unchanged),
        }
    }

    /// Handle of the selected element under the pointer, nearest first
    fn handle_at(
        &self,
        store: &AnnotationStore,
        view: Viewport,
        point: ScreenPoint,
    ) -> Option<(ElementId, ResizeHandle, PageRect)> {
        let element = store
            .selected_element()
            .filter(|el| el.page == view.page)?;
        ResizeHandle::ALL
            .iter()
            .map(|handle| {
                let corner = element.rect.corner(*handle).to_screen(view.scale);
                (*handle, corner.distance_to(&point))
            })
            .filter(|(_, distance)| *distance <= self.config.handle_hit_radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(handle, _)| (element.id, handle, element.rect))
    }

    fn pointer_move(
        &mut self,
        ws: &mut Workspace,
        view: Viewport,
        point: ScreenPoint,
    ) -> Result<EventOutcome, AnnotatorError> {
        let (id, rect) = match self.state {
            GestureState::Idle => return Ok(EventOutcome::Unchanged),
            GestureState::Dragging {
                id,
                pointer_anchor,
                element_anchor,
            } => {
                let element = self.gesture_element(ws, id)?;
                let delta = (point - pointer_anchor).to_page(view.scale);
                (id, element.rect.with_origin(element_anchor.offset(delta)))
            }
            GestureState::Resizing {
                id,
                handle,
                pointer_anchor,
                anchor_box,
            } => {
                let page = self.gesture_element(ws, id)?.page;
                let bounds = ws.store.media_box(page)?.bounds();
                let moving = anchor_box
                    .corner(handle)
                    .offset((point - pointer_anchor).to_page(view.scale));
                let rect = PageRect::resized(
                    &anchor_box,
                    handle,
                    moving,
                    self.config.min_element_size,
                    &bounds,
                );
                (id, rect)
            }
            GestureState::DrawingHighlight { id, anchor } => {
                let page = self.gesture_element(ws, id)?.page;
                let bounds = ws.store.media_box(page)?.bounds();
                let current = point.to_page(view.scale).clamped_to(&bounds);
                let rect = highlight_rect(anchor, current, self.config.highlight.min_draw_height);
                (id, rect)
            }
        };

        ws.store.update(id, &ElementPatch::rect(rect))?;
        Ok(EventOutcome::Redraw)
    }

    /// Element driven by the active gesture. A gesture whose element has
    /// vanished is dropped.
    fn gesture_element<'a>(
        &mut self,
        ws: &'a Workspace,
        id: ElementId,
    ) -> Result<&'a PlacedElement, AnnotatorError> {
        ws.store.get(id).ok_or_else(|| {
            self.state = GestureState::Idle;
            AnnotatorError::ElementNotFound(id)
        })
    }

    /// End the active gesture where it stands and return to the select tool.
    /// Gestures that changed nothing give back their snapshot.
    pub fn finish_gesture(&mut self, ws: &mut Workspace) -> EventOutcome {
        let state = std::mem::replace(&mut self.state, GestureState::Idle);
        match state {
            GestureState::Idle => return EventOutcome::Unchanged,
            GestureState::Dragging {
                id, element_anchor, ..
            } => {
                if ws.store.get(id).map(|el| el.rect.origin()) == Some(element_anchor) {
                    ws.history.discard_last();
                }
                debug!(element = id, "Drag finished");
            }
            GestureState::Resizing { id, anchor_box, .. } => {
                if ws.store.get(id).map(|el| el.rect) == Some(anchor_box) {
                    ws.history.discard_last();
                }
                debug!(element = id, "Resize finished");
            }
            GestureState::DrawingHighlight { id, .. } => {
                let highlight = &self.config.highlight;
                let undersized = ws.store.get(id).is_some_and(|el| {
                    el.rect.width < highlight.min_width || el.rect.height < highlight.min_height
                });
                if undersized {
                    ws.store.remove(id);
                    ws.history.discard_last();
                    debug!(element = id, "Discarded undersized highlight");
                } else {
                    debug!(element = id, "Highlight finished");
                }
            }
        }
        self.tool = Tool::Select;
        EventOutcome::Redraw
    }

    fn click(
        &mut self,
        ws: &mut Workspace,
        view: Viewport,
        point: ScreenPoint,
    ) -> Result<EventOutcome, AnnotatorError> {
        if !self.state.is_idle() {
            return Ok(EventOutcome::Unchanged);
        }
        match self.tool {
            Tool::Text => self.commit_text(ws, view, point),
            Tool::Select => {
                let on_element = ws
                    .store
                    .hit_test(view.page, point.to_page(view.scale))
                    .is_some();
                if on_element || ws.store.selected().is_none() {
                    return Ok(EventOutcome::Unchanged);
                }
                ws.store.select(None);
                Ok(EventOutcome::Redraw)
            }
            Tool::Highlight => Ok(EventOutcome::Unchanged),
        }
    }

    fn commit_text(
        &mut self,
        ws: &mut Workspace,
        view: Viewport,
        point: ScreenPoint,
    ) -> Result<EventOutcome, AnnotatorError> {
        if self.text.text.trim().is_empty() {
            return Ok(EventOutcome::Unchanged);
        }
        ws.store.media_box(view.page)?;

        let font_size = self.text.font_size;
        let min_size = self.config.min_element_size;
        let width = self.config.text.box_width.max(min_size);
        let lines = wrap_text(&Helvetica, &self.text.text, font_size, width).len();
        let height = (lines as f64 * line_height(font_size, self.config.text.line_height_factor))
            .max(min_size);
        let origin = point.to_page(view.scale);

        ws.checkpoint();
        let id = ws.store.add(
            view.page,
            PageRect::new(origin.x, origin.y, width, height),
            ElementKind::Text {
                text: std::mem::take(&mut self.text.text),
                font_size,
                color: self.text.color.clone(),
            },
        )?;
        ws.store.select(Some(id));
        self.tool = Tool::Select;
        debug!(element = id, lines, "Text committed");
        Ok(EventOutcome::Redraw)
    }

    /// Place a catalog asset centered on the viewed page
    pub fn place_asset(
        &mut self,
        ws: &mut Workspace,
        view: Viewport,
        asset: &Asset,
    ) -> Result<ElementId, AnnotatorError> {
        let size = match asset.kind {
            AssetKind::Stamp => self.config.stamp_size,
            AssetKind::Signature => self.config.signature_size,
        };
        self.place(ws, view, asset.element_kind(), size)
    }

    fn place(
        &mut self,
        ws: &mut Workspace,
        view: Viewport,
        kind: ElementKind,
        size: ElementSize,
    ) -> Result<ElementId, AnnotatorError> {
        self.finish_gesture(ws);
        let media_box = *ws.store.media_box(view.page)?;
        let width = size.width.max(self.config.min_element_size);
        let height = size.height.max(self.config.min_element_size);
        let rect = PageRect::new(
            (media_box.width - width) / 2.0,
            (media_box.height - height) / 2.0,
            width,
            height,
        );

        ws.checkpoint();
        let id = ws.store.add(view.page, rect, kind)?;
        ws.store.select(Some(id));
        self.tool = Tool::Select;
        debug!(element = id, page = view.page, "Asset placed");
        Ok(id)
    }

    /// Remove the selected element. Returns false when nothing is selected.
    pub fn delete_selected(&mut self, ws: &mut Workspace) -> bool {
        if !self.state.is_idle() {
            return false;
        }
        let Some(id) = ws.store.selected() else {
            return false;
        };
        ws.checkpoint();
        ws.store.remove(id);
        debug!(element = id, "Element deleted");
        true
    }

    pub fn undo(&mut self, ws: &mut Workspace) -> bool {
        if !self.state.is_idle() {
            return false;
        }
        let undone = ws.undo();
        debug!(undone, remaining = ws.history.len(), "Undo");
        undone
    }
}

/// Box spanned by a highlight drag from `anchor` to `current`. Height never
/// drops below `min_height`, growing downward unless the drag goes up.
fn highlight_rect(anchor: PagePoint, current: PagePoint, min_height: f64) -> PageRect {
    let dy = current.y - anchor.y;
    let height = dy.abs().max(min_height);
    let y = if dy < 0.0 { anchor.y - height } else { anchor.y };
    PageRect::new(
        anchor.x.min(current.x),
        y,
        (current.x - anchor.x).abs(),
        height,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::AssetRef;

    fn letter() -> MediaBox {
        MediaBox::new(612.0, 792.0)
    }

    fn setup() -> (InteractionEngine, Workspace) {
        (
            InteractionEngine::new(EditorConfig::default()),
            Workspace::new(vec![letter(), letter()], 5),
        )
    }

    fn view(scale: f64) -> Viewport {
        Viewport { page: 1, scale }
    }

    fn pt(x: f64, y: f64) -> ScreenPoint {
        ScreenPoint::new(x, y)
    }

    fn stamp_at(ws: &mut Workspace, rect: PageRect) -> ElementId {
        ws.store
            .add(
                1,
                rect,
                ElementKind::Stamp {
                    asset: AssetRef {
                        asset_id: "paid".to_string(),
                        image_url: "https://cdn.example/paid.png".to_string(),
                    },
                },
            )
            .unwrap()
    }

    fn rect_of(ws: &Workspace, id: ElementId) -> PageRect {
        ws.store.get(id).unwrap().rect
    }

    #[test]
    fn test_pointer_down_on_element_starts_drag() {
        let (mut engine, mut ws) = setup();
        let id = stamp_at(&mut ws, PageRect::new(100.0, 100.0, 50.0, 50.0));

        let outcome = engine
            .handle(&mut ws, view(1.0), EditorEvent::PointerDown(pt(120.0, 120.0)))
            .unwrap();

        assert_eq!(outcome, EventOutcome::Redraw);
        assert!(matches!(engine.state(), GestureState::Dragging { id: d, .. } if *d == id));
        assert_eq!(ws.store.selected(), Some(id));
        assert_eq!(ws.history.len(), 1);
    }

    #[test]
    fn test_drag_divides_by_scale() {
        let (mut engine, mut ws) = setup();
        let id = stamp_at(&mut ws, PageRect::new(100.0, 100.0, 50.0, 50.0));

        engine
            .handle(&mut ws, view(2.0), EditorEvent::PointerDown(pt(240.0, 240.0)))
            .unwrap();
        engine
            .handle(&mut ws, view(2.0), EditorEvent::PointerMove(pt(280.0, 240.0)))
            .unwrap();
        assert_eq!(rect_of(&ws, id), PageRect::new(120.0, 100.0, 50.0, 50.0));

        engine
            .handle(&mut ws, view(2.0), EditorEvent::PointerUp(pt(280.0, 240.0)))
            .unwrap();
        assert!(engine.state().is_idle());
        assert_eq!(ws.history.len(), 1);
    }

    #[test]
    fn test_drag_clamps_to_page() {
        let (mut engine, mut ws) = setup();
        let id = stamp_at(&mut ws, PageRect::new(10.0, 10.0, 50.0, 50.0));

        engine
            .handle(&mut ws, view(1.0), EditorEvent::PointerDown(pt(20.0, 20.0)))
            .unwrap();
        engine
            .handle(&mut ws, view(1.0), EditorEvent::PointerMove(pt(-500.0, 2000.0)))
            .unwrap();
        assert_eq!(rect_of(&ws, id), PageRect::new(0.0, 742.0, 50.0, 50.0));
    }

    #[test]
    fn test_unmoved_drag_leaves_no_history() {
        let (mut engine, mut ws) = setup();
        stamp_at(&mut ws, PageRect::new(100.0, 100.0, 50.0, 50.0));

        engine
            .handle(&mut ws, view(1.0), EditorEvent::PointerDown(pt(110.0, 110.0)))
            .unwrap();
        engine
            .handle(&mut ws, view(1.0), EditorEvent::PointerUp(pt(110.0, 110.0)))
            .unwrap();
        assert!(ws.history.is_empty());
    }

    #[test]
    fn test_handle_grab_starts_resize() {
        let (mut engine, mut ws) = setup();
        let id = stamp_at(&mut ws, PageRect::new(10.0, 10.0, 50.0, 50.0));
        ws.store.select(Some(id));

        // 3px off the se corner at (60, 60)
        engine
            .handle(&mut ws, view(1.0), EditorEvent::PointerDown(pt(62.0, 58.0)))
            .unwrap();
        assert!(matches!(
            engine.state(),
            GestureState::Resizing {
                handle: ResizeHandle::Se,
                ..
            }
        ));

        engine
            .handle(&mut ws, view(1.0), EditorEvent::PointerMove(pt(72.0, 68.0)))
            .unwrap();
        assert_eq!(rect_of(&ws, id), PageRect::new(10.0, 10.0, 60.0, 60.0));
    }

    #[test]
    fn test_handles_need_selection() {
        let (mut engine, mut ws) = setup();
        stamp_at(&mut ws, PageRect::new(10.0, 10.0, 50.0, 50.0));

        engine
            .handle(&mut ws, view(1.0), EditorEvent::PointerDown(pt(60.0, 60.0)))
            .unwrap();
        assert!(matches!(engine.state(), GestureState::Dragging { .. }));
    }

    #[test]
    fn test_resize_respects_minimum() {
        let (mut engine, mut ws) = setup();
        let id = stamp_at(&mut ws, PageRect::new(100.0, 100.0, 50.0, 50.0));
        ws.store.select(Some(id));

        engine
            .handle(&mut ws, view(1.0), EditorEvent::PointerDown(pt(100.0, 100.0)))
            .unwrap();
        engine
            .handle(&mut ws, view(1.0), EditorEvent::PointerMove(pt(300.0, 300.0)))
            .unwrap();
        assert_eq!(rect_of(&ws, id), PageRect::new(130.0, 130.0, 20.0, 20.0));
    }

    #[test]
    fn test_highlight_draw_and_keep() {
        let (mut engine, mut ws) = setup();
        engine.set_tool(Tool::Highlight);

        engine
            .handle(&mut ws, view(1.0), EditorEvent::PointerDown(pt(50.0, 100.0)))
            .unwrap();
        let GestureState::DrawingHighlight { id, .. } = *engine.state() else {
            panic!("expected highlight gesture");
        };
        assert_eq!(ws.store.selected(), Some(id));

        engine
            .handle(&mut ws, view(1.0), EditorEvent::PointerMove(pt(250.0, 103.0)))
            .unwrap();
        assert_eq!(rect_of(&ws, id), PageRect::new(50.0, 100.0, 200.0, 14.0));

        engine
            .handle(&mut ws, view(1.0), EditorEvent::PointerUp(pt(250.0, 103.0)))
            .unwrap();
        assert!(ws.store.get(id).unwrap().is_highlight());
        assert_eq!(engine.tool(), Tool::Select);
        assert_eq!(ws.history.len(), 1);
    }

    #[test]
    fn test_highlight_dragged_upward() {
        let (mut engine, mut ws) = setup();
        engine.set_tool(Tool::Highlight);

        engine
            .handle(&mut ws, view(1.0), EditorEvent::PointerDown(pt(200.0, 300.0)))
            .unwrap();
        engine
            .handle(&mut ws, view(1.0), EditorEvent::PointerUp(pt(100.0, 260.0)))
            .unwrap();
        let el = &ws.store.elements()[0];
        assert_eq!(el.rect, PageRect::new(100.0, 260.0, 100.0, 40.0));
    }

    #[test]
    fn test_tiny_highlight_is_discarded() {
        let (mut engine, mut ws) = setup();
        engine.set_tool(Tool::Highlight);

        engine
            .handle(&mut ws, view(1.0), EditorEvent::PointerDown(pt(50.0, 100.0)))
            .unwrap();
        engine
            .handle(&mut ws, view(1.0), EditorEvent::PointerUp(pt(55.0, 100.0)))
            .unwrap();

        assert!(ws.store.is_empty());
        assert!(ws.history.is_empty());
        assert_eq!(ws.store.selected(), None);
        assert_eq!(engine.tool(), Tool::Select);
    }

    #[test]
    fn test_highlight_tool_ignores_elements() {
        let (mut engine, mut ws) = setup();
        stamp_at(&mut ws, PageRect::new(100.0, 100.0, 50.0, 50.0));
        engine.set_tool(Tool::Highlight);

        engine
            .handle(&mut ws, view(1.0), EditorEvent::PointerDown(pt(110.0, 110.0)))
            .unwrap();
        assert!(matches!(engine.state(), GestureState::DrawingHighlight { .. }));
        assert_eq!(ws.store.elements().len(), 2);
    }

    #[test]
    fn test_text_commit() {
        let (mut engine, mut ws) = setup();
        engine.set_tool(Tool::Text);
        engine.set_pending_text("Approved for payment by accounts payable");
        assert!(engine.set_text_font_size(12.0));

        engine
            .handle(&mut ws, view(2.0), EditorEvent::Click(pt(100.0, 200.0)))
            .unwrap();

        let el = &ws.store.elements()[0];
        // two lines at 12pt in a 200pt box
        assert_eq!(el.rect.x, 50.0);
        assert_eq!(el.rect.y, 100.0);
        assert_eq!(el.rect.width, 200.0);
        assert!((el.rect.height - 2.0 * 14.4).abs() < 1e-9);
        assert_eq!(ws.store.selected(), Some(el.id));
        assert_eq!(engine.tool(), Tool::Select);
        assert!(engine.text_options().text.is_empty());
        assert_eq!(ws.history.len(), 1);
    }

    #[test]
    fn test_text_commit_needs_text() {
        let (mut engine, mut ws) = setup();
        engine.set_tool(Tool::Text);
        engine.set_pending_text("   ");

        let outcome = engine
            .handle(&mut ws, view(1.0), EditorEvent::Click(pt(100.0, 200.0)))
            .unwrap();
        assert_eq!(outcome, EventOutcome::Unchanged);
        assert!(ws.store.is_empty());
        assert_eq!(engine.tool(), Tool::Text);
    }

    #[test]
    fn test_short_text_gets_minimum_height() {
        let (mut engine, mut ws) = setup();
        engine.set_tool(Tool::Text);
        engine.set_pending_text("OK");
        engine.set_text_font_size(8.0);

        engine
            .handle(&mut ws, view(1.0), EditorEvent::Click(pt(10.0, 10.0)))
            .unwrap();
        assert_eq!(ws.store.elements()[0].rect.height, 20.0);
    }

    #[test]
    fn test_click_on_empty_canvas_clears_selection() {
        let (mut engine, mut ws) = setup();
        let id = stamp_at(&mut ws, PageRect::new(100.0, 100.0, 50.0, 50.0));
        ws.store.select(Some(id));

        engine
            .handle(&mut ws, view(1.0), EditorEvent::Click(pt(120.0, 120.0)))
            .unwrap();
        assert_eq!(ws.store.selected(), Some(id));

        let outcome = engine
            .handle(&mut ws, view(1.0), EditorEvent::Click(pt(400.0, 400.0)))
            .unwrap();
        assert_eq!(outcome, EventOutcome::Redraw);
        assert_eq!(ws.store.selected(), None);
    }

    #[test]
    fn test_delete_key() {
        let (mut engine, mut ws) = setup();
        let id = stamp_at(&mut ws, PageRect::new(100.0, 100.0, 50.0, 50.0));
        ws.store.select(Some(id));

        let focused = EditorEvent::Key(KeyInput::new("Delete").in_text_input());
        engine.handle(&mut ws, view(1.0), focused).unwrap();
        assert!(ws.store.get(id).is_some());

        engine
            .handle(&mut ws, view(1.0), EditorEvent::Key(KeyInput::new("Backspace")))
            .unwrap();
        assert!(ws.store.get(id).is_none());
        assert_eq!(ws.store.selected(), None);
        assert_eq!(ws.history.len(), 1);
    }

    #[test]
    fn test_delete_without_selection_is_noop() {
        let (mut engine, mut ws) = setup();
        stamp_at(&mut ws, PageRect::new(100.0, 100.0, 50.0, 50.0));
        assert!(!engine.delete_selected(&mut ws));
        assert!(ws.history.is_empty());
    }

    #[test]
    fn test_undo_shortcuts() {
        assert_eq!(KeyInput::new("z").with_ctrl().command(), Some(KeyCommand::Undo));
        assert_eq!(KeyInput::new("Z").with_meta().command(), Some(KeyCommand::Undo));
        assert_eq!(KeyInput::new("z").command(), None);
        assert_eq!(KeyInput::new("z").with_ctrl().in_text_input().command(), None);
        assert_eq!(KeyInput::new("Enter").command(), None);
    }

    #[test]
    fn test_undo_restores_and_clears_selection() {
        let (mut engine, mut ws) = setup();
        let id = stamp_at(&mut ws, PageRect::new(100.0, 100.0, 50.0, 50.0));
        let before = ws.store.elements().to_vec();

        engine
            .handle(&mut ws, view(1.0), EditorEvent::PointerDown(pt(110.0, 110.0)))
            .unwrap();
        engine
            .handle(&mut ws, view(1.0), EditorEvent::PointerUp(pt(150.0, 110.0)))
            .unwrap();
        assert_eq!(ws.store.selected(), Some(id));

        let outcome = engine
            .handle(&mut ws, view(1.0), EditorEvent::Key(KeyInput::new("z").with_ctrl()))
            .unwrap();
        assert_eq!(outcome, EventOutcome::Redraw);
        assert_eq!(ws.store.elements(), before.as_slice());
        assert_eq!(ws.store.selected(), None);

        let again = engine
            .handle(&mut ws, view(1.0), EditorEvent::Key(KeyInput::new("z").with_ctrl()))
            .unwrap();
        assert_eq!(again, EventOutcome::Unchanged);
    }

    #[test]
    fn test_place_asset_centers_on_page() {
        let (mut engine, mut ws) = setup();
        let asset = Asset {
            id: "ceo".to_string(),
            kind: AssetKind::Signature,
            display_name: "CEO".to_string(),
            image_url: "https://cdn.example/ceo.png".to_string(),
        };
        let id = engine
            .place_asset(&mut ws, Viewport { page: 2, scale: 1.0 }, &asset)
            .unwrap();
        let el = ws.store.get(id).unwrap();
        assert_eq!(el.page, 2);
        assert_eq!(el.rect, PageRect::new(206.0, 356.0, 200.0, 80.0));
        assert_eq!(ws.store.selected(), Some(id));
        assert_eq!(ws.history.len(), 1);
    }

    #[test]
    fn test_pointer_down_on_missing_page() {
        let (mut engine, mut ws) = setup();
        let err = engine
            .handle(
                &mut ws,
                Viewport { page: 9, scale: 1.0 },
                EditorEvent::PointerDown(pt(1.0, 1.0)),
            )
            .unwrap_err();
        assert!(matches!(err, AnnotatorError::PageNotFound(9)));
    }

    #[test]
    fn test_text_color_validation() {
        let (mut engine, _) = setup();
        assert!(engine.set_text_color("#ff0000").is_ok());
        assert!(engine.set_text_color("red").is_err());
        assert_eq!(engine.text_options().color, "#ff0000");
        assert!(!engine.set_text_font_size(0.0));
    }

    #[test]
    fn test_tool_names() {
        for tool in [Tool::Select, Tool::Text, Tool::Highlight] {
            assert_eq!(Tool::from_name(tool.name()), Some(tool));
        }
        assert_eq!(Tool::from_name("eraser"), None);
    }
}
