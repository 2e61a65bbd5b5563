//! Editing session for one loaded document
//!
//! Ties the pieces together: the parsed source document, the element store
//! with its history, the interaction engine, zoom and page navigation, and
//! the render controller. Host bindings talk to this type only.

use crate::assets::{AssetCatalog, AssetSource};
use crate::bake::{bake, BakeOptions, BakeReport, SkippedElement};
use crate::config::EditorConfig;
use crate::coords::{ResizeHandle, ScreenPoint, ScreenRect};
use crate::element::{elements_from_json, elements_to_json, ElementId, ElementType, PlacedElement};
use crate::error::AnnotatorError;
use crate::history::History;
use crate::interaction::{
    EditorEvent, EventOutcome, InteractionEngine, KeyInput, TextOptions, Tool, Viewport, Workspace,
};
use crate::render::{
    PageRasterizer, RenderController, RenderOutcome, RenderRequest, SourceDocument, Zoom,
};
use crate::store::AnnotationStore;
use serde::Serialize;
use tracing::{info, warn};

/// Corner grip position in screen space
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HandlePosition {
    pub handle: ResizeHandle,
    pub x: f64,
    pub y: f64,
}

/// One element as the overlay should draw it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayItem {
    pub id: ElementId,
    pub element_type: ElementType,
    pub rect: ScreenRect,
    pub selected: bool,
    /// Empty unless the element is selected
    pub handles: Vec<HandlePosition>,
}

pub struct EditorSession {
    label: String,
    config: EditorConfig,
    document: SourceDocument,
    catalog: AssetCatalog,
    workspace: Workspace,
    engine: InteractionEngine,
    zoom: Zoom,
    page: u32,
    renderer: RenderController,
}

impl EditorSession {
    /// Parse `bytes` and open a session on page 1. The bytes are copied.
    pub fn load(
        label: impl Into<String>,
        bytes: &[u8],
        catalog: AssetCatalog,
        config: EditorConfig,
    ) -> Result<Self, AnnotatorError> {
        let label = label.into();
        let document = SourceDocument::load(bytes)?;
        info!(
            label = %label,
            pages = document.page_count(),
            assets = catalog.len(),
            "Document loaded"
        );

        Ok(Self {
            workspace: Workspace::new(document.pages().to_vec(), config.history_capacity),
            engine: InteractionEngine::new(config.clone()),
            zoom: Zoom::new(config.zoom),
            page: 1,
            renderer: RenderController::new(),
            label,
            config,
            document,
            catalog,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn catalog(&self) -> &AssetCatalog {
        &self.catalog
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_count(&self) -> u32 {
        self.document.page_count()
    }

    pub fn scale(&self) -> f64 {
        self.zoom.value()
    }

    pub fn viewport(&self) -> Viewport {
        Viewport {
            page: self.page,
            scale: self.zoom.value(),
        }
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.workspace.store
    }

    pub fn history(&self) -> &History {
        &self.workspace.history
    }

    pub fn engine(&self) -> &InteractionEngine {
        &self.engine
    }

    pub fn renderer(&self) -> &RenderController {
        &self.renderer
    }

    pub fn elements(&self) -> &[PlacedElement] {
        self.workspace.store.elements()
    }

    pub fn elements_json(&self) -> Result<String, serde_json::Error> {
        elements_to_json(self.elements())
    }

    /// Replace the element list with one exported earlier by
    /// [`elements_json`](Self::elements_json). The list is validated against
    /// this document first; on success the previous list is one undo away.
    pub fn import_elements_json(&mut self, json: &str) -> Result<usize, AnnotatorError> {
        let elements =
            elements_from_json(json).map_err(|e| AnnotatorError::InvalidElements(e.to_string()))?;
        self.workspace.store.validate_import(&elements)?;

        self.engine.finish_gesture(&mut self.workspace);
        self.workspace.checkpoint();
        let count = elements.len();
        self.workspace.store.replace_all(elements);
        info!(label = %self.label, elements = count, "Elements imported");
        Ok(count)
    }

    /// Independent copy of the loaded document
    pub fn document_bytes(&self) -> Vec<u8> {
        self.document.bytes_copy()
    }

    pub fn handle(&mut self, event: EditorEvent) -> Result<EventOutcome, AnnotatorError> {
        let view = self.viewport();
        self.engine.handle(&mut self.workspace, view, event)
    }

    pub fn pointer_down(&mut self, point: ScreenPoint) -> Result<EventOutcome, AnnotatorError> {
        self.handle(EditorEvent::PointerDown(point))
    }

    pub fn pointer_move(&mut self, point: ScreenPoint) -> Result<EventOutcome, AnnotatorError> {
        self.handle(EditorEvent::PointerMove(point))
    }

    pub fn pointer_up(&mut self, point: ScreenPoint) -> Result<EventOutcome, AnnotatorError> {
        self.handle(EditorEvent::PointerUp(point))
    }

    pub fn click(&mut self, point: ScreenPoint) -> Result<EventOutcome, AnnotatorError> {
        self.handle(EditorEvent::Click(point))
    }

    pub fn key(&mut self, input: KeyInput) -> Result<EventOutcome, AnnotatorError> {
        self.handle(EditorEvent::Key(input))
    }

    pub fn tool(&self) -> Tool {
        self.engine.tool()
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.engine.set_tool(tool);
    }

    pub fn text_options(&self) -> &TextOptions {
        self.engine.text_options()
    }

    pub fn set_pending_text(&mut self, text: impl Into<String>) {
        self.engine.set_pending_text(text);
    }

    pub fn set_text_font_size(&mut self, size: f64) -> bool {
        self.engine.set_text_font_size(size)
    }

    pub fn set_text_color(&mut self, color: &str) -> Result<(), AnnotatorError> {
        self.engine.set_text_color(color)
    }

    /// Place the catalog asset `asset_id` centered on the current page
    pub fn place_asset(&mut self, asset_id: &str) -> Result<ElementId, AnnotatorError> {
        let asset = self
            .catalog
            .get(asset_id)
            .ok_or_else(|| AnnotatorError::UnknownAsset(asset_id.to_string()))?;
        let view = self.viewport();
        self.engine.place_asset(&mut self.workspace, view, asset)
    }

    pub fn delete_selected(&mut self) -> bool {
        self.engine.delete_selected(&mut self.workspace)
    }

    pub fn undo(&mut self) -> bool {
        self.engine.undo(&mut self.workspace)
    }

    pub fn zoom_in(&mut self) -> f64 {
        self.before_view_change();
        self.zoom.zoom_in()
    }

    pub fn zoom_out(&mut self) -> f64 {
        self.before_view_change();
        self.zoom.zoom_out()
    }

    pub fn reset_zoom(&mut self) -> f64 {
        self.before_view_change();
        self.zoom.reset()
    }

    pub fn set_zoom(&mut self, value: f64) -> f64 {
        self.before_view_change();
        self.zoom.set(value)
    }

    /// Show `page`, clamped to the document. Clears the selection when the
    /// page actually changes.
    pub fn go_to_page(&mut self, page: u32) -> u32 {
        let target = page.clamp(1, self.page_count());
        if target != self.page {
            self.before_view_change();
            self.workspace.store.select(None);
            self.page = target;
        }
        self.page
    }

    pub fn next_page(&mut self) -> u32 {
        self.go_to_page(self.page.saturating_add(1))
    }

    pub fn previous_page(&mut self) -> u32 {
        self.go_to_page(self.page.saturating_sub(1))
    }

    /// A gesture's screen anchors are only valid for the view they began in
    fn before_view_change(&mut self) {
        self.engine.finish_gesture(&mut self.workspace);
        self.renderer.cancel();
    }

    /// Screen-space boxes for the current page, in paint order
    pub fn overlay(&self) -> Vec<OverlayItem> {
        let scale = self.zoom.value();
        let selected = self.workspace.store.selected();
        self.workspace
            .store
            .list(self.page)
            .into_iter()
            .map(|el| {
                let is_selected = selected == Some(el.id);
                let handles = if is_selected {
                    ResizeHandle::ALL
                        .iter()
                        .map(|handle| {
                            let corner = el.rect.corner(*handle).to_screen(scale);
                            HandlePosition {
                                handle: *handle,
                                x: corner.x,
                                y: corner.y,
                            }
                        })
                        .collect()
                } else {
                    Vec::new()
                };
                OverlayItem {
                    id: el.id,
                    element_type: el.element_type(),
                    rect: el.rect.to_screen(scale),
                    selected: is_selected,
                    handles,
                }
            })
            .collect()
    }

    /// Render the current page at the current zoom, superseding any render
    /// still in flight
    pub async fn render_current_page<R: PageRasterizer>(
        &self,
        rasterizer: &R,
    ) -> Result<RenderOutcome, AnnotatorError> {
        self.renderer
            .render_page(rasterizer, &self.document, self.page, self.zoom.value())
            .await
    }

    /// Start a render of the current view for a rasterizer driven by the
    /// host. The host checks the token before painting.
    pub fn begin_render(&self) -> Result<RenderRequest, AnnotatorError> {
        let media_box = *self.document.media_box(self.page)?;
        Ok(RenderRequest {
            page: self.page,
            media_box,
            scale: self.zoom.value(),
            token: self.renderer.begin(),
        })
    }

    pub async fn bake<A: AssetSource>(&self, assets: &A) -> Result<BakeReport, AnnotatorError> {
        bake(
            self.document.bytes(),
            self.elements(),
            assets,
            &BakeOptions::from_config(&self.config),
        )
        .await
    }

    /// Bake and hand the bytes to `on_save`. A failing callback becomes
    /// [`AnnotatorError::Save`]; the session is left as it was so the user
    /// can retry.
    pub async fn save<A, F>(
        &self,
        assets: &A,
        on_save: F,
    ) -> Result<Vec<SkippedElement>, AnnotatorError>
    where
        A: AssetSource,
        F: FnOnce(Vec<u8>) -> anyhow::Result<()>,
    {
        let report = self.bake(assets).await?;
        let size = report.bytes.len();
        on_save(report.bytes).map_err(|e| {
            warn!(error = %e, "Save callback failed");
            AnnotatorError::Save(format!("{:#}", e))
        })?;
        info!(label = %self.label, bytes = size, "Document saved");
        Ok(report.skipped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::InMemoryAssets;
    use crate::error::ErrorCategory;
    use crate::render::{test_pdf, BlankRasterizer};
    use anyhow::anyhow;

    fn catalog() -> AssetCatalog {
        AssetCatalog::from_json(
            r#"[{"id":"paid","type":"stamp","displayName":"Paid","imageUrl":"https://cdn.example/paid.png"}]"#,
        )
        .unwrap()
    }

    fn session(pages: &[(i64, i64)]) -> EditorSession {
        let pdf = test_pdf::with_pages(pages);
        EditorSession::load("INV-0042", &pdf, catalog(), EditorConfig::default()).unwrap()
    }

    #[test]
    fn test_load_failure_is_blocking() {
        let err = EditorSession::load("x", b"garbage", catalog(), EditorConfig::default())
            .err()
            .unwrap();
        assert!(err.category().is_blocking());
    }

    #[test]
    fn test_navigation_clamps_and_clears_selection() {
        let mut s = session(&[(612, 792), (612, 792), (612, 792)]);
        let id = s.place_asset("paid").unwrap();
        assert_eq!(s.store().selected(), Some(id));

        assert_eq!(s.next_page(), 2);
        assert_eq!(s.store().selected(), None);
        assert_eq!(s.go_to_page(10), 3);
        assert_eq!(s.next_page(), 3);
        assert_eq!(s.go_to_page(0), 1);
        assert_eq!(s.previous_page(), 1);
    }

    #[test]
    fn test_unknown_asset() {
        let mut s = session(&[(612, 792)]);
        let err = s.place_asset("void").unwrap_err();
        assert!(matches!(err, AnnotatorError::UnknownAsset(_)));
        assert!(s.history().is_empty());
    }

    #[test]
    fn test_overlay_scales_and_marks_selection() {
        let mut s = session(&[(612, 792)]);
        let id = s.place_asset("paid").unwrap();
        s.zoom_in();
        s.zoom_in();

        let overlay = s.overlay();
        assert_eq!(overlay.len(), 1);
        let item = &overlay[0];
        assert_eq!(item.id, id);
        assert!(item.selected);
        assert_eq!(item.rect.width, 150.0 * 1.5);
        assert_eq!(item.handles.len(), 4);
        let se = item
            .handles
            .iter()
            .find(|h| h.handle == ResizeHandle::Se)
            .unwrap();
        assert_eq!(se.x, (231.0 + 150.0) * 1.5);
    }

    #[test]
    fn test_overlay_only_shows_current_page() {
        let mut s = session(&[(612, 792), (612, 792)]);
        s.place_asset("paid").unwrap();
        s.go_to_page(2);
        assert!(s.overlay().is_empty());
    }

    #[test]
    fn test_zoom_change_ends_gesture() {
        let mut s = session(&[(612, 792)]);
        s.place_asset("paid").unwrap();
        s.pointer_down(ScreenPoint::new(300.0, 400.0)).unwrap();
        assert!(!s.engine().state().is_idle());
        s.zoom_in();
        assert!(s.engine().state().is_idle());
    }

    #[tokio::test]
    async fn test_render_after_page_change() {
        let mut s = session(&[(100, 100), (200, 300)]);
        s.go_to_page(2);
        let outcome = s.render_current_page(&BlankRasterizer).await.unwrap();
        assert_eq!(
            outcome,
            RenderOutcome::Rendered {
                page: 2,
                scale: 1.0,
                width: 200,
                height: 300
            }
        );
    }

    #[test]
    fn test_page_change_cancels_host_render() {
        let mut s = session(&[(612, 792), (612, 792)]);
        let request = s.begin_render().unwrap();
        assert_eq!(request.surface_size(), (612, 792));
        s.next_page();
        assert!(request.token.is_cancelled());
    }

    #[tokio::test]
    async fn test_failed_save_keeps_elements() {
        let mut s = session(&[(612, 792)]);
        s.set_tool(Tool::Text);
        s.set_pending_text("Approved");
        s.click(ScreenPoint::new(40.0, 40.0)).unwrap();
        let before = s.elements().to_vec();

        let err = s
            .save(&InMemoryAssets::new(), |_| Err(anyhow!("storage offline")))
            .await
            .unwrap_err();
        assert!(matches!(err, AnnotatorError::Save(ref m) if m.contains("storage offline")));
        assert_eq!(ErrorCategory::of(&err), ErrorCategory::SaveFailed);
        assert_eq!(s.elements(), before.as_slice());
    }

    #[tokio::test]
    async fn test_save_hands_bytes_to_callback() {
        let mut s = session(&[(612, 792)]);
        s.place_asset("paid").unwrap();

        let mut saved = None;
        let skipped = s
            .save(&InMemoryAssets::new(), |bytes| {
                saved = Some(bytes);
                Ok(())
            })
            .await
            .unwrap();

        // The stamp image is not available, so only the document is written
        assert_eq!(skipped.len(), 1);
        let bytes = saved.unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_import_replaces_list_and_is_undoable() {
        let mut source = session(&[(612, 792), (612, 792)]);
        source.place_asset("paid").unwrap();
        source.next_page();
        source.place_asset("paid").unwrap();
        let json = source.elements_json().unwrap();

        let mut s = session(&[(612, 792), (612, 792)]);
        s.set_tool(Tool::Text);
        s.set_pending_text("Draft note");
        s.click(ScreenPoint::new(40.0, 40.0)).unwrap();
        let before = s.elements().to_vec();

        assert_eq!(s.import_elements_json(&json).unwrap(), 2);
        assert_eq!(s.elements(), source.elements());

        // New ids never collide with imported ones
        let placed = s.place_asset("paid").unwrap();
        assert!(source.elements().iter().all(|el| el.id != placed));

        assert!(s.undo());
        assert!(s.undo());
        assert_eq!(s.elements(), before.as_slice());
    }

    #[test]
    fn test_import_rejects_list_for_other_document() {
        let mut source = session(&[(612, 792), (612, 792)]);
        source.next_page();
        source.place_asset("paid").unwrap();
        let json = source.elements_json().unwrap();

        let mut s = session(&[(612, 792)]);
        let err = s.import_elements_json(&json).unwrap_err();
        assert!(matches!(err, AnnotatorError::PageNotFound(2)));
        assert!(s.elements().is_empty());
        assert!(!s.history().can_undo());

        let err = s.import_elements_json("{not json").unwrap_err();
        assert!(matches!(err, AnnotatorError::InvalidElements(_)));
    }
}
