//! Session object exported to JavaScript

use crate::errors::to_js_error;
use crate::SaveJob;
use annotator_core::assets::AssetCatalog;
use annotator_core::bake::BakeOptions;
use annotator_core::config::EditorConfig;
use annotator_core::coords::ScreenPoint;
use annotator_core::interaction::{EventOutcome, KeyInput, Tool};
use annotator_core::session::EditorSession;
use serde::Serialize;
use wasm_bindgen::prelude::*;

/// Render parameters handed to the page rasterizer on the JS side
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RenderTarget {
    pub generation: u64,
    pub page: u32,
    pub scale: f64,
    pub width: u32,
    pub height: u32,
}

#[wasm_bindgen]
pub struct AnnotatorSession {
    inner: EditorSession,
}

#[wasm_bindgen]
impl AnnotatorSession {
    /// Open a session on `bytes` with the default configuration.
    /// `catalog_json` is an array of `{id, type, displayName, imageUrl}`.
    #[wasm_bindgen(constructor)]
    pub fn new(label: &str, bytes: &[u8], catalog_json: &str) -> Result<AnnotatorSession, JsValue> {
        Self::open(label, bytes, catalog_json, EditorConfig::default())
    }

    /// Open a session with a TOML editor configuration
    #[wasm_bindgen(js_name = withConfig)]
    pub fn with_config(
        label: &str,
        bytes: &[u8],
        catalog_json: &str,
        config_toml: &str,
    ) -> Result<AnnotatorSession, JsValue> {
        let config = EditorConfig::from_toml_str(config_toml)
            .map_err(|e| JsValue::from_str(&format!("{:#}", e)))?;
        Self::open(label, bytes, catalog_json, config)
    }

    fn open(
        label: &str,
        bytes: &[u8],
        catalog_json: &str,
        config: EditorConfig,
    ) -> Result<AnnotatorSession, JsValue> {
        let catalog = AssetCatalog::from_json(catalog_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid asset catalog: {}", e)))?;
        let inner =
            EditorSession::load(label, bytes, catalog, config).map_err(|e| to_js_error(&e))?;
        Ok(Self { inner })
    }

    #[wasm_bindgen(getter)]
    pub fn label(&self) -> String {
        self.inner.label().to_string()
    }

    #[wasm_bindgen(getter, js_name = pageCount)]
    pub fn page_count(&self) -> u32 {
        self.inner.page_count()
    }

    #[wasm_bindgen(getter)]
    pub fn page(&self) -> u32 {
        self.inner.page()
    }

    #[wasm_bindgen(getter)]
    pub fn scale(&self) -> f64 {
        self.inner.scale()
    }

    #[wasm_bindgen(getter)]
    pub fn tool(&self) -> String {
        self.inner.tool().name().to_string()
    }

    /// Catalog entries for the asset picker
    pub fn assets(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(self.inner.catalog().assets())
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    // ============ Pointer and keyboard ============

    /// Returns true when the overlay needs a redraw
    #[wasm_bindgen(js_name = pointerDown)]
    pub fn pointer_down(&mut self, x: f64, y: f64) -> Result<bool, JsValue> {
        redraw(self.inner.pointer_down(ScreenPoint::new(x, y)))
    }

    #[wasm_bindgen(js_name = pointerMove)]
    pub fn pointer_move(&mut self, x: f64, y: f64) -> Result<bool, JsValue> {
        redraw(self.inner.pointer_move(ScreenPoint::new(x, y)))
    }

    #[wasm_bindgen(js_name = pointerUp)]
    pub fn pointer_up(&mut self, x: f64, y: f64) -> Result<bool, JsValue> {
        redraw(self.inner.pointer_up(ScreenPoint::new(x, y)))
    }

    pub fn click(&mut self, x: f64, y: f64) -> Result<bool, JsValue> {
        redraw(self.inner.click(ScreenPoint::new(x, y)))
    }

    /// Keyboard shortcuts. Ignored while an input or textarea has focus.
    #[wasm_bindgen(js_name = keyDown)]
    pub fn key_down(&mut self, key: &str, ctrl: bool, meta: bool) -> Result<bool, JsValue> {
        let input = KeyInput {
            key: key.to_string(),
            ctrl,
            meta,
            text_input_focused: text_input_focused(),
        };
        redraw(self.inner.key(input))
    }

    // ============ Tools and commands ============

    #[wasm_bindgen(js_name = setTool)]
    pub fn set_tool(&mut self, name: &str) -> Result<(), JsValue> {
        let tool = Tool::from_name(name)
            .ok_or_else(|| JsValue::from_str(&format!("Unknown tool: {}", name)))?;
        self.inner.set_tool(tool);
        Ok(())
    }

    #[wasm_bindgen(js_name = setPendingText)]
    pub fn set_pending_text(&mut self, text: &str) {
        self.inner.set_pending_text(text);
    }

    #[wasm_bindgen(js_name = setTextFontSize)]
    pub fn set_text_font_size(&mut self, size: f64) -> bool {
        self.inner.set_text_font_size(size)
    }

    #[wasm_bindgen(js_name = setTextColor)]
    pub fn set_text_color(&mut self, color: &str) -> Result<(), JsValue> {
        self.inner.set_text_color(color).map_err(|e| to_js_error(&e))
    }

    /// Place a catalog asset centered on the current page, returning its id
    #[wasm_bindgen(js_name = placeAsset)]
    pub fn place_asset(&mut self, asset_id: &str) -> Result<u64, JsValue> {
        self.inner.place_asset(asset_id).map_err(|e| to_js_error(&e))
    }

    #[wasm_bindgen(js_name = deleteSelected)]
    pub fn delete_selected(&mut self) -> bool {
        self.inner.delete_selected()
    }

    pub fn undo(&mut self) -> bool {
        self.inner.undo()
    }

    #[wasm_bindgen(js_name = canUndo)]
    pub fn can_undo(&self) -> bool {
        self.inner.history().can_undo()
    }

    // ============ View ============

    #[wasm_bindgen(js_name = zoomIn)]
    pub fn zoom_in(&mut self) -> f64 {
        self.inner.zoom_in()
    }

    #[wasm_bindgen(js_name = zoomOut)]
    pub fn zoom_out(&mut self) -> f64 {
        self.inner.zoom_out()
    }

    #[wasm_bindgen(js_name = resetZoom)]
    pub fn reset_zoom(&mut self) -> f64 {
        self.inner.reset_zoom()
    }

    #[wasm_bindgen(js_name = goToPage)]
    pub fn go_to_page(&mut self, page: u32) -> u32 {
        self.inner.go_to_page(page)
    }

    #[wasm_bindgen(js_name = nextPage)]
    pub fn next_page(&mut self) -> u32 {
        self.inner.next_page()
    }

    #[wasm_bindgen(js_name = previousPage)]
    pub fn previous_page(&mut self) -> u32 {
        self.inner.previous_page()
    }

    /// Start rendering the current view. Any earlier render is superseded:
    /// check `isRenderCurrent(generation)` before painting its pixels.
    #[wasm_bindgen(js_name = beginRender)]
    pub fn begin_render(&self) -> Result<JsValue, JsValue> {
        let request = self.inner.begin_render().map_err(|e| to_js_error(&e))?;
        let (width, height) = request.surface_size();
        let target = RenderTarget {
            generation: request.token.generation(),
            page: request.page,
            scale: request.scale,
            width,
            height,
        };
        serde_wasm_bindgen::to_value(&target)
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    #[wasm_bindgen(js_name = isRenderCurrent)]
    pub fn is_render_current(&self, generation: u64) -> bool {
        self.inner.renderer().is_current(generation)
    }

    // ============ Output ============

    /// Screen-space boxes and handles for the current page
    pub fn overlay(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.inner.overlay())
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    #[wasm_bindgen(js_name = elementsJson)]
    pub fn elements_json(&self) -> Result<String, JsValue> {
        self.inner
            .elements_json()
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// Replace the elements with a list from `elementsJson`, returning how
    /// many were imported. Invalid lists are rejected and nothing changes.
    #[wasm_bindgen(js_name = importElementsJson)]
    pub fn import_elements_json(&mut self, json: &str) -> Result<usize, JsValue> {
        self.inner
            .import_elements_json(json)
            .map_err(|e| to_js_error(&e))
    }

    /// Copy of the original document bytes
    #[wasm_bindgen(js_name = documentBytes)]
    pub fn document_bytes(&self) -> js_sys::Uint8Array {
        js_sys::Uint8Array::from(self.inner.document_bytes().as_slice())
    }

    /// Snapshot the document and elements for `bakeDocument`/`saveDocument`
    #[wasm_bindgen(js_name = prepareSave)]
    pub fn prepare_save(&self) -> SaveJob {
        SaveJob::new(
            self.inner.document_bytes(),
            self.inner.elements().to_vec(),
            BakeOptions::from_config(self.inner.config()),
        )
    }
}

fn redraw(
    result: Result<EventOutcome, annotator_core::error::AnnotatorError>,
) -> Result<bool, JsValue> {
    result
        .map(|outcome| outcome == EventOutcome::Redraw)
        .map_err(|e| to_js_error(&e))
}

fn text_input_focused() -> bool {
    web_sys::window()
        .and_then(|w| w.document())
        .and_then(|d| d.active_element())
        .is_some_and(|el| is_text_entry_tag(&el.tag_name()))
}

/// Whether an element with this tag name takes typed text
pub(crate) fn is_text_entry_tag(tag: &str) -> bool {
    matches!(
        tag.to_ascii_uppercase().as_str(),
        "INPUT" | "TEXTAREA" | "SELECT"
    )
}
