//! WASM bindings for the invoice annotator
//!
//! All editor state lives in Rust inside [`AnnotatorSession`]. JavaScript
//! forwards pointer and keyboard events, rasterizes pages with its own PDF
//! renderer, and paints the overlay from `overlay()`.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { AnnotatorSession, saveDocument } from './pkg/annotator_wasm.js';
//!
//! await init();
//!
//! const session = new AnnotatorSession("INV-0042", bytes, JSON.stringify(assets));
//!
//! const req = session.beginRender();
//! const pixels = await renderWithPdfJs(req.page, req.scale);
//! if (session.isRenderCurrent(req.generation)) paint(pixels);
//!
//! canvas.onpointerdown = (e) => session.pointerDown(e.offsetX, e.offsetY) && redraw(session.overlay());
//! document.onkeydown = (e) => session.keyDown(e.key, e.ctrlKey, e.metaKey) && redraw(session.overlay());
//!
//! const skipped = await saveDocument(session.prepareSave(), async (bytes) => upload(bytes));
//! ```

pub mod errors;
pub mod fetch;
pub mod session;

use annotator_core::bake::{bake, BakeOptions};
use annotator_core::element::PlacedElement;
use annotator_core::error::AnnotatorError;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

pub use errors::to_js_error;
pub use fetch::FetchAssets;
pub use session::AnnotatorSession;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

#[wasm_bindgen]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Everything a bake needs, copied out of a session so the session stays
/// editable while the save runs
#[wasm_bindgen]
pub struct SaveJob {
    bytes: Vec<u8>,
    elements: Vec<PlacedElement>,
    options: BakeOptions,
}

impl SaveJob {
    pub(crate) fn new(bytes: Vec<u8>, elements: Vec<PlacedElement>, options: BakeOptions) -> Self {
        Self {
            bytes,
            elements,
            options,
        }
    }
}

#[wasm_bindgen]
impl SaveJob {
    #[wasm_bindgen(getter, js_name = elementCount)]
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }
}

/// Bake the job's elements into its document and return the new bytes
#[wasm_bindgen(js_name = bakeDocument)]
pub async fn bake_document(job: SaveJob) -> Result<js_sys::Uint8Array, JsValue> {
    let report = bake(&job.bytes, &job.elements, &FetchAssets, &job.options)
        .await
        .map_err(|e| to_js_error(&e))?;
    Ok(js_sys::Uint8Array::from(report.bytes.as_slice()))
}

/// Bake, then hand the bytes to `on_save`. `on_save` may return a promise;
/// a throw or rejection is reported as a save failure.
///
/// Resolves to the list of elements that had to be skipped.
#[wasm_bindgen(js_name = saveDocument)]
pub async fn save_document(job: SaveJob, on_save: js_sys::Function) -> Result<JsValue, JsValue> {
    let report = bake(&job.bytes, &job.elements, &FetchAssets, &job.options)
        .await
        .map_err(|e| to_js_error(&e))?;

    let bytes = js_sys::Uint8Array::from(report.bytes.as_slice());
    let returned = on_save
        .call1(&JsValue::NULL, &bytes)
        .map_err(|e| save_failed(&e))?;
    if let Ok(promise) = returned.dyn_into::<js_sys::Promise>() {
        JsFuture::from(promise).await.map_err(|e| save_failed(&e))?;
    }

    let skipped: Vec<errors::SkippedPayload> =
        report.skipped.iter().map(errors::SkippedPayload::from).collect();
    serde_wasm_bindgen::to_value(&skipped)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

fn save_failed(reason: &JsValue) -> JsValue {
    let message = reason
        .as_string()
        .or_else(|| {
            reason
                .dyn_ref::<js_sys::Error>()
                .map(|e| String::from(e.message()))
        })
        .unwrap_or_else(|| format!("{:?}", reason));
    to_js_error(&AnnotatorError::Save(message))
}
