//! Viewport and render control
//!
//! The source document is parsed once into a [`SourceDocument`]. Rendering a
//! page goes through a [`PageRasterizer`]; the [`RenderController`] hands each
//! request a [`RenderToken`] and bumps a generation counter, so any render
//! still in flight is superseded. A superseded render never writes its
//! surface and is reported as [`RenderOutcome::Cancelled`], not as an error.

use crate::config::ZoomConfig;
use crate::coords::MediaBox;
use crate::error::AnnotatorError;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::cell::RefCell;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Original document bytes plus per-page MediaBoxes
#[derive(Debug, Clone)]
pub struct SourceDocument {
    bytes: Vec<u8>,
    pages: Vec<MediaBox>,
}

impl SourceDocument {
    /// Parse the document. The bytes are copied; the caller keeps its buffer.
    pub fn load(bytes: &[u8]) -> Result<Self, AnnotatorError> {
        let doc = Document::load_mem(bytes).map_err(|e| AnnotatorError::Load(e.to_string()))?;
        let pages = page_boxes(&doc);
        if pages.is_empty() {
            return Err(AnnotatorError::Load("Document has no pages".to_string()));
        }
        Ok(Self {
            bytes: bytes.to_vec(),
            pages,
        })
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    pub fn pages(&self) -> &[MediaBox] {
        &self.pages
    }

    pub fn media_box(&self, page: u32) -> Result<&MediaBox, AnnotatorError> {
        page.checked_sub(1)
            .and_then(|index| self.pages.get(index as usize))
            .ok_or(AnnotatorError::PageNotFound(page))
    }

    /// Independent copy of the original bytes for one consumer
    pub fn bytes_copy(&self) -> Vec<u8> {
        self.bytes.clone()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// MediaBox of every page in page order
pub(crate) fn page_boxes(doc: &Document) -> Vec<MediaBox> {
    doc.get_pages()
        .values()
        .map(|page_id| media_box_of(doc, *page_id))
        .collect()
}

/// Read a page's MediaBox, following `Parent` links for inherited values.
/// Falls back to US Letter when no usable box is present.
pub(crate) fn media_box_of(doc: &Document, page_id: ObjectId) -> MediaBox {
    let mut node = doc.get_dictionary(page_id).ok();
    while let Some(dict) = node {
        if let Some(rect) = dict.get(b"MediaBox").ok().and_then(|obj| parse_rect(doc, obj)) {
            return rect;
        }
        node = parent_of(doc, dict);
    }
    MediaBox::new(612.0, 792.0)
}

fn parent_of<'a>(doc: &'a Document, dict: &Dictionary) -> Option<&'a Dictionary> {
    let parent_id = dict.get(b"Parent").ok()?.as_reference().ok()?;
    doc.get_dictionary(parent_id).ok()
}

/// Convert a PDF `[x1 y1 x2 y2]` rectangle to a MediaBox
fn parse_rect(doc: &Document, obj: &Object) -> Option<MediaBox> {
    let arr = match obj {
        Object::Array(a) => a,
        Object::Reference(id) => doc.get_object(*id).ok()?.as_array().ok()?,
        _ => return None,
    };
    if arr.len() != 4 {
        return None;
    }

    let mut values = [0.0f64; 4];
    for (i, obj) in arr.iter().enumerate() {
        values[i] = extract_number(doc, obj)?;
    }

    let (x1, x2) = (values[0].min(values[2]), values[0].max(values[2]));
    let (y1, y2) = (values[1].min(values[3]), values[1].max(values[3]));
    if x2 - x1 <= 0.0 || y2 - y1 <= 0.0 {
        return None;
    }
    Some(MediaBox {
        x: x1,
        y: y1,
        width: x2 - x1,
        height: y2 - y1,
    })
}

pub(crate) fn extract_number(doc: &Document, obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        Object::Reference(id) => extract_number(doc, doc.get_object(*id).ok()?),
        _ => None,
    }
}

/// Zoom factor snapped to the configured step and clamped to the range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Zoom {
    value: f64,
    config: ZoomConfig,
}

impl Zoom {
    pub fn new(config: ZoomConfig) -> Self {
        let mut zoom = Self {
            value: config.initial,
            config,
        };
        zoom.set(config.initial);
        zoom
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    /// Set the zoom, snapping to the nearest step inside `[min, max]`
    pub fn set(&mut self, value: f64) -> f64 {
        let step = self.config.step;
        let snapped = self.config.min + ((value - self.config.min) / step).round() * step;
        self.value = snapped.clamp(self.config.min, self.config.max);
        self.value
    }

    pub fn zoom_in(&mut self) -> f64 {
        self.set(self.value + self.config.step)
    }

    pub fn zoom_out(&mut self) -> f64 {
        self.set(self.value - self.config.step)
    }

    pub fn reset(&mut self) -> f64 {
        self.set(self.config.initial)
    }
}

/// RGBA raster of one rendered page
#[derive(Debug, Clone, PartialEq)]
pub struct RasterSurface {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Cancellation token for one render request
#[derive(Debug, Clone)]
pub struct RenderToken {
    generation: u64,
    latest: Arc<AtomicU64>,
}

impl RenderToken {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True once a newer render has started
    pub fn is_cancelled(&self) -> bool {
        self.latest.load(Ordering::Acquire) != self.generation
    }
}

/// What a rasterizer is asked to draw
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub page: u32,
    pub media_box: MediaBox,
    pub scale: f64,
    pub token: RenderToken,
}

impl RenderRequest {
    /// Pixel size of the surface at this scale
    pub fn surface_size(&self) -> (u32, u32) {
        (
            (self.media_box.width * self.scale).ceil() as u32,
            (self.media_box.height * self.scale).ceil() as u32,
        )
    }
}

/// Turns a page into pixels. Implementations may check
/// `request.token.is_cancelled()` between their own await points and return
/// early; the controller checks again after every await.
pub trait PageRasterizer {
    fn rasterize(
        &self,
        document: &[u8],
        request: &RenderRequest,
    ) -> impl Future<Output = Result<RasterSurface, AnnotatorError>>;
}

/// Rasterizer that produces a white page of the right size. Used headless
/// and where page pixels are painted by the host instead.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlankRasterizer;

impl PageRasterizer for BlankRasterizer {
    async fn rasterize(
        &self,
        _document: &[u8],
        request: &RenderRequest,
    ) -> Result<RasterSurface, AnnotatorError> {
        let (width, height) = request.surface_size();
        Ok(RasterSurface {
            width,
            height,
            pixels: vec![0xFF; width as usize * height as usize * 4],
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderOutcome {
    /// The surface now shows `page` at `scale`; `width`/`height` are in pixels
    Rendered {
        page: u32,
        scale: f64,
        width: u32,
        height: u32,
    },
    /// A newer render superseded this one
    Cancelled,
}

/// Owns the raster surface and serializes writes to it
#[derive(Debug, Default)]
pub struct RenderController {
    latest: Arc<AtomicU64>,
    surface: RefCell<Option<(u32, f64, RasterSurface)>>,
}

impl RenderController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new render generation, cancelling any render in flight
    pub fn begin(&self) -> RenderToken {
        let generation = self.latest.fetch_add(1, Ordering::AcqRel) + 1;
        RenderToken {
            generation,
            latest: Arc::clone(&self.latest),
        }
    }

    /// Cancel whatever is in flight without starting anything new
    pub fn cancel(&self) {
        self.latest.fetch_add(1, Ordering::AcqRel);
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.latest.load(Ordering::Acquire) == generation
    }

    /// Render `page` of `document` at `scale` and store the surface.
    pub async fn render_page<R: PageRasterizer>(
        &self,
        rasterizer: &R,
        document: &SourceDocument,
        page: u32,
        scale: f64,
    ) -> Result<RenderOutcome, AnnotatorError> {
        let token = self.begin();
        let media_box = *document.media_box(page)?;
        let request = RenderRequest {
            page,
            media_box,
            scale,
            token: token.clone(),
        };

        let bytes = document.bytes_copy();
        let result = rasterizer.rasterize(&bytes, &request).await;

        if token.is_cancelled() {
            debug!(page, generation = token.generation(), "Render superseded");
            return Ok(RenderOutcome::Cancelled);
        }

        let surface = result.map_err(|e| match e {
            AnnotatorError::Render { .. } => e,
            other => AnnotatorError::Render {
                page,
                message: other.to_string(),
            },
        })?;

        let outcome = RenderOutcome::Rendered {
            page,
            scale,
            width: surface.width,
            height: surface.height,
        };
        *self.surface.borrow_mut() = Some((page, scale, surface));
        Ok(outcome)
    }

    /// Page and scale currently on the surface
    pub fn displayed(&self) -> Option<(u32, f64)> {
        self.surface
            .borrow()
            .as_ref()
            .map(|(page, scale, _)| (*page, *scale))
    }

    pub fn with_surface<T>(&self, f: impl FnOnce(&RasterSurface) -> T) -> Option<T> {
        self.surface.borrow().as_ref().map(|(_, _, surface)| f(surface))
    }
}
