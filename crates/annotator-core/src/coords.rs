//! Coordinate spaces used by the editor
//!
//! Three spaces never mix implicitly:
//! - screen space: CSS pixels relative to the page canvas, top-left origin, y-down
//! - page space: unscaled document units, top-left origin, y-down (element storage)
//! - PDF user space: document units, bottom-left origin, y-up (bake output)
//!
//! Screen <-> page conversion divides or multiplies by the zoom scale.
//! Page -> PDF conversion flips the y axis against the page's MediaBox.

use serde::{Deserialize, Serialize};
use std::ops::Sub;

/// Pointer position in screen space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

/// Difference between two screen points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenDelta {
    pub dx: f64,
    pub dy: f64,
}

/// Position in page space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PagePoint {
    pub x: f64,
    pub y: f64,
}

/// Displacement in page space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageDelta {
    pub dx: f64,
    pub dy: f64,
}

/// Axis-aligned box in page space, `(x, y)` is the top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Box in PDF user space, `(x, y)` is the lower-left corner
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Box in screen space, used for drawing the overlay
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScreenRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Page MediaBox as `[x, y, width, height]` in PDF user space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MediaBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl MediaBox {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width,
            height,
        }
    }

    /// Page-space bounds every element on this page must stay inside
    pub fn bounds(&self) -> PageRect {
        PageRect::new(0.0, 0.0, self.width, self.height)
    }
}

/// Corner grip of a selected element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeHandle {
    Nw,
    Ne,
    Sw,
    Se,
}

impl ResizeHandle {
    pub const ALL: [ResizeHandle; 4] = [
        ResizeHandle::Nw,
        ResizeHandle::Ne,
        ResizeHandle::Sw,
        ResizeHandle::Se,
    ];

    /// The diagonally opposite handle, which stays fixed while this one moves
    pub fn opposite(self) -> ResizeHandle {
        match self {
            ResizeHandle::Nw => ResizeHandle::Se,
            ResizeHandle::Ne => ResizeHandle::Sw,
            ResizeHandle::Sw => ResizeHandle::Ne,
            ResizeHandle::Se => ResizeHandle::Nw,
        }
    }
}

impl Sub for ScreenPoint {
    type Output = ScreenDelta;

    fn sub(self, rhs: ScreenPoint) -> ScreenDelta {
        ScreenDelta {
            dx: self.x - rhs.x,
            dy: self.y - rhs.y,
        }
    }
}

impl ScreenPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Convert to page space at the given zoom scale
    pub fn to_page(self, scale: f64) -> PagePoint {
        PagePoint {
            x: self.x / scale,
            y: self.y / scale,
        }
    }

    pub fn distance_to(&self, other: &ScreenPoint) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

impl ScreenDelta {
    /// Convert a pointer displacement to page units
    pub fn to_page(self, scale: f64) -> PageDelta {
        PageDelta {
            dx: self.dx / scale,
            dy: self.dy / scale,
        }
    }
}

impl PagePoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn to_screen(self, scale: f64) -> ScreenPoint {
        ScreenPoint {
            x: self.x * scale,
            y: self.y * scale,
        }
    }

    pub fn offset(self, delta: PageDelta) -> PagePoint {
        PagePoint {
            x: self.x + delta.dx,
            y: self.y + delta.dy,
        }
    }

    /// Clamp into `[0, width] x [0, height]`
    pub fn clamped_to(self, bounds: &PageRect) -> PagePoint {
        PagePoint {
            x: self.x.clamp(bounds.x, bounds.right()),
            y: self.y.clamp(bounds.y, bounds.bottom()),
        }
    }
}

impl PageRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn origin(&self) -> PagePoint {
        PagePoint::new(self.x, self.y)
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn contains(&self, point: PagePoint) -> bool {
        point.x >= self.x
            && point.x <= self.right()
            && point.y >= self.y
            && point.y <= self.bottom()
    }

    /// Whether the box lies fully inside `bounds`
    pub fn fits_within(&self, bounds: &PageRect) -> bool {
        const EPSILON: f64 = 1e-9;
        self.x >= bounds.x - EPSILON
            && self.y >= bounds.y - EPSILON
            && self.right() <= bounds.right() + EPSILON
            && self.bottom() <= bounds.bottom() + EPSILON
    }

    pub fn corner(&self, handle: ResizeHandle) -> PagePoint {
        match handle {
            ResizeHandle::Nw => PagePoint::new(self.x, self.y),
            ResizeHandle::Ne => PagePoint::new(self.right(), self.y),
            ResizeHandle::Sw => PagePoint::new(self.x, self.bottom()),
            ResizeHandle::Se => PagePoint::new(self.right(), self.bottom()),
        }
    }

    pub fn with_origin(&self, origin: PagePoint) -> PageRect {
        PageRect::new(origin.x, origin.y, self.width, self.height)
    }

    /// Move the box inside `bounds`, shrinking it only when it is larger
    /// than the bounds themselves.
    pub fn clamped_to(&self, bounds: &PageRect) -> PageRect {
        let width = self.width.min(bounds.width).max(0.0);
        let height = self.height.min(bounds.height).max(0.0);
        let x = self.x.clamp(bounds.x, (bounds.right() - width).max(bounds.x));
        let y = self.y.clamp(bounds.y, (bounds.bottom() - height).max(bounds.y));
        PageRect::new(x, y, width, height)
    }

    /// Box produced by moving `handle` of `anchor_box` to `moving`.
    ///
    /// The opposite corner of `anchor_box` never moves. Each side is at
    /// least `min_size` long unless the page edge leaves less room, in which
    /// case the size shrinks to reach the edge.
    pub fn resized(
        anchor_box: &PageRect,
        handle: ResizeHandle,
        moving: PagePoint,
        min_size: f64,
        bounds: &PageRect,
    ) -> PageRect {
        let fixed = anchor_box.corner(handle.opposite());

        let (x, width) = match handle {
            ResizeHandle::Nw | ResizeHandle::Sw => {
                let room = fixed.x - bounds.x;
                let width = (fixed.x - moving.x).max(min_size).min(room);
                (fixed.x - width, width)
            }
            ResizeHandle::Ne | ResizeHandle::Se => {
                let room = bounds.right() - fixed.x;
                let width = (moving.x - fixed.x).max(min_size).min(room);
                (fixed.x, width)
            }
        };

        let (y, height) = match handle {
            ResizeHandle::Nw | ResizeHandle::Ne => {
                let room = fixed.y - bounds.y;
                let height = (fixed.y - moving.y).max(min_size).min(room);
                (fixed.y - height, height)
            }
            ResizeHandle::Sw | ResizeHandle::Se => {
                let room = bounds.bottom() - fixed.y;
                let height = (moving.y - fixed.y).max(min_size).min(room);
                (fixed.y, height)
            }
        };

        PageRect::new(x, y, width, height)
    }

    pub fn to_screen(&self, scale: f64) -> ScreenRect {
        ScreenRect {
            x: self.x * scale,
            y: self.y * scale,
            width: self.width * scale,
            height: self.height * scale,
        }
    }

    /// Convert to PDF user space, flipping the y axis against the MediaBox
    pub fn to_pdf(&self, media_box: &MediaBox) -> PdfRect {
        PdfRect {
            x: media_box.x + self.x,
            y: media_box.y + media_box.height - self.y - self.height,
            width: self.width,
            height: self.height,
        }
    }
}

impl PdfRect {
    pub fn top(&self) -> f64 {
        self.y + self.height
    }
}

/// Baseline y in PDF user space for line `line_index` of a text block whose
/// top-left sits at page-space `top`.
pub fn text_baseline_y(
    media_box: &MediaBox,
    top: f64,
    font_size: f64,
    line_index: usize,
    line_height: f64,
) -> f64 {
    media_box.y + media_box.height - top - font_size - line_index as f64 * line_height
}
