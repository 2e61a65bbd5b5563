//! Invoice annotation editor core
//!
//! Places stamps, signatures, free text and highlights on the pages of a PDF
//! and bakes them into the page content on save. Everything here is
//! host-agnostic; browser bindings live in the `annotator-wasm` app.
//!
//! - `render`: document loading, zoom and cancellable page renders
//! - `store` / `history`: placed elements, selection and undo snapshots
//! - `interaction`: the pointer and keyboard state machine
//! - `bake`: writes elements into a new copy of the document
//! - `session`: one editing session wiring the above together

pub mod assets;
pub mod bake;
pub mod config;
pub mod coords;
pub mod element;
pub mod error;
pub mod history;
pub mod interaction;
pub mod render;
pub mod session;
pub mod store;
pub mod text_layout;

pub use assets::{Asset, AssetCatalog, AssetKind, AssetSource, InMemoryAssets};
pub use bake::{bake, BakeOptions, BakeReport, SkippedElement};
pub use config::EditorConfig;
pub use coords::{MediaBox, PagePoint, PageRect, ResizeHandle, ScreenPoint};
pub use element::{
    elements_from_json, elements_to_json, ElementId, ElementKind, ElementType, PlacedElement,
};
pub use error::{AnnotatorError, ErrorCategory};
pub use history::History;
pub use interaction::{
    EditorEvent, EventOutcome, GestureState, InteractionEngine, KeyInput, Tool, Viewport, Workspace,
};
pub use render::{
    BlankRasterizer, PageRasterizer, RenderController, RenderOutcome, SourceDocument, Zoom,
};
pub use session::{EditorSession, OverlayItem};
pub use store::AnnotationStore;
