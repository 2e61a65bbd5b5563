use crate::element::ElementId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnnotatorError {
    #[error("Failed to load PDF: {0}")]
    Load(String),

    #[error("Failed to render page {page}: {message}")]
    Render { page: u32, message: String },

    #[error("Failed to bake element {id}: {reason}")]
    ElementBake { id: ElementId, reason: String },

    #[error("Failed to save document: {0}")]
    Save(String),

    #[error("Failed to write annotated document: {0}")]
    Bake(String),

    #[error("Page {0} not found")]
    PageNotFound(u32),

    #[error("Element {0} not found")]
    ElementNotFound(ElementId),

    #[error("Unknown asset: {0}")]
    UnknownAsset(String),

    #[error("Failed to fetch asset {url}: {reason}")]
    AssetFetch { url: String, reason: String },

    #[error("Failed to decode image: {0}")]
    ImageDecode(String),

    #[error("Invalid color: {0}")]
    InvalidColor(String),

    #[error("Invalid element list: {0}")]
    InvalidElements(String),
}

/// Message category shown to the user for a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    DocumentLoad,
    PageRender,
    SaveFailed,
    Generic,
}

impl ErrorCategory {
    /// Resolve any error to a category. Errors that are not `AnnotatorError`
    /// land in `Generic`.
    pub fn of(err: &(dyn std::error::Error + 'static)) -> Self {
        match err.downcast_ref::<AnnotatorError>() {
            Some(AnnotatorError::Load(_)) => ErrorCategory::DocumentLoad,
            Some(AnnotatorError::Render { .. }) => ErrorCategory::PageRender,
            Some(AnnotatorError::Save(_)) | Some(AnnotatorError::Bake(_)) => {
                ErrorCategory::SaveFailed
            }
            _ => ErrorCategory::Generic,
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorCategory::DocumentLoad => "The document could not be opened.",
            ErrorCategory::PageRender => "This page could not be displayed.",
            ErrorCategory::SaveFailed => {
                "Saving failed. Your annotations are still here, try again."
            }
            ErrorCategory::Generic => "Something went wrong.",
        }
    }

    /// Whether the failure blocks the whole editor pane.
    pub fn is_blocking(&self) -> bool {
        matches!(self, ErrorCategory::DocumentLoad)
    }
}

impl AnnotatorError {
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::of(self)
    }
}
