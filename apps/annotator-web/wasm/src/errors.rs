//! Errors as JavaScript sees them

use annotator_core::bake::SkippedElement;
use annotator_core::error::{AnnotatorError, ErrorCategory};
use annotator_core::ElementId;
use serde::Serialize;
use wasm_bindgen::JsValue;

/// Error object thrown into JavaScript
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub category: &'static str,
    pub message: String,
    pub user_message: &'static str,
    /// The editor cannot be used at all (document failed to load)
    pub blocking: bool,
}

impl From<&AnnotatorError> for ErrorPayload {
    fn from(err: &AnnotatorError) -> Self {
        let category = err.category();
        Self {
            category: category_name(category),
            message: err.to_string(),
            user_message: category.user_message(),
            blocking: category.is_blocking(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedPayload {
    pub id: ElementId,
    pub reason: String,
}

impl From<&SkippedElement> for SkippedPayload {
    fn from(skipped: &SkippedElement) -> Self {
        Self {
            id: skipped.id,
            reason: skipped.reason.clone(),
        }
    }
}

pub fn category_name(category: ErrorCategory) -> &'static str {
    match category {
        ErrorCategory::DocumentLoad => "documentLoad",
        ErrorCategory::PageRender => "pageRender",
        ErrorCategory::SaveFailed => "saveFailed",
        ErrorCategory::Generic => "generic",
    }
}

pub fn to_js_error(err: &AnnotatorError) -> JsValue {
    serde_wasm_bindgen::to_value(&ErrorPayload::from(err))
        .unwrap_or_else(|_| JsValue::from_str(&err.to_string()))
}
