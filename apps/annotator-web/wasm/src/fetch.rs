//! Asset bytes fetched with the browser's `fetch()`

use annotator_core::assets::{decode_data_url, AssetSource};
use annotator_core::error::AnnotatorError;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Request, RequestInit, RequestMode, Response};

/// Fetches stamp and signature images over HTTP. `data:` URLs are decoded
/// locally.
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchAssets;

impl AssetSource for FetchAssets {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, AnnotatorError> {
        if url.starts_with("data:") {
            return decode_data_url(url);
        }
        fetch_bytes(url)
            .await
            .map_err(|e| AnnotatorError::AssetFetch {
                url: url.to_string(),
                reason: e.as_string().unwrap_or_else(|| format!("{:?}", e)),
            })
    }
}

async fn fetch_bytes(url: &str) -> Result<Vec<u8>, JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("No window"))?;

    let opts = RequestInit::new();
    opts.set_method("GET");
    opts.set_mode(RequestMode::Cors);
    let request = Request::new_with_str_and_init(url, &opts)?;

    let response = JsFuture::from(window.fetch_with_request(&request)).await?;
    let response: Response = response.dyn_into()?;
    if !response.ok() {
        return Err(JsValue::from_str(&format!("HTTP {}", response.status())));
    }

    let buffer = JsFuture::from(response.array_buffer()?).await?;
    Ok(js_sys::Uint8Array::new(&buffer).to_vec())
}
