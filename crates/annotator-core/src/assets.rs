//! Stamp and signature assets
//!
//! The catalog is provided by the host application. Image bytes are pulled
//! through an [`AssetSource`] only when a document is baked.

use crate::element::{AssetRef, ElementKind};
use crate::error::AnnotatorError;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Stamp,
    Signature,
}

/// Catalog entry as delivered by the host application
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AssetKind,
    pub display_name: String,
    pub image_url: String,
}

impl Asset {
    pub fn asset_ref(&self) -> AssetRef {
        AssetRef {
            asset_id: self.id.clone(),
            image_url: self.image_url.clone(),
        }
    }

    /// Element kind created when this asset is placed
    pub fn element_kind(&self) -> ElementKind {
        match self.kind {
            AssetKind::Stamp => ElementKind::Stamp {
                asset: self.asset_ref(),
            },
            AssetKind::Signature => ElementKind::Signature {
                asset: self.asset_ref(),
            },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AssetCatalog {
    assets: Vec<Asset>,
}

impl AssetCatalog {
    pub fn new(assets: Vec<Asset>) -> Self {
        Self { assets }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    pub fn get(&self, id: &str) -> Option<&Asset> {
        self.assets.iter().find(|a| a.id == id)
    }

    pub fn of_kind(&self, kind: AssetKind) -> impl Iterator<Item = &Asset> {
        self.assets.iter().filter(move |a| a.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

/// Where image bytes for stamps and signatures come from
pub trait AssetSource {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<Vec<u8>, AnnotatorError>>;
}

/// Asset bytes held in memory, keyed by URL.
///
/// `data:` URLs with a base64 payload resolve without being registered.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAssets {
    by_url: HashMap<String, Vec<u8>>,
}

impl InMemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: impl Into<String>, bytes: Vec<u8>) {
        self.by_url.insert(url.into(), bytes);
    }

    pub fn with(mut self, url: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.insert(url, bytes);
        self
    }

    fn resolve(&self, url: &str) -> Result<Vec<u8>, AnnotatorError> {
        if let Some(bytes) = self.by_url.get(url) {
            return Ok(bytes.clone());
        }
        if url.starts_with("data:") {
            return decode_data_url(url);
        }
        Err(AnnotatorError::AssetFetch {
            url: url.to_string(),
            reason: "not found".to_string(),
        })
    }
}

impl AssetSource for InMemoryAssets {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, AnnotatorError> {
        self.resolve(url)
    }
}

/// Decode a `data:[<mime>];base64,<payload>` URL
pub fn decode_data_url(url: &str) -> Result<Vec<u8>, AnnotatorError> {
    let fail = |reason: &str| AnnotatorError::AssetFetch {
        url: url.chars().take(64).collect(),
        reason: reason.to_string(),
    };

    let rest = url.strip_prefix("data:").ok_or_else(|| fail("not a data URL"))?;
    let (header, payload) = rest.split_once(',').ok_or_else(|| fail("missing payload"))?;
    if !header.ends_with(";base64") {
        return Err(fail("only base64 data URLs are supported"));
    }
    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| fail(&e.to_string()))
}
