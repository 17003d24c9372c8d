//! Catalog persistence and public media references.
//!
//! The catalog is one pretty-printed JSON document. The previous run's
//! document doubles as the prior snapshot: only its per-track `added`
//! timestamps are read back, keyed by store key. Actual media uploads
//! are out of scope; [`MediaStore`] only maps a store key to a public
//! URL-like reference.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};

use phono_core::model::Catalog;

use crate::error::PipelineResult;

/// Maps store keys to public references for published tracks.
pub trait MediaStore: std::fmt::Debug + Send + Sync {
    /// Public URL-like reference for a store key, or `None` when the
    /// store cannot address it. Never fails hard: a missing reference
    /// degrades the track, it does not drop it.
    fn public_url(&self, store_key: &str) -> Option<String>;
}

/// Media store backed by a URL prefix (local file server, CDN, bucket
/// website). With no base configured every reference is `None`.
#[derive(Debug, Clone, Default)]
pub struct LocalStore {
    base_url: Option<String>,
}

impl LocalStore {
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            base_url: base_url.map(|b| b.trim_end_matches('/').to_string()),
        }
    }
}

impl MediaStore for LocalStore {
    fn public_url(&self, store_key: &str) -> Option<String> {
        self.base_url
            .as_ref()
            .map(|base| format!("{base}/{store_key}"))
    }
}

/// Load the previous catalog document and index its `added` timestamps
/// by store key. A missing or unreadable document is a first run: the
/// index is empty, not an error.
pub fn load_added_index(catalog_path: &Path) -> HashMap<String, DateTime<Utc>> {
    let raw = match std::fs::read_to_string(catalog_path) {
        Ok(raw) => raw,
        Err(_) => return HashMap::new(),
    };
    match serde_json::from_str::<Catalog>(&raw) {
        Ok(catalog) => catalog.added_index(),
        Err(e) => {
            log::warn!(
                "Ignoring unreadable prior catalog {}: {}",
                catalog_path.display(),
                e
            );
            HashMap::new()
        }
    }
}

/// Write the catalog document as pretty-printed JSON.
///
/// # Errors
/// Returns an error when the parent directory cannot be created or the
/// document cannot be serialized or written.
pub fn write_catalog(catalog: &Catalog, catalog_path: &Path) -> PipelineResult<()> {
    if let Some(parent) = catalog_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(catalog)?;
    std::fs::write(catalog_path, json)?;
    log::info!(
        "Wrote catalog with {} tracks to {}",
        catalog.total_tracks,
        catalog_path.display()
    );
    Ok(())
}
