//! # Stepbook
//!
//! The authoring core of a building-instruction book editor.
//!
//! A book is a graph of small items: pages hold steps, steps hold a content
//! image, a parts list and callouts, callouts hold steps of their own, and
//! so on down to arrows and their points. Items refer to each other by
//! `{type, id}` references rather than pointers, so the whole document is
//! one plain value that serializes as-is and can be snapshotted for undo.
//!
//! ## Architecture
//!
//! ```text
//! Input (JSON envelope)
//!       ↓
//!   [model]     — Entity kinds, references, geometry
//!       ↓
//!   [store]     — Collections, add/delete/reparent, lookups, edits
//!       ↓
//!   [layout]    — Recursive page → step → callout layout
//!       ↑
//!   [provider]  — Pixel sizes of images and labels
//!   [template]  — Margins, fonts, borders
//! ```

pub mod error;
pub mod layout;
pub mod model;
pub mod provider;
pub mod store;
pub mod template;

use serde::{Deserialize, Serialize};

pub use error::StoreError;
pub use layout::LayoutEngine;
pub use store::Document;

/// Version tag written into every saved envelope.
pub const FORMAT_VERSION: &str = "1";

/// The persisted shape of a document: the full state plus a version tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub version: String,
    pub state: Document,
}

impl Envelope {
    pub fn new(state: Document) -> Self {
        Self {
            version: FORMAT_VERSION.to_string(),
            state,
        }
    }

    pub fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Parse a saved envelope.
pub fn load_json(json: &str) -> Result<Envelope, StoreError> {
    Ok(serde_json::from_str(json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ItemRef, PageKind, Step};

    #[test]
    fn envelope_survives_a_save() {
        let mut doc = Document::default();
        let page = doc.add_page(PageKind::Page, Some(1), None, None).unwrap();
        let step = doc.add_step(ItemRef::page(page), Some(1), None).unwrap();
        let json = Envelope::new(doc).to_json().unwrap();

        let loaded = load_json(&json).unwrap();
        assert_eq!(loaded.version, FORMAT_VERSION);
        assert_eq!(loaded.state.get::<Step>(step).unwrap().number, Some(1));
        assert_eq!(loaded.state.page_for(ItemRef::step(step)), Some(page));
    }

    #[test]
    fn bad_envelope_reports_hint() {
        let err = load_json("{\"version\": 1}").unwrap_err();
        assert!(matches!(err, StoreError::Parse { .. }));
    }
}
