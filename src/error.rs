//! Structured error types for the document store.
//!
//! Only caller bugs and malformed input surface as errors. Stale references
//! met during lookups or layout are not errors: they resolve to `None` and
//! the item is skipped.

use thiserror::Error;

use crate::model::{ItemKind, ItemRef};

/// The unified error type returned by fallible store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A non-cascading delete hit an item whose required children are populated.
    #[error("cannot delete {item}: {children} must be removed first")]
    ReferentialIntegrity {
        item: ItemRef,
        children: &'static str,
    },

    /// A mutation needed a live item but the reference is stale.
    #[error("{0} does not exist")]
    DanglingReference(ItemRef),

    /// The parent kind has no slot for children of the given kind.
    #[error("{parent} cannot own a {child}")]
    NoChildSlot { parent: ItemRef, child: ItemKind },

    /// A single-valued child slot already holds another item.
    #[error("{parent} already has a {}: {existing}", existing.kind)]
    SlotOccupied { parent: ItemRef, existing: ItemRef },

    /// JSON input failed to parse as a document envelope.
    #[error("failed to parse document: {source}{}", format_hint(hint))]
    Parse {
        source: serde_json::Error,
        hint: String,
    },
}

fn format_hint(hint: &str) -> String {
    if hint.is_empty() {
        String::new()
    } else {
        format!("\n  Hint: {hint}")
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        let hint = match e.classify() {
            serde_json::error::Category::Syntax => {
                "Check for trailing commas, missing quotes, or unescaped characters.".to_string()
            }
            serde_json::error::Category::Data => {
                "The JSON is valid but doesn't match the document schema. Check field names and item types.".to_string()
            }
            serde_json::error::Category::Eof => "Unexpected end of input. Is the JSON truncated?".to_string(),
            serde_json::error::Category::Io => String::new(),
        };
        StoreError::Parse { source: e, hint }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_carries_hint() {
        let err: StoreError = serde_json::from_str::<serde_json::Value>("{\"a\": 1,}")
            .unwrap_err()
            .into();
        let msg = err.to_string();
        assert!(msg.starts_with("failed to parse document"));
        assert!(msg.contains("trailing commas"));
    }

    #[test]
    fn integrity_error_names_item_and_children() {
        let err = StoreError::ReferentialIntegrity {
            item: ItemRef::step(3),
            children: "parts",
        };
        assert_eq!(err.to_string(), "cannot delete step#3: parts must be removed first");
    }
}
