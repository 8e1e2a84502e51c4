//! # Deckspec
//!
//! Typed model, validation, and canonical normalization for presentation
//! spec documents.
//!
//! A spec document describes a presentation's design: styling `tokens`,
//! numeric `constraints` (including the safe margin every placeholder must
//! respect), and an ordered list of `layouts`, each placing named
//! placeholders on a normalized 0..1 canvas.
//!
//! ## Transport forms
//!
//! Specs reach consumers in several shapes depending on where they were
//! stored and which driver read them back:
//!
//! - a parsed JSON document (`serde_json::Value` object)
//! - JSON text
//! - raw JSON bytes
//! - a base64 string wrapping JSON text (the artifact of writing bytes
//!   through a JSON-marshaling layer)
//!
//! [`normalize::normalize_value`] and [`normalize::normalize_bytes`] accept
//! all of these and produce canonical bytes that are identical regardless
//! of which form the document arrived in. Consumers that hash, diff, or
//! hand the document to a renderer should always go through normalization.

pub mod model;
pub mod normalize;

pub use model::{Constraints, Geometry, Layout, Placeholder, SlideSpec};
pub use normalize::{canonical_bytes, normalize_bytes, normalize_value, parse_bytes, parse_value};

use thiserror::Error;

/// Errors produced while parsing or validating a spec document.
#[derive(Debug, Error)]
pub enum SpecError {
    /// The document could not be decoded into a spec in any supported form.
    #[error("malformed spec document: {0}")]
    Malformed(String),

    /// The document decoded but violates a structural constraint.
    #[error("spec validation failed: {0}")]
    Validation(String),
}
