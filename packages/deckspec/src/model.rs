//! Spec document model and structural validation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::SpecError;

/// Tolerance for floating-point boundary comparisons.
const EPSILON: f64 = 1e-9;

/// A complete presentation spec document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlideSpec {
    /// Arbitrary styling tokens (colors, fonts, spacing scales).
    #[serde(default)]
    pub tokens: Map<String, Value>,

    /// Numeric design constraints.
    #[serde(default)]
    pub constraints: Constraints,

    /// Ordered slide layouts. Must be non-empty.
    pub layouts: Vec<Layout>,
}

/// Numeric design constraints for a spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Constraints {
    /// Margin every placeholder must respect on all four sides,
    /// as a fraction of the canvas. Valid range is [0, 0.5].
    #[serde(rename = "safeMargin", default)]
    pub safe_margin: f64,

    /// Additional named constraints carried through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single slide layout: a named arrangement of placeholders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub name: String,
    pub placeholders: Vec<Placeholder>,
}

/// A positioned content region within a layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placeholder {
    pub id: String,

    /// Optional semantic role (title, body, image, ...).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    pub geometry: Geometry,
}

/// A rectangle on the normalized 0..1 canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Geometry {
    /// Whether two rectangles overlap with positive area.
    /// Shared edges do not count as overlap.
    pub fn overlaps(&self, other: &Geometry) -> bool {
        self.x + EPSILON < other.x + other.w
            && other.x + EPSILON < self.x + self.w
            && self.y + EPSILON < other.y + other.h
            && other.y + EPSILON < self.y + self.h
    }
}

impl SlideSpec {
    /// Validate the structural constraints of the document.
    ///
    /// Checks, in order: safe margin range, non-empty layouts, non-empty
    /// layout names and placeholder lists, non-empty placeholder ids,
    /// positive extents, safe-margin containment on all four sides, and
    /// sibling overlap within each layout.
    pub fn validate(&self) -> Result<(), SpecError> {
        let margin = self.constraints.safe_margin;
        if !(0.0..=0.5).contains(&margin) {
            return Err(SpecError::Validation(format!(
                "safeMargin {} outside [0, 0.5]",
                margin
            )));
        }

        if self.layouts.is_empty() {
            return Err(SpecError::Validation("layouts must not be empty".into()));
        }

        for (li, layout) in self.layouts.iter().enumerate() {
            if layout.name.is_empty() {
                return Err(SpecError::Validation(format!(
                    "layouts[{}] has an empty name",
                    li
                )));
            }
            if layout.placeholders.is_empty() {
                return Err(SpecError::Validation(format!(
                    "layout {:?} has no placeholders",
                    layout.name
                )));
            }

            for ph in &layout.placeholders {
                if ph.id.is_empty() {
                    return Err(SpecError::Validation(format!(
                        "layout {:?} has a placeholder with an empty id",
                        layout.name
                    )));
                }
                let g = &ph.geometry;
                if g.w <= 0.0 || g.h <= 0.0 {
                    return Err(SpecError::Validation(format!(
                        "placeholder {:?} in layout {:?} has non-positive extent",
                        ph.id, layout.name
                    )));
                }
                if g.x < margin - EPSILON
                    || g.y < margin - EPSILON
                    || g.x + g.w > 1.0 - margin + EPSILON
                    || g.y + g.h > 1.0 - margin + EPSILON
                {
                    return Err(SpecError::Validation(format!(
                        "placeholder {:?} in layout {:?} violates safeMargin {}",
                        ph.id, layout.name, margin
                    )));
                }
            }

            for (i, a) in layout.placeholders.iter().enumerate() {
                for b in &layout.placeholders[i + 1..] {
                    if a.geometry.overlaps(&b.geometry) {
                        return Err(SpecError::Validation(format!(
                            "placeholders {:?} and {:?} overlap in layout {:?}",
                            a.id, b.id, layout.name
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}
