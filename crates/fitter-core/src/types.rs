//! ============================================================================
//! Core Types for the Virtual Fitter
//! ============================================================================
//! Defines the garment catalog entries, layer slots, placement transforms,
//! and the composite style handed to the webview for rendering.
//! These types are serialized to JSON for IPC with the TypeScript frontend.
//! ============================================================================

use serde::{Deserialize, Serialize};

/// Lower bound for a garment's scale factor
pub const SCALE_MIN: f64 = 0.05;

/// Upper bound for a garment's scale factor
pub const SCALE_MAX: f64 = 1.5;

/// Fine nudge step in percent of the stage (arrow key)
pub const NUDGE_STEP_PCT: f64 = 1.0;

/// Coarse nudge step in percent of the stage (arrow key + modifier)
pub const NUDGE_STEP_COARSE_PCT: f64 = 5.0;

/// Scale step applied per wheel notch / stepper click
pub const SCALE_STEP: f64 = 0.05;

/// Garment layer slots composited onto the mannequin.
/// Declaration order is the fixed stacking order: bottom under top under coat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotKey {
    Bottom,
    Top,
    Coat,
}

impl SlotKey {
    /// All slots in stacking order (also the preselection scan order)
    pub const ALL: [SlotKey; 3] = [SlotKey::Bottom, SlotKey::Top, SlotKey::Coat];

    /// Fixed z-stacking constant: bottom < top < coat
    pub fn z_index(&self) -> u8 {
        match self {
            SlotKey::Bottom => 1,
            SlotKey::Top => 2,
            SlotKey::Coat => 3,
        }
    }

    /// Baseline placement for this slot, tuned against the mannequin art.
    /// Per-garment overrides merge over these field by field.
    pub fn default_transform(&self) -> LayerTransform {
        match self {
            SlotKey::Bottom => LayerTransform {
                offset_x_pct: 0.0,
                offset_y_pct: 18.0,
                scale: 0.52,
            },
            SlotKey::Top => LayerTransform {
                offset_x_pct: 0.0,
                offset_y_pct: -14.0,
                scale: 0.48,
            },
            SlotKey::Coat => LayerTransform {
                offset_x_pct: 0.0,
                offset_y_pct: -16.0,
                scale: 0.55,
            },
        }
    }
}

/// One wearable garment from the storefront catalog.
/// Immutable once fetched; `id` is the identity key for overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: i64,
    pub display_name: String,
    /// Either a `data:` URI built from the inline payload or a plain URL
    pub image_ref: String,
    pub category_label: String,
}

/// Full placement of one garment layer: offsets in percent of the stage
/// relative to a centered anchor, plus a scale factor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerTransform {
    pub offset_x_pct: f64,
    pub offset_y_pct: f64,
    pub scale: f64,
}

impl LayerTransform {
    /// Merge a per-garment patch over this transform. Patch fields win;
    /// absent fields keep the base value.
    pub fn with_patch(self, patch: &TransformPatch) -> LayerTransform {
        LayerTransform {
            offset_x_pct: patch.offset_x_pct.unwrap_or(self.offset_x_pct),
            offset_y_pct: patch.offset_y_pct.unwrap_or(self.offset_y_pct),
            scale: patch.scale.unwrap_or(self.scale),
        }
    }
}

/// Persisted per-garment deviation from the slot default.
/// Entries are created lazily on first adjustment; an absent entry means
/// "use the slot default" exactly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset_x_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset_y_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
}

impl TransformPatch {
    /// Capture a full transform as a patch (all fields present)
    pub fn from_transform(t: LayerTransform) -> Self {
        Self {
            offset_x_pct: Some(t.offset_x_pct),
            offset_y_pct: Some(t.offset_y_pct),
            scale: Some(t.scale),
        }
    }
}

/// One rendered layer of the composite, consumed verbatim by the webview:
/// translate by the offsets from a centered anchor, scale, stack by z.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeLayer {
    pub slot: SlotKey,
    pub item_id: i64,
    pub image_ref: String,
    pub offset_x_pct: f64,
    pub offset_y_pct: f64,
    pub scale: f64,
    pub z_index: u8,
}

/// Per-slot picker state for the frontend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WardrobeSlot {
    pub slot: SlotKey,
    pub items: Vec<CatalogItem>,
    /// Index into `items`, or None for "nothing worn"
    pub selected: Option<usize>,
}

/// Snapshot of the whole wardrobe UI state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WardrobeView {
    pub slots: Vec<WardrobeSlot>,
    pub edit_slot: SlotKey,
    pub catalog_loaded: bool,
}

/// Error types for the fitter
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum FitterError {
    #[error("Catalog failed to load: {0}")]
    CatalogLoad(String),

    #[error("Calibration storage error: {0}")]
    Storage(String),
}
