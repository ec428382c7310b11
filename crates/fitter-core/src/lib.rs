//! ============================================================================
//! FITTER-CORE: The Virtual Fitter's Brain
//! ============================================================================
//! This crate handles all client-state logic for the virtual fitter:
//! - Catalog fetch & slot classification via reqwest
//! - Layer selection, placement transforms, and override merging
//! - Persisted per-garment calibration via redb
//! ============================================================================

pub mod catalog;
pub mod compositor;
pub mod store;
pub mod types;

// Re-export main types for convenience
pub use catalog::{CatalogClient, ProductRecord, SlotCatalog};
pub use compositor::OutfitCompositor;
pub use store::{OverrideStore, StoreStats};
pub use types::*;
