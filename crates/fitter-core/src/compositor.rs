//! ============================================================================
//! Outfit Compositor - Layer Selection, Placement & Calibration
//! ============================================================================
//! The client-state core of the virtual fitter:
//! - Tracks the selected garment per layer slot (None = nothing worn)
//! - Merges per-garment overrides over slot placement defaults
//! - Persists the override map wholesale on every adjustment
//! - Emits the layered composite style the webview renders verbatim
//! ============================================================================

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::catalog::SlotCatalog;
use crate::store::OverrideStore;
use crate::types::{
    CatalogItem, CompositeLayer, LayerTransform, SlotKey, TransformPatch, WardrobeSlot,
    WardrobeView, SCALE_MAX, SCALE_MIN,
};

/// Per-slot selection. None is a first-class state, always cyclable.
#[derive(Debug, Clone, Copy, Default)]
struct SelectionState {
    bottom: Option<usize>,
    top: Option<usize>,
    coat: Option<usize>,
}

impl SelectionState {
    fn get(&self, slot: SlotKey) -> Option<usize> {
        match slot {
            SlotKey::Bottom => self.bottom,
            SlotKey::Top => self.top,
            SlotKey::Coat => self.coat,
        }
    }

    fn set(&mut self, slot: SlotKey, value: Option<usize>) {
        match slot {
            SlotKey::Bottom => self.bottom = value,
            SlotKey::Top => self.top = value,
            SlotKey::Coat => self.coat = value,
        }
    }

    fn clear_all(&mut self) {
        *self = SelectionState::default();
    }
}

/// The outfit compositor state machine.
///
/// Storage failures never surface: the compositor degrades to an empty
/// in-memory override map on read errors and keeps running unpersisted
/// on write errors.
pub struct OutfitCompositor {
    catalog: SlotCatalog,
    catalog_loaded: bool,
    selection: SelectionState,
    edit_slot: SlotKey,
    overrides: HashMap<i64, TransformPatch>,
    applied_preselections: HashSet<i64>,
    store: Option<OverrideStore>,
}

impl OutfitCompositor {
    /// Create a compositor, loading persisted overrides from the store.
    /// `store: None` runs fully in-memory (degraded persistence mode).
    pub fn new(store: Option<OverrideStore>) -> Self {
        let overrides = match store.as_ref().map(OverrideStore::load) {
            Some(Ok(map)) => {
                if !map.is_empty() {
                    info!("Loaded {} persisted garment overrides", map.len());
                }
                map
            }
            Some(Err(e)) => {
                warn!("Failed to read persisted overrides, starting empty: {}", e);
                HashMap::new()
            }
            None => HashMap::new(),
        };

        Self {
            catalog: SlotCatalog::default(),
            catalog_loaded: false,
            selection: SelectionState::default(),
            edit_slot: SlotKey::Top,
            overrides,
            applied_preselections: HashSet::new(),
            store,
        }
    }

    /// Install a freshly fetched catalog. All selections reset to None;
    /// overrides are keyed by item id and survive the refetch.
    pub fn install_catalog(&mut self, catalog: SlotCatalog) {
        self.catalog = catalog;
        self.catalog_loaded = true;
        self.selection.clear_all();
        debug!("Catalog installed, selections reset");
    }

    pub fn catalog_loaded(&self) -> bool {
        self.catalog_loaded
    }

    pub fn edit_slot(&self) -> SlotKey {
        self.edit_slot
    }

    /// Change which slot receives nudge/scale input. Pure state change.
    pub fn set_edit_slot(&mut self, slot: SlotKey) {
        self.edit_slot = slot;
    }

    pub fn selection(&self, slot: SlotKey) -> Option<usize> {
        self.selection.get(slot)
    }

    /// The garment currently worn in a slot, if any
    pub fn selected_item(&self, slot: SlotKey) -> Option<&CatalogItem> {
        let index = self.selection.get(slot)?;
        self.catalog.items(slot).get(index)
    }

    /// Advance a slot's selection through [None, 0, 1, .., n-1] circularly.
    /// None is always a member, so even an empty slot cycles (onto itself).
    pub fn cycle_selection(&mut self, slot: SlotKey, direction: i32) {
        let states = self.catalog.len(slot) as i64 + 1;
        let current = match self.selection.get(slot) {
            None => 0,
            Some(index) => index as i64 + 1,
        };
        let next = (current + direction.signum() as i64).rem_euclid(states);
        self.selection
            .set(slot, (next != 0).then(|| (next - 1) as usize));
    }

    /// Set a slot's selection to None directly, bypassing cycling
    pub fn clear_slot(&mut self, slot: SlotKey) {
        self.selection.set(slot, None);
    }

    /// Select the catalog entry matching an incoming navigation id, once
    /// per distinct id. The first slot containing the item also becomes
    /// the active-edit slot. Returns whether a selection was made.
    pub fn apply_preselection(&mut self, item_id: i64) -> bool {
        if !self.applied_preselections.insert(item_id) {
            debug!("Preselection {} already applied, ignoring", item_id);
            return false;
        }

        match self.catalog.find(item_id) {
            Some((slot, index)) => {
                self.selection.set(slot, Some(index));
                self.edit_slot = slot;
                info!("Preselected item {} into {:?}[{}]", item_id, slot, index);
                true
            }
            None => {
                debug!("Preselection {} matches no catalog entry", item_id);
                false
            }
        }
    }

    /// The transform a garment renders with in a slot: its override merged
    /// field by field over the slot default. Pure.
    pub fn effective_transform(&self, slot: SlotKey, item_id: i64) -> LayerTransform {
        let base = slot.default_transform();
        match self.overrides.get(&item_id) {
            Some(patch) => base.with_patch(patch),
            None => base,
        }
    }

    /// Move the selected garment by the given offsets (percent of stage).
    /// No-op when nothing is worn in the slot: no state change, no write.
    pub fn nudge(&mut self, slot: SlotKey, dx_pct: f64, dy_pct: f64) {
        let Some(item_id) = self.selected_item(slot).map(|item| item.id) else {
            debug!("Nudge ignored, nothing worn in {:?}", slot);
            return;
        };

        let current = self.effective_transform(slot, item_id);
        self.overrides.insert(
            item_id,
            TransformPatch::from_transform(LayerTransform {
                offset_x_pct: current.offset_x_pct + dx_pct,
                offset_y_pct: current.offset_y_pct + dy_pct,
                scale: current.scale,
            }),
        );
        self.persist();
    }

    /// Grow or shrink the selected garment by a scale delta
    pub fn adjust_scale(&mut self, slot: SlotKey, delta: f64) {
        let Some(item_id) = self.selected_item(slot).map(|item| item.id) else {
            debug!("Scale adjust ignored, nothing worn in {:?}", slot);
            return;
        };
        let current = self.effective_transform(slot, item_id);
        self.write_scale(slot, item_id, current.scale + delta);
    }

    /// Set the selected garment's scale directly (range slider)
    pub fn set_scale(&mut self, slot: SlotKey, value: f64) {
        let Some(item_id) = self.selected_item(slot).map(|item| item.id) else {
            debug!("Scale set ignored, nothing worn in {:?}", slot);
            return;
        };
        self.write_scale(slot, item_id, value);
    }

    fn write_scale(&mut self, slot: SlotKey, item_id: i64, value: f64) {
        let current = self.effective_transform(slot, item_id);
        self.overrides.insert(
            item_id,
            TransformPatch::from_transform(LayerTransform {
                scale: value.clamp(SCALE_MIN, SCALE_MAX),
                ..current
            }),
        );
        self.persist();
    }

    /// Back to original: all selections off, override map emptied, the
    /// persisted record erased. Slot defaults are baseline constants and
    /// apply again automatically once no override exists.
    pub fn reset_all(&mut self) {
        self.selection.clear_all();
        self.overrides.clear();
        if let Some(store) = &self.store {
            if let Err(e) = store.clear() {
                warn!("Failed to erase persisted overrides: {}", e);
            }
        }
        info!("Fit reset to original");
    }

    /// The layered composite, bottom-most first, ready for the webview
    pub fn composite_style(&self) -> Vec<CompositeLayer> {
        let mut layers = Vec::new();
        for slot in SlotKey::ALL {
            if let Some(item) = self.selected_item(slot) {
                let transform = self.effective_transform(slot, item.id);
                layers.push(CompositeLayer {
                    slot,
                    item_id: item.id,
                    image_ref: item.image_ref.clone(),
                    offset_x_pct: transform.offset_x_pct,
                    offset_y_pct: transform.offset_y_pct,
                    scale: transform.scale,
                    z_index: slot.z_index(),
                });
            }
        }
        layers
    }

    /// Per-slot picker state for the frontend
    pub fn wardrobe(&self) -> WardrobeView {
        WardrobeView {
            slots: SlotKey::ALL
                .iter()
                .map(|&slot| WardrobeSlot {
                    slot,
                    items: self.catalog.items(slot).to_vec(),
                    selected: self.selection.get(slot),
                })
                .collect(),
            edit_slot: self.edit_slot,
            catalog_loaded: self.catalog_loaded,
        }
    }

    fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = store.save(&self.overrides) {
            warn!("Failed to persist overrides: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ProductRecord;
    use crate::types::{NUDGE_STEP_PCT, SCALE_STEP};

    fn record(id: i64, category: &str) -> ProductRecord {
        ProductRecord {
            id,
            name: Some(format!("item {}", id)),
            img_data: None,
            img_url: Some(format!("http://img/{}.png", id)),
            category: Some(category.to_string()),
        }
    }

    /// 2 tops (100, 101), 1 bottom (200), 0 coats
    fn small_catalog() -> SlotCatalog {
        SlotCatalog::from_records(vec![
            record(100, "shirt"),
            record(101, "tee"),
            record(200, "jeans"),
        ])
    }

    fn compositor() -> OutfitCompositor {
        let mut comp = OutfitCompositor::new(None);
        comp.install_catalog(small_catalog());
        comp
    }

    fn temp_store(tag: &str) -> OverrideStore {
        let path = std::env::temp_dir().join(format!(
            "fitter-comp-test-{}-{}.redb",
            std::process::id(),
            tag
        ));
        let _ = std::fs::remove_file(&path);
        OverrideStore::open(Some(path.to_str().unwrap())).unwrap()
    }

    #[test]
    fn test_cycle_forward_through_none_and_back() {
        let mut comp = compositor();
        assert_eq!(comp.selection(SlotKey::Top), None);

        comp.cycle_selection(SlotKey::Top, 1);
        assert_eq!(comp.selection(SlotKey::Top), Some(0));
        comp.cycle_selection(SlotKey::Top, 1);
        assert_eq!(comp.selection(SlotKey::Top), Some(1));
        comp.cycle_selection(SlotKey::Top, 1);
        assert_eq!(comp.selection(SlotKey::Top), None);
    }

    #[test]
    fn test_cycle_backward_wraps_to_last() {
        let mut comp = compositor();
        comp.cycle_selection(SlotKey::Top, -1);
        assert_eq!(comp.selection(SlotKey::Top), Some(1));
        comp.cycle_selection(SlotKey::Top, -1);
        assert_eq!(comp.selection(SlotKey::Top), Some(0));
        comp.cycle_selection(SlotKey::Top, -1);
        assert_eq!(comp.selection(SlotKey::Top), None);
    }

    #[test]
    fn test_cycle_n_plus_one_times_is_identity() {
        // Cyclic group property for every slot and both directions
        for slot in SlotKey::ALL {
            for direction in [1, -1] {
                let mut comp = compositor();
                comp.cycle_selection(slot, direction);
                let start = comp.selection(slot);

                let states = comp.catalog.len(slot) + 1;
                for _ in 0..states {
                    comp.cycle_selection(slot, direction);
                }
                assert_eq!(
                    comp.selection(slot),
                    start,
                    "slot {:?} direction {} did not return to start",
                    slot,
                    direction
                );
            }
        }
    }

    #[test]
    fn test_cycle_on_empty_slot_stays_none() {
        let mut comp = compositor();
        comp.cycle_selection(SlotKey::Coat, 1);
        assert_eq!(comp.selection(SlotKey::Coat), None);
        comp.cycle_selection(SlotKey::Coat, -1);
        assert_eq!(comp.selection(SlotKey::Coat), None);
    }

    #[test]
    fn test_clear_slot_bypasses_cycling() {
        let mut comp = compositor();
        comp.cycle_selection(SlotKey::Top, 1);
        comp.cycle_selection(SlotKey::Top, 1);
        assert_eq!(comp.selection(SlotKey::Top), Some(1));

        comp.clear_slot(SlotKey::Top);
        assert_eq!(comp.selection(SlotKey::Top), None);
    }

    #[test]
    fn test_effective_transform_is_slot_default_without_override() {
        let comp = compositor();
        assert_eq!(
            comp.effective_transform(SlotKey::Top, 100),
            SlotKey::Top.default_transform()
        );
    }

    #[test]
    fn test_effective_transform_partial_override_merges() {
        let mut comp = compositor();
        comp.overrides.insert(
            100,
            TransformPatch {
                offset_y_pct: Some(-3.0),
                ..Default::default()
            },
        );

        let effective = comp.effective_transform(SlotKey::Top, 100);
        let default = SlotKey::Top.default_transform();
        assert_eq!(effective.offset_y_pct, -3.0);
        assert_eq!(effective.offset_x_pct, default.offset_x_pct);
        assert_eq!(effective.scale, default.scale);
    }

    #[test]
    fn test_first_nudge_materializes_full_override() {
        let mut comp = compositor();
        comp.cycle_selection(SlotKey::Top, 1); // item 100
        comp.nudge(SlotKey::Top, 1.0, -1.0);

        let default = SlotKey::Top.default_transform();
        let patch = comp.overrides.get(&100).expect("override created");
        assert_eq!(patch.offset_x_pct, Some(default.offset_x_pct + 1.0));
        assert_eq!(patch.offset_y_pct, Some(default.offset_y_pct - 1.0));
        assert_eq!(patch.scale, Some(default.scale));
    }

    #[test]
    fn test_nudges_accumulate() {
        let mut comp = compositor();
        comp.cycle_selection(SlotKey::Top, 1);
        comp.nudge(SlotKey::Top, NUDGE_STEP_PCT, 0.0);
        comp.nudge(SlotKey::Top, NUDGE_STEP_PCT, 0.0);

        let default = SlotKey::Top.default_transform();
        let effective = comp.effective_transform(SlotKey::Top, 100);
        assert_eq!(
            effective.offset_x_pct,
            default.offset_x_pct + 2.0 * NUDGE_STEP_PCT
        );
    }

    #[test]
    fn test_scale_clamps_regardless_of_input_magnitude() {
        let mut comp = compositor();
        comp.cycle_selection(SlotKey::Top, 1);

        comp.set_scale(SlotKey::Top, 10.0);
        assert_eq!(comp.effective_transform(SlotKey::Top, 100).scale, SCALE_MAX);

        comp.set_scale(SlotKey::Top, -5.0);
        assert_eq!(comp.effective_transform(SlotKey::Top, 100).scale, SCALE_MIN);

        comp.adjust_scale(SlotKey::Top, 999.0);
        assert_eq!(comp.effective_transform(SlotKey::Top, 100).scale, SCALE_MAX);

        comp.adjust_scale(SlotKey::Top, -999.0);
        assert_eq!(comp.effective_transform(SlotKey::Top, 100).scale, SCALE_MIN);
    }

    #[test]
    fn test_adjust_scale_steps_from_effective_value() {
        let mut comp = compositor();
        comp.cycle_selection(SlotKey::Top, 1);
        comp.adjust_scale(SlotKey::Top, SCALE_STEP);

        let default = SlotKey::Top.default_transform();
        assert_eq!(
            comp.effective_transform(SlotKey::Top, 100).scale,
            default.scale + SCALE_STEP
        );
    }

    #[test]
    fn test_adjustments_are_noops_without_selection() {
        let store = temp_store("noop");
        let mut comp = OutfitCompositor::new(Some(store));
        comp.install_catalog(small_catalog());

        comp.nudge(SlotKey::Top, 5.0, 5.0);
        comp.adjust_scale(SlotKey::Top, 0.2);
        comp.set_scale(SlotKey::Top, 1.0);

        assert!(comp.overrides.is_empty());
        // No storage write happened either
        assert!(!comp.store.as_ref().unwrap().has_record().unwrap());
    }

    #[test]
    fn test_reset_all_restores_original_state() {
        let store = temp_store("reset");
        let mut comp = OutfitCompositor::new(Some(store));
        comp.install_catalog(small_catalog());

        comp.cycle_selection(SlotKey::Top, 1);
        comp.cycle_selection(SlotKey::Bottom, 1);
        comp.nudge(SlotKey::Top, 2.0, 2.0);
        assert!(comp.store.as_ref().unwrap().has_record().unwrap());

        comp.reset_all();

        for slot in SlotKey::ALL {
            assert_eq!(comp.selection(slot), None);
        }
        assert!(comp.overrides.is_empty());
        assert!(!comp.store.as_ref().unwrap().has_record().unwrap());
        // Defaults are back to baseline for any item
        assert_eq!(
            comp.effective_transform(SlotKey::Top, 100),
            SlotKey::Top.default_transform()
        );
    }

    #[test]
    fn test_preselection_selects_and_takes_edit_focus() {
        let mut comp = OutfitCompositor::new(None);
        comp.install_catalog(SlotCatalog::from_records(vec![
            record(200, "jeans"),
            record(201, "skirt"),
            record(100, "shirt"),
        ]));

        // Second bottom item
        assert!(comp.apply_preselection(201));
        assert_eq!(comp.selection(SlotKey::Bottom), Some(1));
        assert_eq!(comp.edit_slot(), SlotKey::Bottom);

        // Re-applying the same id is a no-op even after the user moves on
        comp.clear_slot(SlotKey::Bottom);
        comp.set_edit_slot(SlotKey::Top);
        assert!(!comp.apply_preselection(201));
        assert_eq!(comp.selection(SlotKey::Bottom), None);
        assert_eq!(comp.edit_slot(), SlotKey::Top);
    }

    #[test]
    fn test_preselection_with_unknown_id_changes_nothing() {
        let mut comp = compositor();
        assert!(!comp.apply_preselection(999));
        for slot in SlotKey::ALL {
            assert_eq!(comp.selection(slot), None);
        }
        assert_eq!(comp.edit_slot(), SlotKey::Top);
    }

    #[test]
    fn test_composite_stacks_selected_layers_in_z_order() {
        let mut comp = compositor();
        comp.cycle_selection(SlotKey::Top, 1);
        comp.cycle_selection(SlotKey::Bottom, 1);
        comp.nudge(SlotKey::Top, 0.0, -2.0);

        let layers = comp.composite_style();
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0].slot, SlotKey::Bottom);
        assert_eq!(layers[1].slot, SlotKey::Top);
        assert!(layers[0].z_index < layers[1].z_index);

        let top_default = SlotKey::Top.default_transform();
        assert_eq!(layers[1].offset_y_pct, top_default.offset_y_pct - 2.0);
        assert_eq!(layers[0].offset_y_pct, SlotKey::Bottom.default_transform().offset_y_pct);
    }

    #[test]
    fn test_composite_is_empty_with_nothing_worn() {
        let comp = compositor();
        assert!(comp.composite_style().is_empty());
    }

    #[test]
    fn test_overrides_survive_catalog_refetch() {
        let mut comp = compositor();
        comp.cycle_selection(SlotKey::Top, 1);
        comp.nudge(SlotKey::Top, 3.0, 0.0);

        comp.install_catalog(small_catalog());
        // Selection resets, calibration stays keyed by id
        assert_eq!(comp.selection(SlotKey::Top), None);
        let default = SlotKey::Top.default_transform();
        assert_eq!(
            comp.effective_transform(SlotKey::Top, 100).offset_x_pct,
            default.offset_x_pct + 3.0
        );
    }

    #[test]
    fn test_overrides_persist_across_sessions() {
        let path = std::env::temp_dir().join(format!(
            "fitter-comp-test-{}-sessions.redb",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        let path_str = path.to_str().unwrap().to_string();

        {
            let store = OverrideStore::open(Some(&path_str)).unwrap();
            let mut comp = OutfitCompositor::new(Some(store));
            comp.install_catalog(small_catalog());
            comp.cycle_selection(SlotKey::Bottom, 1); // item 200
            comp.nudge(SlotKey::Bottom, -2.0, 4.0);
        }

        let store = OverrideStore::open(Some(&path_str)).unwrap();
        let comp = OutfitCompositor::new(Some(store));
        let default = SlotKey::Bottom.default_transform();
        let effective = comp.effective_transform(SlotKey::Bottom, 200);
        assert_eq!(effective.offset_x_pct, default.offset_x_pct - 2.0);
        assert_eq!(effective.offset_y_pct, default.offset_y_pct + 4.0);
    }

    #[test]
    fn test_wardrobe_reflects_catalog_and_selection() {
        let mut comp = compositor();
        comp.cycle_selection(SlotKey::Top, 1);
        comp.set_edit_slot(SlotKey::Bottom);

        let view = comp.wardrobe();
        assert!(view.catalog_loaded);
        assert_eq!(view.edit_slot, SlotKey::Bottom);

        let top = view
            .slots
            .iter()
            .find(|s| s.slot == SlotKey::Top)
            .unwrap();
        assert_eq!(top.items.len(), 2);
        assert_eq!(top.selected, Some(0));

        let coat = view
            .slots
            .iter()
            .find(|s| s.slot == SlotKey::Coat)
            .unwrap();
        assert!(coat.items.is_empty());
        assert_eq!(coat.selected, None);
    }
}
