//! ============================================================================
//! Catalog Client - Storefront Product Fetch & Slot Classification
//! ============================================================================
//! Fetches the product listing from the storefront API and buckets each
//! wearable into the layer slots it qualifies for:
//! - Accepts both a bare JSON array and a `{"content": [...]}` page wrapper
//! - Resolves images from an inline base64 payload or a URL field
//! - Classifies by category label, case-insensitive, per slot
//! ============================================================================

use base64::Engine as _;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::types::{CatalogItem, FitterError, SlotKey};

/// Accepted category labels per slot (case-insensitive exact match).
/// "hoodie" appears in both the top and coat sets: items classify
/// independently per slot, so one garment can be a candidate in both.
const TOP_LABELS: &[&str] = &["top", "tee", "t-shirt", "shirt", "blouse", "knit", "hoodie"];
const BOTTOM_LABELS: &[&str] = &["bottom", "pants", "jeans", "slacks", "skirt", "shorts"];
const COAT_LABELS: &[&str] = &["coat", "outer", "jacket", "padding", "hoodie", "cardigan"];

fn accepted_labels(slot: SlotKey) -> &'static [&'static str] {
    match slot {
        SlotKey::Top => TOP_LABELS,
        SlotKey::Bottom => BOTTOM_LABELS,
        SlotKey::Coat => COAT_LABELS,
    }
}

/// Raw product record as the storefront API returns it
#[derive(Debug, Clone, Deserialize)]
pub struct ProductRecord {
    pub id: i64,
    #[serde(default, alias = "productName")]
    pub name: Option<String>,
    /// Inline base64 image payload, when the backend embeds the image
    #[serde(default, alias = "imgData")]
    pub img_data: Option<String>,
    /// URL-style image reference, when the backend serves images separately
    #[serde(default, alias = "imgUrl")]
    pub img_url: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

/// The listing endpoint returns either a page wrapper or a bare array
/// depending on backend version
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CatalogListing {
    Page { content: Vec<ProductRecord> },
    Bare(Vec<ProductRecord>),
}

impl CatalogListing {
    fn into_records(self) -> Vec<ProductRecord> {
        match self {
            CatalogListing::Page { content } => content,
            CatalogListing::Bare(records) => records,
        }
    }
}

/// Resolve a displayable image reference for a record, or None if the
/// record has no usable image and must be skipped.
fn resolve_image(record: &ProductRecord) -> Option<String> {
    if let Some(data) = record.img_data.as_deref() {
        let data = data.trim();
        if !data.is_empty() {
            if data.starts_with("data:") {
                return Some(data.to_string());
            }
            // Backend sends the raw payload; reject garbage before wrapping
            match base64::engine::general_purpose::STANDARD.decode(data) {
                Ok(_) => return Some(format!("data:image/png;base64,{}", data)),
                Err(e) => {
                    warn!("Product {} has undecodable image payload: {}", record.id, e);
                }
            }
        }
    }

    match record.img_url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => Some(url.to_string()),
        _ => None,
    }
}

/// Ordered per-slot item lists built from one catalog fetch.
/// Order within a slot is fetch order.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct SlotCatalog {
    bottom: Vec<CatalogItem>,
    top: Vec<CatalogItem>,
    coat: Vec<CatalogItem>,
}

impl SlotCatalog {
    /// Bucket raw records into slots. Records without a resolvable image
    /// are dropped; a record whose label matches several slots' accepted
    /// sets lands in each of them.
    pub fn from_records(records: Vec<ProductRecord>) -> Self {
        let mut catalog = SlotCatalog::default();
        let mut skipped = 0usize;

        for record in records {
            let Some(image_ref) = resolve_image(&record) else {
                skipped += 1;
                continue;
            };
            let Some(label) = record.category.as_deref().map(str::trim) else {
                continue;
            };

            let lowered = label.to_lowercase();
            for slot in SlotKey::ALL {
                if accepted_labels(slot).contains(&lowered.as_str()) {
                    catalog.items_mut(slot).push(CatalogItem {
                        id: record.id,
                        display_name: record
                            .name
                            .clone()
                            .unwrap_or_else(|| format!("#{}", record.id)),
                        image_ref: image_ref.clone(),
                        category_label: label.to_string(),
                    });
                }
            }
        }

        if skipped > 0 {
            debug!("Skipped {} products without a resolvable image", skipped);
        }
        catalog
    }

    pub fn items(&self, slot: SlotKey) -> &[CatalogItem] {
        match slot {
            SlotKey::Bottom => &self.bottom,
            SlotKey::Top => &self.top,
            SlotKey::Coat => &self.coat,
        }
    }

    fn items_mut(&mut self, slot: SlotKey) -> &mut Vec<CatalogItem> {
        match slot {
            SlotKey::Bottom => &mut self.bottom,
            SlotKey::Top => &mut self.top,
            SlotKey::Coat => &mut self.coat,
        }
    }

    pub fn len(&self, slot: SlotKey) -> usize {
        self.items(slot).len()
    }

    pub fn is_empty(&self) -> bool {
        SlotKey::ALL.iter().all(|&slot| self.items(slot).is_empty())
    }

    /// Locate an item by id, scanning slots in stacking order.
    /// Returns the first (slot, index) whose item id matches.
    pub fn find(&self, item_id: i64) -> Option<(SlotKey, usize)> {
        for slot in SlotKey::ALL {
            if let Some(index) = self.items(slot).iter().position(|item| item.id == item_id) {
                return Some((slot, index));
            }
        }
        None
    }
}

/// HTTP client for the storefront catalog API
pub struct CatalogClient {
    client: reqwest::Client,
    base_url: String,
}

impl CatalogClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch the product listing and build the slot catalog.
    /// Any network or parse failure is terminal for this fetch; the caller
    /// surfaces it as a blocking error state, no retry.
    pub async fn fetch_catalog(&self) -> Result<SlotCatalog, FitterError> {
        let url = format!("{}/product", self.base_url);
        info!("Fetching catalog from {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FitterError::CatalogLoad(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(FitterError::CatalogLoad(format!(
                "catalog endpoint returned {}: {}",
                status, body
            )));
        }

        let listing: CatalogListing = response
            .json()
            .await
            .map_err(|e| FitterError::CatalogLoad(format!("unparseable listing: {}", e)))?;

        let catalog = SlotCatalog::from_records(listing.into_records());
        info!(
            "Catalog ready: {} bottoms, {} tops, {} coats",
            catalog.len(SlotKey::Bottom),
            catalog.len(SlotKey::Top),
            catalog.len(SlotKey::Coat)
        );
        Ok(catalog)
    }
}
