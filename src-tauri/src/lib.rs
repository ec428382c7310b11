//! ============================================================================
//! Virtual Fitter :: Tauri Backend
//! ============================================================================
//! IPC commands wrapping the fitter-core compositor. The webview renders the
//! composite style computed here and forwards keyboard/wheel/slider input;
//! all client state and business rules stay on the Rust side.
//!
//! The catalog fetch follows the non-blocking pattern:
//! Clone Arc -> tokio::spawn -> JoinHandle -> await result.
//! Everything else is a fast in-memory mutation under the state lock.
//! ============================================================================

use std::sync::Arc;

use fitter_core::{
    CatalogClient, CompositeLayer, OutfitCompositor, OverrideStore, SlotKey, WardrobeView,
    NUDGE_STEP_COARSE_PCT, NUDGE_STEP_PCT, SCALE_STEP,
};
use serde::{Deserialize, Serialize};
use tauri::State;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

// ============================================================================
// Application State (Thread-Safe)
// ============================================================================

/// Shared application state - wrapped in Arc<RwLock<T>> for safe
/// concurrent access from multiple tokio tasks
pub struct AppState {
    pub compositor: Arc<RwLock<OutfitCompositor>>,
    pub config: Arc<RwLock<AppConfig>>,
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the storefront API serving the product catalog
    pub api_base_url: String,
    /// Calibration store path override (default: ~/.virtual-fitter/fitter.redb)
    pub db_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: std::env::var("FITTER_API_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            db_path: std::env::var("FITTER_DB_PATH").ok(),
        }
    }
}

// ============================================================================
// Async Task Result Type
// ============================================================================

/// Wrapper for async task results to handle spawn errors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsyncResult<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> AsyncResult<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

// ============================================================================
// Tauri Commands - Catalog (Non-Blocking)
// ============================================================================

/// Fetch the product catalog and install it into the compositor.
/// A failure here is terminal for the mount: the frontend shows a blocking
/// error view and offers a manual reload.
#[tauri::command]
async fn load_catalog(state: State<'_, AppState>) -> Result<AsyncResult<WardrobeView>, String> {
    info!("[IPC] load_catalog called");

    let base_url = state.config.read().await.api_base_url.clone();

    // Spawn non-blocking fetch
    let handle = tokio::spawn(async move { CatalogClient::new(&base_url).fetch_catalog().await });

    match handle.await {
        Ok(Ok(catalog)) => {
            let mut compositor = state.compositor.write().await;
            compositor.install_catalog(catalog);
            info!("[IPC] Catalog installed");
            Ok(AsyncResult::ok(compositor.wardrobe()))
        }
        Ok(Err(e)) => {
            error!("[IPC] load_catalog error: {}", e);
            Ok(AsyncResult::err(e.to_string()))
        }
        Err(e) => {
            error!("[IPC] load_catalog task panic: {}", e);
            Ok(AsyncResult::err(format!("Task failed: {}", e)))
        }
    }
}

/// Get the wardrobe picker state - fast in-memory read
#[tauri::command]
async fn get_wardrobe(state: State<'_, AppState>) -> Result<WardrobeView, String> {
    Ok(state.compositor.read().await.wardrobe())
}

// ============================================================================
// Tauri Commands - Navigation Preselection
// ============================================================================

/// Apply a `productId` navigation parameter, once per distinct id.
/// The matching slot is selected and becomes the active-edit slot.
#[tauri::command]
async fn apply_preselection(
    state: State<'_, AppState>,
    item_id: i64,
) -> Result<WardrobeView, String> {
    debug!("[IPC] apply_preselection: {}", item_id);

    let mut compositor = state.compositor.write().await;
    compositor.apply_preselection(item_id);
    Ok(compositor.wardrobe())
}

// ============================================================================
// Tauri Commands - Selection (Fast, In-Memory)
// ============================================================================

/// Cycle a slot's selection through [None, 0, .., n-1] in either direction
#[tauri::command]
async fn cycle_selection(
    state: State<'_, AppState>,
    slot: SlotKey,
    direction: i32,
) -> Result<WardrobeView, String> {
    debug!("[IPC] cycle_selection: {:?} {:+}", slot, direction);

    let mut compositor = state.compositor.write().await;
    compositor.cycle_selection(slot, direction);
    Ok(compositor.wardrobe())
}

/// Take a slot off directly
#[tauri::command]
async fn clear_slot(state: State<'_, AppState>, slot: SlotKey) -> Result<WardrobeView, String> {
    debug!("[IPC] clear_slot: {:?}", slot);

    let mut compositor = state.compositor.write().await;
    compositor.clear_slot(slot);
    Ok(compositor.wardrobe())
}

/// Change which slot receives nudge/scale input
#[tauri::command]
async fn set_edit_slot(state: State<'_, AppState>, slot: SlotKey) -> Result<(), String> {
    debug!("[IPC] set_edit_slot: {:?}", slot);

    state.compositor.write().await.set_edit_slot(slot);
    Ok(())
}

// ============================================================================
// Tauri Commands - Placement (Fast, Write-Through Persisted)
// ============================================================================

/// Nudge the active-edit slot's garment by whole steps (arrow keys).
/// `coarse` selects the larger step (modifier key held). A slot with
/// nothing worn ignores this via the core's no-op contract.
#[tauri::command]
async fn nudge_active(
    state: State<'_, AppState>,
    dx: i32,
    dy: i32,
    coarse: bool,
) -> Result<Vec<CompositeLayer>, String> {
    let step = if coarse {
        NUDGE_STEP_COARSE_PCT
    } else {
        NUDGE_STEP_PCT
    };

    let mut compositor = state.compositor.write().await;
    let slot = compositor.edit_slot();
    compositor.nudge(slot, dx as f64 * step, dy as f64 * step);
    Ok(compositor.composite_style())
}

/// Adjust the active-edit slot's garment scale by wheel notches / clicks
#[tauri::command]
async fn adjust_scale_active(
    state: State<'_, AppState>,
    steps: i32,
) -> Result<Vec<CompositeLayer>, String> {
    let mut compositor = state.compositor.write().await;
    let slot = compositor.edit_slot();
    compositor.adjust_scale(slot, steps as f64 * SCALE_STEP);
    Ok(compositor.composite_style())
}

/// Set the active-edit slot's garment scale directly (range slider)
#[tauri::command]
async fn set_scale_active(
    state: State<'_, AppState>,
    value: f64,
) -> Result<Vec<CompositeLayer>, String> {
    let mut compositor = state.compositor.write().await;
    let slot = compositor.edit_slot();
    compositor.set_scale(slot, value);
    Ok(compositor.composite_style())
}

/// Reset to original: selections off, overrides erased, defaults restored
#[tauri::command]
async fn reset_fit(state: State<'_, AppState>) -> Result<WardrobeView, String> {
    info!("[IPC] reset_fit called");

    let mut compositor = state.compositor.write().await;
    compositor.reset_all();
    Ok(compositor.wardrobe())
}

/// Get the layered composite style - fast in-memory read
#[tauri::command]
async fn get_composite(state: State<'_, AppState>) -> Result<Vec<CompositeLayer>, String> {
    Ok(state.compositor.read().await.composite_style())
}

// ============================================================================
// Tauri Commands - Configuration
// ============================================================================

/// Update the storefront API base URL
#[tauri::command]
async fn set_api_url(state: State<'_, AppState>, api_url: String) -> Result<(), String> {
    info!("[IPC] set_api_url: {}", api_url);

    state.config.write().await.api_base_url = api_url;
    Ok(())
}

/// Get config - fast in-memory read
#[tauri::command]
async fn get_config(state: State<'_, AppState>) -> Result<AppConfig, String> {
    Ok(state.config.read().await.clone())
}

// ============================================================================
// Tauri Commands - Frontend Logging (for debugging)
// ============================================================================

/// Log a message from the frontend to the terminal
#[tauri::command]
fn frontend_log(level: String, message: String) {
    match level.as_str() {
        "error" => error!("[Frontend] {}", message),
        "warn" => warn!("[Frontend] {}", message),
        "info" => info!("[Frontend] {}", message),
        _ => debug!("[Frontend] {}", message),
    }
}

// ============================================================================
// Application Setup
// ============================================================================

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    // Load environment variables from .env file
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("Warning: Could not load .env file: {}", e);
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("virtual_fitter=debug".parse().unwrap())
                .add_directive("fitter_core=debug".parse().unwrap()),
        )
        .init();

    info!("Starting Virtual Fitter");

    let config = AppConfig::default();

    // Open the calibration store; storage trouble never blocks the fitter
    let store = match OverrideStore::open(config.db_path.as_deref()) {
        Ok(store) => {
            info!("Calibration store ready at: {}", store.path().display());
            Some(store)
        }
        Err(e) => {
            warn!(
                "Failed to open calibration store: {} - running without persistence",
                e
            );
            None
        }
    };

    let compositor = OutfitCompositor::new(store);

    let state = AppState {
        compositor: Arc::new(RwLock::new(compositor)),
        config: Arc::new(RwLock::new(config)),
    };

    tauri::Builder::default()
        .manage(state)
        .invoke_handler(tauri::generate_handler![
            // Catalog (async spawned)
            load_catalog,
            get_wardrobe,
            // Navigation preselection
            apply_preselection,
            // Selection (fast in-memory)
            cycle_selection,
            clear_slot,
            set_edit_slot,
            // Placement (write-through persisted)
            nudge_active,
            adjust_scale_active,
            set_scale_active,
            reset_fit,
            get_composite,
            // Config
            get_config,
            set_api_url,
            // Debug
            frontend_log,
        ])
        .run(tauri::generate_context!())
        .expect("Error running Virtual Fitter");
}
