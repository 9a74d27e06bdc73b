use crate::domains::asset::LocalAssetLibrary;
use crate::domains::compression::{CancelHandle, FfmpegInfo, FfmpegToolkit};
use crate::domains::export::AssetExportService;
use crate::domains::selection::SelectionSet;
use crate::domains::settings::PickerSettings;
use crate::ffi::error::{FFIError, FFIResult};
use lazy_static::lazy_static;
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::runtime::Runtime;
use uuid::Uuid;

static RUNTIME: OnceCell<Runtime> = OnceCell::new();

// Global state definitions
lazy_static! {
    static ref INIT_MUTEX: Mutex<()> = Mutex::new(());
    static ref INITIALIZED: AtomicBool = AtomicBool::new(false);

    static ref SETTINGS: Mutex<Option<PickerSettings>> = Mutex::new(None);
    static ref ASSET_LIBRARY: Mutex<Option<Arc<LocalAssetLibrary>>> = Mutex::new(None);
    static ref EXPORT_SERVICE: Mutex<Option<Arc<AssetExportService>>> = Mutex::new(None);
    static ref SELECTION: Mutex<Option<SelectionSet>> = Mutex::new(None);

    // Cancel handles of running exports, by asset identifier
    static ref ACTIVE_EXPORTS: Mutex<HashMap<String, HashMap<Uuid, CancelHandle>>> = Mutex::new(HashMap::new());
}

// --- Getter Functions ---

/// Runtime shared by every FFI call; created on first use.
pub fn runtime() -> FFIResult<&'static Runtime> {
    RUNTIME.get_or_try_init(|| {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("picker-core")
            .build()
    })
    .map_err(|e| FFIError::internal(format!("Failed to create async runtime: {}", e)))
}

pub fn is_initialized() -> bool {
    INITIALIZED.load(Ordering::Acquire)
}

pub fn get_settings() -> FFIResult<PickerSettings> {
    SETTINGS.lock().map_err(|_| FFIError::internal("SETTINGS lock poisoned".to_string()))?.clone().ok_or_else(|| FFIError::not_initialized("Settings"))
}
pub fn get_asset_library() -> FFIResult<Arc<LocalAssetLibrary>> {
    ASSET_LIBRARY.lock().map_err(|_| FFIError::internal("ASSET_LIBRARY lock poisoned".to_string()))?.clone().ok_or_else(|| FFIError::not_initialized("Asset library"))
}
pub fn get_export_service() -> FFIResult<Arc<AssetExportService>> {
    EXPORT_SERVICE.lock().map_err(|_| FFIError::internal("EXPORT_SERVICE lock poisoned".to_string()))?.clone().ok_or_else(|| FFIError::not_initialized("Export service"))
}

/// Run `f` against the selection set under its lock.
pub fn with_selection<T>(f: impl FnOnce(&mut SelectionSet) -> T) -> FFIResult<T> {
    let mut guard = SELECTION.lock().map_err(|_| FFIError::internal("SELECTION lock poisoned".to_string()))?;
    let selection = guard.as_mut().ok_or_else(|| FFIError::not_initialized("Selection"))?;
    Ok(f(selection))
}

/// Track a running export so the host can cancel it; returns the ticket to release it with.
pub fn register_cancel_handle(identifier: &str, handle: CancelHandle) -> Uuid {
    let ticket = Uuid::new_v4();
    if let Ok(mut active) = ACTIVE_EXPORTS.lock() {
        active.entry(identifier.to_string()).or_default().insert(ticket, handle);
    }
    ticket
}

pub fn release_cancel_handle(identifier: &str, ticket: Uuid) {
    if let Ok(mut active) = ACTIVE_EXPORTS.lock() {
        if let Some(handles) = active.get_mut(identifier) {
            handles.remove(&ticket);
            if handles.is_empty() {
                active.remove(identifier);
            }
        }
    }
}

/// Cancel every running export of `identifier`; returns whether any was running.
pub fn cancel_exports(identifier: &str) -> bool {
    let handles = match ACTIVE_EXPORTS.lock() {
        Ok(mut active) => active.remove(identifier).unwrap_or_default(),
        Err(_) => return false,
    };
    for handle in handles.values() {
        handle.cancel();
    }
    !handles.is_empty()
}

/// Initialize global services from the host's settings JSON.
/// Calling again applies new settings; registered assets and the selection survive.
pub fn initialize(settings_json: &str) -> FFIResult<()> {
    let _guard = INIT_MUTEX.lock().map_err(|_| FFIError::internal("INIT_MUTEX lock poisoned".to_string()))?;

    // Initialize logging first
    if std::env::var("RUST_LOG").is_err() {
        #[cfg(debug_assertions)]
        std::env::set_var("RUST_LOG", "debug");
        #[cfg(not(debug_assertions))]
        std::env::set_var("RUST_LOG", "info");
    }
    let _ = env_logger::try_init();

    let settings = PickerSettings::from_json(settings_json)?;
    log::info!("Initializing picker core");
    log::debug!("Settings: {:?}", settings);

    let ffmpeg = FfmpegInfo::resolve(&settings);
    log::debug!("Using ffmpeg at {} and ffprobe at {}", ffmpeg.ffmpeg_path.display(), ffmpeg.ffprobe_path.display());

    let library = {
        let mut guard = ASSET_LIBRARY.lock().map_err(|_| FFIError::internal("ASSET_LIBRARY lock poisoned".to_string()))?;
        guard.get_or_insert_with(|| Arc::new(LocalAssetLibrary::new())).clone()
    };

    {
        let toolkit = Arc::new(FfmpegToolkit::new(ffmpeg));
        let mut guard = EXPORT_SERVICE.lock().map_err(|_| FFIError::internal("EXPORT_SERVICE lock poisoned".to_string()))?;
        // running exports stay joinable after reconfiguration
        let service = match guard.as_ref() {
            Some(existing) => existing.reconfigured(toolkit, settings.clone()),
            None => AssetExportService::new(library, toolkit, settings.clone()),
        };
        *guard = Some(Arc::new(service));
    }

    {
        let mut guard = SELECTION.lock().map_err(|_| FFIError::internal("SELECTION lock poisoned".to_string()))?;
        match guard.as_mut() {
            Some(selection) => selection.set_max(settings.max_number_of_selections),
            None => *guard = Some(SelectionSet::new(settings.max_number_of_selections)),
        }
    }

    *SETTINGS.lock().map_err(|_| FFIError::internal("SETTINGS lock poisoned".to_string()))? = Some(settings);
    INITIALIZED.store(true, Ordering::Release);
    log::info!("Picker core initialized");
    Ok(())
}

/// Serializes tests that reconfigure the globals
#[cfg(test)]
pub(crate) static TEST_LOCK: Mutex<()> = Mutex::new(());
