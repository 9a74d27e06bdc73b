// src/ffi/export.rs
// ============================================================================
// FFI bindings for the `AssetExportService`.
// The callback variant returns immediately and reports through host
// callbacks from a runtime thread; the blocking variant waits and returns
// the record JSON.
//
// CALLBACK CONTRACT:
//   on_progress({"identifier", "progress"}) zero or more times (videos only),
//   then exactly one of on_failed({"identifier", "errorCode", "message"}) or
//   on_finish(record). The JSON pointer is only valid during the callback.
// ============================================================================

use crate::domains::asset::AssetRef;
use crate::domains::compression::CancelToken;
use crate::domains::export::{AssetExportService, ExportFailure, ExportObserver, ExportProgress, ExportRecord, ExportRequest};
use crate::errors::{DomainError, ExportError};
use crate::ffi::error::{ErrorCode, FFIError};
use crate::ffi::{
    block_on_async, c_str_arg, catch_panic, handle_status_result, parse_json_input, write_json_result, FFIResult,
};
use crate::globals;
use serde::Serialize;
use std::ffi::CString;
use std::os::raw::{c_char, c_int, c_void};
use std::sync::Arc;

pub type PickerCallback = Option<unsafe extern "C" fn(json: *const c_char, ctx: *mut c_void)>;

/// Host callbacks for one export; `ctx` is passed back untouched.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct PickerExportCallbacks {
    pub ctx: *mut c_void,
    pub on_progress: PickerCallback,
    pub on_failed: PickerCallback,
    pub on_finish: PickerCallback,
}

// The host guarantees ctx stays valid and usable from any thread until a final callback fires.
unsafe impl Send for PickerExportCallbacks {}
unsafe impl Sync for PickerExportCallbacks {}

struct CallbackBridge {
    callbacks: PickerExportCallbacks,
}

impl CallbackBridge {
    fn emit<T: Serialize>(&self, callback: PickerCallback, payload: &T) {
        let Some(callback) = callback else { return };
        let json = match serde_json::to_string(payload) {
            Ok(json) => json,
            Err(e) => {
                log::error!("[FFI] Failed to serialize callback payload: {}", e);
                return;
            }
        };
        match CString::new(json) {
            Ok(c_json) => unsafe { callback(c_json.as_ptr(), self.callbacks.ctx) },
            Err(e) => log::error!("[FFI] Callback payload contains null bytes: {}", e),
        }
    }
}

impl ExportObserver for CallbackBridge {
    fn on_progress(&self, identifier: &str, fraction: f32) {
        let payload = ExportProgress { identifier: identifier.to_string(), progress: fraction };
        self.emit(self.callbacks.on_progress, &payload);
    }

    fn on_failed(&self, error: &ExportError) {
        self.emit(self.callbacks.on_failed, &ExportFailure::from(error));
    }

    fn on_finished(&self, record: &ExportRecord) {
        self.emit(self.callbacks.on_finish, &record.to_host_map());
    }
}

/// Resolved request: the asset plus the effective flags
struct ExportJob {
    asset: AssetRef,
    thumb: bool,
    save_dir: String,
}

fn resolve_job(service: &AssetExportService, request: ExportRequest) -> FFIResult<ExportJob> {
    let settings = service.settings();
    let library = globals::get_asset_library()?;

    let asset = block_on_async(async move {
        match (request.asset, request.identifier) {
            // inline assets are registered so their kind and size get filled in
            (Some(asset), _) => library.register(asset).await.map_err(FFIError::from),
            (None, Some(identifier)) => library
                .get(&identifier)
                .await
                .ok_or_else(|| FFIError::from(DomainError::AssetNotFound(identifier))),
            (None, None) => Err(FFIError::invalid_argument("Request needs an identifier or an asset")),
        }
    })?;

    let save_dir = request
        .save_dir
        .or_else(|| settings.save_dir.clone())
        .filter(|dir| !dir.trim().is_empty())
        .ok_or_else(|| FFIError::invalid_argument("No save_dir in request or settings"))?;

    Ok(ExportJob {
        asset,
        thumb: request.thumb.unwrap_or(settings.thumb),
        save_dir,
    })
}

/// Start an export and return at once; results arrive through `callbacks`.
/// Input: {"identifier": "...", "asset": AssetRef?, "thumb": bool?, "save_dir": "..."?}
/// A non-zero return means the export did not start and no callback will fire.
/// Callbacks run on runtime threads and may call back into this library.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn picker_export_asset(request_json: *const c_char, callbacks: PickerExportCallbacks) -> c_int {
    handle_status_result(|| {
        catch_panic("picker_export_asset", || {
            let request: ExportRequest = parse_json_input(request_json)?;
            let service = globals::get_export_service()?;
            let job = resolve_job(&service, request)?;
            let runtime = globals::runtime()?;

            let (handle, token) = CancelToken::pair();
            let ticket = globals::register_cancel_handle(&job.asset.identifier, handle);
            let observer: Arc<dyn ExportObserver> = Arc::new(CallbackBridge { callbacks });

            runtime.spawn(async move {
                let _ = service
                    .export_with_observer(&job.asset, job.thumb, &job.save_dir, observer, token)
                    .await;
                globals::release_cancel_handle(&job.asset.identifier, ticket);
            });
            Ok(())
        })
    })
}

/// Export and wait. Output: the record's host mapping, or an FFIError JSON.
/// `picker_cancel_export` from another thread stops a running video encode
/// and this call then returns `ExportCancelled`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn picker_export_asset_blocking(request_json: *const c_char, result: *mut *mut c_char) -> c_int {
    let outcome = catch_panic("picker_export_asset_blocking", || {
        let request: ExportRequest = parse_json_input(request_json)?;
        let service = globals::get_export_service()?;
        let job = resolve_job(&service, request)?;

        let (handle, token) = CancelToken::pair();
        let ticket = globals::register_cancel_handle(&job.asset.identifier, handle);
        let exported = block_on_async(async {
            service
                .export_with_cancel(&job.asset, job.thumb, &job.save_dir, None, token)
                .await
                .map_err(FFIError::from)
        });
        globals::release_cancel_handle(&job.asset.identifier, ticket);
        Ok(exported?.to_host_map())
    });
    write_json_result(result, outcome)
}

/// Cancel running video exports of an asset.
/// Returns `EntityNotFound` when nothing was running.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn picker_cancel_export(identifier: *const c_char) -> c_int {
    handle_status_result(|| {
        catch_panic("picker_cancel_export", || {
            let identifier = c_str_arg(identifier, "identifier")?;
            if globals::cancel_exports(identifier) {
                log::info!("Cancel requested for {}", identifier);
                Ok(())
            } else {
                Err(FFIError::new(ErrorCode::EntityNotFound, "No running export for this asset"))
            }
        })
    })
}
