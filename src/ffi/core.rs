// src/ffi/core.rs
// ============================================================================
// Core FFI functions: initialization, asset registration, string ownership
// ============================================================================
//
// MEMORY OWNERSHIP:
// - The host owns input strings (read-only in Rust)
// - Rust owns output strings; the host must call picker_free_string once each

use crate::domains::asset::{AssetRef, LocalAssetLibrary};
use crate::errors::DomainError;
use crate::ffi::error::{ErrorCode, FFIError};
use crate::ffi::{
    block_on_async, c_str_arg, catch_panic, handle_status_result, parse_json_input, write_json_result, FFIResult,
};
use crate::globals;
use serde::Serialize;
use std::ffi::CString;
use std::os::raw::{c_char, c_int};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AssetInfo {
    asset: AssetRef,
    file_size: u64,
    original_filename: Option<String>,
}

/// Initialize (or reconfigure) the library from the settings JSON.
/// Returns 0 on success, an `ErrorCode` otherwise.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn picker_initialize(settings_json: *const c_char) -> c_int {
    handle_status_result(|| {
        catch_panic("picker_initialize", || {
            let settings = if settings_json.is_null() { "" } else { c_str_arg(settings_json, "settings_json")? };
            globals::initialize(settings)
        })
    })
}

/// Register an asset the host resolved to a file.
/// Input: AssetRef JSON. Output: the registered AssetRef with sniffed kind and size.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn picker_register_asset(asset_json: *const c_char, result: *mut *mut c_char) -> c_int {
    let outcome = catch_panic("picker_register_asset", || -> FFIResult<AssetRef> {
        let asset: AssetRef = parse_json_input(asset_json)?;
        let library = globals::get_asset_library()?;
        block_on_async(async move { library.register(asset).await.map_err(FFIError::from) })
    });
    write_json_result(result, outcome)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn picker_unregister_asset(identifier: *const c_char) -> c_int {
    handle_status_result(|| {
        catch_panic("picker_unregister_asset", || {
            let identifier = c_str_arg(identifier, "identifier")?.to_string();
            let library = globals::get_asset_library()?;
            let removed = block_on_async(async move { Ok(library.remove(&identifier).await) })?;
            if removed {
                Ok(())
            } else {
                Err(FFIError::new(ErrorCode::EntityNotFound, "Asset is not registered"))
            }
        })
    })
}

/// Output: {"asset": AssetRef, "fileSize": n, "originalFilename": "..."}
#[unsafe(no_mangle)]
pub unsafe extern "C" fn picker_asset_info(identifier: *const c_char, result: *mut *mut c_char) -> c_int {
    let outcome = catch_panic("picker_asset_info", || -> FFIResult<AssetInfo> {
        let identifier = c_str_arg(identifier, "identifier")?.to_string();
        let library = globals::get_asset_library()?;
        block_on_async(async move {
            let asset = library
                .get(&identifier)
                .await
                .ok_or_else(|| FFIError::from(DomainError::AssetNotFound(identifier.clone())))?;
            let file_size = library.file_size(&asset).await;
            let original_filename = LocalAssetLibrary::original_filename(&asset);
            Ok(AssetInfo { asset, file_size, original_filename })
        })
    });
    write_json_result(result, outcome)
}

/// Free a string returned by this library
#[unsafe(no_mangle)]
pub unsafe extern "C" fn picker_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        // Takes ownership of the CString and drops it
        let _ = CString::from_raw(ptr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use tempfile::tempdir;

    fn take_string(ptr: *mut c_char) -> serde_json::Value {
        let s = unsafe { CString::from_raw(ptr) }.into_string().unwrap();
        serde_json::from_str(&s).unwrap()
    }

    #[test]
    fn test_register_and_inspect_asset() {
        let _lock = globals::TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let settings = CString::new("{}").unwrap();
        assert_eq!(unsafe { picker_initialize(settings.as_ptr()) }, 0);

        let dir = tempdir().unwrap();
        let path = dir.path().join("IMG_0001.png");
        ImageBuffer::from_pixel(40, 30, Rgb([1u8, 2, 3])).save(&path).unwrap();
        let asset_json = CString::new(
            serde_json::json!({"identifier": "core/asset/1", "source_path": path}).to_string(),
        )
        .unwrap();

        let mut out: *mut c_char = std::ptr::null_mut();
        assert_eq!(unsafe { picker_register_asset(asset_json.as_ptr(), &mut out) }, 0);
        let registered = take_string(out);
        assert_eq!(registered["media_kind"], "image");
        assert_eq!(registered["pixel_width"], 40);

        let id = CString::new("core/asset/1").unwrap();
        let mut out: *mut c_char = std::ptr::null_mut();
        assert_eq!(unsafe { picker_asset_info(id.as_ptr(), &mut out) }, 0);
        let info = take_string(out);
        assert_eq!(info["originalFilename"], "IMG_0001.png");
        assert!(info["fileSize"].as_u64().unwrap() > 0);

        assert_eq!(unsafe { picker_unregister_asset(id.as_ptr()) }, 0);
        assert_eq!(unsafe { picker_unregister_asset(id.as_ptr()) }, ErrorCode::EntityNotFound as c_int);
    }

    #[test]
    fn test_bad_settings_report_error_code() {
        let _lock = globals::TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let settings = CString::new(r#"{"check_edge": 0}"#).unwrap();
        assert_eq!(unsafe { picker_initialize(settings.as_ptr()) }, ErrorCode::ValidationFailed as c_int);
    }
}
