// src/ffi/selection.rs
// ============================================================================
// FFI bindings for the picker's selection set.
// Selections are ordered; the host shows each asset's 1-based number.
// ============================================================================

use crate::domains::asset::{AssetRef, MediaKind};
use crate::domains::selection::SelectionChange;
use crate::errors::ValidationError;
use crate::ffi::error::FFIError;
use crate::ffi::{
    block_on_async, c_str_arg, catch_panic, handle_status_result, parse_json_input, write_json_result, FFIResult,
};
use crate::globals;
use std::os::raw::{c_char, c_int};

/// Toggle an asset in the selection.
/// Input: AssetRef JSON (the registered copy wins when the identifier is known).
/// Output: {"outcome": "selected", "number": n} | {"outcome": "deselected"} |
///         {"outcome": "limit_reached", "count": n}
#[unsafe(no_mangle)]
pub unsafe extern "C" fn picker_selection_toggle(asset_json: *const c_char, result: *mut *mut c_char) -> c_int {
    let outcome = catch_panic("picker_selection_toggle", || -> FFIResult<SelectionChange> {
        let asset: AssetRef = parse_json_input(asset_json)?;
        if asset.identifier.trim().is_empty() {
            return Err(ValidationError::required("identifier").into());
        }
        let settings = globals::get_settings()?;
        let library = globals::get_asset_library()?;
        let identifier = asset.identifier.clone();
        let asset = block_on_async(async move { Ok(library.get(&identifier).await.unwrap_or(asset)) })?;

        globals::with_selection(|selection| {
            let deselecting = selection.contains(&asset.identifier);
            if !deselecting
                && asset.media_kind != MediaKind::Unknown
                && !settings.select_type.accepts(asset.media_kind)
            {
                return Err(FFIError::from(ValidationError::invalid_value(
                    "media_kind",
                    &format!("{} assets cannot be selected in {} mode", asset.media_kind.as_str(), settings.select_type.as_str()),
                )));
            }
            let change = selection.toggle(asset);
            log::debug!("Selection changed: {:?} ({} selected)", change, selection.len());
            Ok(change)
        })?
    });
    write_json_result(result, outcome)
}

/// Output: {"removed": bool}
#[unsafe(no_mangle)]
pub unsafe extern "C" fn picker_selection_remove(identifier: *const c_char, result: *mut *mut c_char) -> c_int {
    let outcome = catch_panic("picker_selection_remove", || -> FFIResult<serde_json::Value> {
        let identifier = c_str_arg(identifier, "identifier")?;
        let removed = globals::with_selection(|selection| selection.deselect(identifier))?;
        Ok(serde_json::json!({ "removed": removed }))
    });
    write_json_result(result, outcome)
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn picker_selection_clear() -> c_int {
    handle_status_result(|| catch_panic("picker_selection_clear", || globals::with_selection(|selection| selection.clear())))
}

/// Output: the selected assets in selection order
#[unsafe(no_mangle)]
pub unsafe extern "C" fn picker_selection_list(result: *mut *mut c_char) -> c_int {
    let outcome = catch_panic("picker_selection_list", || globals::with_selection(|selection| selection.assets().to_vec()));
    write_json_result(result, outcome)
}

/// Output: {"count": n, "max": n}
#[unsafe(no_mangle)]
pub unsafe extern "C" fn picker_selection_count(result: *mut *mut c_char) -> c_int {
    let outcome = catch_panic("picker_selection_count", || {
        globals::with_selection(|selection| serde_json::json!({ "count": selection.len(), "max": selection.max() }))
    });
    write_json_result(result, outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffi::error::ErrorCode;
    use std::ffi::CString;

    fn call_json(f: impl FnOnce(*mut *mut c_char) -> c_int) -> (c_int, serde_json::Value) {
        let mut out: *mut c_char = std::ptr::null_mut();
        let code = f(&mut out);
        let json = unsafe { CString::from_raw(out) }.into_string().unwrap();
        (code, serde_json::from_str(&json).unwrap())
    }

    fn toggle(json: &str) -> (c_int, serde_json::Value) {
        let input = CString::new(json).unwrap();
        call_json(|out| unsafe { picker_selection_toggle(input.as_ptr(), out) })
    }

    fn init(settings: &str) {
        let settings = CString::new(settings).unwrap();
        assert_eq!(unsafe { crate::ffi::core::picker_initialize(settings.as_ptr()) }, 0);
        assert_eq!(unsafe { picker_selection_clear() }, 0);
    }

    #[test]
    fn test_toggle_until_limit() {
        let _lock = globals::TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        init(r#"{"max_number_of_selections": 2}"#);

        let (_, first) = toggle(r#"{"identifier": "sel/a", "media_kind": "image"}"#);
        assert_eq!(first["outcome"], "selected");
        assert_eq!(first["number"], 1);
        toggle(r#"{"identifier": "sel/b", "media_kind": "video"}"#);
        let (code, full) = toggle(r#"{"identifier": "sel/c", "media_kind": "image"}"#);
        assert_eq!(code, 0);
        assert_eq!(full["outcome"], "limit_reached");
        assert_eq!(full["count"], 2);

        let (_, removed) = toggle(r#"{"identifier": "sel/a"}"#);
        assert_eq!(removed["outcome"], "deselected");
        let (_, list) = call_json(|out| unsafe { picker_selection_list(out) });
        assert_eq!(list.as_array().unwrap().len(), 1);
        assert_eq!(list[0]["identifier"], "sel/b");

        let (_, count) = call_json(|out| unsafe { picker_selection_count(out) });
        assert_eq!(count["count"], 1);
        assert_eq!(count["max"], 2);
    }

    #[test]
    fn test_select_type_filters_kinds() {
        let _lock = globals::TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        init(r#"{"select_type": "selectImage"}"#);

        let (code, err) = toggle(r#"{"identifier": "sel/video", "media_kind": "video"}"#);
        assert_eq!(code, ErrorCode::ValidationFailed as c_int);
        assert_eq!(err["code"], "ValidationFailed");

        let (code, _) = toggle(r#"{"identifier": "sel/photo", "media_kind": "image"}"#);
        assert_eq!(code, 0);

        let id = CString::new("sel/photo").unwrap();
        let (_, removed) = call_json(|out| unsafe { picker_selection_remove(id.as_ptr(), out) });
        assert_eq!(removed["removed"], true);
        let (_, removed) = call_json(|out| unsafe { picker_selection_remove(id.as_ptr(), out) });
        assert_eq!(removed["removed"], false);
    }
}
