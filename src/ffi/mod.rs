// In src/ffi/mod.rs
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use crate::ffi::error::{FFIError, ErrorCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tokio::runtime::{Handle, RuntimeFlavor};

pub mod core;
pub mod error;
pub mod export;
pub mod selection;

pub use error::FFIResult;

/// Error handling helper for FFI boundaries (returns error code)
pub fn handle_status_result<F>(func: F) -> c_int
where
    F: FnOnce() -> FFIResult<()>,
{
    match func() {
        Ok(_) => ErrorCode::Success as c_int,
        Err(e) => {
            log::error!("[FFI] Code: {:?}, Message: {}, Details: {:?}",
                      e.code, e.message, e.details.as_deref().unwrap_or("None"));
            e.code as c_int
        }
    }
}

/// Handles results for FFI functions that return data, serializing Ok(T) or Err(FFIError) to JSON.
/// Returns a pointer to a C string (must be freed with `picker_free_string`).
pub fn handle_json_result<F, T>(func: F) -> *mut c_char
where
    F: FnOnce() -> FFIResult<T>,
    T: Serialize,
{
    let json_string = match func() {
        Ok(value) => serde_json::to_string(&value),
        Err(ffi_error) => serde_json::to_string(&ffi_error),
    };

    let final_json = match json_string {
        Ok(s) => s,
        Err(e) => {
            // The caller must always be able to parse the response
            let error_msg = format!("Failed to serialize result: {}", e);
            log::error!("[FFI] {}", error_msg);
            serde_json::json!({
                "code": ErrorCode::InternalError,
                "message": error_msg,
                "details": null,
            })
            .to_string()
        }
    };

    into_c_string(final_json)
}

/// Hand a string to the host; null only when it cannot be represented as a C string.
pub fn into_c_string(value: String) -> *mut c_char {
    match CString::new(value) {
        Ok(c_string) => c_string.into_raw(),
        Err(e) => {
            log::error!("[FFI] Failed to create CString: {}", e);
            std::ptr::null_mut()
        }
    }
}

/// Write a JSON result into `out` (when non-null) and return the matching status code.
///
/// # Safety
/// `out` must be null or point to writable memory for one pointer.
pub unsafe fn write_json_result<T: Serialize>(out: *mut *mut c_char, result: FFIResult<T>) -> c_int {
    let code = match &result {
        Ok(_) => ErrorCode::Success,
        Err(e) => e.code,
    };
    let json = handle_json_result(|| result);
    if !out.is_null() {
        *out = json;
    } else if !json.is_null() {
        drop(CString::from_raw(json));
    }
    if json.is_null() { ErrorCode::InternalError as c_int } else { code as c_int }
}

/// Borrow a UTF-8 argument from the host.
///
/// # Safety
/// `input` must be null or a valid null-terminated string that outlives the returned slice.
pub unsafe fn c_str_arg<'a>(input: *const c_char, name: &str) -> FFIResult<&'a str> {
    if input.is_null() {
        return Err(FFIError::new(ErrorCode::NullPointer, &format!("{} is null", name)));
    }
    CStr::from_ptr(input)
        .to_str()
        .map_err(|_| FFIError::new(ErrorCode::InvalidUtf8, &format!("Invalid UTF-8 in {}", name)))
}

/// Parse a JSON argument from the host.
///
/// # Safety
/// Same contract as [`c_str_arg`].
pub unsafe fn parse_json_input<T: DeserializeOwned>(input: *const c_char) -> FFIResult<T> {
    let json_str = c_str_arg(input, "Input JSON")?;
    serde_json::from_str(json_str)
        .map_err(|e| FFIError::with_details(
            ErrorCode::InvalidArgument,
            "JSON parsing failed",
            &format!("Failed to parse JSON: {}", e)
        ))
}

/// Run async work to completion on the shared runtime.
/// Safe to call from host callbacks, which run on runtime worker threads.
pub fn block_on_async<F, T>(future: F) -> FFIResult<T>
where
    F: std::future::Future<Output = FFIResult<T>> + Send,
    T: Send,
{
    let runtime = crate::globals::runtime()?;
    match Handle::try_current() {
        Err(_) => runtime.block_on(future),
        Ok(current) if current.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| runtime.handle().block_on(future))
        }
        // block_in_place is not available on a current-thread runtime
        Ok(_) => std::thread::scope(|scope| {
            scope
                .spawn(|| runtime.block_on(future))
                .join()
                .unwrap_or_else(|payload| Err(panic_to_ffi_error(payload, "block_on_async")))
        }),
    }
}

/// Run an FFI body, turning a panic into an `InternalError` instead of unwinding into the host
pub fn catch_panic<F, T>(context: &str, func: F) -> FFIResult<T>
where
    F: FnOnce() -> FFIResult<T>,
{
    catch_unwind(AssertUnwindSafe(func)).unwrap_or_else(|payload| Err(panic_to_ffi_error(payload, context)))
}

/// Convert a caught panic into an FFI error
pub fn panic_to_ffi_error(payload: Box<dyn std::any::Any + Send>, context: &str) -> FFIError {
    let panic_msg = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "panic message is not a string".to_string()
    };
    log::error!("[FFI] Panic in {}: {}", context, panic_msg);
    FFIError::internal(format!("Panic in {}: {}", context, panic_msg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_json_result_serializes_errors() {
        let ptr = handle_json_result(|| -> FFIResult<u32> { Err(FFIError::invalid_argument("bad")) });
        let json = unsafe { CString::from_raw(ptr) }.into_string().unwrap();
        assert!(json.contains("InvalidArgument"));
    }

    #[test]
    fn test_c_str_arg_rejects_null() {
        let err = unsafe { c_str_arg(std::ptr::null(), "identifier") }.unwrap_err();
        assert_eq!(err.code, ErrorCode::NullPointer);
    }

    #[test]
    fn test_catch_panic_maps_to_internal_error() {
        let err = catch_panic("test_call", || -> FFIResult<()> { panic!("boom") }).unwrap_err();
        assert_eq!(err.code, ErrorCode::InternalError);
        assert!(err.message.contains("boom"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_block_on_async_inside_runtime_worker() {
        // a spawned task runs on a worker, like export callbacks do
        let value = tokio::spawn(async { block_on_async(async { Ok(7) }) }).await.unwrap().unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_block_on_async_inside_current_thread_runtime() {
        let value = block_on_async(async { Ok("done") }).unwrap();
        assert_eq!(value, "done");
    }

    #[test]
    fn test_write_json_result_returns_error_code() {
        let mut out: *mut c_char = std::ptr::null_mut();
        let code = unsafe { write_json_result::<u32>(&mut out, Err(FFIError::invalid_argument("x"))) };
        assert_eq!(code, ErrorCode::InvalidArgument as c_int);
        assert!(!out.is_null());
        unsafe { drop(CString::from_raw(out)) };
    }
}
