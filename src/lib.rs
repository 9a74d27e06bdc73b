// Public modules
pub mod domains;
pub mod errors;
pub mod ffi;
pub mod globals;

// Entry point for initialization
/// Initialize the library from the host's settings JSON (`""` or `{}` for defaults).
/// This function must be called before any other function in the library;
/// calling it again applies new settings.
pub fn initialize(settings_json: &str) -> ffi::FFIResult<()> {
    globals::initialize(settings_json)
}

/// Whether `initialize` has succeeded at least once
pub fn is_initialized() -> bool {
    globals::is_initialized()
}
