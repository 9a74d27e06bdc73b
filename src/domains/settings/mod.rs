pub mod types;

pub use types::{PickerSettings, SelectType, DEFAULT_CHECK_EDGE};
