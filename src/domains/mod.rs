pub mod asset;
pub mod compression;
pub mod export;
pub mod selection;
pub mod settings;

pub use asset::{AssetLibrary, AssetRef, LocalAssetLibrary, MediaKind};
pub use export::{AssetExportService, ExportRecord};
pub use selection::SelectionSet;
pub use settings::PickerSettings;
