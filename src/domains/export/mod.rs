pub mod inflight;
pub mod observer;
pub mod paths;
pub mod service;
pub mod storage;
pub mod types;

pub use observer::{CallbackObserver, ExportObserver};
pub use paths::{ExportKind, ExportPaths};
pub use service::AssetExportService;
pub use types::{ExportFailure, ExportProgress, ExportRecord, ExportRequest, ImageExport, VideoExport};
