use futures::future::FutureExt;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task;

use crate::domains::asset::{AssetLibrary, AssetRef};
use crate::domains::compression::compressors::image_compressor::encode_jpeg;
use crate::domains::compression::{
    CancelToken, CompressionConfig, Compressor, GifCompressor, ImageCompressor, VideoCompressionOutcome,
    VideoCompressionPlan, VideoCompressionRequest, VideoProbe, VideoToolkit,
};
use crate::domains::export::inflight::{InflightExports, InflightKey};
use crate::domains::export::observer::ExportObserver;
use crate::domains::export::paths::{normalize_save_dir, temp_path, ExportKind, ExportPaths};
use crate::domains::export::storage::{self, TempFiles};
use crate::domains::export::types::{ExportRecord, ImageExport, VideoExport};
use crate::domains::settings::PickerSettings;
use crate::errors::{ExportError, ExportResult};

/// Buffered progress updates per export
const PROGRESS_BUFFER: usize = 32;

/// Turns library assets into files on disk.
///
/// Outputs are named after the asset's cache key, so a second export of an
/// unchanged asset finds its files and returns without recompressing.
/// Concurrent exports that would write the same files share one run.
#[derive(Clone)]
pub struct AssetExportService {
    pipeline: Arc<ExportPipeline>,
    inflight: Arc<InflightExports>,
}

struct ExportPipeline {
    library: Arc<dyn AssetLibrary>,
    image_compressor: Arc<dyn Compressor>,
    gif_compressor: Arc<dyn Compressor>,
    toolkit: Arc<dyn VideoToolkit>,
    settings: PickerSettings,
}

impl AssetExportService {
    pub fn new(library: Arc<dyn AssetLibrary>, toolkit: Arc<dyn VideoToolkit>, settings: PickerSettings) -> Self {
        Self::with_compressors(
            library,
            Arc::new(ImageCompressor),
            Arc::new(GifCompressor),
            toolkit,
            settings,
        )
    }

    pub fn with_compressors(
        library: Arc<dyn AssetLibrary>,
        image_compressor: Arc<dyn Compressor>,
        gif_compressor: Arc<dyn Compressor>,
        toolkit: Arc<dyn VideoToolkit>,
        settings: PickerSettings,
    ) -> Self {
        Self {
            pipeline: Arc::new(ExportPipeline {
                library,
                image_compressor,
                gif_compressor,
                toolkit,
                settings,
            }),
            inflight: Arc::new(InflightExports::new()),
        }
    }

    /// Same library and compressors with new settings and toolkit.
    /// Runs already in flight keep deduplicating against calls on the new service.
    pub fn reconfigured(&self, toolkit: Arc<dyn VideoToolkit>, settings: PickerSettings) -> Self {
        Self {
            pipeline: Arc::new(ExportPipeline {
                library: Arc::clone(&self.pipeline.library),
                image_compressor: Arc::clone(&self.pipeline.image_compressor),
                gif_compressor: Arc::clone(&self.pipeline.gif_compressor),
                toolkit,
                settings,
            }),
            inflight: Arc::clone(&self.inflight),
        }
    }

    pub fn settings(&self) -> &PickerSettings {
        &self.pipeline.settings
    }

    /// Export without progress reporting or cancellation.
    pub async fn export(&self, asset: &AssetRef, thumb: bool, save_dir: &str) -> ExportResult<ExportRecord> {
        self.export_with_cancel(asset, thumb, save_dir, None, CancelToken::never()).await
    }

    /// Export with video progress fractions sent to `progress` and a cancel token for the video encode.
    /// A call that joins a run already in flight gets its result but not its progress.
    pub async fn export_with_cancel(
        &self,
        asset: &AssetRef,
        thumb: bool,
        save_dir: &str,
        progress: Option<mpsc::Sender<f32>>,
        cancel: CancelToken,
    ) -> ExportResult<ExportRecord> {
        let kind = ExportKind::for_asset(asset, thumb).ok_or_else(|| {
            ExportError::request_failed(
                &asset.identifier,
                format!("Unsupported media kind: {}", asset.media_kind.as_str()),
            )
        })?;
        let save_dir = normalize_save_dir(save_dir);
        let key = InflightKey {
            cache_key: asset.cache_key(),
            kind,
            save_dir: save_dir.clone(),
        };

        let pipeline = Arc::clone(&self.pipeline);
        let owned_asset = asset.clone();
        let (shared, _joined) = self.inflight.join_or_start(key, &asset.identifier, move || {
            async move { pipeline.run(&owned_asset, kind, &save_dir, progress, cancel).await }.boxed()
        });
        shared.await
    }

    /// Export and report through `observer`: progress first, then exactly one of failure or completion.
    pub async fn export_with_observer(
        &self,
        asset: &AssetRef,
        thumb: bool,
        save_dir: &str,
        observer: Arc<dyn ExportObserver>,
        cancel: CancelToken,
    ) -> ExportResult<ExportRecord> {
        let (tx, mut rx) = mpsc::channel::<f32>(PROGRESS_BUFFER);
        let progress_observer = Arc::clone(&observer);
        let identifier = asset.identifier.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(fraction) = rx.recv().await {
                progress_observer.on_progress(&identifier, fraction);
            }
        });

        let result = self.export_with_cancel(asset, thumb, save_dir, Some(tx), cancel).await;
        if let Err(e) = forwarder.await {
            log::warn!("Progress forwarding for {} stopped: {}", asset.identifier, e);
        }

        match &result {
            Ok(record) => observer.on_finished(record),
            Err(error) => {
                log::error!("Export of {} failed with code {}: {}", asset.identifier, error.error_code(), error);
                observer.on_failed(error);
            }
        }
        result
    }
}

impl ExportPipeline {
    async fn run(
        &self,
        asset: &AssetRef,
        kind: ExportKind,
        save_dir: &str,
        progress: Option<mpsc::Sender<f32>>,
        cancel: CancelToken,
    ) -> ExportResult<ExportRecord> {
        log::debug!("Exporting {} as {} into {}", asset.identifier, kind.as_str(), save_dir);
        let paths = ExportPaths::new(kind, &asset.cache_key(), save_dir);
        let token = storage::temp_token();
        let mut temps = TempFiles::new();

        let result = match kind {
            ExportKind::Image { thumb } => self.export_image(asset, thumb, &paths, &token, &mut temps).await,
            ExportKind::Gif => self.export_gif(asset, &paths, &token, &mut temps).await,
            ExportKind::Video => self.export_video(asset, &paths, &token, &mut temps, progress, cancel).await,
        };
        temps.cleanup().await;

        if let Ok(record) = &result {
            log::info!("Exported {} to {}", asset.identifier, record.file_path());
        }
        result
    }

    async fn export_image(
        &self,
        asset: &AssetRef,
        thumb: bool,
        paths: &ExportPaths,
        token: &str,
        temps: &mut TempFiles,
    ) -> ExportResult<ExportRecord> {
        let id = asset.identifier.as_str();
        if storage::exists(&paths.file()).await && storage::exists(&paths.companion()).await {
            log::debug!("Reusing existing export {}", paths.file_path);
            return Ok(image_record(asset, paths, asset.pixel_width, asset.pixel_height, paths.companion_path.clone()));
        }

        let data = self
            .library
            .request_image_data(asset)
            .await
            .ok_or_else(|| ExportError::request_failed(id, "Image data unavailable"))?;
        let (width, height) = pixel_size(asset, &data);

        let config = if thumb {
            CompressionConfig::thumb(&self.settings)
        } else {
            CompressionConfig::origin(&self.settings)
        };
        log::debug!("{} running {} for {}", self.image_compressor.compressor_name(), config.method.as_str(), id);
        let compressed = self
            .image_compressor
            .compress(data, config)
            .await
            .map_err(|e| ExportError::request_failed(id, e.to_string()))?;

        let temp = temps.track(temp_path(&paths.file_path, token));
        if let Err(e) = storage::write_file(&temp, &compressed).await {
            log::warn!("Failed to write {}: {}", temp.display(), e);
        }
        if !storage::exists(&temp).await {
            return Err(ExportError::request_failed(id, "Compressed image was not written"));
        }

        if width as u64 * height as u64 > self.settings.check_area_threshold() {
            if let Err(e) = self.write_check(&compressed, &paths.companion(), token).await {
                log::warn!("No check file for {}: {}", id, e);
            }
        }

        self.commit_or_save_failed(id, &temp, &paths.file()).await?;
        let check_path = fallback_path(&paths.companion_path, &paths.file_path).await;
        Ok(image_record(asset, paths, width, height, check_path))
    }

    async fn write_check(&self, compressed: &[u8], check: &Path, token: &str) -> crate::errors::DomainResult<()> {
        let preview = self
            .image_compressor
            .compress(compressed.to_vec(), CompressionConfig::check(&self.settings))
            .await?;
        storage::write_atomic(check, token, &preview).await?;
        Ok(())
    }

    async fn export_gif(
        &self,
        asset: &AssetRef,
        paths: &ExportPaths,
        token: &str,
        temps: &mut TempFiles,
    ) -> ExportResult<ExportRecord> {
        let id = asset.identifier.as_str();
        if storage::exists(&paths.file()).await && storage::exists(&paths.companion()).await {
            log::debug!("Reusing existing export {}", paths.file_path);
            return Ok(gif_record(asset, paths, asset.pixel_width, asset.pixel_height, paths.companion_path.clone()));
        }

        let data = self
            .library
            .request_image_data(asset)
            .await
            .ok_or_else(|| ExportError::request_failed(id, "Image data unavailable"))?;
        let (width, height) = pixel_size(asset, &data);

        log::debug!("{} resampling {}", self.gif_compressor.compressor_name(), id);
        let full = self
            .gif_compressor
            .compress(data.clone(), CompressionConfig::animated(self.settings.gif_sample_count))
            .await
            .map_err(|e| ExportError::request_failed(id, e.to_string()))?;
        let temp = temps.track(temp_path(&paths.file_path, token));
        storage::write_file(&temp, &full)
            .await
            .map_err(|e| ExportError::request_failed(id, e.to_string()))?;

        let check = self
            .gif_compressor
            .compress(data, CompressionConfig::animated(self.settings.gif_check_sample_count))
            .await
            .map_err(|e| ExportError::request_failed(id, e.to_string()))?;
        storage::write_atomic(&paths.companion(), token, &check)
            .await
            .map_err(|e| ExportError::request_failed(id, e.to_string()))?;

        self.commit_or_save_failed(id, &temp, &paths.file()).await?;
        let check_path = fallback_path(&paths.companion_path, &paths.file_path).await;
        Ok(gif_record(asset, paths, width, height, check_path))
    }

    async fn export_video(
        &self,
        asset: &AssetRef,
        paths: &ExportPaths,
        token: &str,
        temps: &mut TempFiles,
        progress: Option<mpsc::Sender<f32>>,
        cancel: CancelToken,
    ) -> ExportResult<ExportRecord> {
        let id = asset.identifier.as_str();
        let source = self
            .library
            .request_video(asset)
            .await
            .ok_or_else(|| ExportError::request_failed(id, "Video unavailable"))?;
        let source_probe = self
            .toolkit
            .probe(&source.path)
            .await
            .map_err(|e| ExportError::request_failed(id, e.to_string()))?;

        let video_temp = temps.track(temp_path(&paths.file_path, token));
        let (poster, video) = tokio::try_join!(
            self.ensure_poster(id, &source.path, paths, token),
            self.ensure_video(id, &source.path, &source_probe, paths, video_temp, progress, cancel),
        )?;

        Ok(ExportRecord::Video(VideoExport {
            identifier: asset.identifier.clone(),
            file_path: paths.file_path.clone(),
            width: video.0,
            height: video.1,
            name: paths.name.clone(),
            duration: source_probe.duration_sec,
            thumb_path: paths.companion_path.clone(),
            thumb_name: paths.companion_name.clone(),
            thumb_width: poster.0,
            thumb_height: poster.1,
        }))
    }

    /// Poster frame size, extracting and writing the frame when it is not on disk yet.
    async fn ensure_poster(&self, id: &str, source: &Path, paths: &ExportPaths, token: &str) -> ExportResult<(u32, u32)> {
        let poster = paths.companion();
        if storage::exists(&poster).await {
            let existing = poster.clone();
            match task::spawn_blocking(move || image::image_dimensions(existing)).await {
                Ok(Ok(size)) => return Ok(size),
                Ok(Err(e)) => log::warn!("Existing poster {} unreadable: {}", poster.display(), e),
                Err(e) => log::warn!("Poster inspection task failed: {}", e),
            }
        }

        let frame = self
            .toolkit
            .extract_first_frame(source)
            .await
            .map_err(|e| ExportError::compression_failed(id, e.to_string()))?;
        let size = (frame.width(), frame.height());
        let quality = self.settings.video_poster_quality;
        let jpeg = task::spawn_blocking(move || encode_jpeg(&frame, quality))
            .await
            .map_err(|e| ExportError::compression_failed(id, format!("Task join error: {}", e)))?
            .map_err(|e| ExportError::compression_failed(id, e.to_string()))?;
        storage::write_atomic(&poster, token, &jpeg)
            .await
            .map_err(|e| ExportError::compression_failed(id, e.to_string()))?;
        Ok(size)
    }

    /// Compressed video size, reusing a companion file that already has a video track.
    #[allow(clippy::too_many_arguments)]
    async fn ensure_video(
        &self,
        id: &str,
        source: &Path,
        source_probe: &VideoProbe,
        paths: &ExportPaths,
        temp: PathBuf,
        progress: Option<mpsc::Sender<f32>>,
        cancel: CancelToken,
    ) -> ExportResult<(u32, u32)> {
        let file = paths.file();
        if storage::exists(&file).await {
            match self.toolkit.probe(&file).await {
                Ok(probe) if probe.has_video_track() => {
                    log::debug!("Reusing existing export {}", paths.file_path);
                    return Ok((probe.width, probe.height));
                }
                Ok(_) => log::warn!("{} has no video track, compressing again", paths.file_path),
                Err(e) => log::warn!("Could not probe {}: {}", paths.file_path, e),
            }
        }

        let request = VideoCompressionRequest {
            source: source.to_path_buf(),
            destination: temp,
            plan: VideoCompressionPlan::low_tier(source_probe),
            duration_sec: source_probe.duration_sec,
        };
        match self.toolkit.compress(request, progress, cancel).await {
            VideoCompressionOutcome::Cancelled => Err(ExportError::cancelled(id)),
            VideoCompressionOutcome::Failed(message) => Err(ExportError::request_failed(id, message)),
            VideoCompressionOutcome::Succeeded { path, width, height } => {
                if !storage::exists(&path).await {
                    return Err(ExportError::request_failed(id, "Compressed video not found"));
                }
                self.commit_or_save_failed(id, &path, &file).await?;
                Ok((width, height))
            }
        }
    }

    async fn commit_or_save_failed(&self, id: &str, temp: &Path, final_path: &Path) -> ExportResult<()> {
        if let Err(e) = storage::commit(temp, final_path).await {
            log::warn!("Failed to move {} into place: {}", temp.display(), e);
        }
        if storage::exists(final_path).await {
            Ok(())
        } else {
            Err(ExportError::save_failed(id, format!("{} not found after save", final_path.display())))
        }
    }
}

/// Asset pixel size, read from the data header when the library did not report one.
fn pixel_size(asset: &AssetRef, data: &[u8]) -> (u32, u32) {
    if asset.pixel_width > 0 && asset.pixel_height > 0 {
        return (asset.pixel_width, asset.pixel_height);
    }
    image::io::Reader::new(Cursor::new(data))
        .with_guessed_format()
        .ok()
        .and_then(|reader| reader.into_dimensions().ok())
        .unwrap_or((asset.pixel_width, asset.pixel_height))
}

async fn fallback_path(preferred: &str, fallback: &str) -> String {
    if storage::exists(Path::new(preferred)).await {
        preferred.to_string()
    } else {
        fallback.to_string()
    }
}

fn image_record(asset: &AssetRef, paths: &ExportPaths, width: u32, height: u32, check_path: String) -> ExportRecord {
    ExportRecord::Image(still_export(asset, paths, width, height, check_path))
}

fn gif_record(asset: &AssetRef, paths: &ExportPaths, width: u32, height: u32, check_path: String) -> ExportRecord {
    ExportRecord::Gif(still_export(asset, paths, width, height, check_path))
}

fn still_export(asset: &AssetRef, paths: &ExportPaths, width: u32, height: u32, check_path: String) -> ImageExport {
    ImageExport {
        identifier: asset.identifier.clone(),
        file_path: paths.file_path.clone(),
        check_path,
        width,
        height,
        name: paths.name.clone(),
    }
}
