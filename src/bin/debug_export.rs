//! Export a media file through the picker pipeline and print the record.
//!
//! Usage: debug_export <file> [--origin] [--out <dir>]

use multi_image_picker_core::domains::asset::{AssetRef, LocalAssetLibrary, MediaKind};
use multi_image_picker_core::domains::compression::{CancelToken, FfmpegInfo, FfmpegToolkit};
use multi_image_picker_core::domains::export::AssetExportService;
use multi_image_picker_core::domains::settings::PickerSettings;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "debug");
    }
    env_logger::init();

    let mut args = env::args().skip(1);
    let mut source: Option<PathBuf> = None;
    let mut out_dir: Option<PathBuf> = None;
    let mut thumb = true;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--origin" => thumb = false,
            "--out" => out_dir = args.next().map(PathBuf::from),
            _ => source = Some(PathBuf::from(arg)),
        }
    }
    let Some(source) = source else {
        eprintln!("Usage: debug_export <file> [--origin] [--out <dir>]");
        std::process::exit(2);
    };

    println!("🔍 Export Debug Tool");
    println!("====================");

    // Keep the temp dir alive until the end of main
    let scratch = tempfile::tempdir()?;
    let out_dir = out_dir.unwrap_or_else(|| scratch.path().to_path_buf());

    let settings = PickerSettings::default();
    let ffmpeg = FfmpegInfo::resolve(&settings);
    println!("📍 ffmpeg: {}", ffmpeg.ffmpeg_path.display());
    println!("📍 ffprobe: {}", ffmpeg.ffprobe_path.display());

    let library = Arc::new(LocalAssetLibrary::new());
    let identifier = format!("debug/{}", source.display());
    let asset = library
        .register(AssetRef::new(&identifier, MediaKind::Unknown).with_source_path(&source))
        .await?;
    println!(
        "📄 {} ({}, {}x{}, {} bytes)",
        asset.identifier,
        asset.media_kind.as_str(),
        asset.pixel_width,
        asset.pixel_height,
        library.file_size(&asset).await
    );

    let service = AssetExportService::new(library, Arc::new(FfmpegToolkit::new(ffmpeg)), settings);
    let (tx, mut rx) = mpsc::channel(32);
    let printer = tokio::spawn(async move {
        while let Some(fraction) = rx.recv().await {
            println!("   ⏳ {:>5.1}%", fraction * 100.0);
        }
    });

    let started = std::time::Instant::now();
    let result = service
        .export_with_cancel(&asset, thumb, &out_dir.to_string_lossy(), Some(tx), CancelToken::never())
        .await;
    let _ = printer.await;

    match result {
        Ok(record) => {
            println!("\n✅ Exported in {:?}", started.elapsed());
            println!("{}", serde_json::to_string_pretty(&record.to_host_map())?);
        }
        Err(e) => {
            println!("\n❌ Export failed (code {}): {}", e.error_code().as_str(), e);
            std::process::exit(1);
        }
    }
    Ok(())
}
