//! Image pipeline
//!
//! Recursively walks `<src>/img`, skips files whose output is already up to
//! date, recompresses the two raster families (JPEG lossily at the
//! configured quality, PNG through oxipng) and copies anything else
//! verbatim.

use std::fs;
use std::io::Cursor;
use std::path::Path;

use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{KilnError, KilnResult};
use crate::fs::{atomic_write, is_newer};
use crate::pipeline::PipelineResult;

/// Lossy JPEG re-encode
fn recompress_jpeg(source: &Path, quality: u8) -> KilnResult<Vec<u8>> {
    let image_err = |message: String| KilnError::Image {
        file: source.to_path_buf(),
        message,
    };

    let bytes = fs::read(source)?;
    let img = image::load_from_memory(&bytes).map_err(|e| image_err(e.to_string()))?;

    // JPEG has no alpha channel
    let rgb = img.to_rgb8();

    let mut out = Vec::new();
    let encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(Cursor::new(&mut out), quality);
    rgb.write_with_encoder(encoder)
        .map_err(|e| image_err(e.to_string()))?;
    Ok(out)
}

/// PNG recompression
fn recompress_png(source: &Path, level: u8) -> KilnResult<Vec<u8>> {
    let bytes = fs::read(source)?;
    oxipng::optimize_from_memory(&bytes, &oxipng::Options::from_preset(level)).map_err(|e| {
        KilnError::Image {
            file: source.to_path_buf(),
            message: e.to_string(),
        }
    })
}

/// Run the image pipeline
pub fn run(config: &Config) -> KilnResult<PipelineResult> {
    let mut result = PipelineResult::new();

    let src_root = config.source_path("img");
    if !src_root.exists() {
        return Ok(result);
    }
    let out_root = config.out_path("img");

    for entry in WalkDir::new(&src_root) {
        let entry = entry.map_err(|e| KilnError::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let source = entry.path();
        let relative = source
            .strip_prefix(&src_root)
            .expect("walked path is under its root");
        let dest = out_root.join(relative);

        if !is_newer(source, &dest)? {
            result.record_skipped(&dest);
            continue;
        }

        let ext = source
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        let content = match ext.as_deref() {
            Some("jpg") | Some("jpeg") => recompress_jpeg(source, config.images.jpeg_quality)?,
            Some("png") => recompress_png(source, config.images.png_level)?,
            _ => fs::read(source)?,
        };

        atomic_write(&dest, &content)?;
        result.record_written(&dest);
    }

    Ok(result)
}
