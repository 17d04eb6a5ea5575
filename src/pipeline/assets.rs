//! Passthrough pipelines: video, fonts, and the server-config file
//!
//! Video and fonts are incremental copies (newer-than filter, no
//! transform). The hidden `.htaccess` file copies verbatim to the output
//! root and is optional.

use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{KilnError, KilnResult};
use crate::fs::{atomic_write, copy_if_newer, CopyOutcome};
use crate::pipeline::PipelineResult;

/// Incrementally copy every file under `src_root` into `out_root`
pub fn copy_tree(src_root: &Path, out_root: &Path) -> KilnResult<PipelineResult> {
    let mut result = PipelineResult::new();

    if !src_root.exists() {
        return Ok(result);
    }

    for entry in WalkDir::new(src_root) {
        let entry = entry.map_err(|e| KilnError::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let source = entry.path();
        let relative = source
            .strip_prefix(src_root)
            .expect("walked path is under its root");
        let dest = out_root.join(relative);

        match copy_if_newer(source, &dest)? {
            CopyOutcome::Written => result.record_written(&dest),
            CopyOutcome::Skipped => result.record_skipped(&dest),
        }
    }

    Ok(result)
}

/// Run the video pipeline
pub fn run_video(config: &Config) -> KilnResult<PipelineResult> {
    copy_tree(&config.source_path("video"), &config.out_path("video"))
}

/// Run the fonts pipeline
pub fn run_fonts(config: &Config) -> KilnResult<PipelineResult> {
    copy_tree(&config.source_path("fonts"), &config.out_path("fonts"))
}

/// Copy `.htaccess` verbatim to the output root
///
/// The file is optional; a missing source counts as skipped.
pub fn run_htaccess(config: &Config) -> KilnResult<PipelineResult> {
    let mut result = PipelineResult::new();

    let source = config.source_path(".htaccess");
    let dest = config.out_path(".htaccess");

    if !source.exists() {
        result.record_skipped(&dest);
        return Ok(result);
    }

    let content = fs::read(&source)?;
    atomic_write(&dest, &content)?;
    result.record_written(&dest);

    Ok(result)
}
