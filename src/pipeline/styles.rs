//! Stylesheet pipeline
//!
//! Compiles the SCSS entry with grass, then runs the result through
//! lightningcss for vendor prefixing and minification against the
//! configured browser matrix. Output is `<out>/css/<entry>.css` plus a
//! source-map file.
//!
//! Compile errors are reported as `KilnError::Stylesheet`, which callers
//! surface as a notification instead of aborting the run.

use std::fs;
use std::path::{Path, PathBuf};

use lightningcss::printer::PrinterOptions;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};

use crate::config::{BrowserTargets, Config};
use crate::error::{KilnError, KilnResult};
use crate::fs::atomic_write;
use crate::pipeline::PipelineResult;

/// lightningcss encodes browser versions as `major << 16`
fn browsers(targets: BrowserTargets) -> Browsers {
    Browsers {
        chrome: Some(targets.chrome << 16),
        firefox: Some(targets.firefox << 16),
        safari: Some(targets.safari << 16),
        edge: Some(targets.edge << 16),
        ..Default::default()
    }
}

/// Compile SCSS source to prefixed, minified CSS
pub fn compile_stylesheet(
    source: &str,
    entry: &Path,
    targets: BrowserTargets,
) -> KilnResult<String> {
    let mut options = grass::Options::default().style(grass::OutputStyle::Compressed);
    if let Some(parent) = entry.parent() {
        options = options.load_path(parent);
    }

    let css = grass::from_string(source.to_string(), &options).map_err(|e| {
        KilnError::Stylesheet {
            file: entry.to_path_buf(),
            message: e.to_string(),
        }
    })?;

    let browsers = browsers(targets);

    let mut stylesheet =
        StyleSheet::parse(&css, ParserOptions::default()).map_err(|e| KilnError::Stylesheet {
            file: entry.to_path_buf(),
            message: e.to_string(),
        })?;

    stylesheet
        .minify(MinifyOptions {
            targets: Targets::from(browsers),
            ..Default::default()
        })
        .map_err(|e| KilnError::Stylesheet {
            file: entry.to_path_buf(),
            message: e.to_string(),
        })?;

    let output = stylesheet
        .to_css(PrinterOptions {
            minify: true,
            targets: Targets::from(browsers),
            ..Default::default()
        })
        .map_err(|e| KilnError::Stylesheet {
            file: entry.to_path_buf(),
            message: e.to_string(),
        })?;

    Ok(output.code)
}

/// Minimal V3 source map for the compiled stylesheet
///
/// grass exposes no position data, so the map carries the source path and
/// its content with empty mappings.
fn source_map(entry: &Path, scss: &str, css_file: &str) -> String {
    let map = serde_json::json!({
        "version": 3,
        "file": css_file,
        "sources": [entry.display().to_string()],
        "sourcesContent": [scss],
        "names": [],
        "mappings": "",
    });
    map.to_string()
}

/// Run the stylesheet pipeline
pub fn run(config: &Config) -> KilnResult<PipelineResult> {
    let mut result = PipelineResult::new();

    let entry = config.source_path(&config.styles.entry);
    if !entry.exists() {
        return Err(KilnError::MissingSource { path: entry });
    }
    let scss = fs::read_to_string(&entry)?;

    let css = compile_stylesheet(&scss, &entry, config.styles.browsers)?;

    let stem = entry
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "main".to_string());
    let css_name = format!("{stem}.css");
    let map_name = format!("{stem}.css.map");

    let css_path = config.out_path(PathBuf::from("css").join(&css_name));
    let map_path = config.out_path(PathBuf::from("css").join(&map_name));

    let body = format!("{css}\n/*# sourceMappingURL={map_name} */\n");
    atomic_write(&css_path, body.as_bytes())?;
    result.record_written(&css_path);

    let map = source_map(&entry, &scss, &css_name);
    atomic_write(&map_path, map.as_bytes())?;
    result.record_written(&map_path);

    Ok(result)
}
