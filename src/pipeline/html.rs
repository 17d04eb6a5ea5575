//! Markup pipeline
//!
//! Minifies every top-level `*.html` file in the source tree into the
//! output root. Whitespace collapse only; embedded CSS/JS is left alone.

use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::error::{KilnError, KilnResult};
use crate::fs::atomic_write;
use crate::pipeline::PipelineResult;

/// Minification settings: collapse whitespace, keep the document shape
/// intact so the output still parses as markup.
fn minify_cfg() -> minify_html::Cfg {
    let mut cfg = minify_html::Cfg::default();
    cfg.keep_closing_tags = true;
    cfg.keep_html_and_head_opening_tags = true;
    cfg.minify_css = false;
    cfg.minify_js = false;
    cfg
}

/// Minify one markup document
pub fn minify_markup(source: &[u8]) -> Vec<u8> {
    minify_html::minify(source, &minify_cfg())
}

/// Run the markup pipeline
///
/// A missing or unreadable input fails the whole task; there is no retry.
pub fn run(config: &Config) -> KilnResult<PipelineResult> {
    let mut result = PipelineResult::new();

    let pattern = config.source_path("*.html");
    let entries = glob::glob(&pattern.to_string_lossy())?;

    for entry in entries {
        let path = entry.map_err(|e| KilnError::Io(e.into_error()))?;
        let file_name = match path.file_name() {
            Some(name) => name.to_os_string(),
            None => continue,
        };

        let source = fs::read(&path)?;
        let minified = minify_markup(&source);

        let dest = config.paths.out.join(Path::new(&file_name));
        atomic_write(&dest, &minified)?;
        result.record_written(&dest);
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn config_for(root: &Path) -> Config {
        let mut config = Config::default();
        config.paths.source = root.join("src");
        config.paths.out = root.join("build");
        config
    }

    const PAGE: &str = "<!DOCTYPE html>\n<html>\n  <head>\n    <title>Home</title>\n  </head>\n  <body>\n    <p>\n      hello   world\n    </p>\n  </body>\n</html>\n";

    #[test]
    fn test_minify_collapses_whitespace() {
        let out = minify_markup(PAGE.as_bytes());
        let text = String::from_utf8(out).unwrap();
        assert!(text.len() < PAGE.len());
        assert!(!text.contains("\n  "));
        assert!(text.contains("hello world"));
    }

    #[test]
    fn test_minified_output_keeps_structure() {
        let out = minify_markup(PAGE.as_bytes());
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("<body>"));
        assert!(text.contains("</body>"));
        assert!(text.contains("</html>"));
    }

    #[test]
    fn test_run_writes_top_level_pages_only() {
        let dir = tempdir().unwrap();
        let config = config_for(dir.path());
        fs::create_dir_all(config.source_path("partials")).unwrap();
        fs::write(config.source_path("index.html"), PAGE).unwrap();
        fs::write(config.source_path("about.html"), PAGE).unwrap();
        fs::write(config.source_path("partials/nav.html"), PAGE).unwrap();

        let result = run(&config).unwrap();

        assert_eq!(result.written.len(), 2);
        assert!(config.out_path("index.html").exists());
        assert!(config.out_path("about.html").exists());
        assert!(!config.out_path("partials/nav.html").exists());
    }

    #[test]
    fn test_run_empty_source_is_noop() {
        let dir = tempdir().unwrap();
        let config = config_for(dir.path());
        fs::create_dir_all(&config.paths.source).unwrap();

        let result = run(&config).unwrap();
        assert!(result.written.is_empty());
        assert!(result.is_success());
    }
}
