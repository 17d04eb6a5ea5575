//! Configuration module for kiln
//!
//! Projects may carry a `kiln.toml` next to their source tree. Every field
//! has a default reproducing the stock layout:
//!
//! ```toml
//! [paths]
//! source = "src"
//! out = "build"
//!
//! [server]
//! host = "localhost"
//! port = 9000
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::KilnResult;

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub styles: StylesConfig,

    #[serde(default)]
    pub scripts: ScriptsConfig,

    #[serde(default)]
    pub images: ImagesConfig,
}

/// Source and output roots
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_source")]
    pub source: PathBuf,

    #[serde(default = "default_out")]
    pub out: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
            out: default_out(),
        }
    }
}

fn default_source() -> PathBuf {
    PathBuf::from("src")
}

fn default_out() -> PathBuf {
    PathBuf::from("build")
}

/// Dev server binding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    9000
}

/// Stylesheet pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StylesConfig {
    /// Entry stylesheet, relative to the source root
    #[serde(default = "default_styles_entry")]
    pub entry: PathBuf,

    /// Browser support matrix for vendor prefixing
    #[serde(default)]
    pub browsers: BrowserTargets,
}

impl Default for StylesConfig {
    fn default() -> Self {
        Self {
            entry: default_styles_entry(),
            browsers: BrowserTargets::default(),
        }
    }
}

fn default_styles_entry() -> PathBuf {
    PathBuf::from("styles/main.scss")
}

/// Minimum browser major versions that compiled CSS must support
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BrowserTargets {
    #[serde(default = "default_chrome")]
    pub chrome: u32,

    #[serde(default = "default_firefox")]
    pub firefox: u32,

    #[serde(default = "default_safari")]
    pub safari: u32,

    #[serde(default = "default_edge")]
    pub edge: u32,
}

impl Default for BrowserTargets {
    fn default() -> Self {
        Self {
            chrome: default_chrome(),
            firefox: default_firefox(),
            safari: default_safari(),
            edge: default_edge(),
        }
    }
}

fn default_chrome() -> u32 {
    80
}

fn default_firefox() -> u32 {
    75
}

fn default_safari() -> u32 {
    13
}

fn default_edge() -> u32 {
    80
}

/// Script pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptsConfig {
    /// Ordered source list, relative to the source root. The vendor library
    /// comes first so the bundle keeps it ahead of project code.
    #[serde(default = "default_script_sources")]
    pub sources: Vec<PathBuf>,

    /// Bundle file name under `<out>/js/`
    #[serde(default = "default_bundle")]
    pub bundle: String,

    /// ECMAScript emit target (es5, es2015 .. es2022, esnext)
    #[serde(default = "default_es_target")]
    pub target: String,

    /// Minify the emitted bundle
    #[serde(default = "default_true")]
    pub minify: bool,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            sources: default_script_sources(),
            bundle: default_bundle(),
            target: default_es_target(),
            minify: default_true(),
        }
    }
}

fn default_script_sources() -> Vec<PathBuf> {
    vec![
        PathBuf::from("vendor/jquery.min.js"),
        PathBuf::from("js/main.js"),
    ]
}

fn default_bundle() -> String {
    "main.js".to_string()
}

fn default_es_target() -> String {
    "es2015".to_string()
}

fn default_true() -> bool {
    true
}

/// Image pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagesConfig {
    /// JPEG re-encode quality (1-100)
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// PNG optimization preset (0-6, higher is slower)
    #[serde(default = "default_png_level")]
    pub png_level: u8,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: default_jpeg_quality(),
            png_level: default_png_level(),
        }
    }
}

fn default_jpeg_quality() -> u8 {
    80
}

fn default_png_level() -> u8 {
    2
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> KilnResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration, falling back to defaults when the file is absent
    pub fn load_or_default(path: &Path) -> KilnResult<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Absolute-ish path of a file inside the source root
    pub fn source_path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.paths.source.join(relative)
    }

    /// Absolute-ish path of a file inside the output root
    pub fn out_path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.paths.out.join(relative)
    }
}
